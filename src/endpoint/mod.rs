pub mod kind;
pub mod process;
pub mod supervisor;

pub use kind::ModelKind;
pub use process::{CommandSpawner, ManagedProcess, ProcessHandle, ProcessSpawner};
pub use supervisor::{Endpoint, EndpointRegistry, EndpointStatus};
