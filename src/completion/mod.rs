pub mod params;
pub mod parser;
pub mod stream;

pub use params::SamplingParams;
pub use parser::{FrameParser, GenerationDelta, Timings};
pub use stream::{CompletionRequest, next_correlation_id, stream_completion};
