pub mod builder;
pub mod counter;
pub mod fitter;

pub use builder::{ContextDocument, build_fim_prompt, normalize_source};
pub use counter::{HttpTokenCounter, TokenCounter};
pub use fitter::{CursorWindow, PrefixWindow, fit_around_cursor, fit_prefix, tolerance_for};
