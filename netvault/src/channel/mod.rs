//! Prompt matching over transport streams.

pub mod buffer;
pub mod filter;
pub mod patterns;
pub mod session;

pub use buffer::DialogBuffer;
pub use filter::filter;
pub use patterns::PromptSet;
pub use session::{Matched, Session, SessionConfig, Timeouts};
