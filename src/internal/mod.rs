//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod panic_message;

pub(crate) use circular::ResolutionPath;
pub(crate) use panic_message::panic_message;
