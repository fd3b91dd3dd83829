//! Cross-cutting pieces shared by every module.

pub mod error;
pub mod event;

pub use error::Error;
pub use event::UiEvent;
