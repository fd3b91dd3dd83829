//! In-memory session state.

mod chat_state;

pub use chat_state::ChatState;
