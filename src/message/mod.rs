//! Message types and the optimistic send pipeline.

mod sending;
mod types;

pub use types::{DeliveryStatus, Message, MessageKind};

pub(crate) use sending::send_message;
