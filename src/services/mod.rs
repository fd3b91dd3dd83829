//! Background services: realtime ingest and feed lifecycle.

pub(crate) mod event_handler;
pub(crate) mod subscription_handler;
