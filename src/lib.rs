//! Forwards structured log events to a log ingestion endpoint.
//!
//! Producers hand `(fields, message)` pairs to a [`pipeline::Forwarder`]. The live
//! [`pipeline::Pipeline`] queues them in a bounded channel and a fixed pool of
//! workers shapes each one into a flat JSON document and posts it with a bearer
//! token. Delivery is best-effort: failed events are logged and dropped.

pub mod config;
pub mod event;
pub mod pipeline;
pub mod shaper;
pub mod transport;

#[cfg(test)]
mod testing;
