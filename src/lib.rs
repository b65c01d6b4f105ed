//! # Aegis Hub
//!
//! `aegis-hub` is the real-time event distribution subsystem of a tactical
//! operations dashboard. It ingests asynchronously produced events (new
//! alerts, radar detections, AI-derived insights, map-view changes) and
//! fans them out over WebSockets with room semantics, liveness detection
//! and at-most-once delivery to many concurrently connected observers.
//!
//! ## Core Modules
//!
//! - `hub`: the shared service owning the connection registry and room
//!   router, plus the liveness monitor.
//! - `bus`: the in-process event bus decoupling producers from delivery.
//! - `fanout`: the single bus consumer that delivers events to room members.
//! - `producers`: alert, radar and simulated-sensor event sources.
//! - `transport`: the WebSocket servers and the observer control protocol.
//! - `config`: loading and merging server configuration.
//! - `utils`: logging setup and shared error definitions.

pub mod bus;
pub mod config;
pub mod fanout;
pub mod hub;
pub mod producers;
pub mod transport;
pub mod utils;
