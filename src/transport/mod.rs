//! The `transport` module handles network communication with observers over
//! WebSockets.
//!
//! It defines the inbound control protocol and outbound acknowledgement
//! messages, the handshake authentication seam, the main duplex server, and
//! the secondary simplex radar stream listener.

pub mod auth;
pub mod message;
pub mod radar_stream;
pub mod websocket;

#[cfg(test)]
mod tests;
