//! consult-gateway — HTTP API in front of the consult dispatcher
//!
//! Serves the model catalog, runs consultations and answers liveness probes.

pub mod protocol;
pub mod server;

pub use server::GatewayServer;
