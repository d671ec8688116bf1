//! DataLink USB driver and session decoder for the Polar RCX5 sports watch.
//!
//! [`transport`] owns the USB handshake and session enumeration; [`decoder`]
//! turns the opaque packets it returns into structured telemetry. Neither
//! knows the other's internals -- [`model::RawSession`] is the boundary.
pub mod bitutils;
pub mod decoder;
pub mod emit;
pub mod geo;
pub mod model;
pub mod transport;

pub use decoder::{decode_metadata, decode_samples, ParserError, Sample, SessionMetadata};
pub use model::RawSession;
pub use transport::{DataLink, TransportError};
