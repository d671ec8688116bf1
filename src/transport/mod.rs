//! USB transport for the Polar RCX5 "DataLink" dongle.
//!
//! Owns the device handshake and session transfer; knows nothing about
//! the meaning of the bytes it moves -- that's the decoder's job.

mod constants;
mod device;
mod driver;
mod error;

pub use driver::DataLink;
pub use error::TransportError;
