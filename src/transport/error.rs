/// Errors raised by the DataLink transport.
///
/// `Timeout` and `NotFound` are recoverable at the call-site boundary
/// described in the sync policy (count/discovery/pairing abort the whole
/// sync, an individual session body read is downgraded to a warning);
/// `Io` is always fatal.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Polar DataLink device not found (vendor 0x0DA4 / product 0x0004)")]
    NotFound,

    #[error("timed out during {step}")]
    Timeout { step: &'static str },

    #[error("USB I/O error: {0}")]
    Io(#[from] rusb::Error),
}
