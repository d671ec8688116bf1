/// Errors raised while decoding a session's sample bitstream.
///
/// The reference parser wraps every exception raised while walking the
/// bitstream into a single catch-all; we keep that shape; a parse that
/// runs off the end of the bitstream or trips an internal invariant both
/// surface as `Truncated`/`Invariant` here rather than panicking.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("session bitstream ended while parsing a sample at bit {cursor}")]
    Truncated { cursor: usize },

    #[error("unexpected value while parsing {field}: {detail}")]
    Invariant {
        field: &'static str,
        detail: String,
    },
}
