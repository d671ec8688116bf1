/// Errors raised by the emitters -- downstream consumers of a decoded
/// session, out of the core per the specification's scope, but still
/// typed the way the rest of this crate is.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("can't convert to TCX: training session doesn't have gps data")]
    MissingGps,

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize session to JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parser(#[from] crate::decoder::ParserError),
}
