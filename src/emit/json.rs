//! Raw-session JSON emitter: a session as the external caching layer
//! sees it, a JSON array of arrays of byte integers (no decoding
//! happens here at all).

use std::path::Path;

use crate::decoder::SessionMetadata;
use crate::model::RawSession;

use super::{out_path, ConverterError};

const SUFFIX: &str = ".json";

/// Serializes `raw` as `[[u8; packet_len]; packet_count]` and writes it
/// to `<out_dir>/<base_filename>.json`.
pub fn write(raw: &RawSession, metadata: &SessionMetadata, out_dir: &Path) -> Result<(), ConverterError> {
    let path = out_path(out_dir, metadata, SUFFIX);
    let body = serde_json::to_string(&raw.packets)?;
    std::fs::write(&path, body).map_err(|source| ConverterError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serde_json() {
        let raw = RawSession::new(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let encoded = serde_json::to_string(&raw.packets).unwrap();
        let decoded: Vec<Vec<u8>> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, raw.packets);
    }
}
