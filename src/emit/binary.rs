//! Packed/debug binary emitter: the decoder's ASCII `'0'`/`'1'`
//! bitstring, written verbatim -- matching the reference client's
//! `BinaryConverter`, which is a pure consumer of `tobin()` rather than
//! a second bit-packed wire format.

use std::path::Path;

use crate::decoder::{self, SessionMetadata};
use crate::model::RawSession;

use super::{out_path, ConverterError};

const SUFFIX: &str = "";

/// Writes `to_bitstring(raw)` to `<out_dir>/<base_filename>`.
pub fn write(raw: &RawSession, metadata: &SessionMetadata, out_dir: &Path) -> Result<(), ConverterError> {
    let path = out_path(out_dir, metadata, SUFFIX);
    let bits = decoder::to_bitstring(raw)?;
    std::fs::write(&path, bits).map_err(|source| ConverterError::Io {
        path: path.display().to_string(),
        source,
    })
}
