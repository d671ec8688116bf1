//! Downstream consumers of a decoded session: TCX, raw JSON, and the
//! packed/debug binary form, matching the reference client's
//! `FORMAT_CONVERTER_MAP` (`bin`, `tcx`, `raw`).

mod error;
pub mod binary;
pub mod json;
pub mod tcx;

pub use error::ConverterError;

use std::path::{Path, PathBuf};

use crate::decoder::SessionMetadata;

/// Base filename shared by every emitter for a given session, matching
/// the reference client's `start_time.strftime('%Y%m%dT%H%M%S')`.
pub fn base_filename(metadata: &SessionMetadata) -> String {
    metadata.start_local.format("%Y%m%dT%H%M%S").to_string()
}

fn out_path(out_dir: &Path, metadata: &SessionMetadata, suffix: &str) -> PathBuf {
    out_dir.join(format!("{}{}", base_filename(metadata), suffix))
}
