//! Session bitstream decoder.
//!
//! Two phases, matching the reference `TrainingSession`: byte-indexed
//! [`header`] extraction against the first raw packet, then a bit-cursor
//! [`sample`] walk over the reconstructed telemetry region. [`bitutils`]-style
//! leaf helpers live in [`cursor`] and [`channels`]; [`bitstream`] owns the
//! packet-to-bitstream reconstruction.

mod bitstream;
mod channels;
mod cursor;
mod error;
mod header;
mod sample;

pub use error::ParserError;
pub use header::SessionInfo;
pub use sample::Sample;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::timezone_offset;
use crate::model::RawSession;
use channels::ChannelState;
use cursor::BitCursor;
use sample::SampleStreamParams;

/// Fixed-offset fields read from a session's header, immutable once
/// decoded. `start_utc` is inferred from the session's local start
/// wall-clock plus (for GPS sessions) a timezone guessed from the first
/// sample's coordinates; GPS-less sessions assume UTC+0, mirroring the
/// reference client's `_set_start_utctime(timezone=None)` fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session start as the watch's own (timezone-naive) wall clock;
    /// used for filenames, the same way the reference client's
    /// `start_time` does.
    pub start_local: NaiveDateTime,
    pub start_utc: DateTime<Utc>,
    pub duration_secs: u32,
    pub duration_tenths: u32,
    pub hr_max: u8,
    pub hr_min: u8,
    pub hr_avg: u8,
    pub user_hr_max: u8,
    pub user_hr_min: u8,
    pub user_hr_rest: u8,
    pub has_hr: bool,
    pub has_gps: bool,
    pub sample_rate_seconds: u32,
}

impl SessionMetadata {
    fn stream_params(&self) -> SampleStreamParams {
        SampleStreamParams {
            has_hr: self.has_hr,
            has_gps: self.has_gps,
            sample_rate_seconds: self.sample_rate_seconds,
        }
    }
}

fn first_packet(raw: &RawSession) -> Result<&[u8], ParserError> {
    raw.packets
        .first()
        .map(|p| p.as_slice())
        .ok_or_else(|| ParserError::Invariant {
            field: "session",
            detail: "session has no packets".to_string(),
        })
}

/// Extracts [`SessionMetadata`] from a raw session's header. For GPS
/// sessions this also bootstraps the first telemetry sample far enough
/// to recover its coordinates, used only to infer a UTC offset -- it
/// does not walk the rest of the bitstream.
pub fn decode_metadata(raw: &RawSession) -> Result<SessionMetadata, ParserError> {
    let info = SessionInfo::from_first_packet(first_packet(raw)?)?;
    let naive_start = info.start_time()?;

    let offset = if info.has_gps {
        let bits = bitstream::samples_bits(&raw.packets, info.has_gps)?;
        let mut cursor = BitCursor::new(bits);
        let channels = ChannelState::new();
        let params = SampleStreamParams {
            has_hr: info.has_hr,
            has_gps: info.has_gps,
            sample_rate_seconds: info.sample_rate,
        };
        let first = sample::parse_first_sample(&mut cursor, params, &channels)?;
        timezone_offset(first.lat, first.lon)
    } else {
        chrono::FixedOffset::east_opt(0).expect("zero offset is always valid")
    };

    let start_utc = offset
        .from_local_datetime(&naive_start)
        .single()
        .unwrap_or_else(|| offset.from_utc_datetime(&naive_start))
        .with_timezone(&Utc);

    Ok(SessionMetadata {
        start_local: naive_start,
        start_utc,
        duration_secs: info.duration_secs(),
        duration_tenths: info.duration_tenths,
        hr_max: info.hr_max,
        hr_min: info.hr_min,
        hr_avg: info.hr_avg,
        user_hr_max: info.user_hr_max,
        user_hr_min: info.user_hr_min,
        user_hr_rest: info.user_hr_rest,
        has_hr: info.has_hr,
        has_gps: info.has_gps,
        sample_rate_seconds: info.sample_rate,
    })
}

/// Walks the telemetry bitstream for `raw`, driven entirely off
/// `metadata` -- no header bytes are re-read. Aborts with a
/// [`ParserError`] on the first malformed prefix or out-of-bounds read;
/// the caller discards any samples already produced for this session.
pub fn decode_samples(metadata: &SessionMetadata, raw: &RawSession) -> Result<Vec<Sample>, ParserError> {
    let bits = bitstream::samples_bits(&raw.packets, metadata.has_gps)?;
    let cursor = BitCursor::new(bits);
    let (samples, _total_distance, _max_speed) = sample::decode_samples(metadata.stream_params(), cursor)?;
    Ok(samples)
}

/// Sum of each sample's per-tick distance, matching the `total_distance`
/// invariant.
pub fn total_distance(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.distance).sum()
}

/// Maximum per-tick speed across the session, matching the `max_speed`
/// invariant.
pub fn max_speed(samples: &[Sample]) -> f64 {
    samples.iter().map(|s| s.speed).fold(0.0_f64, f64::max)
}

/// Renders a session's reconstructed sample bitstream as an ASCII
/// `'0'`/`'1'` string, for debug dumps and the packed-binary emitter.
pub fn to_bitstring(raw: &RawSession) -> Result<String, ParserError> {
    let info = SessionInfo::from_first_packet(first_packet(raw)?)?;
    let bits = bitstream::samples_bits(&raw.packets, info.has_gps)?;
    Ok(bits.iter().map(|b| if *b { '1' } else { '0' }).collect())
}
