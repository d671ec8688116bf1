use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bitutils::{bits_to_u64, twos_complement_to_i64};
use crate::geo::great_circle_distance_m;

use super::channels::{ChannelState, SampleField};
use super::cursor::{bits_eq, BitCursor};
use super::error::ParserError;

/// The subset of [`super::header::SessionInfo`] the telemetry walk
/// actually needs -- decoupled from the full header so the public
/// `decode_samples(metadata, raw_session)` entry point can drive this
/// straight off `SessionMetadata` without re-parsing the header.
#[derive(Debug, Clone, Copy)]
pub struct SampleStreamParams {
    pub has_hr: bool,
    pub has_gps: bool,
    pub sample_rate_seconds: u32,
}

/// Coefficient used to turn the raw fractional-coordinate bits into a
/// decimal fraction of a degree.
const COORD_COEFF: f64 = 10_000.0 / 6.0;
const LAP_DATA_BITS_LENGTH: usize = 416;
const LAP_PREAMBLE_MIN: usize = 250;
const LAP_PREAMBLE_MAX: usize = 290;
const LAP_GAP_BITS: usize = 24;

/// One time-indexed telemetry reading.
///
/// `lon`/`lat`/`distance`/`speed` are meaningless (left at `0.0`) for
/// sessions recorded without GPS; `distance` and `speed` are the
/// per-sample increment since the previous sample, not running totals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    pub hr: Option<i64>,
    pub lon: f64,
    pub lat: f64,
    pub distance: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HrType {
    FullWithPrefix,
    FullPrefixless,
    PosDelta,
    NegDelta,
}

impl HrType {
    fn from_prefix(prefix: &BitSlice<Msb0, u8>) -> Self {
        match (prefix[0], prefix[1]) {
            (false, true) => HrType::FullWithPrefix,
            (false, false) => HrType::FullPrefixless,
            (true, false) => HrType::PosDelta,
            (true, true) => HrType::NegDelta,
        }
    }

    fn is_full(self) -> bool {
        matches!(self, HrType::FullWithPrefix | HrType::FullPrefixless)
    }
}

fn round9(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}

/// Unsigned interpretation of a fractional-coordinate bit window.
fn coord_frac_unsigned(bits: &BitSlice<Msb0, u8>) -> f64 {
    round9((bits_to_u64(bits) as f64 * COORD_COEFF) / 1e9)
}

/// Signed (two's complement) interpretation used for the 12-bit delta.
fn coord_frac_delta(bits: &BitSlice<Msb0, u8>) -> f64 {
    round9((twos_complement_to_i64(bits) as f64 * COORD_COEFF) / 1e9)
}

fn format_coord(int_bits: &BitSlice<Msb0, u8>, frac_bits: &BitSlice<Msb0, u8>) -> f64 {
    bits_to_u64(int_bits) as f64 + coord_frac_unsigned(frac_bits)
}

/// `(type_offset, end)` bit positions for each HR variant: the value
/// itself lives in `window[type_offset..end]`.
///
/// The reference decoder also pads values shorter than 4 bits before
/// converting them; given these fixed widths (8, 11, or 4 bits) that pad
/// is never actually reached, so it's omitted here.
fn hr_width(val_type: HrType) -> (usize, usize) {
    match val_type {
        HrType::FullWithPrefix => (3, 11),
        HrType::FullPrefixless => (0, 11),
        HrType::PosDelta => (2, 6),
        HrType::NegDelta => (2, 6),
    }
}

fn decode_hr_window(window: &BitSlice<Msb0, u8>, val_type: HrType) -> i64 {
    let (type_offset, end) = hr_width(val_type);
    let val_bits = &window[type_offset..end];
    if val_type == HrType::NegDelta {
        twos_complement_to_i64(val_bits)
    } else {
        bits_to_u64(val_bits) as i64
    }
}

/// Decodes the prefix-coded HR window at the cursor without consuming
/// it. Returns the decoded value, the variant it matched (or `None` if
/// the channel is frozen and the sample carries no data), and the bit
/// width the caller should advance by.
fn process_hr_bits(
    cursor: &BitCursor,
    channels: &ChannelState,
) -> Result<(i64, Option<HrType>, usize), ParserError> {
    let prefix = cursor.require(2)?;
    let val_type = HrType::from_prefix(prefix);

    if channels.is_frozen(SampleField::Hr) && val_type != HrType::FullWithPrefix {
        return Ok((0, None, 1));
    }

    let (_, end) = hr_width(val_type);
    let window = cursor.require(end)?;
    let val = decode_hr_window(window, val_type);

    Ok((val, Some(val_type), end))
}

fn parse_hr(
    cursor: &mut BitCursor,
    channels: &mut ChannelState,
    prev_hr: i64,
) -> Result<i64, ParserError> {
    let (hr, val_type, offset) = process_hr_bits(cursor, channels)?;
    let is_full = val_type.map(HrType::is_full).unwrap_or(false);

    if is_full {
        channels.reset(SampleField::Hr);
    } else {
        channels.handle_delta(SampleField::Hr, hr);
    }

    cursor.advance(offset);
    Ok(if is_full { hr } else { prev_hr + hr })
}

/// Speed isn't surfaced on [`Sample`] (it's derived from consecutive
/// coordinates instead); this only needs to move the cursor and update
/// the freeze state correctly.
fn parse_speed(cursor: &mut BitCursor, channels: &mut ChannelState) -> Result<(), ParserError> {
    let field = SampleField::Speed;
    let mut offset = 7;
    let mut speed = bits_to_u64(cursor.require(7)?) as i64;

    if channels.is_frozen(field) {
        offset = 0;
        speed = 0;
    }

    let is_full = bits_eq(cursor.require(7)?, "1000000");
    if is_full {
        offset = 16;
        cursor.require(16)?;
        channels.reset(field);
    } else {
        channels.handle_delta(field, speed);
    }

    cursor.advance(offset);
    Ok(())
}

fn parse_distance(cursor: &mut BitCursor, channels: &mut ChannelState) -> Result<(), ParserError> {
    let field = SampleField::Distance;
    let mut offset = 7;
    let mut dist = bits_to_u64(cursor.require(7)?) as i64;

    if channels.is_frozen(field) {
        offset = 0;
        dist = 0;
    }

    let is_full = bits_eq(cursor.require(8)?, "10000000");
    if is_full {
        offset = 29;
        cursor.require(29)?;
        channels.reset(field);
    } else {
        channels.handle_delta(field, dist);
    }

    cursor.advance(offset);
    Ok(())
}

/// Parses one coordinate channel's 12-bit delta or (while frozen) its
/// 28-bit full-value candidate.
///
/// Quirk carried over from the reference decoder: when frozen, a
/// rejected full-value candidate (`full_value != prev`) still feeds the
/// 12-bit delta window peeked at the top of this function into the
/// zero-delta counter, even though the cursor never consumed those bits.
/// A long enough run of such rejections can silently unfreeze the
/// channel without the cursor ever advancing through real delta data.
fn parse_coord(
    cursor: &mut BitCursor,
    channels: &mut ChannelState,
    field: SampleField,
    prev: f64,
) -> Result<f64, ParserError> {
    let mut offset = 12;
    let raw = cursor.require(12)?;
    let mut value = coord_frac_delta(raw);
    let mut is_full = false;

    if channels.is_frozen(field) {
        offset = 0;
        value = 0.0;

        let window = cursor.require(28)?;
        let full_value = format_coord(&window[0..8], &window[8..28]);
        is_full = full_value.trunc() as i64 == prev.trunc() as i64;

        if is_full {
            offset = 28;
            value = full_value;
            channels.reset(field);
        }
    }

    if !is_full {
        channels.handle_delta(field, bits_to_u64(raw) as i64);
    }

    cursor.advance(offset);
    Ok(if is_full { value } else { round9(prev + value) })
}

fn parse_satellites(
    cursor: &mut BitCursor,
    channels: &mut ChannelState,
    prefixless_zero_sat: &mut bool,
) -> Result<(), ParserError> {
    let field = SampleField::Satellites;
    let mut offset = 4;

    let sat = cursor.require(4)?;
    let sat_value = bits_to_u64(sat);
    let sat_prefix_is_exit = bits_eq(&sat[0..3], "001");

    let prefixless_value = bits_to_u64(cursor.require(7)?) as i64;

    if *prefixless_zero_sat && sat_prefix_is_exit {
        offset = 7;
    }

    if channels.is_frozen(field) {
        // A prefixless full value can't represent more than 31 satellites;
        // anything above that is read back as ordinary 4-bit delta noise.
        offset = if prefixless_value > 31 { 0 } else { 7 };
        if sat_prefix_is_exit {
            channels.reset(field);
        }
    }

    *prefixless_zero_sat = prefixless_value == 0;
    if *prefixless_zero_sat {
        offset = 7;
    }

    let is_delta = offset == 4;
    if is_delta {
        channels.handle_delta(field, sat_value as i64);
    } else if !channels.is_frozen(field) {
        channels.reset(field);
    }

    cursor.advance(offset);
    Ok(())
}

fn coord_wrapped_byte(coord: f64) -> u8 {
    (coord.trunc() as i64) as u8
}

fn byte_bits(byte: u8) -> BitVec<Msb0, u8> {
    let mut bv = BitVec::new();
    bv.extend_from_bitslice(byte.view_bits::<Msb0>());
    bv
}

/// Heuristic scan for an opaque lap-boundary region: within the next 416
/// bits, the previous sample's longitude and latitude integer parts
/// (truncated and unsigned-wrapped to a byte) reappear 24 bits apart,
/// somewhere behind 250-290 bits of otherwise uninterpreted preamble.
fn has_lap_data(cursor: &BitCursor, prev_lon: f64, prev_lat: f64) -> bool {
    let window = cursor.peek(LAP_DATA_BITS_LENGTH);
    let lon_pattern = byte_bits(coord_wrapped_byte(prev_lon));
    let lat_pattern = byte_bits(coord_wrapped_byte(prev_lat));

    let max_start = LAP_PREAMBLE_MAX.min(window.len().saturating_sub(8));
    for start in LAP_PREAMBLE_MIN..=max_start {
        if window[start..start + 8] != lon_pattern {
            continue;
        }
        let lat_start = start + 8 + LAP_GAP_BITS;
        if lat_start + 8 > window.len() {
            continue;
        }
        if window[lat_start..lat_start + 8] == lat_pattern {
            return true;
        }
    }
    false
}

fn parse_first_coords(data: &BitSlice<Msb0, u8>) -> (f64, f64) {
    let int_part_len = 8;
    let lat_end = data.len();
    let lon_end = lat_end / 2;

    let lon_int = &data[0..int_part_len];
    let lon_frac = &data[int_part_len..lon_end];
    let lat_int = &data[lon_end..lon_end + int_part_len];
    let lat_frac = &data[lon_end + int_part_len..lat_end];

    (format_coord(lon_int, lon_frac), format_coord(lat_int, lat_frac))
}

/// Bootstraps the first sample: unlike every later sample, this one reads
/// absolute coordinates (not deltas) and never touches the freeze
/// counters -- there is nothing yet to freeze relative to.
pub(crate) fn parse_first_sample(
    cursor: &mut BitCursor,
    params: SampleStreamParams,
    channels: &ChannelState,
) -> Result<Sample, ParserError> {
    if params.has_gps {
        // The purpose of these leading 22 bits is unknown.
        cursor.set_pos(22);
    }

    let hr = if params.has_hr {
        let (hr, _, offset) = process_hr_bits(cursor, channels)?;
        cursor.advance(offset);
        Some(hr)
    } else {
        None
    };

    if !params.has_gps {
        return Ok(Sample {
            hr,
            lon: 0.0,
            lat: 0.0,
            distance: 0.0,
            speed: 0.0,
        });
    }

    // Speed (16 bits) and distance (29 bits) aren't captured for the
    // first sample, only skipped over.
    cursor.advance(45);

    let coords_start = cursor.pos();
    let coords_end = coords_start + 56;
    let (lon, lat) = parse_first_coords(cursor.require(56)?);
    cursor.set_pos(coords_end);

    // Number of satellites used (7 bits) -- not captured.
    cursor.advance(7);
    // Purpose of these 23 bits is unknown.
    cursor.advance(23);

    Ok(Sample {
        hr,
        lon,
        lat,
        distance: 0.0,
        speed: 0.0,
    })
}

/// Walks the reconstructed sample bitstream end to end, producing every
/// [`Sample`] plus the session's total distance and peak instantaneous
/// speed (both derived from consecutive great-circle coordinate deltas,
/// never from the raw speed/distance channels).
pub fn decode_samples(
    params: SampleStreamParams,
    mut cursor: BitCursor,
) -> Result<(Vec<Sample>, f64, f64), ParserError> {
    let mut channels = ChannelState::new();
    let mut prefixless_zero_sat = false;
    let mut samples = vec![parse_first_sample(&mut cursor, params, &channels)?];
    let mut total_distance = 0.0_f64;
    let mut max_speed = 0.0_f64;

    while cursor.pos() < cursor.len() && cursor.peek(7).len() > 5 {
        let prev_hr = samples.last().and_then(|s| s.hr).unwrap_or(0);
        let hr = if params.has_hr {
            Some(parse_hr(&mut cursor, &mut channels, prev_hr)?)
        } else {
            None
        };

        if !params.has_gps {
            samples.push(Sample {
                hr,
                lon: 0.0,
                lat: 0.0,
                distance: 0.0,
                speed: 0.0,
            });
            continue;
        }

        parse_speed(&mut cursor, &mut channels)?;
        parse_distance(&mut cursor, &mut channels)?;

        let prev = *samples.last().expect("first sample always present");
        let lon = parse_coord(&mut cursor, &mut channels, SampleField::Lon, prev.lon)?;
        let lat = parse_coord(&mut cursor, &mut channels, SampleField::Lat, prev.lat)?;

        if has_lap_data(&cursor, prev.lon, prev.lat) {
            let sat_after_lap = cursor.require(9)?.not_any();
            if !sat_after_lap {
                parse_satellites(&mut cursor, &mut channels, &mut prefixless_zero_sat)?;
            }
            cursor.advance(LAP_DATA_BITS_LENGTH);
            if sat_after_lap {
                parse_satellites(&mut cursor, &mut channels, &mut prefixless_zero_sat)?;
            }
        } else {
            parse_satellites(&mut cursor, &mut channels, &mut prefixless_zero_sat)?;
        }

        // Purpose of these 10 trailing bits is unknown.
        cursor.advance(10);

        let distance = great_circle_distance_m((prev.lat, prev.lon), (lat, lon));
        total_distance += distance;

        let speed = distance / params.sample_rate_seconds as f64;
        if speed > max_speed {
            max_speed = speed;
        }

        samples.push(Sample {
            hr,
            lon,
            lat,
            distance,
            speed,
        });
    }

    Ok((samples, total_distance, max_speed))
}
