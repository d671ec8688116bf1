//! End-to-end decode tests driven entirely through the crate's public API:
//! raw packet bytes in, [`SessionMetadata`]/[`Sample`]s out. Complements the
//! unit tests living next to each decoder submodule, which exercise one
//! bit-field rule at a time.

use polar_rcx5_datalink::geo::great_circle_distance_m;
use polar_rcx5_datalink::{decode_metadata, decode_samples, RawSession};

fn bits_from(pattern: &str) -> Vec<bool> {
    pattern.chars().map(|c| c == '1').collect()
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    assert_eq!(bits.len() % 8, 0, "bit payload must be byte-aligned");
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | (b as u8)))
        .collect()
}

fn header_byte(offset: usize, value: u8, header: &mut [u8]) {
    header[offset] = value;
}

/// Single-packet GPS session: one bootstrap sample at `(lon=39, lat=54)`
/// followed by one delta sample, with HR disabled to keep the payload
/// small. Mirrors testable-property scenario 2: the session's first
/// sample has zero distance/speed, and the second sample's distance
/// matches a standalone great-circle computation over the same two
/// coordinate pairs.
#[test]
fn gps_session_first_two_samples_match_great_circle_distance() {
    const SAMPLES_START_BYTE: usize = 349;

    let mut header = vec![0u8; SAMPLES_START_BYTE];
    header_byte(44, 104, &mut header); // year 1920 + 104 = 2024
    header_byte(43, 6, &mut header); // month
    header_byte(42, 15, &mut header); // day
    header_byte(41, 0x09, &mut header); // hour, BCD
    header_byte(40, 0x30, &mut header); // minute, BCD
    header_byte(39, 0x00, &mut header); // second, BCD
    header_byte(165, 0, &mut header); // has_hr = false
    header_byte(166, 1, &mut header); // has_gps = true
    header_byte(167, 0, &mut header); // sample rate index -> 1 second

    let mut bits = Vec::new();
    bits.extend(bits_from(&"0".repeat(22))); // leading bits, purpose unknown
    bits.extend(bits_from(&"0".repeat(45))); // first sample's speed/distance, skipped
    bits.extend(bits_from("00100111")); // lon int = 39
    bits.extend(bits_from(&"0".repeat(20))); // lon frac = 0
    bits.extend(bits_from("00110110")); // lat int = 54
    bits.extend(bits_from(&"0".repeat(20))); // lat frac = 0
    bits.extend(bits_from(&"0".repeat(7))); // satellite count, not captured for first sample
    bits.extend(bits_from(&"0".repeat(23))); // trailing bits, purpose unknown
    // second sample
    bits.extend(bits_from(&"0".repeat(7))); // speed delta = 0, not a full value
    bits.extend(bits_from(&"0".repeat(7))); // distance delta = 0, not a full value
    bits.extend(bits_from("000001100100")); // lon delta = +100 (12-bit two's complement)
    bits.extend(bits_from("000001100100")); // lat delta = +100
    bits.extend(bits_from(&"0".repeat(7))); // satellite nibble + prefixless window, both zero
    bits.extend(bits_from("1111111111")); // trailing bits, purpose unknown; kept nonzero so
                                           // the packet's trailing-zero strip doesn't eat the
                                           // real payload above

    let mut packet = header;
    packet.extend(bits_to_bytes(&bits));

    let raw = RawSession::new(vec![packet]);
    let metadata = decode_metadata(&raw).expect("metadata decodes");
    assert!(metadata.has_gps);
    assert!(!metadata.has_hr);

    let samples = decode_samples(&metadata, &raw).expect("samples decode");
    assert_eq!(samples.len(), 2);

    let first = samples[0];
    assert_eq!((first.lon, first.lat), (39.0, 54.0));
    assert_eq!(first.distance, 0.0);
    assert_eq!(first.speed, 0.0);

    let second = samples[1];
    let expected = great_circle_distance_m((first.lat, first.lon), (second.lat, second.lon));
    assert!(
        (second.distance - expected).abs() < 0.5,
        "distance {} should match standalone great-circle computation {}",
        second.distance,
        expected
    );
}

/// GPS session where the longitude channel freezes after two zero
/// deltas, then resumes from a "full" 28-bit candidate whose integer
/// part matches the previous sample's longitude. Mirrors testable-
/// property scenario 3: the frozen read advances the cursor by 28 bits
/// (not the usual 12) and the delta immediately after still decodes
/// correctly.
#[test]
fn frozen_longitude_resumes_after_full_value_candidate() {
    const SAMPLES_START_BYTE: usize = 349;

    let mut header = vec![0u8; SAMPLES_START_BYTE];
    header_byte(44, 104, &mut header);
    header_byte(43, 6, &mut header);
    header_byte(42, 15, &mut header);
    header_byte(41, 0x09, &mut header);
    header_byte(40, 0x30, &mut header);
    header_byte(39, 0x00, &mut header);
    header_byte(165, 0, &mut header); // has_hr = false
    header_byte(166, 1, &mut header); // has_gps = true
    header_byte(167, 0, &mut header); // sample rate index -> 1 second

    let lat_delta = "000001100100"; // +100 (12-bit two's complement), keeps lat unfrozen
    let zero_delta = "000000000000";
    let skip_sample_tail = || {
        let mut v = Vec::new();
        v.extend(bits_from(&"0".repeat(7))); // satellite count, not captured
        v.extend(bits_from(&"0".repeat(10))); // trailing bits, purpose unknown
        v
    };

    let mut bits = Vec::new();
    // bootstrap sample: lon=39.xxxx, lat=54.xxxx
    bits.extend(bits_from(&"0".repeat(22)));
    bits.extend(bits_from(&"0".repeat(45)));
    bits.extend(bits_from("00100111")); // lon int = 39
    bits.extend(bits_from(&"0".repeat(20)));
    bits.extend(bits_from("00110110")); // lat int = 54
    bits.extend(bits_from(&"0".repeat(20)));
    bits.extend(bits_from(&"0".repeat(7)));
    bits.extend(bits_from(&"0".repeat(23)));

    // two consecutive zero lon deltas: freezes the lon channel after the
    // second one (the freeze itself takes effect on the *next* sample)
    for _ in 0..2 {
        bits.extend(bits_from(&"0".repeat(7))); // speed delta = 0
        bits.extend(bits_from(&"0".repeat(7))); // distance delta = 0
        bits.extend(bits_from(zero_delta)); // lon delta = 0
        bits.extend(bits_from(lat_delta)); // lat delta = +100
        bits.extend(skip_sample_tail());
    }

    // lon channel is now frozen: the 12-bit slot instead reads a 28-bit
    // full-value candidate (8-bit int + 20-bit frac); its integer part
    // (39) matches the previous sample's truncated longitude, so it's
    // accepted and the channel unfreezes.
    bits.extend(bits_from(&"0".repeat(7))); // speed delta = 0
    bits.extend(bits_from(&"0".repeat(7))); // distance delta = 0
    bits.extend(bits_from("00100111")); // full-value candidate int = 39
    bits.extend(bits_from(&"0".repeat(20))); // full-value candidate frac = 0
    bits.extend(bits_from(lat_delta));
    bits.extend(skip_sample_tail());

    // one more delta sample: proves the cursor landed back on the normal
    // 12-bit lon delta layout, not off by the 16-bit difference between
    // a delta read and the full-value candidate it replaced.
    bits.extend(bits_from(&"0".repeat(7)));
    bits.extend(bits_from(&"0".repeat(7)));
    bits.extend(bits_from(lat_delta)); // lon delta = +100
    bits.extend(bits_from(lat_delta));
    bits.extend(bits_from(&"0".repeat(7)));
    bits.extend(bits_from("1111111111")); // trailing bits, kept nonzero so the
                                           // packet's trailing-zero strip
                                           // doesn't eat real payload

    bits.extend(bits_from("111")); // pad up to a byte boundary, kept nonzero

    let mut packet = header;
    packet.extend(bits_to_bytes(&bits));

    let raw = RawSession::new(vec![packet]);
    let metadata = decode_metadata(&raw).expect("metadata decodes");
    let samples = decode_samples(&metadata, &raw).expect("samples decode");

    assert_eq!(samples.len(), 5);
    assert_eq!(samples[1].lon, 39.0);
    assert_eq!(samples[2].lon, 39.0);
    assert_eq!(samples[3].lon, 39.0, "accepted full-value candidate must read back exactly 39.0");
    assert!(
        samples[4].lon > samples[3].lon,
        "the delta right after the frozen read must resume decoding normally"
    );
}

/// GPS session whose second sample embeds a lap-boundary preamble: the
/// previous sample's wrapped longitude/latitude bytes reappear 24 bits
/// apart inside the next 416 bits. Mirrors testable-property scenario 4:
/// the cursor skips the whole 416-bit region and still decodes the
/// satellites field and the sample that follows.
#[test]
fn lap_segment_is_skipped_and_sample_still_decodes() {
    const SAMPLES_START_BYTE: usize = 349;

    let mut header = vec![0u8; SAMPLES_START_BYTE];
    header_byte(44, 104, &mut header);
    header_byte(43, 6, &mut header);
    header_byte(42, 15, &mut header);
    header_byte(41, 0x09, &mut header);
    header_byte(40, 0x30, &mut header);
    header_byte(39, 0x00, &mut header);
    header_byte(165, 0, &mut header); // has_hr = false
    header_byte(166, 1, &mut header); // has_gps = true
    header_byte(167, 0, &mut header); // sample rate index -> 1 second

    let mut bits = Vec::new();
    // bootstrap sample: lon=39.xxxx, lat=54.xxxx
    bits.extend(bits_from(&"0".repeat(22)));
    bits.extend(bits_from(&"0".repeat(45)));
    bits.extend(bits_from("00100111")); // lon int = 39
    bits.extend(bits_from(&"0".repeat(20)));
    bits.extend(bits_from("00110110")); // lat int = 54
    bits.extend(bits_from(&"0".repeat(20)));
    bits.extend(bits_from(&"0".repeat(7)));
    bits.extend(bits_from(&"0".repeat(23)));

    // second sample: zero lon/lat deltas (leaves prev coords at 39/54,
    // the bytes the lap preamble below needs to reproduce)
    bits.extend(bits_from(&"0".repeat(7))); // speed delta = 0
    bits.extend(bits_from(&"0".repeat(7))); // distance delta = 0
    bits.extend(bits_from(&"0".repeat(12))); // lon delta = 0
    bits.extend(bits_from(&"0".repeat(12))); // lat delta = 0

    // 416-bit lap region: 9 leading zero bits (so satellites are parsed
    // *after* this region, not before), the previous sample's wrapped
    // longitude byte (39) at bit 260, a 24-bit gap, then the wrapped
    // latitude byte (54) at bit 292 -- all within the detector's
    // 250..=290 search window -- followed by filler out to 416 bits.
    bits.extend(bits_from(&"0".repeat(9)));
    bits.extend(bits_from(&"0".repeat(251))); // 9 + 251 = 260
    bits.extend(bits_from("00100111")); // wrapped lon byte = 39
    bits.extend(bits_from(&"0".repeat(24)));
    bits.extend(bits_from("00110110")); // wrapped lat byte = 54
    bits.extend(bits_from(&"0".repeat(116))); // 260+8+24+8+116 = 416

    bits.extend(bits_from(&"0".repeat(7))); // satellite count, read after the lap region
    bits.extend(bits_from("1111111111")); // trailing bits, kept nonzero

    let mut packet = header;
    packet.extend(bits_to_bytes(&bits));

    let raw = RawSession::new(vec![packet]);
    let metadata = decode_metadata(&raw).expect("metadata decodes");
    let samples = decode_samples(&metadata, &raw).expect("samples decode");

    assert_eq!(samples.len(), 2);
    assert_eq!((samples[1].lon, samples[1].lat), (39.0, 54.0));
    assert_eq!(samples[1].distance, 0.0);
}

/// HR-only (no GPS) session with sample rate index 3 (15 seconds); a
/// bootstrap full-value sample followed by 239 non-freezing positive
/// deltas produces exactly 240 samples, matching a one-hour session at
/// 15-second spacing. Mirrors testable-property scenario 5.
#[test]
fn quarter_minute_sample_rate_yields_240_samples_per_hour() {
    const SAMPLES_START_BYTE: usize = 351;
    const DELTA_COUNT: usize = 239;

    let mut header = vec![0u8; SAMPLES_START_BYTE];
    header_byte(44, 104, &mut header);
    header_byte(43, 6, &mut header);
    header_byte(42, 15, &mut header);
    header_byte(41, 0x09, &mut header);
    header_byte(40, 0x30, &mut header);
    header_byte(39, 0x00, &mut header);
    header_byte(38, 0x01, &mut header); // 1 hour duration
    header_byte(37, 0x00, &mut header);
    header_byte(36, 0x00, &mut header);
    header_byte(35, 0x00, &mut header);
    header_byte(165, 1, &mut header); // has_hr = true
    header_byte(166, 0, &mut header); // has_gps = false
    header_byte(167, 3, &mut header); // sample rate index -> 15 seconds

    let mut bits = Vec::new();
    bits.extend(bits_from(&format!("{:011b}", 142))); // bootstrap: "00" prefix, full 11-bit value
    for _ in 0..DELTA_COUNT {
        bits.extend(bits_from("100001")); // "10" prefix (positive delta), value +1
    }
    bits.extend(bits_from("111")); // padding up to a byte boundary, kept nonzero for the
                                    // same trailing-zero-strip reason as above

    let mut packet = header;
    packet.extend(bits_to_bytes(&bits));

    let raw = RawSession::new(vec![packet]);
    let metadata = decode_metadata(&raw).expect("metadata decodes");
    assert_eq!(metadata.sample_rate_seconds, 15);
    assert_eq!(metadata.duration_secs, 3600);

    let samples = decode_samples(&metadata, &raw).expect("samples decode");
    assert_eq!(samples.len(), 3600 / 15);

    let hrs: Vec<i64> = samples.iter().map(|s| s.hr.unwrap()).collect();
    assert_eq!(hrs[0], 142);
    assert_eq!(hrs[1], 143);
    assert_eq!(*hrs.last().unwrap(), 142 + DELTA_COUNT as i64);
}
