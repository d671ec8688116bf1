use chrono::naive::NaiveDate;
use chrono::NaiveDateTime;

use crate::bitutils::bcd_to_int;

use super::error::ParserError;

/// Fixed-offset fields read directly out of the first raw packet's header,
/// independent of the per-sample bitstream that follows it.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub user_hr_max: u8,
    pub user_hr_rest: u8,
    pub user_hr_min: u8,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub duration_hours: u32,
    pub duration_minutes: u32,
    pub duration_seconds: u32,
    pub duration_tenths: u32,
    pub hr_max: u8,
    pub hr_min: u8,
    pub hr_avg: u8,
    pub has_hr: bool,
    pub has_gps: bool,
    /// Seconds between consecutive samples (1, 2, 5, 15, or 60).
    pub sample_rate: u32,
}

const SAMPLE_RATES: [u32; 5] = [1, 2, 5, 15, 60];

impl SessionInfo {
    /// Extracts header fields from the first packet's raw bytes. The byte
    /// offsets below are fixed, device-firmware-defined positions into
    /// that packet, not part of the per-sample bitstream.
    pub fn from_first_packet(packet: &[u8]) -> Result<Self, ParserError> {
        let byte = |offset: usize| -> Result<u8, ParserError> {
            packet.get(offset).copied().ok_or(ParserError::Invariant {
                field: "header",
                detail: format!("first packet too short for header byte {offset}"),
            })
        };

        let sample_rate_index = byte(167)? as usize;
        let sample_rate = *SAMPLE_RATES.get(sample_rate_index).ok_or_else(|| {
            ParserError::Invariant {
                field: "sample_rate",
                detail: format!("unknown sample rate index {sample_rate_index}"),
            }
        })?;

        Ok(SessionInfo {
            user_hr_max: byte(219)?,
            user_hr_rest: byte(54)?,
            user_hr_min: byte(50)?,
            year: byte(44)? as i32 + 1920,
            month: byte(43)? as u32,
            day: byte(42)? as u32,
            hour: bcd_to_int(byte(41)?),
            minute: bcd_to_int(byte(40)?),
            second: bcd_to_int(byte(39)?),
            duration_hours: bcd_to_int(byte(38)?),
            duration_minutes: bcd_to_int(byte(37)?),
            duration_seconds: bcd_to_int(byte(36)?),
            duration_tenths: bcd_to_int(byte(35)?),
            hr_max: byte(205)?,
            hr_min: byte(203)?,
            hr_avg: byte(201)?,
            has_hr: byte(165)? != 0,
            has_gps: byte(166)? != 0,
            sample_rate,
        })
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_hours * 3600 + self.duration_minutes * 60 + self.duration_seconds
    }

    pub fn start_time(&self) -> Result<NaiveDateTime, ParserError> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, self.second))
            .ok_or(ParserError::Invariant {
                field: "start_time",
                detail: format!(
                    "invalid calendar date/time {}-{}-{} {}:{}:{}",
                    self.year, self.month, self.day, self.hour, self.minute, self.second
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with(fields: &[(usize, u8)]) -> Vec<u8> {
        let mut packet = vec![0u8; 512];
        for &(offset, value) in fields {
            packet[offset] = value;
        }
        packet
    }

    #[test]
    fn extracts_header_fields() {
        let packet = packet_with(&[
            (44, 104), // 1920 + 104 = 2024
            (43, 6),
            (42, 15),
            (41, 0x09), // bcd 09
            (40, 0x30), // bcd 30
            (39, 0x00),
            (165, 1),
            (166, 1),
            (167, 2), // -> 5 second sample rate
        ]);

        let info = SessionInfo::from_first_packet(&packet).unwrap();
        assert_eq!(info.year, 2024);
        assert_eq!(info.month, 6);
        assert_eq!(info.day, 15);
        assert_eq!(info.hour, 9);
        assert_eq!(info.minute, 30);
        assert!(info.has_hr);
        assert!(info.has_gps);
        assert_eq!(info.sample_rate, 5);
    }

    #[test]
    fn rejects_short_packet() {
        let packet = vec![0u8; 10];
        assert!(SessionInfo::from_first_packet(&packet).is_err());
    }
}
