//! # GNSS-NG Module
//!
//! Frame header parsing and capture-time inference for GNSS-NG navigation
//! blobs.
//!
//! A NAV frame carries ten 30-bit GPS subframe words. The Z-count in the
//! hand-over word fixes the capture within a 1.5 s tick, but the 17-bit counter
//! rolls over several times a week. The uplink reception time breaks that
//! ambiguity.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use thiserror::Error;
use tracing::debug;

/// Bytes holding the ten subframe words
pub const NAV_MIN_BYTES: usize = 38;

/// GPS-UTC offset at the time of writing
pub const DEFAULT_LEAP_SECONDS: i64 = 18;

/// Oldest capture still attributed to an uplink, in seconds
pub const DEFAULT_MAX_CAPTURE_AGE_SECS: i64 = 30 * 60;

const WORD_BITS: usize = 30;
const WORDS: usize = 10;
const HOW_WORD: usize = 1;
const ZCOUNT_SHIFT: u32 = 13;
const ZCOUNT_MASK: u32 = 0x1_ffff;
const ZCOUNT_TICK_MS: i64 = 1500;
const ZCOUNT_ROLLOVER_MS: i64 = (ZCOUNT_MASK as i64 + 1) * ZCOUNT_TICK_MS;
const TLV_TYPE: u8 = 0x01;
const END_OF_GROUP: u8 = 0x80;
const GROUP_TOKEN_MASK: u8 = 0x1f;

#[derive(Debug, Error)]
pub enum GnssNgError {
    #[error("header byte missing")]
    HeaderByteMissing,

    #[error("need at least {need} bytes for NAV, got {got}")]
    NeedAtLeastNBytesForNav { need: usize, got: usize },

    #[error("z-count decode failed: {0}")]
    ZCountDecodeFailed(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("no captures")]
    NoCaptures,
}

/// First byte of a GNSS-NG frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssNgHeader {
    /// Last frame of a navigation group
    pub end_of_group: bool,
    /// Identifies the frames of one fix
    pub group_token: u8,
}

impl GnssNgHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, GnssNgError> {
        let byte = *bytes.first().ok_or(GnssNgError::HeaderByteMissing)?;
        Ok(Self {
            end_of_group: byte & END_OF_GROUP != 0,
            group_token: byte & GROUP_TOKEN_MASK,
        })
    }

    pub fn from_hex(payload: &str) -> Result<Self, GnssNgError> {
        Self::parse(&hex::decode(payload)?)
    }
}

/// NAV bytes, unwrapped from a `type(1) len(1) value` envelope when present
fn nav_bytes(bytes: &[u8]) -> Result<&[u8], GnssNgError> {
    match bytes {
        [] => Err(GnssNgError::HeaderByteMissing),
        [TLV_TYPE, rest @ ..] => {
            let (&len, value) = rest
                .split_first()
                .ok_or_else(|| GnssNgError::ZCountDecodeFailed("TLV length missing".to_string()))?;
            value.get(..usize::from(len)).ok_or_else(|| {
                GnssNgError::ZCountDecodeFailed(format!(
                    "TLV declares {} bytes but {} follow",
                    len,
                    value.len()
                ))
            })
        }
        _ => Ok(bytes),
    }
}

/// Ten MSB-first 30-bit words
fn subframe_words(nav: &[u8]) -> Result<[u32; WORDS], GnssNgError> {
    if nav.len() < NAV_MIN_BYTES {
        return Err(GnssNgError::NeedAtLeastNBytesForNav {
            need: NAV_MIN_BYTES,
            got: nav.len(),
        });
    }

    let mut words = [0u32; WORDS];
    for (i, word) in words.iter_mut().enumerate() {
        for bit in 0..WORD_BITS {
            let index = i * WORD_BITS + bit;
            let set = (nav[index / 8] >> (7 - index % 8)) & 1;
            *word = (*word << 1) | u32::from(set);
        }
    }
    Ok(words)
}

/// Z-count of a NAV payload
pub fn zcount(bytes: &[u8]) -> Result<u32, GnssNgError> {
    let words = subframe_words(nav_bytes(bytes)?)?;
    Ok((words[HOW_WORD] >> ZCOUNT_SHIFT) & ZCOUNT_MASK)
}

/// One received NAV frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl Capture {
    pub fn new(payload: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            received_at,
        }
    }
}

/// Infers the UTC capture instant of a navigation group
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimeSolver {
    leap_seconds: i64,
    max_age: Duration,
}

impl Default for CaptureTimeSolver {
    fn default() -> Self {
        Self::new(DEFAULT_LEAP_SECONDS, Duration::seconds(DEFAULT_MAX_CAPTURE_AGE_SECS))
    }
}

impl CaptureTimeSolver {
    pub fn new(leap_seconds: i64, max_age: Duration) -> Self {
        Self { leap_seconds, max_age }
    }

    pub fn leap_seconds(&self) -> i64 {
        self.leap_seconds
    }

    /// Most probable capture instant across `captures`
    ///
    /// Captures whose payload cannot be decoded are skipped. When no candidate
    /// falls within the accepted age, the reception time of the last capture
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GnssNgError::NoCaptures`] for an empty input and the first
    /// decode error when no capture could be decoded at all.
    pub fn solve(&self, captures: &[Capture]) -> Result<DateTime<Utc>, GnssNgError> {
        let last = captures.last().ok_or(GnssNgError::NoCaptures)?;

        let mut first_error = None;
        let mut decoded = 0;
        let mut best: Option<(Duration, DateTime<Utc>)> = None;

        for capture in captures {
            let z = match hex::decode(&capture.payload)
                .map_err(GnssNgError::from)
                .and_then(|bytes| zcount(&bytes))
            {
                Ok(z) => z,
                Err(e) => {
                    debug!("Skipping undecodable capture received at {}: {}", capture.received_at, e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            decoded += 1;

            if let Some(candidate) = self.candidate(z, capture.received_at) {
                let age = capture.received_at - candidate;
                if best.map_or(true, |(best_age, _)| age < best_age) {
                    best = Some((age, candidate));
                }
            }
        }

        if decoded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        Ok(match best {
            Some((_, at)) => at,
            None => {
                debug!("No capture candidate within {}, using reception time", self.max_age);
                last.received_at
            }
        })
    }

    /// Youngest instant matching `zcount` that is at most `max_age` older
    /// than `received_at`
    ///
    /// Rollover cycles `-3..=3` are tried in the GPS week of reception and in
    /// both neighbouring weeks, so a capture just before the week boundary is
    /// found from a reception just after it.
    pub fn candidate(&self, zcount: u32, received_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let leap = Duration::seconds(self.leap_seconds);
        let gps_received = received_at + leap;
        let week_start = gps_week_start(gps_received);
        let tow = Duration::milliseconds(i64::from(zcount) * ZCOUNT_TICK_MS);

        (-1..=1)
            .flat_map(|week| (-3..=3).map(move |n| (week, n)))
            .filter_map(|(week, n)| {
                let gps = week_start + Duration::weeks(week) + tow + Duration::milliseconds(n * ZCOUNT_ROLLOVER_MS);
                let utc = gps - leap;
                let age = received_at - utc;
                (age >= Duration::zero() && age <= self.max_age).then_some((age, utc))
            })
            .min_by_key(|(age, _)| *age)
            .map(|(_, utc)| utc)
    }
}

/// Sunday 00:00 on or before `gps`, on the GPS time scale
fn gps_week_start(gps: DateTime<Utc>) -> DateTime<Utc> {
    let date = gps.date_naive() - Duration::days(i64::from(gps.weekday().num_days_from_sunday()));
    date.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    /// 38 zero bytes with `z` placed in the hand-over word
    fn nav_with_zcount(z: u32) -> String {
        let mut bytes = [0u8; NAV_MIN_BYTES];
        let how = z << ZCOUNT_SHIFT;
        for bit in 0..WORD_BITS {
            if (how >> (WORD_BITS - 1 - bit)) & 1 == 1 {
                let index = HOW_WORD * WORD_BITS + bit;
                bytes[index / 8] |= 1 << (7 - index % 8);
            }
        }
        hex::encode(bytes)
    }

    #[test]
    fn test_header_bits() {
        let header = GnssNgHeader::from_hex("8a00").unwrap();
        assert!(header.end_of_group);
        assert_eq!(header.group_token, 0x0a);

        let header = GnssNgHeader::parse(&[0x13]).unwrap();
        assert!(!header.end_of_group);
        assert_eq!(header.group_token, 0x13);

        assert!(matches!(GnssNgHeader::parse(&[]), Err(GnssNgError::HeaderByteMissing)));
    }

    #[test]
    fn test_zcount_from_how_word() {
        let payload = "00000002a0100000000000000000000000000000000000000000000000000000000000000000";
        assert_eq!(nav_with_zcount(86024), payload);
        assert_eq!(zcount(&hex::decode(payload).unwrap()).unwrap(), 86024);
    }

    #[test]
    fn test_zcount_inside_tlv_envelope() {
        let nav = nav_with_zcount(49668);
        let wrapped = format!("0126{nav}");
        assert_eq!(zcount(&hex::decode(wrapped).unwrap()).unwrap(), 49668);
    }

    #[test]
    fn test_truncated_envelope() {
        let err = zcount(&[0x01, 0x26, 0x00]).unwrap_err();
        assert!(matches!(err, GnssNgError::ZCountDecodeFailed(_)));
    }

    #[test]
    fn test_short_nav_frame() {
        let err = zcount(&[0x00; 20]).unwrap_err();
        assert!(matches!(err, GnssNgError::NeedAtLeastNBytesForNav { need: 38, got: 20 }));
    }

    #[test]
    fn test_capture_ten_minutes_before_reception() {
        let solver = CaptureTimeSolver::default();
        let captures = [Capture::new(nav_with_zcount(86024), at("2024-08-05T12:00:18Z"))];
        assert_eq!(solver.solve(&captures).unwrap(), at("2024-08-05T11:50:18Z"));
    }

    #[test]
    fn test_capture_in_later_rollover_cycle() {
        let solver = CaptureTimeSolver::default();
        let captures = [Capture::new(nav_with_zcount(49668), at("2024-08-09T10:00:00Z"))];
        assert_eq!(solver.solve(&captures).unwrap(), at("2024-08-09T09:55:00Z"));
    }

    #[test]
    fn test_capture_across_week_boundary() {
        let solver = CaptureTimeSolver::default();
        let captures = [Capture::new(nav_with_zcount(9796), at("2024-08-04T00:05:00Z"))];
        assert_eq!(solver.solve(&captures).unwrap(), at("2024-08-03T23:55:00Z"));
    }

    #[test]
    fn test_youngest_capture_wins() {
        let solver = CaptureTimeSolver::default();
        let captures = [
            Capture::new(nav_with_zcount(86024), at("2024-08-05T12:00:18Z")),
            Capture::new("zz", at("2024-08-05T12:00:30Z")),
            Capture::new(nav_with_zcount(49668), at("2024-08-09T10:00:00Z")),
        ];
        assert_eq!(solver.solve(&captures).unwrap(), at("2024-08-09T09:55:00Z"));
    }

    #[test]
    fn test_falls_back_to_last_reception() {
        let solver = CaptureTimeSolver::new(DEFAULT_LEAP_SECONDS, Duration::minutes(1));
        let captures = [Capture::new(nav_with_zcount(86024), at("2024-08-05T12:00:18Z"))];
        assert_eq!(solver.solve(&captures).unwrap(), at("2024-08-05T12:00:18Z"));
    }

    #[test]
    fn test_all_captures_undecodable() {
        let solver = CaptureTimeSolver::default();
        let captures = [Capture::new("00", at("2024-08-05T12:00:18Z"))];
        assert!(matches!(
            solver.solve(&captures),
            Err(GnssNgError::NeedAtLeastNBytesForNav { .. })
        ));
        assert!(matches!(solver.solve(&[]), Err(GnssNgError::NoCaptures)));
    }

    #[test]
    fn test_week_start_is_sunday_midnight() {
        assert_eq!(gps_week_start(at("2024-08-05T12:00:36Z")), at("2024-08-04T00:00:00Z"));
        assert_eq!(gps_week_start(at("2024-08-04T00:00:00Z")), at("2024-08-04T00:00:00Z"));
    }
}
