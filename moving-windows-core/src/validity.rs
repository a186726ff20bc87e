use chrono::{Local, TimeZone};
use moving_windows_common::{MovingWindowsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const VALID_FROM_HEADER: &str = "Valid-From";
pub const VALID_UNTIL_HEADER: &str = "Valid-Until";

/// `[from, until]` in epoch millis over which one stored object is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub from: i64,
    pub until: i64,
}

impl ValidityInterval {
    pub fn new(from: i64, until: i64) -> Result<Self> {
        if from >= until {
            return Err(MovingWindowsError::Other(format!(
                "validity interval must satisfy from < until, got {from}..{until}"
            )));
        }
        Ok(Self { from, until })
    }

    pub fn duration_ms(&self) -> i64 {
        self.until - self.from
    }

    /// whole seconds, truncated
    pub fn duration_secs(&self) -> i64 {
        self.duration_ms() / 1000
    }

    pub fn overlaps(&self, other: &ValidityInterval) -> bool {
        self.from <= other.until && other.from <= self.until
    }

    /// `"<from>_<until>"`, the artifact entry name
    pub fn encode(&self) -> String {
        format!("{}_{}", self.from, self.until)
    }

    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || MovingWindowsError::InvalidArtifactName(name.to_owned());
        let (from, until) = name.split_once('_').ok_or_else(invalid)?;
        let from: i64 = from.parse().map_err(|_| invalid())?;
        let until: i64 = until.parse().map_err(|_| invalid())?;
        Self::new(from, until).map_err(|_| invalid())
    }

    /// read `Valid-From` / `Valid-Until` from object headers (names matched case-insensitively)
    pub fn from_headers(headers: &HashMap<String, String>, key: &str, timestamp: i64) -> Result<Self> {
        let malformed = |detail: String| MovingWindowsError::MalformedHeader {
            key: key.to_owned(),
            timestamp,
            detail,
        };
        let lookup = |name: &str| -> Result<i64> {
            let raw = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.trim())
                .ok_or_else(|| malformed(format!("{name} header missing")))?;
            raw.parse::<i64>()
                .map_err(|_| malformed(format!("{name} header not an integer: {raw:?}")))
        };
        let from = lookup(VALID_FROM_HEADER)?;
        let until = lookup(VALID_UNTIL_HEADER)?;
        if from >= until {
            return Err(malformed(format!("empty validity {from}..{until}")));
        }
        Ok(Self { from, until })
    }
}

impl fmt::Display for ValidityInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_timestamp(self.from, true), format_timestamp(self.until, true))
    }
}

/// local-time rendering of epoch millis: `MM/DD/YYYY HH:MM:SS`, or `HH:MM:SS` when `hours_only`
pub fn format_timestamp(ts_ms: i64, hours_only: bool) -> String {
    let fmt = if hours_only { "%H:%M:%S" } else { "%m/%d/%Y %H:%M:%S" };
    match Local.timestamp_millis_opt(ts_ms).single() {
        Some(dt) => dt.format(fmt).to_string(),
        None => ts_ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn name_encoding_agrees_with_parsing() {
        let v = ValidityInterval::new(1719668288021, 1719668888021).unwrap();
        assert_eq!(v.encode(), "1719668288021_1719668888021");
        assert_eq!(ValidityInterval::parse(&v.encode()).unwrap(), v);
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "123", "a_b", "10_5", "1_2_3", "1__2", "_5"] {
            assert!(
                matches!(ValidityInterval::parse(name), Err(MovingWindowsError::InvalidArtifactName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn headers_case_insensitive() {
        let h = headers(&[("valid-from", "1000"), ("VALID-UNTIL", " 2000 ")]);
        let v = ValidityInterval::from_headers(&h, "k", 5).unwrap();
        assert_eq!(v, ValidityInterval { from: 1000, until: 2000 });
        assert_eq!(v.duration_secs(), 1);
    }

    #[test]
    fn missing_or_bad_header_is_malformed() {
        let h = headers(&[("Valid-From", "1000")]);
        let err = ValidityInterval::from_headers(&h, "k", 5).unwrap_err();
        assert!(matches!(err, MovingWindowsError::MalformedHeader { timestamp: 5, .. }));
        let h = headers(&[("Valid-From", "x"), ("Valid-Until", "2000")]);
        assert!(ValidityInterval::from_headers(&h, "k", 5).is_err());
        let h = headers(&[("Valid-From", "3000"), ("Valid-Until", "2000")]);
        assert!(ValidityInterval::from_headers(&h, "k", 5).is_err());
    }

    #[test]
    fn overlap_and_duration() {
        let a = ValidityInterval::new(0, 59_999).unwrap();
        let b = ValidityInterval::new(60_000, 120_000).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&ValidityInterval::new(59_999, 70_000).unwrap()));
        assert_eq!(a.duration_secs(), 59);
    }

    #[test]
    fn timestamp_formats() {
        let hours = format_timestamp(1719668288021, true);
        assert_eq!(hours.len(), 8);
        assert_eq!(hours.matches(':').count(), 2);
        let full = format_timestamp(1719668288021, false);
        assert_eq!(full.len(), 19);
        assert!(full.starts_with("06/"));
    }
}
