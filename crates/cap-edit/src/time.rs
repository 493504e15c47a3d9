//! Timestamp arithmetic and the time-string parsers.
//!
//! Three flavours of time are parsed from the command line: relative
//! offsets like `-1.5` (`-t`, `-S`, `-w`), absolute wall-clock times
//! (`-A`, `-B`) and whole-second split intervals (`-i`).

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::error::CapError;

pub const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Seconds plus nanoseconds, `0 <= nsecs < 10^9`.
///
/// Negative instants use the C `timespec` convention: `secs` is floored
/// and `nsecs` counts forward from it, so the derived lexicographic
/// ordering is the chronological one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeSpec {
    pub secs: i64,
    pub nsecs: u32,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec { secs: 0, nsecs: 0 };

    pub fn new(secs: i64, nsecs: u32) -> TimeSpec {
        let mut t = TimeSpec { secs, nsecs };
        while t.nsecs >= NANOS_PER_SEC {
            t.secs += 1;
            t.nsecs -= NANOS_PER_SEC;
        }
        t
    }

    /// `self + other` with nanosecond carry.
    pub fn add(self, other: TimeSpec) -> TimeSpec {
        let mut secs = self.secs + other.secs;
        let mut nsecs = self.nsecs + other.nsecs;
        if nsecs >= NANOS_PER_SEC {
            secs += 1;
            nsecs -= NANOS_PER_SEC;
        }
        TimeSpec { secs, nsecs }
    }

    /// `self - other` with nanosecond borrow. The result may be negative.
    pub fn sub(self, other: TimeSpec) -> TimeSpec {
        let mut secs = self.secs - other.secs;
        let nsecs = if self.nsecs < other.nsecs {
            secs -= 1;
            self.nsecs + NANOS_PER_SEC - other.nsecs
        } else {
            self.nsecs - other.nsecs
        };
        TimeSpec { secs, nsecs }
    }

    /// `self - other` when `self >= other`, `None` when `self` is the
    /// earlier of the two.
    pub fn delta_since(self, other: TimeSpec) -> Option<TimeSpec> {
        if self < other {
            None
        } else {
            Some(self.sub(other))
        }
    }

    pub fn from_duration(d: Duration) -> TimeSpec {
        TimeSpec {
            secs: d.as_secs() as i64,
            nsecs: d.subsec_nanos(),
        }
    }

    /// Capture containers store unsigned times; anything before the
    /// epoch clamps to zero.
    pub fn to_duration(self) -> Duration {
        if self.secs < 0 {
            Duration::ZERO
        } else {
            Duration::new(self.secs as u64, self.nsecs)
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secs < 0 && self.nsecs > 0 {
            write!(f, "-{}.{:09}", -(self.secs + 1), NANOS_PER_SEC - self.nsecs)
        } else {
            write!(f, "{}.{:09}", self.secs, self.nsecs)
        }
    }
}

/// A relative time whose sign is carried out-of-band, as the arithmetic
/// stages expect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOffset {
    /// Magnitude; `secs` is non-negative here.
    pub abs: TimeSpec,
    pub negative: bool,
}

impl TimeOffset {
    /// Shift an absolute timestamp by this offset.
    pub fn apply(self, ts: TimeSpec) -> TimeSpec {
        if self.negative {
            ts.sub(self.abs)
        } else {
            ts.add(self.abs)
        }
    }
}

/// Parse `[whitespace][-][digits][.digits]` into a signed offset.
///
/// The fractional part is left-aligned ("1.5" is one and a half seconds)
/// and truncated, not rounded, past nine digits. A bare `-` is invalid;
/// `.5` is fine. Seconds that overflow are an error, not saturated.
pub fn parse_rel_time(arg: &str) -> Result<TimeOffset, CapError> {
    let bad = || CapError::Config(format!("\"{arg}\" isn't a valid time offset"));

    let s = arg.trim_start();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(bad());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(bad());
    }

    let secs: i64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| CapError::Config(format!("\"{arg}\": seconds value out of range")))?
    };
    let mut nsecs: u32 = 0;
    for (i, b) in frac_part.bytes().take(9).enumerate() {
        nsecs += u32::from(b - b'0') * 10u32.pow(8 - i as u32);
    }

    Ok(TimeOffset {
        abs: TimeSpec { secs, nsecs },
        negative,
    })
}

/// Parse `YYYY-MM-DD HH:MM:SS` (UTC) into an absolute timestamp.
pub fn parse_abs_time(arg: &str) -> Result<TimeSpec, CapError> {
    let dt = NaiveDateTime::parse_from_str(arg.trim(), "%Y-%m-%d %H:%M:%S").map_err(|_| {
        CapError::Config(format!(
            "\"{arg}\" isn't a valid time (expected YYYY-MM-DD HH:MM:SS)"
        ))
    })?;
    Ok(TimeSpec {
        secs: dt.and_utc().timestamp(),
        nsecs: 0,
    })
}

/// Parse the `-i` split interval: a positive whole number of seconds.
pub fn parse_interval(arg: &str) -> Result<i64, CapError> {
    match arg.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(CapError::Config(format!(
            "\"{arg}\" isn't a valid split interval (whole seconds, at least 1)"
        ))),
    }
}
