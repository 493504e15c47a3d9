//! Output rolling by record count or capture-time interval, and the
//! split filename template.

use chrono::DateTime;

use crate::time::TimeSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Roll after this many records land in a file.
    ByCount(u64),
    /// Roll whenever a record crosses the next boundary of this many
    /// seconds of capture time.
    ByInterval(i64),
}

/// Decides when the sink rolls to its next file and what that file is
/// called.
#[derive(Debug)]
pub struct Splitter {
    mode: Option<SplitMode>,
    written_in_current: u64,
    interval_start: Option<TimeSpec>,
    file_index: u32,
    prefix: String,
    suffix: String,
}

impl Splitter {
    pub fn new(mode: Option<SplitMode>, outfile: &str) -> Splitter {
        let (prefix, suffix) = split_name(outfile);
        Splitter {
            mode,
            written_in_current: 0,
            interval_start: None,
            file_index: 0,
            prefix,
            suffix,
        }
    }

    pub fn is_split(&self) -> bool {
        self.mode.is_some()
    }

    /// Name for the current file index, stamped with the given record
    /// time when there is one.
    pub fn filename(&self, ts: Option<TimeSpec>) -> String {
        let mut name = format!("{}_{:05}", self.prefix, self.file_index % 100_000);
        if let Some(ts) = ts {
            if let Some(dt) = DateTime::from_timestamp(ts.secs, ts.nsecs) {
                name.push_str(&format!("_{}", dt.format("%Y%m%d%H%M%S")));
            }
        }
        name.push_str(&self.suffix);
        name
    }

    /// Anchor the interval clock at the first record's timestamp.
    pub fn start(&mut self, ts: Option<TimeSpec>) {
        if self.interval_start.is_none() {
            self.interval_start = ts;
        }
    }

    /// How many files the incoming record rolls past before being
    /// written: usually 0, 1 at a boundary, more when a time gap spans
    /// several intervals (each crossed interval gets its own file).
    pub fn rolls_needed(&mut self, ts: Option<TimeSpec>) -> u32 {
        match self.mode {
            None => 0,
            Some(SplitMode::ByCount(count)) => {
                if self.written_in_current >= count {
                    self.written_in_current = 0;
                    1
                } else {
                    0
                }
            }
            Some(SplitMode::ByInterval(interval)) => {
                let (Some(ts), Some(start)) = (ts, self.interval_start.as_mut()) else {
                    return 0;
                };
                let mut rolls = 0;
                while (ts.secs - start.secs) > interval
                    || ((ts.secs - start.secs) == interval && ts.nsecs >= start.nsecs)
                {
                    start.secs += interval;
                    rolls += 1;
                }
                if rolls > 0 {
                    self.written_in_current = 0;
                }
                rolls
            }
        }
    }

    /// Account one emitted record.
    pub fn wrote(&mut self) {
        self.written_in_current += 1;
    }

    /// Step to the next file index.
    pub fn advance(&mut self) {
        self.file_index += 1;
    }
}

/// Split an output path into template prefix and suffix: the suffix
/// starts at the last `.` after the last path separator, or is empty.
fn split_name(outfile: &str) -> (String, String) {
    let name_start = outfile.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match outfile[name_start..].rfind('.') {
        Some(dot) => {
            let dot = name_start + dot;
            (outfile[..dot].to_string(), outfile[dot..].to_string())
        }
        None => (outfile.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64, nsecs: u32) -> Option<TimeSpec> {
        Some(TimeSpec { secs, nsecs })
    }

    #[test]
    fn test_split_name_with_suffix() {
        assert_eq!(
            split_name("captures/trimmed.pcap"),
            ("captures/trimmed".to_string(), ".pcap".to_string())
        );
    }

    #[test]
    fn test_split_name_without_suffix() {
        assert_eq!(split_name("outfile"), ("outfile".to_string(), String::new()));
    }

    #[test]
    fn test_split_name_dot_in_directory() {
        // The dot in the directory is not a suffix separator.
        assert_eq!(
            split_name("some.dir/outfile"),
            ("some.dir/outfile".to_string(), String::new())
        );
    }

    #[test]
    fn test_filename_template() {
        let splitter = Splitter::new(Some(SplitMode::ByCount(2)), "out.pcap");
        // 1970-01-02 00:00:00 UTC.
        assert_eq!(splitter.filename(ts(86_400, 0)), "out_00000_19700102000000.pcap");
    }

    #[test]
    fn test_filename_without_timestamp() {
        let splitter = Splitter::new(Some(SplitMode::ByCount(2)), "out.pcap");
        assert_eq!(splitter.filename(None), "out_00000.pcap");
    }

    #[test]
    fn test_filename_index_wraps_at_100000() {
        let mut splitter = Splitter::new(Some(SplitMode::ByCount(1)), "out.pcap");
        for _ in 0..100_001 {
            splitter.advance();
        }
        assert_eq!(splitter.filename(None), "out_00001.pcap");
    }

    #[test]
    fn test_count_mode_rolls_after_k_writes() {
        let mut splitter = Splitter::new(Some(SplitMode::ByCount(2)), "out.pcap");
        assert_eq!(splitter.rolls_needed(None), 0);
        splitter.wrote();
        assert_eq!(splitter.rolls_needed(None), 0);
        splitter.wrote();
        assert_eq!(splitter.rolls_needed(None), 1);
        // The counter reset with the roll.
        assert_eq!(splitter.rolls_needed(None), 0);
    }

    #[test]
    fn test_interval_mode_rolls_at_boundary() {
        let mut splitter = Splitter::new(Some(SplitMode::ByInterval(10)), "out.pcap");
        splitter.start(ts(100, 0));
        assert_eq!(splitter.rolls_needed(ts(105, 0)), 0);
        assert_eq!(splitter.rolls_needed(ts(110, 0)), 1);
        assert_eq!(splitter.rolls_needed(ts(111, 0)), 0);
    }

    #[test]
    fn test_interval_boundary_compares_nanoseconds() {
        let mut splitter = Splitter::new(Some(SplitMode::ByInterval(10)), "out.pcap");
        splitter.start(ts(100, 500));
        // Ten seconds later but a hair before the start's nanoseconds.
        assert_eq!(splitter.rolls_needed(ts(110, 499)), 0);
        assert_eq!(splitter.rolls_needed(ts(110, 500)), 1);
    }

    #[test]
    fn test_interval_gap_rolls_once_per_interval() {
        let mut splitter = Splitter::new(Some(SplitMode::ByInterval(10)), "out.pcap");
        splitter.start(ts(100, 0));
        assert_eq!(splitter.rolls_needed(ts(135, 0)), 3);
    }

    #[test]
    fn test_no_mode_never_rolls() {
        let mut splitter = Splitter::new(None, "out.pcap");
        splitter.wrote();
        splitter.wrote();
        assert_eq!(splitter.rolls_needed(ts(1_000_000, 0)), 0);
        assert!(!splitter.is_split());
    }
}
