//! CLI definitions for capsurgeon.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use cap_edit::capfile::{self, FileType};
use cap_edit::dedup::{DEFAULT_DUP_DEPTH, MAX_DUP_DEPTH};
use cap_edit::error::CapError;
use cap_edit::pipeline::{DedupMode, FuzzConfig, PipelineConfig};
use cap_edit::split::SplitMode;
use cap_edit::time;

#[derive(Parser, Debug)]
#[clap(
    name = "capsurgeon",
    version,
    about = "Edit capture files: select, trim, re-time, de-duplicate, fuzz and split packet records",
    long_about = None
)]
pub struct Cli {
    /// Keep only the selected records (the default is to delete them)
    #[clap(short = 'r')]
    pub reverse: bool,

    /// Drop records earlier than this time ("YYYY-MM-DD HH:MM:SS", UTC)
    #[clap(short = 'A', value_name = "TIME")]
    pub start_time: Option<String>,

    /// Drop records at or later than this time ("YYYY-MM-DD HH:MM:SS", UTC)
    #[clap(short = 'B', value_name = "TIME")]
    pub stop_time: Option<String>,

    /// Start a new output file every <COUNT> records
    #[clap(short = 'c', value_name = "COUNT", conflicts_with = "split_seconds")]
    pub split_count: Option<u64>,

    /// Start a new output file every <SECONDS> seconds of capture time
    #[clap(short = 'i', value_name = "SECONDS")]
    pub split_seconds: Option<String>,

    /// Chop bytes from records as [offset:]length; a positive length
    /// chops from the front, a negative one from the end (repeatable)
    #[clap(short = 'C', value_name = "[OFF:]LEN", action = ArgAction::Append, allow_hyphen_values = true)]
    pub chop: Vec<String>,

    /// Also adjust the reported wire length when snapping or chopping
    #[clap(short = 'L')]
    pub adjust_len: bool,

    /// Truncate records to at most <SNAPLEN> bytes
    #[clap(short = 's', value_name = "SNAPLEN")]
    pub snaplen: Option<u32>,

    /// Shift every timestamp by <SECONDS> (may be negative or fractional)
    #[clap(short = 't', value_name = "SECONDS", allow_hyphen_values = true)]
    pub time_shift: Option<String>,

    /// Force strictly ordered timestamps: out-of-order records are
    /// re-timed <SECONDS> after their predecessor; a negative value
    /// re-times every record after the first to exactly that spacing
    #[clap(short = 'S', value_name = "SECONDS", allow_hyphen_values = true)]
    pub strict_time: Option<String>,

    /// Corrupt each payload byte with this probability (0.0 to 1.0)
    #[clap(short = 'E', value_name = "PROBABILITY")]
    pub error_probability: Option<f64>,

    /// Never corrupt the first <OFFSET> bytes of a record
    #[clap(short = 'o', value_name = "OFFSET")]
    pub change_offset: Option<u32>,

    /// Ignore the first <BYTES> bytes of each record when hashing for
    /// duplicates
    #[clap(short = 'I', value_name = "BYTES")]
    pub ignore_bytes: Option<u32>,

    /// Drop records that duplicate any of the previous 5
    #[clap(short = 'd', conflicts_with_all = ["dup_window", "dup_time"])]
    pub dedup: bool,

    /// Drop records that duplicate any of the previous <WINDOW>
    /// (0 to 1000000; 0 only hashes, useful with -v)
    #[clap(short = 'D', value_name = "WINDOW", conflicts_with = "dup_time")]
    pub dup_window: Option<usize>,

    /// Drop records whose duplicate arrived no more than <SECONDS>
    /// (fractions allowed) earlier
    #[clap(short = 'w', value_name = "SECONDS")]
    pub dup_time: Option<String>,

    /// Attach a comment to record <N> ("N:comment"); an empty comment
    /// clears any existing one (repeatable)
    #[clap(short = 'a', value_name = "N:COMMENT", action = ArgAction::Append)]
    pub comments: Vec<String>,

    /// Output file type; pass an empty value to list the choices
    #[clap(short = 'F', value_name = "TYPE")]
    pub file_type: Option<String>,

    /// Output link-layer type; pass an empty value to list the choices
    #[clap(short = 'T', value_name = "ENCAP")]
    pub encap: Option<String>,

    /// Remove 802.1Q VLAN tags from Ethernet frames
    #[clap(long)]
    pub novlan: bool,

    /// Hash past the radiotap header when looking for duplicates
    #[clap(long)]
    pub skip_radiotap_header: bool,

    /// Seed for the -E corruption stream (defaults to clock ^ pid)
    #[clap(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Log what happens to each record
    #[clap(short = 'v')]
    pub verbose: bool,

    /// Capture file to read
    pub infile: PathBuf,

    /// Capture file to write ("-" for standard output)
    pub outfile: String,

    /// Records to select: N or A-B (a B of 0 means "A through the end")
    #[clap(value_name = "RANGES")]
    pub ranges: Vec<String>,
}

impl Cli {
    /// Build the pipeline configuration, parsing the stringly-typed
    /// arguments.
    pub fn into_config(self) -> Result<(PipelineConfig, PathBuf, String), CapError> {
        let mut cfg = PipelineConfig::default();

        if let Some(arg) = &self.start_time {
            cfg.start_time = Some(time::parse_abs_time(arg)?);
        }
        if let Some(arg) = &self.stop_time {
            cfg.stop_time = Some(time::parse_abs_time(arg)?);
        }

        for range in &self.ranges {
            cfg.selection.add(range)?;
        }
        cfg.keep_selected = self.reverse;

        cfg.split = match (self.split_count, &self.split_seconds) {
            (Some(0), _) => {
                return Err(CapError::Config("the split count must be at least 1".into()))
            }
            (Some(count), _) => Some(SplitMode::ByCount(count)),
            (None, Some(arg)) => Some(SplitMode::ByInterval(time::parse_interval(arg)?)),
            (None, None) => None,
        };

        if let Some(arg) = &self.strict_time {
            cfg.strict_adjust = Some(time::parse_rel_time(arg)?);
        }
        if let Some(arg) = &self.time_shift {
            cfg.time_shift = Some(time::parse_rel_time(arg)?);
        }

        cfg.snaplen = self.snaplen;
        for arg in &self.chop {
            cfg.chop.add_arg(arg)?;
        }
        cfg.adjust_len = self.adjust_len;
        cfg.strip_vlan = self.novlan;

        cfg.dedup = if self.dedup {
            Some(DedupMode::Count(DEFAULT_DUP_DEPTH))
        } else if let Some(window) = self.dup_window {
            if window > MAX_DUP_DEPTH {
                return Err(CapError::Config(format!(
                    "the duplicate window must be between 0 and {MAX_DUP_DEPTH}"
                )));
            }
            Some(DedupMode::Count(window))
        } else if let Some(arg) = &self.dup_time {
            let offset = time::parse_rel_time(arg)?;
            if offset.negative {
                return Err(CapError::Config(
                    "the duplicate time window can't be negative".into(),
                ));
            }
            Some(DedupMode::Time(offset.abs))
        } else {
            None
        };
        cfg.dedup_ignore_bytes = self.ignore_bytes.unwrap_or(0);
        cfg.skip_radiotap = self.skip_radiotap_header;

        if let Some(probability) = self.error_probability {
            if !(0.0..=1.0).contains(&probability) {
                return Err(CapError::Config(
                    "the error probability must be between 0.0 and 1.0".into(),
                ));
            }
            cfg.fuzz = Some(FuzzConfig {
                probability,
                change_offset: self.change_offset.unwrap_or(0),
                seed: self.seed,
            });
        }

        for arg in &self.comments {
            let bad = || CapError::Config(format!("\"{arg}\" isn't <recordnum>:<comment>"));
            let (num, comment) = arg.split_once(':').ok_or_else(bad)?;
            let num: u64 = num.trim().parse().map_err(|_| bad())?;
            if num == 0 {
                return Err(CapError::Config("record numbers start at 1".into()));
            }
            if cfg.comments.insert(num, comment.to_string()).is_some() {
                return Err(CapError::Config(format!(
                    "record {num} already has a comment"
                )));
            }
        }

        if let Some(name) = &self.file_type {
            cfg.out_file_type = Some(FileType::from_name(name).ok_or_else(|| {
                CapError::Config(format!(
                    "\"{name}\" isn't a known file type; pass -F '' to list them"
                ))
            })?);
        }
        if let Some(name) = &self.encap {
            cfg.out_datalink = Some(capfile::encap_from_name(name).ok_or_else(|| {
                CapError::Config(format!(
                    "\"{name}\" isn't a known encapsulation; pass -T '' to list them"
                ))
            })?);
        }

        Ok((cfg, self.infile, self.outfile))
    }
}
