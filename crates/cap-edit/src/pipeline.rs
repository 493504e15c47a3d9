//! The per-record transformation pipeline.
//!
//! A single-threaded pull loop: records come out of the source one at a
//! time, pass through the stages in a fixed order (each stage may drop,
//! rewrite or pass a record) and survivors land in the sink, which may
//! roll over to a new file between records. All state is built once
//! from the parsed command line and owned by the loop.

use std::collections::BTreeMap;
use std::path::Path;

use pcap_file::DataLink;
use tracing::{debug, info};

use crate::adjust::StrictAdjuster;
use crate::capfile::{self, FileType, Sink, SinkParams, Source};
use crate::chop::{self, ChopSpec};
use crate::dedup::{self, DedupCache, MAX_DUP_DEPTH};
use crate::error::CapError;
use crate::frame;
use crate::fuzz::Fuzzer;
use crate::record::{Encap, RecordKind};
use crate::select::SelectionSet;
use crate::split::{SplitMode, Splitter};
use crate::time::{TimeOffset, TimeSpec};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which duplicate filter is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMode {
    /// Match against the previous `window` records.
    Count(usize),
    /// Match against records no older than the window.
    Time(TimeSpec),
}

/// Fuzzing knobs.
#[derive(Debug, Clone, Copy)]
pub struct FuzzConfig {
    pub probability: f64,
    /// Bytes at the front of every packet that are never corrupted.
    pub change_offset: u32,
    /// `None` derives a seed from the clock and pid.
    pub seed: Option<u64>,
}

/// Everything the pipeline needs, built once from the parsed command
/// line and threaded through by reference.
#[derive(Debug, Default)]
pub struct PipelineConfig {
    /// Keep only records with `ts >= start_time`.
    pub start_time: Option<TimeSpec>,
    /// Keep only records with `ts < stop_time`.
    pub stop_time: Option<TimeSpec>,
    pub selection: SelectionSet,
    /// `true` keeps only selected records; `false` deletes them.
    pub keep_selected: bool,
    pub split: Option<SplitMode>,
    pub strict_adjust: Option<TimeOffset>,
    pub time_shift: Option<TimeOffset>,
    pub snaplen: Option<u32>,
    pub chop: ChopSpec,
    /// Make the reported wire length track snap and chop.
    pub adjust_len: bool,
    pub strip_vlan: bool,
    pub dedup: Option<DedupMode>,
    /// Bytes ignored at the front of each payload when hashing.
    pub dedup_ignore_bytes: u32,
    /// Hash past the radiotap header on radiotap captures.
    pub skip_radiotap: bool,
    pub fuzz: Option<FuzzConfig>,
    /// Comments to attach (or, when empty, clear) keyed by record index.
    pub comments: BTreeMap<u64, String>,
    /// Output container; defaults to the input's.
    pub out_file_type: Option<FileType>,
    /// Output link type; defaults to the input's.
    pub out_datalink: Option<DataLink>,
}

/// Counters reported after a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub records_read: u64,
    pub records_written: u64,
    pub duplicates_dropped: u64,
}

// ─── Driver ──────────────────────────────────────────────────────────────────

/// Drive every record of `infile` through the pipeline into `outfile`
/// (or the split series derived from it).
pub fn run(cfg: &PipelineConfig, infile: &Path, outfile: &str) -> Result<RunSummary, CapError> {
    let mut source = capfile::open_source(infile)?;

    let mut splitter = Splitter::new(cfg.split, outfile);
    let mut adjuster = cfg.strict_adjust.map(StrictAdjuster::new);
    let mut dedup_cache = cfg.dedup.map(|mode| match mode {
        DedupMode::Count(window) => DedupCache::new(window),
        DedupMode::Time(_) => DedupCache::new(MAX_DUP_DEPTH),
    });
    let mut fuzzer = cfg
        .fuzz
        .map(|fc| Fuzzer::new(fc.probability, fc.seed));
    if let Some(f) = &fuzzer {
        info!("fuzzing with seed {}", f.seed());
    }

    let mut params: Option<SinkParams> = None;
    let mut sink: Option<Sink> = None;
    let mut summary = RunSummary::default();
    let mut read_error: Option<CapError> = None;
    let max_selection = cfg.selection.max_selection();

    loop {
        let mut rec = match source.pull() {
            Ok(Some(rec)) => rec,
            Ok(None) => break,
            Err(e) => {
                read_error = Some(e);
                break;
            }
        };
        summary.records_read += 1;
        let index = summary.records_read;

        // Nothing past the highest selected index can be emitted in keep
        // mode.
        if cfg.keep_selected && index > max_selection {
            break;
        }

        // The first record opens the initial output.
        if sink.is_none() {
            splitter.start(rec.ts);
            let p = sink_params(cfg, &source);
            let name = if splitter.is_split() {
                splitter.filename(rec.ts)
            } else {
                outfile.to_string()
            };
            sink = Some(capfile::open_sink(&name, &p)?);
            params = Some(p);
        }

        // Time window.
        if let Some(ts) = rec.ts {
            if cfg.start_time.is_some_and(|start| ts < start)
                || cfg.stop_time.is_some_and(|stop| ts >= stop)
            {
                debug!("record {index}: outside the time range");
                continue;
            }
        }

        // Selection.
        if (!cfg.selection.is_empty() || cfg.keep_selected)
            && cfg.selection.selected(index) != cfg.keep_selected
        {
            debug!("record {index}: not selected");
            continue;
        }

        // Split boundary: roll once per crossed boundary, naming each
        // new file after the record that triggered the roll.
        if let Some(p) = &params {
            for _ in 0..splitter.rolls_needed(rec.ts) {
                if let Some(s) = sink.take() {
                    s.close()?;
                }
                splitter.advance();
                let name = splitter.filename(rec.ts);
                debug!("continuing output in {name}");
                sink = Some(capfile::open_sink(&name, p)?);
            }
        }

        // Timestamp rewriting.
        if let (Some(adj), Some(ts)) = (&mut adjuster, rec.ts) {
            rec.ts = Some(adj.adjust(ts));
        }
        if let (Some(shift), Some(ts)) = (cfg.time_shift, rec.ts) {
            rec.ts = Some(shift.apply(ts));
        }

        // Snap.
        if let Some(snaplen) = cfg.snaplen {
            if rec.kind == RecordKind::Packet && rec.caplen > snaplen {
                rec.payload.truncate(snaplen as usize);
                rec.caplen = snaplen;
            }
            if cfg.adjust_len && rec.len > snaplen {
                rec.len = snaplen;
            }
        }

        // Chop.
        chop::apply(&cfg.chop, &mut rec, cfg.adjust_len);

        // VLAN stripping.
        if cfg.strip_vlan && frame::strip_vlan(&mut rec) {
            debug!("record {index}: stripped an 802.1Q tag");
        }

        // Duplicate detection.
        if let (Some(cache), Some(mode)) = (&mut dedup_cache, cfg.dedup) {
            if rec.kind == RecordKind::Packet {
                let offset = dedup::hash_offset(&rec, cfg.dedup_ignore_bytes, cfg.skip_radiotap);
                let digest = DedupCache::digest_of(&rec.payload[offset..]);
                let duplicate = match mode {
                    DedupMode::Count(_) => {
                        let duplicate = cache.is_duplicate(digest, rec.caplen);
                        debug!("record {index}: MD5 {}", dedup::fmt_digest(cache.last_digest()));
                        duplicate
                    }
                    DedupMode::Time(window) => match rec.ts {
                        Some(ts) => {
                            let duplicate =
                                cache.is_duplicate_by_time(digest, rec.caplen, ts, window);
                            debug!(
                                "record {index}: MD5 {}",
                                dedup::fmt_digest(cache.last_digest())
                            );
                            duplicate
                        }
                        None => false,
                    },
                };
                if duplicate {
                    summary.duplicates_dropped += 1;
                    debug!("record {index}: duplicate, dropped");
                    continue;
                }
            }
        }

        // Fuzzing.
        if let (Some(f), Some(fc)) = (&mut fuzzer, cfg.fuzz) {
            if rec.kind == RecordKind::Packet {
                let mut start = fc.change_offset as usize;
                if rec.encap == Encap::CatapultDct2000 {
                    start += frame::dct2000_payload_start(&rec.payload);
                }
                f.corrupt(&mut rec.payload, start);
            }
        }

        // Comments.
        if let Some(comment) = cfg.comments.get(&index) {
            rec.comment = if comment.is_empty() {
                None
            } else {
                Some(comment.clone())
            };
            rec.comment_changed = true;
        }

        // Emit.
        if let Some(s) = &mut sink {
            s.write(&rec)?;
            summary.records_written += 1;
            splitter.wrote();
        }
    }

    // A capture that yielded nothing still gets a well-formed empty
    // output file.
    if sink.is_none() {
        let p = params.unwrap_or_else(|| sink_params(cfg, &source));
        let name = if splitter.is_split() {
            splitter.filename(None)
        } else {
            outfile.to_string()
        };
        sink = Some(capfile::open_sink(&name, &p)?);
    }
    if let Some(s) = sink.take() {
        s.close()?;
    }

    if let Some(mode) = cfg.dedup {
        print_dedup_summary(mode, &summary);
    }

    if let Some(e) = read_error {
        return Err(e);
    }
    debug!(
        "{} records read, {} written",
        summary.records_read, summary.records_written
    );
    Ok(summary)
}

fn sink_params(cfg: &PipelineConfig, source: &Source) -> SinkParams {
    SinkParams {
        file_type: cfg.out_file_type.unwrap_or_else(|| source.file_type()),
        datalink: cfg.out_datalink.unwrap_or_else(|| source.datalink()),
        snaplen: cfg.snaplen.unwrap_or_else(|| source.snaplen()),
    }
}

fn print_dedup_summary(mode: DedupMode, summary: &RunSummary) {
    let seen = summary.records_read;
    let skipped = summary.duplicates_dropped;
    match mode {
        DedupMode::Count(window) => eprintln!(
            "{} record{} seen, {} record{} skipped with duplicate window of {} records.",
            seen,
            plural(seen),
            skipped,
            plural(skipped),
            window
        ),
        DedupMode::Time(window) => eprintln!(
            "{} record{} seen, {} record{} skipped with duplicate time window equal to or less than {} seconds.",
            seen,
            plural(seen),
            skipped,
            plural(skipped),
            window
        ),
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
