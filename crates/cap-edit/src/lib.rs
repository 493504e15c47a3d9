//! Batch editing pipeline for packet-capture files.
//!
//! Records are pulled out of a capture one at a time and threaded
//! through a fixed chain of transformations: time-window filtering,
//! index selection, output splitting, timestamp rewriting, snapping,
//! chopping, VLAN stripping, duplicate removal, fuzzing and comment
//! editing. The `capsurgeon` binary is a thin CLI over [`pipeline::run`].

pub mod adjust;
pub mod capfile;
pub mod chop;
pub mod dedup;
pub mod error;
pub mod frame;
pub mod fuzz;
pub mod pipeline;
pub mod record;
pub mod select;
pub mod split;
pub mod time;

pub use error::CapError;
pub use pipeline::{DedupMode, FuzzConfig, PipelineConfig, RunSummary};
pub use record::{Encap, Record, RecordKind};
pub use time::{TimeOffset, TimeSpec};
