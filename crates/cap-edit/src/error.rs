//! Error type shared across the editing pipeline.

use thiserror::Error;

/// Everything that can go wrong while editing a capture.
#[derive(Debug, Error)]
pub enum CapError {
    /// Bad flag value or conflicting options.
    #[error("{0}")]
    Config(String),

    #[error("can't open {path}: {source}")]
    InputOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The input magic number matched a known container but its header
    /// didn't parse.
    #[error("{path} isn't a valid capture file: {source}")]
    InputFormat {
        path: String,
        #[source]
        source: pcap_file::PcapError,
    },

    /// The input magic number matched nothing we can read.
    #[error("{path} isn't a capture file in a format this tool understands")]
    UnknownFormat { path: String },

    #[error("error reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: pcap_file::PcapError,
    },

    #[error("can't create {path}: {source}")]
    OutputOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: pcap_file::PcapError,
    },

    #[error("error closing {path}: {source}")]
    Close {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CapError {
    /// Process exit code for this error: 1 for bad configuration, 2 for
    /// anything that touched a file.
    pub fn exit_code(&self) -> i32 {
        match self {
            CapError::Config(_) => 1,
            _ => 2,
        }
    }
}
