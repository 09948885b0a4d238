//! subst: regular expression replacement in files
//!
//! The library holds everything except process setup; the binary is at src/main.rs.

pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod file_processor;
pub mod logger;
pub mod pattern;
pub mod regex_error;
pub mod replacer;
pub mod substitute;

// Re-export commonly used types for convenience
pub use encoding::EncodingConfig;
pub use error::{ParseError, SubstError};
pub use file_processor::{process_file, process_stream, BackupConfig, Destination, ProcessOptions};
pub use pattern::{parse_pattern_spec, PatternArgs, PatternFlags, PatternSpec};
pub use replacer::Replacer;
pub use substitute::{substitute, Mode};
