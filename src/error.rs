//! Error types for subst
//!
//! `ParseError` covers everything that can go wrong while turning user input
//! into a `PatternSpec`; it is fatal to the whole invocation. `SubstError` is
//! scoped to a single input: the driver reports it and moves on to the next file.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::regex_error::EnhancedRegexError;

/// Malformed pattern, replacement or flag specification.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    #[error("Bad pattern specified (missing s prefix): {0}")]
    MissingPrefix(String),

    #[error("Bad pattern specified: {0}")]
    BadPattern(String),

    #[error("Unknown flag '{flag}' in expression: {expression}")]
    UnknownFlag { flag: char, expression: String },

    #[error("must be provided --pattern and --replace options, or --pattern-and-replace")]
    MissingPattern,

    #[error("{0}")]
    Regex(Box<EnhancedRegexError>),

    #[error("Invalid replacement expression \"{source_text}\": {message}")]
    Expression { source_text: String, message: String },

    #[error("Cannot decode {what} using {encoding}, please use --encoding-input option")]
    ArgumentEncoding { what: &'static str, encoding: &'static str },
}

/// Failure while processing one input. Never affects other inputs.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SubstError {
    #[error("Path \"{0}\" doesn't exist")]
    NotFound(PathBuf),

    #[error("Path \"{0}\" is not a regular file")]
    NotRegularFile(PathBuf),

    #[error("Backup path: \"{backup}\" for file \"{path}\" already exists, file skipped")]
    BackupExists { backup: PathBuf, path: PathBuf },

    #[error("Cannot create backup for \"{path}\": {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read input data: {source}")]
    Read {
        #[source]
        source: io::Error,
    },

    #[error("Cannot write output: {source}")]
    Write {
        #[source]
        source: io::Error,
    },

    #[error("Cannot decode input data as {encoding}, please use --encoding-file option")]
    Decode { encoding: &'static str },

    #[error("Replaced data cannot be represented in {encoding}, please use --encoding-file option")]
    Encode { encoding: &'static str },

    #[error("Replacement expression failed: {0}")]
    Evaluation(String),

    #[error("Cannot create temporary file in \"{dir}\": {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error replacing \"{path}\" with \"{temp}\": {source}")]
    Commit {
        path: PathBuf,
        temp: PathBuf,
        #[source]
        source: io::Error,
    },
}
