//! Safe in-place file updates
//!
//! Every file goes through the same steps, and a failure at any of them leaves
//! the original untouched:
//!
//! 1. validate: the path must be an existing regular file, not a symlink
//! 2. backup: copy to `<path><suffix>`, refusing to overwrite an existing backup
//! 3. transform: write the result to a temporary file next to the original
//! 4. commit: rename the temporary file over the original
//!
//! Streams (stdin to stdout) skip all of this and are transformed directly.

use filetime::FileTime;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, BufRead, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PersistError};

use crate::encoding::EncodingConfig;
use crate::error::SubstError;
use crate::pattern::PatternSpec;
use crate::substitute::{Mode, substitute};

pub const DEFAULT_BACKUP_EXTENSION: &str = "bak";

/// Where backups go, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Suffix appended to the original path, leading dot included. `None` disables backups.
    suffix: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self::with_extension(DEFAULT_BACKUP_EXTENSION)
    }
}

impl BackupConfig {
    pub fn disabled() -> Self {
        Self { suffix: None }
    }

    /// `"orig"` and `".orig"` both give the suffix `.orig`; an empty extension means `.bak`.
    pub fn with_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.');
        let extension = if extension.is_empty() {
            DEFAULT_BACKUP_EXTENSION
        } else {
            extension
        };
        Self {
            suffix: Some(format!(".{}", extension)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.suffix.is_some()
    }

    /// Suffix appended to backed up paths, empty when disabled.
    pub fn suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
    /// Replace the file through a temporary file and rename
    #[default]
    InPlace,
    /// Print the result, leave the file alone
    Stdout,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub mode: Mode,
    pub backup: BackupConfig,
    pub destination: Destination,
    pub encoding: EncodingConfig,
}

/// Backup location for `path`: the suffix is appended to the full file name.
pub fn backup_path_for(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Check that `path` is an existing regular file and not a symlink.
pub fn validate(path: &Path) -> Result<fs::Metadata, SubstError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(SubstError::NotFound(path.to_path_buf()));
        }
        Err(source) => return Err(SubstError::Read { source }),
    };

    if metadata.file_type().is_symlink() || !metadata.is_file() {
        return Err(SubstError::NotRegularFile(path.to_path_buf()));
    }

    Ok(metadata)
}

/// Copy `path` to its backup location, keeping permissions and timestamps.
///
/// Fails without touching anything if the backup path is already taken.
pub fn make_backup(path: &Path, suffix: &str) -> Result<PathBuf, SubstError> {
    let backup_path = backup_path_for(path, suffix);
    let backup_err = |source| SubstError::Backup {
        path: path.to_path_buf(),
        source,
    };

    let mut target = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&backup_path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(SubstError::BackupExists {
                backup: backup_path,
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(backup_err(err)),
    };

    let copied = File::open(path)
        .and_then(|mut source| io::copy(&mut source, &mut target))
        .and_then(|_| target.sync_all());
    if let Err(err) = copied {
        drop(target);
        let _ = fs::remove_file(&backup_path);
        return Err(backup_err(err));
    }

    let metadata = fs::metadata(path).map_err(backup_err)?;
    target
        .set_permissions(metadata.permissions())
        .map_err(backup_err)?;
    drop(target);

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    if let Err(err) = filetime::set_file_times(&backup_path, atime, mtime) {
        tracing::warn!(
            "cannot preserve timestamps on {}: {}",
            backup_path.display(),
            err
        );
    }

    Ok(backup_path)
}

/// Run the whole validate, backup, transform, commit sequence for one file.
pub fn process_file(
    path: &Path,
    spec: &PatternSpec,
    options: &ProcessOptions,
) -> Result<usize, SubstError> {
    match options.destination {
        Destination::Stdout => {
            let stdout = io::stdout();
            process_file_into(path, BufWriter::new(stdout.lock()), spec, options)
        }
        Destination::InPlace => {
            let metadata = validate(path)?;

            if options.backup.is_enabled() {
                let backup_path = make_backup(path, options.backup.suffix())?;
                tracing::debug!("created backup file: \"{}\"", backup_path.display());
            }

            rewrite_in_place(path, &metadata, spec, options, |temp, target| {
                temp.persist(target).map(|_| ())
            })
        }
    }
}

/// Validate `path` and write its transformed content to `output`. No backup, no rename.
pub fn process_file_into<W: Write>(
    path: &Path,
    output: W,
    spec: &PatternSpec,
    options: &ProcessOptions,
) -> Result<usize, SubstError> {
    validate(path)?;
    let input = open_input(path)?;
    substitute(options.mode, input, output, spec, &options.encoding)
}

/// Transform a stream. Used for stdin; never touches the filesystem.
pub fn process_stream<R: BufRead, W: Write>(
    input: R,
    output: W,
    spec: &PatternSpec,
    options: &ProcessOptions,
) -> Result<usize, SubstError> {
    substitute(options.mode, input, output, spec, &options.encoding)
}

fn open_input(path: &Path) -> Result<BufReader<File>, SubstError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| SubstError::Read { source })
}

fn rewrite_in_place<F>(
    path: &Path,
    metadata: &fs::Metadata,
    spec: &PatternSpec,
    options: &ProcessOptions,
    commit: F,
) -> Result<usize, SubstError>
where
    F: FnOnce(NamedTempFile, &Path) -> Result<(), PersistError>,
{
    // Same directory as the target so the final rename stays on one filesystem
    let dir = path.parent().unwrap_or(Path::new("."));
    let temp = NamedTempFile::new_in(dir).map_err(|source| SubstError::TempFile {
        dir: dir.to_path_buf(),
        source,
    })?;
    tracing::debug!("temporary file: \"{}\"", temp.path().display());

    let input = open_input(path)?;
    let replaced = {
        let writer = BufWriter::new(temp.as_file());
        substitute(options.mode, input, writer, spec, &options.encoding)?
    };

    if replaced == 0 {
        tracing::debug!("no replacements, leaving \"{}\" as is", path.display());
        return Ok(0);
    }

    let file = temp.as_file();
    file.set_permissions(metadata.permissions())
        .and_then(|_| file.sync_all())
        .map_err(|source| SubstError::Write { source })?;

    let temp_path = temp.path().to_path_buf();
    commit(temp, path).map_err(|err| SubstError::Commit {
        path: path.to_path_buf(),
        temp: temp_path,
        source: err.error,
    })?;
    tracing::debug!("moved temporary file to original");

    Ok(replaced)
}
