use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::encoding::{self, EncodingConfig};
use crate::file_processor::{BackupConfig, Destination, ProcessOptions};
use crate::logger::Verbosity;
use crate::pattern::{PatternArgs, PatternFlags};
use crate::substitute::Mode;

#[derive(Parser, Debug)]
#[command(name = "subst")]
#[command(about = "Replace text in files using regular expressions")]
#[command(long_about = "Replace text in files using regular expressions.

Files are modified in place: the original is backed up first, the result is
written to a temporary file which then replaces the original. A failure at any
step leaves the original file unchanged.

PATTERN SYNTAX:
  s/PATTERN/REPLACE/FLAGS    any single character may be the delimiter
  s(PATTERN)(REPLACE)FLAGS   also s{..}{..}, s[..][..], s<..><..>

  FLAGS: g (replace all), i (ignore case), x (verbose), s (dot matches
  newline), m (multiline). Without g only the first match is replaced.

  With --pattern/--replace all matches are replaced unless --count is given.
  Groups are referenced in the replacement as $1, ${1} or ${name}.

EXPRESSIONS:
  With --eval-replace the replacement is a rhai expression evaluated for every
  match, with the match bound to `m`: m.group(), m.group(1), m.group(\"name\"),
  m.groups(), m.start(), m.end(). Offsets count characters from the start of
  the file, or of the current line with --linear. Only use expressions you
  trust.

EXAMPLES:
  subst -s 's/foo/bar/g' file.txt             Replace all occurrences
  subst -s 's/foo/bar/' -c 3 *.txt            Replace the first three
  subst -p '(\\d+)' -r '<$1>' file.txt          Separate pattern and replacement
  subst -t -p 'a.b' -r 'x' file.txt           Match the pattern as plain text
  cat file.txt | subst -s 's/a/b/g'           Filter stdin to stdout
  subst --eval-replace -s 's/\\d+/parse_int(m.group()) * 2/g' f.txt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(disable_version_flag = true)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .multiple(true)
        .args(["pattern", "pattern_and_replace"])
))]
pub struct Cli {
    /// Regular expression to search for
    #[arg(short = 'p', long, value_name = "PATTERN", requires = "replace")]
    pub pattern: Option<OsString>,

    /// Replacement for each match
    #[arg(short = 'r', long, value_name = "REPLACE", requires = "pattern")]
    pub replace: Option<OsString>,

    /// Evaluate the replacement as an expression for every match
    #[arg(long = "eval-replace")]
    pub eval_replace: bool,

    /// Treat --pattern as plain text instead of a regular expression
    #[arg(short = 't', long = "string")]
    pub string: bool,

    /// Pattern and replacement as one expression, e.g. 's/foo/bar/g'
    #[arg(short = 's', long = "pattern-and-replace", value_name = "EXPRESSION")]
    pub pattern_and_replace: Option<OsString>,

    /// Maximum number of replacements per input (0 = unlimited)
    #[arg(short = 'c', long, value_name = "N")]
    pub count: Option<usize>,

    /// Process input line by line instead of reading it whole
    #[arg(short = 'l', long)]
    pub linear: bool,

    /// Case insensitive matching
    #[arg(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,

    /// Make `.` match newlines too
    #[arg(long = "pattern-dot-all")]
    pub pattern_dot_all: bool,

    /// Ignore whitespace and allow # comments in the pattern
    #[arg(long = "pattern-verbose")]
    pub pattern_verbose: bool,

    /// Make ^ and $ match at line boundaries
    #[arg(long = "pattern-multiline")]
    pub pattern_multiline: bool,

    /// Use UTF-8 for arguments, file content and file names
    #[arg(short = 'u', long)]
    pub utf8: bool,

    /// Encoding of the pattern and replacement arguments
    #[arg(long = "encoding-input", value_name = "ENCODING")]
    pub encoding_input: Option<String>,

    /// Encoding of file content
    #[arg(long = "encoding-file", value_name = "ENCODING")]
    pub encoding_file: Option<String>,

    /// Encoding of file names
    #[arg(long = "encoding-filesystem", value_name = "ENCODING")]
    pub encoding_filesystem: Option<String>,

    /// Do not create backups
    #[arg(short = 'b', long = "no-backup")]
    pub no_backup: bool,

    /// Extension of backup files (default: bak)
    #[arg(short = 'e', long = "backup-extension", value_name = "EXT")]
    pub backup_extension: Option<String>,

    /// Expand wildcards in file arguments (e.g. for shells that do not)
    #[arg(short = 'W', long = "expand-wildcards")]
    pub expand_wildcards: bool,

    /// Read from stdin, write to stdout
    #[arg(long)]
    pub stdin: bool,

    /// Write results to stdout instead of modifying files
    #[arg(long)]
    pub stdout: bool,

    /// Report processed files and replacement counts
    #[arg(long)]
    pub verbose: bool,

    /// Show diagnostic output
    #[arg(long)]
    pub debug: bool,

    /// Configuration file (default: ~/.subst/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: Option<bool>,

    /// Files to process; none or "-" means stdin
    #[arg(value_name = "FILE")]
    pub files: Vec<OsString>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inputs {
    Stdin,
    Files(Vec<PathBuf>),
}

/// Fully resolved run configuration
#[derive(Debug)]
pub struct Settings {
    pub pattern: PatternArgs,
    pub options: ProcessOptions,
    pub inputs: Inputs,
    pub verbosity: Verbosity,
    pub log_file: Option<PathBuf>,
}

pub fn parse_args() -> Result<Settings> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    resolve(cli, &config)
}

/// Combine command-line options with the configuration file.
pub fn resolve(cli: Cli, config: &Config) -> Result<Settings> {
    let encoding = resolve_encoding(&cli, config)?;

    let mode = if cli.linear || config.processing.linear {
        Mode::Linear
    } else {
        Mode::Whole
    };
    if mode == Mode::Linear && !encoding.file.is_ascii_compatible() {
        anyhow::bail!(
            "Line by line processing is not supported for encoding {}",
            encoding.file.name()
        );
    }

    let is_stdin = cli.stdin
        || cli.files.is_empty()
        || cli.files.first().is_some_and(|f| f.as_os_str() == OsStr::new("-"));
    let destination = if is_stdin || cli.stdout {
        Destination::Stdout
    } else {
        Destination::InPlace
    };

    let backup = if cli.no_backup || !config.backup.enabled || destination == Destination::Stdout {
        BackupConfig::disabled()
    } else {
        let extension = cli
            .backup_extension
            .as_deref()
            .unwrap_or(&config.backup.extension);
        if extension.contains(['/', '\\']) {
            anyhow::bail!("Invalid backup extension: {:?}", extension);
        }
        BackupConfig::with_extension(extension)
    };

    let pattern = PatternArgs {
        pattern: decode_arg(&encoding, cli.pattern.as_deref(), "pattern")?,
        replace: decode_arg(&encoding, cli.replace.as_deref(), "replacement")?,
        expression: decode_arg(&encoding, cli.pattern_and_replace.as_deref(), "expression")?,
        count: cli.count,
        literal: cli.string,
        eval: cli.eval_replace,
        flags: PatternFlags {
            ignore_case: cli.ignore_case,
            verbose: cli.pattern_verbose,
            dot_all: cli.pattern_dot_all,
            multiline: cli.pattern_multiline,
        },
    };

    let inputs = if is_stdin {
        Inputs::Stdin
    } else {
        Inputs::Files(resolve_paths(&cli.files, &encoding, cli.expand_wildcards)?)
    };

    let log_file = config
        .logging
        .log_file
        .as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()));

    Ok(Settings {
        pattern,
        options: ProcessOptions {
            mode,
            backup,
            destination,
            encoding,
        },
        inputs,
        verbosity: Verbosity::from_flags(cli.verbose, cli.debug),
        log_file,
    })
}

fn resolve_encoding(cli: &Cli, config: &Config) -> Result<EncodingConfig> {
    if cli.utf8 {
        return Ok(EncodingConfig::utf8());
    }

    let pick = |arg: &Option<String>, fallback: &str, what: &str| {
        let label = arg.as_deref().unwrap_or(fallback);
        encoding::lookup(label).map_err(|e| anyhow::anyhow!("{} ({})", e, what))
    };

    Ok(EncodingConfig {
        input: pick(&cli.encoding_input, &config.encoding.input, "--encoding-input")?,
        file: pick(&cli.encoding_file, &config.encoding.file, "--encoding-file")?,
        filesystem: pick(
            &cli.encoding_filesystem,
            &config.encoding.filesystem,
            "--encoding-filesystem",
        )?,
    })
}

fn decode_arg(
    encoding: &EncodingConfig,
    arg: Option<&OsStr>,
    what: &'static str,
) -> Result<Option<String>> {
    arg.map(|a| encoding.decode_argument(a, what))
        .transpose()
        .map_err(Into::into)
}

/// Decode, expand `~`, optionally glob, and make each path absolute.
///
/// A wildcard that matches nothing contributes no paths.
pub fn resolve_paths(
    args: &[OsString],
    encoding: &EncodingConfig,
    expand_wildcards: bool,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(args.len());

    for arg in args {
        let decoded = encoding.decode_path(arg).with_context(|| {
            format!(
                "Cannot decode file name {:?}, please use --encoding-filesystem option",
                arg
            )
        })?;
        let expanded = shellexpand::tilde(&decoded);

        if expand_wildcards {
            let entries = glob::glob(&expanded)
                .with_context(|| format!("Invalid wildcard pattern: {}", expanded))?;
            for entry in entries {
                match entry {
                    Ok(path) => paths.push(absolute(&path)?),
                    Err(e) => anyhow::bail!("Cannot expand {}: {}", expanded, e),
                }
            }
        } else {
            paths.push(absolute(Path::new(expanded.as_ref()))?);
        }
    }

    Ok(paths)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Cannot resolve path: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(args: &[&str]) -> Result<Settings> {
        let mut argv = vec!["subst"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        resolve(cli, &Config::default())
    }

    #[test]
    fn test_combined_expression() {
        let s = settings(&["-s", "s/a/b/g", "f.txt"]).unwrap();
        assert_eq!(s.pattern.expression.as_deref(), Some("s/a/b/g"));
        assert_eq!(s.pattern.pattern, None);
        assert_eq!(s.options.mode, Mode::Whole);
        assert_eq!(s.options.backup.suffix(), ".bak");
        assert_eq!(s.options.destination, Destination::InPlace);
        match s.inputs {
            Inputs::Files(paths) => {
                assert_eq!(paths.len(), 1);
                assert!(paths[0].is_absolute());
                assert!(paths[0].ends_with("f.txt"));
            }
            Inputs::Stdin => panic!("expected files"),
        }
    }

    #[test]
    fn test_pattern_requires_replace() {
        assert!(Cli::try_parse_from(["subst", "-p", "a", "f"]).is_err());
        assert!(Cli::try_parse_from(["subst", "-r", "a", "f"]).is_err());
    }

    #[test]
    fn test_pattern_source_required() {
        assert!(Cli::try_parse_from(["subst", "f.txt"]).is_err());
    }

    #[test]
    fn test_separate_pattern_options() {
        let s = settings(&["-p", "a.b", "-r", "x", "-t", "-i", "--pattern-dot-all", "-c", "2", "f"])
            .unwrap();
        assert_eq!(s.pattern.pattern.as_deref(), Some("a.b"));
        assert_eq!(s.pattern.replace.as_deref(), Some("x"));
        assert!(s.pattern.literal);
        assert!(s.pattern.flags.ignore_case);
        assert!(s.pattern.flags.dot_all);
        assert!(!s.pattern.flags.multiline);
        assert_eq!(s.pattern.count, Some(2));
    }

    #[test]
    fn test_no_files_means_stdin() {
        let s = settings(&["-s", "s/a/b/"]).unwrap();
        assert_eq!(s.inputs, Inputs::Stdin);
        assert_eq!(s.options.destination, Destination::Stdout);
        assert!(!s.options.backup.is_enabled());
    }

    #[test]
    fn test_dash_means_stdin() {
        let s = settings(&["-s", "s/a/b/", "-", "other.txt"]).unwrap();
        assert_eq!(s.inputs, Inputs::Stdin);
    }

    #[test]
    fn test_stdout_disables_backup() {
        let s = settings(&["-s", "s/a/b/", "--stdout", "f"]).unwrap();
        assert_eq!(s.options.destination, Destination::Stdout);
        assert!(!s.options.backup.is_enabled());
        assert!(matches!(s.inputs, Inputs::Files(_)));
    }

    #[test]
    fn test_backup_extension() {
        let s = settings(&["-s", "s/a/b/", "-e", "orig", "f"]).unwrap();
        assert_eq!(s.options.backup.suffix(), ".orig");
        let s = settings(&["-s", "s/a/b/", "-b", "f"]).unwrap();
        assert!(!s.options.backup.is_enabled());
        assert!(settings(&["-s", "s/a/b/", "-e", "x/y", "f"]).is_err());
    }

    #[test]
    fn test_encodings() {
        let s = settings(&["-s", "s/a/b/", "--encoding-file", "latin2", "f"]).unwrap();
        assert_eq!(s.options.encoding.file, encoding_rs::ISO_8859_2);
        assert_eq!(s.options.encoding.input, encoding_rs::UTF_8);

        let s = settings(&["-s", "s/a/b/", "--encoding-file", "latin2", "-u", "f"]).unwrap();
        assert_eq!(s.options.encoding.file, encoding_rs::UTF_8);

        assert!(settings(&["-s", "s/a/b/", "--encoding-file", "bogus", "f"]).is_err());
    }

    #[test]
    fn test_linear_rejects_utf16() {
        assert!(settings(&["-s", "s/a/b/", "-l", "--encoding-file", "utf-16le", "f"]).is_err());
        let s = settings(&["-s", "s/a/b/", "-l", "f"]).unwrap();
        assert_eq!(s.options.mode, Mode::Linear);
    }

    #[test]
    fn test_verbosity() {
        let s = settings(&["-s", "s/a/b/", "--verbose", "f"]).unwrap();
        assert_eq!(s.verbosity, Verbosity::Verbose);
        let s = settings(&["-s", "s/a/b/", "--debug", "f"]).unwrap();
        assert_eq!(s.verbosity, Verbosity::Debug);
    }

    #[test]
    fn test_config_defaults_apply() {
        let mut config = Config::default();
        config.backup.extension = "old".to_string();
        config.processing.linear = true;
        let cli = Cli::try_parse_from(["subst", "-s", "s/a/b/", "f"]).unwrap();
        let s = resolve(cli, &config).unwrap();
        assert_eq!(s.options.backup.suffix(), ".old");
        assert_eq!(s.options.mode, Mode::Linear);

        config.backup.enabled = false;
        let cli = Cli::try_parse_from(["subst", "-s", "s/a/b/", "-e", "x", "f"]).unwrap();
        assert!(!resolve(cli, &config).unwrap().options.backup.is_enabled());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = Config::default();
        config.backup.extension = "old".to_string();
        let cli = Cli::try_parse_from(["subst", "-s", "s/a/b/", "-e", "new", "f"]).unwrap();
        assert_eq!(resolve(cli, &config).unwrap().options.backup.suffix(), ".new");
    }

    #[test]
    fn test_wildcard_expansion() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("c.log"), "").unwrap();

        let pattern = OsString::from(format!("{}/*.txt", dir.path().display()));
        let paths = resolve_paths(&[pattern.clone()], &EncodingConfig::utf8(), true).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);

        // without -W the argument is taken literally
        let paths = resolve_paths(&[pattern], &EncodingConfig::utf8(), false).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].to_string_lossy().ends_with("*.txt"));
    }

    #[test]
    fn test_unmatched_wildcard_expands_to_nothing() {
        let dir = TempDir::new().unwrap();
        let pattern = OsString::from(format!("{}/*.none", dir.path().display()));
        let paths = resolve_paths(&[pattern], &EncodingConfig::utf8(), true).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn test_tilde_expansion() {
        let Some(home) = dirs::home_dir() else { return };
        let paths = resolve_paths(&[OsString::from("~/x.txt")], &EncodingConfig::utf8(), false)
            .unwrap();
        assert!(paths[0].starts_with(&home) || paths[0].ends_with("x.txt"));
        assert!(!paths[0].to_string_lossy().contains('~'));
    }
}
