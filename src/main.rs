use colored::Colorize;
use std::fmt::Display;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use subst::cli::{parse_args, Inputs, Settings};
use subst::file_processor::{process_file, process_stream};
use subst::logger::{init_logging, Verbosity};
use subst::pattern::{parse_pattern_spec, PatternSpec};

const INDENT: &str = "    ";

fn main() -> ExitCode {
    let settings = match parse_args() {
        Ok(settings) => settings,
        Err(e) => {
            report_error(format!("{:#}", e), false);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(settings.verbosity, settings.log_file.as_deref()) {
        report_error(format!("{:#}", e), false);
    }

    let spec = match parse_pattern_spec(&settings.pattern) {
        Ok(spec) => spec,
        Err(e) => {
            report_error(e, false);
            return ExitCode::from(2);
        }
    };

    let total = match &settings.inputs {
        Inputs::Stdin => run_stdin(&spec, &settings),
        Inputs::Files(paths) => run_files(paths, &spec, &settings),
    };

    if total > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_stdin(spec: &PatternSpec, settings: &Settings) -> usize {
    let stdin = io::stdin();
    let stdout = io::stdout();
    match process_stream(stdin.lock(), BufWriter::new(stdout.lock()), spec, &settings.options) {
        Ok(count) => {
            tracing::info!("{} from stdin", plural(count, "replacement"));
            count
        }
        Err(e) => {
            report_error(e, false);
            0
        }
    }
}

fn run_files(paths: &[PathBuf], spec: &PatternSpec, settings: &Settings) -> usize {
    let verbose = settings.verbosity >= Verbosity::Verbose;
    let mut total = 0;
    let mut changed_files = 0;

    for path in paths {
        if verbose {
            eprintln!("{}", path.display());
        }

        match process_file(path, spec, &settings.options) {
            Ok(count) => {
                if verbose {
                    eprintln!("{}{}", INDENT, plural(count, "replacement"));
                }
                if count > 0 {
                    total += count;
                    changed_files += 1;
                }
            }
            Err(e) => report_error(e, verbose),
        }
    }

    if settings.verbosity == Verbosity::Verbose {
        eprintln!(
            "There was {} in {}.",
            plural(total, "replacement"),
            plural(changed_files, "file")
        );
    }

    total
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn report_error(message: impl Display, indent: bool) {
    let indent = if indent { INDENT } else { "" };
    eprintln!("{}{} {}", indent, "ERROR:".red().bold(), message);
}
