//! Pattern specification parsing
//!
//! Accepts either a separate pattern and replacement, or a combined sed-like
//! expression:
//!
//! ```text
//! s/PATTERN/REPLACE/FLAGS      any single character works as the delimiter
//! s(PATTERN)(REPLACE)FLAGS     also s{..}{..}, s[..][..], s<..><..>
//! ```
//!
//! FLAGS is any combination of `g` (unlimited count), `i` (ignore case),
//! `x` (verbose), `s` (dot matches newline) and `m` (multiline).
//!
//! There is no escaping of delimiters. A delimiter that also appears inside the
//! pattern or replacement splits the expression in the wrong place; use
//! `--pattern`/`--replace` (or a bracket pair not used in the pattern) instead.

use regex::{Regex, RegexBuilder};
use std::ops::BitOr;

use crate::error::ParseError;
use crate::regex_error::build_regex_with_context;
use crate::replacer::Replacer;

/// Regex behaviour toggles. Merging is a plain union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternFlags {
    pub ignore_case: bool,
    pub verbose: bool,
    pub dot_all: bool,
    pub multiline: bool,
}

impl PatternFlags {
    pub fn union(self, other: PatternFlags) -> PatternFlags {
        PatternFlags {
            ignore_case: self.ignore_case || other.ignore_case,
            verbose: self.verbose || other.verbose,
            dot_all: self.dot_all || other.dot_all,
            multiline: self.multiline || other.multiline,
        }
    }

    fn configure(&self, builder: &mut RegexBuilder) {
        builder
            .unicode(true)
            .case_insensitive(self.ignore_case)
            .ignore_whitespace(self.verbose)
            .dot_matches_new_line(self.dot_all)
            .multi_line(self.multiline);
    }
}

impl BitOr for PatternFlags {
    type Output = PatternFlags;

    fn bitor(self, rhs: PatternFlags) -> PatternFlags {
        self.union(rhs)
    }
}

/// Flags section of a combined expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub global: bool,
    pub regex: PatternFlags,
}

/// Raw, still unparsed pattern input as collected by the driver.
#[derive(Debug, Clone, Default)]
pub struct PatternArgs {
    pub pattern: Option<String>,
    pub replace: Option<String>,
    /// Combined `s/PAT/REP/FLAGS` expression
    pub expression: Option<String>,
    pub count: Option<usize>,
    /// Match `pattern` as plain text (separate mode only)
    pub literal: bool,
    /// Evaluate the replacement as an expression
    pub eval: bool,
    /// Flags from command-line switches, merged with inline flags
    pub flags: PatternFlags,
}

/// Everything needed to run a substitution.
#[derive(Debug)]
pub struct PatternSpec {
    pub regex: Regex,
    pub replacer: Replacer,
    /// 0 means unlimited
    pub count: usize,
    pub flags: PatternFlags,
}

/// Parse pattern arguments into a `PatternSpec`.
///
/// A separate pattern and replacement take precedence over an expression. Their
/// count defaults to 0 (unlimited), while an expression without `g` defaults to 1.
pub fn parse_pattern_spec(args: &PatternArgs) -> Result<PatternSpec, ParseError> {
    if let (Some(pattern), Some(replace)) = (&args.pattern, &args.replace) {
        let source = if args.literal {
            regex::escape(pattern)
        } else {
            pattern.clone()
        };
        let flags = args.flags;
        let regex = compile_pattern(&source, flags)?;
        let replacer = Replacer::resolve(replace, args.eval)?;
        tracing::debug!("pattern: {:?}, replacement: {:?}", regex.as_str(), replacer);

        return Ok(PatternSpec {
            regex,
            replacer,
            count: args.count.unwrap_or(0),
            flags,
        });
    }

    let Some(expression) = &args.expression else {
        return Err(ParseError::MissingPattern);
    };

    let (pattern, replace, flag_chars) = split_expression(expression)?;
    let inline = parse_flags(flag_chars, expression)?;

    let count = if inline.global {
        0
    } else {
        args.count.unwrap_or(1)
    };
    let flags = inline.regex | args.flags;

    let regex = compile_pattern(pattern, flags)?;
    let replacer = Replacer::resolve(replace, args.eval)?;
    tracing::debug!(
        "expression {:?}: pattern {:?}, replacement {:?}, flags {:?}, count {}",
        expression,
        pattern,
        replacer,
        flags,
        count
    );

    Ok(PatternSpec {
        regex,
        replacer,
        count,
        flags,
    })
}

/// Split `s<delim>PATTERN<delim>REPLACE<delim>FLAGS` into its three parts.
pub fn split_expression(expression: &str) -> Result<(&str, &str, &str), ParseError> {
    let Some(body) = expression.strip_prefix('s') else {
        return Err(ParseError::MissingPrefix(expression.to_string()));
    };
    let bad_pattern = || ParseError::BadPattern(expression.to_string());

    let mut chars = body.chars();
    let delim = chars.next().ok_or_else(bad_pattern)?;
    let rest = chars.as_str();

    if let Some(close) = closing_bracket(delim) {
        return split_bracketed(rest, delim, close).ok_or_else(bad_pattern);
    }

    let mut parts = rest.splitn(3, delim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(pattern), Some(replace), Some(flags)) => Ok((pattern, replace, flags)),
        _ => Err(bad_pattern()),
    }
}

fn closing_bracket(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '{' => Some('}'),
        '[' => Some(']'),
        '<' => Some('>'),
        _ => None,
    }
}

/// `PAT)(REP)FLAGS`: pattern ends at the first `)(`, flags start after the last `)`.
fn split_bracketed(rest: &str, open: char, close: char) -> Option<(&str, &str, &str)> {
    let separator: String = [close, open].iter().collect();
    let (pattern, remainder) = rest.split_once(separator.as_str())?;

    match remainder.rsplit_once(close) {
        Some((replace, flags)) => Some((pattern, replace, flags)),
        None => Some((pattern, remainder, "")),
    }
}

/// Interpret the flags section of an expression. Unknown characters are rejected.
pub fn parse_flags(flags: &str, expression: &str) -> Result<FlagSet, ParseError> {
    let mut set = FlagSet::default();

    for flag in flags.chars() {
        match flag {
            'g' => set.global = true,
            'i' => set.regex.ignore_case = true,
            'x' => set.regex.verbose = true,
            's' => set.regex.dot_all = true,
            'm' => set.regex.multiline = true,
            _ => {
                return Err(ParseError::UnknownFlag {
                    flag,
                    expression: expression.to_string(),
                });
            }
        }
    }

    Ok(set)
}

/// Compile with Unicode matching and the given flags.
pub fn compile_pattern(pattern: &str, flags: PatternFlags) -> Result<Regex, ParseError> {
    let mut builder = RegexBuilder::new(pattern);
    flags.configure(&mut builder);
    build_regex_with_context(&builder, pattern).map_err(|err| ParseError::Regex(Box::new(err)))
}
