//! Substitution engine
//!
//! Two strategies with the same contract: read `input`, write the transformed
//! text to `output`, return the number of replacements made.
//!
//! - `Mode::Whole` reads everything into memory and makes one bounded pass.
//!   Patterns may span lines; memory use grows with the input.
//! - `Mode::Linear` handles one line at a time (terminators kept) with a running
//!   budget. Memory stays bounded, but a match can never cross a line boundary.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use crate::encoding::EncodingConfig;
use crate::error::SubstError;
use crate::pattern::PatternSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Whole,
    Linear,
}

/// Replace up to `limit` matches in `text` (0 = all of them).
pub fn replace_text<'t>(
    spec: &PatternSpec,
    text: &'t str,
    limit: usize,
) -> Result<(Cow<'t, str>, usize), SubstError> {
    let mut matches = spec.regex.captures_iter(text).peekable();
    if matches.peek().is_none() {
        return Ok((Cow::Borrowed(text), 0));
    }

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut replaced = 0;
    // characters in text[..last_end], only tracked for expressions
    let count_chars = spec.replacer.is_expression();
    let mut chars_before = 0;

    for caps in matches {
        if limit > 0 && replaced >= limit {
            break;
        }
        let Some(whole) = caps.get(0) else { continue };
        let gap = &text[last_end..whole.start()];
        result.push_str(gap);

        let char_start = if count_chars {
            chars_before + gap.chars().count()
        } else {
            0
        };
        spec.replacer.append(&spec.regex, &caps, char_start, &mut result)?;
        if count_chars {
            chars_before = char_start + whole.as_str().chars().count();
        }
        last_end = whole.end();
        replaced += 1;
    }
    result.push_str(&text[last_end..]);

    Ok((Cow::Owned(result), replaced))
}

/// Run the substitution over a stream, returning the replacement count.
pub fn substitute<R: BufRead, W: Write>(
    mode: Mode,
    input: R,
    output: W,
    spec: &PatternSpec,
    encoding: &EncodingConfig,
) -> Result<usize, SubstError> {
    match mode {
        Mode::Whole => substitute_whole(input, output, spec, encoding),
        Mode::Linear => substitute_linear(input, output, spec, encoding),
    }
}

fn substitute_whole<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    spec: &PatternSpec,
    encoding: &EncodingConfig,
) -> Result<usize, SubstError> {
    let mut data = Vec::new();
    input
        .read_to_end(&mut data)
        .map_err(|source| SubstError::Read { source })?;

    let text = encoding.decode_content(&data)?;
    let (result, replaced) = replace_text(spec, &text, spec.count)?;

    let bytes = if replaced == 0 {
        Cow::Borrowed(data.as_slice())
    } else {
        encoding.encode_content(&result)?
    };
    write_all(&mut output, &bytes)?;
    output.flush().map_err(|source| SubstError::Write { source })?;

    Ok(replaced)
}

fn substitute_linear<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    spec: &PatternSpec,
    encoding: &EncodingConfig,
) -> Result<usize, SubstError> {
    let mut total = 0;
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = input
            .read_until(b'\n', &mut line)
            .map_err(|source| SubstError::Read { source })?;
        if read == 0 {
            break;
        }

        let text = encoding.decode_content(&line)?;

        let budget_left = spec.count == 0 || total < spec.count;
        if !budget_left {
            write_all(&mut output, &line)?;
            continue;
        }

        let limit = if spec.count == 0 { 0 } else { spec.count - total };
        let (result, replaced) = replace_text(spec, &text, limit)?;
        total += replaced;

        if replaced == 0 {
            write_all(&mut output, &line)?;
        } else {
            let bytes = encoding.encode_content(&result)?;
            write_all(&mut output, &bytes)?;
        }
    }

    output.flush().map_err(|source| SubstError::Write { source })?;
    Ok(total)
}

fn write_all<W: Write>(output: &mut W, bytes: &[u8]) -> Result<(), SubstError> {
    output
        .write_all(bytes)
        .map_err(|source| SubstError::Write { source })
}
