//! Regex Error Handling
//!
//! Turns `regex::Error` into a diagnosis the user can act on. Most failures come
//! from PCRE/Python habits that the `regex` crate does not accept (look-around,
//! backreferences inside the pattern), so those get dedicated suggestions.

use regex::Error as RegexError;
use std::fmt;

/// Enhanced regex error with helpful context
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedRegexError {
    /// The pattern that failed to compile
    pub pattern: String,
    pub error_type: RegexErrorType,
    pub suggestion: Option<String>,
}

/// Types of regex errors with specific diagnostic information
#[derive(Debug, Clone, PartialEq)]
pub enum RegexErrorType {
    Syntax { message: String },
    InvalidEscape { sequence: String, position: usize },
    /// Unclosed group, class or counted repetition
    UnclosedDelimiter { delimiter: char, position: usize },
    /// Nothing to repeat, `**`, malformed `{n,m}`
    InvalidQuantifier { message: String, position: Option<usize> },
    Lookaround { message: String },
    Backreference { message: String },
    /// Compiled program exceeds the size limit
    TooLarge { message: String },
}

impl EnhancedRegexError {
    pub fn from_regex_error(err: &RegexError, pattern: &str) -> Self {
        let error_type = match err {
            RegexError::CompiledTooBig(limit) => RegexErrorType::TooLarge {
                message: format!("compiled regex exceeds size limit of {} bytes", limit),
            },
            _ => Self::classify_error(&err.to_string(), pattern),
        };
        let suggestion = Self::generate_suggestion(&error_type, pattern);

        EnhancedRegexError {
            pattern: pattern.to_string(),
            error_type,
            suggestion,
        }
    }

    fn classify_error(error_msg: &str, pattern: &str) -> RegexErrorType {
        let lower_msg = error_msg.to_lowercase();

        if lower_msg.contains("unclosed") {
            let candidates = if lower_msg.contains("character class") {
                [('[', ']')].as_slice()
            } else if lower_msg.contains("group") {
                [('(', ')')].as_slice()
            } else {
                [('{', '}'), ('(', ')'), ('[', ']')].as_slice()
            };
            for &(open, close) in candidates {
                if let Some(position) = find_unclosed_delimiter(pattern, open, close) {
                    return RegexErrorType::UnclosedDelimiter {
                        delimiter: open,
                        position,
                    };
                }
            }
        }

        if lower_msg.contains("look-around") || lower_msg.contains("lookaround") {
            return RegexErrorType::Lookaround {
                message: error_msg.to_string(),
            };
        }

        if lower_msg.contains("backreference") {
            return RegexErrorType::Backreference {
                message: error_msg.to_string(),
            };
        }

        if lower_msg.contains("escape") {
            if let Some(position) = find_invalid_escape(pattern) {
                return RegexErrorType::InvalidEscape {
                    sequence: extract_escape_at(pattern, position),
                    position,
                };
            }
        }

        if lower_msg.contains("repetition") || lower_msg.contains("quantifier") {
            return RegexErrorType::InvalidQuantifier {
                message: error_msg.to_string(),
                position: find_invalid_quantifier(pattern),
            };
        }

        RegexErrorType::Syntax {
            message: error_msg.to_string(),
        }
    }

    fn generate_suggestion(error_type: &RegexErrorType, pattern: &str) -> Option<String> {
        match error_type {
            RegexErrorType::UnclosedDelimiter {
                delimiter,
                position,
            } => {
                let closer = match delimiter {
                    '(' => ')',
                    '[' => ']',
                    '{' => '}',
                    _ => return None,
                };
                Some(format!(
                    "Add a closing '{}' to match the opening '{}' at position {}, \
                    or escape it as '\\{}' to match it literally.",
                    closer, delimiter, position, delimiter
                ))
            }
            RegexErrorType::InvalidEscape { sequence, .. } => Some(format!(
                "The escape sequence '{}' is not recognized. \
                Common escapes are: \\n, \\t, \\d, \\w, \\s, \\xHH, \\x{{HHHH}}. \
                Use -t/--string to match the pattern as plain text.",
                sequence
            )),
            RegexErrorType::InvalidQuantifier { .. } => {
                if pattern.starts_with(['*', '+', '?']) {
                    Some("A quantifier at the start of the pattern has nothing to repeat. \
                        Escape it (e.g. '\\*') to match it literally.".to_string())
                } else {
                    Some("Check your quantifier syntax: * (zero or more), + (one or more), \
                        ? (zero or one), {n,m} (n to m times).".to_string())
                }
            }
            RegexErrorType::Lookaround { .. } => Some(
                "Look-ahead and look-behind ((?=...), (?!...), (?<=...), (?<!...)) are not \
                supported. Capture the surrounding text instead and put it back in the \
                replacement with $1, $2, ..."
                    .to_string(),
            ),
            RegexErrorType::Backreference { .. } => Some(
                "Backreferences inside the pattern (\\1, \\2, ...) are not supported. \
                In the replacement, refer to groups with $1, ${1} or ${name}."
                    .to_string(),
            ),
            RegexErrorType::TooLarge { .. } => Some(
                "Simplify the pattern, e.g. reduce large counted repetitions like a{1000}."
                    .to_string(),
            ),
            RegexErrorType::Syntax { .. } => Some(
                "Check your regex syntax. Escape special characters: . + * ? ^ $ | ( ) [ ] { } \\ \
                or use -t/--string to match the pattern as plain text."
                    .to_string(),
            ),
        }
    }

    /// Format the error as a user-friendly message
    pub fn display(&self) -> String {
        let mut output = String::from("Regex Error\n");
        output.push_str(&format!("  Pattern: \"{}\"\n", self.pattern));

        match &self.error_type {
            RegexErrorType::Syntax { message } => {
                output.push_str("  Type: Syntax error\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::InvalidEscape { sequence, position } => {
                output.push_str("  Type: Invalid escape sequence\n");
                output.push_str(&format!(
                    "  Sequence: '{}' at position {}\n",
                    sequence, position
                ));
            }
            RegexErrorType::UnclosedDelimiter {
                delimiter,
                position,
            } => {
                output.push_str("  Type: Unclosed delimiter\n");
                output.push_str(&format!(
                    "  Opening '{}' at position {} is never closed\n",
                    delimiter, position
                ));
            }
            RegexErrorType::InvalidQuantifier { message, .. } => {
                output.push_str("  Type: Invalid quantifier\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::Lookaround { message } => {
                output.push_str("  Type: Unsupported look-around\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::Backreference { message } => {
                output.push_str("  Type: Unsupported backreference\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::TooLarge { message } => {
                output.push_str("  Type: Pattern too large\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
        }

        if let Some(ref suggestion) = self.suggestion {
            output.push_str(&format!("  Suggestion: {}\n", suggestion));
        }

        output
    }
}

impl fmt::Display for EnhancedRegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display().trim_end())
    }
}

/// Position (in chars) of the last unmatched opening delimiter, if any.
fn find_unclosed_delimiter(pattern: &str, open: char, close: char) -> Option<usize> {
    let mut stack = Vec::new();
    let mut in_char_class = false;
    let mut escaped = false;

    for (i, c) in pattern.chars().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if open != '[' {
            if c == '[' {
                in_char_class = true;
                continue;
            } else if c == ']' {
                in_char_class = false;
                continue;
            }
            if in_char_class {
                continue;
            }
        }
        if c == open {
            stack.push(i);
        } else if c == close {
            stack.pop();
        }
    }

    stack.last().copied()
}

fn find_invalid_escape(pattern: &str) -> Option<usize> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            let is_valid = matches!(
                chars[i + 1],
                'n' | 't' | 'r' | 'f' | 'v' | 'a' | '0'
                    | '\\' | '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']'
                    | '{' | '}' | '|' | '-' | '&' | '~' | '#' | ' '
                    | 'x' | 'u' | 'U' | 'p' | 'P'
                    | 'w' | 'W' | 'd' | 'D' | 's' | 'S' | 'b' | 'B' | 'A' | 'z'
            );
            if !is_valid {
                return Some(i);
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    None
}

fn extract_escape_at(pattern: &str, pos: usize) -> String {
    pattern.chars().skip(pos).take(2).collect()
}

fn find_invalid_quantifier(pattern: &str) -> Option<usize> {
    let chars: Vec<char> = pattern.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '*' | '+' | '?') {
            if i == 0 {
                return Some(i);
            }
            if matches!(chars[i - 1], '(' | '|') {
                return Some(i);
            }
        }
    }

    None
}

/// Compile a regex through `builder`, mapping failures to an `EnhancedRegexError`.
pub fn build_regex_with_context(
    builder: &regex::RegexBuilder,
    pattern: &str,
) -> Result<regex::Regex, EnhancedRegexError> {
    builder
        .build()
        .map_err(|err| EnhancedRegexError::from_regex_error(&err, pattern))
}
