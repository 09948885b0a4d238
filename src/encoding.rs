//! Text encodings used while processing
//!
//! Three independent encodings are involved: one for command-line arguments
//! (pattern, replacement), one for file content and one for file names. They are
//! resolved once at startup and passed explicitly to whatever needs them.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::borrow::Cow;
use std::ffi::OsStr;

use crate::error::{ParseError, SubstError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingConfig {
    pub input: &'static Encoding,
    pub file: &'static Encoding,
    pub filesystem: &'static Encoding,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::utf8()
    }
}

impl EncodingConfig {
    pub fn utf8() -> Self {
        Self {
            input: UTF_8,
            file: UTF_8,
            filesystem: UTF_8,
        }
    }

    /// Build from WHATWG labels ("utf-8", "latin1", "windows-1250", ...).
    pub fn from_labels(input: &str, file: &str, filesystem: &str) -> Result<Self, String> {
        Ok(Self {
            input: lookup(input)?,
            file: lookup(file)?,
            filesystem: lookup(filesystem)?,
        })
    }

    /// Decode file content. Malformed sequences are an error, never replaced.
    pub fn decode_content<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, SubstError> {
        decode_strict(self.file, bytes).ok_or(SubstError::Decode {
            encoding: self.file.name(),
        })
    }

    /// Encode transformed content back into the file encoding.
    pub fn encode_content<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, SubstError> {
        // encoding_rs only encodes into an encoding's output encoding, which is UTF-8 for UTF-16
        if self.file == UTF_16LE {
            return Ok(Cow::Owned(text.encode_utf16().flat_map(u16::to_le_bytes).collect()));
        }
        if self.file == UTF_16BE {
            return Ok(Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect()));
        }
        if self.file.output_encoding() != self.file {
            return Err(SubstError::Encode {
                encoding: self.file.name(),
            });
        }

        let (bytes, _, had_unmappable) = self.file.encode(text);
        if had_unmappable {
            return Err(SubstError::Encode {
                encoding: self.file.name(),
            });
        }
        Ok(bytes)
    }

    /// Decode a command-line argument with the input encoding.
    pub fn decode_argument(&self, arg: &OsStr, what: &'static str) -> Result<String, ParseError> {
        decode_os_str(self.input, arg)
            .ok_or(ParseError::ArgumentEncoding {
                what,
                encoding: self.input.name(),
            })
    }

    /// Decode a path argument with the filesystem encoding.
    pub fn decode_path(&self, arg: &OsStr) -> Option<String> {
        decode_os_str(self.filesystem, arg)
    }
}

pub fn lookup(label: &str) -> Result<&'static Encoding, String> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| format!("unknown encoding: {}", label))
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).ok().map(Cow::Borrowed);
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

#[cfg(unix)]
fn decode_os_str(encoding: &'static Encoding, arg: &OsStr) -> Option<String> {
    use std::os::unix::ffi::OsStrExt;
    decode_strict(encoding, arg.as_bytes()).map(Cow::into_owned)
}

#[cfg(not(unix))]
fn decode_os_str(_encoding: &'static Encoding, arg: &OsStr) -> Option<String> {
    arg.to_str().map(str::to_owned)
}
