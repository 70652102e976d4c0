// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use std::fmt::{self, Display, Formatter, Write};
use std::path::is_separator;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::frames::Frame;
use crate::symbols::{short_name, SymbolTable, UNKNOWN};

/// How a [`Frame`] or a [`StackTrace`](crate::StackTrace) is rendered.
///
/// | mode     | frame                        | trace                  |
/// |----------|------------------------------|------------------------|
/// | Compact  | `file.rs:42`                 | `[f1 f2 ...]`          |
/// | Verbose  | `Type.method\n\t/p/file.rs:42` | `\n` before each frame |
/// | NameOnly | `Type.method`                | `[f1 f2 ...]`          |
/// | Machine  | `pkg.Type.method /p/file.rs:42` or `unknown` | `[f1 f2 ...]` |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    #[default]
    Compact,
    Verbose,
    NameOnly,
    Machine,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameFormat::Compact => "compact",
            FrameFormat::Verbose => "verbose",
            FrameFormat::NameOnly => "name",
            FrameFormat::Machine => "machine",
        }
    }
}

impl FromStr for FrameFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(FrameFormat::Compact),
            "verbose" => Ok(FrameFormat::Verbose),
            "name" => Ok(FrameFormat::NameOnly),
            "machine" => Ok(FrameFormat::Machine),
            _ => Err(Error::UnknownFormat(s.to_owned())),
        }
    }
}

impl Display for FrameFormat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Last element of `file`, ignoring trailing separators. An empty path gives
// `.` and a path of only separators gives the separator.
fn basename(file: &str) -> &str {
    if file.is_empty() {
        return ".";
    }
    let trimmed = file.trim_end_matches(is_separator);
    if trimmed.is_empty() {
        return &file[..1];
    }
    match trimmed.rfind(is_separator) {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

pub(crate) fn write_frame<W, S>(
    w: &mut W,
    frame: Frame,
    format: FrameFormat,
    symbols: &S,
) -> fmt::Result
where
    W: Write + ?Sized,
    S: SymbolTable + ?Sized,
{
    let location = symbols.locate(frame.address());
    let (function, file, line) = match &location {
        Some(location) => (location.function.as_str(), location.file.as_str(), location.line),
        None => (UNKNOWN, UNKNOWN, 0),
    };

    match format {
        FrameFormat::Compact => write!(w, "{}:{}", basename(file), line),
        FrameFormat::Verbose => write!(w, "{}\n\t{}:{}", short_name(function), file, line),
        FrameFormat::NameOnly => w.write_str(short_name(function)),
        FrameFormat::Machine if function == UNKNOWN => w.write_str(UNKNOWN),
        FrameFormat::Machine => write!(w, "{} {}:{}", function, file, line),
    }
}

pub(crate) fn write_trace<W, S>(
    w: &mut W,
    frames: &[Frame],
    format: FrameFormat,
    symbols: &S,
) -> fmt::Result
where
    W: Write + ?Sized,
    S: SymbolTable + ?Sized,
{
    if format == FrameFormat::Verbose {
        for frame in frames {
            w.write_char('\n')?;
            write_frame(w, *frame, format, symbols)?;
        }
        return Ok(());
    }

    w.write_char('[')?;
    for (i, frame) in frames.iter().enumerate() {
        if i > 0 {
            w.write_char(' ')?;
        }
        write_frame(w, *frame, format, symbols)?;
    }
    w.write_char(']')
}

/// A [`Frame`] paired with a mode and a symbol table, ready for `{}`.
pub struct FrameDisplay<'a, S: ?Sized> {
    pub(crate) frame: Frame,
    pub(crate) format: FrameFormat,
    pub(crate) symbols: &'a S,
}

impl<S: SymbolTable + ?Sized> Display for FrameDisplay<'_, S> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write_frame(f, self.frame, self.format, self.symbols)
    }
}

/// A run of frames paired with a mode and a symbol table, ready for `{}`.
pub struct TraceDisplay<'a, S: ?Sized> {
    pub(crate) frames: &'a [Frame],
    pub(crate) format: FrameFormat,
    pub(crate) symbols: &'a S,
}

impl<S: SymbolTable + ?Sized> Display for TraceDisplay<'_, S> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write_trace(f, self.frames, self.format, self.symbols)
    }
}
