// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use std::fmt::{Debug, Display, Error as FmtError, Formatter};
use std::ops::Deref;

use serde::ser::{Serialize, Serializer};

use crate::address::Address;
use crate::format::{write_frame, write_trace, FrameDisplay, FrameFormat, TraceDisplay};
use crate::stack::Stack;
use crate::symbols::{short_name, HostSymbols, Location, SymbolTable, UNKNOWN};

/// One captured call site.
///
/// A `Frame` only holds its [`Address`]; file, line and function name are
/// looked up every time they are asked for. The `*_in` accessors take the
/// symbol table explicitly, the others use [`HostSymbols`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    addr: Address,
}

impl Frame {
    pub const fn new(addr: Address) -> Self {
        Frame { addr }
    }

    pub const fn address(&self) -> Address {
        self.addr
    }

    pub fn location_in<S: SymbolTable + ?Sized>(&self, symbols: &S) -> Option<Location> {
        symbols.locate(self.addr)
    }

    pub fn file_in<S: SymbolTable + ?Sized>(&self, symbols: &S) -> String {
        self.location_in(symbols)
            .map(|location| location.file)
            .unwrap_or_else(|| UNKNOWN.to_owned())
    }

    pub fn line_in<S: SymbolTable + ?Sized>(&self, symbols: &S) -> u32 {
        self.location_in(symbols)
            .map(|location| location.line)
            .unwrap_or(0)
    }

    /// Fully qualified function name.
    pub fn name_in<S: SymbolTable + ?Sized>(&self, symbols: &S) -> String {
        self.location_in(symbols)
            .map(|location| location.function)
            .unwrap_or_else(|| UNKNOWN.to_owned())
    }

    /// Function name without its package path, see [`short_name`].
    pub fn short_name_in<S: SymbolTable + ?Sized>(&self, symbols: &S) -> String {
        short_name(&self.name_in(symbols)).to_owned()
    }

    pub fn file(&self) -> String {
        self.file_in(&HostSymbols)
    }

    pub fn line(&self) -> u32 {
        self.line_in(&HostSymbols)
    }

    pub fn name(&self) -> String {
        self.name_in(&HostSymbols)
    }

    pub fn short_name(&self) -> String {
        self.short_name_in(&HostSymbols)
    }

    pub fn display(&self, format: FrameFormat) -> FrameDisplay<'static, HostSymbols> {
        self.display_in(format, &HostSymbols)
    }

    pub fn display_in<'a, S: SymbolTable + ?Sized>(
        &self,
        format: FrameFormat,
        symbols: &'a S,
    ) -> FrameDisplay<'a, S> {
        FrameDisplay {
            frame: *self,
            format,
            symbols,
        }
    }

    pub fn render(&self, format: FrameFormat) -> String {
        self.display(format).to_string()
    }

    pub fn render_in<S: SymbolTable + ?Sized>(&self, format: FrameFormat, symbols: &S) -> String {
        self.display_in(format, symbols).to_string()
    }
}

impl From<Address> for Frame {
    fn from(addr: Address) -> Self {
        Frame::new(addr)
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        write!(f, "Frame({:?})", self.addr)
    }
}

/// `{}` renders [`FrameFormat::Compact`], `{:#}` renders [`FrameFormat::Verbose`].
impl Display for Frame {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        let format = if f.alternate() {
            FrameFormat::Verbose
        } else {
            FrameFormat::Compact
        };
        write_frame(f, *self, format, &HostSymbols)
    }
}

/// Serialized as its [`FrameFormat::Machine`] text.
impl Serialize for Frame {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.display(FrameFormat::Machine))
    }
}

/// Frames from innermost (newest) to outermost (oldest), one per address of
/// the [`Stack`] it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StackTrace {
    frames: Vec<Frame>,
}

impl StackTrace {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn display(&self, format: FrameFormat) -> TraceDisplay<'_, HostSymbols> {
        self.display_in(format, &HostSymbols)
    }

    pub fn display_in<'a, S: SymbolTable + ?Sized>(
        &'a self,
        format: FrameFormat,
        symbols: &'a S,
    ) -> TraceDisplay<'a, S> {
        TraceDisplay {
            frames: &self.frames,
            format,
            symbols,
        }
    }

    pub fn render(&self, format: FrameFormat) -> String {
        self.display(format).to_string()
    }

    pub fn render_in<S: SymbolTable + ?Sized>(&self, format: FrameFormat, symbols: &S) -> String {
        self.display_in(format, symbols).to_string()
    }
}

impl From<&Stack> for StackTrace {
    fn from(stack: &Stack) -> Self {
        stack.iter().copied().map(Frame::new).collect()
    }
}

impl FromIterator<Frame> for StackTrace {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        StackTrace {
            frames: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<Address> for StackTrace {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        iter.into_iter().map(Frame::new).collect()
    }
}

impl Deref for StackTrace {
    type Target = [Frame];

    fn deref(&self) -> &[Frame] {
        &self.frames
    }
}

impl<'a> IntoIterator for &'a StackTrace {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// `{}` renders [`FrameFormat::Compact`], `{:#}` renders [`FrameFormat::Verbose`].
impl Display for StackTrace {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        let format = if f.alternate() {
            FrameFormat::Verbose
        } else {
            FrameFormat::Compact
        };
        write_trace(f, &self.frames, format, &HostSymbols)
    }
}

impl Serialize for StackTrace {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.frames.iter())
    }
}
