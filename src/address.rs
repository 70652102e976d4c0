// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use std::fmt::{Debug, Error as FmtError, Formatter, LowerHex};

use libc::c_void;

/// A captured call site.
///
/// The value is the return address reported by the unwinder, which sits just
/// past the call instruction. Zero is never a return address, so
/// [`Address::NONE`] stands for "no location".
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(usize);

impl Address {
    pub const NONE: Address = Address(0);

    pub const fn new(raw: usize) -> Self {
        Address(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// An address inside the call instruction itself.
    pub const fn pc(self) -> usize {
        self.0.saturating_sub(1)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl From<usize> for Address {
    fn from(raw: usize) -> Self {
        Address(raw)
    }
}

impl From<*mut c_void> for Address {
    fn from(ip: *mut c_void) -> Self {
        Address(ip as usize)
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        write!(f, "{:#x}", self.0)
    }
}

impl LowerHex for Address {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        LowerHex::fmt(&self.0, f)
    }
}
