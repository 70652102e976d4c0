// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

//! Call-site stack traces for error values.
//!
//! [`Stack::capture`] records the return addresses of the calling thread
//! without resolving anything. A [`StackTrace`] turns them into [`Frame`]s that
//! are symbolized only when printed, in one of the [`FrameFormat`] modes.
//!
//! When an error that already carries a trace is wrapped again on its way up
//! the same call chain, [`ancestor_of`] tells whether the new, shorter capture
//! adds anything:
//!
//! ```
//! use errstack::{retain_unless_ancestor, Stack, StackTrace};
//!
//! fn wrap(existing: Option<&StackTrace>) -> Option<Stack> {
//!     retain_unless_ancestor(Stack::capture(0), existing)
//! }
//!
//! let first = wrap(None).unwrap();
//! println!("{:#}", first);
//! ```

mod address;
mod ancestry;
mod error;
mod format;
mod frames;
mod stack;
mod symbols;

/// Maximum number of addresses kept per [`Stack`].
pub const MAX_DEPTH: usize = 32;

pub use address::Address;
pub use ancestry::{ancestor_of, retain_unless_ancestor};
pub use error::{Error, Result};
pub use format::{FrameDisplay, FrameFormat, TraceDisplay};
pub use frames::{Frame, StackTrace};
pub use stack::{Stack, BASE_SKIP};
pub use symbols::{qualified_name, short_name, HostSymbols, Location, SymbolTable, UNKNOWN};
