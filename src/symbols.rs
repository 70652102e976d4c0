// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::PathBuf;

use symbolic_demangle::demangle;

use crate::address::Address;

/// Placeholder for anything the symbol table could not tell us.
pub const UNKNOWN: &str = "unknown";

/// The resolved form of one [`Address`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    /// Fully qualified function name, `path/pkg.Type.method` style.
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Location {
            function: function.into(),
            file: file.into(),
            line,
        }
    }
}

/// Read-only lookup from captured addresses to source locations.
///
/// Implementations are called from whichever thread formats a trace, so they
/// must tolerate concurrent reads if traces are shared across threads.
pub trait SymbolTable {
    fn locate(&self, addr: Address) -> Option<Location>;
}

impl<T: SymbolTable + ?Sized> SymbolTable for &T {
    fn locate(&self, addr: Address) -> Option<Location> {
        (**self).locate(addr)
    }
}

impl<S: BuildHasher> SymbolTable for HashMap<Address, Location, S> {
    fn locate(&self, addr: Address) -> Option<Location> {
        self.get(&addr).cloned()
    }
}

/// Symbols of the running executable, looked up through `backtrace`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostSymbols;

impl SymbolTable for HostSymbols {
    fn locate(&self, addr: Address) -> Option<Location> {
        if addr.is_none() {
            return None;
        }

        let mut location = None;
        backtrace::resolve(addr.as_ptr(), |symbol| {
            if location.is_none() {
                location = location_of(symbol);
            }
        });
        location
    }
}

trait Symbol: Sized {
    fn name(&self) -> Option<Vec<u8>>;
    fn lineno(&self) -> Option<u32>;
    fn filename(&self) -> Option<PathBuf>;
}

impl Symbol for backtrace::Symbol {
    fn name(&self) -> Option<Vec<u8>> {
        self.name().map(|name| name.as_bytes().to_vec())
    }

    fn lineno(&self) -> Option<u32> {
        self.lineno()
    }

    fn filename(&self) -> Option<PathBuf> {
        self.filename().map(|filename| filename.to_owned())
    }
}

// A symbol without a name has no enclosing function we can report.
fn location_of<S: Symbol>(symbol: &S) -> Option<Location> {
    let name = symbol.name()?;
    let function = qualified_name(&String::from_utf8_lossy(&name));
    let file = symbol
        .filename()
        .map(|filename| filename.display().to_string())
        .unwrap_or_else(|| UNKNOWN.to_owned());

    Some(Location {
        function,
        file,
        line: symbol.lineno().unwrap_or(0),
    })
}

/// Turns a raw (possibly mangled) Rust symbol into the dotted form that
/// [`short_name`] understands, e.g. `errstack::stack::Stack::capture::h0123..`
/// becomes `errstack.stack.Stack.capture`.
pub fn qualified_name(raw: &str) -> String {
    let demangled = demangle(raw);
    dotted(strip_hash(&demangled))
}

fn strip_hash(name: &str) -> &str {
    match name.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            head
        }
        _ => name,
    }
}

// Only separators outside generic brackets are rewritten, so
// `<T as core::ops::Drop>::drop` keeps its inner path.
fn dotted(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' if i == 0 || bytes[i - 1] != b'-' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                out.push_str(&name[start..i]);
                out.push('.');
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&name[start..]);

    out
}

/// Strips the package path from a qualified function name:
/// `a/b/pkg.Type.Method` becomes `Type.Method`, `pkg.Func` becomes `Func`.
/// A name with no `.` after its last `/` is returned as is.
pub fn short_name(name: &str) -> &str {
    let name = match name.rfind('/') {
        Some(i) => &name[i + 1..],
        None => name,
    };
    match name.find('.') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}
