// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use crate::frames::StackTrace;
use crate::stack::Stack;

/// Whether `candidate` looks like it was captured higher up the same call
/// chain that produced `cause`.
///
/// Both are stored innermost first, so the frames they share (thread entry,
/// test harness, ...) sit at the tail. Every address of `candidate` must equal
/// the address at the same distance from the end of `cause`. A candidate
/// longer than the cause never matches; an empty one always does.
pub fn ancestor_of(candidate: &Stack, cause: &StackTrace) -> bool {
    // Stacks captured further up are never longer than the cause.
    if candidate.len() > cause.len() {
        return false;
    }

    let offset = cause.len() - candidate.len();
    candidate
        .iter()
        .zip(&cause[offset..])
        .all(|(ours, theirs)| *ours == theirs.address())
}

/// Decides whether a freshly captured stack is worth attaching to an error
/// whose cause chain already carries `cause`.
///
/// Returns `None` when `candidate` is an ancestor of `cause`, meaning the
/// error should share the existing trace.
pub fn retain_unless_ancestor(candidate: Stack, cause: Option<&StackTrace>) -> Option<Stack> {
    match cause {
        Some(cause) if ancestor_of(&candidate, cause) => {
            log::debug!(
                "dropping {} frame stack, reusing {} frame stack of the cause",
                candidate.len(),
                cause.len()
            );
            None
        }
        _ => Some(candidate),
    }
}
