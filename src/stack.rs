// Copyright 2026 TiKV Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Error as FmtError, Formatter};
use std::ops::Deref;

use once_cell::sync::OnceCell;
use smallvec::SmallVec;

use crate::address::Address;
use crate::frames::StackTrace;
use crate::MAX_DEPTH;

/// Frames hidden when the capture frame cannot be located: the unwinder entry,
/// [`Stack::capture`] itself and the annotating function that called it.
pub const BASE_SKIP: usize = 3;

// Frames between `Stack::capture` and the call site being recorded.
const ANNOTATOR_FRAMES: usize = 1;

const MARKER_SEARCH_LIMIT: usize = 16;

// Raw frames up to and including `Stack::capture`, once observed.
static INTERNAL_FRAMES: OnceCell<usize> = OnceCell::new();

/// Return addresses of the calling thread, innermost first, at most
/// [`MAX_DEPTH`] of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stack {
    addrs: SmallVec<[Address; MAX_DEPTH]>,
}

impl Stack {
    /// Records the call chain of the function that called the annotating
    /// function, i.e. the caller of the caller of `capture`.
    ///
    /// `skip` hides that many further frames, for helpers that wrap the
    /// annotating function and want the record to start at their own caller.
    /// Chains deeper than [`MAX_DEPTH`] keep their innermost frames only.
    #[inline(never)]
    pub fn capture(skip: usize) -> Stack {
        let mut recorder = Recorder::new(skip, INTERNAL_FRAMES.get().copied());
        backtrace::trace(|frame| {
            recorder.visit(Address::from(frame.ip()), || frame.symbol_address() as usize)
        });
        if let Some(internal) = recorder.internal {
            let _ = INTERNAL_FRAMES.set(internal);
        }
        recorder.finish()
    }

    pub fn trace(&self) -> StackTrace {
        StackTrace::from(self)
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.addrs
    }
}

impl Deref for Stack {
    type Target = [Address];

    fn deref(&self) -> &[Address] {
        &self.addrs
    }
}

/// Keeps the first [`MAX_DEPTH`] addresses.
impl FromIterator<Address> for Stack {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Stack {
            addrs: iter.into_iter().take(MAX_DEPTH).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Stack {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.iter()
    }
}

impl Display for Stack {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        Display::fmt(&self.trace(), f)
    }
}

// A skip past the end of the chain leaves nothing to record.
fn hidden_frames(internal: usize, skip: usize) -> usize {
    internal
        .saturating_add(ANNOTATOR_FRAMES)
        .saturating_add(skip)
}

struct Recorder {
    skip: usize,
    marker: usize,
    // Raw frames up to and including the marker, when found during this walk.
    internal: Option<usize>,
    // Leading raw frames to drop; unknown until `Stack::capture` is seen.
    hidden: Option<usize>,
    seen: usize,
    head: [Address; MARKER_SEARCH_LIMIT],
    addrs: SmallVec<[Address; MAX_DEPTH]>,
    truncated: bool,
}

impl Recorder {
    fn new(skip: usize, internal: Option<usize>) -> Self {
        Recorder {
            skip,
            marker: Stack::capture as usize,
            internal: None,
            hidden: internal.map(|internal| hidden_frames(internal, skip)),
            seen: 0,
            head: [Address::NONE; MARKER_SEARCH_LIMIT],
            addrs: SmallVec::new(),
            truncated: false,
        }
    }

    // Returns whether the unwinder should keep going.
    fn visit(&mut self, ip: Address, enclosing: impl FnOnce() -> usize) -> bool {
        let index = self.seen;
        self.seen += 1;

        match self.hidden {
            Some(hidden) if index < hidden => true,
            Some(_) => self.push(ip),
            None => {
                self.head[index] = ip;
                if enclosing() == self.marker {
                    self.internal = Some(index + 1);
                    self.hidden = Some(hidden_frames(index + 1, self.skip));
                } else if self.seen == MARKER_SEARCH_LIMIT {
                    self.fall_back();
                }
                !self.truncated
            }
        }
    }

    fn push(&mut self, ip: Address) -> bool {
        if self.addrs.len() == MAX_DEPTH {
            self.truncated = true;
            return false;
        }
        self.addrs.push(ip);
        true
    }

    // Replays the buffered head of the trace with a fixed skip.
    fn fall_back(&mut self) {
        log::debug!(
            "capture frame not found among {} frames, hiding {} frames",
            self.seen,
            BASE_SKIP
        );
        let hidden = BASE_SKIP.saturating_add(self.skip);
        self.hidden = Some(hidden);

        let head = self.head;
        for ip in head.iter().take(self.seen).skip(hidden) {
            if !self.push(*ip) {
                break;
            }
        }
    }

    fn finish(mut self) -> Stack {
        if self.hidden.is_none() {
            self.fall_back();
        }
        if self.truncated {
            log::trace!("call chain deeper than {} frames, keeping the innermost", MAX_DEPTH);
        }

        Stack { addrs: self.addrs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hint::black_box;

    #[inline(never)]
    fn annotate(skip: usize) -> Stack {
        black_box(Stack::capture(skip))
    }

    #[inline(never)]
    fn call_site() -> Stack {
        black_box(annotate(0))
    }

    #[inline(never)]
    fn helper() -> Stack {
        black_box(annotate(1))
    }

    #[inline(never)]
    fn helper_caller() -> Stack {
        black_box(helper())
    }

    #[inline(never)]
    fn recurse(depth: usize) -> Stack {
        if depth == 0 {
            black_box(annotate(0))
        } else {
            black_box(recurse(black_box(depth - 1)))
        }
    }

    fn addrs(raw: &[usize]) -> Vec<Address> {
        raw.iter().copied().map(Address::new).collect()
    }

    #[test]
    fn capture_is_bounded() {
        for skip in 0..4 {
            assert!(annotate(skip).len() <= MAX_DEPTH);
        }
        assert_eq!(recurse(100).len(), MAX_DEPTH);
    }

    #[test]
    fn deep_chain_keeps_innermost() {
        let stack = recurse(100);
        let trace = stack.trace();

        assert!(trace[0].name().ends_with("recurse"));
        assert!(trace[MAX_DEPTH - 1].name().ends_with("recurse"));
    }

    #[test]
    fn innermost_frame_is_the_call_site() {
        let stack = call_site();

        assert!(!stack.is_empty());
        assert!(stack.trace()[0].name().ends_with("call_site"));
    }

    #[test]
    fn skip_attributes_to_helper_caller() {
        let stack = helper_caller();

        assert!(!stack.is_empty());
        assert!(stack.trace()[0].name().ends_with("helper_caller"));
    }

    #[test]
    fn skip_past_the_chain_is_empty() {
        assert!(annotate(10_000).is_empty());
    }

    #[test]
    fn huge_skip_is_empty() {
        // The capture in between caches the internal frame count.
        assert!(annotate(usize::MAX).is_empty());
        assert!(!annotate(0).is_empty());
        assert!(annotate(usize::MAX).is_empty());
        assert!(annotate(usize::MAX - 1).is_empty());
    }

    #[test]
    fn recorder_saturates_hidden_frames() {
        let mut recorder = Recorder::new(usize::MAX, Some(3));
        assert_eq!(recorder.hidden, Some(usize::MAX));
        assert!(recorder.visit(Address::new(1), || unreachable!()));
        assert!(recorder.finish().is_empty());

        let mut recorder = Recorder::new(usize::MAX, None);
        let marker = recorder.marker;
        assert!(recorder.visit(Address::new(1), || marker));
        assert_eq!(recorder.hidden, Some(usize::MAX));
        assert!(recorder.finish().is_empty());

        let mut recorder = Recorder::new(usize::MAX - 1, None);
        for raw in 1..=4 {
            assert!(recorder.visit(Address::new(raw), || 0));
        }
        assert!(recorder.finish().is_empty());
    }

    #[test]
    fn recorder_skips_through_marker() {
        let mut recorder = Recorder::new(0, None);
        let marker = recorder.marker;

        assert!(recorder.visit(Address::new(1), || 0));
        assert!(recorder.visit(Address::new(2), || marker));
        assert!(recorder.visit(Address::new(3), || 0));
        assert!(recorder.visit(Address::new(4), || 0));
        assert!(recorder.visit(Address::new(5), || 0));

        assert_eq!(recorder.finish().as_slice(), addrs(&[4, 5]).as_slice());
    }

    #[test]
    fn recorder_uses_known_internal_frames() {
        let mut recorder = Recorder::new(2, Some(3));

        for raw in 1..=8 {
            assert!(recorder.visit(Address::new(raw), || unreachable!()));
        }

        assert_eq!(recorder.internal, None);
        assert_eq!(recorder.finish().as_slice(), addrs(&[7, 8]).as_slice());
    }

    #[test]
    fn recorder_falls_back_without_marker() {
        let mut recorder = Recorder::new(1, None);

        for raw in 1..=6 {
            assert!(recorder.visit(Address::new(raw), || 0));
        }

        assert_eq!(recorder.finish().as_slice(), addrs(&[5, 6]).as_slice());
    }

    #[test]
    fn recorder_falls_back_at_search_limit() {
        let mut recorder = Recorder::new(0, None);

        for raw in 1..=MARKER_SEARCH_LIMIT + 2 {
            assert!(recorder.visit(Address::new(raw), || 0));
        }

        let stack = recorder.finish();
        assert_eq!(stack.len(), MARKER_SEARCH_LIMIT + 2 - BASE_SKIP);
        assert_eq!(stack[0], Address::new(BASE_SKIP + 1));
    }

    #[test]
    fn recorder_stops_at_max_depth() {
        let mut recorder = Recorder::new(0, None);
        recorder.hidden = Some(0);

        for raw in 1..=MAX_DEPTH {
            assert!(recorder.visit(Address::new(raw), || 0));
        }
        assert!(!recorder.visit(Address::new(MAX_DEPTH + 1), || 0));

        let stack = recorder.finish();
        assert_eq!(stack.len(), MAX_DEPTH);
        assert_eq!(stack[MAX_DEPTH - 1], Address::new(MAX_DEPTH));
    }

    #[test]
    fn collect_truncates() {
        let stack: Stack = (1..=MAX_DEPTH + 8).map(Address::new).collect();

        assert_eq!(stack.len(), MAX_DEPTH);
        assert_eq!(stack[0], Address::new(1));
    }
}
