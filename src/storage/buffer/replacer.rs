use super::frame::{Frame, FrameId};

///  Replacer picks the frame to reuse in case of buffer pool is full.
pub trait Replacer {
    /// Find a frame to reuse among the given frame table. An invalid frame
    /// is returned as is, a valid one is only a candidate when it is not
    /// pinned.
    ///
    /// The replacer only picks the frame, evicting the page it holds, i.e.,
    /// writing it back and unlinking it from the page directory, is up to
    /// the caller.
    ///
    /// Return None if no frame can be reused.
    fn victim(&mut self, frames: &mut [Frame]) -> Option<FrameId>;
}

/// ClockReplacer implements the clock(a.k.a. second chance) replacement
/// policy.
///
/// The frames are arranged in a circle swept by a clock hand. Every access
/// to a frame sets its referenced bit. When looking for a victim, the hand
/// advances frame by frame: a referenced frame gets its bit cleared and is
/// passed over, a pinned frame is passed over, and the first unreferenced
/// unpinned frame is the victim.
///
/// A single call advances the hand at most twice around the circle. The
/// first round may do nothing but clear referenced bits, an unpinned frame
/// is therefore always found in the second round, if there is one.
#[derive(Debug)]
pub struct ClockReplacer {
    pool_size: usize,
    hand: FrameId,
}

impl ClockReplacer {
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "replacer needs at least one frame");
        // the hand moves before inspecting a frame, start right before frame 0.
        ClockReplacer { pool_size, hand: pool_size - 1 }
    }

    /// Current position of the clock hand, i.e., the frame inspected last.
    pub fn hand(&self) -> FrameId {
        self.hand
    }

    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.pool_size;
    }
}

impl Replacer for ClockReplacer {
    fn victim(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        debug_assert_eq!(self.pool_size, frames.len());
        for _ in 0..2 * self.pool_size {
            self.advance();
            let frame = &mut frames[self.hand];
            if !frame.valid {
                return Some(self.hand);
            }
            if frame.referenced {
                frame.referenced = false;
                continue;
            }
            if frame.is_pinned() {
                continue;
            }
            return Some(self.hand);
        }
        None
    }
}
