//! Lane masks and the per-wavefront active-mask stack.

use smallvec::{SmallVec, smallvec};

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-width bitset with one bit per wavefront lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaneMask {
    width: usize,
    words: SmallVec<[u64; 1]>,
}

impl LaneMask {
    /// Mask of `width` lanes, all cleared.
    pub fn new(width: usize) -> Self {
        Self { width, words: smallvec![0; width.div_ceil(WORD_BITS)] }
    }

    /// Mask of `width` lanes, all set.
    pub fn full(width: usize) -> Self {
        let mut mask = Self::new(width);
        mask.fill(true);
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// # Panics
    ///
    /// Panics if `lane` is not below the mask width.
    pub fn get(&self, lane: usize) -> bool {
        assert!(lane < self.width, "lane {lane} out of range for mask of width {}", self.width);
        self.words[lane / WORD_BITS] & (1 << (lane % WORD_BITS)) != 0
    }

    /// # Panics
    ///
    /// Panics if `lane` is not below the mask width.
    pub fn set(&mut self, lane: usize, value: bool) {
        assert!(lane < self.width, "lane {lane} out of range for mask of width {}", self.width);
        let bit = 1 << (lane % WORD_BITS);
        if value {
            self.words[lane / WORD_BITS] |= bit;
        } else {
            self.words[lane / WORD_BITS] &= !bit;
        }
    }

    pub fn fill(&mut self, value: bool) {
        let word = if value { u64::MAX } else { 0 };
        self.words.iter_mut().for_each(|w| *w = word);
        self.clear_tail();
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    /// Set lanes in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.width).filter(move |&lane| self.get(lane))
    }

    // Bits past `width` in the last word stay zero.
    fn clear_tail(&mut self) {
        let tail = self.width % WORD_BITS;
        if tail != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << tail) - 1;
        }
    }
}

impl std::fmt::Display for LaneMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for lane in 0..self.width {
            f.write_str(if self.get(lane) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Error returned by [`ActiveMaskStack`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Overflow { max: usize },
    Underflow { count: usize, depth: usize },
}

/// Stack of active masks used to implement divergent control flow.
///
/// Frame 0 always exists; `top()` is the current stack top index and lies in
/// `[0, max_size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMaskStack {
    /// Frames below the top, oldest first.
    saved: Vec<LaneMask>,
    current: LaneMask,
    max_size: usize,
}

impl ActiveMaskStack {
    /// Stack with a single frame where all `width` lanes are active.
    pub fn new(width: usize, max_size: usize) -> Self {
        Self { saved: Vec::new(), current: LaneMask::full(width), max_size }
    }

    /// Index of the current stack top.
    pub fn top(&self) -> usize {
        self.saved.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn width(&self) -> usize {
        self.current.width()
    }

    /// Mask at the stack top.
    pub fn current(&self) -> &LaneMask {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut LaneMask {
        &mut self.current
    }

    /// Mask at frame `index`, if that frame is live.
    pub fn frame(&self, index: usize) -> Option<&LaneMask> {
        match index.cmp(&self.top()) {
            std::cmp::Ordering::Less => self.saved.get(index),
            std::cmp::Ordering::Equal => Some(&self.current),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Open a new frame that starts as a copy of its parent.
    pub fn push(&mut self) -> Result<(), StackError> {
        if self.top() + 1 >= self.max_size {
            return Err(StackError::Overflow { max: self.max_size });
        }
        self.saved.push(self.current.clone());
        Ok(())
    }

    /// Drop `count` frames. Popping zero frames is a no-op.
    pub fn pop(&mut self, count: usize) -> Result<(), StackError> {
        if count == 0 {
            return Ok(());
        }
        let depth = self.top();
        if depth < count {
            return Err(StackError::Underflow { count, depth });
        }
        self.saved.truncate(depth - count + 1);
        if let Some(restored) = self.saved.pop() {
            self.current = restored;
        }
        Ok(())
    }
}
