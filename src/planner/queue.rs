//! Bounded block FIFO.
//!
//! The planner produces at the head, the step interrupt consumes at the
//! tail. Two implementations are provided: an owned [`BlockQueue`] for
//! single-context use (host tests, or foreground pushes already bracketed
//! by the ISR-disabled critical section), and a [`BlockSource`] impl for
//! the consumer half of `heapless::spsc` when producer and consumer live
//! in different execution contexts.

use heapless::spsc::Consumer;
use heapless::Deque;

use crate::error::QueueError;

use super::block::Block;

/// Consumer-side view of the planner FIFO.
///
/// `peek` exposes the head block without removing it; the executor calls
/// `discard` only after the block's final step event, so `queued` stays
/// true for the whole life of an in-flight block.
pub trait BlockSource {
    /// Borrow the head block, if any.
    fn peek(&mut self) -> Option<&Block>;

    /// Drop the head block.
    fn discard(&mut self);

    /// Whether any block is buffered (including one being executed).
    fn queued(&mut self) -> bool {
        self.peek().is_some()
    }
}

/// Owned bounded FIFO of motion blocks.
///
/// Capacity `N` blocks. Not synchronized: push and pop from the same
/// context, or bracket pushes with the step-ISR-disabled critical
/// section.
#[derive(Debug, Default)]
pub struct BlockQueue<const N: usize> {
    blocks: Deque<Block, N>,
}

impl<const N: usize> BlockQueue<N> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            blocks: Deque::new(),
        }
    }

    /// Append a block.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the FIFO is at capacity.
    pub fn push(&mut self, block: Block) -> Result<(), QueueError> {
        self.blocks.push_back(block).map_err(|_| QueueError::Full)
    }

    /// Number of buffered blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the FIFO is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl<const N: usize> BlockSource for BlockQueue<N> {
    fn peek(&mut self) -> Option<&Block> {
        self.blocks.front()
    }

    fn discard(&mut self) {
        self.blocks.pop_front();
    }

    fn queued(&mut self) -> bool {
        !self.blocks.is_empty()
    }
}

/// SPSC consumer half as a block source.
///
/// The producer half stays with the planner; head/tail index updates
/// carry the necessary fences.
impl<const N: usize> BlockSource for Consumer<'_, Block, N> {
    fn peek(&mut self) -> Option<&Block> {
        Consumer::peek(self)
    }

    fn discard(&mut self) {
        self.dequeue();
    }

    fn queued(&mut self) -> bool {
        Consumer::peek(self).is_some()
    }
}
