//! A chain of lazily allocated, fixed-size blocks addressed by dense index.
//!
//! Blocks are allocated on first touch and never move, so `&T` handed out for one index stays
//! valid for the chain's lifetime while other threads keep allocating further blocks.

use std::sync::OnceLock;

pub const DEFAULT_BLOCK_SIZE: usize = 4096;

pub struct BlockChain<T> {
    blocks: Box<[OnceLock<Box<[T]>>]>,
    block_size: usize,
    capacity: usize,
}

impl<T: Default> BlockChain<T> {
    pub fn new(capacity: usize, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let n_blocks = capacity.div_ceil(block_size);
        let blocks = (0..n_blocks).map(|_| OnceLock::new()).collect();
        Self {
            blocks,
            block_size,
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot `index` if its block has been allocated.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.capacity {
            return None;
        }
        let block = self.blocks[index / self.block_size].get()?;
        Some(&block[index % self.block_size])
    }

    /// Slot `index`, allocating its block if needed. `None` past capacity.
    pub fn get_or_alloc(&self, index: usize) -> Option<&T> {
        if index >= self.capacity {
            return None;
        }
        let block_size = self.block_size;
        let block = self.blocks[index / block_size]
            .get_or_init(|| (0..block_size).map(|_| T::default()).collect());
        Some(&block[index % block_size])
    }

    /// Number of blocks currently backed by memory.
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_allocated_on_demand() {
        let chain: BlockChain<u64> = BlockChain::new(10, 4);
        assert_eq!(chain.allocated_blocks(), 0);
        assert!(chain.get(5).is_none());
        assert_eq!(chain.get_or_alloc(5), Some(&0));
        assert_eq!(chain.allocated_blocks(), 1);
        assert!(chain.get(4).is_some());
        assert!(chain.get(3).is_none());
        assert!(chain.get_or_alloc(10).is_none());
    }
}
