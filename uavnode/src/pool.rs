//! Fixed-capacity block arena backing reassembly sessions and the outbound frame queue
//!
//! The pool hands out equally sized blocks by index. Nothing is allocated dynamically:
//! the whole arena lives inside the owning node.

pub const BLOCK_SIZE: usize = 32;

/// Default pool capacity, 1 KiB of payload storage
pub const DEFAULT_BLOCK_COUNT: usize = 32;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockIndex(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolExhausted;

/// Pool usage snapshot
///
/// `peak_usage_blocks` covers the interval since the previous [`Pool::reset_peak`] call
/// and is never below the current usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolStatistics {
    pub capacity_blocks: u16,
    pub current_usage_blocks: u16,
    pub peak_usage_blocks: u16,
}

impl PoolStatistics {
    pub fn peak_percent(&self) -> u16 {
        if self.capacity_blocks == 0 {
            return 0;
        }
        let percent = 100 * u32::from(self.peak_usage_blocks) / u32::from(self.capacity_blocks);
        percent as u16
    }
}

pub struct Pool<const N: usize> {
    blocks: [Block; N],
    allocated: [bool; N],
    free: heapless::Vec<u16, N>,
    peak: usize,
}

impl<const N: usize> Pool<N> {
    const _ASSERT: () = core::assert!(N > 0 && N <= u16::MAX as usize);

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::_ASSERT;
        Self {
            blocks: [[0; BLOCK_SIZE]; N],
            allocated: [false; N],
            // Lowest indices are handed out first
            free: (0..N as u16).rev().collect(),
            peak: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn usage(&self) -> usize {
        N - self.free.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Takes a zeroed block
    pub fn allocate(&mut self) -> Result<BlockIndex, PoolExhausted> {
        let idx = self.free.pop().ok_or(PoolExhausted)?;
        let slot = usize::from(idx);
        self.allocated[slot] = true;
        self.blocks[slot] = [0; BLOCK_SIZE];
        self.peak = core::cmp::max(self.peak, self.usage());
        Ok(BlockIndex(idx))
    }

    pub fn release(&mut self, block: BlockIndex) {
        let slot = usize::from(block.0);
        if !self.allocated[slot] {
            debug_assert!(false, "double release of pool block");
            return;
        }
        self.allocated[slot] = false;
        unwrap!(self.free.push(block.0));
    }

    pub fn block(&self, block: BlockIndex) -> &Block {
        &self.blocks[usize::from(block.0)]
    }

    pub fn block_mut(&mut self, block: BlockIndex) -> &mut Block {
        &mut self.blocks[usize::from(block.0)]
    }

    pub fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            capacity_blocks: N as u16,
            current_usage_blocks: self.usage() as u16,
            peak_usage_blocks: core::cmp::max(self.peak, self.usage()) as u16,
        }
    }

    /// Starts a new peak measurement interval
    pub fn reset_peak(&mut self) {
        self.peak = 0;
    }
}

impl<const N: usize> Default for Pool<N> {
    fn default() -> Self {
        Self::new()
    }
}
