// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The shared memory region: a two-level table of word blocks, the global
//! commit clock and a bump allocator handing out fresh blocks.

use std::{
    ops::Index,
    sync::atomic::{AtomicU64, Ordering},
};

use log::warn;

use crate::{
    addr::{block_addr, block_of, offset_of, VirtualAddr, BLOCK_COUNT, BLOCK_SIZE},
    error::TxError,
    vlock::VersionedLock,
};

/// One aligned word of transactional storage together with the lock that
/// guards it.
///
/// The payload is only ever stored while holding the lock; readers load it
/// lock-free and rely on the double-check protocol of the transactions. The
/// relaxed payload accesses are ordered by the acquire/release pairs on the
/// lock cell.
pub struct Word {
    pub(crate) lock: VersionedLock,
    data: AtomicU64,
}

impl Word {
    fn new() -> Self {
        Self {
            lock: VersionedLock::default(),
            data: AtomicU64::new(0),
        }
    }

    pub(crate) fn load(&self) -> u64 {
        self.data.load(Ordering::Relaxed)
    }

    /// Must only be called while holding `lock`; the subsequent release on
    /// the lock publishes the value.
    pub(crate) fn store(&self, value: u64) {
        self.data.store(value, Ordering::Relaxed);
    }
}

/// A fixed run of words, the unit of allocation.
pub struct Block {
    words: [Word; BLOCK_SIZE],
}

impl Block {
    fn new() -> Self {
        Self {
            words: std::array::from_fn(|_| Word::new()),
        }
    }
}

/// [`MemoryRegion`] owns all word storage for the life of the process.
///
/// Block 0 is the initial segment handed to clients at creation; further
/// blocks become live one at a time as [`MemoryRegion::alloc_block`] bumps
/// `next_block`. Blocks are never reclaimed.
pub struct MemoryRegion {
    clock: AtomicU64,
    blocks: Box<[Block]>,
    next_block: AtomicU64,
    size: usize,
}

impl MemoryRegion {
    pub fn new(size: usize) -> Self {
        let blocks = (0..BLOCK_COUNT).map(|_| Block::new()).collect::<Vec<_>>();

        Self {
            clock: AtomicU64::new(0),
            blocks: blocks.into_boxed_slice(),
            next_block: AtomicU64::new(1),
            size,
        }
    }

    /// Byte size of the initial segment, as requested at creation.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current value of the global commit clock.
    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    /// Bumps the global clock and returns the new value, which becomes the
    /// commit timestamp of the calling transaction.
    pub(crate) fn next_commit_ts(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Hands out the next unused block and returns the address of its first
    /// word. Indices are never recycled, so a failed caller leaves a hole.
    pub fn alloc_block(&self) -> Result<VirtualAddr, TxError> {
        let block = self.next_block.fetch_add(1, Ordering::Relaxed);
        if block as usize >= BLOCK_COUNT {
            warn!("block allocation failed, all {} blocks are live", BLOCK_COUNT);
            return Err(TxError::OutOfMemory);
        }

        Ok(block_addr(block as usize))
    }

    /// Number of live blocks, the initial segment included.
    pub fn live_blocks(&self) -> u64 {
        self.next_block.load(Ordering::Relaxed)
    }
}

impl Index<VirtualAddr> for MemoryRegion {
    type Output = Word;

    fn index(&self, addr: VirtualAddr) -> &Word {
        &self.blocks[block_of(addr)].words[offset_of(addr)]
    }
}
