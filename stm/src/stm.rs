// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The transaction manager: owns the memory region and dispatches the
//! lifecycle operations to the per-thread transaction records.

use std::{
    cell::RefCell,
    sync::atomic::{AtomicU64, Ordering},
};

use log::debug;

use crate::{
    addr::{VirtualAddr, ALIGNMENT, BLOCK_SIZE, START_ADDR},
    error::TxError,
    region::MemoryRegion,
    tx::{ReadOnlyTx, UpdateTx},
};

thread_local! {
    static READ_ONLY_TX: RefCell<ReadOnlyTx> = RefCell::new(ReadOnlyTx::default());
    static UPDATE_TX: RefCell<UpdateTx> = RefCell::new(UpdateTx::default());
}

/// A transaction handle: the begin-order sequence number in the upper bits,
/// and the update tag in bit 0.
///
/// The handle is only a ticket. The transaction's state lives in the
/// thread-local record of the thread that called [`Stm::begin`], so every
/// operation on a handle must come from that same thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tx(u64);

impl Tx {
    const UPDATE_TAG: u64 = 1;

    fn update(id: u64) -> Self {
        Tx(id << 1 | Self::UPDATE_TAG)
    }

    fn read_only(id: u64) -> Self {
        Tx(id << 1)
    }

    /// Returns true if this handle belongs to an update transaction.
    pub fn is_update(self) -> bool {
        self.0 & Self::UPDATE_TAG != 0
    }

    /// The begin-order sequence number of this transaction.
    pub fn id(self) -> u64 {
        self.0 >> 1
    }
}

/// [`Stm`] is the shared context client threads transact against. One
/// instance owns one [`MemoryRegion`]; threads share it behind an `Arc` and
/// run their transactions truly in parallel.
pub struct Stm {
    region: MemoryRegion,
    tx_ids: AtomicU64,
}

impl Stm {
    /// Creates the shared region. `size` is the byte size of the initial
    /// segment: positive, a multiple of the word alignment and at most one
    /// block. `align` must equal the compile-time word alignment.
    pub fn new(size: usize, align: usize) -> Result<Self, TxError> {
        if align != ALIGNMENT {
            return Err(TxError::UnsupportedAlignment(ALIGNMENT));
        }
        if size == 0 || size % ALIGNMENT != 0 || size > BLOCK_SIZE * ALIGNMENT {
            return Err(TxError::SizeTooLarge);
        }

        Ok(Self {
            region: MemoryRegion::new(size),
            tx_ids: AtomicU64::new(0),
        })
    }

    /// Address of the first word of the initial segment. Stable for the
    /// life of the region.
    pub fn start(&self) -> VirtualAddr {
        START_ADDR
    }

    /// Byte size of the initial segment.
    pub fn size(&self) -> usize {
        self.region.size()
    }

    /// The fixed word alignment in bytes.
    pub fn align(&self) -> usize {
        ALIGNMENT
    }

    /// Begins a transaction on the calling thread and returns its handle.
    pub fn begin(&self, read_only: bool) -> Tx {
        let id = self.tx_ids.fetch_add(1, Ordering::Relaxed) + 1;

        let tx = if read_only {
            READ_ONLY_TX.with(|tx| tx.borrow_mut().begin(&self.region));
            Tx::read_only(id)
        } else {
            UPDATE_TX.with(|tx| tx.borrow_mut().begin(&self.region));
            Tx::update(id)
        };

        debug!("TX({}): start, global clock ({})", tx.id(), self.region.clock());
        tx
    }

    /// Ends a transaction. A read-only transaction has nothing to commit and
    /// always succeeds; an update transaction runs the two-phase commit and
    /// fails if it loses its race.
    pub fn end(&self, tx: Tx) -> Result<(), TxError> {
        if !tx.is_update() {
            return Ok(());
        }

        match UPDATE_TX.with(|t| t.borrow_mut().commit(&self.region)) {
            Ok(()) => {
                debug!("TX({}): committed, global clock ({})", tx.id(), self.region.clock());
                Ok(())
            }
            Err(e) => {
                debug!("TX({}): commit failed, rolled back", tx.id());
                Err(e)
            }
        }
    }

    /// Reads `dst.len()` consecutive words starting at `src` into `dst`.
    /// On failure the transaction has been rolled back and the handle must
    /// be discarded.
    pub fn read(&self, tx: Tx, src: VirtualAddr, dst: &mut [u64]) -> Result<(), TxError> {
        let result = if tx.is_update() {
            UPDATE_TX.with(|t| t.borrow_mut().read(&self.region, src, dst))
        } else {
            READ_ONLY_TX.with(|t| t.borrow().read(&self.region, src, dst))
        };

        if result.is_err() {
            debug!("TX({}): read of {:#x} aborted", tx.id(), src);
        }
        result
    }

    /// Buffers `src` to be written at `dst` when the transaction commits.
    /// Conflicts surface at [`Stm::end`], never here.
    pub fn write(&self, tx: Tx, src: &[u64], dst: VirtualAddr) -> Result<(), TxError> {
        debug_assert!(tx.is_update(), "read-only transactions cannot write");

        UPDATE_TX.with(|t| t.borrow_mut().write(src, dst));
        Ok(())
    }

    /// Allocates a fresh block and returns the address of its first word.
    /// The granularity is one block regardless of `size`.
    pub fn alloc(&self, tx: Tx, _size: usize) -> Result<VirtualAddr, TxError> {
        let addr = self.region.alloc_block()?;
        debug!("TX({}): allocated block at {:#x}", tx.id(), addr);
        Ok(addr)
    }

    /// Blocks are never reclaimed; freeing is accepted for interface
    /// completeness and retains the block.
    pub fn free(&self, tx: Tx, addr: VirtualAddr) {
        debug!("TX({}): free of {:#x} retained", tx.id(), addr);
    }

    /// Number of live blocks, the initial segment included.
    pub fn live_blocks(&self) -> u64 {
        self.region.live_blocks()
    }
}
