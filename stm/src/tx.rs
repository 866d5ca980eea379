// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The two transaction records.
//!
//! A [`ReadOnlyTx`] carries nothing but its start timestamp and validates
//! every read twice against the word's versioned lock. An [`UpdateTx`]
//! additionally keeps a read set and an address-ordered write set, and makes
//! its writes visible with the two-phase TL2 commit: lock the write set in
//! ascending address order, draw a commit timestamp from the global clock,
//! validate the read set, publish.
//!
//! Both records are reused between transactions; their state is re-armed at
//! begin and dropped on commit and abort. They are owned by a single thread
//! and need no synchronization of their own.

use std::collections::{BTreeMap, HashSet};

use crate::{
    addr::{VirtualAddr, ALIGNMENT},
    error::TxError,
    region::MemoryRegion,
};

/// A transaction that never writes.
///
/// Reads go straight to the region, so there is nothing to commit and
/// ending a read-only transaction cannot fail.
#[derive(Default)]
pub struct ReadOnlyTx {
    start_ts: u64,
}

impl ReadOnlyTx {
    /// Re-arms the record by sampling the global clock.
    pub fn begin(&mut self, region: &MemoryRegion) {
        self.start_ts = region.clock();
    }

    /// Reads `dst.len()` consecutive words starting at `src`.
    ///
    /// The guarding lock is sampled before and after each payload load. The
    /// first sample bounds the word's state ahead of the read, the second
    /// proves no concurrent commit overwrote the word during it. Both must
    /// show the word unlocked and unchanged since `start_ts`.
    pub fn read(&self, region: &MemoryRegion, src: VirtualAddr, dst: &mut [u64]) -> Result<(), TxError> {
        let mut addr = src;
        for slot in dst.iter_mut() {
            let word = &region[addr];

            let before = word.lock.status();
            if before.locked || before.version > self.start_ts {
                return Err(TxError::Conflict);
            }

            let value = word.load();

            let after = word.lock.status();
            if after.locked || after.version > self.start_ts {
                return Err(TxError::Conflict);
            }

            *slot = value;
            addr += ALIGNMENT as u64;
        }

        Ok(())
    }
}

/// A transaction that buffers writes until commit.
#[derive(Default)]
pub struct UpdateTx {
    start_ts: u64,

    /// Addresses whose pre-commit state this transaction depends on.
    read_set: HashSet<VirtualAddr>,

    /// Buffered writes, keyed and iterated in ascending address order. The
    /// last write to an address wins.
    write_set: BTreeMap<VirtualAddr, u64>,
}

impl UpdateTx {
    /// Re-arms the record: samples the global clock and drops any state a
    /// previous transaction may have left behind.
    pub fn begin(&mut self, region: &MemoryRegion) {
        self.start_ts = region.clock();
        self.read_set.clear();
        self.write_set.clear();
    }

    fn rollback(&mut self) {
        self.read_set.clear();
        self.write_set.clear();
    }

    /// Reads `dst.len()` consecutive words starting at `src`.
    ///
    /// Words the transaction has already written are served from the write
    /// buffer without touching shared state or the read set. All others use
    /// the double-checked read and are recorded in the read set. On failure
    /// the transaction is rolled back and must be discarded.
    pub fn read(&mut self, region: &MemoryRegion, src: VirtualAddr, dst: &mut [u64]) -> Result<(), TxError> {
        let mut addr = src;
        for slot in dst.iter_mut() {
            if let Some(&buffered) = self.write_set.get(&addr) {
                *slot = buffered;
                addr += ALIGNMENT as u64;
                continue;
            }

            let word = &region[addr];

            let before = word.lock.status();
            if before.locked || before.version > self.start_ts {
                self.rollback();
                return Err(TxError::Conflict);
            }

            let value = word.load();

            // any version movement at all means the loaded value may be torn
            let after = word.lock.status();
            if after.locked || after.version != before.version {
                self.rollback();
                return Err(TxError::Conflict);
            }

            self.read_set.insert(addr);
            *slot = value;
            addr += ALIGNMENT as u64;
        }

        Ok(())
    }

    /// Buffers `src` to be written at `dst` and onward. No shared state is
    /// touched until commit, so writing cannot fail mid-transaction.
    pub fn write(&mut self, src: &[u64], dst: VirtualAddr) {
        let mut addr = dst;
        for &value in src {
            self.write_set.insert(addr, value);
            addr += ALIGNMENT as u64;
        }
    }

    /// Runs the two-phase commit. On success every buffered write is visible
    /// to other transactions under this transaction's commit timestamp; on
    /// failure nothing is and the record has been rolled back.
    pub fn commit(&mut self, region: &MemoryRegion) -> Result<(), TxError> {
        // phase 1: lock the write set in ascending address order
        if let Some(acquired) = self
            .write_set
            .keys()
            .position(|&addr| !region[addr].lock.try_acquire())
        {
            for &addr in self.write_set.keys().take(acquired) {
                region[addr].lock.release_unchanged();
            }
            self.rollback();
            return Err(TxError::Conflict);
        }

        // phase 2: draw the commit timestamp, then validate the read set
        let commit_ts = region.next_commit_ts();

        // if no other transaction committed since begin, the read set is
        // trivially still valid
        if commit_ts != self.start_ts + 1 {
            let valid = self.read_set.iter().all(|&addr| {
                let status = region[addr].lock.status();
                let locked_by_other = status.locked && !self.write_set.contains_key(&addr);
                status.version <= self.start_ts && !locked_by_other
            });

            if !valid {
                for &addr in self.write_set.keys() {
                    region[addr].lock.release_unchanged();
                }
                self.rollback();
                return Err(TxError::Conflict);
            }
        }

        // publish each value, then release its lock with the new timestamp
        for (&addr, &value) in self.write_set.iter() {
            let word = &region[addr];
            word.store(value);
            word.lock.release(commit_ts);
        }

        self.read_set.clear();
        self.write_set.clear();

        Ok(())
    }
}
