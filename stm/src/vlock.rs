// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The versioned lock is a special type of word sized spin lock, that
//! contains a single bit to indicate a lock, while using the rest
//! of the bits for versioning.

use std::sync::atomic::{AtomicU64, Ordering};

const LOCK_BIT: u64 = 1;

/// A snapshot of a lock cell, taken with one atomic load: the lock bit and
/// the version it guarded at that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub version: u64,
}

/// A [`VersionedLock`] packs a mutual-exclusion bit (bit 0) and a 63-bit
/// version into one atomic cell, so that readers sample both consistently
/// without needing two loads to agree.
///
/// The version only ever advances through [`VersionedLock::release`], and
/// only the holder of the lock bit may call it.
#[derive(Default)]
pub struct VersionedLock {
    cell: AtomicU64,
}

impl VersionedLock {
    /// Creates an unlocked lock carrying `version`.
    pub fn new(version: u64) -> Self {
        Self {
            cell: AtomicU64::new(version << 1),
        }
    }

    /// Samples the lock bit and the version together.
    pub fn status(&self) -> LockStatus {
        let raw = self.cell.load(Ordering::Acquire);
        LockStatus {
            locked: raw & LOCK_BIT != 0,
            version: raw >> 1,
        }
    }

    /// Tries to set the lock bit while preserving the version. Fails as soon
    /// as the bit is observed set; a concurrent version change merely retries
    /// the swap.
    pub fn try_acquire(&self) -> bool {
        let mut current = 0;
        loop {
            match self
                .cell
                .compare_exchange_weak(current, current | LOCK_BIT, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(observed) => {
                    if observed & LOCK_BIT != 0 {
                        return false;
                    }
                    current = observed;
                }
            }
        }
    }

    /// Clears the lock bit and publishes `version` in the same store, so the
    /// new version becomes visible together with the unlock.
    pub fn release(&self, version: u64) {
        self.cell.store(version << 1, Ordering::Release);
    }

    /// Clears only the lock bit, keeping the stored version. Used when
    /// backing out of a partially locked write set.
    pub fn release_unchanged(&self) {
        self.cell.fetch_and(!LOCK_BIT, Ordering::Release);
    }
}
