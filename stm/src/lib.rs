// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Word-addressable software transactional memory
//!
//! This crate implements the TL2 (Transactional Locking II) algorithm
//! described by Dice, Shalev and Shavit over a word-addressable memory
//! region. Client threads group reads, writes and allocations into
//! transactions; committed transactions appear to have executed atomically
//! in a single global order, despite running truly in parallel.
//!
//! Every shared word carries a [`VersionedLock`] combining a lock bit and a
//! version timestamp in one atomic cell. Reads are optimistic and validated
//! by sampling the lock around the payload load; writes are buffered and
//! made visible by a two-phase commit that locks the write set in address
//! order, draws a timestamp from the global clock, validates the read set
//! and publishes.
//!
//! # Example
//! ```
//! use stronghold_tl2::{Stm, TxError};
//!
//! let stm = Stm::new(64, 8)?;
//! let base = stm.start();
//!
//! let tx = stm.begin(false);
//! stm.write(tx, &[7], base)?;
//! stm.end(tx)?;
//!
//! let tx = stm.begin(true);
//! let mut word = [0u64];
//! stm.read(tx, base, &mut word)?;
//! assert_eq!(word[0], 7);
//! # Ok::<(), TxError>(())
//! ```

pub mod addr;
pub mod error;
pub mod region;
pub mod stm;
pub mod tx;
pub mod vlock;

pub use addr::{VirtualAddr, ALIGNMENT, BLOCK_COUNT, BLOCK_SIZE};
pub use error::TxError;
pub use region::MemoryRegion;
pub use stm::{Stm, Tx};
pub use tx::{ReadOnlyTx, UpdateTx};
pub use vlock::{LockStatus, VersionedLock};
