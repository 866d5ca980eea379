// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as DeriveError;

#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum TxError {
    /// The transaction observed an inconsistent snapshot or lost its commit
    /// race. Its buffered state has been dropped; retrying is up to the
    /// caller.
    #[error("Transaction conflict, rolled back")]
    Conflict,

    #[error("Memory region is out of blocks")]
    OutOfMemory,

    #[error("Unsupported alignment, words are {0} bytes")]
    UnsupportedAlignment(usize),

    #[error("Initial segment does not fit a single block")]
    SizeTooLarge,
}
