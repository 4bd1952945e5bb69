/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or numbers, and do not have any major "active" behavior.

use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    num::ParseIntError,
    str::FromStr,
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};

/// 32-byte identifier of a block.
///
/// Block identifiers are opaque to this crate: they are produced by whoever builds blocks (usually a
/// cryptographic hash of the block header) and are only ever compared for equality and used as keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct BlockId([u8; 32]);

impl BlockId {
    /// Create a new `BlockId` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `BlockId`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self)
    }
}

/// 32-byte identifier of a transaction, as reported by the
/// [`TransactionCodec`](crate::codec::TransactionCodec).
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    /// Create a new `TransactionId` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `TransactionId`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self)
    }
}

/// Number of ancestors a block has.
///
/// Starts at 0 for the genesis block and increases by 1 for every block along `parent` links.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ChainLength(u64);

impl ChainLength {
    /// The chain length of the genesis block.
    pub const fn genesis() -> Self {
        Self(0)
    }

    /// Create a new `ChainLength` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `ChainLength`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the chain length of a child of a block with this chain length.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ChainLength {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Position of a block in time, expressed as a slot within an epoch.
///
/// Dates are totally ordered: first by `epoch`, then by `slot`. Their textual form, used in the
/// [tip response](crate::messages::TipResponse), is `"<epoch>.<slot>"`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ChainDate {
    pub epoch: u32,
    pub slot: u32,
}

impl ChainDate {
    pub const fn new(epoch: u32, slot: u32) -> Self {
        Self { epoch, slot }
    }
}

impl Display for ChainDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.epoch, self.slot)
    }
}

impl FromStr for ChainDate {
    type Err = ChainDateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (epoch, slot) = s
            .split_once('.')
            .ok_or(ChainDateParseError::MissingSeparator)?;
        let epoch = epoch
            .parse::<u32>()
            .map_err(|err| ChainDateParseError::InvalidEpoch(err))?;
        let slot = slot
            .parse::<u32>()
            .map_err(|err| ChainDateParseError::InvalidSlot(err))?;
        Ok(ChainDate { epoch, slot })
    }
}

/// Error when parsing a [`ChainDate`] from its `"<epoch>.<slot>"` textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainDateParseError {
    MissingSeparator,
    InvalidEpoch(ParseIntError),
    InvalidSlot(ParseIntError),
}

impl Display for ChainDateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChainDateParseError::MissingSeparator => {
                write!(f, "chain date is missing the '.' separator")
            }
            ChainDateParseError::InvalidEpoch(err) => write!(f, "invalid epoch: {}", err),
            ChainDateParseError::InvalidSlot(err) => write!(f, "invalid slot: {}", err),
        }
    }
}

impl Error for ChainDateParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChainDateParseError::MissingSeparator => None,
            ChainDateParseError::InvalidEpoch(err) | ChainDateParseError::InvalidSlot(err) => {
                Some(err)
            }
        }
    }
}

/// What a range query asks to be serialized: whole blocks or only their headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub enum PayloadKind {
    Block,
    Header,
}

/// A serialized block or header, as produced by the [`BlockCodec`](crate::codec::BlockCodec).
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub content: Vec<u8>,
}

impl Payload {
    pub fn new(kind: PayloadKind, content: Vec<u8>) -> Self {
        Self { kind, content }
    }
}
