/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The numeric result taxonomy of transaction relay.
//!
//! Numeric values of [`AcceptanceCode`] and [`ProposalStatus`] are part of the wire contract with
//! peers. Success codes stay below 100; error codes sit at or above 100.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::TransactionId;

/// Outcome of submitting a transaction for recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcceptanceCode {
    Accepted,
    AlreadyExists,
    TransactionError,
    InvalidSignature,
    DoubleSpend,
}

impl AcceptanceCode {
    /// Codes strictly below this value are successes.
    pub const FIRST_ERROR_CODE: u32 = 100;

    pub const fn code(&self) -> u32 {
        match self {
            AcceptanceCode::Accepted => 0,
            AcceptanceCode::AlreadyExists => 1,
            AcceptanceCode::TransactionError => 100,
            AcceptanceCode::InvalidSignature => 101,
            AcceptanceCode::DoubleSpend => 102,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(AcceptanceCode::Accepted),
            1 => Some(AcceptanceCode::AlreadyExists),
            100 => Some(AcceptanceCode::TransactionError),
            101 => Some(AcceptanceCode::InvalidSignature),
            102 => Some(AcceptanceCode::DoubleSpend),
            _ => None,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.code() < Self::FIRST_ERROR_CODE
    }
}

impl Display for AcceptanceCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcceptanceCode::Accepted => "ACCEPTED",
            AcceptanceCode::AlreadyExists => "ALREADY_EXISTS",
            AcceptanceCode::TransactionError => "TRANSACTION_ERROR",
            AcceptanceCode::InvalidSignature => "INVALID_SIGNATURE",
            AcceptanceCode::DoubleSpend => "DOUBLE_SPEND",
        };
        write!(f, "{}", name)
    }
}

/// Whether the relay pool already has a record of a proposed transaction id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    Unknown,
    Known,
}

impl ProposalStatus {
    pub const fn code(&self) -> u32 {
        match self {
            ProposalStatus::Unknown => 0,
            ProposalStatus::Known => 1,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ProposalStatus::Unknown),
            1 => Some(ProposalStatus::Known),
            _ => None,
        }
    }
}

impl BorshSerialize for ProposalStatus {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.code().serialize(writer)
    }
}

impl BorshDeserialize for ProposalStatus {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let code = u32::deserialize_reader(reader)?;
        ProposalStatus::from_code(code).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown proposal status code {}", code),
            )
        })
    }
}

/// State of a [`TransactionRecord`] in the relay pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// A submitter has claimed the id and is running validation. Not terminal.
    Validating,

    /// Validation succeeded. Terminal.
    Accepted,

    /// Validation failed with the given error code. Terminal.
    Rejected(AcceptanceCode),
}

/// What the relay pool knows about one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub state: TransactionState,
}

/// The answer to a `RecordTransaction` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub result: AcceptanceCode,
    pub id: Option<TransactionId>,
}

impl RecordOutcome {
    pub fn new(result: AcceptanceCode, id: Option<TransactionId>) -> Self {
        Self { result, id }
    }
}
