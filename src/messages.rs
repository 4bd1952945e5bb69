/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the structured requests and responses that peers exchange with the
//! [sync service](crate::service::SyncService).
//!
//! All messages are Borsh-serializable. Framing them on the wire, and carrying streamed responses, is
//! the job of the surrounding call mechanism; streamed responses are sequences of
//! [`Payload`](crate::types::data_types::Payload)s.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{BlockId, ChainDate, ChainDateParseError, TransactionId},
    transaction::{AcceptanceCode, ProposalStatus, RecordOutcome},
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum SyncRequest {
    Tip(TipRequest),
    TipHeader(TipHeaderRequest),
    GetBlocks(GetBlocksRequest),
    GetHeaders(GetHeadersRequest),
    PullBlocksToTip(PullBlocksToTipRequest),
    ProposeTransactions(ProposeTransactionsRequest),
    RecordTransaction(RecordTransactionRequest),
}

/* ↓↓↓ Tip ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TipRequest;

impl Into<SyncRequest> for TipRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::Tip(self)
    }
}

/// The canonical tip, with its date in the `"<epoch>.<slot>"` text form.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TipResponse {
    pub id: BlockId,
    pub blockdate: String,
}

impl TipResponse {
    pub fn new(id: BlockId, date: ChainDate) -> Self {
        TipResponse {
            id,
            blockdate: date.to_string(),
        }
    }

    /// Parse the response back into the tip's id and date.
    pub fn into_tip(self) -> Result<(BlockId, ChainDate), ChainDateParseError> {
        Ok((self.id, self.blockdate.parse()?))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TipHeaderRequest;

impl Into<SyncRequest> for TipHeaderRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::TipHeader(self)
    }
}

/* ↓↓↓ Ranges ↓↓↓ */

/// Request for up to `size` full blocks, starting `offset` parent links behind `from` and walking
/// towards genesis.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GetBlocksRequest {
    pub from: BlockId,
    pub offset: u64,
    pub size: u64,
}

impl Into<SyncRequest> for GetBlocksRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::GetBlocks(self)
    }
}

/// Same as [`GetBlocksRequest`], for headers.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GetHeadersRequest {
    pub from: BlockId,
    pub offset: u64,
    pub size: u64,
}

impl Into<SyncRequest> for GetHeadersRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::GetHeaders(self)
    }
}

/* ↓↓↓ Catch-up ↓↓↓ */

/// Request for every canonical block after the first of `from` that the server knows to be canonical.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PullBlocksToTipRequest {
    pub from: Vec<BlockId>,
}

impl Into<SyncRequest> for PullBlocksToTipRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::PullBlocksToTip(self)
    }
}

/* ↓↓↓ Transactions ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposeTransactionsRequest {
    pub ids: Vec<TransactionId>,
}

impl Into<SyncRequest> for ProposeTransactionsRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::ProposeTransactions(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposeTransactionsResponse {
    pub items: Vec<ProposalItem>,
}

impl From<Vec<(TransactionId, ProposalStatus)>> for ProposeTransactionsResponse {
    fn from(statuses: Vec<(TransactionId, ProposalStatus)>) -> Self {
        ProposeTransactionsResponse {
            items: statuses
                .into_iter()
                .map(|(id, status)| ProposalItem { id, status })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalItem {
    pub id: TransactionId,
    pub status: ProposalStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RecordTransactionRequest {
    pub tx: Vec<u8>,
}

impl Into<SyncRequest> for RecordTransactionRequest {
    fn into(self) -> SyncRequest {
        SyncRequest::RecordTransaction(self)
    }
}

/// Result of recording a transaction. `result` is the numeric [`AcceptanceCode`]: below 100 means
/// success.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RecordTransactionResponse {
    pub result: u32,
    pub id: Option<TransactionId>,
}

impl RecordTransactionResponse {
    pub fn is_success(&self) -> bool {
        self.result < AcceptanceCode::FIRST_ERROR_CODE
    }

    /// Decode the numeric result code.
    pub fn outcome(&self) -> Result<RecordOutcome, UnknownAcceptanceCode> {
        let result = AcceptanceCode::from_code(self.result).ok_or(UnknownAcceptanceCode(self.result))?;
        Ok(RecordOutcome::new(result, self.id))
    }
}

impl From<RecordOutcome> for RecordTransactionResponse {
    fn from(outcome: RecordOutcome) -> Self {
        RecordTransactionResponse {
            result: outcome.result.code(),
            id: outcome.id,
        }
    }
}

/// A response carried a result code that this version does not know.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownAcceptanceCode(pub u32);

impl Display for UnknownAcceptanceCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown acceptance code {}", self.0)
    }
}

impl std::error::Error for UnknownAcceptanceCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_response_parses_back_into_tip() {
        let id = BlockId::new([7; 32]);
        let response = TipResponse::new(id, ChainDate::new(12, 345));
        assert_eq!(response.blockdate, "12.345");
        assert_eq!(response.into_tip(), Ok((id, ChainDate::new(12, 345))));
    }

    #[test]
    fn malformed_tip_date_is_an_error() {
        let response = TipResponse {
            id: BlockId::new([7; 32]),
            blockdate: String::from("12-345"),
        };
        assert_eq!(
            response.into_tip(),
            Err(ChainDateParseError::MissingSeparator)
        );
    }

    #[test]
    fn record_response_decodes_codes() {
        let id = TransactionId::new([1; 32]);
        let response: RecordTransactionResponse =
            RecordOutcome::new(AcceptanceCode::DoubleSpend, Some(id)).into();
        assert_eq!(response.result, 102);
        assert!(!response.is_success());
        assert_eq!(
            response.outcome(),
            Ok(RecordOutcome::new(AcceptanceCode::DoubleSpend, Some(id)))
        );

        let unknown = RecordTransactionResponse { result: 42, id: None };
        assert_eq!(unknown.outcome(), Err(UnknownAcceptanceCode(42)));
    }

    #[test]
    fn requests_survive_borsh() {
        let request: SyncRequest = PullBlocksToTipRequest {
            from: vec![BlockId::new([1; 32]), BlockId::new([2; 32])],
        }
        .into();
        let bytes = request.try_to_vec().unwrap();
        assert_eq!(SyncRequest::deserialize(&mut bytes.as_slice()).unwrap(), request);
    }
}
