// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! ABI of the Weighted Lottery application */

use async_graphql::{Request, Response as GraphQLResponse, SimpleObject};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, ContractAbi, ServiceAbi},
    views::ViewError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const OP_DEPOSIT: u32 = 1;
pub const OP_DISTRIBUTE: u32 = 2;
pub const OP_TRANSFER_OWNERSHIP: u32 = 3;

pub struct LotteryAbi;

impl ContractAbi for LotteryAbi {
    type Operation = Operation;
    type Response = Response;
}

impl ServiceAbi for LotteryAbi {
    type Query = Request;
    type QueryResponse = GraphQLResponse;
}

/// Application parameters, fixed for the lifetime of the application.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct LotteryParameters {
    /// Value of a single ticket. Deposits are converted at `floor(amount / ticket_unit)`.
    pub ticket_unit: Amount,
}

impl Default for LotteryParameters {
    fn default() -> Self {
        LotteryParameters {
            ticket_unit: Amount::ONE,
        }
    }
}

/// Instantiation argument: the account allowed to distribute prizes and hand over ownership.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct InitialState {
    pub owner: AccountOwner,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Operation {
    /// Move `amount` from the signer into the pool and award `floor(amount / ticket_unit)` tickets.
    Deposit { amount: Amount },
    /// Pay the whole pool to the holder of `winner_ticket` and start a new round. Owner only.
    Distribute { winner_ticket: u32 },
    /// Hand the owner role to `new_owner`. Owner only.
    TransferOwnership { new_owner: AccountOwner },
    /// A raw op code with a JSON payload, decoded by [`Operation::decode`].
    Encoded { code: u32, payload: Vec<u8> },
}

impl Operation {
    /// Decodes a raw op code and its payload into a typed operation.
    ///
    /// Payloads are JSON: an amount string for deposits, a number for the
    /// winning ticket, an account owner for ownership transfers.
    pub fn decode(code: u32, payload: &[u8]) -> Result<Self, LotteryError> {
        let operation = match code {
            OP_DEPOSIT => Operation::Deposit {
                amount: serde_json::from_slice(payload)?,
            },
            OP_DISTRIBUTE => Operation::Distribute {
                winner_ticket: serde_json::from_slice(payload)?,
            },
            OP_TRANSFER_OWNERSHIP => Operation::TransferOwnership {
                new_owner: serde_json::from_slice(payload)?,
            },
            code => return Err(LotteryError::UnsupportedOperation(code)),
        };
        Ok(operation)
    }

    /// Encodes a typed operation as a raw op code and payload.
    pub fn encode(&self) -> Result<(u32, Vec<u8>), LotteryError> {
        let encoded = match self {
            Operation::Deposit { amount } => (OP_DEPOSIT, serde_json::to_vec(amount)?),
            Operation::Distribute { winner_ticket } => {
                (OP_DISTRIBUTE, serde_json::to_vec(winner_ticket)?)
            }
            Operation::TransferOwnership { new_owner } => {
                (OP_TRANSFER_OWNERSHIP, serde_json::to_vec(new_owner)?)
            }
            Operation::Encoded { code, payload } => (*code, payload.clone()),
        };
        Ok(encoded)
    }

    pub fn code(&self) -> u32 {
        match self {
            Operation::Deposit { .. } => OP_DEPOSIT,
            Operation::Distribute { .. } => OP_DISTRIBUTE,
            Operation::TransferOwnership { .. } => OP_TRANSFER_OWNERSHIP,
            Operation::Encoded { code, .. } => *code,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Response {
    Ok,
    Deposited {
        awarded: u32,
        total_tickets: u32,
    },
    PrizeDistributed {
        winner_ticket: u32,
        winner: AccountOwner,
        prize: Amount,
    },
}

/// A participant and the half-open range of ticket indices they hold.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SimpleObject)]
pub struct ParticipantEntry {
    pub owner: AccountOwner,
    pub chances: u32,
    pub first_ticket: u32,
    pub last_ticket: u32,
}

/// Failure of a lottery operation. Every variant aborts the operation with no state change.
#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("unsupported operation code {0}")]
    UnsupportedOperation(u32),

    #[error("sender is not the lottery owner")]
    Unauthorized,

    #[error("no tickets in the pool")]
    EmptyPool,

    #[error("ticket {ticket} is outside the pool of {total} tickets")]
    TicketOutOfRange { ticket: u32, total: u32 },

    #[error("prize payout could not be initiated")]
    PayoutFailed,

    #[error("sender balance does not cover the deposit")]
    InsufficientFunds,

    #[error("malformed operation payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("deposit or ticket total overflow")]
    ArithmeticOverflow,

    #[error("storage error: {0}")]
    Storage(#[from] ViewError),
}

impl LotteryError {
    /// Non-zero code reported for this failure kind.
    pub fn exit_code(&self) -> u32 {
        match self {
            LotteryError::UnsupportedOperation(_) => 0xffff,
            LotteryError::Unauthorized => 710,
            LotteryError::EmptyPool => 709,
            LotteryError::TicketOutOfRange { .. } => 711,
            LotteryError::PayoutFailed => 712,
            LotteryError::InsufficientFunds => 713,
            LotteryError::MalformedPayload(_) => 9,
            LotteryError::ArithmeticOverflow => 4,
            LotteryError::Storage(_) => 1,
        }
    }
}

/// The value-transfer primitive the ledger drives.
///
/// Both methods report whether the transfer was initiated; a failed call must
/// leave balances untouched.
pub trait Treasury {
    /// Moves a deposit from `from` into the pool.
    fn collect(&mut self, from: AccountOwner, amount: Amount) -> Result<(), LotteryError>;

    /// Sends `amount` out of the pool to `to`.
    fn pay_out(&mut self, to: AccountOwner, amount: Amount) -> Result<(), LotteryError>;
}

/// Number of whole tickets bought by `amount`. Remainders below one unit buy nothing.
pub fn tickets_for(amount: Amount, ticket_unit: Amount) -> Result<u32, LotteryError> {
    let tickets = u128::from(amount)
        .checked_div(u128::from(ticket_unit))
        .unwrap_or(0);
    u32::try_from(tickets).map_err(|_| LotteryError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn whole_units_become_tickets() {
        assert_eq!(tickets_for(Amount::from_tokens(10), Amount::ONE).unwrap(), 10);
        assert_eq!(tickets_for(Amount::from_str("1.5").unwrap(), Amount::ONE).unwrap(), 1);
        assert_eq!(tickets_for(Amount::from_str("0.99").unwrap(), Amount::ONE).unwrap(), 0);
        assert_eq!(tickets_for(Amount::ZERO, Amount::ONE).unwrap(), 0);
    }

    #[test]
    fn custom_ticket_unit() {
        let unit = Amount::from_str("0.25").unwrap();
        assert_eq!(tickets_for(Amount::ONE, unit).unwrap(), 4);
        assert_eq!(tickets_for(Amount::from_str("0.3").unwrap(), unit).unwrap(), 1);
    }

    #[test]
    fn ticket_count_overflow() {
        let huge = Amount::from_tokens(u128::from(u32::MAX) + 1);
        assert_matches!(
            tickets_for(huge, Amount::ONE),
            Err(LotteryError::ArithmeticOverflow)
        );
    }

    #[test]
    fn decode_raw_operations() {
        assert_eq!(
            Operation::decode(OP_DISTRIBUTE, b"5").unwrap(),
            Operation::Distribute { winner_ticket: 5 }
        );
        assert_eq!(
            Operation::decode(OP_DEPOSIT, b"\"1.5\"").unwrap(),
            Operation::Deposit {
                amount: Amount::from_str("1.5").unwrap()
            }
        );

        let operation = Operation::Distribute { winner_ticket: 42 };
        let (code, payload) = operation.encode().unwrap();
        assert_eq!(code, operation.code());
        assert_eq!(Operation::decode(code, &payload).unwrap(), operation);
    }

    #[test]
    fn unknown_op_code_is_unsupported() {
        let error = Operation::decode(7, b"").unwrap_err();
        assert_matches!(error, LotteryError::UnsupportedOperation(7));
        assert_eq!(error.exit_code(), 0xffff);
    }

    #[test]
    fn bad_payload_is_rejected() {
        assert_matches!(
            Operation::decode(OP_DISTRIBUTE, b"\"five\""),
            Err(LotteryError::MalformedPayload(_))
        );
    }

    #[test]
    fn exit_codes_are_distinct_and_non_zero() {
        let errors = [
            LotteryError::UnsupportedOperation(0),
            LotteryError::Unauthorized,
            LotteryError::EmptyPool,
            LotteryError::TicketOutOfRange { ticket: 0, total: 0 },
            LotteryError::PayoutFailed,
            LotteryError::InsufficientFunds,
            LotteryError::MalformedPayload(serde_json::from_slice::<u32>(b"x").unwrap_err()),
            LotteryError::ArithmeticOverflow,
            LotteryError::Storage(ViewError::KeyTooLong),
        ];
        let mut codes = errors.iter().map(LotteryError::exit_code).collect::<Vec<_>>();
        assert!(codes.iter().all(|code| *code != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
