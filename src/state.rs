use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::api::{Transfer, TransferStatus, TransferType};

/// Lifecycle of a slow withdrawal.
///
/// `Requested` once the signed request is accepted, `Authorized` once the
/// exchange has settled it on-chain and the funds are claimable, `Executed`
/// after the claiming transaction is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalState {
    Requested,
    Authorized,
    Executed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithdrawalStateError {
    #[error("no withdrawal found; run start-withdraw-dydx first")]
    NotFound,
    #[error("withdrawal {id} was {status:?} by the exchange")]
    Abandoned { id: String, status: TransferStatus },
    #[error("invalid withdrawal transition {from} -> {to}")]
    InvalidTransition {
        from: WithdrawalState,
        to: WithdrawalState,
    },
    #[error("withdrawal {id} is {state}, not yet authorized for execution")]
    NotAuthorized { id: String, state: WithdrawalState },
}

impl WithdrawalState {
    /// Map a remote withdrawal status onto the lifecycle.
    pub fn from_transfer(transfer: &Transfer) -> Result<Self, WithdrawalStateError> {
        match transfer.status {
            TransferStatus::Pending | TransferStatus::Queued => Ok(WithdrawalState::Requested),
            TransferStatus::Confirmed => Ok(WithdrawalState::Authorized),
            status @ (TransferStatus::Canceled | TransferStatus::Unknown) => {
                Err(WithdrawalStateError::Abandoned {
                    id: transfer.id.clone(),
                    status,
                })
            }
        }
    }

    /// Advance one step. Skipping or reversing a step is rejected.
    pub fn transition(self, to: WithdrawalState) -> Result<Self, WithdrawalStateError> {
        match (self, to) {
            (WithdrawalState::Requested, WithdrawalState::Authorized)
            | (WithdrawalState::Authorized, WithdrawalState::Executed) => Ok(to),
            (from, to) => Err(WithdrawalStateError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WithdrawalState::Requested => "requested",
            WithdrawalState::Authorized => "authorized",
            WithdrawalState::Executed => "executed",
        };
        f.write_str(label)
    }
}

/// Most recent slow withdrawal in a transfers listing.
pub fn latest_withdrawal(transfers: &[Transfer]) -> Option<&Transfer> {
    transfers
        .iter()
        .filter(|t| t.kind == TransferType::Withdrawal)
        .max_by_key(|t| t.created_at)
}

/// Find the latest withdrawal and check it may be executed on-chain.
pub fn executable_withdrawal(
    transfers: &[Transfer],
) -> Result<(&Transfer, WithdrawalState), WithdrawalStateError> {
    let transfer = latest_withdrawal(transfers).ok_or(WithdrawalStateError::NotFound)?;
    let state = WithdrawalState::from_transfer(transfer)?;
    if state != WithdrawalState::Authorized {
        return Err(WithdrawalStateError::NotAuthorized {
            id: transfer.id.clone(),
            state,
        });
    }
    Ok((transfer, state))
}
