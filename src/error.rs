use crate::model::{Address, TxId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("Transaction is already processed as invalid: {0}")]
    AlreadyInvalid(TxId),
    #[error("Transaction is already in pool: {0}")]
    DuplicateInPool(TxId),
    #[error("Transaction pool is full")]
    PoolFull,
    #[error("Failed to get sender account: {0}")]
    SenderLookupFailed(String),
    #[error("Requester account is not found")]
    RequesterNotFound,
    #[error("Failed to process transaction: {0}")]
    ProcessFailed(String),
    #[error("Failed to verify transaction: {0}")]
    VerifyFailed(String),
    #[error("Transaction type is already in pool for sender")]
    DuplicateTypeForSender,
    #[error("Account {0} does not have enough funds, projected balance {1}")]
    InsufficientFunds(Address, i128),
    #[error("Transaction is not in pool: {0}")]
    NotInPool(TxId),
    #[error("Permission to sign transaction is denied")]
    PermissionDenied,
    #[error("Transaction is already signed")]
    AlreadySigned,
}
