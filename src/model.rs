use crate::config::EPOCH_TIME_UNIX;
use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};

pub type TxId = String;
pub type Address = String;
pub type PublicKey = String;
pub type SignatureHex = String;
pub type Amount = u128;

pub type ArcTx = Arc<Transaction>;

/// Transaction type tags that participate in pool rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Transfer,
    Signature,
    Delegate,
    Multisignature,
}

impl TransactionType {
    /// Types limited to one ready transaction per sender at a time.
    pub fn is_unique_per_sender(&self) -> bool {
        matches!(
            self,
            TransactionType::Signature
                | TransactionType::Delegate
                | TransactionType::Multisignature
        )
    }
}

/// `asset.multisignature` payload of a multisignature registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigRegistration {
    /// Number of signatures required before the transaction is ready.
    pub min: u8,
    /// Lifetime in hours before the pending registration expires.
    pub lifetime: u16,
    /// Allowed co-signers, each encoded as `"+<hex-pubkey>"`.
    pub keysgroup: Vec<String>,
}

/// A transaction as seen by the pool. Opaque beyond these fields; the
/// transaction logic port owns the full semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TxId,
    pub tx_type: TransactionType,
    pub sender_public_key: PublicKey,
    pub sender_id: Option<Address>,
    pub requester_public_key: Option<PublicKey>,
    pub recipient_id: Option<Address>,
    pub recipient_public_key: Option<PublicKey>,
    pub amount: Amount,
    pub fee: Amount,
    /// Seconds since the chain epoch.
    pub timestamp: i64,
    /// Present iff multi-party signing is underway.
    pub signatures: Option<Vec<SignatureHex>>,
    /// Present iff `tx_type` is `Multisignature`.
    pub multisig: Option<MultisigRegistration>,
}

impl Transaction {
    /// Total debit the transaction causes to the sender.
    pub fn spend(&self) -> Amount {
        self.amount.saturating_add(self.fee)
    }
}

/// Wall-clock instant a chain-epoch timestamp refers to.
pub fn real_time(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(EPOCH_TIME_UNIX.saturating_add(timestamp), 0)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Account snapshot returned by the account store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub public_key: PublicKey,
    pub balance: Amount,
    /// Non-empty iff the account is a multisignature account.
    pub multisignatures: Vec<PublicKey>,
}

/// Keypair handed back by the key-derivation port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub public_key: PublicKey,
    pub private_key: String,
}

/// Which pool list currently holds a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Unverified,
    Pending,
    Ready,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TxStatus::Unverified => "unverified",
            TxStatus::Pending => "pending",
            TxStatus::Ready => "ready",
        };
        f.write_str(label)
    }
}
