pub mod config;
mod containers;
pub mod error;
pub mod model;
pub mod ports;
mod selector;
pub mod service;
pub mod txpool;

#[cfg(test)]
pub(crate) mod mock_store;

pub use config::Config;
pub use containers::store::PoolUsage;
pub use error::Error;
pub use model::{
    Account, Address, Amount, ArcTx, Keypair, MultisigRegistration, PublicKey, SignatureHex,
    Transaction, TransactionType, TxId, TxStatus,
};
pub use service::{PoolRequest, Sender, Service, TxStatusEvent};
pub use txpool::{GetAllResponse, GroupedTxs, QueryParams, TxPool};
