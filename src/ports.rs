use crate::model::{Account, Address, Amount, ArcTx, Keypair, SignatureHex, Transaction};
use std::sync::Arc;

/// Read-through access to on-chain account state.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve the sender account for a public key.
    async fn sender(&self, public_key: &str) -> anyhow::Result<Account>;

    /// Look up an arbitrary account by public key.
    async fn account(&self, public_key: &str) -> anyhow::Result<Option<Account>>;

    /// Confirmed balance of an address. A missing account reads as zero.
    async fn balance(&self, address: &str) -> anyhow::Result<Amount>;

    fn address_from_public_key(&self, public_key: &str) -> Address;
}

/// Codec-side processing and verification of transactions.
#[async_trait::async_trait]
pub trait TransactionLogic: Send + Sync {
    async fn process(
        &self,
        tx: &Transaction,
        sender: &Account,
        requester: Option<&Account>,
    ) -> anyhow::Result<()>;

    async fn verify(&self, tx: &Transaction, sender: &Account) -> anyhow::Result<()>;

    /// Produce an additional signature over `tx` with the given keypair.
    fn multisign(&self, keypair: &Keypair, tx: &Transaction) -> SignatureHex;
}

/// Key derivation primitive. The pool hashes the secret; the primitive turns
/// the hash into a keypair.
pub trait KeyDerivation: Send + Sync {
    fn make_keypair(&self, seed: &[u8; 32]) -> Keypair;
}

/// Topic carrying the per-tick broadcast batch. The name is historical and
/// refers to the batch, not the unverified pool list.
pub const BROADCAST_TOPIC: &str = "unverifiedTransaction";

/// Outbound message bus used for the broadcast hand-off.
#[async_trait::async_trait]
pub trait Bus: Send + Sync {
    async fn message(&self, topic: &'static str, txs: Vec<ArcTx>) -> anyhow::Result<()>;
}

pub type ArcAccountStore = Arc<dyn AccountStore>;
pub type ArcTransactionLogic = Arc<dyn TransactionLogic>;
pub type ArcKeyDerivation = Arc<dyn KeyDerivation>;
pub type ArcBus = Arc<dyn Bus>;
