//! Mock ports and transaction builders shared by the unit tests.

use crate::{
    model::{
        Account, Address, Amount, ArcTx, Keypair, MultisigRegistration, SignatureHex,
        Transaction, TransactionType,
    },
    ports::{AccountStore, Bus, KeyDerivation, TransactionLogic},
    Config, TxPool,
};
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

/// Deterministic address derivation used by every mock: first eight bytes of
/// `sha256(public_key)` as a decimal, suffixed with `L`.
pub fn mock_address(public_key: &str) -> Address {
    let digest = Sha256::digest(public_key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("{}L", u64::from_be_bytes(prefix))
}

pub fn funded_account(public_key: &str, balance: Amount) -> Account {
    Account {
        address: mock_address(public_key),
        public_key: public_key.to_string(),
        balance,
        multisignatures: Vec::new(),
    }
}

/// Seconds since the chain epoch, now.
pub fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp() - crate::config::EPOCH_TIME_UNIX
}

pub fn transfer_tx(
    id: &str,
    sender_pk: &str,
    recipient: &str,
    amount: Amount,
    fee: Amount,
) -> Transaction {
    Transaction {
        id: id.to_string(),
        tx_type: TransactionType::Transfer,
        sender_public_key: sender_pk.to_string(),
        sender_id: Some(mock_address(sender_pk)),
        requester_public_key: None,
        recipient_id: Some(recipient.to_string()),
        recipient_public_key: None,
        amount,
        fee,
        timestamp: epoch_now(),
        signatures: None,
        multisig: None,
    }
}

pub fn delegate_tx(id: &str, sender_pk: &str, fee: Amount) -> Transaction {
    Transaction {
        tx_type: TransactionType::Delegate,
        recipient_id: None,
        amount: 0,
        ..transfer_tx(id, sender_pk, "", 0, fee)
    }
}

/// Keysgroup entry matching the mock key derivation for a given secret.
pub fn signer_entry(secret: &str) -> String {
    format!("+{}", hex::encode(Sha256::digest(secret.as_bytes())))
}

pub fn multisig_tx(
    id: &str,
    sender_pk: &str,
    min: u8,
    lifetime: u16,
    secrets: &[&str],
) -> Transaction {
    Transaction {
        tx_type: TransactionType::Multisignature,
        recipient_id: None,
        amount: 0,
        signatures: Some(Vec::new()),
        multisig: Some(MultisigRegistration {
            min,
            lifetime,
            keysgroup: secrets.iter().map(|secret| signer_entry(secret)).collect(),
        }),
        ..transfer_tx(id, sender_pk, "", 0, 5)
    }
}

#[derive(Default)]
pub struct MockAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MockAccountStore {
    pub fn insert(&self, account: Account) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.public_key.clone(), account);
    }
}

#[async_trait::async_trait]
impl AccountStore for MockAccountStore {
    async fn sender(&self, public_key: &str) -> anyhow::Result<Account> {
        // unknown senders materialize as empty accounts, as the real store does
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(public_key)
            .cloned()
            .unwrap_or_else(|| funded_account(public_key, 0)))
    }

    async fn account(&self, public_key: &str) -> anyhow::Result<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(public_key).cloned())
    }

    async fn balance(&self, address: &str) -> anyhow::Result<Amount> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|account| account.address == address)
            .map(|account| account.balance)
            .unwrap_or(0))
    }

    fn address_from_public_key(&self, public_key: &str) -> Address {
        mock_address(public_key)
    }
}

#[derive(Default)]
pub struct MockLogic {
    fail_process: Mutex<HashSet<String>>,
    fail_verify: Mutex<HashSet<String>>,
}

impl MockLogic {
    pub fn fail_process(&self, id: &str) {
        self.fail_process.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_verify(&self, id: &str) {
        self.fail_verify.lock().unwrap().insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_process.lock().unwrap().clear();
        self.fail_verify.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl TransactionLogic for MockLogic {
    async fn process(
        &self,
        tx: &Transaction,
        _sender: &Account,
        _requester: Option<&Account>,
    ) -> anyhow::Result<()> {
        if self.fail_process.lock().unwrap().contains(&tx.id) {
            anyhow::bail!("invalid transaction body: {}", tx.id);
        }
        Ok(())
    }

    async fn verify(&self, tx: &Transaction, _sender: &Account) -> anyhow::Result<()> {
        if self.fail_verify.lock().unwrap().contains(&tx.id) {
            anyhow::bail!("signature does not verify: {}", tx.id);
        }
        Ok(())
    }

    fn multisign(&self, keypair: &Keypair, tx: &Transaction) -> SignatureHex {
        let payload = format!("{}:{}", keypair.private_key, tx.id);
        hex::encode(Sha256::digest(payload.as_bytes()))
    }
}

/// Key derivation that echoes the seed: the mock public key of a secret is
/// `hex(sha256(secret))`, which is what [`signer_entry`] encodes.
pub struct MockKeys;

impl KeyDerivation for MockKeys {
    fn make_keypair(&self, seed: &[u8; 32]) -> Keypair {
        Keypair {
            public_key: hex::encode(seed),
            private_key: hex::encode(seed),
        }
    }
}

#[derive(Default)]
pub struct MockBus {
    pub batches: Mutex<Vec<(&'static str, Vec<ArcTx>)>>,
}

#[async_trait::async_trait]
impl Bus for MockBus {
    async fn message(&self, topic: &'static str, txs: Vec<ArcTx>) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push((topic, txs));
        Ok(())
    }
}

/// Bundle of mock ports, with a shortcut for building a pool over them.
pub struct PoolContext {
    pub accounts: Arc<MockAccountStore>,
    pub logic: Arc<MockLogic>,
    pub keys: Arc<MockKeys>,
    pub bus: Arc<MockBus>,
}

impl PoolContext {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(MockAccountStore::default()),
            logic: Arc::new(MockLogic::default()),
            keys: Arc::new(MockKeys),
            bus: Arc::new(MockBus::default()),
        }
    }

    pub fn pool(&self, config: Config) -> TxPool {
        TxPool::new(
            config,
            self.accounts.clone(),
            self.logic.clone(),
            self.keys.clone(),
        )
    }
}
