use crate::{
    config::{
        SECONDS_PER_HOUR, SIGNATURE_TRANSACTION_TIMEOUT_MULTIPLIER,
        UNCONFIRMED_TRANSACTION_TIMEOUT,
    },
    containers::{
        balance,
        info::TxInfo,
        store::{PoolStore, PoolUsage},
    },
    model::{
        real_time, Account, ArcTx, Transaction, TransactionType, TxId, TxStatus,
    },
    ports::{ArcAccountStore, ArcKeyDerivation, ArcTransactionLogic},
    selector, Config, Error,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Optional knobs for [`TxPool::get_all`].
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    /// Reverse the `received_at` ordering of list filters.
    pub reverse: bool,
    /// Truncate the result of list filters.
    pub limit: Option<usize>,
    /// Match value for the field filters.
    pub value: Option<String>,
}

/// Per-list slices matching a field filter.
#[derive(Debug, Clone, Default)]
pub struct GroupedTxs {
    pub unverified: Vec<ArcTx>,
    pub pending: Vec<ArcTx>,
    pub ready: Vec<ArcTx>,
}

/// Result of [`TxPool::get_all`]. Unknown filters come back as a diagnostic
/// string, preserved for API compatibility.
#[derive(Debug, Clone)]
pub enum GetAllResponse {
    List(Vec<ArcTx>),
    Grouped(GroupedTxs),
    UnknownFilter(String),
}

/// The transaction pool: partitioned containers plus the staged admission,
/// promotion, expiry and signing machinery operating on them.
///
/// All methods take `&mut self`; the service serializes access behind its
/// mailbox, so no invariant is observable mid-operation.
pub struct TxPool {
    store: PoolStore,
    config: Config,
    accounts: ArcAccountStore,
    logic: ArcTransactionLogic,
    keys: ArcKeyDerivation,
}

impl TxPool {
    pub fn new(
        config: Config,
        accounts: ArcAccountStore,
        logic: ArcTransactionLogic,
        keys: ArcKeyDerivation,
    ) -> Self {
        Self {
            store: PoolStore::new(),
            config,
            accounts,
            logic,
            keys,
        }
    }

    /// Full admission from a local client: every stage runs before placement,
    /// so a success lands the transaction in `pending` or `ready`.
    #[tracing::instrument(level = "debug", skip_all, fields(tx_id = %tx.id))]
    pub async fn insert_from_client(
        &mut self,
        tx: Transaction,
        broadcast: bool,
    ) -> Result<TxStatus, Error> {
        let (tx, sender) = self.admit(tx).await?;
        if let Err(err) = self.logic.verify(&tx, &sender).await {
            self.store.invalidate(tx.id.clone());
            return Err(Error::VerifyFailed(err.to_string()));
        }
        self.check_unique_type(&tx)?;
        balance::check_balance(
            &self.store,
            self.accounts.as_ref(),
            tx.spend(),
            &sender.address,
        )
        .await?;
        Ok(self.route(Arc::new(tx), Utc::now(), broadcast))
    }

    /// Light admission from the network: only the cheap stages run here, the
    /// rest is deferred to the promotion tick. Transactions are handled in
    /// list order.
    pub async fn insert_from_network(
        &mut self,
        txs: Vec<Transaction>,
        broadcast: bool,
    ) -> Vec<Result<(), Error>> {
        let mut res = Vec::with_capacity(txs.len());
        for tx in txs {
            let out = match self.admit(tx).await {
                Ok((tx, _sender)) => {
                    self.store
                        .insert(TxStatus::Unverified, TxInfo::new(Arc::new(tx), broadcast));
                    Ok(())
                }
                Err(err) => {
                    debug!(%err, "transaction rejected at network ingress");
                    Err(err)
                }
            };
            res.push(out);
        }
        res
    }

    /// Stages shared by both entry points: capacity and duplicate checks,
    /// sender fetch, requester resolution, `process`. Returns the transaction
    /// with its sender address filled in.
    async fn admit(&mut self, mut tx: Transaction) -> Result<(Transaction, Account), Error> {
        if self.store.is_invalid(&tx.id) {
            return Err(Error::AlreadyInvalid(tx.id));
        }
        if self.store.contains(&tx.id) {
            return Err(Error::DuplicateInPool(tx.id));
        }
        if self.store.count() >= self.config.max_tx {
            return Err(Error::PoolFull);
        }

        let sender = self
            .accounts
            .sender(&tx.sender_public_key)
            .await
            .map_err(|err| Error::SenderLookupFailed(err.to_string()))?;
        let requester = self.resolve_requester(&mut tx, &sender).await?;

        if tx.sender_id.is_none() {
            tx.sender_id = Some(
                self.accounts
                    .address_from_public_key(&tx.sender_public_key),
            );
        }

        if let Err(err) = self.logic.process(&tx, &sender, requester.as_ref()).await {
            self.store.invalidate(tx.id.clone());
            return Err(Error::ProcessFailed(err.to_string()));
        }
        Ok((tx, sender))
    }

    /// For multisig senders, make sure the signature list exists and resolve
    /// the requester account when one is named.
    async fn resolve_requester(
        &self,
        tx: &mut Transaction,
        sender: &Account,
    ) -> Result<Option<Account>, Error> {
        if sender.multisignatures.is_empty() {
            return Ok(None);
        }
        if tx.signatures.is_none() {
            tx.signatures = Some(Vec::new());
        }
        let Some(requester_pk) = tx.requester_public_key.clone() else {
            return Ok(None);
        };
        self.accounts
            .account(&requester_pk)
            .await
            .map_err(|err| Error::SenderLookupFailed(err.to_string()))?
            .map(Some)
            .ok_or(Error::RequesterNotFound)
    }

    fn check_unique_type(&self, tx: &Transaction) -> Result<(), Error> {
        if tx.tx_type.is_unique_per_sender()
            && self
                .store
                .iter(TxStatus::Ready)
                .any(|info| info.tx().sender_public_key == tx.sender_public_key)
        {
            return Err(Error::DuplicateTypeForSender);
        }
        Ok(())
    }

    /// Placement rule shared by admission and promotion: multisignature
    /// registrations, transactions gathering signatures and future-dated
    /// transactions wait in `pending`; everything else is block-eligible.
    fn route(&mut self, tx: ArcTx, received_at: DateTime<Utc>, broadcast: bool) -> TxStatus {
        if tx.tx_type == TransactionType::Multisignature
            || tx.signatures.is_some()
            || real_time(tx.timestamp) > received_at
        {
            self.store
                .insert(TxStatus::Pending, TxInfo::at(tx, received_at, broadcast));
            TxStatus::Pending
        } else {
            if broadcast {
                self.store.push_outbox(tx.clone());
            }
            self.store
                .insert(TxStatus::Ready, TxInfo::at(tx, received_at, false));
            TxStatus::Ready
        }
    }

    /// One promotion tick: drain the unverified list, then promote fully
    /// signed multisignatures, then hand back the broadcast batch. Phase A
    /// always completes before phase B.
    pub async fn process_tick(&mut self) -> Vec<ArcTx> {
        self.drain_unverified().await;
        self.promote_pending();
        self.store.drain_outbox()
    }

    /// Phase A. Each transaction is removed before verification; failures
    /// are logged and dropped so the drain continues.
    async fn drain_unverified(&mut self) {
        let ids: Vec<TxId> = self
            .store
            .iter(TxStatus::Unverified)
            .map(|info| info.tx().id.clone())
            .collect();

        for id in ids {
            let Some(pool_info) = self.store.remove(TxStatus::Unverified, &id) else {
                continue;
            };
            let (tx, received_at, broadcast) = pool_info.into_parts();

            let sender = match self.accounts.sender(&tx.sender_public_key).await {
                Ok(sender) => sender,
                Err(err) => {
                    warn!(tx_id = %id, %err, "failed to get sender, discarding");
                    continue;
                }
            };
            if let Err(err) = self.logic.verify(tx.as_ref(), &sender).await {
                self.store.invalidate(id.clone());
                info!(tx_id = %id, %err, "verification failed, discarding");
                continue;
            }
            if self.check_unique_type(tx.as_ref()).is_err() {
                debug!(tx_id = %id, "transaction type is already in pool for sender, discarding");
                continue;
            }
            if let Err(err) = balance::check_balance(
                &self.store,
                self.accounts.as_ref(),
                tx.spend(),
                &sender.address,
            )
            .await
            {
                info!(tx_id = %id, %err, "balance check failed, discarding");
                continue;
            }
            self.route(tx, received_at, broadcast);
        }
    }

    /// Phase B. Only multisignatures that have gathered enough signatures
    /// move; future-dated and still-gathering transactions stay until the
    /// expiry sweep takes them.
    fn promote_pending(&mut self) {
        let promotable: Vec<TxId> = self
            .store
            .iter(TxStatus::Pending)
            .filter(|pool_info| {
                let tx = pool_info.tx();
                tx.tx_type == TransactionType::Multisignature
                    && tx.multisig.as_ref().is_some_and(|multisig| {
                        tx.signatures.as_ref().map_or(0, Vec::len) >= usize::from(multisig.min)
                    })
            })
            .map(|pool_info| pool_info.tx().id.clone())
            .collect();

        for id in promotable {
            let Some(mut pool_info) = self.store.remove(TxStatus::Pending, &id) else {
                continue;
            };
            if self.check_unique_type(pool_info.tx()).is_err() {
                // leave it pending; the expiry sweep reaps it
                self.store.insert(TxStatus::Pending, pool_info);
                continue;
            }
            if pool_info.take_broadcast() {
                self.store.push_outbox(pool_info.tx().clone());
            }
            self.store.insert(TxStatus::Ready, pool_info);
            debug!(tx_id = %id, "multisignature transaction promoted to ready");
        }
    }

    /// One expiry sweep over unverified, pending and ready, in that order.
    pub fn expire_tick(&mut self) {
        let now = Utc::now();
        for status in [TxStatus::Unverified, TxStatus::Pending, TxStatus::Ready] {
            let expired: Vec<TxId> = self
                .store
                .iter(status)
                .filter(|pool_info| {
                    now.signed_duration_since(pool_info.received_at())
                        .num_seconds()
                        > expiry_seconds(pool_info.tx())
                })
                .map(|pool_info| pool_info.tx().id.clone())
                .collect();
            for id in expired {
                self.store.remove(status, &id);
                info!(tx_id = %id, list = %status, "transaction expired, removed from pool");
            }
        }
    }

    /// Drop the negative cache so previously rejected ids get another chance.
    pub fn reset_invalid(&mut self) {
        let cleared = self.store.clear_invalid();
        if cleared > 0 {
            debug!(count = cleared, "invalid transaction cache cleared");
        }
    }

    /// Derive a keypair from the secret and append its signature to a pending
    /// multisignature transaction.
    pub fn add_signature(&mut self, id: &str, secret: &str) -> Result<(), Error> {
        let Some(pool_info) = self.store.get(TxStatus::Pending, id) else {
            return Err(Error::NotInPool(id.to_string()));
        };

        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let keypair = self.keys.make_keypair(&seed);

        let tagged_key = format!("+{}", keypair.public_key);
        let allowed = pool_info
            .tx()
            .multisig
            .as_ref()
            .is_some_and(|multisig| multisig.keysgroup.iter().any(|key| key == &tagged_key));
        if !allowed {
            return Err(Error::PermissionDenied);
        }

        let signature = self.logic.multisign(&keypair, pool_info.tx());

        // the earlier get() proved membership, but the borrow must be reacquired mutably
        let Some(pool_info) = self.store.get_mut(TxStatus::Pending, id) else {
            return Err(Error::NotInPool(id.to_string()));
        };
        let signatures = pool_info.tx_mut().signatures.get_or_insert_with(Vec::new);
        if signatures.contains(&signature) {
            return Err(Error::AlreadySigned);
        }
        signatures.push(signature);
        Ok(())
    }

    /// Lookup across the lists, first hit wins.
    pub fn find_one(&self, id: &str) -> Option<(ArcTx, TxStatus)> {
        self.store
            .find(id)
            .map(|(info, status)| (info.tx().clone(), status))
    }

    /// Filtered enumeration. List filters return `received_at`-ordered
    /// slices; field filters return the matching sublist of every list.
    pub fn get_all(&self, filter: &str, params: &QueryParams) -> GetAllResponse {
        match filter {
            "unverified" | "pending" | "ready" => {
                let status = match filter {
                    "unverified" => TxStatus::Unverified,
                    "pending" => TxStatus::Pending,
                    _ => TxStatus::Ready,
                };
                let mut list: Vec<&TxInfo> = self.store.iter(status).collect();
                list.sort_by_key(|info| info.received_at());
                if params.reverse {
                    list.reverse();
                }
                GetAllResponse::List(
                    list.into_iter()
                        .take(params.limit.unwrap_or(usize::MAX))
                        .map(|info| info.tx().clone())
                        .collect(),
                )
            }
            "sender_id" | "sender_pk" | "recipient_id" | "recipient_pk" => {
                let value = params.value.as_deref().unwrap_or_default();
                let matches = |tx: &Transaction| match filter {
                    "sender_id" => tx.sender_id.as_deref() == Some(value),
                    "sender_pk" => tx.sender_public_key == value,
                    "recipient_id" => tx.recipient_id.as_deref() == Some(value),
                    _ => tx.recipient_public_key.as_deref() == Some(value),
                };
                let slice = |status: TxStatus| {
                    self.store
                        .iter(status)
                        .filter(|info| matches(info.tx()))
                        .map(|info| info.tx().clone())
                        .collect()
                };
                GetAllResponse::Grouped(GroupedTxs {
                    unverified: slice(TxStatus::Unverified),
                    pending: slice(TxStatus::Pending),
                    ready: slice(TxStatus::Ready),
                })
            }
            other => GetAllResponse::UnknownFilter(format!("Invalid filter: {other}")),
        }
    }

    /// Forger view of the ready list.
    pub fn ready_sorted(&self, limit: Option<usize>) -> Vec<ArcTx> {
        selector::sort_for_inclusion(self.store.iter(TxStatus::Ready), limit)
    }

    pub fn usage(&self) -> PoolUsage {
        self.store.usage()
    }

    /// Remove the id from every list it appears in and return the first
    /// holder. Membership in more than one list is an invariant violation
    /// worth surfacing.
    pub fn remove_by_tx_id(&mut self, id: &str) -> Option<TxStatus> {
        let mut first = None;
        let mut holders = 0usize;
        for status in [TxStatus::Unverified, TxStatus::Pending, TxStatus::Ready] {
            if self.store.remove(status, id).is_some() {
                holders += 1;
                if first.is_none() {
                    first = Some(status);
                }
            }
        }
        if holders > 1 {
            debug!(tx_id = %id, holders, "transaction was present in more than one list");
        }
        first
    }

    /// Unconditionally move a batch into ready with one shared fresh
    /// `received_at`; used when the block producer rolls a failed block back.
    pub fn insert_ready(&mut self, txs: Vec<Transaction>) {
        let received_at = Utc::now();
        for tx in txs {
            self.remove_by_tx_id(&tx.id);
            self.store
                .insert(TxStatus::Ready, TxInfo::at(Arc::new(tx), received_at, false));
        }
    }

    /// Post-block cleanup: drop each confirmed transaction, then probe its
    /// sender's solvency and evict ready transactions until the projection is
    /// non-negative again.
    pub async fn sanitize(&mut self, confirmed: &[Transaction]) {
        for tx in confirmed {
            self.remove_by_tx_id(&tx.id);

            let address = match &tx.sender_id {
                Some(address) => address.clone(),
                None => self
                    .accounts
                    .address_from_public_key(&tx.sender_public_key),
            };
            let has_ready = self
                .store
                .iter(TxStatus::Ready)
                .any(|info| info.tx().sender_id.as_deref() == Some(address.as_str()));
            if !has_ready {
                continue;
            }

            match balance::check_balance(&self.store, self.accounts.as_ref(), 0, &address).await
            {
                Ok(_) => {}
                Err(Error::InsufficientFunds(_, projected)) => {
                    self.credit_pop(&address, projected)
                }
                Err(err) => {
                    warn!(%address, %err, "balance probe failed during sanitize")
                }
            }
        }
    }

    /// Evict ready transactions of an underwater sender. A single
    /// transaction whose spend exactly cancels the deficit is preferred;
    /// otherwise the largest spends go first, ties broken by larger id.
    fn credit_pop(&mut self, address: &str, mut projected: i128) {
        let mut candidates: Vec<ArcTx> = self
            .store
            .iter(TxStatus::Ready)
            .filter(|info| info.tx().sender_id.as_deref() == Some(address))
            .map(|info| info.tx().clone())
            .collect();

        if let Some(exact) = candidates
            .iter()
            .find(|tx| projected + tx.spend() as i128 == 0)
            .cloned()
        {
            candidates = vec![exact];
        } else {
            candidates.sort_by(|a, b| (a.spend(), &a.id).cmp(&(b.spend(), &b.id)));
        }

        while projected < 0 {
            let Some(tx) = candidates.pop() else {
                break;
            };
            self.remove_by_tx_id(&tx.id);
            info!(tx_id = %tx.id, %address, "evicted ready transaction to restore solvency");
            projected += tx.spend() as i128;
        }
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut PoolStore {
        &mut self.store
    }
}

fn expiry_seconds(tx: &Transaction) -> i64 {
    match (tx.tx_type, &tx.multisig) {
        (TransactionType::Multisignature, Some(multisig)) => {
            i64::from(multisig.lifetime) * SECONDS_PER_HOUR
        }
        _ if tx.signatures.is_some() => {
            UNCONFIRMED_TRANSACTION_TIMEOUT * SIGNATURE_TRANSACTION_TIMEOUT_MULTIPLIER
        }
        _ => UNCONFIRMED_TRANSACTION_TIMEOUT,
    }
}
