use crate::{
    containers::store::PoolUsage,
    model::{ArcTx, Transaction, TxId, TxStatus},
    ports::{ArcAccountStore, ArcBus, ArcKeyDerivation, ArcTransactionLogic, BROADCAST_TOPIC},
    txpool::{GetAllResponse, QueryParams},
    Config, Error, TxPool,
};
use anyhow::anyhow;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::warn;

/// Pool status updates published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatusEvent {
    /// Admitted through the client path.
    Submitted(TxId),
    /// Explicitly removed from the pool.
    Removed(TxId),
}

/// Requests that can be sent to the pool task through its mailbox.
/// Responses are returned over the `response` oneshot channel.
#[derive(Debug)]
pub enum PoolRequest {
    InsertFromClient {
        tx: Transaction,
        broadcast: bool,
        response: oneshot::Sender<Result<TxStatus, Error>>,
    },
    InsertFromNetwork {
        txs: Vec<Transaction>,
        broadcast: bool,
        response: oneshot::Sender<Vec<Result<(), Error>>>,
    },
    AddSignature {
        id: TxId,
        secret: String,
        response: oneshot::Sender<Result<(), Error>>,
    },
    Find {
        id: TxId,
        response: oneshot::Sender<Option<(ArcTx, TxStatus)>>,
    },
    GetAll {
        filter: String,
        params: QueryParams,
        response: oneshot::Sender<GetAllResponse>,
    },
    Ready {
        limit: Option<usize>,
        response: oneshot::Sender<Vec<ArcTx>>,
    },
    Usage {
        response: oneshot::Sender<PoolUsage>,
    },
    Remove {
        id: TxId,
        response: oneshot::Sender<Option<TxStatus>>,
    },
    InsertReady {
        txs: Vec<Transaction>,
        response: oneshot::Sender<()>,
    },
    Sanitize {
        txs: Vec<Transaction>,
        response: oneshot::Sender<()>,
    },
}

/// Client handle for calls into the pool task over its mailbox.
#[derive(Clone)]
pub struct Sender(mpsc::Sender<PoolRequest>);

impl Sender {
    pub async fn insert_from_client(
        &self,
        tx: Transaction,
        broadcast: bool,
    ) -> anyhow::Result<Result<TxStatus, Error>> {
        let (response, receiver) = oneshot::channel();
        self.0
            .send(PoolRequest::InsertFromClient {
                tx,
                broadcast,
                response,
            })
            .await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn insert_from_network(
        &self,
        txs: Vec<Transaction>,
        broadcast: bool,
    ) -> anyhow::Result<Vec<Result<(), Error>>> {
        let (response, receiver) = oneshot::channel();
        self.0
            .send(PoolRequest::InsertFromNetwork {
                txs,
                broadcast,
                response,
            })
            .await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn add_signature(
        &self,
        id: TxId,
        secret: String,
    ) -> anyhow::Result<Result<(), Error>> {
        let (response, receiver) = oneshot::channel();
        self.0
            .send(PoolRequest::AddSignature {
                id,
                secret,
                response,
            })
            .await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn find_one(&self, id: TxId) -> anyhow::Result<Option<(ArcTx, TxStatus)>> {
        let (response, receiver) = oneshot::channel();
        self.0.send(PoolRequest::Find { id, response }).await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn get_all(
        &self,
        filter: String,
        params: QueryParams,
    ) -> anyhow::Result<GetAllResponse> {
        let (response, receiver) = oneshot::channel();
        self.0
            .send(PoolRequest::GetAll {
                filter,
                params,
                response,
            })
            .await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn ready(&self, limit: Option<usize>) -> anyhow::Result<Vec<ArcTx>> {
        let (response, receiver) = oneshot::channel();
        self.0.send(PoolRequest::Ready { limit, response }).await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn usage(&self) -> anyhow::Result<PoolUsage> {
        let (response, receiver) = oneshot::channel();
        self.0.send(PoolRequest::Usage { response }).await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn remove(&self, id: TxId) -> anyhow::Result<Option<TxStatus>> {
        let (response, receiver) = oneshot::channel();
        self.0.send(PoolRequest::Remove { id, response }).await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn insert_ready(&self, txs: Vec<Transaction>) -> anyhow::Result<()> {
        let (response, receiver) = oneshot::channel();
        self.0
            .send(PoolRequest::InsertReady { txs, response })
            .await?;
        receiver.await.map_err(Into::into)
    }

    pub async fn sanitize(&self, txs: Vec<Transaction>) -> anyhow::Result<()> {
        let (response, receiver) = oneshot::channel();
        self.0.send(PoolRequest::Sanitize { txs, response }).await?;
        receiver.await.map_err(Into::into)
    }
}

struct RunningService {
    join: JoinHandle<()>,
    stop: mpsc::Sender<()>,
    sender: Sender,
}

/// Service shell around the pool task: owns the lifecycle, hands out mailbox
/// senders and status subscriptions.
pub struct Service {
    config: Config,
    status: broadcast::Sender<TxStatusEvent>,
    running: Mutex<Option<RunningService>>,
}

impl Service {
    pub fn new(config: Config) -> Self {
        let (status, _) = broadcast::channel(100);
        Self {
            config,
            status,
            running: Mutex::new(None),
        }
    }

    /// Mailbox handle of the running task, if any.
    pub fn sender(&self) -> Option<Sender> {
        self.running.lock().as_ref().map(|running| running.sender.clone())
    }

    pub fn tx_status_subscribe(&self) -> broadcast::Receiver<TxStatusEvent> {
        self.status.subscribe()
    }

    /// Spawn the pool task. Starting an already-running service is an error.
    pub fn start(
        &self,
        accounts: ArcAccountStore,
        logic: ArcTransactionLogic,
        keys: ArcKeyDerivation,
        bus: ArcBus,
    ) -> anyhow::Result<Sender> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(anyhow!("transaction pool service is already running"));
        }

        let (request_tx, request_rx) = mpsc::channel(100);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task = Task {
            pool: TxPool::new(self.config.clone(), accounts, logic, keys),
            bus,
            status: self.status.clone(),
            receiver: request_rx,
            stop: stop_rx,
            process_interval: self.config.process_interval,
            expiry_interval: self.config.expiry_interval,
        };
        let sender = Sender(request_tx);

        *running = Some(RunningService {
            join: tokio::spawn(task.run()),
            stop: stop_tx,
            sender: sender.clone(),
        });
        Ok(sender)
    }

    /// Signal the task to stop and hand back its join handle. In-flight
    /// operations complete before the task exits.
    pub async fn stop(&self) -> Option<JoinHandle<()>> {
        let maybe_running = self.running.lock().take();
        if let Some(running) = maybe_running {
            // Ignore possible send error, as the JoinHandle will report errors anyway
            let _ = running.stop.send(()).await;
            Some(running.join)
        } else {
            warn!("Trying to stop a transaction pool service that is not running");
            None
        }
    }
}

struct Task {
    pool: TxPool,
    bus: ArcBus,
    status: broadcast::Sender<TxStatusEvent>,
    receiver: mpsc::Receiver<PoolRequest>,
    stop: mpsc::Receiver<()>,
    process_interval: Duration,
    expiry_interval: Duration,
}

impl Task {
    async fn run(mut self) {
        let mut process = tokio::time::interval(self.process_interval);
        process.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut expiry = tokio::time::interval(self.expiry_interval);
        expiry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // same cadence as expiry, but a separate timer so the two can be
        // split into distinct config knobs later
        let mut invalid_reset = tokio::time::interval(self.expiry_interval);
        invalid_reset.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.stop.recv() => break,
                request = self.receiver.recv() => {
                    match request {
                        Some(request) => self.handle_request(request).await,
                        None => break,
                    }
                }
                _ = process.tick() => self.process_pool().await,
                _ = expiry.tick() => self.pool.expire_tick(),
                _ = invalid_reset.tick() => self.pool.reset_invalid(),
            }
        }
    }

    /// One promotion tick followed by the broadcast hand-off: whatever the
    /// tick accumulated goes out as a single bus message.
    async fn process_pool(&mut self) {
        let batch = self.pool.process_tick().await;
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.bus.message(BROADCAST_TOPIC, batch).await {
            warn!(%err, "failed to publish broadcast batch");
        }
    }

    async fn handle_request(&mut self, request: PoolRequest) {
        match request {
            PoolRequest::InsertFromClient {
                tx,
                broadcast,
                response,
            } => {
                let tx_id = tx.id.clone();
                let out = self.pool.insert_from_client(tx, broadcast).await;
                if out.is_ok() {
                    let _ = self.status.send(TxStatusEvent::Submitted(tx_id));
                }
                let _ = response.send(out);
            }
            PoolRequest::InsertFromNetwork {
                txs,
                broadcast,
                response,
            } => {
                let _ = response.send(self.pool.insert_from_network(txs, broadcast).await);
            }
            PoolRequest::AddSignature {
                id,
                secret,
                response,
            } => {
                let _ = response.send(self.pool.add_signature(&id, &secret));
            }
            PoolRequest::Find { id, response } => {
                let _ = response.send(self.pool.find_one(&id));
            }
            PoolRequest::GetAll {
                filter,
                params,
                response,
            } => {
                let _ = response.send(self.pool.get_all(&filter, &params));
            }
            PoolRequest::Ready { limit, response } => {
                let _ = response.send(self.pool.ready_sorted(limit));
            }
            PoolRequest::Usage { response } => {
                let _ = response.send(self.pool.usage());
            }
            PoolRequest::Remove { id, response } => {
                let removed = self.pool.remove_by_tx_id(&id);
                if removed.is_some() {
                    let _ = self.status.send(TxStatusEvent::Removed(id));
                }
                let _ = response.send(removed);
            }
            PoolRequest::InsertReady { txs, response } => {
                self.pool.insert_ready(txs);
                let _ = response.send(());
            }
            PoolRequest::Sanitize { txs, response } => {
                self.pool.sanitize(&txs).await;
                let _ = response.send(());
            }
        }
    }
}
