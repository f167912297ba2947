use std::{ops::Deref, sync::Arc};

use crate::model::{ArcTx, Transaction};
use chrono::{DateTime, Utc};

/// Pool-internal wrapper around a transaction: when it entered the pool and
/// whether it should be gossiped once it reaches the ready list.
#[derive(Debug, Clone)]
pub struct TxInfo {
    tx: ArcTx,
    received_at: DateTime<Utc>,
    broadcast: bool,
}

impl TxInfo {
    pub fn new(tx: ArcTx, broadcast: bool) -> Self {
        Self::at(tx, Utc::now(), broadcast)
    }

    pub fn at(tx: ArcTx, received_at: DateTime<Utc>, broadcast: bool) -> Self {
        Self {
            tx,
            received_at,
            broadcast,
        }
    }

    pub fn tx(&self) -> &ArcTx {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut Transaction {
        Arc::make_mut(&mut self.tx)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Clears the broadcast intent and returns its previous value.
    pub fn take_broadcast(&mut self) -> bool {
        std::mem::take(&mut self.broadcast)
    }

    pub fn into_parts(self) -> (ArcTx, DateTime<Utc>, bool) {
        (self.tx, self.received_at, self.broadcast)
    }
}

impl Deref for TxInfo {
    type Target = ArcTx;
    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}
