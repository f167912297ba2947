use crate::{
    containers::store::PoolStore,
    model::{Amount, TransactionType, TxStatus},
    ports::AccountStore,
    Error,
};

/// Balance the sender would have if every ready transaction were applied:
/// confirmed balance, minus ready debits, plus ready transfer receipts.
///
/// Only the ready list participates; pending transactions are not yet
/// committed to block inclusion.
pub async fn projected_balance(
    store: &PoolStore,
    accounts: &dyn AccountStore,
    address: &str,
) -> Result<i128, Error> {
    let confirmed = accounts
        .balance(address)
        .await
        .map_err(|err| Error::SenderLookupFailed(err.to_string()))?;

    let mut projected = confirmed as i128;
    for info in store.iter(TxStatus::Ready) {
        let tx = info.tx();
        if tx.sender_id.as_deref() == Some(address) {
            projected -= tx.spend() as i128;
        }
        if tx.recipient_id.as_deref() == Some(address)
            && tx.tx_type == TransactionType::Transfer
        {
            projected += tx.amount as i128;
        }
    }
    Ok(projected)
}

/// Solvency check for admitting a spend of `required` against the projection.
/// The failure carries the projected balance; sanitization uses it to size
/// the eviction.
pub async fn check_balance(
    store: &PoolStore,
    accounts: &dyn AccountStore,
    required: Amount,
    address: &str,
) -> Result<i128, Error> {
    let projected = projected_balance(store, accounts, address).await?;
    if projected < required as i128 {
        return Err(Error::InsufficientFunds(address.to_string(), projected));
    }
    Ok(projected)
}
