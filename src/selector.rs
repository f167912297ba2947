use crate::{containers::info::TxInfo, model::ArcTx};

// Inclusion order could use a plugin based approach in the future for block
// producers to customize block building (e.g. alternative priorities).

/// Order ready transactions for the forger: highest fee first, then oldest
/// first, then id descending. The id tie-break keeps the view deterministic
/// across forgers that share a pool snapshot.
pub fn sort_for_inclusion<'a>(
    infos: impl Iterator<Item = &'a TxInfo>,
    limit: Option<usize>,
) -> Vec<ArcTx> {
    let mut list: Vec<&TxInfo> = infos.collect();
    list.sort_by(|a, b| {
        b.tx()
            .fee
            .cmp(&a.tx().fee)
            .then_with(|| a.received_at().cmp(&b.received_at()))
            .then_with(|| b.tx().id.cmp(&a.tx().id))
    });
    list.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|info| info.tx().clone())
        .collect()
}
