//! Background repair of group documents.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{error::AppResult, routes::group::guard::filter_unresolvable, store::Store};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub groups_scanned: usize,
    pub participants_purged: usize,
    pub expense_links_repaired: usize,
}

/// Purges unresolvable participants and rebuilds every group's expense id
/// list from the expenses' own back-references. Only changed groups are
/// written, so a second run over a clean store writes nothing.
pub async fn reconcile(store: &dyn Store) -> AppResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for mut group in store.all_groups().await? {
        report.groups_scanned += 1;

        let purged = filter_unresolvable(store, &mut group).await?;

        let linked: Vec<Uuid> = store
            .expenses_for_group(group.id)
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        let relinked = linked != group.expenses;
        if relinked {
            tracing::warn!(
                group_id = %group.id,
                stored = group.expenses.len(),
                actual = linked.len(),
                "rebuilding expense links"
            );
            group.expenses = linked;
        }

        if purged > 0 || relinked {
            store.save_group(&group).await?;
            report.participants_purged += purged;
            report.expense_links_repaired += usize::from(relinked);
        }
    }

    Ok(report)
}

pub fn spawn(store: Arc<dyn Store>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match reconcile(store.as_ref()).await {
                Ok(report) if report.participants_purged > 0 || report.expense_links_repaired > 0 => {
                    tracing::info!(?report, "reconciliation repaired groups");
                }
                Ok(report) => tracing::debug!(groups = report.groups_scanned, "reconciliation clean"),
                Err(e) => tracing::error!(error = %e, "reconciliation failed"),
            }
        }
    })
}
