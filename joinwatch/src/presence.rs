//! Join notifications for every newly seen player.
//!
//! The store holds the names a notification was already sent for. Each
//! pass makes the store match the live roster: names that disappeared are
//! deleted first, then names that are new are inserted and reported as
//! joined. A player who left and came back between two polls is therefore
//! reported again.
//!
//! Store writes happen one by one as decisions are made. If the process
//! dies halfway, the store is left with a subset of the changes and the
//! next pass finishes the job.

use std::collections::HashSet;

use joinwatch_db::DbError;
use tracing::{debug, info};

use crate::snapshot::{PlayerName, ServerSnapshot};
use crate::store::PresenceStore;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Players inserted this pass, in roster order.
    pub joined: Vec<PlayerName>,
    /// Players deleted this pass.
    pub left: Vec<String>,
    /// The server was empty and the store had to be drained.
    pub cleared: bool,
}

impl Reconciliation {
    pub fn should_notify(&self) -> bool {
        !self.joined.is_empty()
    }
}

/// Bring the store in line with `snapshot` and report the differences.
pub async fn reconcile<S: PresenceStore>(
    store: &S,
    snapshot: &ServerSnapshot,
) -> Result<Reconciliation, DbError> {
    let mut notified: HashSet<String> = store.scan_players().await?.into_iter().collect();
    let mut outcome = Reconciliation::default();

    if snapshot.is_empty() {
        if notified.is_empty() {
            info!("no players on the server and none recorded");
            return Ok(outcome);
        }
        info!(recorded = notified.len(), "no players on the server, clearing recorded players");
        outcome.left = remove_departed(store, &mut notified, &[]).await?;
        outcome.cleared = true;
        return Ok(outcome);
    }

    outcome.left = remove_departed(store, &mut notified, &snapshot.players).await?;
    outcome.joined = insert_arrivals(store, &mut notified, &snapshot.players).await?;

    info!(
        joined = outcome.joined.len(),
        left = outcome.left.len(),
        "reconciled players"
    );
    Ok(outcome)
}

/// Delete every recorded name that is not in `present`.
///
/// `notified` is the caller's view of the store and is updated in step.
pub async fn remove_departed<S: PresenceStore>(
    store: &S,
    notified: &mut HashSet<String>,
    present: &[PlayerName],
) -> Result<Vec<String>, DbError> {
    let present: HashSet<&str> = present.iter().map(PlayerName::as_str).collect();
    let mut departed: Vec<String> = notified
        .iter()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect();
    departed.sort();

    for name in &departed {
        store.delete_player(name).await?;
        notified.remove(name);
        debug!(player_name = %name, "player disconnected");
    }
    Ok(departed)
}

/// Insert every name in `present` that is not recorded yet, returning them
/// in roster order.
pub async fn insert_arrivals<S: PresenceStore>(
    store: &S,
    notified: &mut HashSet<String>,
    present: &[PlayerName],
) -> Result<Vec<PlayerName>, DbError> {
    let mut joined = Vec::new();
    for name in present {
        if notified.contains(name.as_str()) {
            debug!(player_name = %name, "already notified");
            continue;
        }
        store.put_player(name.as_str()).await?;
        notified.insert(name.as_str().to_string());
        debug!(player_name = %name, "player joined");
        joined.push(name.clone());
    }
    Ok(joined)
}
