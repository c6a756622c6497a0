use crate::Notifier;
use crate::envelope::Envelope;
use crate::notify::NotificationSink;
use crate::snapshot::SnapshotSource;
use crate::store::{BlobStore, PresenceStore};

use axum::extract::State;
use std::sync::Arc;

/// Run one invocation and answer with its envelope.
///
/// Concurrent requests queue behind the invocation already running.
pub(crate) async fn invoke<Q, S, N>(State(notifier): State<Arc<Notifier<Q, S, N>>>) -> Envelope
where
    Q: SnapshotSource + 'static,
    S: PresenceStore + BlobStore + 'static,
    N: NotificationSink + 'static,
{
    notifier.invoke().await
}
