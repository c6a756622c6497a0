pub mod clock;
pub mod config;
pub mod envelope;
mod error;
pub mod format;
mod invocation;
pub mod notify;
pub mod presence;
pub mod query;
mod routes;
pub mod snapshot;
pub mod store;
pub mod threshold;
pub mod validation;

pub use error::InvocationError;
pub use invocation::{
    BODY_CLEARED, BODY_NO_PLAYERS, BODY_NOTHING_NEW, BODY_SENT, BODY_SUPPRESSED, Notifier,
};
pub use joinwatch_db::{Database, DbError};

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use notify::NotificationSink;
use snapshot::SnapshotSource;
use store::{BlobStore, PresenceStore};

/// Create the HTTP trigger router around a shared notifier
pub fn create_app<Q, S, N>(notifier: Arc<Notifier<Q, S, N>>, request_timeout: Duration) -> Router
where
    Q: SnapshotSource + 'static,
    S: PresenceStore + BlobStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/invoke", post(routes::invoke::<Q, S, N>))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(notifier)
}
