use joinwatch_db::DbError;
use thiserror::Error;

use crate::notify::NotifyError;
use crate::query::QueryError;

/// Anything that ends an invocation early.
///
/// Every variant is fatal for the current invocation. A missing timer is
/// not an error and never shows up here.
#[derive(Debug, Error)]
pub enum InvocationError {
  #[error("Caught error when querying the server: {0}")]
  Query(#[from] QueryError),

  #[error("Caught error when accessing the player database: {0}")]
  Store(DbError),

  #[error("Caught error when reading the timer file: {0}")]
  Blob(DbError),

  #[error("Caught error when saving the timer file: {0}")]
  Upload(DbError),

  #[error("Timer file was empty")]
  EmptyTimer,

  #[error("Timer file did not hold an epoch-second value: {0:?}")]
  InvalidTimer(String),

  #[error("Caught error when sending the notification: {0}")]
  Notify(#[from] NotifyError),
}
