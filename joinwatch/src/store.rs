use std::future::Future;

use joinwatch_db::{Database, DbError};

/// Durable set of player names a join notification was already sent for.
///
/// Every operation is a single unconditional read or write; there is no
/// compare-and-swap, so callers must not run two reconciliations at once.
pub trait PresenceStore: Send + Sync {
    fn scan_players(&self) -> impl Future<Output = Result<Vec<String>, DbError>> + Send;
    fn put_player(&self, name: &str) -> impl Future<Output = Result<(), DbError>> + Send;
    fn delete_player(&self, name: &str) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Byte blobs addressed by bucket and key. A missing blob is `Ok(None)`.
pub trait BlobStore: Send + Sync {
    fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, DbError>> + Send;

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

impl PresenceStore for Database {
    async fn scan_players(&self) -> Result<Vec<String>, DbError> {
        self.scan_notified_players().await
    }

    async fn put_player(&self, name: &str) -> Result<(), DbError> {
        self.insert_notified_player(name.to_string()).await
    }

    async fn delete_player(&self, name: &str) -> Result<(), DbError> {
        self.delete_notified_player(name.to_string()).await
    }
}

impl BlobStore for Database {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.get_blob(bucket.to_string(), key.to_string()).await
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), DbError> {
        self.put_blob(bucket.to_string(), key.to_string(), body).await
    }
}
