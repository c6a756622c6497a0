mod error;

pub use error::{DbError, Result};

use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

/// Database wrapper for all joinwatch state.
///
/// Holds the set of players a join notification was already sent for, and
/// a small blob table used for the threshold cooldown timer. Every write is
/// a single statement, so each mutation is individually safe to repeat.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Initialize the database schema.
  async fn initialize(&self) -> Result<()> {
    self.conn
            .call(|conn| {
                conn.pragma_update(None, "journal_mode", "WAL")?;

                conn.execute_batch(
                    r#"
                    -- Players a join notification was already sent for
                    CREATE TABLE IF NOT EXISTS notified_players (
                        name TEXT PRIMARY KEY
                    );

                    -- Opaque blobs addressed by bucket and key (timer state lives here)
                    CREATE TABLE IF NOT EXISTS blobs (
                        bucket TEXT NOT NULL,
                        key TEXT NOT NULL,
                        body BLOB NOT NULL,
                        PRIMARY KEY (bucket, key)
                    );
                    "#,
                )?;
                Ok(())
            })
            .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Notified Players
  // ========================================================================

  /// All player names currently recorded as notified, in no particular order.
  pub async fn scan_notified_players(&self) -> Result<Vec<String>> {
    let names = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare_cached("SELECT name FROM notified_players")?;

        let names = stmt
          .query_map([], |row| row.get(0))?
          .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(names)
      })
      .await?;

    Ok(names)
  }

  /// Record that a notification was sent for this player.
  pub async fn insert_notified_player(&self, name: String) -> Result<()> {
    let name_log = name.clone();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("INSERT OR REPLACE INTO notified_players (name) VALUES (?1)")?
          .execute(params![&name])?;
        Ok(())
      })
      .await?;

    debug!(player_name = %name_log, "recorded notified player");
    Ok(())
  }

  /// Forget a player. Deleting a name that is not present is not an error.
  pub async fn delete_notified_player(&self, name: String) -> Result<()> {
    let name_log = name.clone();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("DELETE FROM notified_players WHERE name = ?1")?
          .execute(params![&name])?;
        Ok(())
      })
      .await?;

    debug!(player_name = %name_log, "deleted notified player");
    Ok(())
  }

  // ========================================================================
  // Blobs
  // ========================================================================

  /// Fetch a blob. Returns None if nothing is stored under `(bucket, key)`.
  pub async fn get_blob(&self, bucket: String, key: String) -> Result<Option<Vec<u8>>> {
    let body = self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("SELECT body FROM blobs WHERE bucket = ?1 AND key = ?2")?
          .query_row(params![&bucket, &key], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(body)
  }

  /// Store a blob, replacing whatever was there.
  pub async fn put_blob(&self, bucket: String, key: String, body: Vec<u8>) -> Result<()> {
    let size = body.len();

    self
      .conn
      .call(move |conn| {
        conn
          .prepare_cached("INSERT OR REPLACE INTO blobs (bucket, key, body) VALUES (?1, ?2, ?3)")?
          .execute(params![&bucket, &key, &body])?;
        Ok(())
      })
      .await?;

    debug!(size, "stored blob");
    Ok(())
  }
}
