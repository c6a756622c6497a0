//! Cooldown-gated notification when the player count reaches a threshold.
//!
//! # States
//!
//! ```text
//!  (no timer) ──first check──► Armed(target)
//!  Armed(target), now <  target ──► Suppressed
//!  Armed(target), now >= target ──► Eligible ──count >= threshold──► Armed(now + cooldown)
//!                                       └──────otherwise──────────► Armed(target)
//! ```
//!
//! The timer is one blob holding the target instant as decimal epoch
//! seconds. It is only ever rewritten as `now + cooldown` with `now` past
//! the previous target, so it never moves backwards.
//!
//! The new target is saved before the caller sends the notification. A
//! crash in between loses that notification instead of sending it twice.

use tracing::{info, warn};

use crate::clock::{TimePoint, minutes_to_seconds};
use crate::config::ThresholdSettings;
use crate::error::InvocationError;
use crate::snapshot::{ServerSnapshot, SnapshotSource};
use crate::store::BlobStore;

/// Key of the timer blob inside the configured bucket.
pub const TIMER_KEY: &str = "timer.txt";

/// Result of [`evaluate`], describing which branch was taken.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// No timer existed. One was created; the server was not queried.
    Initialized { target: TimePoint },

    /// The cooldown has not run out yet. Nothing was queried or written.
    Suppressed { target: TimePoint },

    /// Eligible, but nobody is playing.
    Empty,

    /// Eligible, but fewer players than the threshold.
    BelowThreshold { count: u32, threshold: u32 },

    /// Threshold reached. The timer was re-armed to `target`; the caller
    /// should notify.
    Crossed {
        snapshot: ServerSnapshot,
        target: TimePoint,
    },
}

/// Encode a target instant the way it is stored.
pub fn encode_target(seconds: i64) -> Vec<u8> {
    seconds.to_string().into_bytes()
}

/// Decode a stored target. Only the first line is read; a zero target counts
/// as empty.
pub fn decode_target(body: &[u8]) -> Result<i64, InvocationError> {
    let text = String::from_utf8_lossy(body);
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Err(InvocationError::EmptyTimer);
    }
    match line.parse::<i64>() {
        Ok(0) => Err(InvocationError::EmptyTimer),
        Ok(seconds) => Ok(seconds),
        Err(_) => Err(InvocationError::InvalidTimer(line.to_string())),
    }
}

/// Run one pass of the gate at instant `now`.
///
/// Errors reading the timer are returned before anything is written.
pub async fn evaluate<B, Q>(
    now: &TimePoint,
    store: &B,
    source: &Q,
    settings: &ThresholdSettings,
) -> Result<GateDecision, InvocationError>
where
    B: BlobStore,
    Q: SnapshotSource,
{
    let cooldown = minutes_to_seconds(settings.cooldown_minutes);

    let stored = store
        .get(&settings.bucket, TIMER_KEY)
        .await
        .map_err(InvocationError::Blob)?;

    let Some(body) = stored else {
        let target = now.advance(cooldown);
        warn!(target = %target, "no timer found, creating one");
        store
            .put(&settings.bucket, TIMER_KEY, encode_target(target.seconds()))
            .await
            .map_err(InvocationError::Upload)?;
        return Ok(GateDecision::Initialized { target });
    };

    let target = TimePoint::from_secs(decode_target(&body)?);
    info!(
        now = %now,
        target = %target,
        hours_past_target = now.seconds().saturating_sub(target.seconds()) as f64 / 3600.0,
        "comparing current time to timer"
    );

    if now.seconds() < target.seconds() {
        info!("target time not reached yet");
        return Ok(GateDecision::Suppressed { target });
    }

    let snapshot = source.fetch().await?;
    let threshold = settings.player_threshold;

    if snapshot.count == 0 {
        info!("no players on the server");
        return Ok(GateDecision::Empty);
    }
    if snapshot.count < threshold {
        info!(count = snapshot.count, threshold, "player count below threshold");
        return Ok(GateDecision::BelowThreshold {
            count: snapshot.count,
            threshold,
        });
    }

    let target = now.advance(cooldown);
    info!(count = snapshot.count, threshold, target = %target, "threshold reached, re-arming timer");
    store
        .put(&settings.bucket, TIMER_KEY, encode_target(target.seconds()))
        .await
        .map_err(InvocationError::Upload)?;

    Ok(GateDecision::Crossed { snapshot, target })
}
