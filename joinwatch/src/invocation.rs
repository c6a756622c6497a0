use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{Mode, Settings, ThresholdSettings};
use crate::envelope::Envelope;
use crate::error::InvocationError;
use crate::format::{self, Notification};
use crate::notify::NotificationSink;
use crate::presence;
use crate::snapshot::SnapshotSource;
use crate::store::{BlobStore, PresenceStore};
use crate::threshold::{self, GateDecision};

pub const BODY_NO_PLAYERS: &str = "There were no players";
pub const BODY_CLEARED: &str = "There were no players in the server. Cleared database";
pub const BODY_NOTHING_NEW: &str = "Notification doesn't need to be sent";
pub const BODY_SENT: &str = "Notification sent successfully";
pub const BODY_SUPPRESSED: &str = "We haven't passed the target time yet. No need to do anything.";

/// Runs invocations for one configured server.
///
/// Invocations on the same `Notifier` never overlap: [`Notifier::invoke`]
/// holds a lock for its whole run. Separate processes sharing one database
/// are not coordinated and must not poll at the same time.
pub struct Notifier<Q, S, N> {
    settings: Settings,
    source: Q,
    store: S,
    sink: N,
    clock: Box<dyn Clock>,
    in_flight: Mutex<()>,
}

impl<Q, S, N> Notifier<Q, S, N>
where
    Q: SnapshotSource,
    S: PresenceStore + BlobStore,
    N: NotificationSink,
{
    pub fn new(settings: Settings, source: Q, store: S, sink: N) -> Self {
        Self {
            settings,
            source,
            store,
            sink,
            clock: Box::new(SystemClock),
            in_flight: Mutex::new(()),
        }
    }

    /// Replace the clock (tests pin time with this).
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Run one invocation to completion. Never fails: errors become an
    /// error notification plus a failure envelope.
    pub async fn invoke(&self) -> Envelope {
        let _guard = self.in_flight.lock().await;
        info!(mode = self.settings.mode.name(), server = %self.settings.server_address, "invocation started");

        let result = match &self.settings.mode {
            Mode::All => self.run_all().await,
            Mode::Threshold(settings) => self.run_threshold(settings).await,
        };

        match result {
            Ok(envelope) => {
                info!(status = envelope.status_code.code(), body = %envelope.body, "invocation finished");
                envelope
            }
            Err(err) => self.handle_error(err).await,
        }
    }

    async fn run_all(&self) -> Result<Envelope, InvocationError> {
        let snapshot = self.source.fetch().await?;
        info!(
            count = snapshot.count,
            players = ?snapshot.players.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            "fetched players"
        );

        let outcome = presence::reconcile(&self.store, &snapshot)
            .await
            .map_err(InvocationError::Store)?;

        if snapshot.is_empty() {
            let body = if outcome.cleared {
                BODY_CLEARED
            } else {
                BODY_NO_PLAYERS
            };
            return Ok(Envelope::success(body));
        }
        if !outcome.should_notify() {
            return Ok(Envelope::success(BODY_NOTHING_NEW));
        }

        let notification = Notification::PlayersJoined {
            server_name: &snapshot.server_name,
            address: &self.settings.server_address,
            count: snapshot.count,
            joined: &outcome.joined,
        };
        self.sink
            .publish(&notification.subject(), &notification.render())
            .await?;
        info!(joined = outcome.joined.len(), "sent join notification");

        Ok(Envelope::success(BODY_SENT))
    }

    async fn run_threshold(
        &self,
        settings: &ThresholdSettings,
    ) -> Result<Envelope, InvocationError> {
        let now = self.clock.now();
        info!(now = %now, "checking timer");

        match threshold::evaluate(&now, &self.store, &self.source, settings).await? {
            GateDecision::Initialized { target } => {
                let message = format::timer_created_message(&target);
                self.sink
                    .publish(&format::timer_created_subject(), &message)
                    .await?;
                // First run is reported as a failure even though it is expected
                Ok(Envelope::failure(message))
            }
            GateDecision::Suppressed { .. } => Ok(Envelope::success(BODY_SUPPRESSED)),
            GateDecision::Empty => Ok(Envelope::success(BODY_NO_PLAYERS)),
            GateDecision::BelowThreshold { count, threshold } => Ok(Envelope::success(format!(
                "There are {} players, but the threshold is {}, so don't send a notification",
                count, threshold
            ))),
            GateDecision::Crossed { snapshot, target } => {
                let notification = Notification::ThresholdReached {
                    threshold: settings.player_threshold,
                    server_name: &snapshot.server_name,
                    address: &self.settings.server_address,
                    count: snapshot.count,
                    players: &snapshot.players,
                    next_check: &target,
                };
                self.sink
                    .publish(&notification.subject(), &notification.render())
                    .await?;
                info!(count = snapshot.count, next_check = %target, "sent threshold notification");
                Ok(Envelope::success(BODY_SENT))
            }
        }
    }

    async fn handle_error(&self, err: InvocationError) -> Envelope {
        let message = err.to_string();
        error!(error = %message, "invocation failed");

        if let Err(notify_err) = self.sink.publish(&format::error_subject(), &message).await {
            error!(error = %notify_err, "could not send error notification");
        }
        Envelope::failure(message)
    }
}
