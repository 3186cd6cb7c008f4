//! `SessionActor` - drives one room session on a single task.
//!
//! The actor loop multiplexes four sources with `tokio::select!`:
//!
//! 1. the cancellation token (immediate teardown)
//! 2. the command mailbox (`SessionActorHandle` requests)
//! 3. the notification queue fed by collaborators
//! 4. the tick interval (discovery, keepalive, retry timers)
//!
//! Because all four are handled on the same task, the controller needs no
//! locking. The monotonic clock is read from `tokio::time` so tests can run
//! with paused time.

use super::messages::SessionMessage;
use crate::collaborators::{Collaborators, EventSink, SessionEvent};
use crate::config::Config;
use crate::controller::{SessionController, SessionStatus};
use crate::errors::SessionError;

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Mailbox capacity for actor commands.
const SESSION_CHANNEL_BUFFER: usize = 64;

/// Handle to a running `SessionActor`.
///
/// Cheap to clone. All request methods resolve once the actor has processed
/// the request.
#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
}

impl SessionActorHandle {
    /// Build the session, subscribe to collaborators and spawn the actor.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCollaborator` if the directory client is
    /// absent. The actor is not spawned and no subscription outlives the call.
    pub fn spawn(
        config: Config,
        collaborators: Collaborators,
    ) -> Result<(Self, JoinHandle<()>), SessionError> {
        Self::spawn_with_token(config, collaborators, CancellationToken::new())
    }

    /// Like [`Self::spawn`], cancelled together with `cancel_token`.
    ///
    /// # Errors
    ///
    /// See [`Self::spawn`].
    pub fn spawn_with_token(
        config: Config,
        collaborators: Collaborators,
        cancel_token: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), SessionError> {
        let (sink, events) = EventSink::channel();
        let controller = SessionController::new(&config, collaborators, &sink)?;
        // Collaborators hold their own clones; the queue closes once they all
        // unsubscribe.
        drop(sink);

        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let actor = SessionActor {
            peer_id: config.peer_id.clone(),
            controller,
            receiver,
            events,
            events_open: true,
            cancel_token: cancel_token.clone(),
            tick_interval: config.tick_interval,
        };

        let task = tokio::spawn(actor.run());

        Ok((
            Self {
                sender,
                cancel_token,
            },
            task,
        ))
    }

    /// Get the current session status.
    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|respond_to| SessionMessage::GetStatus { respond_to })
            .await
    }

    /// Force room creation. Returns `false` for clients or when joined.
    pub async fn create_room(&self) -> Result<bool, SessionError> {
        self.request(|respond_to| SessionMessage::CreateRoom { respond_to })
            .await
    }

    /// Flip host avatar visibility. `None` for clients.
    pub async fn toggle_host_avatar(&self) -> Result<Option<bool>, SessionError> {
        self.request(|respond_to| SessionMessage::ToggleHostAvatar { respond_to })
            .await
    }

    /// Change the voice relay policy.
    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::SetVoiceEnabled {
            enabled,
            respond_to,
        })
        .await
    }

    /// Tear the session down and wait for the actor to acknowledge.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Shutdown { respond_to })
            .await
    }

    /// Cancel the actor (immediate teardown, no acknowledgement).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|e| SessionError::ActorUnavailable(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::ActorUnavailable(format!("response receive failed: {e}")))
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    peer_id: String,
    controller: SessionController,
    receiver: mpsc::Receiver<SessionMessage>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    events_open: bool,
    cancel_token: CancellationToken,
    tick_interval: Duration,
}

impl SessionActor {
    /// Run the actor loop until cancelled, shut down, or orphaned.
    #[instrument(skip_all, name = "room.actor.session", fields(peer_id = %self.peer_id))]
    async fn run(mut self) {
        info!(
            target: "room.session.actor",
            peer_id = %self.peer_id,
            role = %self.controller.role(),
            "SessionActor started"
        );

        self.controller.start(now());

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.session.actor",
                        peer_id = %self.peer_id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if !self.handle_message(message) {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "room.session.actor",
                                peer_id = %self.peer_id,
                                "SessionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }

                event = self.events.recv(), if self.events_open => {
                    match event {
                        Some(event) => self.controller.handle_event(event, now()),
                        None => {
                            debug!(
                                target: "room.session.actor",
                                "All notification sources released the queue"
                            );
                            self.events_open = false;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.controller.tick(now());
                }
            }
        }

        self.controller.teardown();
        info!(
            target: "room.session.actor",
            peer_id = %self.peer_id,
            "SessionActor stopped"
        );
    }

    /// Handle one command. Returns `false` when the actor should stop.
    fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.controller.status());
            }

            SessionMessage::CreateRoom { respond_to } => {
                let created = self.controller.create_room(now());
                let _ = respond_to.send(created);
            }

            SessionMessage::ToggleHostAvatar { respond_to } => {
                let _ = respond_to.send(self.controller.toggle_host_avatar());
            }

            SessionMessage::SetVoiceEnabled {
                enabled,
                respond_to,
            } => {
                self.controller.set_voice_enabled(enabled);
                let _ = respond_to.send(());
            }

            SessionMessage::Shutdown { respond_to } => {
                self.controller.teardown();
                let _ = respond_to.send(());
                return false;
            }
        }
        true
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
