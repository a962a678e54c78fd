//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. No other task ever touches the `Room`, so
//! every change to it (joins, leaves, starts, casts, and the round
//! deadline firing) happens one at a time, in queue order.
//!
//! The round timer lives inside the actor and is polled in the same
//! `select!` as the command queue. That is what makes "the timer fired
//! just as a player solved the puzzle" a non-event: whichever the actor
//! sees first finishes the room, and the other finds it already finished.

use std::sync::Arc;

use duelroom_protocol::{
    Ability, ConnectionId, EndReason, Outcome, Role, RoomId, Seat,
    ServerMessage,
};
use duelroom_timer::{Expiry, RoundTimer};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{
    ActionReport, Notifier, Phase, Room, RoomError, RoomSettings,
    RoomSnapshot,
};

/// A closure run against the room inside the actor.
pub(crate) type RoomJob = Box<dyn FnOnce(&mut Room) + Send>;

/// What a departure did to the room, as reported by
/// [`RoomHandle::leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room is still waiting and the seat should be offered to the
    /// next admission.
    Vacated(Seat),
    /// The room still has an occupant, but the seat is not reusable
    /// (the round started or finished).
    Retained,
    /// That was the last occupant. The actor has stopped.
    Closed,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is a "reply channel": the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    Join {
        connection_id: ConnectionId,
        role: Role,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },
    Start {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    PuzzleSolved {
        connection_id: ConnectionId,
        reply: oneshot::Sender<Result<Outcome, RoomError>>,
    },
    Cast {
        connection_id: ConnectionId,
        ability: Ability,
        reply: oneshot::Sender<Result<ActionReport, RoomError>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Mutate {
        job: RoomJob,
    },
    Shutdown,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone: it's just an `mpsc::Sender` wrapper. The
/// [`RoomStore`](crate::RoomStore) holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer. A stopped actor surfaces as [`RoomError::Unavailable`].
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn join(
        &self,
        connection_id: ConnectionId,
        role: Role,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            connection_id,
            role,
            reply,
        })
        .await?
    }

    pub async fn leave(
        &self,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave {
            connection_id,
            reply,
        })
        .await?
    }

    pub async fn start(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start {
            connection_id,
            reply,
        })
        .await?
    }

    pub async fn puzzle_solved(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Outcome, RoomError> {
        self.request(|reply| RoomCommand::PuzzleSolved {
            connection_id,
            reply,
        })
        .await?
    }

    pub async fn cast(
        &self,
        connection_id: ConnectionId,
        ability: Ability,
    ) -> Result<ActionReport, RoomError> {
        self.request(|reply| RoomCommand::Cast {
            connection_id,
            ability,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Runs `f` against the room inside the actor and returns its result.
    pub async fn mutate<R, F>(&self, f: F) -> Result<R, RoomError>
    where
        F: FnOnce(&mut Room) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.request(|reply| RoomCommand::Mutate {
            job: Box::new(move |room: &mut Room| {
                let _ = reply.send(f(room));
            }),
        })
        .await
    }

    /// Tells the room to stop (fire-and-forget).
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<N: Notifier> {
    room: Room,
    timer: RoundTimer,
    notifier: Arc<N>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<N: Notifier> RoomActor<N> {
    fn room_id(&self) -> RoomId {
        self.room.room_id()
    }

    /// Runs the actor loop until shutdown, until the room empties, or
    /// until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                expiry = self.timer.expired() => self.on_expiry(expiry),
            }
        }

        tracing::info!(room_id = %self.room_id(), "room actor stopped");
    }

    /// Handles one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                connection_id,
                role,
                reply,
            } => {
                let _ = reply.send(self.handle_join(connection_id, role));
            }
            RoomCommand::Leave {
                connection_id,
                reply,
            } => {
                let result = self.handle_leave(connection_id);
                let closed = matches!(result, Ok(LeaveOutcome::Closed));
                let _ = reply.send(result);
                if closed {
                    return false;
                }
            }
            RoomCommand::Start {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.handle_start(connection_id));
            }
            RoomCommand::PuzzleSolved {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.handle_puzzle_solved(connection_id));
            }
            RoomCommand::Cast {
                connection_id,
                ability,
                reply,
            } => {
                let _ = reply.send(self.handle_cast(connection_id, ability));
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }
            RoomCommand::Mutate { job } => {
                let before = self.room.phase();
                job(&mut self.room);
                self.settle_phase(before);
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room_id(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn role_of(&self, connection_id: ConnectionId) -> Result<Role, RoomError> {
        self.room
            .role_of(connection_id)
            .ok_or(RoomError::UnknownConnection {
                connection_id,
                room_id: self.room_id(),
            })
    }

    fn handle_join(
        &mut self,
        connection_id: ConnectionId,
        role: Role,
    ) -> Result<(), RoomError> {
        let room_id = self.room_id();
        self.room.record_join(role, connection_id)?;
        tracing::info!(
            %room_id,
            %connection_id,
            %role,
            players = self.room.occupant_count(),
            "player joined"
        );

        self.notifier.subscribe(room_id, connection_id);
        self.notifier
            .notify_player(connection_id, ServerMessage::Role { role, room_id });

        if let Some(waiting) = self.room.player(role.opponent()) {
            self.notifier.notify_player(
                waiting.connection_id,
                ServerMessage::OpponentJoined {
                    message: format!("Your opponent has joined as {role}."),
                },
            );
        }
        Ok(())
    }

    fn handle_leave(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<LeaveOutcome, RoomError> {
        let room_id = self.room_id();
        let role = self.role_of(connection_id)?;
        self.room.remove(connection_id);
        self.notifier.unsubscribe(room_id, connection_id);
        tracing::info!(
            %room_id,
            %connection_id,
            %role,
            phase = %self.room.phase(),
            players = self.room.occupant_count(),
            "player left"
        );

        let outcome = match self.room.phase() {
            Phase::Active => {
                // Walking out of a live round forfeits it.
                self.conclude(Outcome::Winner(role.opponent()), EndReason::Forfeit);
                LeaveOutcome::Retained
            }
            Phase::Waiting => {
                if let Some(remaining) = self.room.player(role.opponent()) {
                    self.notifier.notify_player(
                        remaining.connection_id,
                        ServerMessage::LobbyNotice {
                            message: "Your opponent left. Waiting for a new opponent."
                                .into(),
                        },
                    );
                }
                LeaveOutcome::Vacated(Seat { room_id, role })
            }
            Phase::Finished => LeaveOutcome::Retained,
        };

        if self.room.is_empty() {
            Ok(LeaveOutcome::Closed)
        } else {
            Ok(outcome)
        }
    }

    fn handle_start(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<(), RoomError> {
        let role = self.role_of(connection_id)?;
        self.room.start(role, Instant::now())?;
        self.announce_start();
        Ok(())
    }

    /// Arms the round timer and broadcasts `roundStarted` for a room
    /// that just went active.
    fn announce_start(&mut self) {
        let duration = self
            .room
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(self.room.round_duration());
        self.timer.arm(duration);
        tracing::info!(
            room_id = %self.room_id(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "round started"
        );
        self.notifier.notify_room(
            self.room_id(),
            ServerMessage::RoundStarted {
                duration_secs: self.room.round_duration().as_secs(),
            },
        );
    }

    /// Catches up on phase changes made by a [`RoomCommand::Mutate`]
    /// closure.
    ///
    /// The closure can only move the phase through `Room::start` and
    /// `Room::finish`, which keep their guards, so an active room always
    /// has a deadline and a finished one always has an outcome. What the
    /// closure can't do is arm the timer or tell the players; that
    /// happens here, exactly as for the matching client command.
    fn settle_phase(&mut self, before: Phase) {
        let after = self.room.phase();
        if after == before {
            return;
        }
        tracing::debug!(
            room_id = %self.room_id(),
            from = %before,
            to = %after,
            "phase changed inside mutate"
        );
        if before == Phase::Waiting {
            self.announce_start();
        }
        if after == Phase::Finished {
            self.announce_finish();
        }
    }

    fn handle_puzzle_solved(
        &mut self,
        connection_id: ConnectionId,
    ) -> Result<Outcome, RoomError> {
        let role = self.role_of(connection_id)?;
        let outcome = self.room.puzzle_solved(role)?;
        self.announce_finish();
        Ok(outcome)
    }

    fn handle_cast(
        &mut self,
        connection_id: ConnectionId,
        ability: Ability,
    ) -> Result<ActionReport, RoomError> {
        let role = self.role_of(connection_id)?;
        let report = self.room.apply_action(role, ability)?;
        tracing::debug!(
            room_id = %self.room_id(),
            %role,
            %ability,
            turn = report.turn,
            "ability cast"
        );

        self.notifier.notify_room(
            self.room_id(),
            ServerMessage::AbilityCast {
                role,
                ability,
                health: report.health,
            },
        );
        if report.knockout.is_some() {
            self.announce_finish();
        }
        Ok(report)
    }

    fn on_expiry(&mut self, expiry: Expiry) {
        if self.room.phase() != Phase::Active {
            // Finished by something else first; nothing left to do.
            tracing::debug!(
                room_id = %self.room_id(),
                generation = expiry.generation,
                "stale round deadline ignored"
            );
            return;
        }
        self.conclude(Outcome::Timeout, EndReason::Timeout);
    }

    /// Finishes the round (if it is still active) and announces it.
    fn conclude(&mut self, outcome: Outcome, reason: EndReason) {
        match self.room.finish(outcome, reason) {
            Ok(()) => self.announce_finish(),
            Err(e) => tracing::debug!(
                room_id = %self.room_id(),
                error = %e,
                "round already concluded"
            ),
        }
    }

    /// Broadcasts `roundOver` for a room that just finished.
    ///
    /// Every path into `Finished` goes through `Room::finish`, which
    /// succeeds only once per room, and calls this right after. So each
    /// room announces exactly one outcome.
    fn announce_finish(&mut self) {
        self.timer.cancel();
        let Some((outcome, reason)) = self.room.outcome() else {
            return;
        };
        tracing::info!(
            room_id = %self.room_id(),
            %outcome,
            reason = ?reason,
            "round over"
        );
        self.notifier.notify_room(
            self.room_id(),
            ServerMessage::RoundOver { outcome, reason },
        );
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `settings.channel_size` controls backpressure: if the queue fills up,
/// senders wait (bounded channel).
pub(crate) fn spawn_room<N: Notifier>(
    room_id: RoomId,
    settings: &RoomSettings,
    notifier: Arc<N>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(settings.channel_size.max(1));

    let actor = RoomActor {
        room: Room::new(room_id, settings),
        timer: RoundTimer::new(),
        notifier,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
