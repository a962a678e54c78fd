//! The room record: two seats, a phase, and the ability duel.
//!
//! [`Room`] is plain data with methods that enforce its invariants. It
//! does no I/O and knows nothing about tasks or channels; the room actor
//! owns one and is the only thing that mutates it, which is what makes
//! every change to a room totally ordered.
//!
//! # Invariants
//!
//! - At most two occupants, at most one per [`Role`].
//! - The phase only moves forward, one step at a time.
//! - Only the SECOND occupant of a full, waiting room can start the round,
//!   and only once.
//! - An outcome is recorded exactly once, on entering `Finished`.

use std::time::Duration;

use duelroom_protocol::{
    Ability, ConnectionId, EndReason, HealthReport, Outcome, Role, RoomId,
};
use duelroom_timer::deadline_after;
use serde::Serialize;
use tokio::time::Instant;

use crate::{Phase, RoomError, RoomSettings};

/// Damage dealt by `fireball` and healing done by `holylight`.
pub const ABILITY_POWER: u32 = 100;

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// One occupant of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub connection_id: ConnectionId,
    pub role: Role,
    pub health: u32,
    pub hand: Vec<Ability>,
    /// Set when the player casts; both flags reset at the turn boundary.
    pub acted_this_turn: bool,
}

// ---------------------------------------------------------------------------
// ActionReport / RoomSnapshot
// ---------------------------------------------------------------------------

/// The result of a successful [`Room::apply_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReport {
    pub role: Role,
    pub ability: Ability,
    /// Both players' health after the ability resolved.
    pub health: HealthReport,
    /// The turn number after the action (advances once both have acted).
    pub turn: u32,
    /// `Some` if this action knocked the opponent out and ended the round.
    pub knockout: Option<Outcome>,
}

/// A read-only copy of a room's state, safe to hand out of the actor.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub phase: Phase,
    pub players: Vec<PlayerRecord>,
    pub turn: u32,
    #[serde(skip)]
    pub deadline: Option<Instant>,
    pub outcome: Option<Outcome>,
    pub end_reason: Option<EndReason>,
}

impl RoomSnapshot {
    pub fn occupant_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() == 2
    }

    pub fn player(&self, role: Role) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.role == role)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A two-seat duel room.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: RoomId,
    /// Index 0 is FIRST, index 1 is SECOND. Either may be empty.
    players: [Option<PlayerRecord>; 2],
    phase: Phase,
    deadline: Option<Instant>,
    turn: u32,
    outcome: Option<(Outcome, EndReason)>,
    round_duration: Duration,
    starting_health: u32,
    hand: Vec<Ability>,
}

impl Room {
    /// An empty room in the `Waiting` phase.
    pub fn new(room_id: RoomId, settings: &RoomSettings) -> Self {
        Self {
            room_id,
            players: [None, None],
            phase: Phase::Waiting,
            deadline: None,
            turn: 0,
            outcome: None,
            round_duration: settings.round_duration,
            starting_health: settings.starting_health,
            hand: settings.hand.clone(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn outcome(&self) -> Option<(Outcome, EndReason)> {
        self.outcome
    }

    pub fn player(&self, role: Role) -> Option<&PlayerRecord> {
        self.players[role.index()].as_ref()
    }

    /// The role `connection_id` occupies here, if any.
    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        self.occupants()
            .find(|p| p.connection_id == connection_id)
            .map(|p| p.role)
    }

    pub fn occupants(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().flatten()
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants().count()
    }

    pub fn is_full(&self) -> bool {
        self.occupant_count() == 2
    }

    pub fn is_empty(&self) -> bool {
        self.occupant_count() == 0
    }

    /// Both players' current health. An empty seat reports 0.
    pub fn health_report(&self) -> HealthReport {
        let health = |role: Role| self.player(role).map_or(0, |p| p.health);
        HealthReport {
            first: health(Role::First),
            second: health(Role::Second),
        }
    }

    /// Seats `connection_id` as `role`.
    ///
    /// # Errors
    /// - [`RoomError::SlotTaken`] if that seat is occupied.
    /// - [`RoomError::NotPermitted`] if the round already started or the
    ///   connection already sits in the other seat.
    pub fn record_join(
        &mut self,
        role: Role,
        connection_id: ConnectionId,
    ) -> Result<(), RoomError> {
        if self.phase != Phase::Waiting {
            return Err(RoomError::NotPermitted(format!(
                "room {} is {}, not accepting players",
                self.room_id, self.phase
            )));
        }
        if self.players[role.index()].is_some() {
            return Err(RoomError::SlotTaken {
                room_id: self.room_id,
                role,
            });
        }
        if self.role_of(connection_id).is_some() {
            return Err(RoomError::NotPermitted(format!(
                "{connection_id} is already in room {}",
                self.room_id
            )));
        }

        self.players[role.index()] = Some(PlayerRecord {
            connection_id,
            role,
            health: self.starting_health,
            hand: self.hand.clone(),
            acted_this_turn: false,
        });
        Ok(())
    }

    /// Empties the seat held by `connection_id` and returns its role.
    ///
    /// Leaving never changes the phase; the actor decides what a departure
    /// means for the round.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Role> {
        let role = self.role_of(connection_id)?;
        self.players[role.index()] = None;
        Some(role)
    }

    /// Moves the phase one step forward.
    ///
    /// This is the bare state-machine step. It knows nothing about who
    /// may start a round, deadlines, or outcomes, so outside this crate
    /// phases only move through [`start`](Self::start) and
    /// [`finish`](Self::finish).
    ///
    /// # Errors
    /// [`RoomError::InvalidTransition`] for anything but the next phase.
    /// The room is left unchanged.
    pub(crate) fn transition_phase(&mut self, target: Phase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(target) {
            return Err(RoomError::InvalidTransition {
                from: self.phase,
                to: target,
            });
        }
        self.phase = target;
        Ok(())
    }

    /// Starts the round on behalf of `role`.
    ///
    /// Only SECOND may start, and only once both seats are filled. The
    /// client only ever shows the start button to whoever arrived second,
    /// and the server holds it to that.
    ///
    /// # Errors
    /// - [`RoomError::InvalidTransition`] if the room isn't waiting.
    /// - [`RoomError::NotPermitted`] if the room isn't full or `role` is
    ///   FIRST.
    pub fn start(&mut self, role: Role, now: Instant) -> Result<(), RoomError> {
        if self.phase != Phase::Waiting {
            return Err(RoomError::InvalidTransition {
                from: self.phase,
                to: Phase::Active,
            });
        }
        if !self.is_full() {
            return Err(RoomError::NotPermitted(
                "the room needs two players to start".into(),
            ));
        }
        if role != Role::Second {
            return Err(RoomError::NotPermitted(
                "only SECOND may start the round".into(),
            ));
        }

        self.transition_phase(Phase::Active)?;
        self.deadline = Some(deadline_after(now, self.round_duration));
        Ok(())
    }

    /// Ends the round with `outcome`.
    ///
    /// # Errors
    /// [`RoomError::InvalidTransition`] unless the round is active. In
    /// particular a second finish is always refused, so each room has
    /// exactly one outcome.
    pub fn finish(
        &mut self,
        outcome: Outcome,
        reason: EndReason,
    ) -> Result<(), RoomError> {
        self.transition_phase(Phase::Finished)?;
        self.outcome = Some((outcome, reason));
        Ok(())
    }

    /// Ends the round in favor of `role`, who reported solving the puzzle.
    pub fn puzzle_solved(&mut self, role: Role) -> Result<Outcome, RoomError> {
        let outcome = Outcome::Winner(role);
        self.finish(outcome, EndReason::PuzzleSolved)?;
        Ok(outcome)
    }

    /// Plays `ability` for `role`.
    ///
    /// `fireball` damages the opponent; `holylight` heals the caster, up
    /// to the starting health. Each player may act once per turn; when
    /// both have acted, the turn advances. A knockout finishes the round.
    ///
    /// # Errors
    /// - [`RoomError::RoundNotActive`] outside an active round.
    /// - [`RoomError::NotPermitted`] if `role` already acted this turn,
    ///   doesn't hold `ability`, or has no opponent.
    pub fn apply_action(
        &mut self,
        role: Role,
        ability: Ability,
    ) -> Result<ActionReport, RoomError> {
        if self.phase != Phase::Active {
            return Err(RoomError::RoundNotActive(self.phase));
        }

        let [first, second] = &mut self.players;
        let (caster, opponent) = match role {
            Role::First => (first.as_mut(), second.as_mut()),
            Role::Second => (second.as_mut(), first.as_mut()),
        };
        let (Some(caster), Some(opponent)) = (caster, opponent) else {
            return Err(RoomError::NotPermitted(
                "both seats must be occupied to cast".into(),
            ));
        };

        if caster.acted_this_turn {
            return Err(RoomError::NotPermitted(
                "already acted this turn".into(),
            ));
        }
        if !caster.hand.contains(&ability) {
            return Err(RoomError::NotPermitted(format!(
                "{ability} is not in hand"
            )));
        }

        match ability {
            Ability::Fireball => {
                opponent.health = opponent.health.saturating_sub(ABILITY_POWER);
            }
            Ability::Holylight => {
                caster.health = caster
                    .health
                    .saturating_add(ABILITY_POWER)
                    .min(self.starting_health);
            }
        }
        caster.acted_this_turn = true;

        let knocked_out = opponent.health == 0;
        if caster.acted_this_turn && opponent.acted_this_turn {
            caster.acted_this_turn = false;
            opponent.acted_this_turn = false;
            self.turn += 1;
        }

        let knockout = if knocked_out {
            let outcome = Outcome::Winner(role);
            self.finish(outcome, EndReason::Knockout)?;
            Some(outcome)
        } else {
            None
        };

        Ok(ActionReport {
            role,
            ability,
            health: self.health_report(),
            turn: self.turn,
            knockout,
        })
    }

    /// A read-only copy for callers outside the actor.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            phase: self.phase,
            players: self.occupants().cloned().collect(),
            turn: self.turn,
            deadline: self.deadline,
            outcome: self.outcome.map(|(o, _)| o),
            end_reason: self.outcome.map(|(_, r)| r),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
