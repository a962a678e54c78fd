//! The connection registry: every live connection and its seat.
//!
//! # Concurrency note
//!
//! Unlike a single-owner manager, the registry is hit from every
//! connection task at once (admission, lookups on each inbound message,
//! removal on disconnect). It is backed by a `DashMap`, which shards its
//! locks, so two connections never wait on each other unless they hash to
//! the same shard. Ids come from an `AtomicU64` and need no lock at all.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duelroom_protocol::{ConnectionId, Role, RoomId, Seat};

use crate::{ConnectionRecord, SessionError};

/// Tracks all live connections.
///
/// ## Lifecycle
///
/// ```text
/// admit() ──→ seat() ──→ get() ... get() ──→ remove()
///    │           │                              │
///    ▼           ▼                              ▼
/// [no seat]  [seated]                       [gone]
/// ```
///
/// Ids are never reused, even after `remove()`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its fresh id.
    ///
    /// # Errors
    /// Returns [`SessionError::DuplicateConnection`] if the generated id is
    /// somehow already present. The existing record is left untouched.
    pub fn admit(&self) -> Result<ConnectionId, SessionError> {
        // Relaxed is enough: we only need each fetch_add to return a
        // distinct value, not to order other memory around it.
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        match self.connections.entry(id) {
            Entry::Occupied(_) => {
                tracing::error!(connection_id = %id, "connection id collision");
                Err(SessionError::DuplicateConnection(id))
            }
            Entry::Vacant(slot) => {
                slot.insert(ConnectionRecord::new(id));
                tracing::debug!(connection_id = %id, "connection admitted");
                Ok(id)
            }
        }
    }

    /// Records the seat the allocator assigned to `id`.
    ///
    /// # Errors
    /// - [`SessionError::UnknownConnection`] if `id` isn't registered.
    /// - [`SessionError::AlreadySeated`] if it already has a seat.
    pub fn seat(
        &self,
        id: ConnectionId,
        room_id: RoomId,
        role: Role,
    ) -> Result<Seat, SessionError> {
        let mut record = self
            .connections
            .get_mut(&id)
            .ok_or(SessionError::UnknownConnection(id))?;

        if let Some(seat) = record.seat {
            return Err(SessionError::AlreadySeated { id, seat });
        }

        let seat = Seat { room_id, role };
        record.seat = Some(seat);
        tracing::info!(connection_id = %id, %room_id, %role, "connection seated");
        Ok(seat)
    }

    /// Returns a copy of the record for `id`, if it's still live.
    ///
    /// A copy rather than a reference: holding a `DashMap` guard across
    /// an `.await` would block the whole shard.
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionRecord> {
        self.connections.get(&id).map(|r| r.value().clone())
    }

    /// Shorthand for `get(id)` followed by reading its seat.
    pub fn seat_of(&self, id: ConnectionId) -> Option<Seat> {
        self.connections.get(&id).and_then(|r| r.seat)
    }

    /// Removes and returns the record for `id`.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownConnection`] if it was already gone.
    pub fn remove(
        &self,
        id: ConnectionId,
    ) -> Result<ConnectionRecord, SessionError> {
        let (_, record) = self
            .connections
            .remove(&id)
            .ok_or(SessionError::UnknownConnection(id))?;
        tracing::debug!(
            connection_id = %id,
            age_ms = u64::try_from(record.age().as_millis()).unwrap_or(u64::MAX),
            "connection removed"
        );
        Ok(record)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    // =====================================================================
    // admit()
    // =====================================================================

    #[test]
    fn test_admit_returns_distinct_ids() {
        let registry = ConnectionRegistry::new();
        let a = registry.admit().unwrap();
        let b = registry.admit().unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_admit_new_connection_has_no_seat() {
        let registry = ConnectionRegistry::new();
        let id = registry.admit().unwrap();
        let record = registry.get(id).unwrap();
        assert_eq!(record.connection_id, id);
        assert!(record.seat.is_none());
    }

    #[test]
    fn test_admit_never_reuses_removed_id() {
        let registry = ConnectionRegistry::new();
        let first = registry.admit().unwrap();
        registry.remove(first).unwrap();
        let second = registry.admit().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_admit_concurrent_ids_are_unique() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.admit().unwrap() }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()), "duplicate id");
        }
        assert_eq!(registry.len(), 64);
    }

    // =====================================================================
    // seat()
    // =====================================================================

    #[test]
    fn test_seat_records_room_and_role() {
        let registry = ConnectionRegistry::new();
        let id = registry.admit().unwrap();

        let seat = registry.seat(id, RoomId(3), Role::Second).unwrap();

        assert_eq!(seat.room_id, RoomId(3));
        assert_eq!(seat.role, Role::Second);
        assert_eq!(registry.seat_of(id), Some(seat));
    }

    #[test]
    fn test_seat_twice_returns_already_seated() {
        let registry = ConnectionRegistry::new();
        let id = registry.admit().unwrap();
        registry.seat(id, RoomId(1), Role::First).unwrap();

        let result = registry.seat(id, RoomId(2), Role::Second);

        assert!(matches!(
            result,
            Err(SessionError::AlreadySeated { seat, .. }) if seat.room_id == RoomId(1)
        ));
        // The original seat is untouched.
        assert_eq!(registry.seat_of(id).unwrap().room_id, RoomId(1));
    }

    #[test]
    fn test_seat_unknown_connection_returns_error() {
        let registry = ConnectionRegistry::new();
        let result = registry.seat(ConnectionId(99), RoomId(1), Role::First);
        assert!(matches!(result, Err(SessionError::UnknownConnection(_))));
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_returns_record_and_forgets_it() {
        let registry = ConnectionRegistry::new();
        let id = registry.admit().unwrap();
        registry.seat(id, RoomId(1), Role::First).unwrap();

        let record = registry.remove(id).unwrap();

        assert_eq!(record.seat.unwrap().role, Role::First);
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice_returns_unknown_connection() {
        let registry = ConnectionRegistry::new();
        let id = registry.admit().unwrap();
        registry.remove(id).unwrap();
        assert!(matches!(
            registry.remove(id),
            Err(SessionError::UnknownConnection(gone)) if gone == id
        ));
    }
}
