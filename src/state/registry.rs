use super::room::Room;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock, RwLockWriteGuard};

/// Characters for room codes (excludes ambiguous 0/O, 1/I/L)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 4;

/// Generate a random room code (4 characters)
pub fn generate_room_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

pub(crate) type RoomMap = HashMap<RoomCode, Room>;

/// All live rooms, keyed by code
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<RoomMap>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room in the lobby with `host` as its only player. Returns the
    /// code and a receiver for the room's events.
    pub async fn create_room(&self, host: Player) -> (RoomCode, broadcast::Receiver<ServerMessage>) {
        let mut rooms = self.rooms.write().await;

        // Generate a unique code (check for collisions)
        let code = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        tracing::info!("Room {} created by {}", code, host.id);
        let room = Room::new(code.clone(), host);
        let events = room.subscribe();
        room.broadcast_state();
        rooms.insert(code.clone(), room);

        (code, events)
    }

    pub async fn get_room(&self, code: &str) -> Option<RoomSnapshot> {
        self.rooms.read().await.get(code).map(Room::snapshot)
    }

    /// Cancel the room's pending tasks, then drop it
    pub async fn remove_room(&self, code: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        evict(&mut rooms, code)
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.rooms.read().await.contains_key(code)
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Read-only access to a room
    pub async fn inspect<R>(&self, code: &str, f: impl FnOnce(&Room) -> R) -> Option<R> {
        self.rooms.read().await.get(code).map(f)
    }

    /// Exclusive access to every room. Mutations and their broadcasts happen
    /// while this guard is held.
    pub(crate) async fn lock(&self) -> RwLockWriteGuard<'_, RoomMap> {
        self.rooms.write().await
    }
}

/// Remove a room from an already-locked map
pub(crate) fn evict(rooms: &mut RoomMap, code: &str) -> bool {
    match rooms.get_mut(code) {
        Some(room) => {
            room.cancel_tasks();
            rooms.remove(code);
            tracing::info!("Room {} removed", code);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn host(id: &str) -> Player {
        Player {
            id: id.to_string(),
            nickname: format!("nick-{}", id),
        }
    }

    #[test]
    fn test_room_code_format() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let registry = RoomRegistry::new();
        let (code, mut events) = registry.create_room(host("h")).await;

        let snapshot = registry.get_room(&code).await.unwrap();
        assert_eq!(snapshot.host_id, "h");
        assert_eq!(snapshot.phase, GamePhase::Waiting);
        assert_eq!(registry.len().await, 1);

        assert!(matches!(
            events.try_recv(),
            Ok(ServerMessage::RoomState(_))
        ));
    }

    #[tokio::test]
    async fn test_codes_are_unique() {
        let registry = RoomRegistry::new();
        let mut codes = std::collections::HashSet::new();
        for i in 0..50 {
            let (code, _) = registry.create_room(host(&i.to_string())).await;
            assert!(codes.insert(code));
        }
        assert_eq!(registry.len().await, 50);
    }

    #[tokio::test]
    async fn test_missing_room() {
        let registry = RoomRegistry::new();
        assert!(registry.get_room("ZZZZ").await.is_none());
        assert!(!registry.remove_room("ZZZZ").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_room_cancels_tasks() {
        let registry = RoomRegistry::new();
        let (code, _) = registry.create_room(host("h")).await;

        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        {
            let mut rooms = registry.lock().await;
            let flag = fired.clone();
            rooms.get_mut(&code).unwrap().draw_timer.arm(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            }));
        }

        assert!(registry.remove_room(&code).await);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!registry.contains(&code).await);
    }
}
