//! Connection hub: maps players to the outbound queue of their connection.
//!
//! Room actors never see sockets. They hold the hub as an
//! [`Outbox`] and push events into per-connection queues; each connection
//! task drains its own queue onto the wire. Pushing never blocks, so a
//! slow client can't stall a room.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use geoguess_protocol::{Outbox, ServerEvent, UserId};
use tokio::sync::mpsc;

/// Identifies one registration, so a stale connection can't unregister
/// the one that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration(u64);

struct Route {
    registration: Registration,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

/// Live outbound queues by player.
#[derive(Default)]
pub struct ConnectionHub {
    routes: RwLock<HashMap<UserId, Route>>,
    next_registration: AtomicU64,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `user`'s events to a fresh queue and returns its receiving
    /// end. A previous route for the same user is replaced.
    pub fn register(
        &self,
        user: UserId,
    ) -> (Registration, mpsc::UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let registration =
            Registration(self.next_registration.fetch_add(1, Ordering::Relaxed));
        let replaced = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user.clone(),
                Route {
                    registration,
                    sender,
                },
            );
        if replaced.is_some() {
            tracing::debug!(%user, "outbound route replaced");
        }
        (registration, receiver)
    }

    /// Removes `user`'s route if it still belongs to `registration`.
    pub fn unregister(&self, user: &UserId, registration: Registration) {
        let mut routes =
            self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if routes
            .get(user)
            .is_some_and(|route| route.registration == registration)
        {
            routes.remove(user);
        }
    }

    pub fn is_connected(&self, user: &UserId) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user)
    }

    pub fn connected_count(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Outbox for ConnectionHub {
    fn send_to_player(&self, user: &UserId, event: ServerEvent) {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        match routes.get(user) {
            Some(route) => {
                if route.sender.send(event).is_err() {
                    tracing::trace!(%user, "outbound queue closed, event dropped");
                }
            }
            None => tracing::trace!(%user, "player offline, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguess_protocol::RoomCode;

    fn ack(n: u64) -> ServerEvent {
        ServerEvent::HeartbeatAck {
            client_time: n,
            server_time: n,
        }
    }

    #[test]
    fn test_send_reaches_registered_player() {
        let hub = ConnectionHub::new();
        let (_, mut rx) = hub.register("alice".into());
        hub.send_to_player(&"alice".into(), ack(1));
        assert_eq!(rx.try_recv().unwrap(), ack(1));
    }

    #[test]
    fn test_send_to_offline_player_is_dropped() {
        let hub = ConnectionHub::new();
        hub.send_to_player(&"nobody".into(), ack(1));
        assert_eq!(hub.connected_count(), 0);
    }

    #[test]
    fn test_broadcast_preserves_order_per_player() {
        let hub = ConnectionHub::new();
        let (_, mut a) = hub.register("a".into());
        let (_, mut b) = hub.register("b".into());
        let room = RoomCode::parse("ABC123").unwrap();
        let members = vec![UserId::from("a"), UserId::from("b")];

        hub.broadcast_to_room(&room, &members, &ack(1));
        hub.broadcast_to_room(&room, &members, &ack(2));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap(), ack(1));
            assert_eq!(rx.try_recv().unwrap(), ack(2));
        }
    }

    #[test]
    fn test_stale_unregister_keeps_newer_route() {
        let hub = ConnectionHub::new();
        let (old, _old_rx) = hub.register("a".into());
        let (new, mut new_rx) = hub.register("a".into());
        assert_ne!(old, new);

        hub.unregister(&"a".into(), old);
        assert!(hub.is_connected(&"a".into()));
        hub.send_to_player(&"a".into(), ack(7));
        assert_eq!(new_rx.try_recv().unwrap(), ack(7));

        hub.unregister(&"a".into(), new);
        assert!(!hub.is_connected(&"a".into()));
    }
}
