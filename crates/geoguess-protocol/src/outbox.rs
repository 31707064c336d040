//! The outbound half of the transport, as the engine sees it.

use crate::{RoomCode, ServerEvent, UserId};

/// Delivers server events to connected players.
///
/// Delivery is at most once: if the player is not connected the event is
/// dropped and nobody is told. Implementations must not block; room actors
/// call these from inside their serialized command loop.
pub trait Outbox: Send + Sync + 'static {
    /// Sends one event to one player.
    fn send_to_player(&self, user: &UserId, event: ServerEvent);

    /// Sends one event to every listed member of a room.
    ///
    /// The room actor owns the membership list, so it passes it in. The
    /// default fans out through [`send_to_player`](Self::send_to_player).
    fn broadcast_to_room(
        &self,
        room: &RoomCode,
        members: &[UserId],
        event: &ServerEvent,
    ) {
        tracing::trace!(%room, members = members.len(), "broadcast");
        for member in members {
            self.send_to_player(member, event.clone());
        }
    }
}
