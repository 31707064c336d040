//! Where each round's image and answer come from.

use geoguess_geo::Coordinate;
use geoguess_protocol::RoomCode;
use serde::{Deserialize, Serialize};

/// The image shown for a round and the spot it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTarget {
    pub image_id: String,
    pub location: Coordinate,
}

impl RoundTarget {
    pub fn new(image_id: impl Into<String>, location: Coordinate) -> Self {
        Self {
            image_id: image_id.into(),
            location,
        }
    }
}

/// Picks the target for a new round.
///
/// Called from inside the room actor, so it must not block.
pub trait TargetSource: Send + Sync + 'static {
    fn next_target(&self, room: &RoomCode, round: u32) -> RoundTarget;
}

const LANDMARKS: &[(&str, f64, f64)] = &[
    ("eiffel-tower", 48.8584, 2.2945),
    ("statue-of-liberty", 40.6892, -74.0445),
    ("sydney-opera-house", -33.8568, 151.2153),
    ("machu-picchu", -13.1631, -72.5450),
    ("taj-mahal", 27.1751, 78.0421),
    ("christ-the-redeemer", -22.9519, -43.2105),
    ("mount-fuji", 35.3606, 138.7274),
    ("table-mountain", -33.9628, 18.4098),
    ("colosseum", 41.8902, 12.4922),
    ("golden-gate-bridge", 37.8199, -122.4783),
    ("petra", 30.3285, 35.4444),
    ("reykjavik-hallgrimskirkja", 64.1417, -21.9266),
];

/// A fixed catalogue walked in order, starting at an offset derived from
/// the room code so concurrent rooms don't all show the same first image.
#[derive(Debug, Clone)]
pub struct TargetList {
    targets: Vec<RoundTarget>,
}

impl TargetList {
    /// Returns `None` for an empty catalogue.
    pub fn new(targets: Vec<RoundTarget>) -> Option<Self> {
        if targets.is_empty() {
            return None;
        }
        Some(Self { targets })
    }

    /// A small catalogue of well-known places, for local play.
    pub fn landmarks() -> Self {
        Self {
            targets: LANDMARKS
                .iter()
                .map(|&(image_id, lat, lon)| {
                    RoundTarget::new(image_id, Coordinate { lat, lon })
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl TargetSource for TargetList {
    fn next_target(&self, room: &RoomCode, round: u32) -> RoundTarget {
        let offset: usize =
            room.as_str().bytes().map(usize::from).sum();
        let index =
            (offset + round.saturating_sub(1) as usize) % self.targets.len();
        self.targets[index].clone()
    }
}
