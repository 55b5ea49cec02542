//! Planar geometry used by the forwarding and location layers
//!
//! Positions are metres in a flat 2-D plane. Nodes report their own
//! position and velocity through [`PositionSource`](crate::PositionSource);
//! everything else in the stack is derived from exchanged samples.

use std::f64::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in the plane, in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Sentinel returned when a position is unknown
    pub const INVALID: Position = Position { x: -1.0, y: -1.0 };

    /// Origin of the plane
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether this is a real position rather than the sentinel
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Bearing of `other` seen from this point, radians in `[0, 2π)`
    ///
    /// Returns `None` when both points coincide.
    pub fn bearing_to(&self, other: &Position) -> Option<f64> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(dy.atan2(dx).rem_euclid(TAU))
    }

    /// Move `meters` along `heading` (radians, counterclockwise from +x)
    pub fn advance(&self, heading: f64, meters: f64) -> Position {
        Position {
            x: self.x + meters * heading.cos(),
            y: self.y + meters * heading.sin(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Velocity vector in metres per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { vx: 0.0, vy: 0.0 };

    pub const fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// Scalar speed (magnitude)
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Direction of travel, or `None` when standing still
    pub fn heading(&self) -> Option<f64> {
        Position::ORIGIN.bearing_to(&Position::new(self.vx, self.vy))
    }
}

/// Counterclockwise angle from bearing `from` to bearing `to`, in `[0, 2π)`
pub fn ccw_angle(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(TAU)
}
