//! Mobility models
//!
//! Positions are a pure function of simulated time, so any node's position
//! can be computed on demand (radio range checks, the oracle).

use std::time::Duration;

use meridian_core::{Position, PositionSource, Velocity};
use serde::{Deserialize, Serialize};

/// How a node moves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mobility {
    /// Never moves
    Static { position: Position },

    /// Straight line at constant velocity from `origin` at time zero
    ConstantVelocity { origin: Position, velocity: Velocity },

    /// Constant velocity along x on a ring road of `length` metres
    Highway {
        origin: Position,
        speed: f64,
        length: f64,
    },
}

impl Mobility {
    pub fn fixed(x: f64, y: f64) -> Self {
        Self::Static {
            position: Position::new(x, y),
        }
    }

    pub fn moving(origin: Position, velocity: Velocity) -> Self {
        Self::ConstantVelocity { origin, velocity }
    }

    pub fn highway(origin: Position, speed: f64, length: f64) -> Self {
        Self::Highway {
            origin,
            speed,
            length,
        }
    }

    pub fn position_at(&self, now: Duration) -> Position {
        let t = now.as_secs_f64();
        match *self {
            Self::Static { position } => position,
            Self::ConstantVelocity { origin, velocity } => {
                Position::new(origin.x + velocity.vx * t, origin.y + velocity.vy * t)
            }
            Self::Highway {
                origin,
                speed,
                length,
            } => {
                let x = if length > 0.0 {
                    (origin.x + speed * t).rem_euclid(length)
                } else {
                    origin.x
                };
                Position::new(x, origin.y)
            }
        }
    }

    pub fn velocity(&self) -> Velocity {
        match *self {
            Self::Static { .. } => Velocity::ZERO,
            Self::ConstantVelocity { velocity, .. } => velocity,
            Self::Highway { speed, .. } => Velocity::new(speed, 0.0),
        }
    }

    /// Position and velocity frozen at `now`
    pub fn kinematics(&self, now: Duration) -> Kinematics {
        Kinematics {
            position: self.position_at(now),
            velocity: self.velocity(),
        }
    }
}

/// A node's kinematics at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Position,
    pub velocity: Velocity,
}

impl PositionSource for Kinematics {
    fn current_position(&self) -> Position {
        self.position
    }

    fn current_velocity(&self) -> Velocity {
        self.velocity
    }
}
