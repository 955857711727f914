use crate::vector::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum per-axis offset of a new waypoint from the arrival point.
pub const WAYPOINT_SPAN: f64 = 20.0;

/// Epidemic status tag, without per-variant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Susceptible,
    Infected,
    Recovered,
}

/// Life stage of an agent together with the data only that stage carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Health {
    Susceptible,
    Infected { recovery_probability: f64 },
    Recovered,
}

impl From<&Health> for Status {
    fn from(health: &Health) -> Self {
        match health {
            Health::Susceptible => Status::Susceptible,
            Health::Infected { .. } => Status::Infected,
            Health::Recovered => Status::Recovered,
        }
    }
}

/// Agent of the simulation.
///
/// Movement state is shared by every life stage. Transitions never mutate an
/// agent in place: they build a new value with the same `id`, which the
/// population then writes into the agent's slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: usize,
    position: Vec2,
    target: Vec2,
    velocity: f64,
    step: Vec2,
    health: Health,
}

impl Agent {
    pub fn new(id: usize, position: Vec2, target: Vec2, velocity: f64, health: Health) -> Self {
        let mut agt = Self {
            id,
            position,
            target,
            velocity,
            step: Vec2::ZERO,
            health,
        };
        agt.step = agt.compute_step();
        agt
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[cfg(test)]
    pub fn step(&self) -> Vec2 {
        self.step
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn status(&self) -> Status {
        Status::from(&self.health)
    }

    /// Displacement covered in one tick towards the current target.
    pub fn compute_step(&self) -> Vec2 {
        if self.target == self.position {
            return Vec2::ZERO;
        }
        let direction = self.target - self.position;
        direction * (self.velocity / direction.r())
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        (self.position - other.position).r()
    }

    pub fn distance_to_target(&self) -> f64 {
        (self.target - self.position).r()
    }

    /// Move one tick, picking a new waypoint on arrival.
    ///
    /// Positions are clamped to the grid, so an agent heading out of bounds
    /// sticks to the wall until it re-targets.
    pub fn advance<R: Rng + ?Sized>(&mut self, grid_size: f64, rng: &mut R) {
        // Recovered agents are stationary and never re-target.
        if let Health::Recovered = self.health {
            return;
        }

        if self.distance_to_target() <= self.velocity {
            self.position = self.target;
            let offset = Vec2::new(
                rng.random_range(-WAYPOINT_SPAN..=WAYPOINT_SPAN),
                rng.random_range(-WAYPOINT_SPAN..=WAYPOINT_SPAN),
            );
            self.target = (self.position + offset).clamp(0.0, grid_size);
            self.step = self.compute_step();
        } else {
            self.position = (self.position + self.step).clamp(0.0, grid_size);
        }
    }

    /// Infected copy of a susceptible agent.
    pub fn expose(&self, recovery_probability: f64) -> Agent {
        assert_eq!(
            self.status(),
            Status::Susceptible,
            "agent {} exposed while not susceptible",
            self.id
        );
        Agent {
            health: Health::Infected {
                recovery_probability,
            },
            ..self.clone()
        }
    }

    /// Roll for recovery, returning the recovered agent on success.
    ///
    /// Agents that are not infected are returned unchanged and consume no
    /// random draw.
    pub fn attempt_recovery<R: Rng + ?Sized>(self, rng: &mut R) -> Agent {
        let Health::Infected {
            recovery_probability,
        } = self.health
        else {
            return self;
        };
        if rng.random::<f64>() < recovery_probability {
            Agent::new(self.id, self.position, self.position, 0.0, Health::Recovered)
        } else {
            self
        }
    }
}
