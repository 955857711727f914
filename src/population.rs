use crate::agent::{Agent, Health, Status};
use crate::config::ModelConfig;
use crate::vector::Vec2;
use anyhow::{Result, bail};
use rand::{Rng, seq::index};
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Speed range of freshly generated agents.
const VELOCITY_RANGE: (f64, f64) = (1.0, 2.0);

/// Number of agents in each status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }
}

/// Read-only view of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub status: Status,
}

/// Fixed-size collection of agents, where slot `i` always holds agent `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    agt_vec: Vec<Agent>,
}

impl Population {
    /// Scatter `agents_number` agents uniformly over the grid.
    ///
    /// A random subset of `initial_infected` agents starts infected.
    pub fn generate<R: Rng + ?Sized>(model: &ModelConfig, rng: &mut R) -> Result<Self> {
        let n_agt = model.agents_number;

        let mut infected = vec![false; n_agt];
        for i_agt in index::sample(rng, n_agt, model.initial_infected()) {
            infected[i_agt] = true;
        }

        let pos_dist = Uniform::new(0.0, model.grid_size)?;
        let vel_dist = Uniform::new(VELOCITY_RANGE.0, VELOCITY_RANGE.1)?;

        let mut agt_vec = Vec::with_capacity(n_agt);
        for (id, &is_infected) in infected.iter().enumerate() {
            let position = Vec2::new(pos_dist.sample(rng), pos_dist.sample(rng));
            let target = Vec2::new(pos_dist.sample(rng), pos_dist.sample(rng));
            let velocity = vel_dist.sample(rng);
            let health = if is_infected {
                Health::Infected {
                    recovery_probability: model.recovery_probability,
                }
            } else {
                Health::Susceptible
            };
            agt_vec.push(Agent::new(id, position, target, velocity, health));
        }

        Self::from_agents(agt_vec, model.grid_size)
    }

    /// Build a population from explicit agents.
    ///
    /// # Errors
    /// Fails if agent ids do not match their indices, if any agent lies
    /// outside the grid, or if a speed or recovery probability is invalid.
    pub fn from_agents(agt_vec: Vec<Agent>, grid_size: f64) -> Result<Self> {
        if agt_vec.is_empty() {
            bail!("population must have at least one agent");
        }
        for (i_agt, agt) in agt_vec.iter().enumerate() {
            if agt.id() != i_agt {
                bail!("agent at index {i_agt} has id {}", agt.id());
            }
            let p = agt.position();
            if !(0.0..=grid_size).contains(&p.x) || !(0.0..=grid_size).contains(&p.y) {
                bail!("agent {i_agt} at {p:?} is outside the grid");
            }
            let velocity = agt.velocity();
            if !(0.0..=f64::MAX).contains(&velocity) {
                bail!("agent {i_agt} has invalid velocity {velocity}");
            }
            if let Health::Infected {
                recovery_probability,
            } = agt.health()
            {
                if !(0.0..=1.0).contains(&recovery_probability) {
                    bail!("agent {i_agt} has invalid recovery probability {recovery_probability}");
                }
            }
        }
        Ok(Self { agt_vec })
    }

    pub fn len(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn get(&self, id: usize) -> &Agent {
        &self.agt_vec[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Agent {
        &mut self.agt_vec[id]
    }

    /// Overwrite the slot of `agt.id()`.
    pub fn replace(&mut self, agt: Agent) {
        let id = agt.id();
        self.agt_vec[id] = agt;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agt_vec.iter()
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for agt in &self.agt_vec {
            match agt.status() {
                Status::Susceptible => counts.susceptible += 1,
                Status::Infected => counts.infected += 1,
                Status::Recovered => counts.recovered += 1,
            }
        }
        assert_eq!(counts.total(), self.len(), "status counts must cover every agent");
        counts
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.agt_vec
            .iter()
            .map(|agt| AgentSnapshot {
                id: agt.id(),
                x: agt.position().x,
                y: agt.position().y,
                status: agt.status(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn generate_layout() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let model = ModelConfig {
            agents_number: 200,
            initial_infection_rate: 0.1,
            grid_size: 50.0,
            ..ModelConfig::default()
        };
        let pop = Population::generate(&model, &mut rng).unwrap();

        assert_eq!(pop.len(), 200);
        let counts = pop.counts();
        assert_eq!(counts.infected, 20);
        assert_eq!(counts.susceptible, 180);
        assert_eq!(counts.recovered, 0);

        for (i_agt, agt) in pop.iter().enumerate() {
            assert_eq!(agt.id(), i_agt);
            let p = agt.position();
            assert!((0.0..50.0).contains(&p.x) && (0.0..50.0).contains(&p.y));
            assert!((1.0..2.0).contains(&agt.velocity()));
            if let Health::Infected {
                recovery_probability,
            } = agt.health()
            {
                assert_eq!(recovery_probability, model.recovery_probability);
            }
        }
    }

    #[test]
    fn generate_is_reproducible() {
        let model = ModelConfig::default();
        let a = Population::generate(&model, &mut ChaCha12Rng::seed_from_u64(3)).unwrap();
        let b = Population::generate(&model, &mut ChaCha12Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn replace_overwrites_slot_by_id() {
        let p = Vec2::new(1.0, 1.0);
        let agt_vec = (0..3)
            .map(|id| Agent::new(id, p, p, 1.0, Health::Susceptible))
            .collect();
        let mut pop = Population::from_agents(agt_vec, 10.0).unwrap();

        let infected = pop.get(1).expose(0.5);
        pop.replace(infected);

        assert_eq!(pop.get(1).status(), Status::Infected);
        assert_eq!(pop.get(0).status(), Status::Susceptible);
        assert_eq!(pop.len(), 3);

        let snap = pop.snapshot();
        assert_eq!(snap[1].id, 1);
        assert_eq!(snap[1].status, Status::Infected);
        assert_eq!((snap[1].x, snap[1].y), (1.0, 1.0));
    }

    #[test]
    fn from_agents_rejects_bad_layouts() {
        let p = Vec2::new(1.0, 1.0);
        let misnumbered = vec![Agent::new(1, p, p, 1.0, Health::Susceptible)];
        assert!(Population::from_agents(misnumbered, 10.0).is_err());

        let q = Vec2::new(11.0, 1.0);
        let outside = vec![Agent::new(0, q, q, 1.0, Health::Susceptible)];
        assert!(Population::from_agents(outside, 10.0).is_err());

        assert!(Population::from_agents(Vec::new(), 10.0).is_err());

        let backwards = vec![Agent::new(0, p, p, -1.0, Health::Susceptible)];
        assert!(Population::from_agents(backwards, 10.0).is_err());

        let unsure = Health::Infected {
            recovery_probability: 1.5,
        };
        let bad_prob = vec![Agent::new(0, p, p, 1.0, unsure)];
        assert!(Population::from_agents(bad_prob, 10.0).is_err());
    }
}
