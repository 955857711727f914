use crate::agent::Status;
use crate::config::ModelConfig;
use crate::population::{AgentSnapshot, Counts, Population};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Aggregate counts of every recorded tick, starting at tick 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct History {
    pub time: Vec<usize>,
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub recovered: Vec<usize>,
}

impl History {
    fn push(&mut self, tick: usize, counts: Counts) {
        self.time.push(tick);
        self.susceptible.push(counts.susceptible);
        self.infected.push(counts.infected);
        self.recovered.push(counts.recovered);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn counts(&self, idx: usize) -> Counts {
        Counts {
            susceptible: self.susceptible[idx],
            infected: self.infected[idx],
            recovered: self.recovered[idx],
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub counts: Counts,
    pub is_complete: bool,
}

/// Population snapshot written to trajectory files.
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    pub tick: usize,
    pub agents: Vec<AgentSnapshot>,
}

/// Epidemic simulation.
///
/// Holds the model parameters, the population, the recorded history, and the
/// random number generator every draw goes through.
#[derive(Serialize, Deserialize)]
pub struct Simulation {
    model: ModelConfig,
    population: Population,
    tick: usize,
    history: History,
    rng: ChaCha12Rng,
}

impl Simulation {
    /// Create a new `Simulation` with a randomly generated population.
    pub fn new(model: ModelConfig, mut rng: ChaCha12Rng) -> Result<Self> {
        model.validate().context("failed to validate model config")?;
        let population = Population::generate(&model, &mut rng)
            .context("failed to generate population")?;
        Self::with_population(model, population, rng)
    }

    /// Create a new `Simulation` starting from the given population.
    pub fn with_population(
        model: ModelConfig,
        population: Population,
        rng: ChaCha12Rng,
    ) -> Result<Self> {
        model.validate().context("failed to validate model config")?;
        if population.len() != model.agents_number {
            bail!(
                "population has {} agents, but agents_number is {}",
                population.len(),
                model.agents_number
            );
        }
        if population.iter().any(|agt| agt.status() == Status::Recovered) {
            bail!("population must not start with recovered agents");
        }

        let mut history = History::default();
        history.push(0, population.counts());

        Ok(Self {
            model,
            population,
            tick: 0,
            history,
            rng,
        })
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn current_tick(&self) -> usize {
        self.tick
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn counts(&self) -> Counts {
        self.history.counts(self.history.len() - 1)
    }

    /// No infected agent remains, so nothing can change anymore.
    pub fn is_complete(&self) -> bool {
        self.counts().infected == 0
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        self.population.snapshot()
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;

        // Move every agent towards its waypoint.
        self.move_agents();

        // Expose susceptible agents in range of infected ones.
        self.resolve_infections();

        // Roll for recovery of infected agents.
        self.resolve_recoveries();

        // Count agents by status and record them.
        let counts = self.population.counts();
        self.history.push(self.tick, counts);
        log::debug!("tick {}: {counts:?}", self.tick);

        TickReport {
            counts,
            is_complete: counts.infected == 0,
        }
    }

    /// Run up to `n_ticks` ticks, stopping early once complete, and write a
    /// frame to `file` at tick 0, at every multiple of `ticks_per_save` and at
    /// the last tick performed.
    ///
    /// Returns the number of ticks performed.
    pub fn run<P: AsRef<Path>>(
        &mut self,
        n_ticks: usize,
        ticks_per_save: usize,
        file: P,
    ) -> Result<usize> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        if self.tick == 0 {
            self.write_frame(&mut writer)?;
        }

        let mut i_tick = 0;
        while i_tick < n_ticks && !self.is_complete() {
            let report = self.tick();
            i_tick += 1;

            if self.tick % ticks_per_save == 0 || i_tick == n_ticks || report.is_complete {
                self.write_frame(&mut writer)?;

                let progress = 100.0 * i_tick as f64 / n_ticks as f64;
                log::info!("completed {progress:06.2}% {:?}", report.counts);
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        if self.is_complete() {
            log::info!("outbreak ended at tick {}", self.tick);
        }

        Ok(i_tick)
    }

    /// Save a checkpoint of the entire simulation state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize simulation")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved simulation checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let sim = decode::from_read(&mut reader).context("failed to deserialize simulation")?;
        Ok(sim)
    }

    fn write_frame<W: Write>(&self, writer: &mut W) -> Result<()> {
        let frame = Frame {
            tick: self.tick,
            agents: self.snapshot(),
        };
        encode::write(writer, &frame).context("failed to serialize frame")?;
        Ok(())
    }

    fn move_agents(&mut self) {
        let grid_size = self.model.grid_size;
        for id in 0..self.population.len() {
            self.population
                .get_mut(id)
                .advance(grid_size, &mut self.rng);
        }
    }

    fn resolve_infections(&mut self) {
        // Agents infected during this pass only become sources next tick.
        let i_agt_src: Vec<usize> = self
            .population
            .iter()
            .filter(|agt| agt.status() == Status::Infected)
            .map(|agt| agt.id())
            .collect();

        let radius = self.model.infection_radius;
        let prob = self.model.infection_probability;

        for i_src in i_agt_src {
            for i_oth in 0..self.population.len() {
                if i_oth == i_src {
                    continue;
                }
                let src = self.population.get(i_src);
                let oth = self.population.get(i_oth);
                if oth.status() != Status::Susceptible || src.distance_to(oth) >= radius {
                    continue;
                }
                if self.rng.random::<f64>() < prob {
                    let new_agt = oth.expose(self.model.recovery_probability);
                    self.population.replace(new_agt);
                }
            }
        }
    }

    fn resolve_recoveries(&mut self) {
        for id in 0..self.population.len() {
            if self.population.get(id).status() != Status::Infected {
                continue;
            }
            let agt = self.population.get(id).clone();
            self.population.replace(agt.attempt_recovery(&mut self.rng));
        }
    }
}
