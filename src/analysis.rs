use crate::population::Counts;
use crate::simulation::History;
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Epidemic summary of a single run.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n_agents: usize,
    pub n_ticks: usize,
    pub peak_infected: usize,
    pub peak_tick: usize,
    pub final_counts: Counts,
    /// Tick at which the last infection cleared, if it did.
    pub duration: Option<usize>,
    /// Fraction of the population that was ever infected.
    pub attack_rate: f64,
}

impl Summary {
    pub fn from_history(history: &History) -> Result<Self> {
        if history.is_empty() {
            bail!("history is empty");
        }

        let (i_peak, &peak_infected) = history
            .infected
            .iter()
            .enumerate()
            .max_by(|(i_a, a), (i_b, b)| a.cmp(b).then(i_b.cmp(i_a)))
            .context("history has no infected counts")?;

        let i_last = history.len() - 1;
        let final_counts = history.counts(i_last);
        let n_agents = final_counts.total();

        let duration = history
            .infected
            .iter()
            .position(|&n_inf| n_inf == 0)
            .map(|idx| history.time[idx]);

        let ever_infected = final_counts.infected + final_counts.recovered;

        Ok(Self {
            n_agents,
            n_ticks: history.time[i_last],
            peak_infected,
            peak_tick: history.time[i_peak],
            final_counts,
            duration,
            attack_rate: ever_infected as f64 / n_agents as f64,
        })
    }
}

/// Cross-run statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub peak_infected_frac: AccumulatorReport,
    pub attack_rate: AccumulatorReport,
    pub duration: AccumulatorReport,
}

/// Collects run summaries and aggregates them.
pub struct Analyzer {
    peak_acc: Accumulator,
    attack_acc: Accumulator,
    duration_acc: Accumulator,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            peak_acc: Accumulator::new(),
            attack_acc: Accumulator::new(),
            duration_acc: Accumulator::new(),
        }
    }

    pub fn add_run(&mut self, history: &History) -> Result<Summary> {
        let summary = Summary::from_history(history).context("failed to summarize history")?;

        self.peak_acc
            .add(summary.peak_infected as f64 / summary.n_agents as f64);
        self.attack_acc.add(summary.attack_rate);
        // Runs still in progress have no duration yet.
        if let Some(duration) = summary.duration {
            self.duration_acc.add(duration as f64);
        }

        Ok(summary)
    }

    pub fn report(&self) -> Report {
        Report {
            peak_infected_frac: self.peak_acc.report(),
            attack_rate: self.attack_acc.report(),
            duration: self.duration_acc.report(),
        }
    }
}

/// Write any serializable result to a MessagePack file.
pub fn save_results<T: Serialize, P: AsRef<Path>>(results: &T, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, results).context("failed to serialize results")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(infected: &[usize], recovered: &[usize], n_agents: usize) -> History {
        History {
            time: (0..infected.len()).collect(),
            susceptible: infected
                .iter()
                .zip(recovered)
                .map(|(i, r)| n_agents - i - r)
                .collect(),
            infected: infected.to_vec(),
            recovered: recovered.to_vec(),
        }
    }

    #[test]
    fn summarize_finished_outbreak() {
        let hist = history(&[2, 5, 7, 7, 3, 0], &[0, 0, 1, 2, 7, 10], 20);
        let summary = Summary::from_history(&hist).unwrap();
        assert_eq!(summary.n_agents, 20);
        assert_eq!(summary.n_ticks, 5);
        assert_eq!(summary.peak_infected, 7);
        assert_eq!(summary.peak_tick, 2);
        assert_eq!(summary.duration, Some(5));
        assert_eq!(
            summary.final_counts,
            Counts {
                susceptible: 10,
                infected: 0,
                recovered: 10
            }
        );
        assert!((summary.attack_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn ongoing_outbreak_has_no_duration() {
        let hist = history(&[1, 2, 3], &[0, 0, 0], 10);
        let summary = Summary::from_history(&hist).unwrap();
        assert_eq!(summary.duration, None);
        assert!((summary.attack_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn aggregate_runs() {
        let mut analyzer = Analyzer::new();
        analyzer
            .add_run(&history(&[1, 4, 0], &[0, 1, 5], 10))
            .unwrap();
        analyzer
            .add_run(&history(&[1, 2, 2], &[0, 0, 1], 10))
            .unwrap();
        let report = analyzer.report();
        assert_eq!(report.attack_rate.n_vals, 2);
        assert!((report.peak_infected_frac.mean - 0.3).abs() < 1e-12);
        assert_eq!(report.duration.n_vals, 1);
        assert_eq!(report.duration.mean, 2.0);
    }

    #[test]
    fn empty_history_is_rejected() {
        assert!(Summary::from_history(&History::default()).is_err());
    }
}
