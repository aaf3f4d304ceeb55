use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bridgefront_game::{Catalog, GameConfig};

use crate::logic::policy::GameplayStrategy;
use crate::logic::simulation::{SimulationConfig, SimulationSession, SimulationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// What each scenario run is parameterized by.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioPlan {
    pub strategy: GameplayStrategy,
    pub players: usize,
    pub max_commands: usize,
}

impl ScenarioPlan {
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} x{}", self.strategy.label(), self.players)
    }
}

pub struct LogicTester {
    catalog: Arc<Catalog>,
    config: Arc<GameConfig>,
    verbose: bool,
}

impl LogicTester {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: Arc<GameConfig>, verbose: bool) -> Self {
        Self {
            catalog,
            config,
            verbose,
        }
    }

    pub fn run_scenario(&self, plan: ScenarioPlan, seeds: &[u64], iterations: usize) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {})",
                    plan.name().bright_white(),
                    seed
                );
            }

            results.push(self.run_single_scenario(plan, seed, iterations));
        }

        results
    }

    fn run_single_scenario(&self, plan: ScenarioPlan, seed: u64, iterations: usize) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.run_iteration(plan, iteration_seed) {
                Ok(summary) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);

                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) rounds:{} commands:{} rejected:{} events:{} winner:{} scores:{}",
                            i + 1,
                            iterations,
                            summary.rounds,
                            summary.commands,
                            summary.rejected,
                            summary.events,
                            summary.winner.as_ref().map_or("-", |w| w.as_str()),
                            format_scores(&summary)
                        );
                    }
                }
                Err(err) => {
                    if self.verbose {
                        println!("  ❌ Iteration {}/{} failed: {}", i + 1, iterations, err.clone().red());
                    }
                    failures.push(format!(
                        "Iteration {} (strategy {}, players {}, seed {}): {err}",
                        i + 1,
                        plan.strategy.label(),
                        plan.players,
                        iteration_seed
                    ));
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>() / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: plan.name(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    /// Play the game twice and hold both runs to the same digest.
    fn run_iteration(&self, plan: ScenarioPlan, seed: u64) -> Result<SimulationSummary, String> {
        let config =
            SimulationConfig::new(plan.strategy, plan.players, seed).with_max_commands(plan.max_commands);
        let first = self.simulate(config)?;
        let second = self.simulate(config)?;

        if first.digest != second.digest {
            return Err(format!(
                "non-deterministic: digests {:016x} and {:016x}",
                first.digest, second.digest
            ));
        }
        if !first.finished {
            return Err(format!("game stopped in round {} without finishing", first.rounds));
        }
        if first.winner.is_none() {
            return Err(String::from("finished without a winner"));
        }
        Ok(first)
    }

    fn simulate(&self, config: SimulationConfig) -> Result<SimulationSummary, String> {
        SimulationSession::new(config, Arc::clone(&self.catalog), Arc::clone(&self.config))
            .and_then(SimulationSession::run)
            .map_err(|err| err.to_string())
    }
}

/// `p0=4 p1=2` style score line.
fn format_scores(summary: &SimulationSummary) -> String {
    summary
        .scores
        .iter()
        .map(|(player, vp)| format!("{player}={vp}"))
        .collect::<Vec<_>>()
        .join(" ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
