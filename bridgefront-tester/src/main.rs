mod logic;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bridgefront_game::{Catalog, GameConfig};
use logic::{DEFAULT_MAX_COMMANDS, GameplayStrategy, LogicTester, ScenarioPlan, resolve_seed_inputs};

#[derive(Debug, Parser)]
#[command(name = "bridgefront-tester", version = "0.1.0")]
#[command(about = "Automated playthrough and determinism QA for the Bridgefront rules engine")]
struct Args {
    /// Strategies to run (comma-separated, or "all")
    #[arg(long, default_value = "passive")]
    strategies: String,

    /// List all available strategies and exit
    #[arg(long)]
    list_strategies: bool,

    /// Players seated in each game
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Seeds to run (comma-separated; supports 0x hex and a..b ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Games played per seed, each on the next consecutive seed
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Accepted commands per game before it counts as stuck
    #[arg(long, default_value_t = DEFAULT_MAX_COMMANDS)]
    max_commands: usize,

    /// Optional JSON game config overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_strategies(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let strategies = expand_strategies(&args.strategies)?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let config = load_config(args.config.as_ref())?;
    let tester = LogicTester::new(Arc::new(Catalog::load_from_static()), config, args.verbose);

    let mut all_results = Vec::new();
    for strategy in strategies {
        let plan = ScenarioPlan {
            strategy,
            players: args.players,
            max_commands: args.max_commands,
        };
        log::info!("running {} over {} seeds", plan.name(), seeds.len());
        all_results.extend(tester.run_scenario(plan, &seeds, args.iterations));
    }

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_strategies(args: &Args) -> Result<bool> {
    if !args.list_strategies {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available strategies:")?;
    for strategy in GameplayStrategy::ALL {
        writeln!(
            output_target.writer(),
            "  {:10} - {}",
            strategy.label(),
            strategy.description()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 Bridgefront Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn expand_strategies(arg: &str) -> Result<Vec<GameplayStrategy>> {
    let mut strategies = Vec::new();
    for token in split_csv(arg) {
        if token.eq_ignore_ascii_case("all") {
            strategies.extend(GameplayStrategy::ALL);
            continue;
        }
        match GameplayStrategy::from_label(&token) {
            Some(strategy) => strategies.push(strategy),
            None => bail!("Unknown strategy: {token}"),
        }
    }
    strategies.dedup();
    if strategies.is_empty() {
        strategies.push(GameplayStrategy::Passive);
    }
    Ok(strategies)
}

fn load_config(path: Option<&PathBuf>) -> Result<Arc<GameConfig>> {
    let Some(path) = path else {
        return Ok(Arc::new(GameConfig::default()));
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = GameConfig::from_json(&raw)
        .with_context(|| format!("invalid game config in {}", path.display()))?;
    Ok(Arc::new(config))
}

fn write_reports(args: &Args, results: &[logic::ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Bridgefront Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::ScenarioResult;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            strategies: "passive".to_string(),
            list_strategies: false,
            players: 2,
            seeds: "1337".to_string(),
            iterations: 1,
            max_commands: DEFAULT_MAX_COMMANDS,
            config: None,
            report: "json".to_string(),
            verbose: false,
            output: None,
        }
    }

    fn sample_result() -> ScenarioResult {
        ScenarioResult {
            scenario_name: "passive x2".to_string(),
            seed: 1337,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(3),
            performance_data: vec![Duration::from_millis(3)],
        }
    }

    #[test]
    fn args_parse_defaults() {
        let args = Args::parse_from(["bridgefront-tester"]);
        assert_eq!(args.strategies, "passive");
        assert_eq!(args.players, 2);
        assert_eq!(args.max_commands, DEFAULT_MAX_COMMANDS);
        assert_eq!(args.report, "console");
        assert!(args.output.is_none());
    }

    #[test]
    fn expand_strategies_handles_all_and_unknown() {
        assert_eq!(expand_strategies("all").unwrap(), GameplayStrategy::ALL.to_vec());
        assert_eq!(
            expand_strategies("greedy, random").unwrap(),
            vec![GameplayStrategy::Greedy, GameplayStrategy::Random]
        );
        assert_eq!(expand_strategies("").unwrap(), vec![GameplayStrategy::Passive]);
        assert!(expand_strategies("reckless").is_err());
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = std::env::temp_dir().join("bridgefront-test-report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result()], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("\"scenario_name\": \"passive x2\""));
    }

    #[test]
    fn write_reports_handles_empty_markdown() {
        let temp = std::env::temp_dir().join("bridgefront-report.md");
        let args = Args {
            output: Some(temp.clone()),
            report: "markdown".to_string(),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("_No scenarios executed._"));
    }

    #[test]
    fn maybe_list_strategies_writes_output() {
        let temp = std::env::temp_dir().join("bridgefront-strategies.txt");
        let args = Args {
            list_strategies: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_strategies(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available strategies:"));
        assert!(content.contains("greedy"));
    }

    #[test]
    fn load_config_rejects_invalid_files() {
        let temp = std::env::temp_dir().join("bridgefront-bad-config.json");
        std::fs::write(&temp, "{\"mana_cap\": 0}").unwrap();
        assert!(load_config(Some(&temp)).is_err());
        assert!(load_config(None).is_ok());
    }
}
