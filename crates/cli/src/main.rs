use clap::{Args, Parser, Subcommand};
use lights_config::{BoardDescriptor, ScenarioAssertion, ScenarioScript};
use lights_core::metrics::MirrorMetrics;
use lights_core::{RunLimits, RunOutcome, Simulation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

/// Every iteration is recorded, so keep runs bounded.
const MAX_ALLOWED_ITERATIONS: u64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lights Simulator: switch-to-LED mirror on a simulated soft-core board", long_about = None)]
struct Cli {
    /// Enable per-iteration tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the mirror loop against a sequence of switch positions
    Run(RunArgs),
    /// Run a scenario script and check its assertions
    Test(TestArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the board descriptor (YAML); defaults to the DE10-Lite layout
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Switch positions to apply, one per iteration (hex, binary or decimal)
    #[arg(short, long = "switches", value_parser = parse_port_value, num_args = 1..)]
    switches: Vec<u32>,

    /// Maximum number of loop iterations (default: one per switch position)
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Run the loop on its own thread instead of stepping it
    #[arg(long, conflicts_with = "max_iterations")]
    live: bool,
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Path to the scenario script (YAML)
    #[arg(short, long)]
    script: PathBuf,

    /// Directory for result.json
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not echo the simulated console to stdout
    #[arg(long)]
    no_console_stdout: bool,
}

fn parse_port_value(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        (bin, 2)
    } else {
        (s, 10)
    };
    u32::from_str_radix(&digits.replace('_', ""), radix)
        .map_err(|e| format!("invalid port value '{}': {}", s, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting Lights Simulator");

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Test(args) => test(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn load_board(path: Option<&Path>) -> anyhow::Result<BoardDescriptor> {
    match path {
        Some(p) => {
            info!("Loading board descriptor: {:?}", p);
            BoardDescriptor::from_file(p)
        }
        None => {
            info!("Using default hardware configuration");
            Ok(BoardDescriptor::de10_lite())
        }
    }
}

fn run(args: RunArgs) -> anyhow::Result<u8> {
    let board = load_board(args.board.as_deref())?;
    let mut sim = Simulation::from_board(&board)?;
    sim.boot()?;

    let switches = if args.switches.is_empty() {
        vec![0]
    } else {
        args.switches
    };

    if args.live {
        let live = sim.spawn_live();
        let mask = live.switch_mask()? & live.led_mask()?;
        for &v in &switches {
            live.set_switches(v)?;
            if live.wait_for_leds(v & mask, Duration::from_secs(1))? {
                info!("switches={:#04x} -> leds={:#04x}", v, live.leds()?);
            } else {
                warn!("LEDs did not follow switches={:#04x}", v);
                return Ok(EXIT_ASSERT_FAIL);
            }
        }
        return Ok(EXIT_PASS);
    }

    let max_iterations = args.max_iterations.unwrap_or(switches.len() as u64);
    if max_iterations > MAX_ALLOWED_ITERATIONS {
        anyhow::bail!(
            "max_iterations {} exceeds the limit of {}",
            max_iterations,
            MAX_ALLOWED_ITERATIONS
        );
    }

    let metrics = Arc::new(MirrorMetrics::new());
    sim.add_observer(metrics.clone());

    info!("Running for {} iterations...", max_iterations);
    let limits = RunLimits {
        max_iterations,
        wall_time: None,
    };
    let outcome = sim.run(&limits, |n| {
        let idx = (n as usize).min(switches.len() - 1);
        switches[idx]
    });

    for r in &outcome.records {
        info!(
            "[{}] switches={:#04x} -> leds={:#04x}",
            r.iteration, r.switches, r.leds
        );
    }

    Ok(if outcome.mirror_holds() {
        EXIT_PASS
    } else {
        EXIT_ASSERT_FAIL
    })
}

#[derive(Debug, Serialize)]
struct AssertionResult {
    assertion: String,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct ResultConfig {
    script: String,
    board: String,
}

#[derive(Debug, Serialize)]
struct TestResult {
    status: &'static str,
    stop_reason: lights_core::StopReason,
    iterations: u64,
    mirror_holds: bool,
    final_leds: Option<u32>,
    console: String,
    assertions: Vec<AssertionResult>,
    config: ResultConfig,
}

fn check(assertion: &ScenarioAssertion, outcome: &RunOutcome, console: &str) -> AssertionResult {
    let (desc, passed) = match assertion {
        ScenarioAssertion::ConsoleContains(a) => (
            format!("console_contains: {:?}", a.console_contains),
            console.contains(&a.console_contains),
        ),
        ScenarioAssertion::FinalLeds(a) => (
            format!("final_leds: {:#04x}", a.final_leds),
            outcome.final_leds() == Some(a.final_leds),
        ),
        ScenarioAssertion::MirrorHolds(a) => (
            format!("mirror_holds: {}", a.mirror_holds),
            outcome.mirror_holds() == a.mirror_holds,
        ),
        ScenarioAssertion::ExpectedStopReason(a) => (
            format!("expected_stop_reason: {:?}", a.expected_stop_reason),
            outcome.stop_reason == a.expected_stop_reason,
        ),
    };

    if !passed {
        warn!("Assertion failed: {}", desc);
    }
    AssertionResult {
        assertion: desc,
        passed,
    }
}

fn test(args: TestArgs) -> anyhow::Result<u8> {
    let script = ScenarioScript::from_file(&args.script)?;

    if script.limits.max_iterations > MAX_ALLOWED_ITERATIONS {
        anyhow::bail!(
            "Limit 'max_iterations' {} exceeds the limit of {}",
            script.limits.max_iterations,
            MAX_ALLOWED_ITERATIONS
        );
    }

    // Board paths are relative to the script.
    let board_path = script.inputs.board.as_ref().map(|b| {
        args.script
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(b)
    });
    let board = load_board(board_path.as_deref())?;

    let mut sim = Simulation::from_board(&board)?;
    sim.set_console_echo(!args.no_console_stdout);
    let metrics = Arc::new(MirrorMetrics::new());
    sim.add_observer(metrics.clone());

    sim.boot()?;
    let outcome = sim.run(&RunLimits::from(&script.limits), |n| script.switches_at(n));
    let console = sim.console_output();

    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|a| check(a, &outcome, &console))
        .collect();
    let passed = assertions.iter().all(|a| a.passed);

    let result = TestResult {
        status: if passed { "pass" } else { "fail" },
        stop_reason: outcome.stop_reason,
        iterations: outcome.iterations,
        mirror_holds: outcome.mirror_holds(),
        final_leds: outcome.final_leds(),
        console,
        assertions,
        config: ResultConfig {
            script: args.script.display().to_string(),
            board: board_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| board.name.clone()),
        },
    };

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("result.json");
        std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
        info!("Wrote {:?}", path);
    }

    info!(
        "Scenario {}: {} iterations, stop reason {:?}",
        result.status, result.iterations, result.stop_reason
    );

    Ok(if passed { EXIT_PASS } else { EXIT_ASSERT_FAIL })
}
