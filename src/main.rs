//! Resilience patterns demo.
//!
//! Drives one resilient policy (retry + circuit breaker) against a simulated
//! endpoint through four phases and narrates every transition.
//!
//! ```text
//! Phase 1  non-idempotent   single call, never retried
//! Phase 2  flaky            7 call groups, the endpoint recovers from group 4
//! Phase 3  down             15 call groups, always failing, circuit fast-fails
//! Phase 4  recovery         5 call groups, succeeding from group 3
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use resilient_client::config::{self, Profile};
use resilient_client::lifecycle::{listen_for_ctrl_c, Shutdown};
use resilient_client::observability::init_logging;
use resilient_client::simulation::SimulatedEndpoint;
use resilient_client::{execute_resiliently_cancellable, ResilienceConfig, ResilientPolicy};

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "Retry, backoff and circuit breaker demo against a simulated API", long_about = None)]
struct Cli {
    /// TOML file layered over the profile defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (overrides RESILIENCE_ENV)
    #[arg(short, long)]
    profile: Option<Profile>,

    /// Which phase to run
    #[arg(long, value_enum, default_value_t = Phase::All)]
    phase: Phase,

    /// Seed for jitter and simulated failures
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Phase {
    All,
    NonIdempotent,
    Flaky,
    Down,
    Recovery,
}

impl Phase {
    fn includes(self, phase: Phase) -> bool {
        self == Phase::All || self == phase
    }
}

struct Demo {
    endpoint: SimulatedEndpoint,
    policy: ResilientPolicy,
    shutdown: Shutdown,
}

impl Demo {
    async fn non_idempotent(&self) {
        println!("--- PHASE 1: NON-IDEMPOTENT OPERATION ---");
        println!(" (e.g. POST /orders, not suitable for automatic client-side retries)");
        self.endpoint.reset_failure_count();

        match self.endpoint.perform_non_idempotent_action(false).await {
            Ok(_) => println!("  Non-idempotent call succeeded (unexpected for demo)."),
            Err(error) => {
                println!("  Non-idempotent call failed: {error}.");
                tracing::warn!(
                    "Manual intervention or server-side idempotency keys are needed instead of client retries"
                );
            }
        }
    }

    /// Run `groups` call groups; group `i` expects success when `succeed_from <= i`.
    async fn idempotent_groups(&self, groups: usize, succeed_from: usize, pause: Duration) {
        self.endpoint.reset_failure_count();

        for i in 0..groups {
            if self.shutdown.is_triggered() {
                return;
            }
            println!("\n--- Call Group {} ---", i + 1);
            let success_expected = i >= succeed_from;
            let result = execute_resiliently_cancellable(
                || self.endpoint.perform_idempotent_action(success_expected),
                &self.policy,
                self.shutdown.token(),
            )
            .await;

            match result {
                Ok(body) => println!("  Idempotent call group succeeded! ({body})"),
                Err(failure) => {
                    println!("  Idempotent call group ultimately failed [{}]: {}", failure.class, failure.error)
                }
            }
            println!("  Circuit is {}", self.policy.breaker().state());

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.shutdown.triggered() => return,
            }
        }
    }
}

fn separator() {
    println!("\n----------------------------------------------------------------------\n");
}

/// Command-line flags win over `RESILIENCE_ENV` and `RESILIENCE_CONFIG`.
fn load(cli: &Cli) -> Result<ResilienceConfig, config::ConfigError> {
    match (cli.profile, cli.config.as_deref()) {
        (None, None) => config::load_from_env(),
        (None, Some(path)) => config::load_config(path),
        (Some(profile), path) => {
            let env_path = std::env::var_os(config::CONFIG_PATH_ENV).map(PathBuf::from);
            config::load(profile, path.or(env_path.as_deref()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    init_logging(&config.logging)?;
    tracing::info!(phase = ?cli.phase, seed = ?cli.seed, "resilient-client starting");

    let endpoint = match cli.seed {
        Some(seed) => SimulatedEndpoint::with_seed(config.external_api.clone(), seed),
        None => SimulatedEndpoint::new(config.external_api.clone()),
    };
    let mut builder = ResilientPolicy::builder("IdempotentApiService", &config);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    let shutdown = Shutdown::new();
    let signals = listen_for_ctrl_c(shutdown.clone());

    let demo = Demo {
        endpoint,
        policy: builder.build(),
        shutdown: shutdown.clone(),
    };
    let demo_config = &config.demo;

    println!("======================================================================");
    println!(" Resilience Patterns Demo");
    println!(" (Retry only on idempotent calls, circuit breaker, exponential backoff + jitter)");
    println!("======================================================================\n");

    if cli.phase.includes(Phase::NonIdempotent) {
        demo.non_idempotent().await;
        separator();
    }

    if cli.phase.includes(Phase::Flaky) && !shutdown.is_triggered() {
        println!("--- PHASE 2: IDEMPOTENT CALL - FLAKY SERVICE ---");
        println!(" (Service fails 3 times, then recovers. Observe retries and the circuit opening and closing.)");
        demo.idempotent_groups(7, 3, Duration::from_millis(demo_config.delay_between_groups_ms))
            .await;
        separator();
    }

    if cli.phase.includes(Phase::Down) && !shutdown.is_triggered() {
        println!("--- PHASE 3: IDEMPOTENT CALL - SERVICE DOWN ---");
        println!(" (Service consistently fails. Observe the circuit opening and fast-failing requests.)");
        demo.idempotent_groups(15, usize::MAX, Duration::from_millis(demo_config.delay_service_down_ms))
            .await;
        separator();
    }

    if cli.phase.includes(Phase::Recovery) && !shutdown.is_triggered() {
        println!("--- PHASE 4: IDEMPOTENT CALL - SERVICE RECOVERY ---");
        println!(" (Service starts to recover. Observe the half-open trial and the circuit closing.)");
        demo.idempotent_groups(5, 2, Duration::from_millis(demo_config.delay_recovery_ms))
            .await;
    }

    // Release the ctrl-c listener.
    shutdown.trigger();
    let _ = signals.await;

    println!("\n======================================================================");
    println!(" Demo finished.");
    println!("======================================================================");
    Ok(())
}
