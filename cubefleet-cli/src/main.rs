use clap::{Parser, Subcommand};

mod runner;
mod sim;

use cubefleet::FleetConfig;

#[derive(Parser, Debug)]
#[command(name = "cubefleet", version = "0.1.0")]
#[command(about = "Cubefleet CLI - fleet simulation and streaming tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the fleet against a decision service
    Run {
        /// Decision service base URL (overrides CUBEFLEET_BRAIN_URL)
        #[arg(long)]
        brain_url: Option<String>,
        /// Number of robot agents
        #[arg(long, default_value_t = 5)]
        agents: u32,
        /// Number of cubes to scatter
        #[arg(long, default_value_t = 10)]
        cubes: u32,
        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
        /// Skip the UDP frame pipelines
        #[arg(long)]
        no_stream: bool,
    },
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            brain_url,
            agents,
            cubes,
            seed,
            no_stream,
        } => {
            let config = match load_config(brain_url) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Invalid configuration");
                    std::process::exit(1);
                }
            };
            let options = runner::RunOptions {
                agents,
                cubes,
                seed,
                streaming: !no_stream,
            };
            if let Err(e) = runner::run_fleet(config, options).await {
                tracing::error!(error = %e, "Fleet run failed");
                std::process::exit(1);
            }
        }
        Commands::Config => match load_config(None) {
            Ok(config) => println!("{config:#?}"),
            Err(e) => {
                tracing::error!(error = %e, "Invalid configuration");
                std::process::exit(1);
            }
        },
    }
}

fn load_config(brain_url: Option<String>) -> Result<FleetConfig, cubefleet::ConfigError> {
    let mut config = FleetConfig::from_env()?;
    if let Some(url) = brain_url {
        config.brain_url = url;
    }
    config.validate()?;
    Ok(config)
}
