use clap::Parser;
use deadlockssh::configuration::Config;
use deadlockssh::controller::Controller;
use log::{error, info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deadlockssh")]
#[command(version)]
#[command(about = "A low-interaction SSH tarpit honeypot")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Get command-line arguments
    let args = Args::parse();

    let (config, config_err) = Config::load(args.config.as_deref());
    let config = config.with_port_override(args.port);

    if let Err(e) = deadlockssh::logging::init(&config) {
        eprintln!("Unable to initialise logging: {}", e);
    }

    match (&args.config, config_err) {
        (Some(path), Some(e)) => {
            warn!(
                "Could not load configuration file {}: {}",
                path.display(),
                e
            );
            warn!("Using default configuration");
        }
        (Some(path), None) => info!("Configuration loaded from {}", path.display()),
        (None, _) => info!("No configuration file given, using defaults"),
    }

    info!("DeadlockSSH initialized");

    if let Err(e) = Controller::new(config).run().await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
