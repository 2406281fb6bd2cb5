use batch_capture::{install_prometheus_exporter, setup_logging, Cli, CliRunner, Config, Metrics};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    info!("Starting batch-capture v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&args).await?;

    // The recorder has to exist before the metric handles are registered.
    if let Some(port) = args.metrics_port {
        install_prometheus_exporter(port)?;
    }
    let metrics = Arc::new(Metrics::new());

    let result = CliRunner::new(config, metrics).run(args.command).await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        std::process::exit(1);
    }

    info!("batch-capture finished");
    Ok(())
}

async fn load_config(args: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Batch size: {}", config.batch_size);
    info!("Attempts per target: {}", config.retry.max_attempts);
    info!("Output directory: {}", config.output_dir.display());

    Ok(config)
}
