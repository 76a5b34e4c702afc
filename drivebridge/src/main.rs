use std::path::PathBuf;

use clap::Parser;
use drivebridge::{BridgeConfig, DEFAULT_BIND, run_server};

#[derive(Debug, Parser)]
#[command(author, version, about = "Remote driving inference bridge")]
struct Cli {
    /// Path to the model definition json. Weights should be on the same
    /// path with an .onnx extension.
    model: PathBuf,

    /// Address to listen on for the simulator.
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivebridge=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::new(cli.model);
    config.bind = cli.bind;

    run_server(config).await
}
