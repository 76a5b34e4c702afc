use std::net::SocketAddr;

pub mod config;
pub mod driver;
pub mod error;
pub mod manifest;
pub mod model;
pub mod policy;
pub mod preprocess;
pub mod server;

pub use config::{BridgeConfig, DEFAULT_BIND};

use driver::{Driver, EVENT_QUEUE_DEPTH};
use manifest::ModelDefinition;
use preprocess::Preprocessor;
use server::WsState;

pub async fn run_server(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let definition = ModelDefinition::load(&config.definition_path)?;
    let weights_path = config.weights_path();
    let model = model::load_model(&weights_path, &definition)?;

    let preprocessor = Preprocessor::from_definition(&definition);
    let (events, event_queue) = tokio::sync::mpsc::channel(EVENT_QUEUE_DEPTH);

    let driver = Driver::new(model, preprocessor);
    std::thread::spawn(move || driver.run(event_queue));

    let app = server::router(WsState::new(events));

    let addr: SocketAddr = config.bind.parse()?;
    tracing::info!(%addr, "waiting for the simulator");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
