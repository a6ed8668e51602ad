use moonveil::db::DatabaseConnection;
use moonveil::registry::RoomRegistry;
use moonveil::ws::Hub;
use moonveil::{AppState, ConfigBuilder};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ConfigBuilder::new().from_env().build()?;
    moonveil::init_tracing_with_config(&config);

    // Unreachable database is fatal at startup; runtime failures only flip
    // the health endpoint.
    let db = DatabaseConnection::connect(&config.database).await?;

    let state = AppState {
        hub: Hub::spawn(),
        registry: Arc::new(RoomRegistry::new()),
        db: Some(db.clone()),
        ws: config.ws.clone(),
    };

    moonveil::serve(&config, state).await?;

    db.close().await?;
    Ok(())
}
