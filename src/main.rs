use anyhow::Result;
use auriga::client::{ChargePointClient, HttpChargePointClient};
use auriga::config::Config;
use auriga::controller::SessionController;
use auriga::events::EventBus;
use auriga::scheduler::PollScheduler;
use auriga::session::ChargingState;
use auriga::store::{JsonFileStore, SessionStore};
use auriga::web::{self, AppState};
use std::sync::{Arc, Mutex};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    auriga::logging::init_logging(&config.logging)?;

    info!(
        "Auriga charging session orchestrator {} starting up",
        env!("APP_VERSION")
    );

    let client: Arc<dyn ChargePointClient> = Arc::new(HttpChargePointClient::new(&config.api)?);
    let store: Arc<dyn SessionStore> = Arc::new(JsonFileStore::new(&config.persistence.file));
    let bus = Arc::new(EventBus::new());
    let charging_state = Arc::new(Mutex::new(ChargingState::new()));

    let scheduler = PollScheduler::spawn(
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&charging_state),
        &config.polling,
    );

    let controller = Arc::new(SessionController::new(
        client,
        Arc::clone(&bus),
        charging_state,
        scheduler,
    ));

    let state = AppState {
        controller,
        store,
        bus,
    };
    web::serve(state, &config.web.host, config.web.port).await
}
