use realworld::config::Config;
use realworld::db::{self, Store};
use realworld::state::AppState;
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    let pool = db::init_pool(&config)?;
    let state = AppState::new(Store::new(pool), &config)?;

    let _rocket = realworld::build_rocket(state).launch().await?;
    Ok(())
}
