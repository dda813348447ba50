use dotenv::dotenv;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

const DEFAULT_SECRET: &str = "secret key for project";

pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub max_connections: u32,
    /// Lifetime of tokens handed out at login and registration.
    pub token_ttl_minutes: i64,
    /// How many articles of one listing are enriched at the same time.
    pub list_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "realworld.sqlite".to_string(),
            secret_key: DEFAULT_SECRET.to_string(),
            max_connections: 10,
            token_ttl_minutes: 60 * 24 * 7,
            list_concurrency: 8,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        dotenv().ok();
        let defaults = Config::default();

        let secret_key = env::var("SECRET_KEY").unwrap_or_else(|_| {
            warn!("SECRET_KEY not set, signing tokens with the development key");
            defaults.secret_key.clone()
        });

        Config {
            database_url: try_load("DATABASE_URL", defaults.database_url),
            secret_key,
            max_connections: try_load("MAX_CONN", defaults.max_connections),
            token_ttl_minutes: try_load("ACCESS_TOKEN_EXPIRE_MINUTES", defaults.token_ttl_minutes),
            list_concurrency: try_load("LIST_CONCURRENCY", defaults.list_concurrency).max(1),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_fall_back_to_default() {
        env::set_var("REALWORLD_TEST_MAX_CONN", "lots");
        assert_eq!(try_load("REALWORLD_TEST_MAX_CONN", 10u32), 10);
        env::set_var("REALWORLD_TEST_MAX_CONN", "4");
        assert_eq!(try_load("REALWORLD_TEST_MAX_CONN", 10u32), 4);
        env::remove_var("REALWORLD_TEST_MAX_CONN");
        assert_eq!(try_load("REALWORLD_TEST_MAX_CONN", 10u32), 10);
    }
}
