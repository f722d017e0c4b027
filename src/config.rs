use std::{env, fmt::Display, str::FromStr};

use tracing::warn;

const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org";
const DEFAULT_CITY: &str = "Gangtok";

/// Runtime configuration, read once from the process environment.
///
/// Everything that used to be edited in place lives here now: the chat
/// backend URL in particular is `CHAT_BACKEND_URL`, and leaving it unset
/// selects the widget's demo fallback.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub weather_api_key: String,
    pub weather_api_url: String,
    pub default_city: String,
    pub chat_backend_url: Option<String>,
    pub store_url: Option<String>,
    pub auth_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 3000),
            weather_api_key: var("WEATHER_API_KEY").unwrap_or_else(|| {
                warn!("WEATHER_API_KEY not set, upstream weather calls will be rejected");
                String::new()
            }),
            weather_api_url: var("WEATHER_API_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_URL.to_string()),
            default_city: var("DEFAULT_CITY").unwrap_or_else(|| DEFAULT_CITY.to_string()),
            chat_backend_url: var("CHAT_BACKEND_URL"),
            store_url: var("STORE_URL"),
            auth_url: var("AUTH_URL"),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value: {e}");
            default
        }),
        None => default,
    }
}
