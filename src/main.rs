use std::sync::Arc;

use tracing::info;

use denzong::api::{self, AppState};
use denzong::bus::EventBus;
use denzong::config::Config;
use denzong::guides::GuideDirectory;
use denzong::signup::SignupService;
use denzong::store::memory::{LocalAuth, MemoryStore};
use denzong::store::remote::{RemoteAuth, RemoteStore};
use denzong::store::{AuthProvider, DocumentStore};
use denzong::weather::WeatherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Denzong daemon starting...");

    let config = Config::from_env();
    let bus = Arc::new(EventBus::new());
    let http = reqwest::Client::new();

    let store: Arc<dyn DocumentStore> = match &config.store_url {
        Some(url) => {
            info!("Using hosted document store at {url}");
            let remote = RemoteStore::new(http.clone(), url.clone());
            remote.spawn_watch(bus.clone());
            Arc::new(remote)
        }
        None => {
            info!("STORE_URL not set, serving the seeded demo dataset");
            Arc::new(MemoryStore::seeded(bus.clone()))
        }
    };

    let auth: Arc<dyn AuthProvider> = match &config.auth_url {
        Some(url) => {
            info!("Using identity provider at {url}");
            Arc::new(RemoteAuth::new(http.clone(), url.clone()))
        }
        None => {
            info!("AUTH_URL not set, issuing local anonymous identities");
            Arc::new(LocalAuth)
        }
    };

    match &config.chat_backend_url {
        Some(url) => info!("Chat widget backend: {url}"),
        None => info!("CHAT_BACKEND_URL not set, chat widget embeds fall back to demo replies"),
    }

    let state = Arc::new(AppState {
        guides: GuideDirectory::new(store.clone()),
        signup: SignupService::new(auth, store.clone()),
        weather: WeatherClient::new(
            http,
            config.weather_api_url.clone(),
            config.weather_api_key.clone(),
        ),
        default_city: config.default_city.clone(),
        store,
        bus,
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting HTTP server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
