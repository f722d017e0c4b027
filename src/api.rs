use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::bus::EventBus;
use crate::error::WeatherError;
use crate::guides::{Guide, GuideDirectory, Preference};
use crate::signup::SignupService;
use crate::store::subscriber::{self, Subscription};
use crate::store::{Document, DocumentStore, MONASTERIES};
use crate::weather::WeatherClient;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub bus: Arc<EventBus>,
    pub guides: GuideDirectory,
    pub signup: SignupService,
    pub weather: WeatherClient,
    pub default_city: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/weather", get(weather_handler))
        .route("/signup", post(signup_handler))
        .route("/guides", get(guides_handler))
        .route("/guides/match", post(match_handler))
        .route("/monasteries", get(monasteries_handler))
        .route("/monasteries/live", get(monasteries_live_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Deserialize)]
struct WeatherQuery {
    city: Option<String>,
}

async fn weather_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<Value>, WeatherError> {
    let city = query.city.unwrap_or_else(|| state.default_city.clone());
    state.weather.fetch(&city).await.map(Json)
}

#[derive(Deserialize)]
struct SignupRequest {
    name: String,
    phone: String,
    email: Option<String>,
}

async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Json<Value> {
    match state
        .signup
        .sign_up(&req.name, &req.phone, req.email.as_deref())
        .await
    {
        Ok(uid) => Json(json!({ "success": true, "uid": uid })),
        Err(e) => {
            error!("Signup failed: {e}");
            Json(json!({ "success": false, "message": e.to_string() }))
        }
    }
}

async fn guides_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Guide>> {
    match state.guides.list().await {
        Ok(guides) => Json(guides),
        Err(e) => {
            error!("Could not fetch guides: {e}");
            Json(Vec::new())
        }
    }
}

async fn match_handler(
    State(state): State<Arc<AppState>>,
    Json(preference): Json<Preference>,
) -> Json<Vec<Guide>> {
    match state.guides.matching(&preference).await {
        Ok(guides) => Json(guides),
        Err(e) => {
            // Callers see an empty pool either way; the distinction lives
            // in the log.
            error!("Guide matching failed: {e}");
            Json(Vec::new())
        }
    }
}

async fn monasteries_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Document>> {
    match state.store.list(MONASTERIES).await {
        Ok(docs) => Json(docs),
        Err(e) => {
            error!("Could not fetch monasteries: {e}");
            Json(Vec::new())
        }
    }
}

async fn monasteries_live_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::BoxError>>> {
    info!("New monastery feed connection");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = subscriber::subscribe(
        state.store.clone(),
        &state.bus,
        MONASTERIES,
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
    );

    let stream = async_stream::stream! {
        // Held by the generator, so the subscription is released the
        // moment the client disconnects.
        let _guard = FeedGuard(Some(subscription));
        while let Some(snapshot) = rx.recv().await {
            match serde_json::to_string(&snapshot) {
                Ok(data) => yield Ok(SseEvent::default().data(data)),
                Err(e) => error!("Could not serialize monastery snapshot: {e}"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

struct FeedGuard(Option<Subscription>);

impl Drop for FeedGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.0.take() {
            subscription.unsubscribe();
        }
    }
}
