use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AnonymousUser, AuthProvider, Document, DocumentStore};
use crate::bus::{Event, EventBus};
use crate::error::{AuthError, StoreError};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Client for the hosted document store's REST surface.
#[derive(Clone)]
pub struct RemoteStore {
    http: Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection)
    }

    /// Start the change-feed reader. The store streams `data:` lines naming
    /// the collection that changed; each one is republished on the bus.
    /// The task reconnects after a short delay whenever the feed drops.
    pub fn spawn_watch(&self, bus: Arc<EventBus>) -> JoinHandle<()> {
        let http = self.http.clone();
        let url = format!("{}/changes", self.base_url);
        tokio::spawn(async move {
            loop {
                match http.get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        info!("Connected to store change feed");
                        read_feed(resp, &bus).await;
                        warn!("Store change feed closed, reconnecting");
                    }
                    Ok(resp) => {
                        warn!("Store change feed returned {}", resp.status());
                    }
                    Err(e) => {
                        warn!("Could not connect to store change feed: {e}");
                    }
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        })
    }
}

async fn read_feed(resp: reqwest::Response, bus: &EventBus) {
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                warn!("Change feed read error: {e}");
                return;
            }
        };
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim().to_string();
            buf.drain(..=pos);
            if let Some(collection) = line.strip_prefix("data:") {
                let collection = collection.trim();
                if !collection.is_empty() {
                    debug!("Change signal for collection {collection}");
                    bus.publish(Event::CollectionChanged {
                        collection: collection.to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for RemoteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let resp = self.http.get(self.collection_url(collection)).send().await?;
        if !resp.status().is_success() {
            return Err(StoreError::Rejected {
                status: resp.status(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(StoreError::Decode)
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.collection_url(collection), id);
        let resp = self
            .http
            .put(url)
            .json(&Value::Object(fields))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(StoreError::Rejected {
                status: resp.status(),
            });
        }
        Ok(())
    }
}

/// Client for the identity provider.
#[derive(Clone)]
pub struct RemoteAuth {
    http: Client,
    base_url: String,
}

impl RemoteAuth {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }
}

#[async_trait]
impl AuthProvider for RemoteAuth {
    async fn sign_in_anonymously(&self) -> Result<AnonymousUser, AuthError> {
        let url = format!("{}/anonymous", self.base_url);
        let resp = self.http.post(url).send().await?;
        if !resp.status().is_success() {
            return Err(AuthError::Rejected {
                status: resp.status(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(AuthError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn lists_documents_with_merged_ids() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/Guides/documents");
                then.status(200).json_body(json!([
                    { "id": "g1", "name": "Tashi Dorje", "price": "50" },
                    { "id": "g2", "name": "Lhamo Doma", "price": 65 }
                ]));
            })
            .await;

        let store = RemoteStore::new(Client::new(), server.base_url());
        let docs = store.list("Guides").await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "g1");
        assert_eq!(docs[0].get("price"), Some(&json!("50")));
        assert_eq!(docs[1].get("price"), Some(&json!(65)));
    }

    #[tokio::test]
    async fn list_rejection_is_an_error_not_an_empty_pool() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/Guides/documents");
                then.status(503);
            })
            .await;

        let store = RemoteStore::new(Client::new(), server.base_url());
        match store.list("Guides").await {
            Err(StoreError::Rejected { status }) => assert_eq!(status.as_u16(), 503),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_replaces_the_document_by_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/users/documents/u1")
                    .json_body(json!({ "name": "Pema", "anonymous": true }));
                then.status(204);
            })
            .await;

        let store = RemoteStore::new(Client::new(), server.base_url());
        let mut fields = Map::new();
        fields.insert("name".into(), json!("Pema"));
        fields.insert("anonymous".into(), json!(true));
        store.put("users", "u1", fields).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn change_feed_lines_reach_the_bus() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/changes");
                then.status(200)
                    .body("data: monasteries\n\ndata: Guides\n\n");
            })
            .await;

        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let store = RemoteStore::new(Client::new(), server.base_url());
        let watcher = store.spawn_watch(bus.clone());

        let Event::CollectionChanged { collection } =
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(collection, "monasteries");

        let Event::CollectionChanged { collection } =
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(collection, "Guides");

        watcher.abort();
    }

    #[tokio::test]
    async fn anonymous_sign_in_returns_the_issued_uid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/anonymous");
                then.status(200).json_body(json!({ "uid": "abc123" }));
            })
            .await;

        let auth = RemoteAuth::new(Client::new(), server.base_url());
        let user = auth.sign_in_anonymously().await.unwrap();
        assert_eq!(user.uid, "abc123");
    }

    #[tokio::test]
    async fn auth_rejection_carries_the_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/anonymous");
                then.status(403);
            })
            .await;

        let auth = RemoteAuth::new(Client::new(), server.base_url());
        match auth.sign_in_anonymously().await {
            Err(AuthError::Rejected { status }) => assert_eq!(status.as_u16(), 403),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
