use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{AnonymousUser, AuthProvider, Document, DocumentStore, GUIDES, MONASTERIES};
use crate::bus::{Event, EventBus};
use crate::error::{AuthError, StoreError};

/// In-process store, used when no hosted store is configured and by tests.
/// Writes publish a change signal on the bus like the real change feed
/// would.
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Map<String, Value>>>>,
    bus: Arc<EventBus>,
}

impl MemoryStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// A store pre-populated with the demo dataset the site ships with.
    pub fn seeded(bus: Arc<EventBus>) -> Self {
        let store = Self::new(bus);
        {
            let mut collections = store.collections.lock().unwrap();
            collections.insert(MONASTERIES.to_string(), seed_monasteries());
            collections.insert(GUIDES.to_string(), seed_guides());
        }
        store
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        {
            let mut collections = self.collections.lock().unwrap();
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
        self.bus.publish(Event::CollectionChanged {
            collection: collection.to_string(),
        });
        Ok(())
    }
}

/// Identity issuance without a provider: every call hands out a fresh
/// local uid.
pub struct LocalAuth;

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in_anonymously(&self) -> Result<AnonymousUser, AuthError> {
        Ok(AnonymousUser {
            uid: Uuid::new_v4().simple().to_string(),
        })
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seed_monasteries() -> BTreeMap<String, Map<String, Value>> {
    let entries = [
        (
            "rumtek",
            json!({
                "name": "Rumtek Monastery",
                "location": "Gangtok",
                "description": "Spiritual heart of Sikkim, known for Tibetan architecture."
            }),
        ),
        (
            "pemayangtse",
            json!({
                "name": "Pemayangtse Monastery",
                "location": "Pelling",
                "description": "One of the oldest monasteries, near Pelling."
            }),
        ),
        (
            "phodong",
            json!({
                "name": "Phodong Monastery",
                "location": "North Sikkim",
                "description": "One of the six most important monasteries in Sikkim, known for its ancient murals and a vibrant annual festival."
            }),
        ),
        (
            "rinchenpong",
            json!({
                "name": "Rinchenpong Monastery",
                "location": "Rinchenpong",
                "description": "Known for its unique statue of the 'Ati Buddha', nestled in a tranquil setting with spectacular views."
            }),
        ),
        (
            "dubdi",
            json!({
                "name": "Dubdi Monastery",
                "location": "Yuksom",
                "description": "Considered the oldest monastery in Sikkim, Dubdi means 'the retreat'."
            }),
        ),
        (
            "enchey",
            json!({
                "name": "Enchey Monastery",
                "location": "Gangtok",
                "description": "Perched on a ridge above Gangtok, home to a large collection of ritual dance masks."
            }),
        ),
        (
            "lingdum",
            json!({
                "name": "Lingdum Monastery (Ranka Monastery)",
                "location": "Ranka",
                "description": "A relatively new and visually stunning monastery with vibrant Tibetan architecture."
            }),
        ),
    ];
    entries
        .into_iter()
        .map(|(id, fields)| (id.to_string(), object(fields)))
        .collect()
}

// Field shapes are deliberately mixed (joined strings next to lists,
// quoted numbers next to numbers) to mirror what the hosted collection
// actually holds.
fn seed_guides() -> BTreeMap<String, Map<String, Value>> {
    let entries = [
        (
            "tashi-dorje",
            json!({
                "name": "Tashi Dorje",
                "languages": "English, Nepali",
                "price": "50",
                "rating": 4.8,
                "skills": ["History", "Spirituality"]
            }),
        ),
        (
            "lhamo-doma",
            json!({
                "name": "Lhamo Doma",
                "languages": ["Hindi", "English"],
                "price": 65,
                "rating": 4.9,
                "skills": ["Culture", "Trekking"]
            }),
        ),
        (
            "karma-wangchuk",
            json!({
                "name": "Karma Wangchuk",
                "languages": "English",
                "price": "80",
                "rating": 4.7,
                "skills": ["Buddhism", "Local Cuisine"]
            }),
        ),
    ];
    entries
        .into_iter()
        .map(|(id, fields)| (id.to_string(), object(fields)))
        .collect()
}
