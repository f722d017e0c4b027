use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, StoreError};

pub mod memory;
pub mod remote;
pub mod subscriber;

/// Collections this system reads or writes. Everything in them is owned by
/// the hosted store; `MONASTERIES` and `GUIDES` are read-only here.
pub const MONASTERIES: &str = "monasteries";
pub const GUIDES: &str = "Guides";
pub const USERS: &str = "users";

/// A record as handed out by the store: the store-assigned identifier
/// merged with the document's field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the full current contents of a collection, in store iteration
    /// order. The order is whatever the store hands back and may shift
    /// between calls.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Create or replace the document at `collection/{id}`.
    async fn put(&self, collection: &str, id: &str, fields: Map<String, Value>)
        -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnonymousUser {
    pub uid: String,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Ask the provider for a fresh anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<AnonymousUser, AuthError>;
}
