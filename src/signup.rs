use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map};
use tracing::info;

use crate::error::SignupError;
use crate::store::{AuthProvider, DocumentStore, USERS};

/// Anonymous signup: create an identity with the provider, then persist
/// the profile document keyed by the new uid.
pub struct SignupService {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
}

impl SignupService {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { auth, store }
    }

    /// Returns the new uid. If the profile write fails the identity is not
    /// rolled back; the caller gets [`SignupError::ProfileWrite`] and the
    /// identity stays orphaned until the user retries.
    pub async fn sign_up(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<String, SignupError> {
        let user = self.auth.sign_in_anonymously().await?;
        info!("Created anonymous identity {}", user.uid);

        let mut profile = Map::new();
        profile.insert("name".into(), json!(name));
        profile.insert("phone".into(), json!(phone));
        profile.insert("email".into(), json!(email));
        profile.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
        profile.insert("anonymous".into(), json!(true));

        self.store
            .put(USERS, &user.uid, profile)
            .await
            .map_err(SignupError::ProfileWrite)?;

        info!("Saved profile for {}", user.uid);
        Ok(user.uid)
    }
}
