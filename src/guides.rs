use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{Document, DocumentStore, GUIDES};

/// A guide record as stored. `languages` and `price` arrive in whatever
/// shape the collection holds (a list or a comma-joined string, a number
/// or a quoted one) and are normalized on read. `rating` and `skills`
/// pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub languages: Value,
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub rating: Value,
    #[serde(default)]
    pub skills: Value,
}

impl Guide {
    pub fn from_document(doc: Document) -> Self {
        let Document { id, fields } = doc;
        let mut guide: Guide = serde_json::from_value(Value::Object(fields)).unwrap_or_default();
        guide.id = id;
        guide
    }

    /// Spoken languages, normalized to a list.
    pub fn languages(&self) -> Vec<String> {
        match &self.languages {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::String(joined) => joined.split(',').map(|l| l.trim().to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Price coerced to a number. Anything non-numeric comes back NaN,
    /// which fails every budget comparison.
    pub fn price(&self) -> f64 {
        match &self.price {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }
}

/// What a visitor asked for. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub language: String,
    pub budget: f64,
}

/// Stable filter over the guide pool; the input is never mutated. A guide
/// is kept iff its languages contain the requested one (exact match) and
/// its price fits the budget, inclusive.
pub fn match_guides(guides: &[Guide], preference: &Preference) -> Vec<Guide> {
    guides
        .iter()
        .filter(|g| {
            g.languages().iter().any(|l| l == &preference.language)
                && g.price() <= preference.budget
        })
        .cloned()
        .collect()
}

/// Read-side service over the `Guides` collection.
pub struct GuideDirectory {
    store: Arc<dyn DocumentStore>,
}

impl GuideDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All guides currently in the store.
    pub async fn list(&self) -> Result<Vec<Guide>, StoreError> {
        let docs = self.store.list(GUIDES).await?;
        Ok(docs.into_iter().map(Guide::from_document).collect())
    }

    /// Guides matching the preference. A store failure is a failure here;
    /// the HTTP layer flattens it to an empty pool for callers.
    pub async fn matching(&self, preference: &Preference) -> Result<Vec<Guide>, StoreError> {
        let guides = self.list().await?;
        let matched = match_guides(&guides, preference);
        debug!("Matched {} of {} guides", matched.len(), guides.len());
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guide(languages: Value, price: Value) -> Guide {
        Guide {
            id: "g".into(),
            name: "Guide".into(),
            languages,
            price,
            ..Guide::default()
        }
    }

    fn pref(language: &str, budget: f64) -> Preference {
        Preference {
            language: language.into(),
            budget,
        }
    }

    #[test]
    fn keeps_a_guide_with_joined_languages_and_quoted_price() {
        let pool = vec![guide(json!("English, Hindi"), json!("50"))];
        let matched = match_guides(&pool, &pref("Hindi", 60.0));
        assert_eq!(matched, pool);
    }

    #[test]
    fn excludes_a_guide_over_budget() {
        let pool = vec![guide(json!(["English"]), json!(100))];
        assert!(match_guides(&pool, &pref("English", 50.0)).is_empty());
    }

    #[test]
    fn budget_is_inclusive() {
        let pool = vec![guide(json!(["English"]), json!(50))];
        assert_eq!(match_guides(&pool, &pref("English", 50.0)).len(), 1);
    }

    #[test]
    fn non_numeric_price_always_fails() {
        let pool = vec![guide(json!(["English"]), json!("abc"))];
        assert!(match_guides(&pool, &pref("English", 1000.0)).is_empty());
    }

    #[test]
    fn missing_price_always_fails() {
        let pool = vec![guide(json!(["English"]), Value::Null)];
        assert!(match_guides(&pool, &pref("English", 1000.0)).is_empty());
    }

    #[test]
    fn language_match_is_exact_and_case_sensitive() {
        let pool = vec![guide(json!("English, Hindi"), json!(10))];
        assert!(match_guides(&pool, &pref("english", 100.0)).is_empty());
        assert!(match_guides(&pool, &pref("Hin", 100.0)).is_empty());
    }

    #[test]
    fn non_list_non_string_languages_are_empty() {
        let pool = vec![guide(json!(42), json!(10))];
        assert!(match_guides(&pool, &pref("English", 100.0)).is_empty());
    }

    #[test]
    fn filter_is_stable_pure_and_repeatable() {
        let pool = vec![
            guide(json!(["Hindi"]), json!(10)),
            guide(json!(["English"]), json!(999)),
            guide(json!("Hindi, English"), json!("20")),
        ];
        let before = pool.clone();

        let once = match_guides(&pool, &pref("Hindi", 50.0));
        let twice = match_guides(&pool, &pref("Hindi", 50.0));

        assert_eq!(pool, before, "input pool must not be mutated");
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
        // Relative input order survives.
        assert_eq!(once[0].price, json!(10));
        assert_eq!(once[1].price, json!("20"));
    }

    #[test]
    fn document_fields_map_onto_the_guide_shape() {
        let doc: Document = serde_json::from_value(json!({
            "id": "tashi-dorje",
            "name": "Tashi Dorje",
            "languages": "English, Nepali",
            "price": "50",
            "rating": 4.8,
            "skills": ["History"]
        }))
        .unwrap();

        let guide = Guide::from_document(doc);
        assert_eq!(guide.id, "tashi-dorje");
        assert_eq!(guide.languages(), vec!["English", "Nepali"]);
        assert_eq!(guide.price(), 50.0);
        assert_eq!(guide.rating, json!(4.8));
    }
}
