// src/aggregate/providers/fixture.rs
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::aggregate::sources::default_sources;
use crate::aggregate::types::{Category, FetchError, Source, SourceProvider};
use crate::session::UserSession;

/// Serves canned bodies per category. Categories without a body answer HTTP 404.
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    bodies: HashMap<Category, Value>,
}

impl FixtureProvider {
    pub fn from_fixture(bodies: HashMap<Category, Value>) -> Self {
        Self { bodies }
    }

    pub fn with(mut self, category: Category, body: Value) -> Self {
        self.bodies.insert(category, body);
        self
    }

    /// What the upstream services answer when they run without API keys: every
    /// content feed returns its error sentinel and one mock item.
    pub fn offline_demo() -> Self {
        let mut bodies = HashMap::new();
        for src in default_sources() {
            let body = match &src.sentinels {
                Some(s) => json!({
                    "error": s.error,
                    "message": s.default_message,
                    "instructions": format!("Get a free API key from {}", s.registration_hint),
                    "count": 1,
                    src.list_field(): [{
                        "id": format!("static_{}_1", src.id),
                        "title": format!("STATIC DATA: latest {}", src.id),
                        "url": s.registration_hint,
                        "is_static": true,
                    }],
                }),
                None => json!({
                    src.list_field(): [{
                        "id": format!("{}_1", src.id),
                        "title": format!("Sample {}", src.id),
                        "content_type": "news",
                    }],
                }),
            };
            bodies.insert(src.id, body);
        }
        Self { bodies }
    }
}

#[async_trait]
impl SourceProvider for FixtureProvider {
    async fn fetch_latest(&self, source: &Source, _user: &UserSession) -> Result<Value, FetchError> {
        self.bodies
            .get(&source.id)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
