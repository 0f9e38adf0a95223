// src/aggregate/types.rs
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::session::UserSession;

/// Content categories rendered by the dashboard, one upstream source each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    News,
    Jobs,
    Videos,
    Deals,
    Movies,
    Food,
    Recommendations,
    Nft,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::News,
        Category::Jobs,
        Category::Videos,
        Category::Deals,
        Category::Movies,
        Category::Food,
        Category::Recommendations,
        Category::Nft,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::News => "news",
            Category::Jobs => "jobs",
            Category::Videos => "videos",
            Category::Deals => "deals",
            Category::Movies => "movies",
            Category::Food => "food",
            Category::Recommendations => "recommendations",
            Category::Nft => "nft",
        }
    }

    /// Name of the JSON field holding the item list in this category's response.
    pub fn list_field(self) -> &'static str {
        match self {
            Category::News => "articles",
            Category::Jobs => "jobs",
            Category::Videos => "videos",
            Category::Deals => "deals",
            Category::Movies => "movies",
            Category::Food => "recipes",
            Category::Recommendations => "recommendations",
            Category::Nft => "nfts",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_item_flag() -> String {
    "is_static".to_string()
}

/// Values an upstream uses to mark a response as fallback (mock) data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
    /// Top-level `error` string the upstream sends when it has no credentials.
    pub error: String,
    /// Expected top-level `source` label for live data.
    pub source_label: String,
    /// Per-item boolean flag marking a mock item.
    #[serde(default = "default_item_flag")]
    pub item_flag: String,
    /// Advisory shown when the payload carries no `message` of its own.
    pub default_message: String,
    /// Where to obtain real credentials for this upstream.
    pub registration_hint: String,
}

/// Static configuration of one upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Category,
    /// Path relative to the upstream base URL. A `{user_id}` segment is substituted,
    /// otherwise the id is sent as the `user_id` query parameter.
    pub path: String,
    /// Overrides the category's default list field.
    #[serde(default)]
    pub list_field: Option<String>,
    /// Absent for sources that are not subject to provenance classification.
    #[serde(default)]
    pub sentinels: Option<Sentinels>,
}

impl Source {
    pub fn list_field(&self) -> &str {
        self.list_field
            .as_deref()
            .unwrap_or_else(|| self.id.list_field())
    }

    /// Build the request URL for `user_id` against `base`.
    pub fn request_url(&self, base: &Url, user_id: &str) -> Result<Url, FetchError> {
        let mut url = base.clone();
        let templated = self.path.contains("{user_id}");
        {
            let mut segs = url.path_segments_mut().map_err(|_| FetchError::Transport {
                reason: format!("base url {base} cannot carry a path"),
            })?;
            segs.pop_if_empty();
            for seg in self.path.split('/').filter(|s| !s.is_empty()) {
                if seg == "{user_id}" {
                    segs.push(user_id);
                } else {
                    segs.push(seg);
                }
            }
        }
        if !templated {
            url.query_pairs_mut().append_pair("user_id", user_id);
        }
        Ok(url)
    }
}

/// Validated adapter output: one explicit shape for every category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(skip)]
    pub category: Category,
    /// `None` when the body lacks the expected list field.
    #[serde(skip)]
    pub items: Option<Vec<Value>>,
    #[serde(skip)]
    pub source: Option<String>,
    #[serde(skip)]
    pub error: Option<String>,
    #[serde(skip)]
    pub message: Option<String>,
    /// Raw body, handed to the view layer untouched.
    #[serde(rename = "data")]
    pub body: Value,
}

impl Envelope {
    pub fn from_json(source: &Source, body: Value) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        let items = body
            .get(source.list_field())
            .and_then(Value::as_array)
            .cloned();
        Self {
            category: source.id,
            items,
            source: text("source"),
            error: text("error"),
            message: text("message"),
            body,
        }
    }

    pub fn is_shape_mismatch(&self) -> bool {
        self.items.is_none()
    }

    pub fn item_count(&self) -> usize {
        self.items.as_ref().map_or(0, Vec::len)
    }
}

/// Why one source produced no payload in a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },
    #[error("invalid response body: {reason}")]
    Decode { reason: String },
    #[error("adapter aborted: {reason}")]
    Aborted { reason: String },
}

/// Settled outcome of one source in one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResult {
    Fulfilled { payload: Envelope },
    Rejected { failure: FetchError },
}

impl FetchResult {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, FetchResult::Fulfilled { .. })
    }

    pub fn payload(&self) -> Option<&Envelope> {
        match self {
            FetchResult::Fulfilled { payload } => Some(payload),
            FetchResult::Rejected { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchError> {
        match self {
            FetchResult::Fulfilled { .. } => None,
            FetchResult::Rejected { failure } => Some(failure),
        }
    }
}

/// Transport seam: one upstream call returning the decoded JSON body.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self, source: &Source, user: &UserSession) -> Result<Value, FetchError>;
    fn name(&self) -> &'static str;
}
