// src/aggregate/provenance.rs
//! Live vs. fallback classification of a fulfilled payload.

use serde::Serialize;
use serde_json::Value;

use super::types::{Envelope, Sentinels, Source};

/// Provenance of a fulfilled payload. `reason_message` and `registration_hint` are
/// only set for fallback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceTag {
    pub is_live: bool,
    pub reason_message: Option<String>,
    pub registration_hint: Option<String>,
}

impl ProvenanceTag {
    pub fn live() -> Self {
        Self {
            is_live: true,
            reason_message: None,
            registration_hint: None,
        }
    }
}

/// Classify `payload` against the source's sentinels. Sources without sentinels are not
/// classified and get no tag.
pub fn classify_source(source: &Source, payload: &Envelope) -> Option<ProvenanceTag> {
    source
        .sentinels
        .as_ref()
        .map(|sentinels| classify(sentinels, payload))
}

/// Fallback when any of: the error sentinel is present, an item carries the mock flag,
/// or the source label differs from the live label (a missing label differs too).
pub fn classify(sentinels: &Sentinels, payload: &Envelope) -> ProvenanceTag {
    let error_sentinel = payload.error.as_deref() == Some(sentinels.error.as_str());
    let flagged_item = payload
        .items
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|item| item.get(&sentinels.item_flag).and_then(Value::as_bool) == Some(true));
    let foreign_label = payload.source.as_deref() != Some(sentinels.source_label.as_str());

    if error_sentinel || flagged_item || foreign_label {
        ProvenanceTag {
            is_live: false,
            reason_message: Some(
                payload
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| sentinels.default_message.clone()),
            ),
            registration_hint: Some(sentinels.registration_hint.clone()),
        }
    } else {
        ProvenanceTag::live()
    }
}
