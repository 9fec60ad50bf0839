//! Payload annotation and plausibility checks.
//!
//! Every fetched payload is tagged with provenance fields before it enters
//! the cache. Payloads that look truncated are kept, flagged rather than
//! dropped, so downstream quality checks can decide what to do with them.

use chrono::Utc;
use log::debug;
use serde_json::{json, Value};

use crate::config::{ANNOTATION_TYPE, EXPECTED_PARTICIPANTS, SPECIAL_QUEUE_IDS};

use super::IncompleteResource;

/// Tag a fetched payload with collection provenance.
///
/// No-op for non-object payloads; the raw value is cached as-is.
pub(super) fn annotate(resource_id: &str, payload: &mut Value) {
    if let Some(object) = payload.as_object_mut() {
        object.insert("@type".to_string(), json!(ANNOTATION_TYPE));
        object.insert("riot_match_id".to_string(), json!(resource_id));
        object.insert("@collected_at".to_string(), json!(Utc::now().to_rfc3339()));
    }
}

/// Flag payloads that look truncated.
///
/// A payload is incomplete when the lobby is short of the expected
/// participant count, the match ran in a known special queue, or the game
/// version is missing entirely. The payload is mutated in place with a
/// `metadata.is_incomplete` marker and the reasons, and a summary entry is
/// returned for the run statistics.
pub(super) fn flag_incomplete(resource_id: &str, payload: &mut Value) -> Option<IncompleteResource> {
    let info = payload.get("info");
    let participant_count = info
        .and_then(|i| i.get("participants"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let queue_id = info.and_then(|i| i.get("queueId")).and_then(Value::as_i64);
    let missing_game_version = info.is_none_or(|i| i.get("gameVersion").is_none());

    let mut reasons = Vec::new();
    if participant_count < EXPECTED_PARTICIPANTS {
        reasons.push(format!(
            "Only {participant_count} participants (expected {EXPECTED_PARTICIPANTS})"
        ));
    }
    if let Some(id) = queue_id {
        if SPECIAL_QUEUE_IDS.contains(&id) {
            reasons.push(format!("Special queue {id}"));
        }
    }
    if missing_game_version {
        reasons.push("Missing gameVersion".to_string());
    }
    if reasons.is_empty() {
        return None;
    }

    if let Some(object) = payload.as_object_mut() {
        let metadata = object.entry("metadata").or_insert_with(|| json!({}));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert("is_incomplete".to_string(), json!(true));
            metadata.insert("incomplete_reason".to_string(), json!(reasons));
        }
    }

    debug!(
        "Incomplete payload detected: {resource_id} ({participant_count} participants, queue {queue_id:?})"
    );

    Some(IncompleteResource {
        resource_id: resource_id.to_string(),
        participant_count,
        queue_id,
    })
}
