// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stateless decoding of raw cluster payloads into typed actions.
//!
//! Nothing is dropped silently here: a payload that fails to decode becomes
//! a [`DecodeFailure`] carrying the offending payload, which the dispatcher
//! routes through the same channel as well-formed actions.

use serde::de::DeserializeOwned;

use crate::action::{DecodeFailure, ReconcileAction, ServerAction};
use crate::resource::{CustomResource, RawEvent, WatchVerb};

/// Decodes a raw watch event into a typed server action.
///
/// `Error` verbs carry the raw payload through unparsed; every other verb
/// requires a well-formed resource. Parse failures keep the original verb
/// and payload so the consumer can log exactly what was received.
pub fn decode_event<T, U>(event: RawEvent) -> Result<ServerAction<T, U>, DecodeFailure>
where
    T: DeserializeOwned,
    U: DeserializeOwned + Default,
{
    let RawEvent { verb, payload } = event;

    if verb == WatchVerb::Error {
        return Ok(ServerAction::Error(payload));
    }

    match serde_json::from_value::<CustomResource<T, U>>(payload.clone()) {
        Ok(resource) => Ok(match verb {
            WatchVerb::Added => ServerAction::Added(resource),
            WatchVerb::Modified => ServerAction::Modified(resource),
            WatchVerb::Deleted => ServerAction::Deleted(resource),
            WatchVerb::Error => unreachable!("handled above"),
        }),
        Err(e) => Err(DecodeFailure::ParseResource {
            verb,
            cause: e.to_string(),
            raw: payload,
        }),
    }
}

/// Decodes a reconcile list item into a typed reconcile action.
pub fn decode_reconcile<T, U>(
    payload: serde_json::Value,
) -> Result<ReconcileAction<T, U>, DecodeFailure>
where
    T: DeserializeOwned,
    U: DeserializeOwned + Default,
{
    match serde_json::from_value::<CustomResource<T, U>>(payload.clone()) {
        Ok(resource) => Ok(ReconcileAction { resource }),
        Err(e) => Err(DecodeFailure::ParseReconcile {
            cause: e.to_string(),
            raw: payload,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Spec {
        message: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Status {
        phase: String,
    }

    #[test]
    fn test_decode_added_event() {
        let event = RawEvent {
            verb: WatchVerb::Added,
            payload: json!({
                "metadata": {"name": "example", "namespace": "default", "uid": "u1"},
                "spec": {"message": "hello"},
            }),
        };

        let action = decode_event::<Spec, Status>(event).unwrap();
        match action {
            ServerAction::Added(r) => {
                assert_eq!(r.metadata.name, "example");
                assert_eq!(r.spec.message, "hello");
                assert!(r.status.is_none());
            }
            other => panic!("expected Added, got {:?}", other.verb()),
        }
    }

    #[test]
    fn test_decode_preserves_existing_status() {
        let event = RawEvent {
            verb: WatchVerb::Modified,
            payload: json!({
                "metadata": {"name": "example", "namespace": "default"},
                "spec": {"message": "hello"},
                "status": {"phase": "ready"},
            }),
        };

        let action = decode_event::<Spec, Status>(event).unwrap();
        let resource = action.resource().unwrap();
        assert_eq!(
            resource.status.as_ref().map(|s| s.phase.as_str()),
            Some("ready")
        );
    }

    #[test]
    fn test_parse_failure_carries_verb_and_payload() {
        let payload = json!({
            "metadata": {"name": "broken", "namespace": "default"},
            "spec": {"unexpected": true},
        });
        let event = RawEvent {
            verb: WatchVerb::Modified,
            payload: payload.clone(),
        };

        match decode_event::<Spec, Status>(event) {
            Err(DecodeFailure::ParseResource { verb, raw, cause }) => {
                assert_eq!(verb, WatchVerb::Modified);
                assert_eq!(raw, payload);
                assert!(!cause.is_empty());
            }
            other => panic!("expected parse failure, got {other:?}"),
        }
    }

    #[test]
    fn test_error_verb_passes_payload_through() {
        let payload = json!({"kind": "Status", "message": "too old resource version"});
        let event = RawEvent {
            verb: WatchVerb::Error,
            payload: payload.clone(),
        };

        match decode_event::<Spec, Status>(event).unwrap() {
            ServerAction::Error(raw) => assert_eq!(raw, payload),
            other => panic!("expected Error, got {:?}", other.verb()),
        }
    }

    #[test]
    fn test_decode_reconcile_failure() {
        match decode_reconcile::<Spec, Status>(Value::Null) {
            Err(DecodeFailure::ParseReconcile { raw, .. }) => assert_eq!(raw, Value::Null),
            other => panic!("expected parse failure, got {other:?}"),
        }
    }
}
