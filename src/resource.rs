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

//! The typed resource model.
//!
//! Everything the pipeline moves around is derived from these types: the
//! cluster hands the transport raw JSON payloads, the decoder turns them into
//! [`CustomResource`] values, and controllers only ever see the typed form.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Object metadata attached to every cluster resource.
///
/// Set by the cluster and treated as opaque by the framework except for
/// routing: `namespace` selects the per-namespace consumer, and
/// (`name`, `namespace`) identify the target of a status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Resource name, unique together with `namespace` per kind.
    pub name: String,

    /// Namespace the resource lives in. `None` for cluster-scoped resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Cluster-assigned unique identifier.
    #[serde(default)]
    pub uid: String,

    /// Version of this resource, monotonic per uid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Resource labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Metadata {
    /// Returns the namespace routing key for this resource.
    ///
    /// Cluster-scoped resources map to the synthetic empty key, so they all
    /// share one consumer.
    pub fn namespace_key(&self) -> String {
        self.namespace.clone().unwrap_or_default()
    }
}

/// A typed custom resource as observed from the cluster.
///
/// `spec` is always present; `status` may be absent, typically on freshly
/// created resources the operator has not reported on yet. Instances are
/// immutable within the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomResource<T, U> {
    /// Cluster-assigned metadata.
    pub metadata: Metadata,

    /// The desired state as declared by the resource author.
    pub spec: T,

    /// The last observed state as reported by the operator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<U>,
}

/// The lifecycle verb of a watch event as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchVerb {
    /// A resource was created (or replayed on watch start).
    Added,
    /// A resource was updated.
    Modified,
    /// A resource was removed.
    Deleted,
    /// The cluster reported an in-stream error condition.
    Error,
}

impl fmt::Display for WatchVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchVerb::Added => "ADDED",
            WatchVerb::Modified => "MODIFIED",
            WatchVerb::Deleted => "DELETED",
            WatchVerb::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A raw watch event as produced by the cluster transport, before decoding.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// The lifecycle verb the cluster attached to the event.
    pub verb: WatchVerb,
    /// The undecoded resource payload.
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_deserializes_camel_case() {
        let meta: Metadata = serde_json::from_value(json!({
            "name": "example",
            "namespace": "default",
            "uid": "u-1",
            "resourceVersion": "42",
            "labels": {"app": "example"},
        }))
        .unwrap();

        assert_eq!(meta.name, "example");
        assert_eq!(meta.namespace.as_deref(), Some("default"));
        assert_eq!(meta.resource_version.as_deref(), Some("42"));
        assert_eq!(meta.labels.get("app").map(String::as_str), Some("example"));
    }

    #[test]
    fn test_namespace_key_for_cluster_scoped() {
        let meta: Metadata = serde_json::from_value(json!({"name": "global"})).unwrap();
        assert_eq!(meta.namespace_key(), "");
    }

    #[test]
    fn test_resource_status_optional() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Spec {
            replicas: u32,
        }

        let resource: CustomResource<Spec, Value> = serde_json::from_value(json!({
            "metadata": {"name": "example", "namespace": "default"},
            "spec": {"replicas": 3},
        }))
        .unwrap();

        assert_eq!(resource.spec.replicas, 3);
        assert!(resource.status.is_none());
    }

    #[test]
    fn test_watch_verb_wire_format() {
        let verb: WatchVerb = serde_json::from_value(json!("ADDED")).unwrap();
        assert_eq!(verb, WatchVerb::Added);
        assert_eq!(verb.to_string(), "ADDED");
    }
}
