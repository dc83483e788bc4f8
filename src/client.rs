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

//! The cluster transport seam.
//!
//! The pipeline never talks to a cluster directly; it goes through the
//! [`ClusterClient`] trait. Production wiring uses the kube-backed
//! implementation in [`crate::k8s`], tests substitute scripted fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::config::NamespaceScope;
use crate::resource::{Metadata, RawEvent};

/// Errors surfaced by a cluster transport.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// An API request was rejected or could not be carried out.
    #[error("api request failed: {0}")]
    Api(String),

    /// The watch stream terminated abnormally.
    #[error("watch stream closed: {0}")]
    Closed(String),
}

/// Identifies the resource kind a watch or list call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// The resource kind, e.g. `Example`.
    pub kind: String,
    /// API group prefix of the custom resource, e.g. `operators.example.com`.
    pub prefix: String,
    /// API version within the group, e.g. `v1`.
    pub version: String,
    /// Which namespaces the subscription covers.
    pub scope: NamespaceScope,
}

impl WatchTarget {
    /// Returns the full apiVersion of the target, `<prefix>/<version>`.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.prefix, self.version)
    }
}

/// Handle to an active watch subscription.
///
/// Releasing the handle terminates the subscription promptly; the event
/// stream ends shortly after.
pub trait WatchHandle: Send + Sync {
    /// Terminates the subscription.
    fn close(&self);
}

/// An active watch subscription: the closable handle plus the event stream.
///
/// Stream items are raw events; an `Err` item is the terminating cause of an
/// abnormal closure and is the last item produced. A stream that simply ends
/// was closed cleanly by the cluster.
pub struct WatchSubscription {
    /// Closes the subscription when released.
    pub handle: Box<dyn WatchHandle>,
    /// The raw event stream.
    pub events: BoxStream<'static, Result<RawEvent, TransportError>>,
}

/// Cluster transport consumed by the pipeline.
///
/// Payloads cross this boundary as raw JSON; typed decoding is the
/// decoder's job. Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Subscribes to the watch endpoint for the target kind and scope.
    async fn watch(&self, target: &WatchTarget) -> Result<WatchSubscription, TransportError>;

    /// Lists the current live resources for the target kind and scope.
    async fn list(&self, target: &WatchTarget) -> Result<Vec<Value>, TransportError>;

    /// Writes a new status sub-document to the identified resource.
    async fn update_status(&self, metadata: &Metadata, status: Value)
        -> Result<(), TransportError>;

    /// Returns a human-readable description of the cluster, used for the
    /// startup probe.
    async fn cluster_info(&self) -> Result<String, TransportError>;
}
