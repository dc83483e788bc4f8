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

//! kube-backed cluster transport.
//!
//! Implements [`ClusterClient`] over dynamically-typed apiserver objects so
//! the pipeline stays generic over the user's resource types. One adapter
//! instance is bound to one watch target; status updates address resources
//! through that target.

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::{
    Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams,
    WatchEvent, WatchParams,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{ClusterClient, TransportError, WatchHandle, WatchSubscription, WatchTarget};
use crate::config::NamespaceScope;
use crate::resource::{Metadata, RawEvent, WatchVerb};

/// Cluster transport over a [`kube::Client`].
pub struct KubeClusterClient {
    client: kube::Client,
    target: WatchTarget,
}

impl KubeClusterClient {
    /// Wraps an existing client, bound to `target`.
    pub fn new(client: kube::Client, target: WatchTarget) -> Self {
        Self { client, target }
    }

    /// Builds a client from the inferred environment (kubeconfig or
    /// in-cluster service account), bound to `target`.
    pub async fn try_default(target: WatchTarget) -> Result<Self, TransportError> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;
        Ok(Self::new(client, target))
    }

    fn api_resource(target: &WatchTarget) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&target.prefix, &target.version, &target.kind);
        ApiResource::from_gvk(&gvk)
    }

    fn api_for(&self, target: &WatchTarget) -> Api<DynamicObject> {
        let ar = Self::api_resource(target);
        match &target.scope {
            NamespaceScope::AllNamespaces => Api::all_with(self.client.clone(), &ar),
            NamespaceScope::CurrentNamespace => {
                Api::default_namespaced_with(self.client.clone(), &ar)
            }
            NamespaceScope::Named(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
        }
    }

    fn status_api(&self, metadata: &Metadata) -> Api<DynamicObject> {
        let ar = Self::api_resource(&self.target);
        match &metadata.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

struct KubeWatchHandle {
    token: CancellationToken,
}

impl WatchHandle for KubeWatchHandle {
    fn close(&self) {
        self.token.cancel();
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn watch(&self, target: &WatchTarget) -> Result<WatchSubscription, TransportError> {
        let api = self.api_for(target);
        let stream = api
            .watch(&WatchParams::default(), "0")
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;

        let token = CancellationToken::new();
        let events = stream
            .take_until(token.clone().cancelled_owned())
            .filter_map(|event| futures::future::ready(convert_event(event)))
            .boxed();

        Ok(WatchSubscription {
            handle: Box::new(KubeWatchHandle { token }),
            events,
        })
    }

    async fn list(&self, target: &WatchTarget) -> Result<Vec<Value>, TransportError> {
        let api = self.api_for(target);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;
        list.items
            .into_iter()
            .map(|obj| serde_json::to_value(&obj).map_err(|e| TransportError::Api(e.to_string())))
            .collect()
    }

    async fn update_status(
        &self,
        metadata: &Metadata,
        status: Value,
    ) -> Result<(), TransportError> {
        let api = self.status_api(metadata);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            &metadata.name,
            &PatchParams::default(),
            &Patch::Merge(patch),
        )
        .await
        .map(|_| ())
        .map_err(|e| TransportError::Api(e.to_string()))
    }

    async fn cluster_info(&self) -> Result<String, TransportError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| TransportError::Api(e.to_string()))?;
        Ok(format!("kubernetes {}", info.git_version))
    }
}

fn convert_event(
    event: Result<WatchEvent<DynamicObject>, kube::Error>,
) -> Option<Result<RawEvent, TransportError>> {
    match event {
        Ok(WatchEvent::Added(obj)) => Some(to_raw(WatchVerb::Added, &obj)),
        Ok(WatchEvent::Modified(obj)) => Some(to_raw(WatchVerb::Modified, &obj)),
        Ok(WatchEvent::Deleted(obj)) => Some(to_raw(WatchVerb::Deleted, &obj)),
        Ok(WatchEvent::Bookmark(_)) => None,
        Ok(WatchEvent::Error(status)) => Some(
            serde_json::to_value(&status)
                .map(|payload| RawEvent {
                    verb: WatchVerb::Error,
                    payload,
                })
                .map_err(|e| TransportError::Api(e.to_string())),
        ),
        Err(e) => Some(Err(TransportError::Closed(e.to_string()))),
    }
}

fn to_raw(verb: WatchVerb, obj: &DynamicObject) -> Result<RawEvent, TransportError> {
    serde_json::to_value(obj)
        .map(|payload| RawEvent { verb, payload })
        .map_err(|e| TransportError::Api(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_added_event() {
        let target = WatchTarget {
            kind: "Example".into(),
            prefix: "operators.example.com".into(),
            version: "v1".into(),
            scope: NamespaceScope::AllNamespaces,
        };
        let ar = KubeClusterClient::api_resource(&target);
        let obj = DynamicObject::new("example", &ar);

        let raw = convert_event(Ok(WatchEvent::Added(obj)))
            .expect("lifecycle events are forwarded")
            .expect("conversion succeeds");
        assert_eq!(raw.verb, WatchVerb::Added);
        assert_eq!(
            raw.payload.pointer("/metadata/name").and_then(Value::as_str),
            Some("example")
        );
    }

    #[test]
    fn test_close_cancels_subscription_token() {
        let token = CancellationToken::new();
        let handle = KubeWatchHandle {
            token: token.clone(),
        };
        handle.close();
        assert!(token.is_cancelled());
    }
}
