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

//! The controller callback surface.
//!
//! This module defines the trait user code implements to react to resource
//! lifecycle events. All methods are invoked from framework-managed tasks;
//! for a single namespace they are never invoked concurrently with
//! themselves, so per-namespace state needs no synchronization. Controllers
//! observing state across namespaces must treat that state as shared.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::resource::CustomResource;

/// User-provided reconciliation logic for one resource kind.
///
/// A controller watches the shared state of the cluster and makes changes
/// attempting to move the current state towards the desired state. Returned
/// errors are logged with the offending action and the pipeline continues;
/// a failing callback never terminates its consumer.
///
/// All event callbacks have default no-op implementations, so a controller
/// only implements the hooks it cares about.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use kube_operator_rust::{Controller, CustomResource};
///
/// struct BookController;
///
/// #[async_trait]
/// impl Controller for BookController {
///     type Spec = BookSpec;
///     type Status = BookStatus;
///
///     async fn on_add(
///         &self,
///         resource: CustomResource<BookSpec, BookStatus>,
///     ) -> anyhow::Result<Option<BookStatus>> {
///         tracing::info!(name = %resource.metadata.name, "shelving book");
///         Ok(Some(BookStatus { shelved: true }))
///     }
/// }
/// ```
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// The desired-state document of the watched kind.
    type Spec: DeserializeOwned + Send + Sync + 'static;

    /// The observed-state document the operator reports back.
    type Status: Serialize + DeserializeOwned + Default + Send + Sync + 'static;

    /// Called exactly once, before any event is dispatched.
    ///
    /// A returned error is fatal to the pipeline run.
    async fn on_init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when a resource is created.
    ///
    /// A returned status is written back to the cluster.
    async fn on_add(
        &self,
        resource: CustomResource<Self::Spec, Self::Status>,
    ) -> anyhow::Result<Option<Self::Status>> {
        let _ = resource;
        Ok(None)
    }

    /// Called when a resource is updated.
    ///
    /// A returned status is written back to the cluster.
    async fn on_modify(
        &self,
        resource: CustomResource<Self::Spec, Self::Status>,
    ) -> anyhow::Result<Option<Self::Status>> {
        let _ = resource;
        Ok(None)
    }

    /// Called when a resource is removed. Any status is discarded because
    /// the resource is gone.
    async fn on_delete(
        &self,
        resource: CustomResource<Self::Spec, Self::Status>,
    ) -> anyhow::Result<()> {
        let _ = resource;
        Ok(())
    }

    /// Called by the reconciler for every live resource, on a timer,
    /// independent of watch events.
    ///
    /// A returned status is written back to the cluster.
    async fn reconcile(
        &self,
        resource: CustomResource<Self::Spec, Self::Status>,
    ) -> anyhow::Result<Option<Self::Status>> {
        let _ = resource;
        Ok(None)
    }
}
