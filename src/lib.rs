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

//! kube-operator-rust - a Kubernetes operator framework
//!
//! This library lets applications implement declarative control loops over
//! cluster-resident resources. An application registers a [`Controller`] -
//! user code that reacts to resource lifecycle events - and the framework
//! drives it with a reliable, ordered, fault-tolerant event pipeline:
//!
//! - A watcher ingests raw change events from the cluster and decodes them
//!   into typed [`CustomResource`] values.
//! - A dispatcher partitions events by namespace into bounded FIFO queues,
//!   each drained by its own consumer, so controller code for one namespace
//!   is never invoked concurrently with itself.
//! - Controller-returned statuses are written back to the cluster by a
//!   serialized per-namespace feedback writer.
//! - A reconciler periodically re-scans the live resource set and reinjects
//!   reconcile events to heal drift.
//! - The [`Operator`] supervisor keeps the pipeline alive across transient
//!   cluster failures under a configurable [`RetryPolicy`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod client;
pub mod config;
pub mod consumer;
pub mod controller;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod k8s;
pub mod operator;
pub mod queue;
pub mod reconciler;
pub mod resource;
pub mod retry;
pub mod watcher;

// Re-export commonly used types
pub use action::{
    ActionItem, DecodeFailure, OperatorAction, ReconcileAction, ServerAction, StatusUpdate,
};
pub use client::{ClusterClient, TransportError, WatchHandle, WatchSubscription, WatchTarget};
pub use config::{NamespaceScope, OperatorConfig};
pub use controller::Controller;
pub use error::{OperatorError, Result};
pub use k8s::KubeClusterClient;
pub use operator::{ExitCode, Operator};
pub use resource::{CustomResource, Metadata, RawEvent, WatchVerb};
pub use retry::RetryPolicy;

/// Semantic version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default name for the operator framework.
pub const OPERATOR_NAME: &str = "kube-operator-rust";
