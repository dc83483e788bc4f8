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

//! Actions flowing through the pipeline.
//!
//! Decoded watch events and reconcile injections travel the same channel as
//! [`ActionItem`]s: either a well-formed [`OperatorAction`] or a
//! [`DecodeFailure`]. Both carry enough information for the dispatcher to
//! route them to the right per-namespace consumer.

use serde_json::Value;

use crate::client::TransportError;
use crate::resource::{CustomResource, Metadata, WatchVerb};

/// A decoded cluster watch event.
///
/// The variants encode the invariant that every lifecycle verb carries a
/// resource, while `Error` carries only the raw status payload the cluster
/// reported.
#[derive(Debug, Clone)]
pub enum ServerAction<T, U> {
    /// A resource was created.
    Added(CustomResource<T, U>),
    /// A resource was updated.
    Modified(CustomResource<T, U>),
    /// A resource was removed.
    Deleted(CustomResource<T, U>),
    /// The cluster reported an in-stream error; no resource is attached.
    Error(Value),
}

impl<T, U> ServerAction<T, U> {
    /// The watch verb this action was decoded from.
    pub fn verb(&self) -> WatchVerb {
        match self {
            ServerAction::Added(_) => WatchVerb::Added,
            ServerAction::Modified(_) => WatchVerb::Modified,
            ServerAction::Deleted(_) => WatchVerb::Deleted,
            ServerAction::Error(_) => WatchVerb::Error,
        }
    }

    /// The resource carried by this action, if any.
    pub fn resource(&self) -> Option<&CustomResource<T, U>> {
        match self {
            ServerAction::Added(r) | ServerAction::Modified(r) | ServerAction::Deleted(r) => {
                Some(r)
            }
            ServerAction::Error(_) => None,
        }
    }
}

/// A synthetic action injected by the reconciler for a live resource.
#[derive(Debug, Clone)]
pub struct ReconcileAction<T, U> {
    /// The live resource as returned by the cluster list.
    pub resource: CustomResource<T, U>,
}

/// Any action the consumer dispatches to the controller.
///
/// Single-use: dropped after dispatch.
#[derive(Debug, Clone)]
pub enum OperatorAction<T, U> {
    /// A decoded live watch event.
    Server(ServerAction<T, U>),
    /// A reconciler-injected re-examination of a live resource.
    Reconcile(ReconcileAction<T, U>),
}

impl<T, U> OperatorAction<T, U> {
    /// Returns the namespace routing key for this action.
    pub fn namespace_key(&self) -> String {
        match self {
            OperatorAction::Server(ServerAction::Error(payload)) => payload_namespace(payload),
            OperatorAction::Server(action) => action
                .resource()
                .map(|r| r.metadata.namespace_key())
                .unwrap_or_default(),
            OperatorAction::Reconcile(action) => action.resource.metadata.namespace_key(),
        }
    }
}

/// A failure produced instead of a well-formed action.
///
/// Failures travel the same channel as actions so that per-namespace
/// ordering is preserved and nothing is dropped silently.
#[derive(Debug, Clone)]
pub enum DecodeFailure {
    /// The cluster closed the watch stream. The cause is `None` for a clean
    /// close. Fatal to the pipeline run.
    ClosedStream(Option<TransportError>),

    /// A single watch event payload could not be decoded. Logged and
    /// skipped by the consumer.
    ParseResource {
        /// The verb of the offending event.
        verb: WatchVerb,
        /// The decode error message.
        cause: String,
        /// The offending payload.
        raw: Value,
    },

    /// A reconcile list item could not be decoded. Logged and skipped.
    ParseReconcile {
        /// The decode error message.
        cause: String,
        /// The offending payload.
        raw: Value,
    },
}

impl DecodeFailure {
    /// Returns the namespace routing key, best-effort for parse failures.
    ///
    /// `ClosedStream` has no single target; the dispatcher broadcasts it.
    pub fn namespace_key(&self) -> String {
        match self {
            DecodeFailure::ClosedStream(_) => String::new(),
            DecodeFailure::ParseResource { raw, .. } | DecodeFailure::ParseReconcile { raw, .. } => {
                payload_namespace(raw)
            }
        }
    }
}

/// A controller-produced status update awaiting its write to the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate<U> {
    /// Identifies the target resource.
    pub metadata: Metadata,
    /// The new status to report.
    pub status: U,
}

/// What flows on the shared action channel: a decoded action or a failure.
pub type ActionItem<T, U> = std::result::Result<OperatorAction<T, U>, DecodeFailure>;

/// Returns the namespace routing key for any channel item.
pub fn item_namespace_key<T, U>(item: &ActionItem<T, U>) -> String {
    match item {
        Ok(action) => action.namespace_key(),
        Err(failure) => failure.namespace_key(),
    }
}

fn payload_namespace(payload: &Value) -> String {
    payload
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
