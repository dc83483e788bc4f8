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

//! Configuration structures for the operator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::WatchTarget;
use crate::error::OperatorError;
use crate::retry::RetryPolicy;

/// Which namespaces an operator observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamespaceScope {
    /// Watch the kind across every namespace.
    AllNamespaces,
    /// Watch only the namespace the operator itself runs in.
    CurrentNamespace,
    /// Watch one explicitly named namespace.
    Named(String),
}

/// Configuration for a single operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// The resource kind this operator is responsible for.
    pub kind: String,

    /// Which namespaces to observe.
    pub namespace_scope: NamespaceScope,

    /// API group prefix for the custom resource, e.g. `operators.example.com`.
    /// Must be non-empty.
    pub prefix: String,

    /// API version of the custom resource within its group.
    #[serde(default = "default_version")]
    pub version: String,

    /// How often the reconciler re-scans the live resource set.
    #[serde(default = "default_reconcile_period", with = "humantime_serde")]
    pub reconcile_period: Duration,

    /// Capacity of each per-namespace action queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Whether to probe the cluster before starting the pipeline.
    #[serde(default = "default_check_kubernetes")]
    pub check_kubernetes_on_startup: bool,

    /// Restart policy applied when a pipeline run terminates.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_reconcile_period() -> Duration {
    Duration::from_secs(60)
}

fn default_queue_capacity() -> usize {
    10
}

fn default_check_kubernetes() -> bool {
    true
}

impl OperatorConfig {
    /// Creates a configuration with defaults for everything but the
    /// required fields.
    pub fn new(
        kind: impl Into<String>,
        prefix: impl Into<String>,
        namespace_scope: NamespaceScope,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace_scope,
            prefix: prefix.into(),
            version: default_version(),
            reconcile_period: default_reconcile_period(),
            queue_capacity: default_queue_capacity(),
            check_kubernetes_on_startup: default_check_kubernetes(),
            retry: RetryPolicy::default(),
        }
    }

    /// Validates the configuration, producing a descriptive error for the
    /// first violated rule.
    pub fn validate(&self) -> Result<(), OperatorError> {
        if self.kind.trim().is_empty() {
            return Err(invalid("kind must be set"));
        }
        if self.prefix.trim().is_empty() {
            return Err(invalid("prefix must be set and non-empty"));
        }
        if self.version.trim().is_empty() {
            return Err(invalid("version must be non-empty"));
        }
        if let NamespaceScope::Named(name) = &self.namespace_scope {
            if name.trim().is_empty() {
                return Err(invalid("named namespace scope must not be empty"));
            }
        }
        if self.reconcile_period.is_zero() {
            return Err(invalid("reconcilePeriod must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queueCapacity must be greater than zero"));
        }
        self.retry.validate()?;
        Ok(())
    }

    /// The watch/list target described by this configuration.
    pub fn target(&self) -> WatchTarget {
        WatchTarget {
            kind: self.kind.clone(),
            prefix: self.prefix.clone(),
            version: self.version.clone(),
            scope: self.namespace_scope.clone(),
        }
    }
}

fn invalid(reason: &str) -> OperatorError {
    OperatorError::InvalidConfig {
        reason: reason.to_string(),
    }
}
