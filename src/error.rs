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

//! Operator error abstractions.

use thiserror::Error;

use crate::client::TransportError;

/// Errors that terminate an operator run.
///
/// Everything else in the pipeline recovers locally: decode failures,
/// controller callback failures, reconcile list failures and status write
/// failures are logged where they occur and the pipeline continues.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// The configuration failed validation before the pipeline started.
    #[error("invalid operator configuration: {reason}")]
    InvalidConfig {
        /// A description of the violated rule.
        reason: String,
    },

    /// The controller's `on_init` hook failed.
    #[error("controller initialization failed: {source}")]
    InitFailed {
        /// The error returned by the controller.
        #[source]
        source: anyhow::Error,
    },

    /// The cluster transport failed before the pipeline was running.
    #[error("cluster transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for operator lifecycle operations.
pub type Result<T> = std::result::Result<T, OperatorError>;
