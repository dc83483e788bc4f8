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

//! The operator supervisor - the top-level lifecycle.
//!
//! Wires the pipeline (watcher, reconciler, dispatcher, per-namespace
//! consumers), races the consumer-exit signal against the reconciler exit,
//! and translates terminations into restart decisions via a retry policy.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::action::ActionItem;
use crate::client::{ClusterClient, WatchSubscription};
use crate::config::OperatorConfig;
use crate::controller::Controller;
use crate::dispatcher::Dispatcher;
use crate::error::{OperatorError, Result};
use crate::reconciler::Reconciler;
use crate::retry::RetryPolicy;
use crate::watcher::Watcher;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The operator was shut down on request.
    Success,
    /// The cluster closed the watch and all consumers drained.
    ConsumerExit,
    /// A pipeline task failed unrecoverably.
    Error,
}

impl ExitCode {
    /// The conventional process exit code for this outcome.
    pub fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::ConsumerExit => 2,
            ExitCode::Error => 1,
        }
    }
}

/// Runs one controller against one resource kind.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use kube_operator_rust::{KubeClusterClient, NamespaceScope, Operator, OperatorConfig};
/// # use kube_operator_rust::Controller;
/// # struct BookController;
/// # #[async_trait::async_trait]
/// # impl Controller for BookController {
/// #     type Spec = serde_json::Value;
/// #     type Status = serde_json::Value;
/// # }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = OperatorConfig::new("Book", "operators.example.com", NamespaceScope::AllNamespaces);
///     let client = Arc::new(KubeClusterClient::try_default(config.target()).await?);
///     let operator = Operator::new(config.clone(), BookController, client);
///     let exit = operator.run_with_restart(config.retry).await?;
///     std::process::exit(exit.as_i32());
/// }
/// ```
pub struct Operator<C: Controller> {
    config: OperatorConfig,
    controller: Arc<C>,
    client: Arc<dyn ClusterClient>,
    shutdown: CancellationToken,
}

impl<C: Controller> Operator<C> {
    /// Creates an operator from its configuration, controller and transport.
    pub fn new(config: OperatorConfig, controller: C, client: Arc<dyn ClusterClient>) -> Self {
        Self {
            config,
            controller: Arc::new(controller),
            client,
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the shutdown cancellation token.
    ///
    /// Cancelling it gracefully stops the pipeline and suppresses any
    /// pending restart.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Initiates a graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("initiating graceful shutdown");
        self.shutdown.cancel();
    }

    /// Runs a single pipeline attempt.
    ///
    /// Returns the exit code of the run, or an error for the fatal
    /// pre-pipeline failures: invalid configuration, a failed `on_init`, or
    /// a transport that cannot subscribe.
    pub async fn run(&self) -> Result<ExitCode> {
        self.config.validate()?;
        self.run_attempt().await
    }

    /// Runs the pipeline under a restart policy.
    ///
    /// Every termination except a requested shutdown consults the policy;
    /// exhaustion returns the final attempt's outcome verbatim.
    pub async fn run_with_restart(&self, mut policy: RetryPolicy) -> Result<ExitCode> {
        self.config.validate()?;
        policy.validate()?;

        loop {
            let outcome = self.run_attempt().await;
            if matches!(outcome, Ok(ExitCode::Success)) {
                return outcome;
            }
            if self.shutdown.is_cancelled() {
                return outcome;
            }

            match policy.next_attempt() {
                Some((delay, next)) => {
                    match &outcome {
                        Ok(code) => tracing::warn!(
                            code = ?code,
                            delay = ?delay,
                            "pipeline terminated, restarting"
                        ),
                        Err(e) => tracing::warn!(
                            error = %e,
                            delay = ?delay,
                            "pipeline failed, restarting"
                        ),
                    }
                    tokio::time::sleep(delay).await;
                    policy = next;
                }
                None => {
                    tracing::warn!("restart policy exhausted");
                    return outcome;
                }
            }
        }
    }

    async fn run_attempt(&self) -> Result<ExitCode> {
        if self.config.check_kubernetes_on_startup {
            match self.client.cluster_info().await {
                Ok(info) => tracing::info!(cluster = %info, "cluster probe succeeded"),
                Err(e) => tracing::warn!(error = %e, "cluster probe failed, starting anyway"),
            }
        }

        self.controller
            .on_init()
            .await
            .map_err(|source| OperatorError::InitFailed { source })?;

        let target = self.config.target();
        tracing::info!(
            kind = %target.kind,
            api_version = %target.api_version(),
            "controller initialized, starting pipeline"
        );
        let WatchSubscription { handle, events } = self.client.watch(&target).await?;

        let cancel = self.shutdown.child_token();
        // Size-1 rendezvous between producers and the dispatcher: one action
        // at a time, with backpressure on the watcher and reconciler.
        let (tx, rx) = mpsc::channel::<ActionItem<C::Spec, C::Status>>(1);

        let watcher_task =
            tokio::spawn(Watcher::new(events, tx.clone(), cancel.child_token()).run());
        let mut reconciler_task = tokio::spawn(
            Reconciler::new(
                self.client.clone(),
                target,
                self.config.reconcile_period,
                tx,
                cancel.child_token(),
            )
            .run(),
        );
        let mut dispatcher_task = tokio::spawn(
            Dispatcher::new(
                rx,
                self.controller.clone(),
                self.client.clone(),
                self.config.queue_capacity,
            )
            .run(),
        );

        let mut dispatcher_won = false;
        let exit = tokio::select! {
            res = &mut dispatcher_task => {
                dispatcher_won = true;
                join_exit(res)
            }
            res = &mut reconciler_task => match res {
                Ok(()) => ExitCode::Success,
                Err(e) => {
                    tracing::error!(error = %e, "reconciler task failed");
                    ExitCode::Error
                }
            },
        };

        // Release the subscription and stop the children on every exit path.
        handle.close();
        cancel.cancel();

        if dispatcher_won {
            if let Err(e) = reconciler_task.await {
                tracing::error!(error = %e, "reconciler task failed during drain");
            }
        } else {
            match dispatcher_task.await {
                Ok(code) => tracing::debug!(code = ?code, "dispatcher drained"),
                Err(e) => tracing::error!(error = %e, "dispatcher task failed during drain"),
            }
        }
        if let Err(e) = watcher_task.await {
            tracing::error!(error = %e, "watcher task failed during drain");
        }

        tracing::info!(code = ?exit, "pipeline run finished");
        Ok(exit)
    }
}

fn join_exit(res: std::result::Result<ExitCode, JoinError>) -> ExitCode {
    match res {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "dispatcher task failed");
            ExitCode::Error
        }
    }
}
