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

//! Per-namespace action consumer.
//!
//! One consumer exists per observed namespace and is the only caller of the
//! user controller for that namespace, which gives controllers strict FIFO
//! dispatch and freedom from self-concurrency. All local failures recover
//! here; only a closed watch stream terminates the loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::action::{
    ActionItem, DecodeFailure, OperatorAction, ReconcileAction, ServerAction, StatusUpdate,
};
use crate::controller::Controller;
use crate::feedback::FeedbackItem;
use crate::operator::ExitCode;
use crate::queue::NsQueue;
use crate::resource::{Metadata, WatchVerb};

/// Drives controller callbacks for a single namespace.
pub struct ActionConsumer<C: Controller> {
    namespace: String,
    controller: Arc<C>,
    queue: Arc<NsQueue<ActionItem<C::Spec, C::Status>>>,
    feedback: Option<mpsc::Sender<FeedbackItem<C::Status>>>,
}

impl<C: Controller> ActionConsumer<C> {
    /// Creates a consumer draining `queue` for `namespace`.
    ///
    /// When `feedback` is `None` no status feedback writer is configured and
    /// controller-returned statuses are discarded.
    pub fn new(
        namespace: impl Into<String>,
        controller: Arc<C>,
        queue: Arc<NsQueue<ActionItem<C::Spec, C::Status>>>,
        feedback: Option<mpsc::Sender<FeedbackItem<C::Status>>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            controller,
            queue,
            feedback,
        }
    }

    /// The consumer's run loop.
    ///
    /// Dispatches queued actions in FIFO order and terminates only when a
    /// closed-stream failure is observed, returning the consumer-exit code.
    pub async fn consume(self) -> ExitCode {
        tracing::debug!(namespace = %self.namespace, "consumer started");
        loop {
            match self.queue.dequeue().await {
                Ok(OperatorAction::Server(action)) => self.dispatch_server(action).await,
                Ok(OperatorAction::Reconcile(action)) => self.dispatch_reconcile(action).await,
                Err(DecodeFailure::ParseResource { verb, cause, raw }) => {
                    tracing::error!(
                        namespace = %self.namespace,
                        verb = %verb,
                        cause = %cause,
                        payload = %raw,
                        "skipping undecodable watch event"
                    );
                }
                Err(DecodeFailure::ParseReconcile { cause, raw }) => {
                    tracing::error!(
                        namespace = %self.namespace,
                        cause = %cause,
                        payload = %raw,
                        "skipping undecodable reconcile item"
                    );
                }
                Err(DecodeFailure::ClosedStream(cause)) => {
                    match &cause {
                        Some(cause) => tracing::warn!(
                            namespace = %self.namespace,
                            cause = %cause,
                            "watch stream closed, consumer exiting"
                        ),
                        None => tracing::info!(
                            namespace = %self.namespace,
                            "watch stream closed cleanly, consumer exiting"
                        ),
                    }
                    if let Some(feedback) = &self.feedback {
                        let _ = feedback.send(FeedbackItem::Terminate).await;
                    }
                    return ExitCode::ConsumerExit;
                }
            }
        }
    }

    async fn dispatch_server(&self, action: ServerAction<C::Spec, C::Status>) {
        match action {
            ServerAction::Added(resource) => {
                let metadata = resource.metadata.clone();
                match self.controller.on_add(resource).await {
                    Ok(status) => self.forward_status(metadata, status).await,
                    Err(e) => self.log_callback_failure(WatchVerb::Added, &metadata, e),
                }
            }
            ServerAction::Modified(resource) => {
                let metadata = resource.metadata.clone();
                match self.controller.on_modify(resource).await {
                    Ok(status) => self.forward_status(metadata, status).await,
                    Err(e) => self.log_callback_failure(WatchVerb::Modified, &metadata, e),
                }
            }
            ServerAction::Deleted(resource) => {
                // The resource is gone; any status would have no target.
                let metadata = resource.metadata.clone();
                if let Err(e) = self.controller.on_delete(resource).await {
                    self.log_callback_failure(WatchVerb::Deleted, &metadata, e);
                }
            }
            ServerAction::Error(payload) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    payload = %payload,
                    "cluster reported a watch error event"
                );
            }
        }
    }

    async fn dispatch_reconcile(&self, action: ReconcileAction<C::Spec, C::Status>) {
        let ReconcileAction { resource } = action;
        let metadata = resource.metadata.clone();
        match self.controller.reconcile(resource).await {
            Ok(status) => self.forward_status(metadata, status).await,
            Err(e) => {
                tracing::error!(
                    namespace = %self.namespace,
                    name = %metadata.name,
                    error = %e,
                    "reconcile callback failed"
                );
            }
        }
    }

    /// Hands a controller-returned status to the feedback writer.
    ///
    /// Fire-and-forward: the send completes before the next action is
    /// dispatched, but the consumer never waits for the cluster write.
    async fn forward_status(&self, metadata: Metadata, status: Option<C::Status>) {
        let Some(status) = status else { return };
        let Some(feedback) = &self.feedback else { return };

        let update = StatusUpdate { metadata, status };
        if feedback.send(FeedbackItem::Update(update)).await.is_err() {
            tracing::warn!(
                namespace = %self.namespace,
                "status feedback writer is gone, dropping update"
            );
        }
    }

    fn log_callback_failure(&self, verb: WatchVerb, metadata: &Metadata, error: anyhow::Error) {
        tracing::error!(
            namespace = %self.namespace,
            verb = %verb,
            name = %metadata.name,
            error = %error,
            "controller callback failed, continuing"
        );
    }
}
