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

//! Routing of decoded events to per-namespace consumers.
//!
//! The dispatcher is the single owner of the namespace → consumer map, so
//! consumer creation needs no synchronization and is trivially idempotent:
//! at most one consumer per namespace ever exists during a pipeline run.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::{item_namespace_key, ActionItem, DecodeFailure};
use crate::client::{ClusterClient, TransportError};
use crate::consumer::ActionConsumer;
use crate::controller::Controller;
use crate::feedback::StatusFeedback;
use crate::operator::ExitCode;
use crate::queue::NsQueue;

/// The dispatcher's side of one running consumer.
struct ConsumerHandle<C: Controller> {
    queue: Arc<NsQueue<ActionItem<C::Spec, C::Status>>>,
    consumer_task: JoinHandle<ExitCode>,
    feedback_task: JoinHandle<()>,
}

impl<C: Controller> ConsumerHandle<C> {
    /// Enqueues an action, observing the queue's backpressure.
    async fn put_action(&self, item: ActionItem<C::Spec, C::Status>) {
        self.queue.enqueue(item).await;
    }
}

/// Routes channel items to the consumer owning their namespace, creating
/// consumers on demand.
pub struct Dispatcher<C: Controller> {
    rx: mpsc::Receiver<ActionItem<C::Spec, C::Status>>,
    controller: Arc<C>,
    client: Arc<dyn ClusterClient>,
    queue_capacity: usize,
    consumers: HashMap<String, ConsumerHandle<C>>,
}

impl<C: Controller> Dispatcher<C> {
    /// Creates a dispatcher reading from the shared action channel.
    pub fn new(
        rx: mpsc::Receiver<ActionItem<C::Spec, C::Status>>,
        controller: Arc<C>,
        client: Arc<dyn ClusterClient>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            rx,
            controller,
            client,
            queue_capacity,
            consumers: HashMap::new(),
        }
    }

    /// Runs until the watch closes or the channel's producers go away.
    ///
    /// A closed-stream failure is broadcast to every consumer; the
    /// dispatcher then awaits all consumer exits and reports the aggregate
    /// as the pipeline's consumer-exit signal. A channel that ends without
    /// a closure marker means the producers were cancelled, which is the
    /// graceful-shutdown path.
    pub async fn run(mut self) -> ExitCode {
        loop {
            let Some(item) = self.rx.recv().await else {
                tracing::debug!("action channel ended, draining consumers");
                return self.drain(None, ExitCode::Success).await;
            };
            match item {
                Err(DecodeFailure::ClosedStream(cause)) => {
                    return self.drain(cause, ExitCode::ConsumerExit).await;
                }
                item => {
                    let namespace = item_namespace_key(&item);
                    self.consumer_for(&namespace).put_action(item).await;
                }
            }
        }
    }

    /// Looks up or lazily creates the consumer for `namespace`.
    fn consumer_for(&mut self, namespace: &str) -> &ConsumerHandle<C> {
        match self.consumers.entry(namespace.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!(namespace = %namespace, "creating consumer");
                let queue = Arc::new(NsQueue::new(namespace, self.queue_capacity));
                let (feedback_tx, feedback) =
                    StatusFeedback::new(namespace, self.client.clone());
                let consumer = ActionConsumer::new(
                    namespace,
                    self.controller.clone(),
                    queue.clone(),
                    Some(feedback_tx),
                );
                entry.insert(ConsumerHandle {
                    queue,
                    consumer_task: tokio::spawn(consumer.consume()),
                    feedback_task: tokio::spawn(feedback.run()),
                })
            }
        }
    }

    /// Broadcasts stream closure to every consumer and awaits their exits.
    async fn drain(self, cause: Option<TransportError>, exit: ExitCode) -> ExitCode {
        for handle in self.consumers.values() {
            handle
                .queue
                .enqueue(Err(DecodeFailure::ClosedStream(cause.clone())))
                .await;
        }

        let mut exit = exit;
        for (namespace, handle) in self.consumers {
            match handle.consumer_task.await {
                Ok(code) => {
                    tracing::debug!(namespace = %namespace, code = ?code, "consumer exited");
                }
                Err(e) => {
                    tracing::error!(namespace = %namespace, error = %e, "consumer task failed");
                    exit = ExitCode::Error;
                }
            }
            if let Err(e) = handle.feedback_task.await {
                tracing::error!(namespace = %namespace, error = %e, "feedback task failed");
                exit = ExitCode::Error;
            }
        }
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{OperatorAction, ServerAction};
    use crate::client::{WatchSubscription, WatchTarget};
    use crate::resource::{CustomResource, Metadata};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Spec {
        message: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Status {
        phase: String,
    }

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Controller for RecordingController {
        type Spec = Spec;
        type Status = Status;

        async fn on_add(
            &self,
            resource: CustomResource<Spec, Status>,
        ) -> anyhow::Result<Option<Status>> {
            self.calls.lock().unwrap().push(format!(
                "add:{}/{}",
                resource.metadata.namespace_key(),
                resource.metadata.name
            ));
            Ok(None)
        }

        async fn on_modify(
            &self,
            resource: CustomResource<Spec, Status>,
        ) -> anyhow::Result<Option<Status>> {
            self.calls.lock().unwrap().push(format!(
                "modify:{}/{}",
                resource.metadata.namespace_key(),
                resource.metadata.name
            ));
            Ok(None)
        }
    }

    struct NullClient;

    #[async_trait]
    impl ClusterClient for NullClient {
        async fn watch(&self, _: &WatchTarget) -> Result<WatchSubscription, TransportError> {
            Err(TransportError::Api("not supported".into()))
        }

        async fn list(&self, _: &WatchTarget) -> Result<Vec<Value>, TransportError> {
            Ok(Vec::new())
        }

        async fn update_status(&self, _: &Metadata, _: Value) -> Result<(), TransportError> {
            Ok(())
        }

        async fn cluster_info(&self) -> Result<String, TransportError> {
            Ok("test".into())
        }
    }

    fn resource(namespace: &str, name: &str) -> CustomResource<Spec, Status> {
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": namespace},
            "spec": {"message": "hello"},
        }))
        .unwrap()
    }

    fn added(namespace: &str, name: &str) -> ActionItem<Spec, Status> {
        Ok(OperatorAction::Server(ServerAction::Added(resource(
            namespace, name,
        ))))
    }

    fn modified(namespace: &str, name: &str) -> ActionItem<Spec, Status> {
        Ok(OperatorAction::Server(ServerAction::Modified(resource(
            namespace, name,
        ))))
    }

    #[tokio::test]
    async fn test_routes_namespaces_to_distinct_consumers_in_order() {
        let controller = Arc::new(RecordingController::default());
        let (tx, rx) = mpsc::channel(1);
        let dispatcher =
            Dispatcher::new(rx, controller.clone(), Arc::new(NullClient), 8);
        let dispatcher_task = tokio::spawn(dispatcher.run());

        tx.send(added("n1", "a")).await.unwrap();
        tx.send(added("n2", "b")).await.unwrap();
        tx.send(modified("n1", "a")).await.unwrap();
        tx.send(Err(DecodeFailure::ClosedStream(None))).await.unwrap();
        drop(tx);

        let exit = dispatcher_task.await.unwrap();
        assert_eq!(exit, ExitCode::ConsumerExit);

        let calls = controller.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls.contains(&"add:n2/b".to_string()));

        // Per-namespace FIFO: n1's add precedes n1's modify.
        let n1: Vec<_> = calls.iter().filter(|c| c.contains(":n1/")).collect();
        assert_eq!(n1, vec!["add:n1/a", "modify:n1/a"]);
    }

    #[tokio::test]
    async fn test_channel_end_without_marker_is_graceful() {
        let controller = Arc::new(RecordingController::default());
        let (tx, rx) = mpsc::channel::<ActionItem<Spec, Status>>(1);
        let dispatcher =
            Dispatcher::new(rx, controller.clone(), Arc::new(NullClient), 8);
        let dispatcher_task = tokio::spawn(dispatcher.run());

        tx.send(added("n1", "a")).await.unwrap();
        drop(tx);

        let exit = dispatcher_task.await.unwrap();
        assert_eq!(exit, ExitCode::Success);
        assert_eq!(*controller.calls.lock().unwrap(), vec!["add:n1/a"]);
    }

    #[tokio::test]
    async fn test_cluster_scoped_resources_share_one_consumer() {
        let controller = Arc::new(RecordingController::default());
        let (tx, rx) = mpsc::channel(1);
        let dispatcher =
            Dispatcher::new(rx, controller.clone(), Arc::new(NullClient), 8);
        let dispatcher_task = tokio::spawn(dispatcher.run());

        let cluster_scoped: ActionItem<Spec, Status> =
            Ok(OperatorAction::Server(ServerAction::Added(
                serde_json::from_value(json!({
                    "metadata": {"name": "global"},
                    "spec": {"message": "hello"},
                }))
                .unwrap(),
            )));
        tx.send(cluster_scoped).await.unwrap();
        tx.send(Err(DecodeFailure::ClosedStream(None))).await.unwrap();
        drop(tx);

        assert_eq!(dispatcher_task.await.unwrap(), ExitCode::ConsumerExit);
        assert_eq!(*controller.calls.lock().unwrap(), vec!["add:/global"]);
    }
}
