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

//! Serialized status write-back.
//!
//! Each per-namespace consumer owns one [`StatusFeedback`] writer. Updates
//! are written to the cluster one at a time in submission order; the
//! consumer does not wait for cluster confirmation before advancing.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::action::StatusUpdate;
use crate::client::ClusterClient;

/// Buffer between a consumer and its feedback writer. A tuning knob, not a
/// contract.
const FEEDBACK_BUFFER: usize = 16;

/// An item submitted to a feedback writer.
#[derive(Debug)]
pub enum FeedbackItem<U> {
    /// A status update to write to the cluster.
    Update(StatusUpdate<U>),
    /// Stop the writer after draining nothing further.
    Terminate,
}

/// Single-producer single-consumer writer of controller-produced status
/// updates.
pub struct StatusFeedback<U> {
    namespace: String,
    client: Arc<dyn ClusterClient>,
    rx: mpsc::Receiver<FeedbackItem<U>>,
}

impl<U> StatusFeedback<U>
where
    U: Serialize + Send + 'static,
{
    /// Creates a writer for `namespace` along with its submission handle.
    pub fn new(
        namespace: impl Into<String>,
        client: Arc<dyn ClusterClient>,
    ) -> (mpsc::Sender<FeedbackItem<U>>, Self) {
        let (tx, rx) = mpsc::channel(FEEDBACK_BUFFER);
        let writer = Self {
            namespace: namespace.into(),
            client,
            rx,
        };
        (tx, writer)
    }

    /// Runs the writer until a termination marker arrives or the submitting
    /// consumer goes away.
    ///
    /// Transient write failures are logged and the next item is attempted.
    pub async fn run(mut self) {
        while let Some(item) = self.rx.recv().await {
            let update = match item {
                FeedbackItem::Update(update) => update,
                FeedbackItem::Terminate => break,
            };

            let status = match serde_json::to_value(&update.status) {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!(
                        namespace = %self.namespace,
                        name = %update.metadata.name,
                        error = %e,
                        "failed to serialize status update"
                    );
                    continue;
                }
            };

            if let Err(e) = self.client.update_status(&update.metadata, status).await {
                tracing::error!(
                    namespace = %self.namespace,
                    name = %update.metadata.name,
                    error = %e,
                    "status update rejected by cluster"
                );
            }
        }
        tracing::debug!(namespace = %self.namespace, "status feedback writer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{TransportError, WatchSubscription, WatchTarget};
    use crate::resource::Metadata;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct RecordingWriter {
        writes: Mutex<Vec<(String, Value)>>,
        fail_next: AtomicBool,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_next: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ClusterClient for RecordingWriter {
        async fn watch(&self, _: &WatchTarget) -> Result<WatchSubscription, TransportError> {
            Err(TransportError::Api("watch not supported in test".into()))
        }

        async fn list(&self, _: &WatchTarget) -> Result<Vec<Value>, TransportError> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            metadata: &Metadata,
            status: Value,
        ) -> Result<(), TransportError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TransportError::Api("conflict".into()));
            }
            self.writes
                .lock()
                .unwrap()
                .push((metadata.name.clone(), status));
            Ok(())
        }

        async fn cluster_info(&self) -> Result<String, TransportError> {
            Ok("test".into())
        }
    }

    fn metadata(name: &str) -> Metadata {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "namespace": "default",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_writes_in_submission_order_until_terminated() {
        let client = Arc::new(RecordingWriter::new());
        let (tx, writer) = StatusFeedback::<Value>::new("default", client.clone());

        tx.send(FeedbackItem::Update(StatusUpdate {
            metadata: metadata("a"),
            status: serde_json::json!({"phase": "ready"}),
        }))
        .await
        .unwrap();
        tx.send(FeedbackItem::Update(StatusUpdate {
            metadata: metadata("b"),
            status: serde_json::json!({"phase": "updated"}),
        }))
        .await
        .unwrap();
        tx.send(FeedbackItem::Terminate).await.unwrap();

        writer.run().await;

        let writes = client.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, "a");
        assert_eq!(writes[1].0, "b");
    }

    #[tokio::test]
    async fn test_transient_write_failure_does_not_stop_writer() {
        let client = Arc::new(RecordingWriter::new());
        client.fail_next.store(true, Ordering::SeqCst);
        let (tx, writer) = StatusFeedback::<Value>::new("default", client.clone());

        tx.send(FeedbackItem::Update(StatusUpdate {
            metadata: metadata("a"),
            status: serde_json::json!({"phase": "lost"}),
        }))
        .await
        .unwrap();
        tx.send(FeedbackItem::Update(StatusUpdate {
            metadata: metadata("b"),
            status: serde_json::json!({"phase": "ready"}),
        }))
        .await
        .unwrap();
        drop(tx);

        writer.run().await;

        let writes = client.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "b");
    }
}
