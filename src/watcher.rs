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

//! The watch-stream pump.
//!
//! Feeds every raw transport event through the decoder and into the shared
//! action channel. Stream termination is reported as a closed-stream
//! failure on the same channel, never swallowed.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::action::{ActionItem, DecodeFailure, OperatorAction};
use crate::client::TransportError;
use crate::decoder::decode_event;
use crate::resource::RawEvent;

/// Pumps one watch subscription into the action channel.
pub struct Watcher<T, U> {
    events: BoxStream<'static, Result<RawEvent, TransportError>>,
    tx: mpsc::Sender<ActionItem<T, U>>,
    cancel: CancellationToken,
}

impl<T, U> Watcher<T, U>
where
    T: DeserializeOwned + Send + 'static,
    U: DeserializeOwned + Send + 'static + Default,
{
    /// Creates a watcher over an already-open subscription stream.
    pub fn new(
        events: BoxStream<'static, Result<RawEvent, TransportError>>,
        tx: mpsc::Sender<ActionItem<T, U>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { events, tx, cancel }
    }

    /// Runs until the stream terminates or the watcher is cancelled.
    ///
    /// Cancellation is observed promptly and produces no closure marker:
    /// the supervisor initiated it and handles the drain itself.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("watcher cancelled");
                    return;
                }
                event = self.events.next() => match event {
                    Some(Ok(raw)) => {
                        let item = decode_event::<T, U>(raw).map(OperatorAction::Server);
                        if self.tx.send(item).await.is_err() {
                            tracing::debug!("action channel closed, watcher stopping");
                            return;
                        }
                    }
                    Some(Err(cause)) => {
                        tracing::warn!(cause = %cause, "watch stream closed by cluster");
                        let failure = DecodeFailure::ClosedStream(Some(cause));
                        let _ = self.tx.send(Err(failure)).await;
                        return;
                    }
                    None => {
                        tracing::info!("watch stream ended cleanly");
                        let _ = self.tx.send(Err(DecodeFailure::ClosedStream(None))).await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ServerAction;
    use crate::resource::WatchVerb;
    use serde_json::{json, Value};

    fn raw_added(name: &str) -> Result<RawEvent, TransportError> {
        Ok(RawEvent {
            verb: WatchVerb::Added,
            payload: json!({
                "metadata": {"name": name, "namespace": "default"},
                "spec": {},
            }),
        })
    }

    #[tokio::test]
    async fn test_decodes_and_reports_clean_close() {
        let events = futures::stream::iter(vec![
            raw_added("a"),
            Ok(RawEvent {
                verb: WatchVerb::Added,
                payload: json!("not an object"),
            }),
        ])
        .boxed();
        let (tx, mut rx) = mpsc::channel::<ActionItem<Value, Value>>(4);
        let watcher = Watcher::new(events, tx, CancellationToken::new());
        watcher.run().await;

        match rx.recv().await.unwrap() {
            Ok(OperatorAction::Server(ServerAction::Added(r))) => {
                assert_eq!(r.metadata.name, "a");
            }
            other => panic!("expected decoded add, got {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            Err(DecodeFailure::ParseResource { verb: WatchVerb::Added, .. })
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Err(DecodeFailure::ClosedStream(None))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_abnormal_close_carries_cause() {
        let events = futures::stream::iter(vec![Err(TransportError::Closed(
            "connection reset".to_string(),
        ))])
        .boxed();
        let (tx, mut rx) = mpsc::channel::<ActionItem<Value, Value>>(4);
        Watcher::new(events, tx, CancellationToken::new()).run().await;

        match rx.recv().await.unwrap() {
            Err(DecodeFailure::ClosedStream(Some(cause))) => {
                assert!(cause.to_string().contains("connection reset"));
            }
            other => panic!("expected closed stream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_stops_without_marker() {
        let events = futures::stream::pending().boxed();
        let (tx, mut rx) = mpsc::channel::<ActionItem<Value, Value>>(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Watcher::new(events, tx, cancel.clone()).run());

        cancel.cancel();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
