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

//! Periodic drift healing.
//!
//! On every tick the reconciler lists the live resource set and injects a
//! reconcile action per resource onto the same channel the watcher feeds,
//! so reconciles interleave with live events instead of racing them and
//! per-namespace FIFO ordering is preserved.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::action::{ActionItem, OperatorAction};
use crate::client::{ClusterClient, WatchTarget};
use crate::decoder::decode_reconcile;

/// Periodically re-scans the observed resource set.
pub struct Reconciler<T, U> {
    client: Arc<dyn ClusterClient>,
    target: WatchTarget,
    period: Duration,
    tx: mpsc::Sender<ActionItem<T, U>>,
    cancel: CancellationToken,
    _marker: PhantomData<fn() -> (T, U)>,
}

impl<T, U> Reconciler<T, U>
where
    T: DeserializeOwned + Send + 'static,
    U: DeserializeOwned + Send + 'static + Default,
{
    /// Creates a reconciler injecting into the shared action channel.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        target: WatchTarget,
        period: Duration,
        tx: mpsc::Sender<ActionItem<T, U>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            target,
            period,
            tx,
            cancel,
            _marker: PhantomData,
        }
    }

    /// Runs the ticker until cancelled or the pipeline goes away.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // An interval fires immediately; the first reconcile belongs one
        // full period after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("reconciler cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if !self.tick().await {
                        tracing::debug!("action channel closed, reconciler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One reconcile pass. Returns false when the action channel is gone.
    async fn tick(&self) -> bool {
        let items = match self.client.list(&self.target).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    kind = %self.target.kind,
                    error = %e,
                    "failed to list resources, skipping reconcile tick"
                );
                return true;
            }
        };

        tracing::debug!(kind = %self.target.kind, count = items.len(), "reconciling live resources");
        for payload in items {
            let item = decode_reconcile::<T, U>(payload).map(OperatorAction::Reconcile);
            if self.tx.send(item).await.is_err() {
                return false;
            }
        }
        true
    }
}
