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

//! Bounded per-namespace action queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// A bounded FIFO of pending actions for one namespace.
///
/// Single producer (the dispatcher), single consumer (the owning action
/// consumer). `enqueue` suspends while the queue is at capacity, so
/// backpressure is visible to the producer: the call does not return until
/// the action has been enqueued exactly once.
pub struct NsQueue<A> {
    namespace: String,
    capacity: usize,
    items: Mutex<VecDeque<A>>,
    not_empty: Notify,
    not_full: Notify,
}

impl<A> NsQueue<A> {
    /// Creates a queue for `namespace` bounded at `capacity` items.
    pub fn new(namespace: impl Into<String>, capacity: usize) -> Self {
        Self {
            namespace: namespace.into(),
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    /// The namespace this queue serves.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Appends an action, suspending while the queue is full.
    pub async fn enqueue(&self, action: A) {
        let mut action = Some(action);
        loop {
            // Arm the wakeup before checking capacity so a dequeue between
            // the check and the await cannot be missed.
            let has_room = self.not_full.notified();
            {
                let mut items = self.items.lock().expect("queue lock poisoned");
                if items.len() < self.capacity {
                    items.push_back(action.take().expect("action consumed twice"));
                    drop(items);
                    self.not_empty.notify_one();
                    return;
                }
            }
            tracing::debug!(
                namespace = %self.namespace,
                capacity = self.capacity,
                "queue full, waiting for consumer to make progress"
            );
            has_room.await;
        }
    }

    /// Removes and returns the oldest action, suspending while empty.
    pub async fn dequeue(&self) -> A {
        loop {
            let has_items = self.not_empty.notified();
            {
                let mut items = self.items.lock().expect("queue lock poisoned");
                if let Some(action) = items.pop_front() {
                    drop(items);
                    self.not_full.notify_one();
                    return action;
                }
            }
            has_items.await;
        }
    }

    /// Current number of queued actions.
    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any action is pending.
    pub fn non_empty(&self) -> bool {
        !self.is_empty()
    }
}
