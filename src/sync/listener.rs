// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::metric::Metrics;
use crate::probe;
use crate::registry::SensorRegistry;
use crate::sensor::{DataSubmitted, SensorPatch};
use crate::store::SensorStore;
use crate::sync::snapshot;
use crate::Result;

/// Default capacity of the channel between a source and the reducer.
const DEFAULT_BUFFER: usize = 64;

/// A push notification about the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorNotification {
    /// A new reading was submitted for a sensor.
    DataSubmitted(DataSubmitted),
    /// The source lost its subscription and established a new one. Events
    /// emitted in between were not delivered.
    Resubscribed,
}

/// Something that pushes [`SensorNotification`]s, like a websocket log
/// subscription.
///
/// Dropping the future returned by [`run`](NotificationSource::run) must
/// release the underlying subscription.
#[async_trait::async_trait]
pub trait NotificationSource: Send + 'static {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Pushes notifications into `sink` until the source ends or `sink` is
    /// closed.
    async fn run(
        self: Box<Self>,
        sink: mpsc::Sender<SensorNotification>,
    ) -> Result<()>;
}

/// What the reducer did with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The sensor's reading was replaced.
    Applied {
        /// The patched sensor.
        sensor_id: u64,
    },
    /// No sensor with this id is in the list; nothing changed.
    UnknownSensor {
        /// The id from the notification.
        sensor_id: u64,
    },
    /// Nothing changed, but the list may have missed events and should be
    /// re-read from the registry.
    ResyncRequested,
}

/// Applies one notification to the store.
///
/// `now` becomes the record's `lastUpdated`, in unix seconds.
pub fn apply_notification<S: SensorStore>(
    store: &S,
    notification: SensorNotification,
    now: u64,
) -> PatchOutcome {
    match notification {
        SensorNotification::DataSubmitted(event) => {
            let patch = SensorPatch {
                last_pm25_value: event.pm25_value,
                last_updated: now,
            };
            if store.patch(event.sensor_id, patch) {
                PatchOutcome::Applied {
                    sensor_id: event.sensor_id,
                }
            } else {
                PatchOutcome::UnknownSensor {
                    sensor_id: event.sensor_id,
                }
            }
        }
        SensorNotification::Resubscribed => PatchOutcome::ResyncRequested,
    }
}

/// Wall-clock unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Re-reads the registry when a source reports a gap.
struct Resync {
    registry: Arc<dyn SensorRegistry>,
    metrics: Metrics,
}

/// Builder for the background task that feeds a [`NotificationSource`] into
/// the store.
pub struct PatchListener<S> {
    store: S,
    metrics: Option<Metrics>,
    resync: Option<Resync>,
    clock: fn() -> u64,
    buffer: usize,
}

impl<S: fmt::Debug> fmt::Debug for PatchListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchListener")
            .field("store", &self.store)
            .field("resync", &self.resync.is_some())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl<S: SensorStore> PatchListener<S> {
    /// A listener that patches `store`, stamping records with [`unix_now`].
    pub fn new(store: S) -> Self {
        Self {
            store,
            metrics: None,
            resync: None,
            clock: unix_now,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Count applied and dropped patches.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reload the whole list from `registry` whenever the source
    /// resubscribes.
    pub fn with_resync(
        mut self,
        registry: Arc<dyn SensorRegistry>,
        metrics: Metrics,
    ) -> Self {
        self.resync = Some(Resync { registry, metrics });
        self
    }

    /// Use another clock for `lastUpdated`.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Starts listening. The subscription lives as long as the returned
    /// handle.
    pub fn spawn(self, source: Box<dyn NotificationSource>) -> ListenerHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (processed_tx, processed_rx) = watch::channel(0);
        let task = tokio::spawn(self.run(source, cancel_rx, processed_tx));
        ListenerHandle {
            cancel: Some(cancel_tx),
            task: Some(task),
            processed: processed_rx,
        }
    }

    #[tracing::instrument(skip_all, fields(source = source.name()))]
    async fn run(
        self,
        source: Box<dyn NotificationSource>,
        mut cancel: oneshot::Receiver<()>,
        processed: watch::Sender<u64>,
    ) {
        let (sink, mut notifications) = mpsc::channel(self.buffer);
        let source_task = source.run(sink);
        tokio::pin!(source_task);
        let mut source_done = false;
        let mut count = 0u64;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Subscription,
            started = true,
        );
        loop {
            tokio::select! {
                _ = &mut cancel => {
                    tracing::debug!("Listener cancelled");
                    break;
                }
                result = &mut source_task, if !source_done => {
                    source_done = true;
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Notification source failed");
                    }
                }
                next = notifications.recv() => {
                    let Some(notification) = next else {
                        // the source is done and everything is drained.
                        break;
                    };
                    self.reduce(notification).await;
                    count += 1;
                    let _ = processed.send(count);
                }
            }
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Subscription,
            released = true,
            processed = count,
        );
    }

    async fn reduce(&self, notification: SensorNotification) {
        match apply_notification(&self.store, notification, (self.clock)()) {
            PatchOutcome::Applied { sensor_id } => {
                if let Some(metrics) = &self.metrics {
                    metrics.patches_applied.inc();
                }
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Patch,
                    sensor_id,
                );
            }
            PatchOutcome::UnknownSensor { sensor_id } => {
                if let Some(metrics) = &self.metrics {
                    metrics.patches_dropped.inc();
                }
                tracing::debug!(sensor_id, "Ignoring event for unknown sensor");
            }
            PatchOutcome::ResyncRequested => self.resync().await,
        }
    }

    async fn resync(&self) {
        let Some(resync) = &self.resync else {
            tracing::warn!("Source resubscribed, events may have been missed");
            return;
        };
        tracing::info!("Source resubscribed, reloading the sensor registry");
        if let Err(e) =
            snapshot::refresh(resync.registry.as_ref(), &self.store, &resync.metrics)
                .await
        {
            tracing::warn!(error = %e, "Reload after resubscribe failed");
        }
    }
}

/// Owns a running listener. Dropping the handle (or calling
/// [`unsubscribe`](ListenerHandle::unsubscribe)) cancels it.
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    processed: watch::Receiver<u64>,
}

impl ListenerHandle {
    /// Number of notifications handled so far.
    pub fn processed(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Waits until at least `count` notifications were handled, or the
    /// listener stopped.
    pub async fn wait_for_processed(&mut self, count: u64) {
        while *self.processed.borrow() < count {
            if self.processed.changed().await.is_err() {
                break;
            }
        }
    }

    /// Whether the listener task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Cancels the listener and waits until the subscription is released.
    pub async fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Listener task panicked");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}
