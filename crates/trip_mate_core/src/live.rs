//! crates/trip_mate_core/src/live.rs
//!
//! Push-based live feeds of full ordered snapshots.
//!
//! A store owns one `SnapshotHub` per collection and calls `refresh` after every
//! mutation. Consumers hold a `Subscription`, which yields the current snapshot
//! first and then every later one. Snapshots are whole lists, never diffs.

use crate::ports::PortResult;
use futures::Stream;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One immutable, internally consistent view of a collection.
pub type Snapshot<T> = Arc<Vec<T>>;

struct Channel<T> {
    tx: watch::Sender<Snapshot<T>>,
    /// Serializes load-then-send so an older listing never overwrites a newer one.
    refresh_lock: AsyncMutex<()>,
}

type Channels<T> = Mutex<HashMap<String, Arc<Channel<T>>>>;

fn lock_channels<T>(channels: &Channels<T>) -> MutexGuard<'_, HashMap<String, Arc<Channel<T>>>> {
    channels.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes `key` once its channel has no receivers and no strong references
/// beyond the map and the `held` ones owned by the caller.
///
/// Strong clones are only ever taken under the map lock, so checking under that
/// lock means nobody can pick the channel up while it is being dropped.
fn release_if_idle<T>(channels: &Channels<T>, key: &str, channel: &Weak<Channel<T>>, held: usize) {
    let mut channels = lock_channels(channels);
    let idle = channels.get(key).is_some_and(|current| {
        std::ptr::eq(Arc::as_ptr(current), channel.as_ptr())
            && Arc::strong_count(current) == 1 + held
            && current.tx.receiver_count() == 0
    });
    if idle {
        channels.remove(key);
        debug!(key, "idle live channel released");
    }
}

/// Fan-out point for the live snapshots of many keyed collections. A key's
/// channel lives only while someone is subscribed to it.
pub struct SnapshotHub<T> {
    channels: Arc<Channels<T>>,
}

impl<T> Default for SnapshotHub<T> {
    fn default() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Send + Sync + 'static> SnapshotHub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, key: &str) -> Arc<Channel<T>> {
        lock_channels(&self.channels)
            .entry(key.to_string())
            .or_insert_with(|| {
                let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
                Arc::new(Channel {
                    tx,
                    refresh_lock: AsyncMutex::new(()),
                })
            })
            .clone()
    }

    fn existing(&self, key: &str) -> Option<Arc<Channel<T>>> {
        lock_channels(&self.channels).get(key).cloned()
    }

    /// Number of keys that currently have a channel.
    pub fn open_channels(&self) -> usize {
        lock_channels(&self.channels).len()
    }

    /// Opens a subscription on `key`. `load` is only called when nobody else is
    /// subscribed, since otherwise the channel already holds the latest snapshot.
    pub async fn subscribe<F, Fut>(&self, key: &str, load: F) -> PortResult<Subscription<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<Vec<T>>>,
    {
        let channel = self.channel(key);
        let rx = {
            let guard = channel.refresh_lock.lock().await;
            if channel.tx.receiver_count() == 0 {
                match load().await {
                    Ok(items) => {
                        channel.tx.send_replace(Arc::new(items));
                    }
                    Err(e) => {
                        drop(guard);
                        release_if_idle(&self.channels, key, &Arc::downgrade(&channel), 1);
                        return Err(e);
                    }
                }
            }
            channel.tx.subscribe()
        };
        debug!(key, subscribers = channel.tx.receiver_count(), "live subscription opened");
        Ok(Subscription::new(
            rx,
            Some(Registration {
                channels: Arc::downgrade(&self.channels),
                key: key.to_string(),
                channel: Arc::downgrade(&channel),
            }),
        ))
    }

    /// Reloads and broadcasts the snapshot for `key` if anyone is listening.
    /// A failed reload is logged and skipped; the next mutation retries.
    pub async fn refresh<F, Fut>(&self, key: &str, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PortResult<Vec<T>>>,
    {
        let Some(channel) = self.existing(key) else {
            return;
        };
        {
            let _guard = channel.refresh_lock.lock().await;
            if channel.tx.receiver_count() > 0 {
                match load().await {
                    Ok(items) => {
                        channel.tx.send_replace(Arc::new(items));
                    }
                    Err(e) => warn!(key, error = %e, "failed to reload live snapshot"),
                }
            }
        }
        // The last subscriber may have left while this refresh held the channel.
        release_if_idle(&self.channels, key, &Arc::downgrade(&channel), 1);
    }

    /// Drops the channel for `key`; open subscriptions end after their last snapshot.
    pub fn forget(&self, key: &str) {
        lock_channels(&self.channels).remove(key);
    }
}

/// Ties a subscription to its hub entry so the entry goes away with the last one.
/// Weak on both ends, so `forget` still closes the feed by dropping the sender.
struct Registration<T> {
    channels: Weak<Channels<T>>,
    key: String,
    channel: Weak<Channel<T>>,
}

impl<T> Registration<T> {
    fn release(self) {
        if let Some(channels) = self.channels.upgrade() {
            release_if_idle(&channels, &self.key, &self.channel, 0);
        }
    }
}

//=========================================================================================
// Subscription
//=========================================================================================

/// A live feed of snapshots. Dropping it unsubscribes.
pub struct Subscription<T> {
    rx: watch::Receiver<Snapshot<T>>,
    closed: CancellationToken,
    delivered_initial: bool,
    registration: Option<Registration<T>>,
}

impl<T> Subscription<T> {
    fn new(rx: watch::Receiver<Snapshot<T>>, registration: Option<Registration<T>>) -> Self {
        Self {
            rx,
            closed: CancellationToken::new(),
            delivered_initial: false,
            registration,
        }
    }

    /// Waits for the next snapshot. The first call returns immediately with the
    /// current state. Returns `None` once unsubscribed or once the feed closed.
    pub async fn next(&mut self) -> Option<Snapshot<T>> {
        if self.closed.is_cancelled() {
            return None;
        }
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.rx.borrow_and_update().clone());
        }

        let changed = {
            let closed = &self.closed;
            let rx = &mut self.rx;
            tokio::select! {
                _ = closed.cancelled() => false,
                result = rx.changed() => result.is_ok(),
            }
        };
        if changed && !self.closed.is_cancelled() {
            Some(self.rx.borrow_and_update().clone())
        } else {
            None
        }
    }

    /// A cloneable handle that can stop this subscription from anywhere.
    pub fn unsubscribe_handle(&self) -> UnsubscribeHandle {
        UnsubscribeHandle(self.closed.clone())
    }

    /// Stops further deliveries. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// Adapts the subscription into a `Stream` of snapshots.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot<T>> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let snapshot = sub.next().await?;
            Some((snapshot, sub))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.closed.cancel();
        if let Some(registration) = self.registration.take() {
            // Let go of this receiver before asking whether anyone is still listening.
            let (_tx, detached) = watch::channel(Arc::new(Vec::new()));
            drop(std::mem::replace(&mut self.rx, detached));
            registration.release();
        }
    }
}

/// Idempotent unsubscribe handle; calling it after the feed closed is a no-op.
#[derive(Clone, Debug)]
pub struct UnsubscribeHandle(CancellationToken);

impl UnsubscribeHandle {
    pub fn unsubscribe(&self) {
        self.0.cancel();
    }
}
