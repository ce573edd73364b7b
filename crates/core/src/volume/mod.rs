//! Observer-style volume sources the playback engine binds its buses to.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Callback receiving every new volume value.
pub type VolumeCallback = Box<dyn FnMut(f32) + Send>;

/// Anything that can push a volume in `[0, 1]` now and on every change.
pub trait VolumeSource {
    /// Registers `callback`, calling it right away with the current value.
    fn subscribe(&self, callback: VolumeCallback) -> Subscription;
}

/// Registration returned by [`VolumeSource::subscribe`].
///
/// The callback is removed by [`Subscription::unsubscribe`] or on drop.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The three sources wired by `connect_volume_control`.
#[derive(Clone, Copy)]
pub struct VolumeControls<'a> {
    pub master: &'a dyn VolumeSource,
    pub music: &'a dyn VolumeSource,
    pub sound: &'a dyn VolumeSource,
}

#[derive(Default)]
struct StoreInner {
    value: f32,
    next_id: u64,
    subscribers: BTreeMap<u64, VolumeCallback>,
}

/// Writable volume value shared between clones.
#[derive(Clone)]
pub struct VolumeStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl VolumeStore {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                value: value.clamp(0.0, 1.0),
                ..StoreInner::default()
            })),
        }
    }

    pub fn get(&self) -> f32 {
        self.inner.lock().map(|inner| inner.value).unwrap_or(0.0)
    }

    /// Stores `value` clamped to `[0, 1]` and notifies every subscriber.
    pub fn set(&self, value: f32) {
        if let Ok(mut inner) = self.inner.lock() {
            let value = value.clamp(0.0, 1.0);
            inner.value = value;
            for callback in inner.subscribers.values_mut() {
                callback(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.subscribers.len())
            .unwrap_or(0)
    }
}

impl Default for VolumeStore {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl VolumeSource for VolumeStore {
    fn subscribe(&self, mut callback: VolumeCallback) -> Subscription {
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                callback(inner.value);
                let id = inner.next_id;
                inner.next_id += 1;
                inner.subscribers.insert(id, callback);
                id
            }
            Err(_) => return Subscription { cancel: None },
        };

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.subscribers.remove(&id);
                }
            }
        })
    }
}

impl fmt::Debug for VolumeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeStore")
            .field("value", &self.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
