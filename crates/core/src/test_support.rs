//! Recording doubles for the audio engine and the resource fetcher.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::audio::{AudioBackend, AudioContext, GainBus, TrackSource};
use crate::fetch::ResourceFetcher;
use crate::{BeatlineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct MockBuffer {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub volume: f32,
    pub bus: usize,
}

#[derive(Debug, Default)]
pub struct MockLog {
    pub contexts_created: usize,
    pub contexts_closed: usize,
    pub decodes: usize,
    pub clock: f64,
    /// Parent of every bus by creation order, `None` for the output bus.
    pub bus_parents: Vec<Option<usize>>,
    pub bus_gains: Vec<f32>,
    pub sources_started: usize,
    /// (source id, bus id) of every source not stopped yet.
    pub active_sources: BTreeSet<(usize, usize)>,
    pub triggers: Vec<Trigger>,
    /// Makes `start_source` fail while set.
    pub fail_sources: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    log: Arc<Mutex<MockLog>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap()
    }

    pub fn decode_count(&self) -> usize {
        self.log().decodes
    }

    pub fn advance_clock(&self, seconds: f64) {
        self.log().clock += seconds;
    }
}

impl AudioBackend for MockBackend {
    type Context = MockContext;

    fn create_context(&self) -> Result<MockContext> {
        self.log().contexts_created += 1;
        Ok(MockContext {
            log: self.log.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockContext {
    log: Arc<Mutex<MockLog>>,
}

impl MockContext {
    fn log(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap()
    }

    fn new_bus(&mut self, parent: Option<usize>) -> MockBus {
        let mut log = self.log();
        log.bus_parents.push(parent);
        log.bus_gains.push(1.0);
        MockBus {
            id: log.bus_parents.len() - 1,
            log: self.log.clone(),
        }
    }
}

#[derive(Debug)]
pub struct MockBus {
    pub id: usize,
    log: Arc<Mutex<MockLog>>,
}

impl GainBus for MockBus {
    fn set_gain(&mut self, gain: f32) {
        self.log.lock().unwrap().bus_gains[self.id] = gain;
    }
}

#[derive(Debug)]
pub struct MockSource {
    key: (usize, usize),
    log: Arc<Mutex<MockLog>>,
}

impl TrackSource for MockSource {
    fn stop(self) {
        self.log.lock().unwrap().active_sources.remove(&self.key);
    }
}

impl AudioContext for MockContext {
    type Buffer = MockBuffer;
    type Bus = MockBus;
    type Source = MockSource;

    fn decode(&mut self, bytes: Vec<u8>) -> Result<MockBuffer> {
        if bytes.is_empty() {
            return Err(BeatlineError::backend("empty payload"));
        }
        self.log().decodes += 1;
        Ok(MockBuffer {
            name: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn create_output_bus(&mut self) -> Result<MockBus> {
        Ok(self.new_bus(None))
    }

    fn create_bus(&mut self, parent: &mut MockBus) -> Result<MockBus> {
        Ok(self.new_bus(Some(parent.id)))
    }

    fn start_source(&mut self, _buffer: &MockBuffer, bus: &mut MockBus) -> Result<MockSource> {
        let mut log = self.log();
        if log.fail_sources {
            return Err(BeatlineError::backend("source rejected"));
        }
        let key = (log.sources_started, bus.id);
        log.sources_started += 1;
        log.active_sources.insert(key);
        Ok(MockSource {
            key,
            log: self.log.clone(),
        })
    }

    fn trigger(&mut self, buffer: &MockBuffer, volume: f32, bus: &mut MockBus) -> Result<()> {
        self.log().triggers.push(Trigger {
            name: buffer.name.clone(),
            volume,
            bus: bus.id,
        });
        Ok(())
    }

    fn now(&self) -> f64 {
        self.log().clock
    }

    fn close(self) {
        let mut log = self.log();
        log.contexts_closed += 1;
        log.active_sources.clear();
    }
}

/// In-memory fetcher counting requests per URL.
#[derive(Debug, Default)]
pub struct MockFetcher {
    resources: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    counts: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, url: &str, bytes: &[u8]) -> Self {
        self.resources.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Makes every fetch of `url` take `delay` of tokio time.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.counts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl ResourceFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        *self.counts.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.resources.get(url).cloned().ok_or(BeatlineError::Fetch {
            url: url.to_string(),
            status: 404,
        })
    }
}
