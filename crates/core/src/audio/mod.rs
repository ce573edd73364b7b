//! Seam between the playback engine and the real-time audio engine.
//!
//! The engine only needs a handful of primitives: decode a payload, build a
//! tree of gain buses, start one track source and any number of one-shot
//! samples, and read the engine clock. [`KiraBackend`] provides them on top of
//! kira; tests use a recording mock.

mod kira_backend;

pub use kira_backend::{amplitude_to_decibels, KiraBackend, KiraContext};

use crate::Result;

/// Creates audio contexts. One context lives per initialised beat map.
pub trait AudioBackend {
    type Context: AudioContext;

    fn create_context(&self) -> Result<Self::Context>;
}

/// A running audio engine instance.
pub trait AudioContext {
    /// Decoded, read-only sample data. Cloning must be cheap.
    type Buffer: Clone;
    type Bus: GainBus;
    type Source: TrackSource;

    /// Decodes an encoded audio payload.
    fn decode(&mut self, bytes: Vec<u8>) -> Result<Self::Buffer>;

    /// Creates the bus feeding the output device.
    fn create_output_bus(&mut self) -> Result<Self::Bus>;

    /// Creates a bus feeding `parent`.
    fn create_bus(&mut self, parent: &mut Self::Bus) -> Result<Self::Bus>;

    /// Starts a one-shot source for `buffer` into `bus` and keeps its handle.
    fn start_source(&mut self, buffer: &Self::Buffer, bus: &mut Self::Bus) -> Result<Self::Source>;

    /// Fires `buffer` once through its own gain of `volume` into `bus`.
    fn trigger(&mut self, buffer: &Self::Buffer, volume: f32, bus: &mut Self::Bus) -> Result<()>;

    /// Current engine clock reading, in seconds.
    fn now(&self) -> f64;

    /// Tears the engine down. Every source stops.
    fn close(self);
}

/// A mixing point with a linear gain.
pub trait GainBus: Send + 'static {
    fn set_gain(&mut self, gain: f32);
}

/// Handle to a started track source.
pub trait TrackSource {
    /// Stops playback and detaches the source from its bus.
    fn stop(self);
}
