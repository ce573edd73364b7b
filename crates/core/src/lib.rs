//! Core library of the Beatline rhythm game engine.
//!
//! A [`BeatMap`] describes a track and timed note placements in musical
//! terms. The [`compiler`] flattens it into time-ordered [`CompiledEvent`]s and
//! the [`PlaybackEngine`] plays the track and note samples through a small gain
//! graph while exposing the playback clock the gameplay loop polls.

pub mod audio;
pub mod beatmap;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fetch;
pub mod playback;
pub mod registry;
pub mod timeline;
pub mod timing;
pub mod volume;

#[cfg(test)]
mod test_support;

pub use audio::{AudioBackend, AudioContext, GainBus, KiraBackend, TrackSource};
pub use beatmap::{BeatMap, BeatMapBuilder, NoteType, NoteTypeBuilder};
pub use compiler::{compile, BeatMapCompiler, CompilationError, CompiledEvent, CompiledKind, SliderEnd};
pub use config::{AppConfig, EngineConfig, VolumeConfig};
pub use error::{BeatlineError, Result};
pub use fetch::{HttpFetcher, ResourceFetcher};
pub use playback::{EngineStatus, PlaybackEngine};
pub use registry::{LoadedNoteType, NoteTypeRegistry};
pub use timeline::{ScheduledTrigger, Scheduler};
pub use timing::{TimingSection, TimingSectionBuilder, TimingSectionRow};
pub use volume::{Subscription, VolumeControls, VolumeSource, VolumeStore};
