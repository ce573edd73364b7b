use std::io::Cursor;
use std::time::Duration;

use kira::clock::{ClockHandle, ClockSpeed};
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::track::{TrackBuilder, TrackHandle};
use kira::{AudioManager, AudioManagerSettings, Decibels, Tween};
use tracing::debug;

use super::{AudioBackend, AudioContext, GainBus, TrackSource};
use crate::{BeatlineError, Result};

/// Resolution of the engine clock.
const CLOCK_TICKS_PER_SECOND: f64 = 1000.0;

/// Converts a linear gain to kira's decibel scale, flooring at silence.
pub fn amplitude_to_decibels(gain: f32) -> Decibels {
    if !gain.is_finite() || gain <= 0.0 {
        return Decibels::SILENCE;
    }
    Decibels((20.0 * gain.log10()).max(Decibels::SILENCE.0))
}

/// Zero-length tween for stopping a track without a fade.
fn immediate() -> Tween {
    Tween {
        duration: Duration::ZERO,
        ..Tween::default()
    }
}

/// Audio backend playing through the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct KiraBackend;

impl AudioBackend for KiraBackend {
    type Context = KiraContext;

    fn create_context(&self) -> Result<KiraContext> {
        let mut manager: AudioManager = AudioManager::new(AudioManagerSettings::default())
            .map_err(|e| BeatlineError::backend(format!("failed to create audio manager: {e:?}")))?;
        let mut clock = manager
            .add_clock(ClockSpeed::TicksPerSecond(CLOCK_TICKS_PER_SECOND))
            .map_err(|e| BeatlineError::backend(format!("failed to create clock: {e:?}")))?;
        clock.start();
        debug!("kira audio context created");

        Ok(KiraContext { manager, clock })
    }
}

/// kira audio manager plus the clock playback is measured against.
pub struct KiraContext {
    manager: AudioManager,
    clock: ClockHandle,
}

impl std::fmt::Debug for KiraContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiraContext").finish()
    }
}

/// Sub-track used as a gain bus.
pub struct KiraBus(TrackHandle);

impl GainBus for KiraBus {
    fn set_gain(&mut self, gain: f32) {
        self.0.set_volume(amplitude_to_decibels(gain), Tween::default());
    }
}

pub struct KiraSource(StaticSoundHandle);

impl TrackSource for KiraSource {
    fn stop(mut self) {
        self.0.stop(immediate());
    }
}

impl AudioContext for KiraContext {
    type Buffer = StaticSoundData;
    type Bus = KiraBus;
    type Source = KiraSource;

    fn decode(&mut self, bytes: Vec<u8>) -> Result<StaticSoundData> {
        StaticSoundData::from_cursor(Cursor::new(bytes))
            .map_err(|e| BeatlineError::backend(format!("{e:?}")))
    }

    fn create_output_bus(&mut self) -> Result<KiraBus> {
        self.manager
            .add_sub_track(TrackBuilder::new())
            .map(KiraBus)
            .map_err(|e| BeatlineError::backend(format!("failed to create bus: {e:?}")))
    }

    fn create_bus(&mut self, parent: &mut KiraBus) -> Result<KiraBus> {
        parent
            .0
            .add_sub_track(TrackBuilder::new())
            .map(KiraBus)
            .map_err(|e| BeatlineError::backend(format!("failed to create bus: {e:?}")))
    }

    fn start_source(&mut self, buffer: &StaticSoundData, bus: &mut KiraBus) -> Result<KiraSource> {
        bus.0
            .play(buffer.clone())
            .map(KiraSource)
            .map_err(|e| BeatlineError::backend(format!("failed to start track: {e:?}")))
    }

    fn trigger(&mut self, buffer: &StaticSoundData, volume: f32, bus: &mut KiraBus) -> Result<()> {
        bus.0
            .play(buffer.volume(amplitude_to_decibels(volume)))
            .map(drop)
            .map_err(|e| BeatlineError::backend(format!("failed to play sound: {e:?}")))
    }

    fn now(&self) -> f64 {
        let time = self.clock.time();
        (time.ticks as f64 + time.fraction) / CLOCK_TICKS_PER_SECOND
    }

    fn close(self) {
        debug!("kira audio context closed");
    }
}
