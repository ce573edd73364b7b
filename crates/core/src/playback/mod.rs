//! Real-time playback of a beat map.
//!
//! ```text
//! [Track Source] => [Music Bus] -o> [Master Bus] => [Output]
//!                                |
//! [Notes] => [Sound Bus] ------->/
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, AudioContext, GainBus, TrackSource};
use crate::fetch::ResourceFetcher;
use crate::registry::{fetch_and_decode, NoteTypeRegistry};
use crate::volume::{Subscription, VolumeControls, VolumeSource};
use crate::{BeatMap, BeatlineError, Result};

/// Lifecycle stage of a [`PlaybackEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Initialized,
    Playing,
    Disposed,
}

type SharedBus<B> = Arc<Mutex<B>>;
type BufferOf<B> = <<B as AudioBackend>::Context as AudioContext>::Buffer;

struct Buses<B> {
    master: SharedBus<B>,
    music: SharedBus<B>,
    sound: SharedBus<B>,
}

struct AudioGraph<C: AudioContext> {
    context: C,
    track_buffer: C::Buffer,
    buses: Buses<C::Bus>,
    track_source: Option<C::Source>,
    /// Engine clock reading when the current track source started.
    started_at: Option<f64>,
}

impl<C: AudioContext> AudioGraph<C> {
    fn close(self) {
        if let Some(source) = self.track_source {
            source.stop();
        }
        self.context.close();
    }
}

enum EngineState<C: AudioContext> {
    Uninitialized,
    Ready(AudioGraph<C>),
    Disposed,
}

fn lock_bus<B>(bus: &SharedBus<B>) -> Result<MutexGuard<'_, B>> {
    bus.lock().map_err(|_| BeatlineError::Poisoned("gain bus"))
}

/// Owns the audio graph, the playback clock and the decoded samples of one
/// beat map.
pub struct PlaybackEngine<B: AudioBackend, F: ResourceFetcher> {
    beat_map: BeatMap,
    backend: B,
    fetcher: F,
    registry: NoteTypeRegistry<BufferOf<B>>,
    state: EngineState<B::Context>,
    volume_subscriptions: Vec<Subscription>,
}

impl<B: AudioBackend, F: ResourceFetcher> PlaybackEngine<B, F> {
    pub fn new(beat_map: BeatMap, backend: B, fetcher: F) -> Self {
        let registry = NoteTypeRegistry::new(&beat_map.note_types);
        Self {
            beat_map,
            backend,
            fetcher,
            registry,
            state: EngineState::Uninitialized,
            volume_subscriptions: Vec::new(),
        }
    }

    pub fn beat_map(&self) -> &BeatMap {
        &self.beat_map
    }

    pub fn registry(&self) -> &NoteTypeRegistry<BufferOf<B>> {
        &self.registry
    }

    pub fn status(&self) -> EngineStatus {
        match &self.state {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Ready(graph) if graph.track_source.is_some() => EngineStatus::Playing,
            EngineState::Ready(_) => EngineStatus::Initialized,
            EngineState::Disposed => EngineStatus::Disposed,
        }
    }

    /// Downloads and decodes the track and every note type sample, then builds
    /// the mixing graph. Does nothing once it has succeeded.
    ///
    /// Samples are loaded one after another. Any failure closes the context
    /// again and leaves the engine uninitialized.
    pub async fn initialize_audio(&mut self) -> Result<()> {
        if !matches!(self.state, EngineState::Uninitialized) {
            warn!(status = ?self.status(), "audio already initialized, skipping");
            return Ok(());
        }

        let mut context = self.backend.create_context()?;
        let loaded = Self::load_graph(
            &mut context,
            &self.fetcher,
            &mut self.registry,
            &self.beat_map.track_url,
        )
        .await;
        let (track_buffer, buses) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                context.close();
                return Err(e);
            }
        };

        self.state = EngineState::Ready(AudioGraph {
            context,
            track_buffer,
            buses,
            track_source: None,
            started_at: None,
        });
        info!(
            map = %self.beat_map.name,
            note_types = self.registry.len(),
            "audio graph initialized"
        );
        Ok(())
    }

    async fn load_graph(
        context: &mut B::Context,
        fetcher: &F,
        registry: &mut NoteTypeRegistry<BufferOf<B>>,
        track_url: &str,
    ) -> Result<(BufferOf<B>, Buses<<B::Context as AudioContext>::Bus>)> {
        let track_buffer = fetch_and_decode(context, fetcher, track_url).await?;
        debug!(url = track_url, "track decoded");
        registry.load_all(context, fetcher).await?;

        let mut master = context.create_output_bus()?;
        let music = context.create_bus(&mut master)?;
        let sound = context.create_bus(&mut master)?;
        Ok((
            track_buffer,
            Buses {
                master: Arc::new(Mutex::new(master)),
                music: Arc::new(Mutex::new(music)),
                sound: Arc::new(Mutex::new(sound)),
            },
        ))
    }

    fn graph_mut(&mut self) -> Result<&mut AudioGraph<B::Context>> {
        match &mut self.state {
            EngineState::Ready(graph) => Ok(graph),
            _ => Err(BeatlineError::NotInitialized),
        }
    }

    /// Starts the track from the beginning, stopping a running one first.
    pub fn start_playing(&mut self) -> Result<()> {
        let graph = self.graph_mut()?;

        if let Some(source) = graph.track_source.take() {
            source.stop();
        }
        graph.started_at = None;

        let source = {
            let mut music = lock_bus(&graph.buses.music)?;
            graph.context.start_source(&graph.track_buffer, &mut music)?
        };
        graph.track_source = Some(source);

        let epoch = graph.context.now();
        graph.started_at = Some(epoch);
        info!(epoch, "playback started");
        Ok(())
    }

    /// Seconds since playback started, or `-1.0` if it never did.
    pub fn current_time(&self) -> f64 {
        match &self.state {
            EngineState::Ready(AudioGraph {
                context,
                started_at: Some(epoch),
                ..
            }) => context.now() - epoch,
            _ => -1.0,
        }
    }

    /// Plays the sample of `type_index` at full volume.
    pub fn play_sound(&mut self, type_index: usize) -> Result<()> {
        self.play_sound_with_volume(type_index, 1.0)
    }

    /// Fires the sample of `type_index` once into the sound bus.
    pub fn play_sound_with_volume(&mut self, type_index: usize, volume: f32) -> Result<()> {
        let loaded = self
            .registry
            .get(type_index)
            .ok_or(BeatlineError::UnknownNoteType(type_index))?;
        let EngineState::Ready(graph) = &mut self.state else {
            return Err(BeatlineError::NotInitialized);
        };
        let buffer = loaded.audio_buffer().ok_or(BeatlineError::NotInitialized)?;

        let mut sound = lock_bus(&graph.buses.sound)?;
        graph.context.trigger(buffer, volume, &mut sound)
    }

    /// Binds the three bus gains to external volume sources. Only one set of
    /// sources can be connected.
    pub fn connect_volume_control(&mut self, controls: VolumeControls<'_>) -> Result<()> {
        if !self.volume_subscriptions.is_empty() {
            return Err(BeatlineError::VolumeAlreadyConnected);
        }
        let EngineState::Ready(graph) = &self.state else {
            return Err(BeatlineError::NotInitialized);
        };

        let bindings: [(&dyn VolumeSource, &SharedBus<_>); 3] = [
            (controls.master, &graph.buses.master),
            (controls.music, &graph.buses.music),
            (controls.sound, &graph.buses.sound),
        ];
        for (source, bus) in bindings {
            let bus = Arc::clone(bus);
            self.volume_subscriptions
                .push(source.subscribe(Box::new(move |volume| {
                    if let Ok(mut bus) = bus.lock() {
                        bus.set_gain(volume);
                    }
                })));
        }
        debug!("volume controls connected");
        Ok(())
    }

    /// Closes the audio context, drops the volume wiring and every decoded
    /// sample. The engine can't be used for playback afterwards.
    pub fn dispose_resources(&mut self) {
        self.volume_subscriptions.clear();
        self.registry.dispose_resources();

        match std::mem::replace(&mut self.state, EngineState::Disposed) {
            EngineState::Ready(graph) => {
                graph.close();
                info!(map = %self.beat_map.name, "audio resources disposed");
            }
            EngineState::Uninitialized => warn!("disposing audio that was never initialized"),
            EngineState::Disposed => warn!("audio resources already disposed"),
        }
    }
}
