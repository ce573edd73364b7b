use tracing::debug;

use crate::audio::AudioContext;
use crate::fetch::ResourceFetcher;
use crate::{BeatlineError, NoteType, Result};

/// Fetches `url` and decodes it on `context`.
pub(crate) async fn fetch_and_decode<C, F>(context: &mut C, fetcher: &F, url: &str) -> Result<C::Buffer>
where
    C: AudioContext,
    F: ResourceFetcher,
{
    let bytes = fetcher.fetch(url).await?;
    context.decode(bytes).map_err(|e| BeatlineError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// A note type together with its decoded sample.
#[derive(Debug)]
pub struct LoadedNoteType<S> {
    note_type: NoteType,
    buffer: Option<S>,
}

impl<S: Clone> LoadedNoteType<S> {
    pub fn new(note_type: NoteType) -> Self {
        Self {
            note_type,
            buffer: None,
        }
    }

    pub fn note_type(&self) -> &NoteType {
        &self.note_type
    }

    pub fn audio_buffer(&self) -> Option<&S> {
        self.buffer.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Loads the sample unless it is already loaded.
    ///
    /// Two first loads racing each other may both fetch.
    pub async fn load_audio<C, F>(&mut self, context: &mut C, fetcher: &F) -> Result<()>
    where
        C: AudioContext<Buffer = S>,
        F: ResourceFetcher,
    {
        if self.buffer.is_some() {
            return Ok(());
        }

        let buffer = fetch_and_decode(context, fetcher, &self.note_type.audio_url).await?;
        debug!(url = %self.note_type.audio_url, "note type sample loaded");
        self.buffer = Some(buffer);
        Ok(())
    }

    pub fn dispose_resources(&mut self) {
        self.buffer = None;
    }
}

/// Note types of one beat map, indexed the way lane elements reference them.
#[derive(Debug)]
pub struct NoteTypeRegistry<S> {
    types: Vec<LoadedNoteType<S>>,
}

impl<S: Clone> NoteTypeRegistry<S> {
    pub fn new(note_types: &[NoteType]) -> Self {
        Self {
            types: note_types.iter().cloned().map(LoadedNoteType::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, type_index: usize) -> Option<&LoadedNoteType<S>> {
        self.types.get(type_index)
    }

    /// Loads every sample in registration order, stopping at the first failure.
    pub async fn load_all<C, F>(&mut self, context: &mut C, fetcher: &F) -> Result<()>
    where
        C: AudioContext<Buffer = S>,
        F: ResourceFetcher,
    {
        for (type_index, loaded) in self.types.iter_mut().enumerate() {
            loaded.load_audio(context, fetcher).await?;
            debug!(type_index, "note type ready");
        }
        Ok(())
    }

    pub fn dispose_resources(&mut self) {
        for loaded in &mut self.types {
            loaded.dispose_resources();
        }
    }
}
