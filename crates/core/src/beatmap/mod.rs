use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::timing::TimingSection;
use crate::{BeatlineError, Result};

/// Sound a note plays when triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteType {
    pub audio_url: String,
}

impl NoteType {
    pub fn new(audio_url: impl Into<String>) -> Self {
        Self {
            audio_url: audio_url.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct NoteTypeBuilder {
    audio_url: Option<String>,
}

impl NoteTypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio_url(mut self, audio_url: impl Into<String>) -> Self {
        self.audio_url = Some(audio_url.into());
        self
    }

    pub fn build(self) -> Result<NoteType> {
        let audio_url = self.audio_url.ok_or(BeatlineError::MissingField("audio_url"))?;
        Ok(NoteType { audio_url })
    }
}

/// Declarative description of a playable map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatMap {
    pub name: String,
    pub composer: String,
    pub mapper: String,
    pub track_url: String,
    pub note_types: Vec<NoteType>,
    /// Timing sections in authoring order.
    #[serde(rename = "map")]
    pub raw_map: Vec<TimingSection>,
    /// Shift applied to compiled times when scheduling, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<f64>,
}

impl BeatMap {
    pub fn builder() -> BeatMapBuilder {
        BeatMapBuilder::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON beat map from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug, Default)]
pub struct BeatMapBuilder {
    name: Option<String>,
    composer: Option<String>,
    mapper: Option<String>,
    track_url: Option<String>,
    note_types: Option<Vec<NoteType>>,
    map: Option<Vec<TimingSection>>,
    start_offset: Option<f64>,
}

impl BeatMapBuilder {
    /// Name of the beat map.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Composer of the audio track.
    pub fn with_composer(mut self, name: impl Into<String>) -> Self {
        self.composer = Some(name.into());
        self
    }

    /// Person who authored the map.
    pub fn with_mapper(mut self, name: impl Into<String>) -> Self {
        self.mapper = Some(name.into());
        self
    }

    pub fn with_track_url(mut self, audio_url: impl Into<String>) -> Self {
        self.track_url = Some(audio_url.into());
        self
    }

    /// Registers the note types referenced by `type` indices in the map.
    pub fn with_note_types(mut self, note_types: Vec<NoteType>) -> Self {
        self.note_types = Some(note_types);
        self
    }

    pub fn with_map(mut self, map: Vec<TimingSection>) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_start_offset(mut self, start_offset: f64) -> Self {
        self.start_offset = Some(start_offset);
        self
    }

    pub fn build(self) -> Result<BeatMap> {
        Ok(BeatMap {
            name: self.name.ok_or(BeatlineError::MissingField("name"))?,
            composer: self.composer.ok_or(BeatlineError::MissingField("composer"))?,
            mapper: self.mapper.ok_or(BeatlineError::MissingField("mapper"))?,
            track_url: self.track_url.ok_or(BeatlineError::MissingField("track_url"))?,
            note_types: self.note_types.ok_or(BeatlineError::MissingField("note_types"))?,
            raw_map: self.map.ok_or(BeatlineError::MissingField("map"))?,
            start_offset: self.start_offset,
        })
    }
}
