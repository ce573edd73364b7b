//! Declarative timing model of a beat map.
//!
//! A map is a list of [`TimingSection`]s, each holding a constant tempo and a
//! list of [`TimingSectionRow`]s. A row places at most one [`LaneElement`] in
//! every lane at a single musical position.

use serde::{Deserialize, Serialize};

/// Kind tag of a lane placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteKind {
    #[default]
    Note,
    SliderHead,
    SliderTail,
}

/// A single note or slider endpoint placed in a lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneElement {
    /// Index into the beat map's note type registry.
    #[serde(rename = "type")]
    pub type_index: usize,
    /// Playback volume between 0 and 1.
    pub volume: f32,
    #[serde(default)]
    pub kind: NoteKind,
}

impl LaneElement {
    pub fn is_slider(&self) -> bool {
        matches!(self.kind, NoteKind::SliderHead | NoteKind::SliderTail)
    }
}

/// Plain note.
pub fn note(type_index: usize, volume: f32) -> LaneElement {
    LaneElement {
        type_index,
        volume,
        kind: NoteKind::Note,
    }
}

/// Opening placement of a slider.
pub fn slider_start(type_index: usize, volume: f32) -> LaneElement {
    LaneElement {
        type_index,
        volume,
        kind: NoteKind::SliderHead,
    }
}

/// Closing placement of the slider currently open in the same lane.
pub fn slider_end(type_index: usize, volume: f32) -> LaneElement {
    LaneElement {
        type_index,
        volume,
        kind: NoteKind::SliderTail,
    }
}

/// One lane slot of a row.
pub type Bar = Option<LaneElement>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSectionRow {
    /// Beat offset within the section.
    pub index: u32,
    /// Slot within the beat, must stay below `division`.
    pub sub_beat: u32,
    /// Number of equal slots a beat is split into.
    pub division: u32,
    pub bars: Vec<Bar>,
}

pub fn row(index: u32, sub_beat: u32, division: u32, bars: Vec<Bar>) -> TimingSectionRow {
    TimingSectionRow {
        index,
        sub_beat,
        division,
        bars,
    }
}

/// Expands a flat run of sub-beat slots into rows.
///
/// Slot `i` lands on beat `start_index + i / division` at sub-beat
/// `i % division`. `None` slots produce no row. A zero division keeps every
/// slot on `start_index` so the compiler reports the broken row.
pub fn group(
    start_index: u32,
    division: u32,
    sub_beat_rows: Vec<Option<Vec<Bar>>>,
) -> Vec<TimingSectionRow> {
    sub_beat_rows
        .into_iter()
        .enumerate()
        .filter_map(|(slot, bars)| {
            let slot = u32::try_from(slot).unwrap_or(u32::MAX);
            let beat = slot.checked_div(division).unwrap_or(0);
            let sub_beat = slot.checked_rem(division).unwrap_or(slot);
            bars.map(|bars| row(start_index.saturating_add(beat), sub_beat, division, bars))
        })
        .collect()
}

/// Tempo-stable segment of a beat map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSection {
    /// Absolute start time in milliseconds.
    pub start_time: f64,
    pub bpm: f64,
    #[serde(default)]
    pub rows: Vec<TimingSectionRow>,
}

impl TimingSection {
    /// Milliseconds taken by a single beat at this section's tempo.
    pub fn beat_duration(&self) -> f64 {
        60_000.0 / self.bpm
    }
}

#[derive(Debug, Default)]
pub struct TimingSectionBuilder {
    start_time: f64,
    bpm: f64,
    rows: Vec<TimingSectionRow>,
}

impl TimingSectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_rows(mut self, rows: Vec<TimingSectionRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn build(self) -> TimingSection {
        TimingSection {
            start_time: self.start_time,
            bpm: self.bpm,
            rows: self.rows,
        }
    }
}
