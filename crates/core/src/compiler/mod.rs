//! Turns a [`BeatMap`]'s musical structure into a flat list of
//! time-resolved [`CompiledEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timing::{LaneElement, NoteKind};
use crate::BeatMap;

/// Lane layout used when nothing else is configured.
pub const DEFAULT_LANE_COUNT: usize = 4;

/// Handle the rendering layer may attach to a compiled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// End fields of a slider, filled in once its tail has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderEnd {
    pub end_time: i64,
    pub end_type_index: usize,
    pub end_volume: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CompiledKind {
    Note,
    /// `end` stays `None` for a slider whose tail never appears.
    Slider { end: Option<SliderEnd> },
}

/// A fully time-resolved note or slider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledEvent {
    /// Absolute time in milliseconds.
    pub time: i64,
    /// Lane the event sits in.
    pub bar_index: usize,
    pub type_index: usize,
    pub volume: f32,
    #[serde(flatten)]
    pub kind: CompiledKind,
    /// Reserved for the renderer. The compiler never touches it.
    #[serde(skip)]
    pub connected_element: Option<ElementHandle>,
}

impl CompiledEvent {
    fn new(time: i64, bar_index: usize, element: &LaneElement, kind: CompiledKind) -> Self {
        Self {
            time,
            bar_index,
            type_index: element.type_index,
            volume: element.volume,
            kind,
            connected_element: None,
        }
    }

    pub fn is_slider(&self) -> bool {
        matches!(self.kind, CompiledKind::Slider { .. })
    }

    pub fn slider_end(&self) -> Option<&SliderEnd> {
        match &self.kind {
            CompiledKind::Slider { end } => end.as_ref(),
            CompiledKind::Note => None,
        }
    }

    pub fn end_time(&self) -> Option<i64> {
        self.slider_end().map(|end| end.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompilationErrorKind {
    #[error("sub-beat index {sub_beat} can't be higher than division {division}")]
    SubBeatOutOfRange { sub_beat: u32, division: u32 },
    #[error("attempting to start new slider before ending previous slider")]
    SliderAlreadyOpen,
    #[error("attempting to end the slider before it even started")]
    SliderNotOpen,
    #[error("invalid element: only notes, sliders and empty slots fit into {lane_count} lanes")]
    InvalidElement { lane_count: usize },
    #[error("section tempo must be a positive number, got {bpm}")]
    InvalidBpm { bpm: f64 },
    #[error("section start time must be a finite number, got {start_time}")]
    InvalidStartTime { start_time: f64 },
}

/// Coordinates of the element that failed to compile, as far as known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    pub section: Option<usize>,
    pub row: Option<usize>,
    pub bar: Option<usize>,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<String> = [
            ("Section index", self.section),
            ("Row index", self.row),
            ("Bars index", self.bar),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|value| format!("{label}: {value}")))
        .collect();

        if details.is_empty() {
            return Ok(());
        }
        write!(f, "\nDetails:\n{}", details.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}{location}")]
pub struct CompilationError {
    pub kind: CompilationErrorKind,
    pub location: ErrorLocation,
}

impl CompilationError {
    fn at(kind: CompilationErrorKind, section: usize, row: Option<usize>, bar: Option<usize>) -> Self {
        Self {
            kind,
            location: ErrorLocation {
                section: Some(section),
                row,
                bar,
            },
        }
    }
}

/// Slider waiting for its tail in one lane.
#[derive(Debug, Clone, Copy)]
struct PendingSlider {
    /// Position of the emitted slider in the output list.
    event: usize,
}

/// Compiles beat maps for a fixed lane layout.
///
/// Every call to [`BeatMapCompiler::compile`] starts from an empty output and
/// idle lanes, so compiling the same map twice yields equal timelines.
#[derive(Debug)]
pub struct BeatMapCompiler {
    lane_count: usize,
    events: Vec<CompiledEvent>,
    lanes: Vec<Option<PendingSlider>>,
}

impl Default for BeatMapCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_LANE_COUNT)
    }
}

impl BeatMapCompiler {
    pub fn new(lane_count: usize) -> Self {
        Self {
            lane_count,
            events: Vec::new(),
            lanes: Vec::new(),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Compiles the map in section, row, lane visitation order.
    ///
    /// Events are not re-sorted by time. Sliders left open at the end of the
    /// map are returned without end fields.
    pub fn compile(&mut self, beat_map: &BeatMap) -> Result<Vec<CompiledEvent>, CompilationError> {
        self.events.clear();
        self.lanes.clear();
        self.lanes.resize(self.lane_count, None);

        for (section_index, section) in beat_map.raw_map.iter().enumerate() {
            if !section.bpm.is_finite() || section.bpm <= 0.0 {
                return Err(CompilationError::at(
                    CompilationErrorKind::InvalidBpm { bpm: section.bpm },
                    section_index,
                    None,
                    None,
                ));
            }
            if !section.start_time.is_finite() {
                return Err(CompilationError::at(
                    CompilationErrorKind::InvalidStartTime {
                        start_time: section.start_time,
                    },
                    section_index,
                    None,
                    None,
                ));
            }
            let beat_time = section.beat_duration();

            for (row_index, row) in section.rows.iter().enumerate() {
                if row.sub_beat >= row.division {
                    return Err(CompilationError::at(
                        CompilationErrorKind::SubBeatOutOfRange {
                            sub_beat: row.sub_beat,
                            division: row.division,
                        },
                        section_index,
                        Some(row_index),
                        None,
                    ));
                }
                let sub_beat_time = beat_time / f64::from(row.division);
                let target_time = (section.start_time
                    + beat_time * f64::from(row.index)
                    + sub_beat_time * f64::from(row.sub_beat))
                .floor() as i64;

                for (bar_index, bar) in row.bars.iter().enumerate() {
                    let Some(element) = bar else {
                        continue;
                    };
                    self.place(element, target_time, bar_index)
                        .map_err(|kind| {
                            CompilationError::at(kind, section_index, Some(row_index), Some(bar_index))
                        })?;
                }
            }
        }

        Ok(std::mem::take(&mut self.events))
    }

    fn place(
        &mut self,
        element: &LaneElement,
        time: i64,
        bar_index: usize,
    ) -> Result<(), CompilationErrorKind> {
        let lane_count = self.lane_count;
        let lane = self
            .lanes
            .get_mut(bar_index)
            .ok_or(CompilationErrorKind::InvalidElement { lane_count })?;

        match (element.kind, *lane) {
            (NoteKind::Note, _) => {
                self.events
                    .push(CompiledEvent::new(time, bar_index, element, CompiledKind::Note));
            }
            (NoteKind::SliderHead, Some(_)) => return Err(CompilationErrorKind::SliderAlreadyOpen),
            (NoteKind::SliderHead, None) => {
                *lane = Some(PendingSlider {
                    event: self.events.len(),
                });
                self.events.push(CompiledEvent::new(
                    time,
                    bar_index,
                    element,
                    CompiledKind::Slider { end: None },
                ));
            }
            (NoteKind::SliderTail, None) => return Err(CompilationErrorKind::SliderNotOpen),
            (NoteKind::SliderTail, Some(pending)) => {
                *lane = None;
                if let Some(CompiledKind::Slider { end }) =
                    self.events.get_mut(pending.event).map(|event| &mut event.kind)
                {
                    *end = Some(SliderEnd {
                        end_time: time,
                        end_type_index: element.type_index,
                        end_volume: element.volume,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Compiles `beat_map` with the default lane layout.
pub fn compile(beat_map: &BeatMap) -> Result<Vec<CompiledEvent>, CompilationError> {
    BeatMapCompiler::default().compile(beat_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{note, row, slider_end, slider_start, TimingSection, TimingSectionRow};

    fn map(sections: Vec<TimingSection>) -> BeatMap {
        BeatMap {
            raw_map: sections,
            ..BeatMap::default()
        }
    }

    fn section(start_time: f64, bpm: f64, rows: Vec<TimingSectionRow>) -> TimingSection {
        TimingSection {
            start_time,
            bpm,
            rows,
        }
    }

    #[test]
    fn resolves_row_time_inside_section() {
        let beat_map = map(vec![section(
            1000.0,
            120.0,
            vec![row(1, 1, 2, vec![Some(note(0, 1.0))])],
        )]);

        let events = compile(&beat_map).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 1750);
        assert_eq!(events[0].bar_index, 0);
        assert!(!events[0].is_slider());
    }

    #[test]
    fn floors_fractional_times() {
        let beat_map = map(vec![section(
            0.0,
            140.0,
            vec![row(0, 1, 3, vec![None, Some(note(2, 0.8))])],
        )]);

        let events = compile(&beat_map).unwrap();
        // 60000 / 140 / 3 = 142.857...
        assert_eq!(events[0].time, 142);
        assert_eq!(events[0].bar_index, 1);
        assert_eq!(events[0].type_index, 2);
        assert_eq!(events[0].volume, 0.8);
    }

    #[test]
    fn compiling_twice_yields_equal_timelines() {
        let beat_map = map(vec![
            section(
                0.0,
                120.0,
                vec![
                    row(0, 0, 1, vec![Some(slider_start(1, 1.0)), Some(note(0, 1.0))]),
                    row(1, 0, 1, vec![Some(slider_end(2, 0.5)), None]),
                ],
            ),
            section(2000.0, 90.0, vec![row(0, 0, 4, vec![None, None, Some(note(0, 1.0))])]),
        ]);

        let mut compiler = BeatMapCompiler::default();
        let first = compiler.compile(&beat_map).unwrap();
        let second = compiler.compile(&beat_map).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn rejects_sub_beat_outside_division() {
        let beat_map = map(vec![
            section(0.0, 120.0, vec![]),
            section(
                500.0,
                120.0,
                vec![row(0, 0, 1, vec![]), row(0, 2, 2, vec![Some(note(0, 1.0))])],
            ),
        ]);

        let err = compile(&beat_map).unwrap_err();
        assert!(matches!(
            err.kind,
            CompilationErrorKind::SubBeatOutOfRange {
                sub_beat: 2,
                division: 2
            }
        ));
        assert_eq!(err.location.section, Some(1));
        assert_eq!(err.location.row, Some(1));
        assert_eq!(err.location.bar, None);
    }

    #[test]
    fn zero_division_is_rejected() {
        let beat_map = map(vec![section(0.0, 120.0, vec![row(0, 0, 0, vec![])])]);
        let err = compile(&beat_map).unwrap_err();
        assert!(matches!(err.kind, CompilationErrorKind::SubBeatOutOfRange { .. }));
    }

    #[test]
    fn pairs_slider_head_and_tail() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![
                row(0, 0, 1, vec![None, Some(slider_start(1, 1.0))]),
                row(0, 1, 2, vec![Some(note(0, 1.0)), None]),
                row(2, 0, 1, vec![None, Some(slider_end(2, 0.5))]),
            ],
        )]);

        let events = compile(&beat_map).unwrap();
        assert_eq!(events.len(), 2);

        let slider = &events[0];
        assert!(slider.is_slider());
        assert_eq!(slider.bar_index, 1);
        assert_eq!(slider.time, 0);
        assert_eq!(slider.type_index, 1);
        assert_eq!(slider.volume, 1.0);
        assert_eq!(
            slider.slider_end(),
            Some(&SliderEnd {
                end_time: 1000,
                end_type_index: 2,
                end_volume: 0.5,
            })
        );

        assert_eq!(events[1].time, 250);
        assert_eq!(events[1].bar_index, 0);
    }

    #[test]
    fn slider_can_span_sections() {
        let beat_map = map(vec![
            section(0.0, 120.0, vec![row(0, 0, 1, vec![Some(slider_start(0, 1.0))])]),
            section(3000.0, 60.0, vec![row(1, 0, 1, vec![Some(slider_end(0, 1.0))])]),
        ]);

        let events = compile(&beat_map).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].end_time(), Some(4000));
    }

    #[test]
    fn rejects_second_head_in_open_lane() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![
                row(0, 0, 1, vec![None, None, Some(slider_start(0, 1.0))]),
                row(1, 0, 1, vec![None, None, Some(slider_start(0, 1.0))]),
            ],
        )]);

        let err = compile(&beat_map).unwrap_err();
        assert_eq!(err.kind, CompilationErrorKind::SliderAlreadyOpen);
        assert_eq!(
            err.location,
            ErrorLocation {
                section: Some(0),
                row: Some(1),
                bar: Some(2),
            }
        );
    }

    #[test]
    fn rejects_orphan_tail() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![
                row(0, 0, 1, vec![Some(slider_start(0, 1.0))]),
                row(1, 0, 1, vec![None, Some(slider_end(0, 1.0))]),
            ],
        )]);

        let err = compile(&beat_map).unwrap_err();
        assert_eq!(err.kind, CompilationErrorKind::SliderNotOpen);
        assert_eq!(err.location.row, Some(1));
        assert_eq!(err.location.bar, Some(1));
    }

    #[test]
    fn lanes_hold_independent_sliders() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![
                row(0, 0, 1, vec![Some(slider_start(0, 1.0)), Some(slider_start(1, 1.0))]),
                row(1, 0, 1, vec![Some(slider_end(0, 1.0)), None]),
                row(2, 0, 1, vec![Some(slider_start(0, 1.0)), Some(slider_end(1, 1.0))]),
            ],
        )]);

        let events = compile(&beat_map).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].end_time(), Some(500));
        assert_eq!(events[1].end_time(), Some(1000));
        // Never closed.
        assert!(events[2].is_slider());
        assert_eq!(events[2].slider_end(), None);
    }

    #[test]
    fn empty_slots_produce_nothing() {
        let beat_map = map(vec![section(0.0, 120.0, vec![row(0, 0, 1, vec![None; 4])])]);
        assert!(compile(&beat_map).unwrap().is_empty());
    }

    #[test]
    fn keeps_visitation_order() {
        let beat_map = map(vec![
            section(5000.0, 120.0, vec![row(0, 0, 1, vec![Some(note(0, 1.0))])]),
            section(0.0, 120.0, vec![row(0, 0, 1, vec![Some(note(1, 1.0))])]),
        ]);

        let times: Vec<_> = compile(&beat_map).unwrap().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![5000, 0]);
    }

    #[test]
    fn rejects_bars_beyond_lane_layout() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![row(0, 0, 1, vec![None, None, Some(note(0, 1.0))])],
        )]);

        let err = BeatMapCompiler::new(2).compile(&beat_map).unwrap_err();
        assert_eq!(err.kind, CompilationErrorKind::InvalidElement { lane_count: 2 });
        assert_eq!(err.location.bar, Some(2));
    }

    #[test]
    fn trailing_empty_slots_beyond_layout_are_ignored() {
        let beat_map = map(vec![section(
            0.0,
            120.0,
            vec![row(0, 0, 1, vec![Some(note(0, 1.0)), None, None])],
        )]);

        assert_eq!(BeatMapCompiler::new(1).compile(&beat_map).unwrap().len(), 1);
    }

    #[test]
    fn rejects_non_positive_bpm() {
        let beat_map = map(vec![section(0.0, 0.0, vec![row(0, 0, 1, vec![])])]);

        let err = compile(&beat_map).unwrap_err();
        assert!(matches!(err.kind, CompilationErrorKind::InvalidBpm { .. }));
        assert_eq!(err.location.section, Some(0));
        assert_eq!(err.location.row, None);
    }

    #[test]
    fn rejects_non_finite_start_time() {
        for start_time in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let beat_map = map(vec![
                section(0.0, 120.0, vec![row(0, 0, 1, vec![Some(note(0, 1.0))])]),
                section(start_time, 120.0, vec![row(0, 0, 1, vec![Some(note(0, 1.0))])]),
            ]);

            let err = compile(&beat_map).unwrap_err();
            assert!(matches!(err.kind, CompilationErrorKind::InvalidStartTime { .. }));
            assert_eq!(err.location.section, Some(1));
            assert_eq!(err.location.row, None);
        }
    }

    #[test]
    fn error_message_lists_known_coordinates() {
        let err = CompilationError::at(CompilationErrorKind::SliderNotOpen, 3, Some(7), Some(1));
        assert_eq!(
            err.to_string(),
            "attempting to end the slider before it even started\n\
             Details:\nSection index: 3,Row index: 7,Bars index: 1"
        );

        let err = CompilationError {
            kind: CompilationErrorKind::SliderAlreadyOpen,
            location: ErrorLocation::default(),
        };
        assert!(!err.to_string().contains("Details"));
    }

    #[test]
    fn renderer_slot_survives_serialization_as_absent() {
        let beat_map = map(vec![section(0.0, 120.0, vec![row(0, 0, 1, vec![Some(slider_start(0, 1.0))])])]);
        let mut events = compile(&beat_map).unwrap();
        events[0].connected_element = Some(ElementHandle(9));

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["kind"], "slider");
        assert!(json["end"].is_null());
        assert!(json.get("connected_element").is_none());
    }
}
