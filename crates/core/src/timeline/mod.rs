use serde::{Deserialize, Serialize};

use crate::CompiledEvent;

/// A sample to fire at a point of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    /// Milliseconds since playback started.
    pub time: i64,
    pub bar_index: usize,
    pub type_index: usize,
    pub volume: f32,
}

/// Cursor over the triggers of a compiled timeline.
///
/// Slider heads and tails become separate triggers. Triggers are ordered by
/// time here, the compiled timeline itself is left as authored.
#[derive(Debug, Default)]
pub struct Scheduler {
    triggers: Vec<ScheduledTrigger>,
    next_trigger: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the trigger list, shifting every time by `start_offset` ms.
    pub fn from_events(events: &[CompiledEvent], start_offset: f64) -> Self {
        let offset = start_offset.round() as i64;
        let mut triggers = Vec::with_capacity(events.len());

        for event in events {
            triggers.push(ScheduledTrigger {
                time: event.time + offset,
                bar_index: event.bar_index,
                type_index: event.type_index,
                volume: event.volume,
            });
            if let Some(end) = event.slider_end() {
                triggers.push(ScheduledTrigger {
                    time: end.end_time + offset,
                    bar_index: event.bar_index,
                    type_index: end.end_type_index,
                    volume: end.end_volume,
                });
            }
        }
        triggers.sort_by_key(|trigger| trigger.time);

        Self {
            triggers,
            next_trigger: 0,
        }
    }

    /// Triggers that became due since the previous call.
    pub fn due(&mut self, now_ms: i64) -> &[ScheduledTrigger] {
        let start = self.next_trigger;
        while self
            .triggers
            .get(self.next_trigger)
            .is_some_and(|trigger| trigger.time <= now_ms)
        {
            self.next_trigger += 1;
        }
        &self.triggers[start..self.next_trigger]
    }

    pub fn reset(&mut self) {
        self.next_trigger = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.next_trigger >= self.triggers.len()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Time of the last trigger, if any.
    pub fn last_time(&self) -> Option<i64> {
        self.triggers.last().map(|trigger| trigger.time)
    }
}
