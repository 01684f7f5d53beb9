use std::collections::BTreeSet;

use crate::sequencer::{LookupError, SequencerError, SequencerModel};
use crate::types::PIXELS_PER_LINE;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockRow {
    pub clock: String,
    pub states: Vec<bool>,
}

/// Clock states over the acquisition window, one row per active clock.
#[derive(Clone, Debug)]
pub struct Timeline {
    pub function: String,
    pub offset: usize,
    pub extend: usize,
    pub rows: Vec<ClockRow>,
    /// Sorted, deduplicated indices where any row changes, plus both window ends.
    pub transitions: Vec<usize>,
}

impl Timeline {
    pub fn window_len(&self) -> usize {
        self.extend * PIXELS_PER_LINE
    }

    /// X tick positions: the clock edges, or one tick per 256-sample window.
    pub fn tick_positions(&self, mark_transitions: bool) -> Vec<usize> {
        if mark_transitions {
            self.transitions.clone()
        } else {
            (0..self.window_len()).step_by(PIXELS_PER_LINE).collect()
        }
    }
}

pub struct ClockTimelineBuilder {
    extend: usize,
}

impl Default for ClockTimelineBuilder {
    fn default() -> Self {
        Self { extend: 1 }
    }
}

impl ClockTimelineBuilder {
    pub fn new(extend: usize) -> Result<Self, SequencerError> {
        if extend == 0 {
            return Err(SequencerError::ZeroExtend);
        }
        Ok(Self { extend })
    }

    pub fn window_len(&self) -> usize {
        self.extend * PIXELS_PER_LINE
    }

    /// The periodic extension of `scope` from `offset`, one window long.
    /// Equivalent to tiling the period and slicing, without ever running
    /// short of tiled samples. `scope` must not be empty.
    pub fn window_states(&self, scope: &[bool], offset: usize) -> Vec<bool> {
        scope
            .iter()
            .copied()
            .cycle()
            .skip(offset)
            .take(self.window_len())
            .collect()
    }

    pub fn build(
        &self,
        model: &dyn SequencerModel,
        function: &str,
        offset: usize,
    ) -> Result<Timeline, SequencerError> {
        let func = model.require_function(function)?;
        let mut rows = Vec::with_capacity(func.clocks().len());
        for clock in func.clocks() {
            let scope = func.scope(model.require_channel(clock)?);
            if scope.is_empty() {
                return Err(LookupError::EmptyScope {
                    function: function.to_owned(),
                    clock: clock.clone(),
                }
                .into());
            }
            rows.push(ClockRow {
                clock: clock.clone(),
                states: self.window_states(&scope, offset),
            });
        }
        let transitions = merge_transitions(&rows, self.window_len());
        Ok(Timeline {
            function: func.name().to_owned(),
            offset,
            extend: self.extend,
            rows,
            transitions,
        })
    }
}

/// Indices `i` where `states[i] != states[i - 1]`.
pub fn transition_indices(states: &[bool]) -> impl Iterator<Item = usize> + '_ {
    states
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] != pair[1])
        .map(|(i, _)| i + 1)
}

fn merge_transitions(rows: &[ClockRow], window_len: usize) -> Vec<usize> {
    let mut edges = BTreeSet::from([0, window_len.saturating_sub(1)]);
    for row in rows {
        edges.extend(transition_indices(&row.states));
    }
    edges.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::description::tests::READOUT;
    use crate::sequencer::JsonSequencer;

    #[test]
    fn rows_span_the_window_for_every_offset() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        for extend in 1..=3 {
            let builder = ClockTimelineBuilder::new(extend).unwrap();
            for offset in 0..16 {
                let timeline = builder.build(&seq, "ReadPixel", offset).unwrap();
                assert_eq!(timeline.function, "ReadPixel");
                assert_eq!(timeline.rows.len(), 4);
                for row in &timeline.rows {
                    assert_eq!(row.states.len(), extend * 256);
                }
                let ticks = &timeline.transitions;
                assert_eq!(ticks.first(), Some(&0));
                assert_eq!(ticks.last(), Some(&(extend * 256 - 1)));
                assert!(ticks.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn window_starts_at_the_trigger() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let timeline = ClockTimelineBuilder::default().build(&seq, "ReadPixel", 5).unwrap();
        let trg = timeline.rows.iter().find(|r| r.clock == "TRG").unwrap();
        let fired: Vec<usize> = trg.states.iter().enumerate().filter(|(_, s)| **s).map(|(i, _)| i).collect();
        assert_eq!(fired[..3], [0, 16, 32]);
        assert_eq!(fired.len(), 16);
    }

    #[test]
    fn finds_edges() {
        let states = [false, false, true, true, false, true];
        assert_eq!(transition_indices(&states).collect::<Vec<_>>(), vec![2, 4, 5]);
        let builder = ClockTimelineBuilder::default();
        let rows = vec![
            ClockRow { clock: "A".into(), states: builder.window_states(&[true, false], 0) },
            ClockRow { clock: "B".into(), states: builder.window_states(&[false; 4], 0) },
        ];
        let merged = merge_transitions(&rows, 256);
        assert_eq!(merged.len(), 256);
        assert_eq!(merged[..3], [0, 1, 2]);
    }

    #[test]
    fn regular_ticks_every_window() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let timeline = ClockTimelineBuilder::new(3).unwrap().build(&seq, "ReadPixel", 0).unwrap();
        assert_eq!(timeline.tick_positions(false), vec![0, 256, 512]);
        assert_eq!(timeline.tick_positions(true), timeline.transitions);
    }

    #[test]
    fn zero_extend_is_rejected() {
        assert!(matches!(ClockTimelineBuilder::new(0), Err(SequencerError::ZeroExtend)));
    }
}
