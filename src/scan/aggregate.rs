use log::debug;
use ndarray::{ArrayView2, Axis, s};
use serde::Deserialize;

use crate::scan::DecodeError;
use crate::types::{SampleBuffer, Trace};

/// Scan lines excluded from the mean at each end of a channel's image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LineWindow {
    pub skip_leading: usize,
    pub skip_trailing: usize,
}

impl LineWindow {
    pub const ALL: LineWindow = LineWindow {
        skip_leading: 0,
        skip_trailing: 0,
    };

    /// Lines physically on the sensor in a structured scan: the first ten
    /// are pre-scan and the last fifty run past the sensor edge.
    pub fn sensor_region() -> Self {
        Self {
            skip_leading: 10,
            skip_trailing: 50,
        }
    }
}

/// Reduces a channel's (line, pixel) image to one trace per pixel.
pub struct WaveformAggregator {
    window: LineWindow,
}

impl WaveformAggregator {
    pub fn new(window: LineWindow) -> Self {
        Self { window }
    }

    pub fn trace(&self, lines: ArrayView2<u32>) -> Result<Trace, DecodeError> {
        let total = lines.nrows();
        let LineWindow {
            skip_leading,
            skip_trailing,
        } = self.window;
        let end = total.saturating_sub(skip_trailing);
        if skip_leading >= end {
            return Err(DecodeError::EmptyLineWindow {
                lines: total,
                leading: skip_leading,
                trailing: skip_trailing,
            });
        }
        let kept = lines.slice(s![skip_leading..end, ..]).mapv(f64::from);
        let mut trace = kept
            .mean_axis(Axis(0))
            .ok_or(DecodeError::EmptyLineWindow {
                lines: total,
                leading: skip_leading,
                trailing: skip_trailing,
            })?;
        clip_first_sample(&mut trace);
        Ok(trace)
    }

    /// Trace of the channel stored at `position` along the buffer's channel axis.
    pub fn channel_trace(&self, buffer: &SampleBuffer, position: usize) -> Result<Trace, DecodeError> {
        if position >= buffer.len_of(Axis(0)) {
            return Err(DecodeError::ChannelOutOfRange {
                index: position,
                available: buffer.len_of(Axis(0)),
            });
        }
        self.trace(buffer.index_axis(Axis(0), position))
    }

    pub fn traces(&self, buffer: &SampleBuffer) -> Result<Vec<Trace>, DecodeError> {
        buffer
            .axis_iter(Axis(0))
            .map(|lines| self.trace(lines))
            .collect()
    }
}

/// Clamp the first sample into `[0, max(trace[1..])]`.
///
/// The ADC trigger may fire one sample before the first valid pixel
/// transfer, leaving an outlier at index 0. This is a lossy correction:
/// the original first value is discarded. Returns whether the sample changed.
pub fn clip_first_sample(trace: &mut Trace) -> bool {
    if trace.len() < 2 {
        return false;
    }
    let ceiling = trace
        .slice(s![1..])
        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let first = trace[0];
    let clipped = first.max(0.0).min(ceiling);
    if clipped != first {
        debug!("clipped first trace sample from {first} to {clipped}");
        trace[0] = clipped;
        return true;
    }
    false
}
