//! Composition of the decoding and alignment stages into figure data.
//! Nothing here draws; see `display::plot` for rendering.
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::ScopeConfig;
use crate::error::ScopeError;
use crate::scan::{LineWindow, ScanDataLoader, Stream, WaveformAggregator};
use crate::sequencer::{
    AlignmentResolver, ClockTimelineBuilder, ReadoutFunction, SequencerError, SequencerModel,
    Timeline,
};
use crate::types::{StreamKind, Trace, PIXELS_PER_LINE};

/// Spacing of regular ticks on a single 256-sample scan.
const SCAN_TICK_STEP: usize = 32;

#[derive(Clone, Debug)]
pub struct LabeledTrace {
    pub label: String,
    /// Palette slot; the file index in comparison views.
    pub color_index: usize,
    pub trace: Trace,
}

/// Which sequencer function to show and how to lay out its window.
#[derive(Clone, Copy, Debug)]
pub struct TimelineRequest<'a> {
    pub readout: &'a str,
    pub trigger: &'a str,
    pub extend: usize,
    pub mark_transitions: bool,
}

impl<'a> TimelineRequest<'a> {
    pub fn from_config(config: &'a ScopeConfig, readout: &'a str) -> Self {
        Self {
            readout,
            trigger: &config.trigger_clock,
            extend: config.extend,
            mark_transitions: config.mark_transitions,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SequencerScope {
    pub readout: ReadoutFunction,
    pub timeline: Timeline,
    pub ticks: Vec<usize>,
}

impl SequencerScope {
    pub fn function(&self) -> &str {
        self.readout.function()
    }
}

#[derive(Clone, Debug)]
pub struct CombinedScope {
    pub title: String,
    pub traces: Vec<LabeledTrace>,
    pub sequencer: SequencerScope,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ScanLayout {
    /// One panel per channel, every file overlaid.
    Overlay,
    /// Channels appended end to end, one line per file.
    Stitched,
}

#[derive(Clone, Debug)]
pub struct ScanPanel {
    pub title: String,
    pub traces: Vec<LabeledTrace>,
    pub ticks: Vec<(usize, String)>,
}

#[derive(Clone, Debug)]
pub struct ScanComparison {
    pub layout: ScanLayout,
    pub panels: Vec<ScanPanel>,
}

/// Resolve the readout function and its trigger offset, then build the
/// clock timeline over the acquisition window.
pub fn sequencer_scope(
    model: &dyn SequencerModel,
    request: &TimelineRequest,
) -> Result<SequencerScope, ScopeError> {
    let readout = ReadoutFunction::resolve(model, request.readout, request.trigger)
        .map_err(SequencerError::from)?;
    let offset = AlignmentResolver::new(request.trigger).offset(model, readout.function())?;
    let timeline =
        ClockTimelineBuilder::new(request.extend)?.build(model, readout.function(), offset)?;
    let ticks = timeline.tick_positions(request.mark_transitions);
    info!(
        "{}: {} clocks, {} ticks",
        readout.function(),
        timeline.rows.len(),
        ticks.len()
    );
    Ok(SequencerScope {
        readout,
        timeline,
        ticks,
    })
}

/// Mean trace of one channel of one file, or the reason it is unavailable.
pub fn channel_trace(
    loader: &ScanDataLoader,
    config: &ScopeConfig,
    path: Option<&Path>,
    channel: &str,
) -> Stream<Trace> {
    loader.channel_stream(path, channel).and_then(|image| {
        WaveformAggregator::new(config.line_window(image.format)).trace(image.lines.view())
    })
}

/// DSI and TM traces of one channel under the readout function's clocks.
/// Either stream may be absent; a failed alignment aborts.
pub fn combined_scope(
    model: &dyn SequencerModel,
    dsi: Stream<Trace>,
    tm: Stream<Trace>,
    channel: &str,
    sequencer_name: &str,
    request: &TimelineRequest,
) -> Result<CombinedScope, ScopeError> {
    let sequencer = sequencer_scope(model, request)?;
    let mut traces = Vec::new();
    for (kind, stream) in [(StreamKind::Dsi, dsi), (StreamKind::TransparentMode, tm)] {
        match stream {
            Stream::Present(trace) => traces.push(LabeledTrace {
                label: kind.label().to_owned(),
                color_index: traces.len(),
                trace,
            }),
            Stream::Absent(reason) => warn!("no {} trace for {channel}: {reason}", kind.label()),
        }
    }
    let title = format!("{} in {sequencer_name} for {channel}", sequencer.function());
    Ok(CombinedScope {
        title,
        traces,
        sequencer,
    })
}

fn file_label(path: &Path, index: usize) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("file {index}"))
}

/// Traces of `channels` from every readable file. Unreadable files are skipped.
pub fn scan_comparison(
    loader: &ScanDataLoader,
    files: &[PathBuf],
    channels: &[usize],
    layout: ScanLayout,
) -> ScanComparison {
    let aggregator = WaveformAggregator::new(LineWindow::ALL);
    let mut per_file = Vec::new();
    for (index, path) in files.iter().enumerate() {
        let stream = Stream::from_result(loader.load(path, Some(channels)))
            .and_then(|buffer| aggregator.traces(&buffer));
        match stream {
            Stream::Present(traces) => per_file.push((index, file_label(path, index), traces)),
            Stream::Absent(reason) => warn!("skipping {}: {reason}", path.display()),
        }
    }
    let panels = match layout {
        ScanLayout::Overlay => channels
            .iter()
            .enumerate()
            .map(|(position, channel)| ScanPanel {
                title: format!("C{channel}"),
                traces: per_file
                    .iter()
                    .map(|(index, label, traces)| LabeledTrace {
                        label: label.clone(),
                        color_index: *index,
                        trace: traces[position].clone(),
                    })
                    .collect(),
                ticks: (0..PIXELS_PER_LINE)
                    .step_by(SCAN_TICK_STEP)
                    .map(|t| (t, t.to_string()))
                    .collect(),
            })
            .collect(),
        ScanLayout::Stitched if channels.is_empty() => Vec::new(),
        ScanLayout::Stitched => vec![ScanPanel {
            title: "Scanned channel".to_owned(),
            traces: per_file
                .iter()
                .map(|(index, label, traces)| LabeledTrace {
                    label: label.clone(),
                    color_index: *index,
                    trace: traces.iter().flat_map(|t| t.iter().copied()).collect(),
                })
                .collect(),
            ticks: channels
                .iter()
                .enumerate()
                .map(|(position, channel)| (position * PIXELS_PER_LINE, channel.to_string()))
                .collect(),
        }],
    };
    ScanComparison { layout, panels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::fits::tests::fits_bytes;
    use crate::scan::DecodeError;
    use crate::sequencer::description::tests::READOUT;
    use crate::sequencer::{AlignmentError, JsonSequencer};
    use ndarray::Array2;

    fn request<'a>(readout: &'a str) -> TimelineRequest<'a> {
        TimelineRequest {
            readout,
            trigger: "TRG",
            extend: 1,
            mark_transitions: true,
        }
    }

    fn scratch_fits(name: &str, base: u32) -> PathBuf {
        let images: Vec<(String, Array2<u32>)> = (0..4)
            .map(|c| (format!("Segment{c:02}"), Array2::from_elem((8, 256), base + c)))
            .collect();
        let borrowed: Vec<(&str, Array2<u32>)> =
            images.iter().map(|(n, i)| (n.as_str(), i.clone())).collect();
        let path = std::env::temp_dir().join(format!("ccd-scope-{}-{name}.fits", std::process::id()));
        std::fs::write(&path, fits_bytes(&borrowed)).unwrap();
        path
    }

    #[test]
    fn sequencer_view_through_program() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let scope = sequencer_scope(&seq, &request("Acquisition")).unwrap();
        assert_eq!(scope.function(), "ReadPixel");
        assert_eq!(scope.timeline.offset, 5);
        assert_eq!(scope.ticks, scope.timeline.transitions);
    }

    #[test]
    fn combined_view_keeps_available_streams() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let dsi = Stream::Present(Trace::from_elem(256, 7.0));
        let tm = Stream::Absent(DecodeError::NotProvided);
        let combined = combined_scope(&seq, dsi, tm, "Segment00", "readout.json", &request("ReadPixel")).unwrap();
        assert_eq!(combined.traces.len(), 1);
        assert_eq!(combined.traces[0].label, "DSI");
        assert_eq!(combined.title, "ReadPixel in readout.json for Segment00");
    }

    #[test]
    fn combined_view_without_data_still_aligns() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let combined = combined_scope(
            &seq,
            Stream::Absent(DecodeError::NotProvided),
            Stream::Absent(DecodeError::NotProvided),
            "Segment00",
            "readout.json",
            &request("ReadPixel"),
        )
        .unwrap();
        assert!(combined.traces.is_empty());
        assert_eq!(combined.sequencer.timeline.rows.len(), 4);
    }

    #[test]
    fn failed_alignment_aborts_combined_view() {
        let seq = JsonSequencer::from_json_str(READOUT).unwrap();
        let err = combined_scope(
            &seq,
            Stream::Present(Trace::zeros(256)),
            Stream::Absent(DecodeError::NotProvided),
            "Segment00",
            "readout.json",
            &request("Idle"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScopeError::Sequencer(SequencerError::Alignment(AlignmentError { .. }))
        ));
    }

    #[test]
    fn channel_trace_skips_sensor_edges_for_structured_files() {
        let path = scratch_fits("edges", 100);
        let config = ScopeConfig {
            structured_lines: LineWindow {
                skip_leading: 2,
                skip_trailing: 2,
            },
            ..ScopeConfig::default()
        };
        let trace = channel_trace(&ScanDataLoader::default(), &config, Some(&path), "Segment02");
        assert_eq!(trace.present().map(|t| t[10]), Some(102.0));
        let too_short = channel_trace(&ScanDataLoader::default(), &ScopeConfig::default(), Some(&path), "Segment02");
        assert!(matches!(too_short, Stream::Absent(DecodeError::EmptyLineWindow { .. })));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn comparison_overlays_files_per_channel() {
        let first = scratch_fits("cmp-a", 10);
        let second = scratch_fits("cmp-b", 20);
        let missing = PathBuf::from("/nonexistent/scan.fits");
        let files = vec![first.clone(), missing, second.clone()];
        let loader = ScanDataLoader::default();

        let overlay = scan_comparison(&loader, &files, &[1, 3], ScanLayout::Overlay);
        assert_eq!(overlay.panels.len(), 2);
        let panel = &overlay.panels[1];
        assert_eq!(panel.title, "C3");
        let colors: Vec<usize> = panel.traces.iter().map(|t| t.color_index).collect();
        assert_eq!(colors, vec![0, 2]);
        assert_eq!(panel.traces[1].trace[40], 23.0);

        let stitched = scan_comparison(&loader, &files, &[1, 3], ScanLayout::Stitched);
        assert_eq!(stitched.panels.len(), 1);
        let line = &stitched.panels[0].traces[0].trace;
        assert_eq!(line.len(), 512);
        assert_eq!((line[100], line[300]), (11.0, 13.0));
        assert_eq!(stitched.panels[0].ticks, vec![(0, "1".to_owned()), (256, "3".to_owned())]);

        std::fs::remove_file(first).ok();
        std::fs::remove_file(second).ok();
    }
}
