// src/display/mod.rs
pub mod orchestrate;
pub mod plot;
pub use orchestrate::{
    channel_trace, combined_scope, scan_comparison, sequencer_scope, CombinedScope, LabeledTrace,
    ScanComparison, ScanLayout, ScanPanel, SequencerScope, TimelineRequest,
};
pub use plot::{render_combined_png, render_scan_png, render_sequencer_png, write_png, PlotStyle};
