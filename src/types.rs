// src/types.rs
use ndarray::{Array1, Array3};

/// Pixel columns per scan line; fixed by the readout board.
pub const PIXELS_PER_LINE: usize = 256;
/// Interleaved channels in a full multiplexed raw dump.
pub const RAW_CHANNEL_COUNT: usize = 48;
/// Image extensions in a structured scan file.
pub const STRUCTURED_CHANNEL_COUNT: usize = 16;

/// Scan samples with axes (channel, scan-line, pixel).
pub type SampleBuffer = Array3<u32>;
/// Per-pixel mean intensity of one channel, in ADU.
pub type Trace = Array1<f64>;

// Acquisition modes producing parallel streams for the same channel.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum StreamKind {
    Dsi,
    TransparentMode,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Dsi => "DSI",
            StreamKind::TransparentMode => "TM",
        }
    }
}
