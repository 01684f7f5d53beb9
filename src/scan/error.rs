use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no data file given")]
    NotProvided,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("channel count must be greater than zero")]
    NoChannels,
    #[error("{words} words hold no complete scan line for {channels} channels")]
    NoCompleteLine { words: usize, channels: usize },
    #[error("channel {index} out of range: {available} channels available")]
    ChannelOutOfRange { index: usize, available: usize },
    #[error("cannot derive a channel index from {0:?}")]
    ChannelName(String),
    #[error("extension {0:?} not found")]
    MissingExtension(String),
    #[error("image {index} has {actual} pixel columns, expected {expected}")]
    PixelCount {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("image {index} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("malformed FITS data: {0}")]
    Fits(String),
    #[error("no scan line left out of {lines} after skipping {leading} leading and {trailing} trailing")]
    EmptyLineWindow {
        lines: usize,
        leading: usize,
        trailing: usize,
    },
    #[error("cannot reshape buffer: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
