// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::scan::DecodeError;
use crate::sequencer::SequencerError;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("drawing failed: {err}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(err: image::ImageError) -> Self {
        ScopeError::Plot(format!("PNG encoding failed: {err}"))
    }
}
