use std::path::PathBuf;
use thiserror::Error;
/// A name requested by the caller is missing from the sequencer model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown sequencer function {0:?}")]
    Function(String),
    #[error("clock {0:?} is not in the sequencer channel table")]
    Clock(String),
    #[error("unknown sequencer program {0:?}")]
    Program(String),
    #[error("no function called from {program:?} drives clock {clock:?}")]
    NoFunctionWithClock { program: String, clock: String },
    #[error("function {function:?} has an empty scope trace for clock {clock:?}")]
    EmptyScope { function: String, clock: String },
}
/// The trigger clock never fires inside the function, so no ADC window exists.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("trigger clock {clock:?} is never active in function {function:?}")]
pub struct AlignmentError {
    pub function: String,
    pub clock: String,
}
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    #[error("timeline extend factor must be at least 1")]
    ZeroExtend,
    #[error("failed to read sequencer file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid sequencer description: {0}")]
    Description(#[from] serde_json::Error),
}
