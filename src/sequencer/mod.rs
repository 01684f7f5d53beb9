// src/sequencer/mod.rs
pub mod alignment;
pub mod description;
pub mod error;
pub mod model;
pub mod timeline;
pub use alignment::{AlignmentResolver, ReadoutFunction};
pub use description::{JsonSequencer, TimeSlice};
pub use error::{AlignmentError, LookupError, SequencerError};
pub use model::{SequencerFunction, SequencerModel};
pub use timeline::{transition_indices, ClockRow, ClockTimelineBuilder, Timeline};
