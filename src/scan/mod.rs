// src/scan/mod.rs
pub mod aggregate;
pub mod container;
pub mod error;
pub mod fits;
pub mod loader;
pub mod raw;
pub use aggregate::{clip_first_sample, LineWindow, WaveformAggregator};
pub use container::{ImageContainer, MemoryContainer, StructuredFileAdapter};
pub use error::DecodeError;
pub use fits::FitsFile;
pub use loader::{channel_index_from_name, ChannelImage, ScanDataLoader, ScanFormat, Stream};
pub use raw::{decode_bits, RawBufferDecoder};
