use std::path::Path;

use log::{debug, warn};
use ndarray::{Array2, Axis};

use crate::scan::raw::{words_from_bytes, RawBufferDecoder};
use crate::scan::{DecodeError, FitsFile, StructuredFileAdapter};
use crate::types::{SampleBuffer, RAW_CHANNEL_COUNT};

/// Extensions routed to the structured container reader.
const STRUCTURED_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ScanFormat {
    Structured,
    Raw,
}

impl ScanFormat {
    pub fn from_path(path: &Path) -> Self {
        let structured = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                STRUCTURED_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if structured {
            ScanFormat::Structured
        } else {
            ScanFormat::Raw
        }
    }
}

/// Outcome of loading one data stream. An absent stream is skipped by
/// every consumer; it never aborts a display.
#[derive(Debug)]
pub enum Stream<T> {
    Present(T),
    Absent(DecodeError),
}

impl<T> Stream<T> {
    pub fn from_result(result: Result<T, DecodeError>) -> Self {
        match result {
            Ok(value) => Stream::Present(value),
            Err(reason) => Stream::Absent(reason),
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Stream::Present(value) => Some(value),
            Stream::Absent(_) => None,
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, DecodeError>) -> Stream<U> {
        match self {
            Stream::Present(value) => Stream::from_result(f(value)),
            Stream::Absent(reason) => Stream::Absent(reason),
        }
    }
}

/// One channel's (line, pixel) image plus the format it came from.
#[derive(Clone, Debug)]
pub struct ChannelImage {
    pub format: ScanFormat,
    pub lines: Array2<u32>,
}

/// Parse the channel index from the trailing digits of a name
/// (`Segment07` is 7, `chan_09` is 9).
pub fn channel_index_from_name(name: &str) -> Result<usize, DecodeError> {
    let digits_at = name
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    name[digits_at..]
        .parse()
        .map_err(|_| DecodeError::ChannelName(name.to_owned()))
}

/// Format-agnostic entry point for scan files.
pub struct ScanDataLoader {
    raw_channel_count: usize,
}

impl Default for ScanDataLoader {
    fn default() -> Self {
        Self {
            raw_channel_count: RAW_CHANNEL_COUNT,
        }
    }
}

impl ScanDataLoader {
    pub fn new(raw_channel_count: usize) -> Self {
        Self { raw_channel_count }
    }

    pub fn load(&self, path: &Path, channels: Option<&[usize]>) -> Result<SampleBuffer, DecodeError> {
        match ScanFormat::from_path(path) {
            ScanFormat::Structured => {
                StructuredFileAdapter::new(FitsFile::open(path)?).stack_channels(channels)
            }
            ScanFormat::Raw => {
                let decoder = RawBufferDecoder::new(self.raw_channel_count)?;
                decoder.decode(&self.read_words(path)?, channels)
            }
        }
    }

    /// Single channel by identifier: an extension name for structured files
    /// (falling back to its trailing digits), the trailing digits for raw dumps.
    pub fn load_channel(&self, path: &Path, channel: &str) -> Result<ChannelImage, DecodeError> {
        let format = ScanFormat::from_path(path);
        let lines = match format {
            ScanFormat::Structured => {
                let adapter = StructuredFileAdapter::new(FitsFile::open(path)?);
                match adapter.read_extension(channel) {
                    Err(DecodeError::MissingExtension(_)) => {
                        adapter.read_channel(channel_index_from_name(channel)?)?
                    }
                    other => other?,
                }
            }
            ScanFormat::Raw => {
                let index = channel_index_from_name(channel)?;
                let decoder = RawBufferDecoder::new(self.raw_channel_count)?;
                let buffer = decoder.decode(&self.read_words(path)?, Some(&[index]))?;
                buffer.index_axis_move(Axis(0), 0)
            }
        };
        Ok(ChannelImage { format, lines })
    }

    /// Like [`ScanDataLoader::load_channel`], but a failure becomes an absent stream.
    pub fn channel_stream(&self, path: Option<&Path>, channel: &str) -> Stream<ChannelImage> {
        let Some(path) = path else {
            debug!("no file given for channel {channel}");
            return Stream::Absent(DecodeError::NotProvided);
        };
        let stream = Stream::from_result(self.load_channel(path, channel));
        if let Stream::Absent(reason) = &stream {
            warn!("skipping {}: {reason}", path.display());
        }
        stream
    }

    fn read_words(&self, path: &Path) -> Result<Vec<u32>, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.len() % 4 != 0 {
            warn!(
                "{} ends with {} bytes short of a word",
                path.display(),
                bytes.len() % 4
            );
        }
        Ok(words_from_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::fits::tests::fits_bytes;
    use crate::scan::raw::decode_bits;
    use crate::scan::{LineWindow, WaveformAggregator};
    use crate::types::PIXELS_PER_LINE;
    use std::path::PathBuf;

    fn scratch_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ccd-scope-{}-{name}", std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn raw_dump(channels: usize, samples_per_channel: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(channels * samples_per_channel * 4);
        for sample in 0..samples_per_channel {
            for ch in 0..channels {
                let value = (ch * 1000 + sample % PIXELS_PER_LINE) as u32;
                bytes.extend(decode_bits(value).to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn routes_by_extension() {
        assert_eq!(ScanFormat::from_path(Path::new("scan.fits")), ScanFormat::Structured);
        assert_eq!(ScanFormat::from_path(Path::new("scan.FIT")), ScanFormat::Structured);
        assert_eq!(ScanFormat::from_path(Path::new("scan.bin")), ScanFormat::Raw);
        assert_eq!(ScanFormat::from_path(Path::new("scan")), ScanFormat::Raw);
    }

    #[test]
    fn parses_channel_names() {
        assert_eq!(channel_index_from_name("chan_09").unwrap(), 9);
        assert_eq!(channel_index_from_name("Segment15").unwrap(), 15);
        assert_eq!(channel_index_from_name("3").unwrap(), 3);
        assert!(matches!(channel_index_from_name("TRG"), Err(DecodeError::ChannelName(_))));
    }

    #[test]
    fn full_raw_dump_decodes_and_averages() {
        // 256 complete lines plus a partial trailing line of 100 samples
        let path = scratch_file("full.raw", &raw_dump(48, 256 * 256 + 100));
        let loader = ScanDataLoader::default();
        let buffer = loader.load(&path, None).unwrap();
        assert_eq!(buffer.dim(), (48, 256, 256));
        let trace = WaveformAggregator::new(LineWindow::ALL)
            .channel_trace(&buffer, 9)
            .unwrap();
        assert_eq!(trace.len(), 256);
        assert_eq!(trace[17], 9017.0);
        let single = loader.load_channel(&path, "chan_09").unwrap();
        assert_eq!(single.format, ScanFormat::Raw);
        assert_eq!(single.lines, buffer.index_axis(Axis(0), 9));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn structured_channel_by_name_or_index() {
        let image = Array2::from_elem((12, 256), 500u32);
        let path = scratch_file(
            "scan.fits",
            &fits_bytes(&[("Segment00", image.clone()), ("Segment01", image.mapv(|v| v + 1))]),
        );
        let loader = ScanDataLoader::default();
        let by_name = loader.load_channel(&path, "Segment01").unwrap();
        assert_eq!(by_name.format, ScanFormat::Structured);
        assert_eq!(by_name.lines[[0, 0]], 501);
        assert_eq!(loader.load_channel(&path, "amp_00").unwrap().lines, image);
        assert_eq!(loader.load(&path, Some(&[1])).unwrap().dim(), (1, 12, 256));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_absent_stream() {
        let loader = ScanDataLoader::default();
        let missing = Path::new("/nonexistent/dsi-scan.fits");
        let stream = loader.channel_stream(Some(missing), "Segment00");
        assert!(matches!(stream, Stream::Absent(DecodeError::Io { .. })));
        assert!(matches!(
            loader.channel_stream(None, "Segment00"),
            Stream::Absent(DecodeError::NotProvided)
        ));
    }
}
