//! Decoder for raw multiplexed dumps written by the acquisition board.
//!
//! A dump is a flat run of little-endian 32-bit words. Each pixel period
//! contributes one word per channel, so the stream reads
//! `line 0 / pixel 0 / ch 0..N`, `line 0 / pixel 1 / ch 0..N`, and so on.
//! Channel `c` of the decoded buffer is interleave position `c`, the same
//! 0-based index a structured file stores in extension `c + 1`.
use log::debug;
use ndarray::{Array3, Axis};

use crate::scan::DecodeError;
use crate::types::{SampleBuffer, PIXELS_PER_LINE};

/// The board stores samples in two 17-bit regions of an 18-bit range;
/// flipping the low 17 bits maps them onto a single non-negative range.
pub const RAW_WORD_MASK: u32 = 0x1FFFF;

/// Undo the board's sample encoding. Applying it twice restores the word.
pub fn decode_bits(word: u32) -> u32 {
    word ^ RAW_WORD_MASK
}

/// Split a byte dump into little-endian words. Trailing bytes that do not
/// fill a word are ignored.
pub fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Number of words kept from a buffer of `len` words once the trailing
/// partial scan line is dropped.
pub fn kept_word_count(len: usize, channel_count: usize) -> usize {
    if channel_count == 0 {
        return 0;
    }
    let samples_per_channel = len / channel_count;
    PIXELS_PER_LINE * (samples_per_channel / PIXELS_PER_LINE) * channel_count
}

pub struct RawBufferDecoder {
    channel_count: usize,
}

impl RawBufferDecoder {
    pub fn new(channel_count: usize) -> Result<Self, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::NoChannels);
        }
        Ok(Self { channel_count })
    }

    /// Decode `words` into (channel, scan-line, pixel), keeping only
    /// `channels` (in the given order) when a subset is requested.
    pub fn decode(
        &self,
        words: &[u32],
        channels: Option<&[usize]>,
    ) -> Result<SampleBuffer, DecodeError> {
        let n = self.channel_count;
        if let Some(selection) = channels {
            if let Some(&index) = selection.iter().find(|&&c| c >= n) {
                return Err(DecodeError::ChannelOutOfRange {
                    index,
                    available: n,
                });
            }
        }
        let kept = kept_word_count(words.len(), n);
        if kept == 0 {
            return Err(DecodeError::NoCompleteLine {
                words: words.len(),
                channels: n,
            });
        }
        if kept < words.len() {
            debug!(
                "dropping {} trailing words of a partial scan line",
                words.len() - kept
            );
        }
        let lines = kept / (PIXELS_PER_LINE * n);
        let corrected: Vec<u32> = words[..kept].iter().map(|&w| decode_bits(w)).collect();
        let interleaved = Array3::from_shape_vec((lines, PIXELS_PER_LINE, n), corrected)?;
        let by_channel = interleaved.permuted_axes([2, 0, 1]);
        let buffer = match channels {
            Some(selection) => by_channel.select(Axis(0), selection),
            None => by_channel.as_standard_layout().to_owned(),
        };
        Ok(buffer)
    }
}
