use ndarray::{Array2, ArrayView2, Axis};

use crate::scan::DecodeError;
use crate::types::{SampleBuffer, PIXELS_PER_LINE};

/// Anything that stores a stack of 2-D images, addressable by position or
/// extension name. Entry 0 is the primary entry and carries no scan data.
pub trait ImageContainer {
    fn image_count(&self) -> usize;
    fn read_image(&self, index: usize) -> Result<Array2<u32>, DecodeError>;
    fn find_extension(&self, name: &str) -> Option<usize>;
}

/// In-memory container useful for tests and synthetic scans.
pub struct MemoryContainer {
    images: Vec<(String, Array2<u32>)>,
}

impl MemoryContainer {
    pub fn new(extensions: impl IntoIterator<Item = (String, Array2<u32>)>) -> Self {
        let mut images = vec![(String::from("PRIMARY"), Array2::zeros((0, 0)))];
        images.extend(extensions);
        Self { images }
    }
}

impl ImageContainer for MemoryContainer {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn read_image(&self, index: usize) -> Result<Array2<u32>, DecodeError> {
        self.images
            .get(index)
            .map(|(_, image)| image.clone())
            .ok_or(DecodeError::ChannelOutOfRange {
                index,
                available: self.images.len(),
            })
    }

    fn find_extension(&self, name: &str) -> Option<usize> {
        self.images.iter().position(|(ext, _)| ext == name)
    }
}

/// Presents a structured container with the same (channel, line, pixel)
/// layout the raw decoder produces. Channel `c` lives in entry `c + 1`.
pub struct StructuredFileAdapter<C: ImageContainer> {
    container: C,
}

impl<C: ImageContainer> StructuredFileAdapter<C> {
    pub fn new(container: C) -> Self {
        Self { container }
    }

    pub fn channel_count(&self) -> usize {
        self.container.image_count().saturating_sub(1)
    }

    pub fn read_channel(&self, channel: usize) -> Result<Array2<u32>, DecodeError> {
        if channel >= self.channel_count() {
            return Err(DecodeError::ChannelOutOfRange {
                index: channel,
                available: self.channel_count(),
            });
        }
        let image = self.container.read_image(channel + 1)?;
        check_pixel_count(channel, &image)?;
        Ok(image)
    }

    pub fn read_extension(&self, name: &str) -> Result<Array2<u32>, DecodeError> {
        let index = self
            .container
            .find_extension(name)
            .ok_or_else(|| DecodeError::MissingExtension(name.to_owned()))?;
        let image = self.container.read_image(index)?;
        check_pixel_count(index.saturating_sub(1), &image)?;
        Ok(image)
    }

    /// Stack the requested channels; every extension when `channels` is `None`.
    pub fn stack_channels(&self, channels: Option<&[usize]>) -> Result<SampleBuffer, DecodeError> {
        let selection: Vec<usize> = match channels {
            Some(selection) => selection.to_vec(),
            None => (0..self.channel_count()).collect(),
        };
        let mut images: Vec<Array2<u32>> = Vec::with_capacity(selection.len());
        for &channel in &selection {
            let image = self.read_channel(channel)?;
            if let Some(first) = images.first() {
                if first.dim() != image.dim() {
                    return Err(DecodeError::ShapeMismatch {
                        index: channel,
                        expected: first.dim(),
                        actual: image.dim(),
                    });
                }
            }
            images.push(image);
        }
        if images.is_empty() {
            return Ok(SampleBuffer::zeros((0, 0, PIXELS_PER_LINE)));
        }
        let views: Vec<ArrayView2<u32>> = images.iter().map(|image| image.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }
}

fn check_pixel_count(channel: usize, image: &Array2<u32>) -> Result<(), DecodeError> {
    if image.ncols() != PIXELS_PER_LINE {
        return Err(DecodeError::PixelCount {
            index: channel,
            expected: PIXELS_PER_LINE,
            actual: image.ncols(),
        });
    }
    Ok(())
}
