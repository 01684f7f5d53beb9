//! Minimal FITS reader covering what scan files use: a primary HDU
//! followed by 2-D integer image extensions named with `EXTNAME`.
use std::path::Path;

use ndarray::Array2;

use crate::scan::{DecodeError, ImageContainer};

pub const FITS_BLOCK: usize = 2880;
const CARD_LEN: usize = 80;

#[derive(Clone, Debug, PartialEq)]
pub enum CardValue {
    Logical(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Clone, Debug, Default)]
pub struct FitsHeader {
    cards: Vec<(String, CardValue)>,
}

impl FitsHeader {
    pub fn get(&self, key: &str) -> Option<&CardValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            CardValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            CardValue::Int(v) => Some(*v as f64),
            CardValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            CardValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    fn required_int(&self, key: &str) -> Result<i64, DecodeError> {
        self.int(key)
            .ok_or_else(|| DecodeError::Fits(format!("missing integer keyword {key}")))
    }

    fn axes(&self) -> Result<Vec<usize>, DecodeError> {
        let naxis = self.required_int("NAXIS")?;
        (1..=naxis)
            .map(|n| {
                let len = self.required_int(&format!("NAXIS{n}"))?;
                usize::try_from(len)
                    .map_err(|_| DecodeError::Fits(format!("negative NAXIS{n} = {len}")))
            })
            .collect()
    }

    fn data_len(&self) -> Result<usize, DecodeError> {
        let axes = self.axes()?;
        if axes.is_empty() {
            return Ok(0);
        }
        let overflow = || DecodeError::Fits("data size overflows".into());
        let bytes_per_value = usize::try_from(self.required_int("BITPIX")?.unsigned_abs() / 8)
            .map_err(|_| overflow())?;
        let pcount = usize::try_from(self.int("PCOUNT").unwrap_or(0).max(0)).map_err(|_| overflow())?;
        let gcount = usize::try_from(self.int("GCOUNT").unwrap_or(1).max(1)).map_err(|_| overflow())?;
        axes.iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len))
            .and_then(|pixels| pixels.checked_add(pcount))
            .and_then(|values| values.checked_mul(gcount))
            .and_then(|values| values.checked_mul(bytes_per_value))
            .ok_or_else(overflow)
    }
}

struct Hdu {
    header: FitsHeader,
    data_start: usize,
    data_len: usize,
}

pub struct FitsFile {
    bytes: Vec<u8>,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let mut hdus = Vec::new();
        let mut pos = 0;
        while bytes.len() - pos >= FITS_BLOCK {
            // Some writers pad the file with blank blocks after the last HDU.
            if bytes[pos..pos + FITS_BLOCK].iter().all(|&b| b == 0 || b == b' ') {
                break;
            }
            let (header, header_len) = parse_header(&bytes[pos..])?;
            let data_start = pos + header_len;
            let data_len = header.data_len()?;
            let data_end = data_start
                .checked_add(data_len)
                .ok_or_else(|| DecodeError::Fits("data size overflows".into()))?;
            if data_end > bytes.len() {
                return Err(DecodeError::Fits(format!(
                    "HDU {} needs {data_len} data bytes, file ends first",
                    hdus.len()
                )));
            }
            pos = data_end.saturating_add(padded(data_len) - data_len);
            hdus.push(Hdu {
                header,
                data_start,
                data_len,
            });
            if pos > bytes.len() {
                break;
            }
        }
        if hdus.is_empty() {
            return Err(DecodeError::Fits("no header block".into()));
        }
        Ok(Self { bytes, hdus })
    }

    pub fn header(&self, index: usize) -> Option<&FitsHeader> {
        self.hdus.get(index).map(|hdu| &hdu.header)
    }
}

impl ImageContainer for FitsFile {
    fn image_count(&self) -> usize {
        self.hdus.len()
    }

    fn read_image(&self, index: usize) -> Result<Array2<u32>, DecodeError> {
        let hdu = self.hdus.get(index).ok_or(DecodeError::ChannelOutOfRange {
            index,
            available: self.hdus.len(),
        })?;
        let header = &hdu.header;
        let axes = header.axes()?;
        let (width, height) = match axes.as_slice() {
            [width, height] => (*width, *height),
            other => {
                return Err(DecodeError::Fits(format!(
                    "HDU {index} has {} axes, expected a 2-D image",
                    other.len()
                )))
            }
        };
        let bzero = header.float("BZERO").unwrap_or(0.0);
        let bscale = header.float("BSCALE").unwrap_or(1.0);
        let data = &self.bytes[hdu.data_start..hdu.data_start + hdu.data_len];
        let raw: Vec<i64> = match header.required_int("BITPIX")? {
            8 => data.iter().map(|&b| i64::from(b)).collect(),
            16 => data
                .chunks_exact(2)
                .map(|c| i64::from(i16::from_be_bytes([c[0], c[1]])))
                .collect(),
            32 => data
                .chunks_exact(4)
                .map(|c| i64::from(i32::from_be_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
            other => {
                return Err(DecodeError::Fits(format!(
                    "unsupported BITPIX {other} in HDU {index}"
                )))
            }
        };
        let values = raw
            .into_iter()
            .map(|v| physical_sample(bzero + bscale * v as f64, index))
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(Array2::from_shape_vec((height, width), values)?)
    }

    fn find_extension(&self, name: &str) -> Option<usize> {
        self.hdus
            .iter()
            .position(|hdu| hdu.header.text("EXTNAME") == Some(name))
    }
}

fn physical_sample(value: f64, index: usize) -> Result<u32, DecodeError> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(DecodeError::Fits(format!(
            "HDU {index} holds {value}, not a non-negative integer sample"
        )));
    }
    Ok(value as u32)
}

fn padded(len: usize) -> usize {
    len.div_ceil(FITS_BLOCK) * FITS_BLOCK
}

/// Parse header cards up to `END`; returns the header and its byte length.
fn parse_header(bytes: &[u8]) -> Result<(FitsHeader, usize), DecodeError> {
    let mut header = FitsHeader::default();
    for (n, card) in bytes.chunks_exact(CARD_LEN).enumerate() {
        if !card.is_ascii() {
            return Err(DecodeError::Fits(format!("card {n} is not ASCII")));
        }
        let card = String::from_utf8_lossy(card);
        let keyword = card[..8].trim_end();
        if keyword == "END" {
            return Ok((header, padded((n + 1) * CARD_LEN)));
        }
        if &card[8..10] != "= " {
            continue;
        }
        if let Some(value) = parse_value(&card[10..]) {
            header.cards.push((keyword.to_owned(), value));
        }
    }
    Err(DecodeError::Fits("header has no END card".into()))
}

fn parse_value(field: &str) -> Option<CardValue> {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    return Some(CardValue::Text(text.trim_end().to_owned()));
                }
            }
            text.push(c);
        }
        return None;
    }
    let token = field.split('/').next().unwrap_or("").trim();
    match token {
        "T" => Some(CardValue::Logical(true)),
        "F" => Some(CardValue::Logical(false)),
        _ => token
            .parse::<i64>()
            .map(CardValue::Int)
            .or_else(|_| token.replace('D', "E").parse::<f64>().map(CardValue::Float))
            .ok(),
    }
}
