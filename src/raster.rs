//! In-memory pixel arrays used by the detection pipeline.

use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage};


/// A `height` x `width` x `channels` raster of samples in [0, 1], stored row-major with
/// interleaved channels. Channels is one of 1 (gray), 3 (RGB) or 4 (RGBA).
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<f32>,
}

impl Image {
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<f32>) -> Result<Image> {
        if channels != 1 && channels != 3 && channels != 4 {
            return Err(Error::ChannelCount {
                expected: 3,
                actual: channels,
            });
        }
        if data.len() != width as usize * height as usize * channels {
            return Err(Error::ShapeMismatch {
                left: (height, width, channels),
                right: (0, data.len() as u32, 1),
            });
        }

        Ok(Image {
            width,
            height,
            channels,
            data,
        })
    }

    /// An image with every pixel set to `pixel`.
    pub fn filled(width: u32, height: u32, pixel: &[f32]) -> Result<Image> {
        let data = pixel.iter()
            .cloned()
            .cycle()
            .take(width as usize * height as usize * pixel.len())
            .collect();
        Image::new(width, height, pixel.len(), data)
    }

    /// Decode a tile into float samples. Palette images are expanded to RGB(A), grayscale stays
    /// single-channel (gray with alpha becomes RGBA).
    pub fn from_dynamic(img: &DynamicImage) -> Image {
        let (width, height) = (img.width(), img.height());
        let color = img.color();

        if !color.has_color() && !color.has_alpha() {
            let data = img.to_luma16()
                .into_raw()
                .into_iter()
                .map(|v| f32::from(v) / 65535.0)
                .collect();
            Image { width, height, channels: 1, data }
        } else if color.has_alpha() {
            Image { width, height, channels: 4, data: img.to_rgba32f().into_raw() }
        } else {
            Image { width, height, channels: 3, data: img.to_rgb32f().into_raw() }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// (height, width, channels)
    pub fn shape(&self) -> (u32, u32, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Iterate over the samples of each pixel in row-major order.
    pub fn pixels(&self) -> ::std::slice::Chunks<f32> {
        self.data.chunks(self.channels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn ensure_same_shape(&self, other: &Image) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }
}

/// Per-pixel change flags, `true` marks a changed pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl ChangeMask {
    pub fn from_fn<F: Fn(u32, u32) -> bool>(width: u32, height: u32, func: F) -> ChangeMask {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(func(x, y));
            }
        }
        ChangeMask { width, height, data }
    }

    pub(crate) fn from_vec(width: u32, height: u32, data: Vec<bool>) -> ChangeMask {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        ChangeMask { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    /// Number of changed pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// Pixels that are set in both masks.
    pub fn and(&self, other: &ChangeMask) -> Result<ChangeMask> {
        if self.width != other.width || self.height != other.height {
            return Err(Error::ShapeMismatch {
                left: (self.height, self.width, 1),
                right: (other.height, other.width, 1),
            });
        }

        Ok(ChangeMask {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| a && b).collect(),
        })
    }

    /// Foreground 255, background 0.
    pub fn to_binary(&self) -> BinaryImage {
        BinaryImage {
            width: self.width,
            height: self.height,
            data: self.data.iter()
                .map(|&b| if b { BinaryImage::FOREGROUND } else { BinaryImage::BACKGROUND })
                .collect(),
        }
    }
}

/// A single band raster that is expected to hold only 0 and 255.
///
/// Values are kept as read, nothing is coerced. Consumers check the binary precondition.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl BinaryImage {
    pub const BACKGROUND: f32 = 0.0;
    pub const FOREGROUND: f32 = 255.0;

    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<BinaryImage> {
        if data.len() != width as usize * height as usize {
            return Err(Error::ShapeMismatch {
                left: (height, width, 1),
                right: (0, data.len() as u32, 1),
            });
        }
        Ok(BinaryImage { width, height, data })
    }

    pub fn from_gray(img: &GrayImage) -> BinaryImage {
        BinaryImage {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().iter().map(|&v| f32::from(v)).collect(),
        }
    }

    /// Encode as 8-bit gray. Fails on values outside 0 and 255.
    pub fn to_gray(&self) -> Result<GrayImage> {
        self.check_binary()?;
        let raw = self.data.iter().map(|&v| v as u8).collect();
        GrayImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| Error::NotBinary("buffer does not match dimensions".to_string()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn check_binary(&self) -> Result<()> {
        match self.data.iter().find(|&&v| v != Self::BACKGROUND && v != Self::FOREGROUND) {
            Some(v) => Err(Error::NotBinary(format!("unexpected value {}", v))),
            None => Ok(()),
        }
    }

    pub(crate) fn from_flags(width: u32, height: u32, flags: &[bool]) -> BinaryImage {
        ChangeMask::from_vec(width, height, flags.to_vec()).to_binary()
    }
}
