//! Error types shared by all modules.

use std::io;
use thiserror::Error;

use crate::tile::TileKey;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors that can occur while processing tiles.
///
/// Precondition violations and lookup failures are fatal to the tile being
/// processed but never to the rest of a batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Two images that have to be compared pixel by pixel differ in shape.
    #[error("image shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (u32, u32, usize),
        right: (u32, u32, usize),
    },

    /// A binary image contains a value other than 0 or 255.
    #[error("not a binary image: {0}")]
    NotBinary(String),

    /// The image does not have the channels the operation needs.
    #[error("expected at least {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("image has no pixels")]
    EmptyImage,

    /// A class name that is not part of the palette.
    #[error("color {0:?} not found in class palette")]
    UnknownLabel(String),

    #[error("layer {layer:?} not found{}", suggested(.suggestion))]
    UnknownLayer {
        layer: String,
        suggestion: Option<String>,
    },

    #[error("tile not found: {0}")]
    TileNotFound(TileKey),

    #[error("invalid url template: {0}")]
    Template(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

fn suggested(suggestion: &Option<String>) -> String {
    match *suggestion {
        Some(ref name) => format!(", suggested layer: {}", name),
        None => String::new(),
    }
}

impl Error {
    /// Returns true if the error means that a tile could not be obtained,
    /// as opposed to a tile that was obtained but could not be processed.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            *self,
            Error::TileNotFound(_) | Error::Io(_) | Error::Http(_)
        )
    }
}
