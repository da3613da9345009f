//! Reduces a filtered change mask to a single label.

use crate::error::{Error, Result};
use crate::raster::BinaryImage;
use std::fmt;


#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Change,
    NoChange,
}

impl Label {
    /// Name of the bucket layer that collects tiles with this label.
    pub fn to_str(&self) -> &'static str {
        match *self {
            Label::Change => "change",
            Label::NoChange => "no_change",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Label a binary mask by its number of foreground pixels.
///
/// A mask that has both values is a change if it has more than `tolerance` foreground pixels.
/// Masks with values other than 0 and 255 are rejected, not coerced.
pub fn classify(binary: &BinaryImage, tolerance: usize) -> Result<Label> {
    if binary.is_empty() {
        return Err(Error::EmptyImage);
    }

    let mut background = 0usize;
    let mut foreground = 0usize;
    let mut others: Vec<f32> = vec![];

    for &v in binary.data() {
        if v == BinaryImage::BACKGROUND {
            background += 1;
        } else if v == BinaryImage::FOREGROUND {
            foreground += 1;
        } else if !others.contains(&v) {
            others.push(v);
        }
    }

    let distinct = others.len() + (background > 0) as usize + (foreground > 0) as usize;
    if distinct > 2 {
        return Err(Error::NotBinary(format!("{} distinct values", distinct)));
    }
    if let Some(v) = others.first() {
        return Err(Error::NotBinary(format!("not a black and white image, found value {}", v)));
    }

    let label = match (background > 0, foreground > 0) {
        (true, false) => Label::NoChange,
        (false, true) => Label::Change,
        _ if foreground > tolerance => Label::Change,
        _ => Label::NoChange,
    };

    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(foreground: usize, total: usize) -> BinaryImage {
        let data = (0..total).map(|i| if i < foreground { 255.0 } else { 0.0 }).collect();
        BinaryImage::new(total as u32, 1, data).unwrap()
    }

    #[test]
    fn uniform_masks() {
        assert_eq!(classify(&mask(0, 16), 0).unwrap(), Label::NoChange);
        assert_eq!(classify(&mask(16, 16), 0).unwrap(), Label::Change);
        // uniform masks ignore the tolerance
        assert_eq!(classify(&mask(16, 16), 100).unwrap(), Label::Change);
    }

    #[test]
    fn mixed_masks_use_tolerance() {
        assert_eq!(classify(&mask(3, 16), 5).unwrap(), Label::NoChange);
        assert_eq!(classify(&mask(3, 16), 3).unwrap(), Label::NoChange);
        assert_eq!(classify(&mask(3, 16), 2).unwrap(), Label::Change);
        assert_eq!(classify(&mask(1, 16), 0).unwrap(), Label::Change);
    }

    #[test]
    fn non_binary_masks_fail() {
        let img = BinaryImage::new(3, 1, vec![0.0, 255.0, 7.0]).unwrap();
        assert!(matches!(classify(&img, 0), Err(Error::NotBinary(_))));

        let img = BinaryImage::new(2, 1, vec![0.0, 1.0]).unwrap();
        assert!(matches!(classify(&img, 0), Err(Error::NotBinary(_))));

        let img = BinaryImage::new(1, 1, vec![128.0]).unwrap();
        assert!(matches!(classify(&img, 0), Err(Error::NotBinary(_))));
    }

    #[test]
    fn empty_mask_fails() {
        let img = BinaryImage::new(0, 0, vec![]).unwrap();
        assert!(matches!(classify(&img, 0), Err(Error::EmptyImage)));
    }

    #[test]
    fn bucket_names() {
        assert_eq!(Label::Change.to_string(), "change");
        assert_eq!(Label::NoChange.to_string(), "no_change");
    }
}
