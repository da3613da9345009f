//! Takes two renderings of the same tile and detects a given class change between them.

use crate::error::{Error, Result};
use crate::palette::{ClassLabel, Color, ColorSpec};
use crate::raster::{ChangeMask, Image};
use std::fmt;
use std::str::FromStr;


/// Tolerance for matching a difference image against a difference color.
pub const DIFFERENCE_TOLERANCE: f32 = 1.0 / 256.0;

/// Tolerance for matching a rendered tile against a class color. Coarser than
/// `DIFFERENCE_TOLERANCE` to absorb antialiasing.
pub const CLASS_TOLERANCE: f32 = 0.1;

/// Map a difference in [-1, 1] to [0, 1], zero difference lands on 0.5.
#[inline]
fn normalize_difference(x: f32) -> f32 {
    x / 2.0 + 0.5
}

/// The two ways of turning a pair of tiles into a change mask. Their results are not
/// equivalent.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DetectionMethod {
    /// Match the normalized difference image against the difference of the class colors.
    Difference,
    /// Match each tile against its own class color and combine both masks.
    ClassMask,
}

impl DetectionMethod {
    pub fn to_str(&self) -> &'static str {
        match *self {
            DetectionMethod::Difference => "difference",
            DetectionMethod::ClassMask => "class_mask",
        }
    }
}

impl Default for DetectionMethod {
    fn default() -> Self {
        DetectionMethod::ClassMask
    }
}

impl FromStr for DetectionMethod {
    type Err = String;

    fn from_str(s: &str) -> ::std::result::Result<Self, String> {
        match s {
            "difference" => Ok(DetectionMethod::Difference),
            "class_mask" => Ok(DetectionMethod::ClassMask),
            _ => Err(format!("unknown detection method {:?}, expected difference or class_mask", s)),
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Mark pixels whose first three channels are all strictly closer than `tolerance` to `color`.
fn match_color(img: &Image, color: Color, tolerance: f32) -> Result<ChangeMask> {
    if img.channels() < 3 {
        return Err(Error::ChannelCount {
            expected: 3,
            actual: img.channels(),
        });
    }

    let flags = img.pixels()
        .map(|px| {
            px[..3].iter()
                .zip(color.0.iter())
                .all(|(&v, &c)| (v - c).abs() < tolerance)
        })
        .collect();

    Ok(ChangeMask::from_vec(img.width(), img.height(), flags))
}

/// Compute the color difference `color1 - color2` in normalized form. Alpha is dropped.
pub fn subtract_color(color1: &[f32], color2: &[f32]) -> Color {
    let mut out = [0.0; 3];
    for (o, (&a, &b)) in out.iter_mut().zip(color1.iter().zip(color2.iter())) {
        *o = normalize_difference(a - b);
    }
    Color(out)
}

/// `|img1 - img2| / 2 + 0.5`, clipped to [0, 1]. Both images need the same shape.
pub fn get_difference(img1: &Image, img2: &Image) -> Result<Image> {
    img1.ensure_same_shape(img2)?;

    let data = img1.data().iter()
        .zip(img2.data())
        .map(|(&a, &b)| normalize_difference((a - b).abs()).max(0.0).min(1.0))
        .collect();

    Image::new(img1.width(), img1.height(), img1.channels(), data)
}

/// Highlight pixels of a difference image that match `color` within `tolerance`.
pub fn detect_difference(diff_img: &Image, color: Color, tolerance: f32) -> Result<ChangeMask> {
    match_color(diff_img, color, tolerance)
}

/// Highlight pixels of `img` that match a color or a named class.
pub fn color_mask<C: ColorSpec>(img: &Image, color: C, tolerance: f32) -> Result<ChangeMask> {
    let color = color.resolve()?;
    match_color(img, color, tolerance)
}

/// Detects where pixels change from one class to another.
#[derive(Clone, Debug)]
pub struct ChangeDetector {
    initial_label: ClassLabel,
    final_label: ClassLabel,
    method: DetectionMethod,
}

impl ChangeDetector {
    pub fn new(initial_label: ClassLabel, final_label: ClassLabel, method: DetectionMethod) -> Self {
        ChangeDetector {
            initial_label,
            final_label,
            method,
        }
    }

    pub fn initial_label(&self) -> ClassLabel {
        self.initial_label
    }

    pub fn final_label(&self) -> ClassLabel {
        self.final_label
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    /// Name of the layer that holds the detected masks of `layer1` versus `layer2`.
    pub fn layer_name(&self, layer1: &str, layer2: &str) -> String {
        format!(
            "{}To{}Detected{}To{}",
            layer1, layer2, self.initial_label, self.final_label,
        )
    }

    /// Normalized difference between the two class colors.
    pub fn change_color(&self) -> Color {
        subtract_color(&self.initial_label.color().0, &self.final_label.color().0)
    }

    /// Difference based detection. With `img2` missing, `img1` is taken to be an already
    /// computed difference image.
    pub fn compare_difference_image(&self, img1: &Image, img2: Option<&Image>) -> Result<ChangeMask> {
        let diff_img = match img2 {
            None => img1.clone(),
            Some(img2) => get_difference(img1, img2)?,
        };

        detect_difference(&diff_img, self.change_color(), DIFFERENCE_TOLERANCE)
    }

    /// True where `img1` shows the initial class and `img2` shows the final class.
    pub fn detect_change(&self, img1: &Image, img2: &Image) -> Result<ChangeMask> {
        img1.ensure_same_shape(img2)?;
        let mask1 = color_mask(img1, self.initial_label, CLASS_TOLERANCE)?;
        let mask2 = color_mask(img2, self.final_label, CLASS_TOLERANCE)?;
        mask1.and(&mask2)
    }

    /// Run the configured detection method.
    pub fn detect(&self, img1: &Image, img2: &Image) -> Result<ChangeMask> {
        match self.method {
            DetectionMethod::Difference => self.compare_difference_image(img1, Some(img2)),
            DetectionMethod::ClassMask => self.detect_change(img1, img2),
        }
    }
}
