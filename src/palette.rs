//! Reference colors of the classes drawn by the tile rendering style.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;


/// An RGB color with channels in [0, 1].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub [f32; 3]);

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Color {
        Color([r, g, b])
    }
}

/// Semantic pixel classes of the rendering style.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassLabel {
    Building,
    Nothing,
    Text,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 3] = [ClassLabel::Building, ClassLabel::Nothing, ClassLabel::Text];

    pub fn color(&self) -> Color {
        match *self {
            ClassLabel::Building => Color::new(0.973, 0.847, 0.722),
            ClassLabel::Nothing => Color::new(0.976, 0.976, 0.969),
            ClassLabel::Text => Color::new(0.0, 0.0, 0.0),
        }
    }

    pub fn to_str(&self) -> &'static str {
        match *self {
            ClassLabel::Building => "Building",
            ClassLabel::Nothing => "Nothing",
            ClassLabel::Text => "Text",
        }
    }
}

impl FromStr for ClassLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<ClassLabel> {
        match s {
            "Building" => Ok(ClassLabel::Building),
            "Nothing" | "Background" => Ok(ClassLabel::Nothing),
            "Text" => Ok(ClassLabel::Text),
            _ => Err(Error::UnknownLabel(s.to_string())),
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Anything that names or is a reference color.
pub trait ColorSpec {
    fn resolve(&self) -> Result<Color>;
}

impl ColorSpec for Color {
    fn resolve(&self) -> Result<Color> {
        Ok(*self)
    }
}

impl ColorSpec for ClassLabel {
    fn resolve(&self) -> Result<Color> {
        Ok(self.color())
    }
}

impl ColorSpec for str {
    fn resolve(&self) -> Result<Color> {
        self.parse::<ClassLabel>().map(|label| label.color())
    }
}

impl<'a, T: ColorSpec + ?Sized> ColorSpec for &'a T {
    fn resolve(&self) -> Result<Color> {
        (**self).resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for label in ClassLabel::ALL.iter() {
            assert_eq!(label.to_str().parse::<ClassLabel>().unwrap(), *label);
        }
        assert_eq!("Background".parse::<ClassLabel>().unwrap(), ClassLabel::Nothing);
    }

    #[test]
    fn unknown_name() {
        match "Road".resolve() {
            Err(Error::UnknownLabel(name)) => assert_eq!(name, "Road"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolve_by_name_and_value() {
        assert_eq!("Text".resolve().unwrap(), Color::new(0.0, 0.0, 0.0));
        assert_eq!(ClassLabel::Building.resolve().unwrap(), ClassLabel::Building.color());
        assert_eq!(Color::new(0.1, 0.2, 0.3).resolve().unwrap(), Color::new(0.1, 0.2, 0.3));
    }
}
