use crate::coord::TileCoord;
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;


/// Kinds of placeholders for a `UrlTemplate`
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
enum Placeholder {
    /// Tile x coordinate
    X,
    /// Tile y coordinate
    Y,
    /// Tile zoom
    Z,
    /// Quadkey encoded coord
    Quadkey,
}

#[derive(Clone, Debug, PartialEq)]
enum Part {
    Static(String),
    Dynamic(Placeholder),
}

/// A tile server url with placeholders, e.g. `https://tile.example.com/{z}/{x}/{y}.png`.
#[derive(Clone, Debug)]
pub struct UrlTemplate {
    template_string: String,
    parts: Vec<Part>,
}

impl UrlTemplate {
    pub fn new<S: Into<String>>(template_str: S) -> Result<UrlTemplate> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"\{([a-z]+)\}").unwrap();
        }

        let template_string = template_str.into();
        let mut parts = vec![];
        let mut offset = 0;

        for cap in RE.captures_iter(&template_string) {
            let (whole, name) = match (cap.get(0), cap.get(1)) {
                (Some(whole), Some(name)) => (whole, name),
                _ => continue,
            };

            if whole.start() > offset {
                parts.push(Part::Static(template_string[offset..whole.start()].to_string()));
            }

            let ph = match name.as_str() {
                "x" => Placeholder::X,
                "y" => Placeholder::Y,
                "z" => Placeholder::Z,
                "quadkey" => Placeholder::Quadkey,
                s => return Err(Error::Template(format!("invalid placeholder {:?} in {:?}", s, template_string))),
            };
            parts.push(Part::Dynamic(ph));

            offset = whole.end();
        }

        if offset < template_string.len() {
            parts.push(Part::Static(template_string[offset..].to_string()));
        }

        let has = |ph| parts.contains(&Part::Dynamic(ph));
        let template_valid = has(Placeholder::Quadkey) ||
            (has(Placeholder::X) && has(Placeholder::Y) && has(Placeholder::Z));

        if !template_valid {
            return Err(Error::Template(format!(
                "one or multiple placeholders are missing: {:?}",
                template_string,
            )));
        }

        Ok(UrlTemplate {
            template_string,
            parts,
        })
    }

    /// Build the url of one tile. Fails for tiles that have no quadkey if the template needs one.
    pub fn fill(&self, tile_coord: TileCoord) -> Result<String> {
        let mut ret = String::with_capacity(self.template_string.len() + 16);

        for part in &self.parts {
            match *part {
                Part::Static(ref s) => ret += s,
                Part::Dynamic(Placeholder::X) => ret += &tile_coord.x.to_string(),
                Part::Dynamic(Placeholder::Y) => ret += &tile_coord.y.to_string(),
                Part::Dynamic(Placeholder::Z) => ret += &tile_coord.zoom.to_string(),
                Part::Dynamic(Placeholder::Quadkey) => {
                    match tile_coord.to_quadkey() {
                        Some(q) => ret += &q,
                        None => return Err(Error::Template(format!("no quadkey for tile {}", tile_coord))),
                    }
                },
            }
        }

        Ok(ret)
    }
}
