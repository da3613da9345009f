use crate::coord::TileCoord;
use std::fmt;


/// Identifies one raster tile of one layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub layer: String,
    pub coord: TileCoord,
}

impl TileKey {
    pub fn new<S: Into<String>>(layer: S, coord: TileCoord) -> TileKey {
        TileKey {
            layer: layer.into(),
            coord,
        }
    }

    /// The same tile position in another layer.
    pub fn with_layer<S: Into<String>>(&self, layer: S) -> TileKey {
        TileKey::new(layer, self.coord)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equal_by_value() {
        let mut set = HashSet::new();
        set.insert(TileKey::new("202310", TileCoord::new(16, 1, 2)));
        set.insert(TileKey::new("202310".to_string(), TileCoord::new(16, 1, 2)));
        set.insert(TileKey::new("201610", TileCoord::new(16, 1, 2)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn other_layer() {
        let a = TileKey::new("201610", TileCoord::new(16, 32449, 21776));
        let b = a.with_layer("202310");
        assert_eq!(a.coord, b.coord);
        assert_eq!(b.to_string(), "202310/16/32449/21776");
    }
}
