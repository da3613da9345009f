use crate::classify::Label;
use crate::tile::TileKey;
use linked_hash_map::LinkedHashMap;


/// What the pipeline produced for one output tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A mask was written, with this many foreground pixels.
    Mask { changed: usize },
    /// The tile was put into a bucket.
    Label(Label),
}

/// Remembers the outcome of already processed output tiles, so that re-runs can skip them
/// without asking the store. Least recently used entries are dropped first.
pub struct ResultCache {
    map: LinkedHashMap<TileKey, Outcome>,
    max_tiles: usize,
}

impl ResultCache {
    pub fn new(max_tiles: usize) -> Self {
        ResultCache {
            map: LinkedHashMap::new(),
            max_tiles: max_tiles.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&mut self, key: &TileKey) -> Option<Outcome> {
        self.map.get_refresh(key).map(|o| *o)
    }

    pub fn insert(&mut self, key: TileKey, outcome: Outcome) {
        // remove old cache entries
        while !self.map.contains_key(&key) && self.map.len() + 1 > self.max_tiles {
            self.map.pop_front();
        }

        self.map.insert(key, outcome);
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<Outcome> {
        self.map.remove(key)
    }
}

impl ::std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(
            f,
            "ResultCache {{ tiles: {:?} }}",
            self.map.keys().collect::<Vec<_>>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;

    fn key(x: i32) -> TileKey {
        TileKey::new("detected", TileCoord::new(16, x, 0))
    }

    #[test]
    fn least_recently_used_goes_first() {
        let mut cache = ResultCache::new(2);
        cache.insert(key(1), Outcome::Mask { changed: 1 });
        cache.insert(key(2), Outcome::Mask { changed: 2 });

        // touch 1, so 2 is the oldest
        assert_eq!(cache.get(&key(1)), Some(Outcome::Mask { changed: 1 }));
        cache.insert(key(3), Outcome::Label(Label::Change));

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacing_does_not_evict() {
        let mut cache = ResultCache::new(2);
        cache.insert(key(1), Outcome::Mask { changed: 1 });
        cache.insert(key(2), Outcome::Mask { changed: 2 });
        cache.insert(key(2), Outcome::Mask { changed: 5 });

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(2)), Some(Outcome::Mask { changed: 5 }));
        assert_eq!(cache.remove(&key(1)), Some(Outcome::Mask { changed: 1 }));
    }
}
