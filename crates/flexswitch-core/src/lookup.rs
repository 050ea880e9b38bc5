//! Lookup-structure factory seam.
//!
//! Match tables do not hard-code their key container: the owning switch
//! supplies a [`LookupFactory`] at load time, and each table builds its
//! structure through it. Targets with hardware-shaped lookup structures
//! (TCAM emulations, tries) implement the factory themselves;
//! [`DefaultLookupFactory`] covers the software switch with a plain hash map
//! over canonicalized keys.

use fxhash::FxHashMap;

use crate::table::MatchKind;

/// A key container mapping canonicalized match keys to entry handles.
///
/// Keys arrive already canonicalized (match params serialized with their
/// priority, when the match kind requires one), so implementations only need
/// exact semantics over opaque bytes.
pub trait LookupStructure: Send {
    /// Inserts a key. An existing mapping for the same key is overwritten.
    fn insert(&mut self, key: Vec<u8>, handle: u64);

    /// Removes a key, if present.
    fn remove(&mut self, key: &[u8]);

    /// Finds the handle for a key.
    fn find(&self, key: &[u8]) -> Option<u64>;

    /// Removes every key.
    fn clear(&mut self);
}

/// Builds lookup structures for tables at configuration-load time.
pub trait LookupFactory: Send + Sync {
    /// Builds the structure used by a table with the given match kind.
    fn build(&self, match_kind: MatchKind) -> Box<dyn LookupStructure>;
}

/// Hash-map lookup structure used by [`DefaultLookupFactory`].
#[derive(Default)]
struct HashLookup {
    map: FxHashMap<Vec<u8>, u64>,
}

impl LookupStructure for HashLookup {
    fn insert(&mut self, key: Vec<u8>, handle: u64) {
        self.map.insert(key, handle);
    }

    fn remove(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    fn find(&self, key: &[u8]) -> Option<u64> {
        self.map.get(key).copied()
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

/// The software-switch default: hash-map lookup for every match kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLookupFactory;

impl LookupFactory for DefaultLookupFactory {
    fn build(&self, _match_kind: MatchKind) -> Box<dyn LookupStructure> {
        Box::new(HashLookup::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_lookup_round_trip() {
        let factory = DefaultLookupFactory;
        let mut lookup = factory.build(MatchKind::Exact);
        lookup.insert(vec![1, 2, 3], 7);
        assert_eq!(lookup.find(&[1, 2, 3]), Some(7));
        lookup.remove(&[1, 2, 3]);
        assert_eq!(lookup.find(&[1, 2, 3]), None);
    }

    #[test]
    fn insert_overwrites() {
        let mut lookup = DefaultLookupFactory.build(MatchKind::Ternary);
        lookup.insert(vec![9], 1);
        lookup.insert(vec![9], 2);
        assert_eq!(lookup.find(&[9]), Some(2));
        lookup.clear();
        assert_eq!(lookup.find(&[9]), None);
    }
}
