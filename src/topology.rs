//! Freeness computation over a layout.
//!
//! Positions are addressed by their slot: the index in catalog order, which is
//! also the numeric part of the tile id dealt there. The removed-set is a
//! bitmask over slots, and every neighbour relation is resolved once when the
//! [`Topology`] is built so each freeness query is O(1).

use rustc_hash::FxHashMap;

use crate::layout::{Layout, Position};
use crate::tiles::Tile;

/// Bitmask over layout slots.
///
/// Used as the removed-set of a board, and hashed directly as a solver state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TileMask {
    words: Vec<u64>,
}

impl TileMask {
    /// An empty mask able to hold `slots` bits.
    pub fn with_slots(slots: usize) -> Self {
        Self {
            words: vec![0; slots.div_ceil(64)],
        }
    }

    #[inline]
    pub fn contains(&self, slot: usize) -> bool {
        self.words
            .get(slot / 64)
            .is_some_and(|word| word & (1 << (slot % 64)) != 0)
    }

    /// Sets a bit, returning `true` if it was previously clear.
    #[inline]
    pub fn insert(&mut self, slot: usize) -> bool {
        let word_index = slot / 64;
        if word_index >= self.words.len() {
            self.words.resize(word_index + 1, 0);
        }
        let bit = 1 << (slot % 64);
        let was_clear = self.words[word_index] & bit == 0;
        self.words[word_index] |= bit;
        was_clear
    }

    /// Clears a bit, returning `true` if it was previously set.
    #[inline]
    pub fn remove(&mut self, slot: usize) -> bool {
        let Some(word) = self.words.get_mut(slot / 64) else {
            return false;
        };
        let bit = 1 << (slot % 64);
        let was_set = *word & bit != 0;
        *word &= !bit;
        was_set
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(word_index * 64 + bit)
            })
        })
    }

    /// Raw words, lowest slots first.
    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

impl FromIterator<usize> for TileMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = TileMask::default();
        for slot in iter {
            mask.insert(slot);
        }
        mask
    }
}

/// Neighbour index for one layout.
#[derive(Debug, Clone)]
pub struct Topology {
    layout: Layout,
    index: FxHashMap<Position, usize>,
    above: Vec<Option<usize>>,
    left: Vec<Option<usize>>,
    right: Vec<Option<usize>>,
}

impl Topology {
    /// Indexes a layout.
    ///
    /// Panics on an odd position count, a negative coordinate or a repeated
    /// position; each means the layout definition is broken.
    pub fn new(layout: Layout) -> Self {
        assert!(
            layout.len() % 2 == 0,
            "layout {} must have an even number of positions, got {}",
            layout.name,
            layout.len()
        );

        let mut index = FxHashMap::default();
        index.reserve(layout.len());
        for (slot, &position) in layout.positions.iter().enumerate() {
            assert!(
                position.is_non_negative(),
                "layout {} has a negative coordinate at {position:?}",
                layout.name
            );
            let previous = index.insert(position, slot);
            assert!(
                previous.is_none(),
                "layout {} repeats position {position:?}",
                layout.name
            );
        }

        let neighbour = |position: Position| index.get(&position).copied();
        let above = layout.positions.iter().map(|p| neighbour(p.above())).collect();
        let left = layout.positions.iter().map(|p| neighbour(p.left())).collect();
        let right = layout.positions.iter().map(|p| neighbour(p.right())).collect();

        Self {
            layout,
            index,
            above,
            left,
            right,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn position(&self, slot: usize) -> Position {
        self.layout.positions[slot]
    }

    pub fn slot_of(&self, position: Position) -> Option<usize> {
        self.index.get(&position).copied()
    }

    /// An empty removed-set sized for this layout.
    pub fn empty_mask(&self) -> TileMask {
        TileMask::with_slots(self.len())
    }

    #[inline]
    fn occupied(&self, removed: &TileMask, slot: Option<usize>) -> bool {
        slot.is_some_and(|s| !removed.contains(s))
    }

    /// Whether the tile in `slot` can be matched under `removed`.
    ///
    /// A tile is free when nothing rests directly on it and at least one of its
    /// same-layer left/right neighbours is absent or removed. Removed tiles are
    /// never free.
    #[inline]
    pub fn is_free(&self, removed: &TileMask, slot: usize) -> bool {
        if removed.contains(slot) {
            return false;
        }
        if self.occupied(removed, self.above[slot]) {
            return false;
        }
        !self.occupied(removed, self.left[slot]) || !self.occupied(removed, self.right[slot])
    }

    /// Freeness by position; positions outside the layout are never free.
    pub fn is_free_at(&self, removed: &TileMask, position: Position) -> bool {
        self.slot_of(position)
            .is_some_and(|slot| self.is_free(removed, slot))
    }

    /// Free slots in ascending order.
    pub fn free_slots<'a>(&'a self, removed: &'a TileMask) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&slot| self.is_free(removed, slot))
    }

    /// The subset of `tiles` that is currently free.
    ///
    /// `tiles` must be indexed by slot, as dealt by [`crate::tiles::assign_kinds`].
    pub fn free_tiles<'t>(&self, removed: &TileMask, tiles: &'t [Tile]) -> Vec<&'t Tile> {
        debug_assert_eq!(tiles.len(), self.len());
        self.free_slots(removed).map(|slot| &tiles[slot]).collect()
    }

    /// Slots not yet removed.
    pub fn remaining_slots<'a>(&'a self, removed: &'a TileMask) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&slot| !removed.contains(slot))
    }
}
