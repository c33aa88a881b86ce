//! Tile kinds and the seeded tile-set generator.
//!
//! The vocabulary mirrors a physical Mahjong set: three numbered suits, four
//! winds and three dragons supply up to two pairs each, while the four flowers
//! and four seasons supply a single pair each and only match their exact twin.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::layout::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Dots,
    Bamboo,
    Characters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Honor {
    East,
    South,
    West,
    North,
    Red,
    Green,
    White,
}

/// How many pairs of one kind a board may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindCategory {
    PairedSuit,
    PairedHonor,
    SingletonFlower,
}

impl KindCategory {
    /// Pairs of a single kind available in the pool.
    pub const fn pair_supply(self) -> usize {
        match self {
            Self::PairedSuit | Self::PairedHonor => 2,
            Self::SingletonFlower => 1,
        }
    }
}

/// The face value of a tile. Two tiles match iff their kinds are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Kind {
    Suit(Suit, u8),
    Honor(Honor),
    Flower(u8),
    Season(u8),
}

impl Kind {
    pub const fn category(self) -> KindCategory {
        match self {
            Self::Suit(..) => KindCategory::PairedSuit,
            Self::Honor(_) => KindCategory::PairedHonor,
            Self::Flower(_) | Self::Season(_) => KindCategory::SingletonFlower,
        }
    }

    /// Every kind in the vocabulary, suits first.
    pub fn all() -> Vec<Kind> {
        let mut kinds = Vec::with_capacity(42);
        for suit in [Suit::Dots, Suit::Bamboo, Suit::Characters] {
            kinds.extend((1..=9).map(|rank| Kind::Suit(suit, rank)));
        }
        kinds.extend(
            [
                Honor::East,
                Honor::South,
                Honor::West,
                Honor::North,
                Honor::Red,
                Honor::Green,
                Honor::White,
            ]
            .map(Kind::Honor),
        );
        kinds.extend((1..=4).map(Kind::Flower));
        kinds.extend((1..=4).map(Kind::Season));
        kinds
    }

    /// Matching is exact equality.
    #[inline]
    pub fn matches(self, other: Kind) -> bool {
        self == other
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Suit(suit, rank) => {
                let prefix = match suit {
                    Suit::Dots => 'D',
                    Suit::Bamboo => 'B',
                    Suit::Characters => 'C',
                };
                write!(f, "{prefix}{rank}")
            }
            Kind::Honor(honor) => f.write_str(match honor {
                Honor::East => "E",
                Honor::South => "S",
                Honor::West => "W",
                Honor::North => "N",
                Honor::Red => "RD",
                Honor::Green => "GD",
                Honor::White => "WD",
            }),
            Kind::Flower(n) => write!(f, "F{n}"),
            Kind::Season(n) => write!(f, "S{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tile kind {0:?}")]
pub struct ParseKindError(String);

impl FromStr for Kind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKindError(s.to_string());
        let honor = match s {
            "E" => Some(Honor::East),
            "S" => Some(Honor::South),
            "W" => Some(Honor::West),
            "N" => Some(Honor::North),
            "RD" => Some(Honor::Red),
            "GD" => Some(Honor::Green),
            "WD" => Some(Honor::White),
            _ => None,
        };
        if let Some(honor) = honor {
            return Ok(Kind::Honor(honor));
        }

        let mut chars = s.chars();
        let prefix = chars.next().ok_or_else(err)?;
        let rank: u8 = chars.as_str().parse().map_err(|_| err())?;
        let kind = match prefix {
            'D' => Kind::Suit(Suit::Dots, rank),
            'B' => Kind::Suit(Suit::Bamboo, rank),
            'C' => Kind::Suit(Suit::Characters, rank),
            'F' => Kind::Flower(rank),
            'S' => Kind::Season(rank),
            _ => return Err(err()),
        };
        let max_rank = if matches!(kind, Kind::Suit(..)) { 9 } else { 4 };
        if (1..=max_rank).contains(&rank) {
            Ok(kind)
        } else {
            Err(err())
        }
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for Kind {
    type Error = ParseKindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Stable tile identifier, rendered as `t<slot>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TileId(pub u32);

impl TileId {
    /// The layout slot this tile was dealt to.
    #[inline]
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tile id {0:?}")]
pub struct ParseTileIdError(String);

impl FromStr for TileId {
    type Err = ParseTileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('t')
            .and_then(|digits| digits.parse().ok())
            .map(TileId)
            .ok_or_else(|| ParseTileIdError(s.to_string()))
    }
}

impl From<TileId> for String {
    fn from(id: TileId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TileId {
    type Error = ParseTileIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A kind dealt to a layout position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub position: Position,
    pub kind: Kind,
}

/// Derives a 64-bit RNG seed from a seed string.
///
/// Plain unsigned integers are used as-is; anything else is hashed with
/// 64-bit FNV-1a so the result does not depend on the platform.
pub fn seed_from_str(seed: &str) -> u64 {
    let trimmed = seed.trim();
    if let Ok(number) = trimmed.replace('_', "").parse::<u64>() {
        return number;
    }
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    trimmed.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// A deterministic RNG for `seed`, or an entropy-seeded one.
///
/// ChaCha8 is a fixed algorithm, unlike `StdRng`, so a seeded board stays the
/// same across platforms and `rand` releases.
pub fn rng_for(seed: Option<&str>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed_from_str(seed)),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// The pair pool: one entry per dealable pair, honoring each kind's supply.
pub fn pair_pool() -> Vec<Kind> {
    Kind::all()
        .into_iter()
        .flat_map(|kind| std::iter::repeat(kind).take(kind.category().pair_supply()))
        .collect()
}

/// Picks `positions.len() / 2` pairs from the pool and deals them.
///
/// Every kind occurs an even number of times in the result, and tile `i` sits
/// at `positions[i]` with id `t<i>`. When a layout needs more pairs than the
/// pool holds, pool entries are reused; this keeps the pairing invariant at the
/// cost of more than two pairs of some kinds.
pub fn assign_kinds<R: Rng + ?Sized>(positions: &[Position], rng: &mut R) -> Vec<Tile> {
    assert!(
        positions.len() % 2 == 0,
        "cannot deal {} positions in pairs",
        positions.len()
    );
    let pairs_needed = positions.len() / 2;

    let mut pool = pair_pool();
    pool.shuffle(rng);
    if pairs_needed > pool.len() {
        log::warn!(
            "layout needs {pairs_needed} pairs but the pool holds {}; reusing kinds",
            pool.len()
        );
    }
    let mut kinds: Vec<Kind> = pool
        .iter()
        .cycle()
        .take(pairs_needed)
        .flat_map(|&kind| [kind, kind])
        .collect();
    kinds.shuffle(rng);

    assert_eq!(kinds.len(), positions.len(), "kind count must match position count");
    positions
        .iter()
        .zip(kinds)
        .enumerate()
        .map(|(slot, (&position, kind))| Tile {
            id: TileId(slot as u32),
            position,
            kind,
        })
        .collect()
}

/// Deals with a seed string or fresh entropy.
pub fn deal(positions: &[Position], seed: Option<&str>) -> Vec<Tile> {
    assign_kinds(positions, &mut rng_for(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{lookup, Layout, HARD, TURTLE};
    use rustc_hash::FxHashMap;

    fn kind_counts(tiles: &[Tile]) -> FxHashMap<Kind, usize> {
        let mut counts = FxHashMap::default();
        for tile in tiles {
            *counts.entry(tile.kind).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_vocabulary() {
        let kinds = Kind::all();
        assert_eq!(kinds.len(), 42);
        let flowers = kinds
            .iter()
            .filter(|k| k.category() == KindCategory::SingletonFlower)
            .count();
        assert_eq!(flowers, 8);
        assert_eq!(pair_pool().len(), 34 * 2 + 8);
    }

    #[test]
    fn test_kind_codes_parse_back() {
        for kind in Kind::all() {
            let code = kind.to_string();
            assert_eq!(code.parse::<Kind>(), Ok(kind), "code {code} did not parse back");
        }
        assert_eq!("S".parse::<Kind>(), Ok(Kind::Honor(Honor::South)));
        assert_eq!("S3".parse::<Kind>(), Ok(Kind::Season(3)));
        assert!("D0".parse::<Kind>().is_err());
        assert!("F5".parse::<Kind>().is_err());
        assert!("X1".parse::<Kind>().is_err());
        assert!("".parse::<Kind>().is_err());
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let json = serde_json::to_string(&Kind::Honor(Honor::Red)).unwrap();
        assert_eq!(json, "\"RD\"");
        let back: Kind = serde_json::from_str("\"B7\"").unwrap();
        assert_eq!(back, Kind::Suit(Suit::Bamboo, 7));
    }

    #[test]
    fn test_tile_id_format() {
        assert_eq!(TileId(12).to_string(), "t12");
        assert_eq!("t12".parse::<TileId>(), Ok(TileId(12)));
        assert!("12".parse::<TileId>().is_err());
        assert!("tx".parse::<TileId>().is_err());
    }

    #[test]
    fn test_seed_from_str() {
        assert_eq!(seed_from_str("42"), 42);
        assert_eq!(seed_from_str("1_000"), 1000);
        assert_eq!(seed_from_str("daily-2026-10-19"), seed_from_str("daily-2026-10-19"));
        assert_ne!(seed_from_str("daily-2026-10-19"), seed_from_str("daily-2026-10-20"));
    }

    #[test]
    fn test_seeded_rng_is_chacha8() {
        let positions = TURTLE.positions();
        let mut rng = ChaCha8Rng::seed_from_u64(seed_from_str("daily"));
        assert_eq!(deal(&positions, Some("daily")), assign_kinds(&positions, &mut rng));
        assert_eq!(rng_for(Some("7")), ChaCha8Rng::seed_from_u64(7));
    }

    #[test]
    fn test_pairing_invariant_on_turtle() {
        let layout = TURTLE.layout();
        let tiles = deal(&layout.positions, Some("pairing"));
        assert_eq!(tiles.len(), layout.len());
        for (kind, count) in kind_counts(&tiles) {
            assert_eq!(count % 2, 0, "kind {kind} appears {count} times");
            let limit = 2 * kind.category().pair_supply();
            assert!(count <= limit, "kind {kind} exceeds its supply");
        }
    }

    #[test]
    fn test_ids_and_positions_follow_catalog_order() {
        let layout = lookup("easy").unwrap();
        let tiles = deal(&layout.positions, None);
        for (slot, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.id, TileId(slot as u32));
            assert_eq!(tile.position, layout.positions[slot]);
        }
    }

    #[test]
    fn test_seeded_deal_is_reproducible() {
        let layout = HARD.layout();
        let a = deal(&layout.positions, Some("same"));
        let b = deal(&layout.positions, Some("same"));
        let c = deal(&layout.positions, Some("other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_oversized_layout_reuses_kinds() {
        // 200 positions need 100 pairs, more than the 76 the pool holds
        let positions = (0..200).map(|col| Position::new(0, 0, col));
        let layout = Layout::custom("wide", positions);
        let tiles = deal(&layout.positions, Some("wide"));
        assert_eq!(tiles.len(), 200);
        for (kind, count) in kind_counts(&tiles) {
            assert_eq!(count % 2, 0, "kind {kind} appears {count} times");
        }
    }
}
