//! Layout catalog: the fixed 3D tile positions of every named board shape.
//!
//! Each shape is written as a stack of layer masks over a shared row/column
//! grid, where `#` marks a tile position and `.` marks an empty cell. Layer 0
//! is the table surface; a tile at `(layer + 1, row, col)` sits directly on top
//! of `(layer, row, col)`.

use serde::{Deserialize, Serialize};

/// A tile position as `(layer, row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub layer: i32,
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(layer: i32, row: i32, col: i32) -> Self {
        Self { layer, row, col }
    }

    /// The position directly on top of this one.
    #[inline]
    pub const fn above(self) -> Self {
        Self::new(self.layer + 1, self.row, self.col)
    }

    #[inline]
    pub const fn left(self) -> Self {
        Self::new(self.layer, self.row, self.col - 1)
    }

    #[inline]
    pub const fn right(self) -> Self {
        Self::new(self.layer, self.row, self.col + 1)
    }

    /// Whether every coordinate is zero or greater.
    pub const fn is_non_negative(self) -> bool {
        self.layer >= 0 && self.row >= 0 && self.col >= 0
    }
}

impl From<(i32, i32, i32)> for Position {
    fn from((layer, row, col): (i32, i32, i32)) -> Self {
        Self::new(layer, row, col)
    }
}

/// A named, ordered set of tile positions.
///
/// The order is the catalog order: layer-major, then row, then column. Tile
/// ids are assigned in this order when a board is dealt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub positions: Vec<Position>,
}

impl Layout {
    /// Builds a custom layout from explicit positions.
    ///
    /// Panics if the position count is odd, since tiles are dealt in pairs, or
    /// if any coordinate is negative.
    pub fn custom(name: impl Into<String>, positions: impl IntoIterator<Item = Position>) -> Self {
        let positions: Vec<Position> = positions.into_iter().collect();
        assert!(
            positions.len() % 2 == 0,
            "layout must have an even number of positions, got {}",
            positions.len()
        );
        if let Some(p) = positions.iter().find(|p| !p.is_non_negative()) {
            panic!("layout coordinates must be non-negative, got {p:?}");
        }
        Self {
            name: name.into(),
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of layers, i.e. the highest layer index plus one.
    pub fn depth(&self) -> usize {
        self.positions
            .iter()
            .map(|p| p.layer as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Row and column extents as `(rows, cols)`.
    pub fn bounds(&self) -> (usize, usize) {
        let rows = self.positions.iter().map(|p| p.row as usize + 1).max();
        let cols = self.positions.iter().map(|p| p.col as usize + 1).max();
        (rows.unwrap_or(0), cols.unwrap_or(0))
    }
}

/// A catalog entry: layer masks over a common grid.
pub struct LayoutShape {
    pub name: &'static str,
    pub layers: &'static [&'static [&'static str]],
}

impl LayoutShape {
    /// Expands the masks into positions in catalog order.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        for (layer, rows) in self.layers.iter().enumerate() {
            for (row, mask) in rows.iter().enumerate() {
                for (col, cell) in mask.bytes().enumerate() {
                    if cell == b'#' {
                        positions.push(Position::new(layer as i32, row as i32, col as i32));
                    }
                }
            }
        }
        positions
    }

    pub fn layout(&self) -> Layout {
        Layout::custom(self.name, self.positions())
    }
}

/// Name of the layout used for unknown names.
pub const DEFAULT_LAYOUT: &str = "turtle";

/// 24 tiles: a small three-layer pyramid.
pub const SUPER_EASY: LayoutShape = LayoutShape {
    name: "supereasy",
    layers: &[
        &["####", "####", "####", "####"],
        &["....", "###.", "###.", "...."],
        &["....", ".#..", ".#..", "...."],
    ],
};

/// 48 tiles: a medium three-layer pyramid.
pub const EASY: LayoutShape = LayoutShape {
    name: "easy",
    layers: &[
        &["######", "######", "######", "######", "######"],
        &["......", ".####.", ".####.", ".####.", "......"],
        &["......", "..###.", "..###.", "......", "......"],
    ],
};

/// 72 tiles: the classic turtle shell.
pub const TURTLE: LayoutShape = LayoutShape {
    name: "turtle",
    layers: &[
        &[
            "..####..", ".######.", "########", "########", "########", ".######.", "..####..",
        ],
        &[
            "........", "..####..", "..####..", "..####..", "..####..", "..####..", "........",
        ],
        &[
            "........", "........", "...##...", "...##...", "...##...", "........", "........",
        ],
        &[
            "........", "........", "........", "...##...", "........", "........", "........",
        ],
    ],
};

/// 80 tiles: a tall stepped pyramid.
pub const PYRAMID: LayoutShape = LayoutShape {
    name: "pyramid",
    layers: &[
        &[
            "########", "########", "########", "########", "########", "########",
        ],
        &[
            "........", ".######.", ".######.", ".######.", ".######.", "........",
        ],
        &[
            "........", "........", "...###..", "...###..", "........", "........",
        ],
        &[
            "........", "........", "....#...", "....#...", "........", "........",
        ],
    ],
};

/// 104 tiles: a wide four-layer pyramid.
pub const HARD: LayoutShape = LayoutShape {
    name: "hard",
    layers: &[
        &[
            "##########",
            "##########",
            "##########",
            "##########",
            "##########",
            "##########",
        ],
        &[
            "..........",
            ".########.",
            ".########.",
            ".########.",
            ".########.",
            "..........",
        ],
        &[
            "..........",
            "..........",
            "...####...",
            "...####...",
            "..........",
            "..........",
        ],
        &[
            "..........",
            "..........",
            "....##....",
            "....##....",
            "..........",
            "..........",
        ],
    ],
};

/// 102 tiles: a fortress with a raised keep.
pub const FORT: LayoutShape = LayoutShape {
    name: "fort",
    layers: &[
        &[
            "..######..",
            ".########.",
            "##########",
            "##########",
            "##########",
            "##########",
            ".########.",
            "..######..",
        ],
        &[
            "..........",
            "..........",
            "..######..",
            "..######..",
            "..######..",
            "..######..",
            "..........",
            "..........",
        ],
        &[
            "..........",
            "..........",
            "..........",
            "...####...",
            "...####...",
            "..........",
            "..........",
            "..........",
        ],
        &[
            "..........",
            "..........",
            "..........",
            "....##....",
            "..........",
            "..........",
            "..........",
            "..........",
        ],
    ],
};

/// 72 tiles: a narrow five-layer tower.
pub const CATERPILLAR: LayoutShape = LayoutShape {
    name: "caterpillar",
    layers: &[
        &["######", "######", "######", "######", "######", "######"],
        &["......", ".####.", ".####.", ".####.", ".####.", "......"],
        &["......", "......", ".####.", ".####.", ".####.", "......"],
        &["......", "......", "..##..", "..##..", "..##..", "......"],
        &["......", "......", "......", "..##..", "......", "......"],
    ],
};

/// 24 tiles: a single-layer grid where only lateral blocking applies.
pub const FLAT: LayoutShape = LayoutShape {
    name: "flat",
    layers: &[&["######", "######", "######", "######"]],
};

/// Every named layout, smallest first.
pub const CATALOG: &[LayoutShape] = &[SUPER_EASY, FLAT, EASY, TURTLE, CATERPILLAR, PYRAMID, FORT, HARD];

/// Strict lookup by name.
pub fn lookup(name: &str) -> Option<Layout> {
    CATALOG
        .iter()
        .find(|shape| shape.name.eq_ignore_ascii_case(name.trim()))
        .map(LayoutShape::layout)
}

/// Returns the named layout, falling back to [`DEFAULT_LAYOUT`] for unknown names.
pub fn get_layout(name: &str) -> Layout {
    lookup(name).unwrap_or_else(|| {
        log::warn!("unknown layout {name:?}, falling back to {DEFAULT_LAYOUT}");
        TURTLE.layout()
    })
}

/// Names of every catalog layout.
pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|shape| shape.name)
}

/// Formats a layout as its layer masks side by side.
///
/// Each layer is labeled `L<n>` and rendered with `#` for a position and `.`
/// for an empty cell, rows top to bottom.
pub fn format_layout(layout: &Layout) -> String {
    let (rows, cols) = layout.bounds();
    let depth = layout.depth();
    let mut cells = vec![false; depth * rows * cols];
    for p in &layout.positions {
        cells[(p.layer as usize * rows + p.row as usize) * cols + p.col as usize] = true;
    }

    let mut output = String::new();
    let mut header = String::new();
    for layer in 0..depth {
        if layer > 0 {
            header.push_str("  ");
        }
        header.push_str(&format!("{:<width$}", format!("L{layer}"), width = cols));
    }
    output.push_str(header.trim_end());
    output.push('\n');

    for row in 0..rows {
        let mut line = String::new();
        for layer in 0..depth {
            if layer > 0 {
                line.push_str("  ");
            }
            for col in 0..cols {
                let present = cells[(layer * rows + row) * cols + col];
                line.push(if present { '#' } else { '.' });
            }
        }
        output.push_str(&line);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_catalog_sizes() {
        let expected = [
            ("supereasy", 24),
            ("flat", 24),
            ("easy", 48),
            ("turtle", 72),
            ("caterpillar", 72),
            ("pyramid", 80),
            ("fort", 102),
            ("hard", 104),
        ];
        for (name, size) in expected {
            let layout = lookup(name).unwrap();
            assert_eq!(layout.len(), size, "layout {name} has the wrong tile count");
        }
    }

    #[test]
    fn test_every_layout_is_even_and_unique() {
        for shape in CATALOG {
            let positions = shape.positions();
            assert_eq!(positions.len() % 2, 0, "{} has an odd tile count", shape.name);
            let unique: FxHashSet<Position> = positions.iter().copied().collect();
            assert_eq!(unique.len(), positions.len(), "{} repeats a position", shape.name);
        }
    }

    #[test]
    fn test_upper_layers_rest_on_lower_layers() {
        for shape in CATALOG {
            let positions: FxHashSet<Position> = shape.positions().into_iter().collect();
            for p in &positions {
                if p.layer > 0 {
                    let below = Position::new(p.layer - 1, p.row, p.col);
                    assert!(
                        positions.contains(&below),
                        "{} has a floating tile at {p:?}",
                        shape.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_catalog_order_is_layer_major() {
        let positions = TURTLE.positions();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_lookup_is_strict_and_get_layout_falls_back() {
        assert!(lookup("no-such-layout").is_none());
        assert_eq!(lookup("Pyramid").unwrap().name, "pyramid");
        let fallback = get_layout("no-such-layout");
        assert_eq!(fallback.name, DEFAULT_LAYOUT);
        assert_eq!(fallback, TURTLE.layout());
    }

    #[test]
    #[should_panic(expected = "even number of positions")]
    fn test_odd_custom_layout_panics() {
        Layout::custom("odd", [Position::new(0, 0, 0)]);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_coordinate_panics() {
        Layout::custom("negative", [Position::new(0, 0, -1), Position::new(0, 0, 0)]);
    }

    #[test]
    fn test_format_super_easy() {
        let rendered = format_layout(&SUPER_EASY.layout());
        insta::assert_snapshot!(rendered, @r"
        L0    L1    L2
        ####  ....  ....
        ####  ###.  .#..
        ####  ###.  .#..
        ####  ....  ....
        ");
    }

    #[test]
    fn test_format_turtle_top() {
        let layout = TURTLE.layout();
        assert_eq!(layout.depth(), 4);
        assert_eq!(layout.bounds(), (7, 8));
        let rendered = format_layout(&layout);
        let first_row = rendered.lines().nth(1).unwrap();
        assert_eq!(first_row, "..####..  ........  ........  ........");
    }
}
