//! Rune grid with box-drawing merge.
//!
//! Lines and boxes are never written as glyphs directly. Each drawn cell
//! recovers the edges already present from its current glyph, ORs in the new
//! edges and looks the union up in [`GLYPHS`]. Drawing is therefore
//! order-independent: two crossing lines always end up as `┼`.

use unicode_width::UnicodeWidthChar;

pub const TOP: u8 = 1;
pub const BOTTOM: u8 = 2;
pub const LEFT: u8 = 4;
pub const RIGHT: u8 = 8;

const VERTICAL: u8 = TOP | BOTTOM;
const HORIZONTAL: u8 = LEFT | RIGHT;

/// Box-drawing glyph for every edge mask, indexed by mask.
const GLYPHS: [char; 16] = [
    ' ', '╵', '╷', '│', '╴', '┘', '┐', '┤', '╶', '└', '┌', '├', '─', '┴', '┬', '┼',
];

/// Marks the second column of a double-width glyph.
const CONTINUATION: char = '\0';

fn edges_of(ch: char) -> u8 {
    match ch {
        ' ' => 0,
        _ => GLYPHS
            .iter()
            .position(|&g| g == ch)
            .map_or(0, |mask| mask as u8),
    }
}

/// Display width of a single rune: 0, 1 or 2.
pub fn rune_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Display width of a string.
pub fn text_width(text: &str) -> usize {
    text.chars().map(rune_width).sum()
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    runes: Vec<char>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            runes: vec![' '; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn get(&self, x: usize, y: usize) -> char {
        self.index(x, y).map_or(' ', |i| self.runes[i])
    }

    pub fn set(&mut self, x: usize, y: usize, ch: char) {
        if let Some(i) = self.index(x, y) {
            self.runes[i] = ch;
        }
    }

    pub fn edges(&self, x: usize, y: usize) -> u8 {
        edges_of(self.get(x, y))
    }

    pub fn add_edges(&mut self, x: usize, y: usize, edges: u8) {
        let mask = self.edges(x, y) | edges;
        self.set(x, y, GLYPHS[usize::from(mask & 0x0f)]);
    }

    /// Write `text` starting at (x, y), clipped at `max_x` (exclusive).
    /// Returns the number of columns written.
    pub fn put_text(&mut self, x: usize, y: usize, max_x: usize, text: &str) -> usize {
        let mut pos = x;
        for ch in text.chars() {
            let w = rune_width(ch);
            if w == 0 {
                continue;
            }
            if pos + w > max_x {
                break;
            }
            self.set(pos, y, ch);
            if w == 2 {
                self.set(pos + 1, y, CONTINUATION);
            }
            pos += w;
        }
        pos - x
    }

    /// Horizontal line from `x0` to `x1` (inclusive) on row `y`. A vertical
    /// line found just beyond either end is turned into a junction.
    pub fn hline(&mut self, x0: usize, x1: usize, y: usize) {
        for x in x0..=x1 {
            self.add_edges(x, y, HORIZONTAL);
        }
        if let Some(before) = x0.checked_sub(1) {
            if self.edges(before, y) & VERTICAL == VERTICAL {
                self.add_edges(before, y, RIGHT);
            }
        }
        if self.edges(x1 + 1, y) & VERTICAL == VERTICAL {
            self.add_edges(x1 + 1, y, LEFT);
        }
    }

    /// Vertical line from `y0` to `y1` (inclusive) on column `x`. A
    /// horizontal line found just beyond either end is turned into a junction.
    pub fn vline(&mut self, x: usize, y0: usize, y1: usize) {
        for y in y0..=y1 {
            self.add_edges(x, y, VERTICAL);
        }
        if let Some(above) = y0.checked_sub(1) {
            if self.edges(x, above) & HORIZONTAL == HORIZONTAL {
                self.add_edges(x, above, BOTTOM);
            }
        }
        if self.edges(x, y1 + 1) & HORIZONTAL == HORIZONTAL {
            self.add_edges(x, y1 + 1, TOP);
        }
    }

    /// Outline of a `w` x `h` rectangle. Needs at least 2 x 2.
    pub fn draw_box(&mut self, x: usize, y: usize, w: usize, h: usize) {
        if w < 2 || h < 2 {
            return;
        }
        let (x1, y1) = (x + w - 1, y + h - 1);
        self.add_edges(x, y, RIGHT | BOTTOM);
        self.add_edges(x1, y, LEFT | BOTTOM);
        self.add_edges(x, y1, RIGHT | TOP);
        self.add_edges(x1, y1, LEFT | TOP);
        for i in x + 1..x1 {
            self.add_edges(i, y, HORIZONTAL);
            self.add_edges(i, y1, HORIZONTAL);
        }
        for j in y + 1..y1 {
            self.add_edges(x, j, VERTICAL);
            self.add_edges(x1, j, VERTICAL);
        }
    }

    /// Grid rows as strings, with trailing spaces removed.
    pub fn lines(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                let row = &self.runes[y * self.width..(y + 1) * self.width];
                let line: String = row.iter().filter(|&&c| c != CONTINUATION).collect();
                line.trim_end_matches(' ').to_string()
            })
            .collect()
    }
}
