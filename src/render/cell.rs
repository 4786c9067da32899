//! Auto-sized box-drawn tables.
//!
//! Layout is two-phase. [`Cell::need_size`] reports the minimum size from the
//! content alone; [`Cell::render_into`] then fills a rectangle at least that
//! large. Rendering walks the whole cell tree twice: first every border and
//! separator is drawn, then every text. Nested tables can thus join their
//! separators into the lines of the enclosing table before any sibling text is
//! placed.

use std::collections::BTreeSet;

use crate::render::grid::{Grid, text_width};
use crate::render::wrap::wrap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Borders,
    Content,
}

#[derive(Debug, Clone)]
pub enum Cell {
    /// Single line of text with one column of padding on each side.
    Text(String),
    /// Pre-wrapped lines, padded like `Text`.
    Lines(Vec<String>),
    Table(Table),
    /// One-rune border around the inner cell.
    Frame(Box<Cell>),
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Cell::Text(text.into())
    }

    /// Text word-wrapped to `width` columns.
    pub fn wrapped(text: &str, width: usize) -> Self {
        Cell::Lines(wrap(text, width))
    }

    pub fn framed(inner: impl Into<Cell>) -> Self {
        Cell::Frame(Box::new(inner.into()))
    }

    pub fn need_size(&self) -> (usize, usize) {
        match self {
            Cell::Text(text) => (text_width(text) + 2, 1),
            Cell::Lines(lines) => {
                let w = lines.iter().map(|l| text_width(l)).max().unwrap_or(0);
                (w + 2, lines.len())
            }
            Cell::Table(table) => table.need_size(),
            Cell::Frame(inner) => {
                let (w, h) = inner.need_size();
                (w + 2, h + 2)
            }
        }
    }

    /// Render into the `w` x `h` rectangle at (x, y).
    pub fn render_into(&self, grid: &mut Grid, x: usize, y: usize, w: usize, h: usize) {
        self.draw(grid, x, y, w, h, Pass::Borders);
        self.draw(grid, x, y, w, h, Pass::Content);
    }

    fn draw(&self, grid: &mut Grid, x: usize, y: usize, w: usize, h: usize, pass: Pass) {
        match self {
            Cell::Text(text) => {
                if pass == Pass::Content && h > 0 {
                    draw_line(grid, x, y, w, text, right_aligned(text));
                }
            }
            Cell::Lines(lines) => {
                if pass == Pass::Content {
                    let right = lines.first().is_some_and(|l| right_aligned(l));
                    for (i, line) in lines.iter().take(h).enumerate() {
                        draw_line(grid, x, y + i, w, line, right);
                    }
                }
            }
            Cell::Table(table) => table.draw(grid, x, y, w, h, pass),
            Cell::Frame(inner) => {
                if w < 2 || h < 2 {
                    return;
                }
                if pass == Pass::Borders {
                    grid.draw_box(x, y, w, h);
                }
                inner.draw(grid, x + 1, y + 1, w - 2, h - 2, pass);
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl From<Table> for Cell {
    fn from(table: Table) -> Self {
        Cell::Table(table)
    }
}

fn right_aligned(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn draw_line(grid: &mut Grid, x: usize, y: usize, w: usize, text: &str, right: bool) {
    if w < 2 {
        return;
    }
    let inner = w - 2;
    let start = if right {
        x + 1 + inner.saturating_sub(text_width(text))
    } else {
        x + 1
    };
    grid.put_text(start, y, x + 1 + inner, text);
}

/// Spread `total` over `sizes`, giving each its own size plus an even share
/// of the surplus. The first `surplus % n` entries get one extra.
fn distribute(sizes: &[usize], total: usize) -> Vec<usize> {
    let n = sizes.len();
    if n == 0 {
        return Vec::new();
    }
    let surplus = total.saturating_sub(sizes.iter().sum());
    sizes
        .iter()
        .enumerate()
        .map(|(i, &s)| s + surplus / n + usize::from(i < surplus % n))
        .collect()
}

/// Rows of cells with optional separator lines between rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Vec<Cell>>,
    /// Separator is drawn after each of these row indices. Every entry has
    /// a row below it.
    lines: BTreeSet<usize>,
    /// `add_line` was called and no row has followed yet.
    line_pending: bool,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row<I, C>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        if std::mem::take(&mut self.line_pending) {
            self.lines.insert(self.rows.len() - 1);
        }
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    /// Separator after the most recently added row. It only takes effect
    /// once another row follows.
    pub fn add_line(&mut self) -> &mut Self {
        self.line_pending = !self.rows.is_empty();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.num_columns() == 0
    }

    fn num_columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn min_layout(&self) -> (Vec<usize>, Vec<usize>) {
        let mut widths = vec![0; self.num_columns()];
        let mut heights = vec![0; self.rows.len()];
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (w, h) = cell.need_size();
                widths[c] = widths[c].max(w);
                heights[r] = heights[r].max(h);
            }
        }
        (widths, heights)
    }

    pub fn need_size(&self) -> (usize, usize) {
        if self.is_empty() {
            return (0, 0);
        }
        let (widths, heights) = self.min_layout();
        let w = widths.iter().sum::<usize>() + widths.len() - 1;
        let h = heights.iter().sum::<usize>() + self.lines.len();
        (w, h)
    }

    fn draw(&self, grid: &mut Grid, x: usize, y: usize, w: usize, h: usize, pass: Pass) {
        if self.is_empty() || w == 0 || h == 0 {
            return;
        }
        let (min_widths, min_heights) = self.min_layout();
        let ncols = min_widths.len();
        let widths = distribute(&min_widths, w.saturating_sub(ncols - 1));
        let nlines = self.lines.len();
        let heights = distribute(&min_heights, h.saturating_sub(nlines));

        let mut col_x = Vec::with_capacity(ncols);
        let mut cx = x;
        for &cw in &widths {
            col_x.push(cx);
            cx += cw + 1;
        }
        let mut row_y = Vec::with_capacity(heights.len());
        let mut ry = y;
        for (r, &rh) in heights.iter().enumerate() {
            row_y.push(ry);
            ry += rh;
            if self.lines.contains(&r) {
                ry += 1;
            }
        }

        if pass == Pass::Borders {
            let (x1, y1) = (x + w - 1, y + h - 1);
            for c in 0..ncols - 1 {
                grid.vline(col_x[c] + widths[c], y, y1);
            }
            for &r in &self.lines {
                grid.hline(x, x1, row_y[r] + heights[r]);
            }
        }

        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                cell.draw(grid, col_x[c], row_y[r], widths[c], heights[r], pass);
            }
        }
    }
}

/// Render `cell` at exactly its needed size.
pub fn render(cell: &Cell) -> Vec<String> {
    let (w, h) = cell.need_size();
    let mut grid = Grid::new(w, h);
    cell.render_into(&mut grid, 0, 0, w, h);
    grid.lines()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_table() -> Table {
        let mut t = Table::new();
        t.add_row(["1", "a"]).add_line();
        t.add_row(["b", "2"]);
        t.add_row(["123456", "abcdef"]);
        t
    }

    #[test]
    fn framed_table_layout() {
        let cell = Cell::framed(sample_table());
        assert_eq!(cell.need_size(), (19, 6));
        assert_eq!(
            render(&cell),
            vec![
                "┌────────┬────────┐",
                "│      1 │ a      │",
                "├────────┼────────┤",
                "│ b      │      2 │",
                "│ 123456 │ abcdef │",
                "└────────┴────────┘",
            ]
        );
    }

    #[test]
    fn empty_tables_need_nothing() {
        let t = Table::new();
        assert_eq!(t.need_size(), (0, 0));
        assert!(render(&Cell::from(t)).is_empty());

        let mut no_columns = Table::new();
        no_columns.add_row(Vec::<Cell>::new());
        assert_eq!(no_columns.need_size(), (0, 0));
        let mut grid = Grid::new(3, 3);
        Cell::from(no_columns).render_into(&mut grid, 0, 0, 3, 3);
        assert_eq!(grid.lines(), vec!["", "", ""]);
    }

    #[test]
    fn trailing_line_is_ignored() {
        let mut t = Table::new();
        t.add_row(["x"]).add_line();
        assert_eq!(t.need_size(), (3, 1));
        assert!(t.lines.is_empty());

        t.add_row(["y"]);
        assert_eq!(t.lines, BTreeSet::from([0]));
        assert_eq!(t.need_size(), (3, 3));
    }

    #[test]
    fn surplus_goes_to_first_columns() {
        assert_eq!(distribute(&[3, 3, 3], 14), vec![5, 5, 4]);
        assert_eq!(distribute(&[2, 7], 5), vec![2, 7]);
        assert!(distribute(&[], 10).is_empty());
    }

    #[test]
    fn nested_table_joins_parent_lines() {
        let mut inner = Table::new();
        inner.add_row(["p", "q"]).add_line();
        inner.add_row(["r", "s"]);

        let mut outer = Table::new();
        outer.add_row([Cell::text("left"), Cell::from(inner)]).add_line();
        outer.add_row([Cell::text("wide text"), Cell::text("z")]);

        assert_eq!(
            render(&Cell::framed(outer)),
            vec![
                "┌───────────┬───┬───┐",
                "│ left      │ p │ q │",
                "│           ├───┼───┤",
                "│           │ r │ s │",
                "├───────────┼───┴───┤",
                "│ wide text │ z     │",
                "└───────────┴───────┘",
            ]
        );
    }

    #[test]
    fn wrapped_cells_grow_rows() {
        let mut t = Table::new();
        t.add_row([Cell::text("0.500"), Cell::wrapped("one two three", 7)]);
        assert_eq!(
            render(&Cell::framed(t)),
            vec![
                "┌───────┬─────────┐",
                "│ 0.500 │ one two │",
                "│       │ three   │",
                "└───────┴─────────┘",
            ]
        );
    }
}
