//! Word wrapping for table cells.
//!
//! Breaks are considered at runs of whitespace, right after a comma, and,
//! when a word does not fit, in the middle of the word. Each break picks the
//! predecessor (no more than `width` columns back) with the smallest
//! accumulated squared slack, which keeps lines visually balanced instead of
//! greedily full. Ties go to the most recent predecessor.

use crate::render::grid::rune_width;

#[derive(Debug, Clone, Copy)]
struct Break {
    /// Char index where the line before this break ends (exclusive).
    end: usize,
    /// Char index where the line after this break starts.
    start: usize,
    start_col: usize,
    cost: u64,
    prev: usize,
}

struct Wrapper {
    width: usize,
    /// Display column before each char; one extra slot for the end.
    cols: Vec<usize>,
    breaks: Vec<Break>,
}

impl Wrapper {
    fn add_break(&mut self, end: usize, start: usize) {
        let end_col = self.cols[end];
        let mut best: Option<(u64, usize)> = None;
        for (k, b) in self.breaks.iter().enumerate().rev() {
            let len = end_col.saturating_sub(b.start_col);
            if len > self.width {
                break;
            }
            let slack = (self.width - len) as u64;
            let cost = b.cost + slack * slack;
            if best.is_none_or(|(c, _)| cost < c) {
                best = Some((cost, k));
            }
        }
        // A single glyph wider than the line; let it overflow.
        let (cost, prev) = best.unwrap_or_else(|| {
            let k = self.breaks.len() - 1;
            (self.breaks[k].cost, k)
        });
        self.breaks.push(Break {
            end,
            start,
            start_col: self.cols[start],
            cost,
            prev,
        });
    }

    fn latest(&self) -> Break {
        self.breaks[self.breaks.len() - 1]
    }
}

/// Wrap `text` into lines of at most `width` display columns. Words longer
/// than `width` are split. Always returns at least one line.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let n = chars.len();
    let Some(first) = chars.iter().position(|&c| c != ' ') else {
        return vec![String::new()];
    };
    let Some(last) = chars.iter().rposition(|&c| c != ' ') else {
        return vec![String::new()];
    };

    let mut cols = Vec::with_capacity(n + 1);
    let mut col = 0;
    for &c in &chars {
        cols.push(col);
        col += rune_width(c);
    }
    cols.push(col);

    let mut w = Wrapper {
        width: width.max(1),
        breaks: vec![Break {
            end: 0,
            start: first,
            start_col: cols[first],
            cost: 0,
            prev: 0,
        }],
        cols,
    };

    let mut i = first;
    while i <= last {
        let ch = chars[i];
        if ch == ' ' {
            let mut j = i;
            while chars[j] == ' ' {
                j += 1;
            }
            w.add_break(i, j);
            i = j;
            continue;
        }
        let line_start = w.latest().start_col;
        if w.cols[i] > line_start && w.cols[i + 1] - line_start > w.width {
            w.add_break(i, i);
        }
        i += 1;
        if ch == ',' && i <= last && chars[i] != ' ' {
            w.add_break(i, i);
        }
    }
    w.add_break(last + 1, n);

    let mut lines = Vec::new();
    let mut k = w.breaks.len() - 1;
    while k > 0 {
        let b = w.breaks[k];
        let from = w.breaks[b.prev].start;
        lines.push(chars[from..b.end].iter().collect::<String>());
        k = b.prev;
    }
    lines.reverse();
    lines
}
