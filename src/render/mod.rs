//! Terminal table rendering: a box-drawing character grid, word wrapping and
//! nested table cells laid out on top of them.

pub mod cell;
pub mod grid;
pub mod wrap;
