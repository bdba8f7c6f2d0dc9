//! Boustrophedon (snake) traversal.
//!
//! Even rows run left to right, odd rows right to left, so the pan axis
//! never sweeps back across the whole field between rows.

/// Column indices of row `y` in visiting order.
pub fn row_columns(y: usize, width: usize) -> impl Iterator<Item = usize> {
    (0..width).map(move |i| if y % 2 == 0 { i } else { width - 1 - i })
}

/// Every `(x, y)` cell of a `width x height` grid in visiting order.
pub fn snake_order(width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..height).flat_map(move |y| row_columns(y, width).map(move |x| (x, y)))
}
