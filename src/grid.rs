//! Board representation and the collision predicate.

use crate::pieces::{ActivePiece, PieceKind};
use std::collections::VecDeque;

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Clear,
    Merged,
    /// Display-only projection of the landing spot; never stored in the authoritative grid.
    Ghost,
    /// Row is pending removal.
    Cracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub value: Option<PieceKind>,
    pub status: CellStatus,
}

impl Cell {
    pub const EMPTY: Self = Self {
        value: None,
        status: CellStatus::Clear,
    };

    pub fn merged(kind: PieceKind) -> Self {
        Self {
            value: Some(kind),
            status: CellStatus::Merged,
        }
    }

    #[inline]
    pub fn is_clear(&self) -> bool {
        self.status == CellStatus::Clear
    }
}

/// Grid of cells. y=0 is top; rows are stored [0..height].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    /// rows[y][x] = cell. rows[0] is top.
    rows: VecDeque<Vec<Cell>>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(BOARD_WIDTH, BOARD_HEIGHT)
    }
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        let rows = (0..height).map(|_| vec![Cell::EMPTY; width]).collect();
        Self {
            width,
            height,
            rows,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    /// Signed lookup; anything off the board reads as `None`.
    pub fn get_signed(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.get(x as usize, y as usize)
    }

    /// True if the cell containing the point (in cell units) is `Merged`.
    pub fn is_merged_at(&self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 {
            return false;
        }
        self.get(x as usize, y as usize)
            .is_some_and(|c| c.status == CellStatus::Merged)
    }

    pub fn row(&self, y: usize) -> Option<&[Cell]> {
        self.rows.get(y).map(Vec::as_slice)
    }

    /// Row indices whose every cell is `Merged`, top to bottom.
    pub fn full_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|c| c.status == CellStatus::Merged))
            .map(|(y, _)| y)
            .collect()
    }

    /// Write every occupied piece cell as `Merged`. Returns the cells written.
    /// Cells above the top edge are dropped.
    pub fn merge(&mut self, piece: &ActivePiece) -> Vec<(usize, usize)> {
        let mut written = Vec::with_capacity(4);
        for (x, y, kind) in piece.cells(0, 0) {
            if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
                continue;
            }
            let (x, y) = (x as usize, y as usize);
            self.set(x, y, Cell::merged(kind));
            written.push((x, y));
        }
        written
    }

    /// Re-tag the cells of `rows` with `status`, leaving values intact.
    pub fn mark_rows(&mut self, rows: &[usize], status: CellStatus) {
        for &y in rows {
            if let Some(row) = self.rows.get_mut(y) {
                for cell in row.iter_mut() {
                    cell.status = status;
                }
            }
        }
    }

    /// Blank `rows` to `Empty/Clear` in place.
    pub fn blank_rows(&mut self, rows: &[usize]) {
        for &y in rows {
            if let Some(row) = self.rows.get_mut(y) {
                row.fill(Cell::EMPTY);
            }
        }
    }

    /// Remove `rows`, shift everything above down, pad the top with empty rows.
    /// Height is unchanged.
    pub fn remove_rows(&mut self, rows: &[usize]) {
        let mut sorted: Vec<usize> = rows.iter().copied().filter(|&y| y < self.height).collect();
        sorted.sort_unstable();
        sorted.dedup();
        // Bottom-most first so earlier indices stay valid.
        for &y in sorted.iter().rev() {
            self.rows.remove(y);
        }
        for _ in 0..sorted.len() {
            self.rows.push_front(vec![Cell::EMPTY; self.width]);
        }
    }

    /// Display copy with the ghost and active piece painted in. Never fed back.
    pub fn overlay(&self, active: Option<&ActivePiece>, ghost: Option<&ActivePiece>) -> Self {
        let mut out = self.clone();
        if let Some(ghost) = ghost {
            for (x, y, kind) in ghost.cells(0, 0) {
                if out.get_signed(x, y).is_some_and(|c| c.is_clear()) {
                    out.set(
                        x as usize,
                        y as usize,
                        Cell {
                            value: Some(kind),
                            status: CellStatus::Ghost,
                        },
                    );
                }
            }
        }
        if let Some(active) = active {
            for (x, y, kind) in active.cells(0, 0) {
                if x >= 0 && y >= 0 {
                    out.set(x as usize, y as usize, Cell::merged(kind));
                }
            }
        }
        out
    }
}

/// True if `piece` moved by `offset` leaves the board sideways, passes the floor,
/// or lands on a cell that is not `Clear`. Rows above the top edge are allowed.
pub fn collides(piece: &ActivePiece, grid: &Grid, offset: (i32, i32)) -> bool {
    let (dx, dy) = offset;
    piece.cells(dx, dy).any(|(x, y, _)| {
        if x < 0 || x >= grid.width() as i32 || y >= grid.height() as i32 {
            return true;
        }
        if y < 0 {
            return false;
        }
        // Missing row is treated as occupied.
        grid.get(x as usize, y as usize).is_none_or(|c| !c.is_clear())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::PieceKind;

    fn fill_row(grid: &mut Grid, y: usize, skip: &[usize]) {
        for x in 0..grid.width() {
            if !skip.contains(&x) {
                grid.set(x, y, Cell::merged(PieceKind::Z));
            }
        }
    }

    #[test]
    fn out_of_bounds_offsets_collide() {
        let grid = Grid::default();
        let piece = ActivePiece::spawn(PieceKind::O, BOARD_WIDTH);
        assert!(!collides(&piece, &grid, (0, 0)));
        assert!(collides(&piece, &grid, (-5, 0)));
        assert!(collides(&piece, &grid, (5, 0)));
        assert!(collides(&piece, &grid, (0, BOARD_HEIGHT as i32 - 1)));
        assert!(!collides(&piece, &grid, (0, BOARD_HEIGHT as i32 - 2)));
    }

    #[test]
    fn above_top_edge_is_allowed() {
        let grid = Grid::default();
        let piece = ActivePiece::spawn(PieceKind::T, BOARD_WIDTH);
        assert!(!collides(&piece, &grid, (0, -1)));
    }

    #[test]
    fn every_in_range_offset_agrees_with_bounds() {
        let grid = Grid::default();
        for kind in PieceKind::ALL {
            let piece = ActivePiece::spawn(kind, BOARD_WIDTH);
            for dx in -8..8 {
                for dy in 0..24 {
                    let outside = piece.cells(dx, dy).any(|(x, y, _)| {
                        x < 0 || x >= BOARD_WIDTH as i32 || y >= BOARD_HEIGHT as i32
                    });
                    if outside {
                        assert!(collides(&piece, &grid, (dx, dy)), "{kind:?} {dx} {dy}");
                    } else {
                        assert!(!collides(&piece, &grid, (dx, dy)), "{kind:?} {dx} {dy}");
                    }
                }
            }
        }
    }

    #[test]
    fn non_clear_cells_collide() {
        let mut grid = Grid::default();
        let piece = ActivePiece::spawn(PieceKind::O, BOARD_WIDTH);
        grid.set(4, 3, Cell::merged(PieceKind::I));
        assert!(collides(&piece, &grid, (0, 2)));
        grid.mark_rows(&[3], CellStatus::Cracking);
        assert!(collides(&piece, &grid, (0, 2)));
    }

    #[test]
    fn full_rows_and_remove_keep_height() {
        let mut grid = Grid::default();
        fill_row(&mut grid, 19, &[]);
        fill_row(&mut grid, 18, &[3]);
        fill_row(&mut grid, 17, &[]);
        grid.set(0, 16, Cell::merged(PieceKind::L));
        assert_eq!(grid.full_rows(), vec![17, 19]);

        grid.remove_rows(&[17, 19]);
        assert_eq!(grid.height(), BOARD_HEIGHT);
        assert_eq!(grid.rows.len(), BOARD_HEIGHT);
        assert!(grid.row(0).unwrap().iter().all(|c| *c == Cell::EMPTY));
        assert!(grid.row(1).unwrap().iter().all(|c| *c == Cell::EMPTY));
        // Partial row dropped one, marker above it dropped two.
        assert_eq!(grid.get(3, 19), Some(Cell::EMPTY));
        assert_eq!(grid.get(4, 19), Some(Cell::merged(PieceKind::Z)));
        assert_eq!(grid.get(0, 18), Some(Cell::merged(PieceKind::L)));
    }

    #[test]
    fn mark_keeps_values_and_blank_clears() {
        let mut grid = Grid::default();
        fill_row(&mut grid, 19, &[]);
        grid.mark_rows(&[19], CellStatus::Cracking);
        let cell = grid.get(2, 19).unwrap();
        assert_eq!(cell.status, CellStatus::Cracking);
        assert_eq!(cell.value, Some(PieceKind::Z));
        grid.blank_rows(&[19]);
        assert_eq!(grid.get(2, 19), Some(Cell::EMPTY));
    }

    #[test]
    fn overlay_does_not_touch_source() {
        let grid = Grid::default();
        let piece = ActivePiece::spawn(PieceKind::O, BOARD_WIDTH);
        let ghost = piece.shifted(0, 18);
        let shown = grid.overlay(Some(&piece), Some(&ghost));
        assert_eq!(shown.get(4, 19).map(|c| c.status), Some(CellStatus::Ghost));
        assert_eq!(shown.get(4, 0).map(|c| c.status), Some(CellStatus::Merged));
        assert_eq!(grid, Grid::default());
    }

    #[test]
    fn merged_lookup_uses_cell_units() {
        let mut grid = Grid::default();
        grid.set(2, 19, Cell::merged(PieceKind::S));
        assert!(grid.is_merged_at(2.5, 19.1));
        assert!(!grid.is_merged_at(3.0, 19.1));
        assert!(!grid.is_merged_at(2.5, 20.5));
        assert!(!grid.is_merged_at(-0.5, 19.5));
    }
}
