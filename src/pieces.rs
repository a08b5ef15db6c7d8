//! Piece table (seven kinds, shape matrices) and the active falling piece.

use rand::Rng;

/// Tetromino kinds (I, J, L, O, S, T, Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
}

/// Shape matrix: rows of optional cells. `None` is an empty slot.
pub type Shape = Vec<Vec<Option<PieceKind>>>;

impl PieceKind {
    pub const ALL: [Self; 7] = [Self::I, Self::J, Self::L, Self::O, Self::S, Self::T, Self::Z];

    /// Index 0..7, used for palette lookup.
    pub fn index(self) -> usize {
        match self {
            Self::I => 0,
            Self::J => 1,
            Self::L => 2,
            Self::O => 3,
            Self::S => 4,
            Self::T => 5,
            Self::Z => 6,
        }
    }

    /// Uniform draw over the seven kinds.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Spawn-orientation mask; `true` marks an occupied slot.
    fn mask(self) -> &'static [&'static [bool]] {
        const X: bool = true;
        const O: bool = false;
        match self {
            Self::I => &[&[O, X, O, O], &[O, X, O, O], &[O, X, O, O], &[O, X, O, O]],
            Self::J => &[&[X, O, O], &[X, X, X], &[O, O, O]],
            Self::L => &[&[O, O, X], &[X, X, X], &[O, O, O]],
            Self::O => &[&[X, X], &[X, X]],
            Self::S => &[&[O, X, X], &[X, X, O], &[O, O, O]],
            Self::T => &[&[O, X, O], &[X, X, X], &[O, O, O]],
            Self::Z => &[&[X, X, O], &[O, X, X], &[O, O, O]],
        }
    }

    /// Shape matrix in spawn orientation.
    pub fn shape(self) -> Shape {
        self.mask()
            .iter()
            .map(|row| row.iter().map(|&filled| filled.then_some(self)).collect())
            .collect()
    }
}

/// Rotate a shape 90° clockwise: transpose, then reverse each row.
pub fn rotate_cw(shape: &Shape) -> Shape {
    let rows = shape.len();
    let cols = shape.first().map_or(0, Vec::len);
    let mut out: Shape = (0..cols)
        .map(|c| (0..rows).map(|r| shape[r][c]).collect())
        .collect();
    for row in &mut out {
        row.reverse();
    }
    out
}

/// The falling piece. Replaced wholesale on spawn, rotation and lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePiece {
    pub kind: PieceKind,
    pub shape: Shape,
    /// Top-left of the shape matrix in grid cells.
    pub x: i32,
    pub y: i32,
    pub locked: bool,
}

impl ActivePiece {
    /// New piece horizontally centered on a board of `board_width` columns, at y = 0.
    pub fn spawn(kind: PieceKind, board_width: usize) -> Self {
        let shape = kind.shape();
        let w = shape.first().map_or(0, Vec::len) as i32;
        Self {
            kind,
            shape,
            x: board_width as i32 / 2 - w / 2,
            y: 0,
            locked: false,
        }
    }

    /// Width of the shape matrix.
    pub fn width(&self) -> usize {
        self.shape.first().map_or(0, Vec::len)
    }

    /// Absolute grid coordinates of every occupied cell, shifted by `(dx, dy)`.
    pub fn cells(&self, dx: i32, dy: i32) -> impl Iterator<Item = (i32, i32, PieceKind)> + '_ {
        self.shape.iter().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().filter_map(move |(c, slot)| {
                slot.map(|kind| (self.x + c as i32 + dx, self.y + r as i32 + dy, kind))
            })
        })
    }

    /// Copy moved by `(dx, dy)`.
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self.clone()
        }
    }

    /// Candidate with the shape rotated clockwise, same position.
    pub fn rotated(&self) -> Self {
        Self {
            shape: rotate_cw(&self.shape),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_four_cells() {
        for kind in PieceKind::ALL {
            let filled = kind.shape().iter().flatten().filter(|c| c.is_some()).count();
            assert_eq!(filled, 4, "{kind:?}");
        }
    }

    #[test]
    fn rotate_transposes_then_reverses_rows() {
        let t = PieceKind::T.shape();
        let r = rotate_cw(&t);
        let tt = Some(PieceKind::T);
        assert_eq!(
            r,
            vec![vec![None, tt, None], vec![None, tt, tt], vec![None, tt, None]]
        );
    }

    #[test]
    fn four_rotations_is_identity() {
        for kind in PieceKind::ALL {
            let s = kind.shape();
            let back = rotate_cw(&rotate_cw(&rotate_cw(&rotate_cw(&s))));
            assert_eq!(back, s);
        }
    }

    #[test]
    fn spawn_is_centered() {
        assert_eq!(ActivePiece::spawn(PieceKind::I, 10).x, 3);
        assert_eq!(ActivePiece::spawn(PieceKind::O, 10).x, 4);
        assert_eq!(ActivePiece::spawn(PieceKind::T, 10).x, 4);
        assert_eq!(ActivePiece::spawn(PieceKind::T, 10).y, 0);
    }

    #[test]
    fn cells_are_absolute() {
        let p = ActivePiece::spawn(PieceKind::O, 10);
        let cells: Vec<_> = p.cells(0, 1).map(|(x, y, _)| (x, y)).collect();
        assert_eq!(cells, vec![(4, 1), (5, 1), (4, 2), (5, 2)]);
    }
}
