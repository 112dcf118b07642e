//! Sliding-tile board model.
//!
//! Boards are N×N grids stored row-major, with `0` standing for the blank.
//! The goal configuration is `1..n²-1` followed by the blank in the last
//! cell. Moves name the direction the blank travels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Board construction errors.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Board side length outside the supported range.
    #[error("unsupported board size: {0} (must be 2..=15)")]
    UnsupportedSize(u8),

    /// Tile vector does not describe a permutation of 0..n².
    #[error("invalid tile set for a {size}x{size} board")]
    InvalidTiles { size: u8 },
}

/// A move of the blank tile.
///
/// Expansion always enumerates moves in declaration order, which keeps
/// searches and splits reproducible across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All moves, in deterministic expansion order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// The move that undoes this one.
    pub fn inverse(self) -> Move {
        match self {
            Move::Up => Move::Down,
            Move::Down => Move::Up,
            Move::Left => Move::Right,
            Move::Right => Move::Left,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Move::Up => 'U',
            Move::Down => 'D',
            Move::Left => 'L',
            Move::Right => 'R',
        };
        write!(f, "{}", c)
    }
}

/// An N×N sliding-tile board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    size: u8,
    tiles: Vec<u8>,
}

impl Board {
    /// The solved configuration for an `n`×`n` board.
    ///
    /// Side lengths outside `2..=15` are rejected; tiles are stored as
    /// `u8`, so 15 is the largest side that fits.
    pub fn goal(size: u8) -> Result<Self, BoardError> {
        if !(2..=15).contains(&size) {
            return Err(BoardError::UnsupportedSize(size));
        }
        let n = size as usize;
        let mut tiles: Vec<u8> = (1..(n * n) as u8).collect();
        tiles.push(0);
        Ok(Self { size, tiles })
    }

    /// Build a board from an explicit tile layout.
    pub fn from_tiles(size: u8, tiles: Vec<u8>) -> Result<Self, BoardError> {
        if !(2..=15).contains(&size) {
            return Err(BoardError::UnsupportedSize(size));
        }
        let n = size as usize;
        if tiles.len() != n * n {
            return Err(BoardError::InvalidTiles { size });
        }
        let mut seen = vec![false; n * n];
        for &t in &tiles {
            let t = t as usize;
            if t >= n * n || seen[t] {
                return Err(BoardError::InvalidTiles { size });
            }
            seen[t] = true;
        }
        Ok(Self { size, tiles })
    }

    /// A solvable board produced by a seeded random walk from the goal.
    ///
    /// The walk never applies the inverse of its previous step, so short
    /// walks do not collapse back onto the goal.
    pub fn scrambled(size: u8, steps: u32, seed: u64) -> Result<Self, BoardError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut board = Self::goal(size)?;
        let mut last: Option<Move> = None;

        for _ in 0..steps {
            let candidates: Vec<Move> = Move::ALL
                .iter()
                .copied()
                .filter(|&m| Some(m.inverse()) != last)
                .filter(|&m| board.apply(m).is_some())
                .collect();
            if candidates.is_empty() {
                break;
            }
            let mv = candidates[rng.gen_range(0..candidates.len())];
            board = board.apply(mv).unwrap_or(board);
            last = Some(mv);
        }
        Ok(board)
    }

    /// Board side length.
    pub fn size(&self) -> u8 {
        self.size
    }

    /// Row-major tile layout, `0` for the blank.
    pub fn tiles(&self) -> &[u8] {
        &self.tiles
    }

    /// Index of the blank cell.
    fn blank_index(&self) -> usize {
        self.tiles
            .iter()
            .position(|&t| t == 0)
            .unwrap_or(self.tiles.len() - 1)
    }

    /// True if this board is the goal configuration.
    pub fn is_goal(&self) -> bool {
        let n = self.tiles.len();
        self.tiles[n - 1] == 0
            && self.tiles[..n - 1]
                .iter()
                .enumerate()
                .all(|(i, &t)| t as usize == i + 1)
    }

    /// Apply a move of the blank, returning the resulting board.
    ///
    /// Returns `None` when the blank would leave the grid.
    pub fn apply(&self, mv: Move) -> Option<Board> {
        let n = self.size as usize;
        let blank = self.blank_index();
        let (row, col) = (blank / n, blank % n);

        let target = match mv {
            Move::Up if row > 0 => blank - n,
            Move::Down if row < n - 1 => blank + n,
            Move::Left if col > 0 => blank - 1,
            Move::Right if col < n - 1 => blank + 1,
            _ => return None,
        };

        let mut tiles = self.tiles.clone();
        tiles.swap(blank, target);
        Some(Board {
            size: self.size,
            tiles,
        })
    }

    /// All boards one move away, paired with the move, in deterministic order.
    pub fn neighbors(&self) -> Vec<(Move, Board)> {
        Move::ALL
            .iter()
            .filter_map(|&m| self.apply(m).map(|b| (m, b)))
            .collect()
    }

    /// Sum of Manhattan distances of every tile from its goal cell.
    pub fn manhattan(&self) -> u32 {
        let n = self.size as usize;
        let mut total = 0u32;
        for (idx, &t) in self.tiles.iter().enumerate() {
            if t == 0 {
                continue;
            }
            let goal = (t - 1) as usize;
            let dr = (idx / n).abs_diff(goal / n);
            let dc = (idx % n).abs_diff(goal % n);
            total += (dr + dc) as u32;
        }
        total
    }

    /// Solvability via inversion parity.
    ///
    /// Odd side lengths require an even inversion count; even side lengths
    /// require inversions plus the blank's row counted from the bottom to
    /// be odd.
    pub fn is_solvable(&self) -> bool {
        let n = self.size as usize;
        let mut inversions = 0usize;
        let flat: Vec<u8> = self.tiles.iter().copied().filter(|&t| t != 0).collect();
        for i in 0..flat.len() {
            for j in (i + 1)..flat.len() {
                if flat[i] > flat[j] {
                    inversions += 1;
                }
            }
        }
        if n % 2 == 1 {
            inversions % 2 == 0
        } else {
            let blank_row_from_bottom = n - self.blank_index() / n;
            (inversions + blank_row_from_bottom) % 2 == 1
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.size as usize;
        for row in 0..n {
            for col in 0..n {
                let t = self.tiles[row * n + col];
                if t == 0 {
                    write!(f, "  . ")?;
                } else {
                    write!(f, "{:3} ", t)?;
                }
            }
            if row + 1 < n {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
