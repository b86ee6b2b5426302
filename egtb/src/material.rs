/*
 * material.rs
 * Part of the egtb-probe project
 * Created Date: Tuesday, January 21st 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Material signatures.
//!
//! A signature is the multiset of pieces on the board without regard to
//! squares, written as a lowercase name with the stronger side first
//! (`kqkr` = king+queen versus king+rook). It identifies the table file a
//! position belongs to.

use std::fmt::Display;

use chess::{
    board::Board,
    pieces::{Piece, PlacedPiece},
    side::Side,
};
use itertools::Itertools;

use crate::errors::{EgtbError, EgtbResult};

/// Piece census of both sides. Index 0 holds the side written first in the
/// name, which for a well-formed signature is the stronger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Material {
    counts: [[u8; 6]; 2],
}

impl Material {
    /// Parse a signature name such as `krpkq`.
    pub fn from_name(name: &str) -> EgtbResult<Material> {
        let invalid = || EgtbError::InvalidName(name.to_string());

        let mut counts = [[0u8; 6]; 2];
        let mut side = None::<usize>;
        for ch in name.chars() {
            let piece = Piece::try_from(ch).map_err(|_| invalid())?;
            if ch.is_ascii_uppercase() {
                return Err(invalid());
            }
            if piece.is_king() {
                side = match side {
                    None => Some(0),
                    Some(0) => Some(1),
                    Some(_) => return Err(invalid()),
                };
            }
            let sd = side.ok_or_else(invalid)?;
            counts[sd][piece as usize] += 1;
        }

        let material = Material { counts };
        if !material.is_valid() {
            return Err(invalid());
        }
        Ok(material)
    }

    /// Census of a board; index 0 is white.
    pub fn from_board(board: &Board) -> Material {
        Material {
            counts: board.piece_counts(),
        }
    }

    /// Census of a piece vector; index 0 is white.
    pub fn from_pieces(pieces: &[PlacedPiece]) -> Material {
        let mut counts = [[0u8; 6]; 2];
        for p in pieces {
            counts[p.side as usize][p.piece as usize] += 1;
        }
        Material { counts }
    }

    /// The canonical signature name: this census with the stronger side
    /// written first.
    pub fn name(&self) -> String {
        let side_name = |sd: usize| -> String {
            Piece::iter()
                .flat_map(|piece| {
                    std::iter::repeat(piece.as_char())
                        .take(self.counts[sd][piece as usize] as usize)
                })
                .join("")
        };
        if self.strong_side() == Side::Black {
            format!("{}{}", side_name(1), side_name(0))
        } else {
            format!("{}{}", side_name(0), side_name(1))
        }
    }

    pub fn count(&self, side: Side, piece: Piece) -> u8 {
        self.counts[side as usize][piece as usize]
    }

    pub fn counts(&self) -> &[[u8; 6]; 2] {
        &self.counts
    }

    /// Total number of pieces, kings included.
    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().map(|&n| n as u32).sum()
    }

    pub fn has_pawns(&self, side: Side) -> bool {
        self.count(side, Piece::Pawn) > 0
    }

    /// Both sides own at least one pawn, which opens the en-passant
    /// keyspace.
    pub fn is_enpassantable(&self) -> bool {
        self.has_pawns(Side::White) && self.has_pawns(Side::Black)
    }

    /// The stronger side: more non-king pieces, exchange value as the
    /// tiebreak, white on a full tie.
    pub fn strong_side(&self) -> Side {
        let mut count = [0u32; 2];
        let mut value = [0i32; 2];
        for sd in 0..2 {
            for piece in Piece::iter().filter(|p| !p.is_king()) {
                let n = self.counts[sd][piece as usize] as u32;
                count[sd] += n;
                value[sd] += n as i32 * piece.exchange_value();
            }
        }
        if count[1] > count[0] || (count[1] == count[0] && value[1] > value[0]) {
            Side::Black
        } else {
            Side::White
        }
    }

    /// The same census with the sides exchanged.
    pub fn swapped(&self) -> Material {
        Material {
            counts: [self.counts[1], self.counts[0]],
        }
    }

    /// One king per side and per-side piece counts within the legal caps.
    pub fn is_valid(&self) -> bool {
        self.counts.iter().all(|c| {
            let others: u32 = c[1..].iter().map(|&n| n as u32).sum();
            c[Piece::King as usize] == 1
                && c[Piece::Queen as usize] <= 9
                && c[Piece::Rook as usize] <= 10
                && c[Piece::Bishop as usize] <= 10
                && c[Piece::Knight as usize] <= 10
                && c[Piece::Pawn as usize] <= 8
                && others <= 15
        })
    }
}

impl Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render() {
        let m = Material::from_name("krpkq").unwrap();
        assert_eq!(m.count(Side::White, Piece::Rook), 1);
        assert_eq!(m.count(Side::White, Piece::Pawn), 1);
        assert_eq!(m.count(Side::Black, Piece::Queen), 1);
        // rendering normalizes to the stronger side first: r+p is two
        // pieces against one queen
        assert_eq!(m.name(), "krpkq");
    }

    #[test]
    fn name_normalizes_strong_side_first() {
        // written weak side first on purpose
        let m = Material::from_name("kkq").unwrap();
        assert_eq!(m.strong_side(), Side::Black);
        assert_eq!(m.name(), "kqk");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Material::from_name("").is_err());
        assert!(Material::from_name("qkk").is_err());
        assert!(Material::from_name("kqz").is_err());
        assert!(Material::from_name("kqkkq").is_err());
        assert!(Material::from_name("KQk").is_err());
        assert!(Material::from_name("kq").is_err()); // missing second king
    }

    #[test]
    fn strong_side_counts_first() {
        // two knights beat a queen on count
        let m = Material::from_name("kqknn").unwrap();
        assert_eq!(m.strong_side(), Side::Black);
        assert_eq!(m.name(), "knnkq");
    }

    #[test]
    fn board_census_round_trip() {
        let board = Board::from_fen("K2k4/2p5/8/8/8/8/8/8 w - - 0 1").unwrap();
        let m = Material::from_board(&board);
        assert_eq!(m.name(), "kpk");
        assert_eq!(m.strong_side(), Side::Black);
    }
}
