/*
 * square.rs
 * Part of the egtb-probe project
 * Created Date: Tuesday, January 14th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Mon Mar 17 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Square indexing.
//!
//! Squares are plain `u8` indices in `[0, 63]`. Index 0 is a8 (the top-left
//! square as a position is displayed), 63 is h1. This is the orientation the
//! tablebase key tables are built in, so everything in the workspace shares
//! it. `col` counts files a..h, `row` counts 0 at rank 8 down to 7 at rank 1.

use anyhow::Result;

use crate::definitions::NumberOf;

/// Names of squares on the board, indexed by square.
#[rustfmt::skip]
pub const SQUARE_NAME: [&str; NumberOf::SQUARES] = [
    "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8",
    "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7",
    "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6",
    "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5",
    "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4",
    "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3",
    "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2",
    "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1",
];

/// File of the square, 0 = the a file.
#[inline(always)]
pub const fn col(square: u8) -> u8 {
    square & 7
}

/// Row of the square, 0 = rank 8, 7 = rank 1.
#[inline(always)]
pub const fn row(square: u8) -> u8 {
    square >> 3
}

/// Combine a file and a row into a square index.
#[inline(always)]
pub const fn to_square(col: u8, row: u8) -> u8 {
    (row << 3) | col
}

/// Returns `true` for indices on the board.
#[inline(always)]
pub const fn is_valid_square(square: i32) -> bool {
    square >= 0 && square < NumberOf::SQUARES as i32
}

/// Coordinate name of a square, e.g. `"e4"`.
pub fn square_name(square: u8) -> &'static str {
    SQUARE_NAME[square as usize]
}

/// Parses a coordinate name (`"e4"`) into a square index.
pub fn square_from_name(name: &str) -> Result<u8> {
    let mut chars = name.chars();
    let (file, rank) = (chars.next(), chars.next());
    match (file, rank, chars.next()) {
        (Some(f @ 'a'..='h'), Some(r @ '1'..='8'), None) => {
            let c = f as u8 - b'a';
            let row = b'8' - r as u8;
            Ok(to_square(c, row))
        }
        _ => Err(anyhow::Error::msg(format!("invalid square name: {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners() {
        assert_eq!(square_name(0), "a8");
        assert_eq!(square_name(7), "h8");
        assert_eq!(square_name(56), "a1");
        assert_eq!(square_name(63), "h1");
    }

    #[test]
    fn name_round_trip() {
        for sq in 0..64u8 {
            assert_eq!(square_from_name(square_name(sq)).unwrap(), sq);
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert!(square_from_name("i1").is_err());
        assert!(square_from_name("a9").is_err());
        assert!(square_from_name("a").is_err());
        assert!(square_from_name("a11").is_err());
    }

    #[test]
    fn col_row() {
        assert_eq!(col(63), 7);
        assert_eq!(row(63), 7);
        assert_eq!(to_square(4, 6), 52); // e2
        assert_eq!(square_name(52), "e2");
    }
}
