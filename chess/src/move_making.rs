/*
 * move_making.rs
 * Part of the egtb-probe project
 * Created Date: Friday, January 17th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Making and unmaking moves.
//!
//! `make` expects a pseudo-legal move for the current position and returns
//! the [`History`] needed for a perfect undo. The side to move is owned by
//! the caller (probing walks positions for both sides), so `make` does not
//! toggle it.

use crate::{
    board::Board,
    definitions::CastlingRights,
    moves::{History, Move},
    pieces::{Piece, PlacedPiece},
    side::Side,
};

impl Board {
    /// Apply a pseudo-legal move to both board representations.
    pub fn make(&mut self, mv: &Move) -> History {
        debug_assert_eq!(self.piece_on(mv.from), Some((mv.piece, mv.side)));

        let mut hist = History {
            mv: *mv,
            captured: self.piece_on(mv.to).map(|(piece, side)| PlacedPiece {
                piece,
                side,
                square: mv.to,
            }),
            en_passant: self.en_passant,
            castle_rights: self.castle_rights,
        };
        debug_assert!(hist.captured.is_none_or(|cap| !cap.piece.is_king()));

        self.squares[mv.to as usize] = self.squares[mv.from as usize].take();
        self.en_passant = None;

        if self.castle_rights != [CastlingRights::NONE; 2] {
            if let Some(cap) = hist.captured {
                if cap.piece == Piece::Rook {
                    self.clear_castle_right_for_rook(cap.square, cap.side);
                }
            }
        }

        match mv.piece {
            Piece::King => {
                self.castle_rights[mv.side as usize] = CastlingRights::NONE;
                if mv.from.abs_diff(mv.to) == 2 {
                    // castle: bring the rook to the square the king crossed
                    let rook_from = if mv.from < mv.to {
                        mv.from + 3
                    } else {
                        mv.from - 4
                    };
                    let rook_to = (mv.from + mv.to) / 2;
                    debug_assert!(self.is_piece(rook_from, Piece::Rook, mv.side));
                    self.squares[rook_to as usize] = self.squares[rook_from as usize].take();
                    self.list_move(mv.side, rook_from, rook_to, None);
                }
            }
            Piece::Rook => {
                if self.castle_rights != [CastlingRights::NONE; 2] {
                    self.clear_castle_right_for_rook(mv.from, mv.side);
                }
            }
            Piece::Pawn => {
                if mv.from.abs_diff(mv.to) == 16 {
                    debug_assert!(hist.captured.is_none());
                    self.en_passant = Some((mv.from + mv.to) / 2);
                } else if hist.en_passant == Some(mv.to) {
                    // en passant: the victim is one row behind the target
                    let victim = if mv.side == Side::White {
                        mv.to + 8
                    } else {
                        mv.to - 8
                    };
                    hist.captured = self.squares[victim as usize].take().map(|(piece, side)| {
                        PlacedPiece {
                            piece,
                            side,
                            square: victim,
                        }
                    });
                    debug_assert!(matches!(hist.captured, Some(p) if p.piece.is_pawn()));
                } else if let Some(promo) = mv.promotion {
                    self.squares[mv.to as usize] = Some((promo, mv.side));
                }
            }
            _ => {}
        }

        if let Some(cap) = hist.captured {
            self.list_remove_at(cap.square, cap.side);
        }
        self.list_move(mv.side, mv.from, mv.to, mv.promotion);

        self.check_en_passant();
        hist
    }

    /// Restore the position exactly as it was before [`Board::make`].
    pub fn take_back(&mut self, hist: History) {
        let mv = hist.mv;

        self.squares[mv.from as usize] = self.squares[mv.to as usize].take();
        if mv.promotion.is_some() {
            self.squares[mv.from as usize] = Some((Piece::Pawn, mv.side));
        }

        if mv.piece == Piece::King && mv.from.abs_diff(mv.to) == 2 {
            let rook_from = if mv.from < mv.to {
                mv.from + 3
            } else {
                mv.from - 4
            };
            let rook_to = (mv.from + mv.to) / 2;
            self.squares[rook_from as usize] = self.squares[rook_to as usize].take();
            self.list_move(mv.side, rook_to, rook_from, None);
        }

        self.list_move(mv.side, mv.to, mv.from, mv.promotion.map(|_| Piece::Pawn));

        if let Some(cap) = hist.captured {
            self.squares[cap.square as usize] = Some((cap.piece, cap.side));
            self.list_put(cap.piece, cap.side, cap.square);
        }

        self.en_passant = hist.en_passant;
        self.castle_rights = hist.castle_rights;
    }

    fn clear_castle_right_for_rook(&mut self, square: u8, side: Side) {
        use crate::definitions::Squares;
        let cleared = match (square, side) {
            (Squares::BLACK_ROOK_LONG, Side::Black) => CastlingRights::LONG,
            (Squares::BLACK_ROOK_SHORT, Side::Black) => CastlingRights::SHORT,
            (Squares::WHITE_ROOK_LONG, Side::White) => CastlingRights::LONG,
            (Squares::WHITE_ROOK_SHORT, Side::White) => CastlingRights::SHORT,
            _ => return,
        };
        self.castle_rights[side as usize] &= !cleared;
    }
}
