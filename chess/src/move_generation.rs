/*
 * move_generation.rs
 * Part of the egtb-probe project
 * Created Date: Thursday, January 16th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Pseudo-legal and legal move generation on the mailbox board.

use crate::{
    board::Board,
    definitions::{BISHOP_OFFSETS, CastlingRights, KNIGHT_OFFSETS, QUEEN_OFFSETS, ROOK_OFFSETS},
    move_list::MoveList,
    moves::Move,
    pieces::{Piece, PlacedPiece},
    side::Side,
    square::{col, row, to_square},
};

/// Step from a square by file/row deltas, `None` off the board.
#[inline(always)]
fn offset_square(square: u8, dc: i8, dr: i8) -> Option<u8> {
    let c = col(square) as i8 + dc;
    let r = row(square) as i8 + dr;
    if (0..8).contains(&c) && (0..8).contains(&r) {
        Some(to_square(c as u8, r as u8))
    } else {
        None
    }
}

impl Board {
    /// Generate pseudo-legal moves for `side`. King safety is not checked
    /// here; use [`Board::gen_legal`] for that.
    pub fn gen(&self, side: Side, capture_only: bool, list: &mut MoveList) {
        for p in self.piece_list[side as usize].iter().flatten().copied() {
            match p.piece {
                Piece::King => self.gen_king(&p, capture_only, list),
                Piece::Queen => self.gen_slider(&p, &QUEEN_OFFSETS, capture_only, list),
                Piece::Rook => self.gen_slider(&p, &ROOK_OFFSETS, capture_only, list),
                Piece::Bishop => self.gen_slider(&p, &BISHOP_OFFSETS, capture_only, list),
                Piece::Knight => {
                    for (dc, dr) in KNIGHT_OFFSETS {
                        if let Some(to) = offset_square(p.square, dc, dr) {
                            self.add_move(&p, to, capture_only, list);
                        }
                    }
                }
                Piece::Pawn => self.gen_pawn(&p, capture_only, list),
            }
        }
    }

    /// Generate fully legal moves for `side` by filtering pseudo-legal
    /// moves through make/unmake.
    pub fn gen_legal(&mut self, side: Side, capture_only: bool, list: &mut MoveList) {
        let mut pseudo = MoveList::new();
        self.gen(side, capture_only, &mut pseudo);
        list.clear();
        for mv in pseudo.as_slice() {
            let hist = self.make(mv);
            if !self.is_in_check(side) {
                list.push(*mv);
            }
            self.take_back(hist);
        }
    }

    /// Is `square` attacked by any piece of `attacker`?
    pub fn be_attacked(&self, square: u8, attacker: Side) -> bool {
        for (dc, dr) in KNIGHT_OFFSETS {
            if let Some(from) = offset_square(square, dc, dr) {
                if self.is_piece(from, Piece::Knight, attacker) {
                    return true;
                }
            }
        }

        for (dc, dr) in ROOK_OFFSETS {
            let mut sq = square;
            let mut first = true;
            while let Some(next) = offset_square(sq, dc, dr) {
                if let Some((piece, side)) = self.piece_on(next) {
                    if side == attacker
                        && (piece == Piece::Queen
                            || piece == Piece::Rook
                            || (first && piece == Piece::King))
                    {
                        return true;
                    }
                    break;
                }
                sq = next;
                first = false;
            }
        }

        for (dc, dr) in BISHOP_OFFSETS {
            let mut sq = square;
            let mut first = true;
            while let Some(next) = offset_square(sq, dc, dr) {
                if let Some((piece, side)) = self.piece_on(next) {
                    if side == attacker {
                        // white pawns attack upwards (towards row 0), so they
                        // sit one step below the attacked square
                        let pawn_hit = piece == Piece::Pawn
                            && first
                            && ((dr == 1 && attacker == Side::White)
                                || (dr == -1 && attacker == Side::Black));
                        if piece == Piece::Queen
                            || piece == Piece::Bishop
                            || (first && piece == Piece::King)
                            || pawn_hit
                        {
                            return true;
                        }
                    }
                    break;
                }
                sq = next;
                first = false;
            }
        }

        false
    }

    /// Is the given side's king currently attacked?
    pub fn is_in_check(&self, side: Side) -> bool {
        match self.king_square(side) {
            Some(square) => self.be_attacked(square, side.opposite()),
            None => false,
        }
    }

    fn add_move(&self, p: &PlacedPiece, to: u8, capture_only: bool, list: &mut MoveList) {
        let target = self.piece_on(to);
        if target.map(|(_, s)| s) == Some(p.side) {
            return;
        }
        if capture_only && target.is_none() {
            return;
        }
        list.push(Move::new(p.piece, p.side, p.square, to));
    }

    /// Pawn variant of [`Board::add_move`]: fans out into the four
    /// promotions on the last row.
    fn add_pawn_move(&self, p: &PlacedPiece, to: u8, capture_only: bool, list: &mut MoveList) {
        let target = self.piece_on(to);
        if target.map(|(_, s)| s) == Some(p.side) {
            return;
        }
        if capture_only && target.is_none() && self.en_passant != Some(to) {
            return;
        }
        if row(to) == 0 || row(to) == 7 {
            for promo in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                list.push(Move::new_promotion(p.side, p.square, to, promo));
            }
        } else {
            list.push(Move::new(Piece::Pawn, p.side, p.square, to));
        }
    }

    fn gen_slider(
        &self,
        p: &PlacedPiece,
        dirs: &[(i8, i8)],
        capture_only: bool,
        list: &mut MoveList,
    ) {
        for &(dc, dr) in dirs {
            let mut sq = p.square;
            while let Some(next) = offset_square(sq, dc, dr) {
                self.add_move(p, next, capture_only, list);
                if !self.is_empty_square(next) {
                    break;
                }
                sq = next;
            }
        }
    }

    fn gen_king(&self, p: &PlacedPiece, capture_only: bool, list: &mut MoveList) {
        for (dc, dr) in QUEEN_OFFSETS {
            if let Some(to) = offset_square(p.square, dc, dr) {
                self.add_move(p, to, capture_only, list);
            }
        }
        if capture_only {
            return;
        }

        let rights = self.castle_rights(p.side);
        if rights == CastlingRights::NONE {
            return;
        }
        let enemy = p.side.opposite();
        // long: the three squares between king and rook empty, the king's
        // path not attacked; short likewise with two squares
        let home = p.square;
        if (p.side == Side::Black && home == 4) || (p.side == Side::White && home == 60) {
            if rights & CastlingRights::LONG != 0
                && self.is_empty_square(home - 1)
                && self.is_empty_square(home - 2)
                && self.is_empty_square(home - 3)
                && !self.be_attacked(home - 1, enemy)
                && !self.be_attacked(home - 2, enemy)
            {
                list.push(Move::new(Piece::King, p.side, home, home - 2));
            }
            if rights & CastlingRights::SHORT != 0
                && self.is_empty_square(home + 1)
                && self.is_empty_square(home + 2)
                && !self.be_attacked(home + 1, enemy)
                && !self.be_attacked(home + 2, enemy)
            {
                list.push(Move::new(Piece::King, p.side, home, home + 2));
            }
        }
    }

    fn gen_pawn(&self, p: &PlacedPiece, capture_only: bool, list: &mut MoveList) {
        let (dr, home_row) = match p.side {
            Side::White => (-1i8, 6),
            Side::Black => (1i8, 1),
        };

        if !capture_only {
            if let Some(push) = offset_square(p.square, 0, dr) {
                if self.is_empty_square(push) {
                    self.add_pawn_move(p, push, capture_only, list);
                    if row(p.square) == home_row {
                        if let Some(double) = offset_square(push, 0, dr) {
                            if self.is_empty_square(double) {
                                self.add_move(p, double, capture_only, list);
                            }
                        }
                    }
                }
            }
        }

        for dc in [-1i8, 1] {
            if let Some(to) = offset_square(p.square, dc, dr) {
                let takeable = match self.piece_on(to) {
                    Some((_, side)) => side != p.side,
                    None => self.en_passant == Some(to),
                };
                if takeable {
                    self.add_pawn_move(p, to, capture_only, list);
                }
            }
        }
    }
}
