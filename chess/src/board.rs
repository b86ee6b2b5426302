/*
 * board.rs
 * Part of the egtb-probe project
 * Created Date: Wednesday, January 15th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

use std::fmt::Display;

use thiserror::Error;

use crate::{
    definitions::{CastlingRights, NumberOf, Squares},
    fen,
    fen::FenError,
    flip::FlipMode,
    pieces::{Piece, PlacedPiece},
    side::Side,
    square::{col, row, square_name},
};

/// Errors raised while placing pieces on a board.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BoardError {
    #[error("square index {0} is off the board")]
    InvalidSquare(u8),
    #[error("square {0} is already occupied")]
    SquareOccupied(u8),
    #[error("no free piece list slot for side {0}")]
    TooManyPieces(Side),
}

/// A chess position held in two synchronized representations.
///
/// The dense `squares` array answers "what stands here" in O(1) and drives
/// move generation and attack scans. The sparse `piece_list` iterates pieces
/// by side and type, which is the shape the tablebase key encoder consumes.
/// Slot 0 of each side is always the king; slots 1..16 may contain holes.
/// Every mutation goes through both representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub(crate) squares: [Option<(Piece, Side)>; NumberOf::SQUARES],
    pub(crate) piece_list: [[Option<PlacedPiece>; NumberOf::PIECE_LIST_SLOTS]; NumberOf::SIDES],
    pub side_to_move: Side,
    pub en_passant: Option<u8>,
    pub(crate) castle_rights: [u8; NumberOf::SIDES],
    pub(crate) half_move_clock: u32,
    pub(crate) full_move_number: u32,
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl Board {
    /// Create a new, empty board.
    pub fn new() -> Self {
        Board {
            squares: [None; NumberOf::SQUARES],
            piece_list: [[None; NumberOf::PIECE_LIST_SLOTS]; NumberOf::SIDES],
            side_to_move: Side::White,
            en_passant: None,
            castle_rights: [CastlingRights::NONE; NumberOf::SIDES],
            half_move_clock: 0,
            full_move_number: 1,
        }
    }

    /// The standard starting position.
    pub fn default_board() -> Self {
        Self::from_fen(crate::definitions::DEFAULT_FEN)
            .unwrap_or_else(|_| unreachable!("default FEN is valid"))
    }

    /// Parse a FEN string into a board.
    pub fn from_fen(fen_str: &str) -> Result<Self, FenError> {
        fen::board_from_fen(fen_str)
    }

    /// Render the board as a FEN string.
    pub fn to_fen(&self) -> String {
        fen::board_to_fen(self)
    }

    /// Piece and side standing on `square`, if any.
    #[inline(always)]
    pub fn piece_on(&self, square: u8) -> Option<(Piece, Side)> {
        self.squares[square as usize]
    }

    #[inline(always)]
    pub fn is_empty_square(&self, square: u8) -> bool {
        self.squares[square as usize].is_none()
    }

    #[inline(always)]
    pub fn is_piece(&self, square: u8, piece: Piece, side: Side) -> bool {
        self.squares[square as usize] == Some((piece, side))
    }

    /// Square of the given side's king, from slot 0 of the piece list.
    pub fn king_square(&self, side: Side) -> Option<u8> {
        self.piece_list[side as usize][0].map(|p| p.square)
    }

    /// The sparse representation; slot 0 per side is the king.
    pub fn piece_list(&self) -> &[[Option<PlacedPiece>; NumberOf::PIECE_LIST_SLOTS]; NumberOf::SIDES]
    {
        &self.piece_list
    }

    /// Iterate over every piece on the board, white first.
    pub fn pieces(&self) -> impl Iterator<Item = PlacedPiece> + '_ {
        self.piece_list.iter().flatten().filter_map(|p| *p)
    }

    pub fn castle_rights(&self, side: Side) -> u8 {
        self.castle_rights[side as usize]
    }

    pub fn half_move_clock(&self) -> u32 {
        self.half_move_clock
    }

    pub fn full_move_number(&self) -> u32 {
        self.full_move_number
    }

    /// Remove every piece and reset the state fields.
    pub fn clear(&mut self) {
        *self = Board::new();
    }

    /// Place a piece, updating both representations.
    pub fn put_piece(&mut self, piece: Piece, side: Side, square: u8) -> Result<(), BoardError> {
        if square >= NumberOf::SQUARES as u8 {
            return Err(BoardError::InvalidSquare(square));
        }
        if self.squares[square as usize].is_some() {
            return Err(BoardError::SquareOccupied(square));
        }
        if !self.list_put(piece, side, square) {
            return Err(BoardError::TooManyPieces(side));
        }
        self.squares[square as usize] = Some((piece, side));
        Ok(())
    }

    /// Remove whatever stands on `square` from both representations.
    pub fn remove_piece(&mut self, square: u8) {
        if let Some((_, side)) = self.squares[square as usize].take() {
            self.list_remove_at(square, side);
        }
    }

    /// Build a position from a piece vector, a side to move and an optional
    /// en-passant target. The target is dropped again unless the placement
    /// supports it; an implausible target never rejects the position.
    pub fn setup(
        &mut self,
        pieces: &[PlacedPiece],
        side_to_move: Side,
        en_passant: Option<u8>,
    ) -> Result<(), BoardError> {
        self.clear();
        self.side_to_move = side_to_move;
        for p in pieces {
            self.put_piece(p.piece, p.side, p.square)?;
        }
        self.legalize_ep_castle(en_passant, side_to_move);
        Ok(())
    }

    // ---- piece list maintenance -------------------------------------------

    /// Insert into the piece list. The king always takes slot 0; other
    /// pieces reuse a slot already pointing at `square` or the first hole.
    pub(crate) fn list_put(&mut self, piece: Piece, side: Side, square: u8) -> bool {
        let entry = PlacedPiece::new(piece, side, square);
        let slots = &mut self.piece_list[side as usize];
        if piece.is_king() {
            // a second king has nowhere to go
            if slots[0].is_some() {
                return false;
            }
            slots[0] = Some(entry);
            return true;
        }
        let mut free = None;
        for (i, slot) in slots.iter().enumerate().skip(1) {
            match slot {
                Some(p) if p.square == square => {
                    free = Some(i);
                    break;
                }
                None if free.is_none() => free = Some(i),
                _ => {}
            }
        }
        match free {
            Some(i) => {
                slots[i] = Some(entry);
                true
            }
            None => false,
        }
    }

    pub(crate) fn list_remove_at(&mut self, square: u8, side: Side) -> bool {
        for slot in self.piece_list[side as usize].iter_mut() {
            if matches!(slot, Some(p) if p.square == square) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Relocate a listed piece, optionally changing its type (promotion and
    /// its undo).
    pub(crate) fn list_move(&mut self, side: Side, from: u8, to: u8, becomes: Option<Piece>) -> bool {
        for slot in self.piece_list[side as usize].iter_mut() {
            if let Some(p) = slot {
                if p.square == from {
                    p.square = to;
                    if let Some(piece) = becomes {
                        p.piece = piece;
                    }
                    return true;
                }
            }
        }
        false
    }

    // ---- position facts ----------------------------------------------------

    /// Both sides down to a bare king.
    pub fn is_material_draw(&self) -> bool {
        self.piece_list
            .iter()
            .all(|slots| slots[1..].iter().all(|p| p.is_none()))
    }

    /// The side with more pieces; the exchange-value sum breaks ties, white
    /// wins a full tie.
    pub fn strong_side(&self) -> Side {
        let mut count = [0u32; 2];
        let mut material = [0i32; 2];
        for p in self.pieces() {
            if !p.piece.is_king() {
                count[p.side as usize] += 1;
                material[p.side as usize] += p.piece.exchange_value();
            }
        }
        let (w, b) = (Side::White as usize, Side::Black as usize);
        if count[b] > count[w] || (count[b] == count[w] && material[b] > material[w]) {
            Side::Black
        } else {
            Side::White
        }
    }

    /// Census of piece types per side.
    pub fn piece_counts(&self) -> [[u8; NumberOf::PIECE_TYPES]; NumberOf::SIDES] {
        let mut counts = [[0u8; NumberOf::PIECE_TYPES]; NumberOf::SIDES];
        for p in self.pieces() {
            counts[p.side as usize][p.piece as usize] += 1;
        }
        counts
    }

    /// Structural validity: one king per side, pawns off the back ranks,
    /// castle rights backed by king and rook on their home squares, a
    /// plausible en-passant target, and per-side piece counts within bounds.
    pub fn is_valid(&self) -> bool {
        let counts = self.piece_counts();

        for p in self.pieces() {
            if p.piece.is_pawn() && (row(p.square) == 0 || row(p.square) == 7) {
                return false;
            }
        }

        for side in Side::iter() {
            let rights = self.castle_rights[side as usize];
            if rights == CastlingRights::NONE {
                continue;
            }
            let (king_home, rook_long, rook_short) = match side {
                Side::White => (
                    Squares::WHITE_KING,
                    Squares::WHITE_ROOK_LONG,
                    Squares::WHITE_ROOK_SHORT,
                ),
                Side::Black => (
                    Squares::BLACK_KING,
                    Squares::BLACK_ROOK_LONG,
                    Squares::BLACK_ROOK_SHORT,
                ),
            };
            if !self.is_piece(king_home, Piece::King, side) {
                return false;
            }
            if rights & CastlingRights::LONG != 0 && !self.is_piece(rook_long, Piece::Rook, side) {
                return false;
            }
            if rights & CastlingRights::SHORT != 0 && !self.is_piece(rook_short, Piece::Rook, side)
            {
                return false;
            }
        }

        if let Some(ep) = self.en_passant {
            let r = row(ep);
            if r != 2 && r != 5 {
                return false;
            }
            let (pawn_square, pusher) = if r == 2 {
                (ep + 8, Side::Black)
            } else {
                (ep - 8, Side::White)
            };
            if !self.is_piece(pawn_square, Piece::Pawn, pusher) {
                return false;
            }
        }

        for side in [Side::White as usize, Side::Black as usize] {
            let c = &counts[side];
            let others: u32 = c[1..].iter().map(|&n| n as u32).sum();
            if c[Piece::King as usize] != 1
                || c[Piece::Queen as usize] > 9
                || c[Piece::Rook as usize] > 10
                || c[Piece::Bishop as usize] > 10
                || c[Piece::Knight as usize] > 10
                || c[Piece::Pawn as usize] > 8
                || others > 15
            {
                return false;
            }
        }
        true
    }

    // ---- en passant and castling consistency ------------------------------

    /// Drop the en-passant target unless an enemy pawn stands ready to
    /// capture it. Keeping only capturable targets makes positions reached
    /// by FEN, `setup` and `make` index identically.
    pub fn check_en_passant(&mut self) {
        if let Some(ep) = self.en_passant {
            let (behind, capturer, capture_row) = if (16..24).contains(&ep) {
                (8i16, Side::White, 3)
            } else if (40..48).contains(&ep) {
                (-8i16, Side::Black, 4)
            } else {
                self.en_passant = None;
                return;
            };
            let beside = ep as i16 + behind;
            for slot in self.piece_list[capturer as usize][1..].iter().flatten() {
                if slot.piece.is_pawn()
                    && row(slot.square) == capture_row
                    && (slot.square as i16 == beside - 1 || slot.square as i16 == beside + 1)
                {
                    return;
                }
            }
            self.en_passant = None;
        }
    }

    /// Validate an en-passant candidate and the castle rights against the
    /// piece placement. Both board-construction paths (`setup` and FEN
    /// parsing) run through here. An implausible en-passant target is
    /// *downgraded* to none rather than rejected, so the board stays usable
    /// either way; the return value only reports whether everything checked
    /// out.
    pub fn legalize_ep_castle(&mut self, en_passant: Option<u8>, _side_to_move: Side) -> bool {
        let mut ok = true;
        self.en_passant = en_passant;

        // only rows 2 and 5 can ever host a target
        if let Some(ep) =
            en_passant.filter(|&ep| (16..24).contains(&ep) || (40..48).contains(&ep))
        {
            let (behind, pusher) = if ep < 24 {
                (8i16, Side::Black)
            } else {
                (-8i16, Side::White)
            };
            let pusher_square = ep as i16 + behind;
            let front_square = ep as i16 - behind;

            let mut pusher_ok = true;
            let mut attackers = 0;
            for p in self.pieces() {
                let sq = p.square as i16;
                // target and the square the pawn came from must be clear
                if sq == ep as i16 || sq == front_square {
                    pusher_ok = false;
                    break;
                }
                if sq == pusher_square {
                    if !p.piece.is_pawn() || p.side != pusher {
                        pusher_ok = false;
                        break;
                    }
                    continue;
                }
                if p.piece.is_pawn()
                    && p.side != pusher
                    && row(p.square) == row(pusher_square as u8)
                    && (sq == pusher_square - 1 || sq == pusher_square + 1)
                {
                    attackers += 1;
                }
            }

            if !pusher_ok || attackers < 1 {
                self.en_passant = None;
                ok = false;
            }
        } else if en_passant.is_some() {
            self.en_passant = None;
            ok = false;
        }

        for side in Side::iter() {
            let rights = self.castle_rights[side as usize];
            if rights == CastlingRights::NONE {
                continue;
            }
            let wanted = (rights & CastlingRights::SHORT != 0) as u32
                + (rights & CastlingRights::LONG != 0) as u32;
            let mut found = 0;
            let king_home = match side {
                Side::White => Squares::WHITE_KING,
                Side::Black => Squares::BLACK_KING,
            };
            if self.king_square(side) == Some(king_home) {
                for p in self.piece_list[side as usize][1..].iter().flatten() {
                    if p.piece != Piece::Rook {
                        continue;
                    }
                    if p.square == king_home + 3 && rights & CastlingRights::SHORT != 0 {
                        found += 1;
                    }
                    if p.square == king_home - 4 && rights & CastlingRights::LONG != 0 {
                        found += 1;
                    }
                }
            }
            if wanted != found {
                ok = false;
            }
        }

        ok
    }

    // ---- symmetry ----------------------------------------------------------

    /// Transform the whole position by a symmetry of the board. Castle
    /// rights do not survive a transform and are cleared; the en-passant
    /// target moves with the pawns.
    pub fn flip(&mut self, mode: FlipMode) {
        if mode == FlipMode::None {
            return;
        }
        let old_list = self.piece_list;
        let en_passant = self.en_passant.map(|ep| mode.apply(ep));

        self.squares = [None; NumberOf::SQUARES];
        self.piece_list = [[None; NumberOf::PIECE_LIST_SLOTS]; NumberOf::SIDES];
        for p in old_list.iter().flatten().filter_map(|p| *p) {
            let square = mode.apply(p.square);
            self.squares[square as usize] = Some((p.piece, p.side));
            self.list_put(p.piece, p.side, square);
        }
        self.en_passant = en_passant;
        self.castle_rights = [CastlingRights::NONE; NumberOf::SIDES];
    }

    /// `true` when the two representations describe the same position.
    /// Only used by tests and debug assertions.
    pub fn representations_in_sync(&self) -> bool {
        let mut from_list = [None; NumberOf::SQUARES];
        for p in self.pieces() {
            if from_list[p.square as usize].is_some() {
                return false;
            }
            from_list[p.square as usize] = Some((p.piece, p.side));
        }
        from_list == self.squares
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.to_fen())?;
        for sq in 0..NumberOf::SQUARES as u8 {
            match self.squares[sq as usize] {
                Some((piece, side)) => {
                    write!(f, "{} ", PlacedPiece::new(piece, side, sq).fen_char())?
                }
                None => write!(f, ". ")?,
            }
            if col(sq) == 7 {
                writeln!(f, " {}", 8 - row(sq))?;
            }
        }
        writeln!(f, "a b c d e f g h")?;
        if let Some(ep) = self.en_passant {
            writeln!(f, "ep: {}", square_name(ep))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::square_from_name;

    fn place(board: &mut Board, spec: &[(Piece, Side, &str)]) {
        for (piece, side, name) in spec {
            board
                .put_piece(*piece, *side, square_from_name(name).unwrap())
                .unwrap();
        }
    }

    #[test]
    fn put_and_remove_keeps_sync() {
        let mut board = Board::new();
        place(
            &mut board,
            &[
                (Piece::King, Side::White, "e1"),
                (Piece::King, Side::Black, "e8"),
                (Piece::Rook, Side::White, "a1"),
            ],
        );
        assert!(board.representations_in_sync());
        assert_eq!(board.king_square(Side::White), Some(60));

        board.remove_piece(square_from_name("a1").unwrap());
        assert!(board.representations_in_sync());
        assert!(board.is_material_draw());
    }

    #[test]
    fn put_rejects_occupied() {
        let mut board = Board::new();
        board.put_piece(Piece::King, Side::White, 60).unwrap();
        assert_eq!(
            board.put_piece(Piece::Queen, Side::White, 60),
            Err(BoardError::SquareOccupied(60))
        );
    }

    #[test]
    fn strong_side_prefers_count_then_material() {
        let mut board = Board::new();
        place(
            &mut board,
            &[
                (Piece::King, Side::White, "e1"),
                (Piece::King, Side::Black, "e8"),
                (Piece::Queen, Side::White, "d1"),
                (Piece::Knight, Side::Black, "b8"),
                (Piece::Knight, Side::Black, "g8"),
            ],
        );
        // two knights outnumber one queen
        assert_eq!(board.strong_side(), Side::Black);

        board.remove_piece(square_from_name("g8").unwrap());
        assert_eq!(board.strong_side(), Side::White);
    }

    #[test]
    fn check_en_passant_drops_uncapturable_target() {
        let mut board = Board::from_fen("4k3/8/8/8/2p5/8/8/4K3 b - c3 0 1").unwrap();
        // no white pawn beside c4, so the target must be gone
        assert_eq!(board.en_passant, None);

        board = Board::from_fen("4k3/8/8/8/1Pp5/8/8/4K3 b - b3 0 1").unwrap();
        assert_eq!(board.en_passant, Some(square_from_name("b3").unwrap()));
    }

    #[test]
    fn legalize_ep_downgrades_but_keeps_board() {
        let mut board = Board::new();
        place(
            &mut board,
            &[
                (Piece::King, Side::White, "e1"),
                (Piece::King, Side::Black, "e8"),
                (Piece::Pawn, Side::White, "a2"),
            ],
        );
        let ep = square_from_name("c6").unwrap();
        assert!(!board.legalize_ep_castle(Some(ep), Side::White));
        assert_eq!(board.en_passant, None);
        assert!(board.is_valid());

        // targets outside rows 2 and 5 are never plausible
        let mid = square_from_name("c4").unwrap();
        assert!(!board.legalize_ep_castle(Some(mid), Side::White));
        assert_eq!(board.en_passant, None);

        // setup routes through the same validation
        let pieces = [
            PlacedPiece::new(Piece::King, Side::White, 60),
            PlacedPiece::new(Piece::King, Side::Black, 4),
            PlacedPiece::new(Piece::Pawn, Side::White, 48),
        ];
        board.setup(&pieces, Side::Black, Some(ep)).unwrap();
        assert_eq!(board.en_passant, None);
        assert!(board.is_valid());
    }

    #[test]
    fn validity_checks_counts_and_pawn_ranks() {
        let mut board = Board::new();
        place(
            &mut board,
            &[
                (Piece::King, Side::White, "e1"),
                (Piece::King, Side::Black, "e8"),
            ],
        );
        assert!(board.is_valid());

        board.put_piece(Piece::Pawn, Side::White, 0).unwrap(); // a8
        assert!(!board.is_valid());
    }

    #[test]
    fn two_kings_of_one_side_is_invalid() {
        let mut board = Board::new();
        board.put_piece(Piece::King, Side::White, 60).unwrap();
        board.put_piece(Piece::King, Side::Black, 4).unwrap();
        // the list keeps one king per side, the dense array shows both
        board.squares[59] = Some((Piece::King, Side::White));
        assert!(!board.representations_in_sync());
    }

    #[test]
    fn flip_moves_every_piece() {
        let mut board = Board::new();
        place(
            &mut board,
            &[
                (Piece::King, Side::White, "e1"),
                (Piece::King, Side::Black, "e8"),
                (Piece::Rook, Side::White, "a1"),
            ],
        );
        let mut flipped = board.clone();
        flipped.flip(FlipMode::Horizontal);
        assert!(flipped.representations_in_sync());
        assert!(flipped.is_piece(square_from_name("h1").unwrap(), Piece::Rook, Side::White));
        assert_eq!(
            flipped.king_square(Side::White),
            Some(square_from_name("d1").unwrap())
        );

        flipped.flip(FlipMode::Horizontal);
        assert_eq!(flipped.squares, board.squares);
    }
}
