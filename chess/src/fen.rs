/*
 * fen.rs
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

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::{
    board::Board,
    definitions::{CastlingRights, DASH},
    pieces::{Piece, PlacedPiece},
    side::Side,
    square::{SQUARE_NAME, square_from_name, square_name, to_square},
};

/// Represents the 6 parts of a FEN string.
#[derive(Debug, Clone, Copy)]
pub enum FenPart {
    PiecePlacement = 1,
    ActiveColor = 2,
    CastlingAvailability = 3,
    EnPassantTargetSquare = 4,
    HalfmoveClock = 5,
    FullmoveNumber = 6,
}

impl Display for FenPart {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FenPart::PiecePlacement => write!(f, "Piece Placement"),
            FenPart::ActiveColor => write!(f, "Active Color"),
            FenPart::CastlingAvailability => write!(f, "Castling Availability"),
            FenPart::EnPassantTargetSquare => write!(f, "En Passant Target Square"),
            FenPart::HalfmoveClock => write!(f, "Halfmove Clock"),
            FenPart::FullmoveNumber => write!(f, "Fullmove Number"),
        }
    }
}

/// Represents an error that occurred while parsing a FEN string.
#[derive(Error, Debug)]
pub struct FenError {
    message: String,
}

impl FenError {
    pub fn new(message: impl Into<String>) -> FenError {
        FenError {
            message: message.into(),
        }
    }
}

impl Display for FenError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

type FenResult = Result<(), FenError>;
type FenPartParser = fn(board: &mut Board, part: &str) -> FenResult;

const FEN_PART_PARSERS: [FenPartParser; 6] = [
    parse_piece_placement,
    parse_active_color,
    parse_castling_availability,
    parse_en_passant_target_square,
    parse_halfmove_clock,
    parse_fullmove_number,
];

/// Splits a FEN string into its 6 parts or returns an error.
///
/// Some deviations from strict FEN are tolerated because tablebase tooling
/// emits them: a `--` castling field instead of `-`, a missing en-passant
/// field when a clock number follows the castling field, and missing
/// halfmove/fullmove fields (defaulted to `0 1`).
pub fn split_fen_string(fen: &str) -> Result<Vec<String>, FenError> {
    if fen.trim().is_empty() {
        return Err(FenError::new("FEN string is empty"));
    }

    let mut parts = fen
        .split_whitespace()
        .map(|part| if part == "--" { "-" } else { part })
        .map(String::from)
        .collect::<Vec<String>>();

    if parts.len() == 3 {
        parts.push(String::from(DASH));
    }
    // "<placement> w -- 0 1" style strings carry no en-passant field
    if parts.len() >= 4 && parts[3].chars().all(|c| c.is_ascii_digit()) {
        parts.insert(3, String::from(DASH));
    }
    if parts.len() == 4 {
        parts.push(String::from("0"));
    }
    if parts.len() == 5 {
        parts.push(String::from("1"));
    }

    if parts.len() != 6 {
        return Err(FenError::new("FEN string does not have 6 parts"));
    }

    Ok(parts)
}

pub(crate) fn board_from_fen(fen: &str) -> Result<Board, FenError> {
    let parts = split_fen_string(fen)?;
    let mut board = Board::new();
    for (parser, part) in FEN_PART_PARSERS.iter().zip(parts.iter()) {
        parser(&mut board, part)?;
    }
    // an implausible en-passant field downgrades instead of failing the
    // parse; inconsistent castle rights are kept for is_valid to flag
    let en_passant = board.en_passant;
    board.legalize_ep_castle(en_passant, board.side_to_move);
    Ok(board)
}

pub(crate) fn board_to_fen(board: &Board) -> String {
    format!(
        "{} {} {} {} {} {}",
        piece_placement_to_fen(board),
        board.side_to_move,
        castling_availability_to_fen(board),
        en_passant_target_square_to_fen(board),
        board.half_move_clock(),
        board.full_move_number()
    )
}

/// Parses the piece placement part of a FEN string and updates the board.
/// Ranks arrive top down, which is exactly the square order of the board.
fn parse_piece_placement(board: &mut Board, part: &str) -> FenResult {
    let mut pos: u32 = 0;

    for c in part.chars() {
        match c {
            '/' => {
                if pos == 0 || pos % 8 != 0 {
                    return Err(FenError::new(format!(
                        "Misplaced / in FEN part {}",
                        FenPart::PiecePlacement,
                    )));
                }
            }
            '1'..='8' => {
                pos += c as u32 - '0' as u32;
            }
            _ => {
                let piece = Piece::try_from(c).map_err(|_| {
                    FenError::new(format!(
                        "Invalid character {} in FEN part {}",
                        c,
                        FenPart::PiecePlacement,
                    ))
                })?;
                let side = if c.is_ascii_uppercase() {
                    Side::White
                } else {
                    Side::Black
                };
                if pos >= 64 {
                    return Err(FenError::new(format!(
                        "Too many squares in FEN part {}",
                        FenPart::PiecePlacement,
                    )));
                }
                board
                    .put_piece(piece, side, pos as u8)
                    .map_err(|e| FenError::new(e.to_string()))?;
                pos += 1;
            }
        }
    }

    if pos != 64 {
        return Err(FenError::new(format!(
            "FEN part {} does not cover the board",
            FenPart::PiecePlacement,
        )));
    }
    Ok(())
}

fn piece_placement_to_fen(board: &Board) -> String {
    let mut fen = String::new();
    for r in 0..8u8 {
        let mut empty = 0;
        for c in 0..8u8 {
            let square = to_square(c, r);
            match board.piece_on(square) {
                Some((piece, side)) => {
                    if empty > 0 {
                        fen.push_str(&empty.to_string());
                        empty = 0;
                    }
                    fen.push(PlacedPiece::new(piece, side, square).fen_char());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            fen.push_str(&empty.to_string());
        }
        if r < 7 {
            fen.push('/');
        }
    }
    fen
}

/// Parses the active color part of a FEN string and updates the board.
fn parse_active_color(board: &mut Board, part: &str) -> FenResult {
    match part.trim() {
        "w" | "W" => board.side_to_move = Side::White,
        "b" | "B" => board.side_to_move = Side::Black,
        _ => {
            return Err(FenError::new(format!(
                "Invalid active color found in FEN part {}",
                FenPart::ActiveColor,
            )));
        }
    }
    Ok(())
}

/// Parses the castling availability part of a FEN string and updates the board.
fn parse_castling_availability(board: &mut Board, part: &str) -> FenResult {
    if part.is_empty() {
        return Err(FenError::new(format!(
            "Empty castling availability found in FEN part {}",
            FenPart::CastlingAvailability,
        )));
    }

    if part.len() == 1 && part.starts_with(DASH) {
        return Ok(());
    }

    for c in part.chars() {
        match c {
            'K' => board.castle_rights[Side::White as usize] |= CastlingRights::SHORT,
            'Q' => board.castle_rights[Side::White as usize] |= CastlingRights::LONG,
            'k' => board.castle_rights[Side::Black as usize] |= CastlingRights::SHORT,
            'q' => board.castle_rights[Side::Black as usize] |= CastlingRights::LONG,
            _ => {
                return Err(FenError::new(format!(
                    "Invalid castling availability found in FEN part {}",
                    FenPart::CastlingAvailability,
                )));
            }
        }
    }
    Ok(())
}

fn castling_availability_to_fen(board: &Board) -> String {
    let mut fen = String::new();
    if board.castle_rights(Side::White) & CastlingRights::SHORT != 0 {
        fen.push('K');
    }
    if board.castle_rights(Side::White) & CastlingRights::LONG != 0 {
        fen.push('Q');
    }
    if board.castle_rights(Side::Black) & CastlingRights::SHORT != 0 {
        fen.push('k');
    }
    if board.castle_rights(Side::Black) & CastlingRights::LONG != 0 {
        fen.push('q');
    }
    if fen.is_empty() {
        fen.push(DASH);
    }
    fen
}

/// Parses the en passant target square (if any) and updates the board.
fn parse_en_passant_target_square(board: &mut Board, part: &str) -> FenResult {
    let part = part.trim();
    if part.len() == 1 && part.starts_with(DASH) {
        board.en_passant = None;
        return Ok(());
    }

    let lower = part.to_lowercase();
    if SQUARE_NAME.contains(&lower.as_str()) {
        board.en_passant = Some(square_from_name(&lower).unwrap_or_default());
        return Ok(());
    }

    Err(FenError::new(format!(
        "Invalid en passant target square found in FEN part {}",
        FenPart::EnPassantTargetSquare,
    )))
}

fn en_passant_target_square_to_fen(board: &Board) -> String {
    match board.en_passant {
        Some(square) => square_name(square).to_string(),
        None => DASH.to_string(),
    }
}

/// Parses the halfmove clock part of a FEN string and updates the board.
fn parse_halfmove_clock(board: &mut Board, part: &str) -> FenResult {
    board.half_move_clock = part.trim().parse::<u32>().map_err(|_| {
        FenError::new(format!(
            "Invalid number in FEN part {}",
            FenPart::HalfmoveClock,
        ))
    })?;
    Ok(())
}

/// Parses the fullmove number part of a FEN string and updates the board.
fn parse_fullmove_number(board: &mut Board, part: &str) -> FenResult {
    board.full_move_number = part.trim().parse::<u32>().map_err(|_| {
        FenError::new(format!(
            "Invalid number in FEN part {}",
            FenPart::FullmoveNumber,
        ))
    })?;
    Ok(())
}
