/*
 * keys.rs
 * Part of the egtb-probe project
 * Created Date: Wednesday, January 22nd 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Position key encoding and decoding.
//!
//! `encode` maps a board to its flat index within the signature's stream,
//! reducing it under the symmetry group the layout admits. `setup_board`
//! reverses the mapping. Both share one set of combination tables, built
//! once per process.

use std::sync::LazyLock;

use arrayvec::ArrayVec;
use chess::{
    board::Board,
    flip::{ALL_FLIPS, FlipMode},
    pieces::Piece,
    side::Side,
    square::{col, row},
};

use crate::{
    defs::{
        EGTB_SIZE_KK2, EGTB_SIZE_KK8, EGTB_SIZE_PP, EGTB_SIZE_PPP, EGTB_SIZE_PPPP, EGTB_SIZE_XX,
        EGTB_SIZE_XXX, EGTB_SIZE_XXXX,
    },
    layout::{AttrKind, Layout},
};

/// Flip that moves each square into the canonical 10-square triangle,
/// as an index into [`ALL_FLIPS`].
#[rustfmt::skip]
const TB_FLIP_MODE: [u8; 64] = [
    0, 0, 0, 0, 1, 1, 1, 1,
    3, 0, 0, 0, 1, 1, 1, 7,
    3, 3, 0, 0, 1, 1, 7, 7,
    3, 3, 3, 0, 1, 7, 7, 7,
    5, 5, 5, 2, 6, 4, 4, 4,
    5, 5, 2, 2, 6, 6, 4, 4,
    5, 2, 2, 2, 6, 6, 6, 4,
    2, 2, 2, 2, 6, 6, 6, 6,
];

/// Dense index of each triangle square, -1 elsewhere.
#[rustfmt::skip]
const TB_KIDX: [i8; 64] = [
     0,  1,  2,  3, -1, -1, -1, -1,
    -1,  4,  5,  6, -1, -1, -1, -1,
    -1, -1,  7,  8, -1, -1, -1, -1,
    -1, -1, -1,  9, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1,
];

/// The triangle squares in index order.
const TB_KIDX_TO_POS: [u8; 10] = [0, 1, 2, 3, 9, 10, 11, 18, 19, 27];

/// The precomputed enumeration tables shared by every file.
struct KeyTables {
    kk8: Vec<u32>,
    kk2: Vec<u32>,
    xx: Vec<u32>,
    xxx: Vec<u32>,
    xxxx: Vec<u32>,
    pp: Vec<u32>,
    ppp: Vec<u32>,
    pppp: Vec<u32>,
}

static TABLES: LazyLock<KeyTables> = LazyLock::new(KeyTables::new);

fn kings_clash(k0: u8, k1: u8) -> bool {
    k0 == k1
        || ((row(k0) as i32 - row(k1) as i32).abs() <= 1
            && (col(k0) as i32 - col(k1) as i32).abs() <= 1)
}

impl KeyTables {
    fn new() -> KeyTables {
        let mut kk8 = Vec::with_capacity(EGTB_SIZE_KK8);
        for &k0 in TB_KIDX_TO_POS.iter() {
            for k1 in 0..64u8 {
                if !kings_clash(k0, k1) {
                    kk8.push((k0 as u32) << 8 | k1 as u32);
                }
            }
        }

        let mut kk2 = Vec::with_capacity(EGTB_SIZE_KK2);
        for k0 in (0..64u8).filter(|&k| col(k) <= 3) {
            for k1 in 0..64u8 {
                if !kings_clash(k0, k1) {
                    kk2.push((k0 as u32) << 8 | k1 as u32);
                }
            }
        }

        let (mut xx, mut xxx, mut xxxx) = (
            Vec::with_capacity(EGTB_SIZE_XX),
            Vec::with_capacity(EGTB_SIZE_XXX),
            Vec::with_capacity(EGTB_SIZE_XXXX),
        );
        Self::fill_tuples(0, 64, &mut xx, &mut xxx, &mut xxxx);

        let (mut pp, mut ppp, mut pppp) = (
            Vec::with_capacity(EGTB_SIZE_PP),
            Vec::with_capacity(EGTB_SIZE_PPP),
            Vec::with_capacity(EGTB_SIZE_PPPP),
        );
        Self::fill_tuples(8, 56, &mut pp, &mut ppp, &mut pppp);

        debug_assert_eq!(kk8.len(), EGTB_SIZE_KK8);
        debug_assert_eq!(kk2.len(), EGTB_SIZE_KK2);
        debug_assert_eq!(xxxx.len(), EGTB_SIZE_XXXX);
        debug_assert_eq!(pppp.len(), EGTB_SIZE_PPPP);

        KeyTables {
            kk8,
            kk2,
            xx,
            xxx,
            xxxx,
            pp,
            ppp,
            pppp,
        }
    }

    /// Enumerate the sorted 2-, 3- and 4-tuples over `[from, to)`.
    fn fill_tuples(from: u32, to: u32, two: &mut Vec<u32>, three: &mut Vec<u32>, four: &mut Vec<u32>) {
        for i0 in from..to {
            for i1 in i0 + 1..to {
                two.push(i0 << 8 | i1);
                for i2 in i1 + 1..to {
                    three.push(i0 << 16 | i1 << 8 | i2);
                    for i3 in i2 + 1..to {
                        four.push(i0 << 24 | i1 << 16 | i2 << 8 | i3);
                    }
                }
            }
        }
    }

    fn tuple_table(&self, piece: Piece, count: u8) -> &[u32] {
        match (piece.is_pawn(), count) {
            (false, 2) => &self.xx,
            (false, 3) => &self.xxx,
            (false, 4) => &self.xxxx,
            (true, 2) => &self.pp,
            (true, 3) => &self.ppp,
            (true, 4) => &self.pppp,
            _ => &[],
        }
    }
}

/// The result of encoding a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRec {
    /// Flat index into the signature's stream.
    pub key: u64,
    /// The stronger side is actually black; the caller must look the
    /// position up from the other side's stream.
    pub flip_side: bool,
}

/// Sub-key of a tuple of identical pieces: sorted squares looked up in the
/// enumeration table.
fn tuple_key(piece: Piece, count: u8, squares: &mut ArrayVec<u8, 4>) -> Option<u64> {
    debug_assert_eq!(squares.len(), count as usize);
    if count == 1 {
        let sq = squares[0] as u64;
        return Some(if piece.is_pawn() { sq - 8 } else { sq });
    }
    squares.sort_unstable();
    let mut packed = 0u32;
    for &sq in squares.iter() {
        packed = packed << 8 | sq as u32;
    }
    let table = TABLES.tuple_table(piece, count);
    table.binary_search(&packed).ok().map(|i| i as u64)
}

/// Squares of one side's pieces of one type, transformed by `flip` and
/// sorted. The king is excluded.
fn group_squares(board: &Board, side: Side, piece: Piece, flip: FlipMode) -> ArrayVec<u8, 15> {
    let mut squares: ArrayVec<u8, 15> = board.piece_list()[side as usize][1..]
        .iter()
        .filter_map(|p| *p)
        .filter(|p| p.piece == piece)
        .map(|p| flip.apply(p.square))
        .collect();
    squares.sort_unstable();
    squares
}

/// Decide the a8-h1 reflection when the leading king sits on that diagonal:
/// the opposite king breaks the tie, then each piece group in declaration
/// order. Returns `true` when the reflected rendering is canonical.
fn diagonal_tie_break(board: &Board, flip: FlipMode, opposite_king: u8, strong: Side) -> bool {
    let mirrored = FlipMode::FlipVH.apply(opposite_king);
    if mirrored != opposite_king {
        return mirrored < opposite_king;
    }
    for side in [strong, strong.opposite()] {
        for piece in [
            Piece::Queen,
            Piece::Rook,
            Piece::Bishop,
            Piece::Knight,
            Piece::Pawn,
        ] {
            let plain = group_squares(board, side, piece, flip);
            let reflected = group_squares(board, side, piece, flip.compose(FlipMode::FlipVH));
            if plain != reflected {
                return reflected < plain;
            }
        }
    }
    false
}

/// Encode a board into its key. Returns `None` for positions the layout
/// cannot index (touching kings, piece multiplicity not matching the
/// signature).
pub fn encode(board: &Board, layout: &Layout) -> Option<KeyRec> {
    let tables = &*TABLES;
    let strong = board.strong_side();
    let flip_side = strong == Side::Black;
    let mut flip = if flip_side {
        FlipMode::Vertical
    } else {
        FlipMode::None
    };

    let mut key = 0u64;
    for i in layout.seq() {
        let attr = layout.attrs()[i];
        let sd = if attr.side == Side::White {
            strong
        } else {
            strong.opposite()
        };

        match attr.kind {
            AttrKind::Kk8 | AttrKind::K8 => {
                let mut k0 = flip.apply(board.king_square(sd)?);
                let mut k1 = flip.apply(board.king_square(sd.opposite())?);
                let region = TB_FLIP_MODE[k0 as usize];
                if region != 0 {
                    let mode = ALL_FLIPS[region as usize];
                    flip = flip.compose(mode);
                    k0 = mode.apply(k0);
                    k1 = mode.apply(k1);
                }
                if FlipMode::FlipVH.apply(k0) == k0 && diagonal_tie_break(board, flip, k1, strong)
                {
                    flip = flip.compose(FlipMode::FlipVH);
                    k1 = FlipMode::FlipVH.apply(k1);
                }
                let idx = if attr.kind == AttrKind::Kk8 {
                    let pair = (k0 as u32) << 8 | k1 as u32;
                    tables.kk8.binary_search(&pair).ok()? as u64
                } else {
                    TB_KIDX[k0 as usize] as u64
                };
                key += idx * attr.mult;
            }
            AttrKind::Kk2 | AttrKind::K2 => {
                let mut k0 = flip.apply(board.king_square(sd)?);
                let mut k1 = flip.apply(board.king_square(sd.opposite())?);
                if col(k0) > 3 {
                    flip = flip.compose(FlipMode::Horizontal);
                    k0 = FlipMode::Horizontal.apply(k0);
                    k1 = FlipMode::Horizontal.apply(k1);
                }
                let idx = if attr.kind == AttrKind::Kk2 {
                    let pair = (k0 as u32) << 8 | k1 as u32;
                    tables.kk2.binary_search(&pair).ok()? as u64
                } else {
                    ((row(k0) as u64) << 2) + col(k0) as u64
                };
                key += idx * attr.mult;
            }
            AttrKind::K => {
                key += flip.apply(board.king_square(sd)?) as u64 * attr.mult;
            }
            AttrKind::Tuple { piece, count } => {
                let mut squares: ArrayVec<u8, 4> = ArrayVec::new();
                for p in board.piece_list()[sd as usize][1..]
                    .iter()
                    .filter_map(|p| *p)
                    .filter(|p| p.piece == piece)
                {
                    squares.try_push(flip.apply(p.square)).ok()?;
                }
                if squares.len() != count as usize {
                    return None;
                }
                key += tuple_key(piece, count, &mut squares)? * attr.mult;
            }
        }
    }

    if layout.is_enpassantable() {
        let slot = match board.en_passant {
            Some(ep) => col(flip.apply(ep)) as u64 + 1,
            None => 0,
        };
        key += slot * layout.base_size();
    }

    Some(KeyRec { key, flip_side })
}

/// Rebuild the representative board of a key.
///
/// Pieces of the side written first in the signature become `strong`; the
/// finished board is then transformed by `flip`. Returns `false` when the
/// key does not decode to a placeable position (square collisions).
pub fn setup_board(
    board: &mut Board,
    layout: &Layout,
    idx: u64,
    flip: FlipMode,
    strong: Side,
) -> bool {
    if idx >= layout.size() {
        return false;
    }
    let tables = &*TABLES;
    board.clear();

    let mut idx = idx;
    let mut ep_slot = 0u64;
    if layout.is_enpassantable() {
        ep_slot = idx / layout.base_size();
        idx %= layout.base_size();
    }

    for i in layout.seq() {
        let attr = layout.attrs()[i];
        let sd = if attr.side == Side::White {
            strong
        } else {
            strong.opposite()
        };
        let d = (idx / attr.mult) as usize;
        idx %= attr.mult;

        let ok = match attr.kind {
            AttrKind::Kk8 | AttrKind::Kk2 => {
                let table = if attr.kind == AttrKind::Kk8 {
                    &tables.kk8
                } else {
                    &tables.kk2
                };
                match table.get(d) {
                    Some(&pair) => {
                        board
                            .put_piece(Piece::King, sd, (pair >> 8) as u8)
                            .and_then(|_| {
                                board.put_piece(Piece::King, sd.opposite(), (pair & 0xff) as u8)
                            })
                            .is_ok()
                    }
                    None => false,
                }
            }
            AttrKind::K8 => match TB_KIDX_TO_POS.get(d) {
                Some(&sq) => board.put_piece(Piece::King, sd, sq).is_ok(),
                None => false,
            },
            AttrKind::K2 => {
                let sq = ((d as u8 >> 2) << 3) | (d as u8 & 3);
                d < 32 && board.put_piece(Piece::King, sd, sq).is_ok()
            }
            AttrKind::K => d < 64 && board.put_piece(Piece::King, sd, d as u8).is_ok(),
            AttrKind::Tuple { piece, count } => {
                if count == 1 {
                    let sq = if piece.is_pawn() { d as u8 + 8 } else { d as u8 };
                    board.put_piece(piece, sd, sq).is_ok()
                } else {
                    match tables.tuple_table(piece, count).get(d) {
                        Some(&packed) => (0..count).rev().all(|i| {
                            let sq = (packed >> (8 * i as u32)) as u8;
                            board.put_piece(piece, sd, sq).is_ok()
                        }),
                        None => false,
                    }
                }
            }
        };
        if !ok {
            return false;
        }
    }

    if ep_slot > 0 {
        board.en_passant = infer_en_passant(board, ep_slot as u8 - 1);
    }

    if flip != FlipMode::None {
        board.flip(flip);
    }
    board.check_en_passant();
    true
}

/// Find the en-passant target on file `c`: a pawn that could just have
/// double-pushed with the two squares behind it empty, preferring the
/// configuration an enemy pawn can actually capture. Implausible slots
/// decode to no target.
fn infer_en_passant(board: &Board, c: u8) -> Option<u8> {
    // black pushed to row 3, target row 2
    let black_push = board.is_piece(24 + c, Piece::Pawn, Side::Black)
        && board.is_empty_square(16 + c)
        && board.is_empty_square(8 + c);
    // white pushed to row 4, target row 5
    let white_push = board.is_piece(32 + c, Piece::Pawn, Side::White)
        && board.is_empty_square(40 + c)
        && board.is_empty_square(48 + c);

    let capturable = |target: u8| {
        let mut probe = board.clone();
        probe.en_passant = Some(target);
        probe.check_en_passant();
        probe.en_passant.is_some()
    };

    if black_push && capturable(16 + c) {
        Some(16 + c)
    } else if white_push && capturable(40 + c) {
        Some(40 + c)
    } else {
        None
    }
}
