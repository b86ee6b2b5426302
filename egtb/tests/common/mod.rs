/*
 * Part of the egtb-probe project
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 */

//! Test support: a small retrograde generator producing real version-0
//! table files for a handful of 3-man endgames.
//!
//! The generator value-iterates distance to mate level by level, probing
//! already-registered tables for captures and promotions that leave the
//! signature, and then writes the streams through the same header and
//! block codecs the library reads with. Positions whose best winning move
//! converts into another table are stored as coarse win cells, which is
//! exactly the shape the one-ply resolver exists for.

use std::{fs::File, io::Write, path::Path};

use chess::{
    board::Board,
    flip::FlipMode,
    move_list::MoveList,
    side::Side,
    square::row,
};
use egtb::{
    EgtbDb, Material, Score,
    defs::{
        EGTB_SIZE_COMPRESS_BLOCK, TB_DRAW, TB_DTM_BASE, TB_ILLEGAL, TB_UNSET, TB_WINNING,
    },
    file::cell_table,
    header::{FileHeader, write_block_table},
    keys,
    layout::Layout,
};

/// Inverse of the version-0 cell translation, for writing streams.
pub fn score_to_cell(score: Score) -> u8 {
    match score {
        Score::DRAW => TB_DRAW,
        Score::ILLEGAL => TB_ILLEGAL,
        Score::UNKNOWN => TB_UNSET,
        s if s.is_mate_score() => {
            let plies = Score::MATE.0 - s.0.abs();
            debug_assert_eq!(s.0 > 0, plies % 2 == 1);
            TB_DTM_BASE + plies as u8
        }
        _ => TB_UNSET,
    }
}

/// Where a move leads, seen from the generated table.
enum ChildRef {
    /// Same signature: a cell of this table.
    InTable { side: usize, key: u32 },
    /// Conversion into another table (or a bare-kings draw), already final.
    Fixed(Score),
}

/// A fully generated table: one stream per side to move.
pub struct GeneratedTable {
    pub name: String,
    pub cells: [Vec<u8>; 2],
    pub dtm_max: u8,
}

fn decode(layout: &Layout, key: u64) -> Option<Board> {
    let mut board = Board::new();
    keys::setup_board(&mut board, layout, key, FlipMode::None, Side::White).then_some(board)
}

/// Children of `board` with `side` to move, as table references.
fn children(
    db: &EgtbDb,
    layout: &Layout,
    name: &str,
    board: &mut Board,
    side: Side,
) -> Vec<ChildRef> {
    let mut legal = MoveList::new();
    board.gen_legal(side, false, &mut legal);

    let mut refs = Vec::with_capacity(legal.len());
    for mv in legal.as_slice() {
        let hist = board.make(mv);
        let child_side = side.opposite();
        if board.is_material_draw() {
            refs.push(ChildRef::Fixed(Score::DRAW));
        } else if Material::from_board(board).name() == name {
            let rec = keys::encode(board, layout).unwrap();
            let stream = if rec.flip_side {
                child_side.opposite()
            } else {
                child_side
            };
            refs.push(ChildRef::InTable {
                side: stream as usize,
                key: rec.key as u32,
            });
        } else {
            let score = db.get_score_side(board, child_side);
            assert!(
                score.is_definite(),
                "conversion out of {name} hit an unfinished table ({score})"
            );
            refs.push(ChildRef::Fixed(score));
        }
        board.take_back(hist);
    }
    refs
}

/// Generate one endgame by leveled value iteration. Sub-tables every
/// conversion can reach must already be registered in `db`.
pub fn generate(db: &EgtbDb, name: &str) -> GeneratedTable {
    let material = Material::from_name(name).unwrap();
    let layout = Layout::new(&material, 0).unwrap();
    let size = layout.size() as usize;

    let mut cells = [vec![TB_UNSET; size], vec![TB_UNSET; size]];
    // children of every cell still in play; None once the cell is final
    let mut work: Vec<[Option<Vec<ChildRef>>; 2]> = Vec::with_capacity(size);

    // pass 0: legality, mates and stalemates, child lists
    for key in 0..size {
        let mut entry: [Option<Vec<ChildRef>>; 2] = [None, None];
        let board = decode(&layout, key as u64);
        let canonical = board
            .as_ref()
            .and_then(|b| keys::encode(b, &layout))
            .is_some_and(|rec| rec.key == key as u64 && !rec.flip_side);

        if let (Some(mut board), true) = (board, canonical) {
            for side in Side::iter() {
                let sd = side as usize;
                board.side_to_move = side;
                // an en-passant target only exists for the side about to
                // capture it
                let ep_fits = match board.en_passant {
                    Some(ep) => (row(ep) == 2) == side.is_white(),
                    None => true,
                };
                if !ep_fits || board.is_in_check(side.opposite()) {
                    cells[sd][key] = TB_ILLEGAL;
                    continue;
                }
                let refs = children(db, &layout, name, &mut board, side);
                if refs.is_empty() {
                    cells[sd][key] = if board.is_in_check(side) {
                        TB_DTM_BASE // mated where standing
                    } else {
                        TB_DRAW
                    };
                } else {
                    entry[sd] = Some(refs);
                }
            }
        } else {
            cells[0][key] = TB_ILLEGAL;
            cells[1][key] = TB_ILLEGAL;
        }
        work.push(entry);
    }

    let translate = cell_table(0).unwrap();
    let score_of = |cells: &[Vec<u8>; 2], r: &ChildRef| -> Score {
        match r {
            ChildRef::Fixed(score) => *score,
            ChildRef::InTable { side, key } => translate(cells[*side][*key as usize]),
        }
    };

    // leveled sweeps: level t finalizes exactly the cells with |DTM| = t
    let mut dtm_max = 0u8;
    let mut empty_sweeps = 0;
    for t in 1..=Score::MATE.0 {
        let mut assigned = 0usize;
        for key in 0..size {
            for sd in 0..2 {
                let Some(refs) = work[key][sd].as_ref() else {
                    continue;
                };
                let mut best: Option<Score> = None;
                let mut all_known = true;
                for r in refs {
                    let child = score_of(&cells, r);
                    if child == Score::UNKNOWN {
                        all_known = false;
                        continue;
                    }
                    let parent = Score::from_child(child);
                    best = Some(best.map_or(parent, |b| b.max(parent)));
                }
                let level = Score(Score::MATE.0 - t);
                let value = match best {
                    // a win may be claimed as soon as it appears at its level
                    Some(b) if b == level => b,
                    // losses and draws need the full picture
                    Some(b) if all_known && b == -level => b,
                    _ => continue,
                };
                cells[sd][key] = score_to_cell(value);
                work[key][sd] = None;
                assigned += 1;
                dtm_max = dtm_max.max(t as u8);
            }
        }
        if assigned == 0 {
            empty_sweeps += 1;
            if empty_sweeps == 2 {
                break;
            }
        } else {
            empty_sweeps = 0;
        }
    }

    // whatever never resolved to a mate is a draw
    for key in 0..size {
        for sd in 0..2 {
            if work[key][sd].take().is_some() {
                cells[sd][key] = TB_DRAW;
            }
        }
    }

    // coarsen wins whose best move converts, so probes exercise the
    // one-ply resolution against the sub-tables
    for key in 0..size {
        let Some(mut board) = decode(&layout, key as u64) else {
            continue;
        };
        for side in Side::iter() {
            let sd = side as usize;
            let value = translate(cells[sd][key]);
            if !(value.is_mate_score() && value.0 > 0) {
                continue;
            }
            board.side_to_move = side;
            if win_converts(db, name, &mut board, side, value) {
                cells[sd][key] = TB_WINNING;
            }
        }
    }

    GeneratedTable {
        name: name.to_string(),
        cells,
        dtm_max,
    }
}

/// Does some optimal move of this winning position leave the signature?
fn win_converts(db: &EgtbDb, name: &str, board: &mut Board, side: Side, best: Score) -> bool {
    let mut legal = MoveList::new();
    board.gen_legal(side, false, &mut legal);

    for mv in legal.as_slice() {
        let hist = board.make(mv);
        let child_side = side.opposite();
        let (converts, child) = if board.is_material_draw() {
            (false, Score::DRAW)
        } else if Material::from_board(board).name() == name {
            (false, Score::UNKNOWN)
        } else {
            (true, db.get_score_side(board, child_side))
        };
        board.take_back(hist);
        if converts && Score::from_child(child) == best {
            return true;
        }
    }
    false
}

/// Write a table to `dir/<name>.xtb`, raw or block compressed.
pub fn write_table(dir: &Path, table: &GeneratedTable, compressed: bool, sides: [bool; 2]) {
    let mut header = FileHeader::new(&table.name, 0, table.dtm_max);
    for side in Side::iter() {
        if sides[side as usize] {
            header.add_side(side);
        }
    }
    if compressed {
        header.set_compressed();
    }

    let path = dir.join(format!("{}.xtb", table.name));
    let mut out = File::create(&path).unwrap();
    header.write_to(&mut out).unwrap();

    for side in Side::iter() {
        let sd = side as usize;
        if !sides[sd] {
            continue;
        }
        let stream = &table.cells[sd];
        if !compressed {
            out.write_all(stream).unwrap();
            continue;
        }
        let mut offsets = Vec::new();
        let mut data = Vec::new();
        for block in stream.chunks(EGTB_SIZE_COMPRESS_BLOCK) {
            let packed = zstd::bulk::compress(block, 3).unwrap();
            data.extend_from_slice(&packed);
            offsets.push(data.len() as u32);
        }
        write_block_table(&mut out, &offsets).unwrap();
        out.write_all(&data).unwrap();
    }
}
