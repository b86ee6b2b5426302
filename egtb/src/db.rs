/*
 * db.rs
 * Part of the egtb-probe project
 * Created Date: Monday, January 27th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! The table registry and the probe driver.
//!
//! The registry keys every loaded table by its material signature and
//! dispatches probes. A probe encodes the position, fetches its cell and
//! translates it; cells that only confirm win or loss are resolved to an
//! exact distance by a one-ply expansion over the legal moves, which also
//! covers tables that carry a single side-to-move stream. Probing never
//! fails: every error folds into a score sentinel.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chess::{
    board::Board,
    move_list::MoveList,
    moves::Move,
    pieces::PlacedPiece,
    side::Side,
};
use tracing::{debug, info, warn};

use crate::{
    defs::{LoadMode, MemMode, Score, EGTB_SMART_MODE_THRESHOLD},
    file::EgtbFile,
    keys,
    material::Material,
};

/// Unresolved cells settle within a ply; the bound only protects against
/// corrupt tables sending the expansion in circles.
const MAX_RESOLVE_PLY: u32 = 8;

/// All registered endgame tables.
#[derive(Debug)]
pub struct EgtbDb {
    files: HashMap<String, EgtbFile>,
    mem_mode: MemMode,
    smart_threshold: u64,
}

impl Default for EgtbDb {
    fn default() -> Self {
        EgtbDb::new()
    }
}

impl EgtbDb {
    pub fn new() -> EgtbDb {
        EgtbDb {
            files: HashMap::new(),
            mem_mode: MemMode::default(),
            smart_threshold: EGTB_SMART_MODE_THRESHOLD,
        }
    }

    /// Register table files. Unknown extensions, unreadable files and
    /// corrupt headers are skipped with a warning. Returns how many files
    /// were accepted.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            if !EgtbFile::known_extension(path) {
                continue;
            }
            match EgtbFile::probe_header(path) {
                Ok((header, material)) => {
                    let file = self
                        .files
                        .entry(material.name())
                        .or_insert_with(|| EgtbFile::new(material));
                    file.add_path(path, &header);
                    file.set_mem_mode(self.mem_mode, self.smart_threshold);
                    debug!(table = file.name(), path = %path.display(), "registered");
                    added += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping table file");
                }
            }
        }
        added
    }

    /// Register every table file found directly in `folder`.
    pub fn add_folder(&mut self, folder: &Path) -> usize {
        let mut paths: Vec<PathBuf> = match std::fs::read_dir(folder) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect(),
            Err(err) => {
                warn!(folder = %folder.display(), %err, "cannot scan folder");
                return 0;
            }
        };
        paths.sort();
        let added = self.add_paths(&paths);
        info!(folder = %folder.display(), added, "folder registered");
        added
    }

    /// Number of registered tables.
    pub fn get_size(&self) -> usize {
        self.files.len()
    }

    /// Threshold below which [`MemMode::Smart`] keeps whole tables
    /// resident.
    pub fn set_smart_threshold(&mut self, bytes: u64) {
        self.smart_threshold = bytes;
        for file in self.files.values_mut() {
            file.set_mem_mode(self.mem_mode, bytes);
        }
    }

    /// Choose the memory mode for all tables and optionally force their
    /// headers and data in right away.
    pub fn preload(&mut self, mem_mode: MemMode, load_mode: LoadMode) -> bool {
        self.mem_mode = mem_mode;
        for file in self.files.values_mut() {
            file.set_mem_mode(mem_mode, self.smart_threshold);
        }
        if load_mode == LoadMode::All {
            for file in self.files.values() {
                file.preload_data();
            }
        }
        true
    }

    /// Drop every table's data buffers.
    pub fn remove_buffers(&self) {
        for file in self.files.values() {
            file.remove_buffers();
        }
    }

    /// The table registered for a signature, if any.
    pub fn file(&self, name: &str) -> Option<&EgtbFile> {
        self.files.get(name)
    }

    /// Score of the position from the perspective of its side to move.
    pub fn get_score(&self, board: &Board) -> Score {
        self.get_score_side(board, board.side_to_move)
    }

    /// Score with an explicit side to move.
    pub fn get_score_side(&self, board: &Board, side: Side) -> Score {
        if !board.is_valid() {
            return Score::ILLEGAL;
        }
        let mut scratch = board.clone();
        self.score_position(&mut scratch, side, 0)
    }

    /// Score of a piece vector.
    pub fn get_score_pieces(&self, pieces: &[PlacedPiece], side: Side) -> Score {
        let mut board = Board::new();
        if board.setup(pieces, side, None).is_err() || !board.is_valid() {
            return Score::ILLEGAL;
        }
        self.score_position(&mut board, side, 0)
    }

    /// Score a position and collect a forced line towards mate. The line
    /// is empty for draws and sentinel results; it ends at the mate, or
    /// earlier when a continuation falls into a missing table.
    pub fn probe(&self, board: &Board, moves: &mut MoveList) -> Score {
        moves.clear();
        let root = self.get_score(board);
        if !root.is_mate_score() {
            return root;
        }

        let mut scratch = board.clone();
        let mut side = board.side_to_move;
        let mut current = root;

        while current.is_mate_score() && current != -Score::MATE {
            let mut legal = MoveList::new();
            scratch.gen_legal(side, false, &mut legal);

            let mut chosen: Option<(Move, Score)> = None;
            for mv in legal.as_slice() {
                let hist = scratch.make(mv);
                let child = self.score_position(&mut scratch, side.opposite(), 0);
                scratch.take_back(hist);
                if Score::from_child(child) == current {
                    chosen = Some((*mv, child));
                    break;
                }
            }

            let Some((mv, child)) = chosen else {
                debug!(score = %current, "mate line broke off early");
                break;
            };
            moves.push(mv);
            scratch.make(&mv);
            scratch.side_to_move = side.opposite();
            side = side.opposite();
            current = child;
        }

        root
    }

    /// The probing core: signature lookup, key encoding, cell fetch and,
    /// when needed, the one-ply resolution.
    fn score_position(&self, board: &mut Board, side: Side, ply: u32) -> Score {
        if board.is_material_draw() {
            return Score::DRAW;
        }

        let name = Material::from_board(board).name();
        let Some(file) = self.files.get(&name) else {
            return Score::MISSING;
        };
        let Some(layout) = file.layout() else {
            return Score::MISSING;
        };
        let Some(rec) = keys::encode(board, layout) else {
            return Score::ILLEGAL;
        };
        let lookup_side = if rec.flip_side { side.opposite() } else { side };

        if file.has_side(lookup_side) {
            let cell = file.get_cell(rec.key, lookup_side);
            let score = file.cell_score(cell);
            if score == Score::UNKNOWN {
                return if file.load_failed() {
                    Score::MISSING
                } else {
                    Score::UNKNOWN
                };
            }
            if score.is_definite() || score == Score::ILLEGAL {
                return score;
            }
            // win or loss confirmed, distance one ply away
            self.resolve(board, side, ply)
        } else {
            // this side's stream is not on disk; derive it from the children
            self.resolve(board, side, ply)
        }
    }

    /// Expand one ply and take the best child score. Exact only when every
    /// child resolves; a missing continuation makes the result missing.
    fn resolve(&self, board: &mut Board, side: Side, ply: u32) -> Score {
        if ply >= MAX_RESOLVE_PLY {
            return Score::UNKNOWN;
        }

        let mut legal = MoveList::new();
        board.gen_legal(side, false, &mut legal);
        if legal.is_empty() {
            return if board.is_in_check(side) {
                -Score::MATE
            } else {
                Score::DRAW
            };
        }

        let mut best: Option<Score> = None;
        for mv in legal.as_slice() {
            let hist = board.make(mv);
            let child = self.score_position(board, side.opposite(), ply + 1);
            board.take_back(hist);

            match child {
                Score::MISSING => return Score::MISSING,
                Score::UNKNOWN => return Score::UNKNOWN,
                Score::ILLEGAL => return Score::MISSING,
                _ => {}
            }
            let parent = Score::from_child(child);
            best = Some(best.map_or(parent, |b| b.max(parent)));
        }
        best.unwrap_or(Score::UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_reports_missing() {
        let db = EgtbDb::new();
        let board = Board::default_board();
        assert_eq!(db.get_score(&board), Score::MISSING);
        assert_eq!(db.get_size(), 0);
    }

    #[test]
    fn bare_kings_draw_without_any_table() {
        let db = EgtbDb::new();
        let board = Board::from_fen("k7/8/K7/8/8/8/8/8 w - - 0 1").unwrap();
        assert_eq!(db.get_score(&board), Score::DRAW);
    }

    #[test]
    fn invalid_boards_are_illegal() {
        use chess::pieces::Piece;
        let db = EgtbDb::new();
        // two white kings
        let pieces = [
            PlacedPiece::new(Piece::King, Side::White, 0),
            PlacedPiece::new(Piece::King, Side::White, 20),
            PlacedPiece::new(Piece::King, Side::Black, 40),
        ];
        assert_eq!(db.get_score_pieces(&pieces, Side::White), Score::ILLEGAL);
    }

    #[test]
    fn unknown_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kqk.xtb"), b"garbage").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"irrelevant").unwrap();

        let mut db = EgtbDb::new();
        assert_eq!(db.add_folder(dir.path()), 0);
        assert_eq!(db.get_size(), 0);
    }
}
