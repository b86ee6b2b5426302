/*
 * perft.rs
 * Part of the egtb-probe project
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 */

use crate::{board::Board, move_list::MoveList, moves::Move, side::Side};

pub struct SplitPerftResult {
    pub mv: Move,
    pub nodes: u64,
}

/// Count leaf nodes of the legal move tree to the given depth.
pub fn perft(board: &mut Board, side: Side, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut move_list = MoveList::new();
    board.gen_legal(side, false, &mut move_list);

    if depth == 1 {
        // bulk counting
        return move_list.len() as u64;
    }

    let mut nodes = 0;
    for mv in move_list.as_slice() {
        let hist = board.make(mv);
        nodes += perft(board, side.opposite(), depth - 1);
        board.take_back(hist);
    }
    nodes
}

/// Perft with per-root-move node counts, sorted alphabetically.
pub fn split_perft(board: &mut Board, side: Side, depth: usize) -> Vec<SplitPerftResult> {
    let mut move_list = MoveList::new();
    board.gen_legal(side, false, &mut move_list);

    let mut results = Vec::new();
    for mv in move_list.as_slice() {
        let hist = board.make(mv);
        let nodes = if depth > 1 {
            perft(board, side.opposite(), depth - 1)
        } else {
            1
        };
        board.take_back(hist);
        results.push(SplitPerftResult { mv: *mv, nodes });
    }

    results.sort_by(|a, b| a.mv.to_long_algebraic().cmp(&b.mv.to_long_algebraic()));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_perft(fen: &str, expected: &[u64]) {
        let mut board = Board::from_fen(fen).unwrap();
        let side = board.side_to_move;
        for (i, &nodes) in expected.iter().enumerate() {
            assert_eq!(
                perft(&mut board, side, i + 1),
                nodes,
                "perft({}) of {fen}",
                i + 1
            );
        }
    }

    #[test]
    fn start_position() {
        expect_perft(
            crate::definitions::DEFAULT_FEN,
            &[20, 400, 8_902, 197_281],
        );
    }

    #[test]
    fn rook_pawn_endgame() {
        // "position 3" of the classic perft suite
        expect_perft(
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            &[14, 191, 2_812, 43_238],
        );
    }

    #[test]
    fn bare_kings() {
        expect_perft("k7/8/K7/8/8/8/8/8 w - - 0 1", &[3, 7]);
    }

    #[test]
    fn king_and_pawn() {
        expect_perft("8/2k5/8/8/8/8/2P5/2K5 w - - 0 1", &[6, 48]);
    }

    #[test]
    fn split_perft_sums_to_perft() {
        let mut board = Board::default_board();
        let results = split_perft(&mut board, Side::White, 3);
        let total: u64 = results.iter().map(|r| r.nodes).sum();
        assert_eq!(total, 8_902);
    }
}
