/*
 * lib.rs
 * Part of the egtb-probe project
 * Created Date: Monday, January 20th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Endgame tablebase probing.
//!
//! Register table files with an [`EgtbDb`], then ask it for the exact
//! value of any position whose material has a table: a draw, or the
//! distance to mate in plies, optionally with the forced line.
//!
//! ```no_run
//! use chess::board::Board;
//! use egtb::{EgtbDb, LoadMode, MemMode};
//!
//! let mut db = EgtbDb::new();
//! db.add_folder(std::path::Path::new("./egtb"));
//! db.preload(MemMode::All, LoadMode::OnRequest);
//!
//! let board = Board::from_fen("K2k4/2p5/8/8/8/8/8/8 w - - 0 1").unwrap();
//! println!("score: {}", db.get_score(&board));
//! ```

pub mod db;
pub mod defs;
pub mod errors;
pub mod file;
pub mod header;
pub mod keys;
pub mod layout;
pub mod material;

pub use db::EgtbDb;
pub use defs::{LoadMode, MemMode, Score};
pub use errors::{EgtbError, EgtbResult};
pub use file::EgtbFile;
pub use material::Material;
