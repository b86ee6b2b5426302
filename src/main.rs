/*
 * main.rs
 * Part of the egtb-probe project
 * Created Date: Tuesday, January 28th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Small demo front end: register a table folder, probe a position, print
//! the score and the forced line.

use std::path::PathBuf;

use anyhow::{Result, bail};
use chess::{board::Board, move_list::MoveList};
use clap::Parser;
use egtb::{EgtbDb, LoadMode, MemMode, Score};

pub struct About;
impl About {
    pub const NAME: &'static str = "egtb-probe";
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
    pub const SHORT_DESCRIPTION: &'static str =
        "egtb-probe answers endgame positions from distance-to-mate tables.";
}

#[derive(Parser)]
#[command(
    name = About::NAME,
    version = About::VERSION,
    about = About::SHORT_DESCRIPTION
)]
struct Options {
    /// Folders holding table files.
    #[arg(long, short, default_value = "./egtb")]
    folder: Vec<PathBuf>,

    /// Position to probe.
    #[arg(long, default_value = "K2k4/2p5/8/8/8/8/8/8 w - - 0 1")]
    fen: String,

    /// Memory mode: all, tiny or smart.
    #[arg(long, default_value = "smart")]
    mem: String,

    /// Load every table up front instead of on first use.
    #[arg(long)]
    preload: bool,

    /// Log at debug level.
    #[arg(long, short)]
    verbose: bool,
}

fn explain(score: Score) -> String {
    match score {
        Score::MISSING => "missing (position invalid or its table is not registered)".to_string(),
        other => other.to_string(),
    }
}

fn main() -> Result<()> {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_max_level(if options.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let mem_mode = match options.mem.as_str() {
        "all" => MemMode::All,
        "tiny" => MemMode::Tiny,
        "smart" => MemMode::Smart,
        other => bail!("unknown memory mode: {other}"),
    };

    let mut db = EgtbDb::new();
    for folder in &options.folder {
        db.add_folder(folder);
    }
    if db.get_size() == 0 {
        bail!(
            "no endgame tables found under {:?}; pass --folder",
            options.folder
        );
    }
    db.preload(
        mem_mode,
        if options.preload {
            LoadMode::All
        } else {
            LoadMode::OnRequest
        },
    );
    println!("tables registered: {}", db.get_size());

    let board = Board::from_fen(&options.fen).map_err(|e| anyhow::Error::msg(e.to_string()))?;
    print!("{board}");

    let score = db.get_score(&board);
    println!("score: {} ({})", score.0, explain(score));

    let mut moves = MoveList::new();
    db.probe(&board, &mut moves);
    if !moves.is_empty() {
        println!("line to mate: {moves}");
    }

    Ok(())
}
