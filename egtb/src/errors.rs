/*
 * errors.rs
 * Part of the egtb-probe project
 * Created Date: Monday, January 20th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Mon Mar 17 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

use thiserror::Error;

/// Errors raised on the construction and IO paths. Probing itself never
/// returns an error; every failure folds into a [`crate::defs::Score`]
/// sentinel instead.
#[derive(Error, Debug)]
pub enum EgtbError {
    #[error("invalid endgame name: {0}")]
    InvalidName(String),
    #[error("invalid attribute order field {order:#x} for {name}")]
    InvalidOrder { name: String, order: u32 },
    #[error("bad header in {0}")]
    BadHeader(String),
    #[error("unsupported table version signature {0:#06x}")]
    UnsupportedVersion(u16),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EgtbResult<T> = Result<T, EgtbError>;
