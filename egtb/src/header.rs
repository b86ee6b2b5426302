/*
 * header.rs
 * Part of the egtb-probe project
 * Created Date: Thursday, January 23rd 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Mon Mar 17 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! The fixed binary file header and the compressed-block offset table.
//!
//! Everything on disk is little endian. The header occupies the first
//! [`EGTB_HEADER_SIZE`] bytes; when the compressed property bit is set,
//! each present side's data is preceded by its block offset table
//! (`block_count` u32 entries, each the end offset of one compressed block
//! within that side's stream).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chess::side::Side;

use crate::{
    defs::{EGTB_HEADER_SIZE, EGTB_ID_MAIN_V0, EGTB_PROP_COMPRESSED},
    errors::{EgtbError, EgtbResult},
};

const NAME_LEN: usize = 20;
const COPYRIGHT_LEN: usize = 64;
const RESERVED_TAIL: usize = 80;

/// The parsed fixed-size header of a table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub signature: u16,
    pub property: u32,
    pub order: u32,
    pub dtm_max: u8,
    pub name: String,
    pub copyright: String,
    pub checksum: i64,
}

impl FileHeader {
    pub fn new(name: &str, order: u32, dtm_max: u8) -> FileHeader {
        FileHeader {
            signature: EGTB_ID_MAIN_V0,
            property: 0,
            order,
            dtm_max,
            name: name.to_string(),
            copyright: String::new(),
            checksum: 0,
        }
    }

    /// Format version behind the signature, `None` for foreign files.
    pub fn version(&self) -> Option<u16> {
        match self.signature {
            EGTB_ID_MAIN_V0 => Some(0),
            _ => None,
        }
    }

    pub fn has_side(&self, side: Side) -> bool {
        self.property & (1 << side as u32) != 0
    }

    pub fn add_side(&mut self, side: Side) {
        self.property |= 1 << side as u32;
    }

    pub fn is_compressed(&self) -> bool {
        self.property & EGTB_PROP_COMPRESSED != 0
    }

    pub fn set_compressed(&mut self) {
        self.property |= EGTB_PROP_COMPRESSED;
    }

    /// Read and validate a header. `origin` only decorates errors.
    pub fn read_from(reader: &mut impl Read, origin: &str) -> EgtbResult<FileHeader> {
        let mut raw = [0u8; EGTB_HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        let mut r = &raw[..];

        let signature = r.read_u16::<LittleEndian>()?;
        let _padding = r.read_u16::<LittleEndian>()?;
        let property = r.read_u32::<LittleEndian>()?;
        let order = r.read_u32::<LittleEndian>()?;
        let dtm_max = r.read_u8()?;
        let mut skip = [0u8; 11];
        r.read_exact(&mut skip)?;

        let mut name_raw = [0u8; NAME_LEN];
        r.read_exact(&mut name_raw)?;
        let mut copyright_raw = [0u8; COPYRIGHT_LEN];
        r.read_exact(&mut copyright_raw)?;
        let checksum = r.read_i64::<LittleEndian>()?;

        let header = FileHeader {
            signature,
            property,
            order,
            dtm_max,
            name: fixed_str(&name_raw),
            copyright: fixed_str(&copyright_raw),
            checksum,
        };

        if header.version().is_none() {
            return Err(EgtbError::UnsupportedVersion(signature));
        }
        if header.name.is_empty() || (!header.has_side(Side::White) && !header.has_side(Side::Black))
        {
            return Err(EgtbError::BadHeader(origin.to_string()));
        }
        Ok(header)
    }

    /// Write the header back out, NUL padded to its fixed size.
    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let mut raw = Vec::with_capacity(EGTB_HEADER_SIZE);
        raw.write_u16::<LittleEndian>(self.signature)?;
        raw.write_u16::<LittleEndian>(0)?;
        raw.write_u32::<LittleEndian>(self.property)?;
        raw.write_u32::<LittleEndian>(self.order)?;
        raw.write_u8(self.dtm_max)?;
        raw.extend_from_slice(&[0u8; 11]);
        raw.extend_from_slice(&fixed_bytes::<NAME_LEN>(&self.name));
        raw.extend_from_slice(&fixed_bytes::<COPYRIGHT_LEN>(&self.copyright));
        raw.write_i64::<LittleEndian>(self.checksum)?;
        raw.extend_from_slice(&[0u8; RESERVED_TAIL]);
        debug_assert_eq!(raw.len(), EGTB_HEADER_SIZE);
        writer.write_all(&raw)
    }
}

fn fixed_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn fixed_bytes<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N - 1);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Read a side's block offset table: `count` little-endian u32 end offsets.
pub fn read_block_table(reader: &mut impl Read, count: usize) -> EgtbResult<Vec<u32>> {
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        table.push(reader.read_u32::<LittleEndian>()?);
    }
    Ok(table)
}

/// Write a block offset table.
pub fn write_block_table(writer: &mut impl Write, table: &[u32]) -> std::io::Result<()> {
    for &offset in table {
        writer.write_u32::<LittleEndian>(offset)?;
    }
    Ok(())
}
