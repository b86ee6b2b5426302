/*
 * file.rs
 * Part of the egtb-probe project
 * Created Date: Friday, January 24th 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! One endgame table and its per-side data buffers.
//!
//! A file is registered once and then probed concurrently. Metadata
//! (header, layout, block tables) loads exactly once behind `OnceLock`;
//! cell reads take a shared lock on the side's buffer and only fall into
//! the exclusive slow path when the wanted index is outside the current
//! window. At most one thread per side performs IO at a time; the other
//! side proceeds independently.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        OnceLock, RwLock,
        atomic::{AtomicU8, Ordering},
    },
};

use chess::side::Side;
use tracing::{debug, warn};

use crate::{
    defs::{
        EGTB_SIZE_COMPRESS_BLOCK, EGTB_SMART_MODE_THRESHOLD, MemMode, Score, TB_DRAW,
        TB_DTM_BASE, TB_ILLEGAL, TB_LOSING, TB_UNSET, TB_WINNING,
    },
    errors::{EgtbError, EgtbResult},
    header::{FileHeader, read_block_table},
    layout::Layout,
    material::Material,
};

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 1;

/// Translate a cell byte for the given format version. This is the one
/// place that knows the byte semantics; new versions add an arm here
/// without touching the probe driver.
pub fn cell_table(version: u16) -> Option<fn(u8) -> Score> {
    match version {
        0 => Some(cell_to_score_v0),
        _ => None,
    }
}

fn cell_to_score_v0(cell: u8) -> Score {
    match cell {
        TB_DRAW => Score::DRAW,
        TB_ILLEGAL => Score::ILLEGAL,
        TB_UNSET => Score::UNKNOWN,
        TB_WINNING => Score::WINNING,
        TB_LOSING => -Score::WINNING,
        _ => {
            let plies = (cell - TB_DTM_BASE) as i32;
            if plies % 2 == 1 {
                Score(Score::MATE.0 - plies)
            } else {
                Score(-(Score::MATE.0 - plies))
            }
        }
    }
}

#[derive(Debug)]
struct FileMeta {
    version: u16,
    dtm_max: u8,
    layout: Layout,
}

#[derive(Debug)]
struct SideMeta {
    path: PathBuf,
    compressed: bool,
    /// End offset of each compressed block within the side's stream.
    block_table: Option<Vec<u32>>,
    /// Absolute file offset of the side's data stream.
    data_offset: u64,
}

#[derive(Debug, Default)]
struct SideBuf {
    buf: Vec<u8>,
    start: u64,
    end: u64,
}

impl SideBuf {
    #[inline(always)]
    fn cell(&self, idx: u64) -> Option<u8> {
        if !self.buf.is_empty() && idx >= self.start && idx < self.end {
            Some(self.buf[(idx - self.start) as usize])
        } else {
            None
        }
    }
}

/// One endgame table, possibly spread over one file per side.
#[derive(Debug)]
pub struct EgtbFile {
    name: String,
    material: Material,
    paths: [Option<PathBuf>; 2],
    mem_mode: MemMode,
    smart_threshold: u64,
    meta: OnceLock<Option<FileMeta>>,
    side_meta: [OnceLock<Option<SideMeta>>; 2],
    status: AtomicU8,
    bufs: [RwLock<SideBuf>; 2],
}

impl EgtbFile {
    /// Read and validate the header of a candidate file. The stem of the
    /// path must spell the same signature the header carries.
    pub fn probe_header(path: &Path) -> EgtbResult<(FileHeader, Material)> {
        let origin = path.display().to_string();
        let mut file = File::open(path)?;
        let header = FileHeader::read_from(&mut file, &origin)?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem != header.name {
            return Err(EgtbError::BadHeader(origin));
        }
        let material = Material::from_name(&header.name)?;
        Ok((header, material))
    }

    /// `true` for file names the registry considers table files.
    pub fn known_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                crate::defs::EGTB_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    pub fn new(material: Material) -> EgtbFile {
        EgtbFile {
            name: material.name(),
            material,
            paths: [None, None],
            mem_mode: MemMode::default(),
            smart_threshold: EGTB_SMART_MODE_THRESHOLD,
            meta: OnceLock::new(),
            side_meta: [OnceLock::new(), OnceLock::new()],
            status: AtomicU8::new(STATUS_OK),
            bufs: [RwLock::new(SideBuf::default()), RwLock::new(SideBuf::default())],
        }
    }

    /// Attach a path for every side the header carries. A later file never
    /// replaces an earlier registration of the same side.
    pub fn add_path(&mut self, path: &Path, header: &FileHeader) {
        for side in Side::iter() {
            if header.has_side(side) && self.paths[side as usize].is_none() {
                self.paths[side as usize] = Some(path.to_path_buf());
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn path(&self, side: Side) -> Option<&Path> {
        self.paths[side as usize].as_deref()
    }

    /// Does this table carry data for the given side to move?
    pub fn has_side(&self, side: Side) -> bool {
        self.paths[side as usize].is_some()
    }

    pub fn set_mem_mode(&mut self, mode: MemMode, smart_threshold: u64) {
        self.mem_mode = mode;
        self.smart_threshold = smart_threshold;
    }

    /// The attribute layout, loading the header on first use.
    pub fn layout(&self) -> Option<&Layout> {
        self.meta().map(|m| &m.layout)
    }

    /// Cells per side stream, 0 while the header is unreadable.
    pub fn size(&self) -> u64 {
        self.layout().map_or(0, |l| l.size())
    }

    pub fn dtm_max(&self) -> u8 {
        self.meta().map_or(0, |m| m.dtm_max)
    }

    pub fn compressed_block_count(&self) -> usize {
        self.size().div_ceil(EGTB_SIZE_COMPRESS_BLOCK as u64) as usize
    }

    /// IO or a corrupt stream poisoned this table; probes answer missing.
    pub fn load_failed(&self) -> bool {
        self.status.load(Ordering::Acquire) == STATUS_ERROR
    }

    /// Translate a raw cell through the version's byte table.
    pub fn cell_score(&self, cell: u8) -> Score {
        self.meta()
            .and_then(|m| cell_table(m.version))
            .map_or(Score::UNKNOWN, |table| table(cell))
    }

    /// Fetch one cell. All failures come back as the unset byte; probing
    /// layers turn that into a missing score.
    pub fn get_cell(&self, idx: u64, side: Side) -> u8 {
        let sd = side as usize;
        {
            let buf = read_lock(&self.bufs[sd]);
            if let Some(cell) = buf.cell(idx) {
                return cell;
            }
        }

        if self.load_failed() {
            return TB_UNSET;
        }

        let mut buf = write_lock(&self.bufs[sd]);
        // somebody else may have pulled the window in while we waited
        if let Some(cell) = buf.cell(idx) {
            return cell;
        }

        match self.read_buf(&mut buf, idx, side) {
            Ok(()) => buf.cell(idx).unwrap_or(TB_UNSET),
            Err(err) => {
                warn!(table = %self.name, ?side, idx, %err, "table read failed");
                self.status.store(STATUS_ERROR, Ordering::Release);
                *buf = SideBuf::default();
                TB_UNSET
            }
        }
    }

    /// Force the header, block tables and first window of each present
    /// side into memory.
    pub fn preload_data(&self) {
        for side in Side::iter() {
            if self.has_side(side) && self.size() > 0 {
                let _ = self.get_cell(0, side);
            }
        }
    }

    /// Drop the data buffers. Metadata stays; the next probe reloads.
    pub fn remove_buffers(&self) {
        for side in 0..2 {
            *write_lock(&self.bufs[side]) = SideBuf::default();
        }
    }

    fn meta(&self) -> Option<&FileMeta> {
        self.meta
            .get_or_init(|| {
                let path = self.paths.iter().flatten().next()?;
                let origin = path.display().to_string();
                let mut file = File::open(path).ok()?;
                let header = FileHeader::read_from(&mut file, &origin).ok()?;
                if header.name != self.name {
                    warn!(table = %self.name, %origin, "header name mismatch");
                    return None;
                }
                let layout = Layout::new(&self.material, header.order).ok()?;
                debug!(table = %self.name, size = layout.size(), "table metadata loaded");
                Some(FileMeta {
                    version: header.version()?,
                    dtm_max: header.dtm_max,
                    layout,
                })
            })
            .as_ref()
    }

    fn side_meta(&self, side: Side) -> Option<&SideMeta> {
        self.side_meta[side as usize]
            .get_or_init(|| {
                let size = self.size();
                let path = self.paths[side as usize].clone()?;
                let origin = path.display().to_string();
                let mut file = File::open(&path).ok()?;
                let header = FileHeader::read_from(&mut file, &origin).ok()?;
                if !header.has_side(side) {
                    return None;
                }

                let block_count = size.div_ceil(EGTB_SIZE_COMPRESS_BLOCK as u64) as usize;
                let mut offset = crate::defs::EGTB_HEADER_SIZE as u64;
                for s in Side::iter() {
                    if !header.has_side(s) {
                        continue;
                    }
                    let block_table = if header.is_compressed() {
                        file.seek(SeekFrom::Start(offset)).ok()?;
                        let table = read_block_table(&mut file, block_count).ok()?;
                        offset += block_count as u64 * 4;
                        Some(table)
                    } else {
                        None
                    };
                    let stream_len = match &block_table {
                        Some(table) => *table.last()? as u64,
                        None => size,
                    };
                    if s == side {
                        return Some(SideMeta {
                            path,
                            compressed: header.is_compressed(),
                            block_table,
                            data_offset: offset,
                        });
                    }
                    offset += stream_len;
                }
                None
            })
            .as_ref()
    }

    /// Bounds of compressed block `b` within the side's stream.
    fn compressed_block_bounds(table: &[u32], b: usize) -> (u64, u64) {
        let start = if b == 0 { 0 } else { table[b - 1] as u64 };
        (start, table[b] as u64)
    }

    fn read_compressed_block(
        file: &mut File,
        meta: &SideMeta,
        b: usize,
        expected: usize,
    ) -> EgtbResult<Vec<u8>> {
        let table = meta
            .block_table
            .as_deref()
            .ok_or_else(|| EgtbError::BadHeader(meta.path.display().to_string()))?;
        let (start, end) = Self::compressed_block_bounds(table, b);
        if end < start {
            return Err(EgtbError::BadHeader(meta.path.display().to_string()));
        }
        let mut src = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(meta.data_offset + start))?;
        file.read_exact(&mut src)?;
        let out = zstd::bulk::decompress(&src, expected)?;
        if out.len() != expected {
            return Err(EgtbError::BadHeader(meta.path.display().to_string()));
        }
        Ok(out)
    }

    /// Fill the side buffer so that `idx` falls inside its window.
    fn read_buf(&self, buf: &mut SideBuf, idx: u64, side: Side) -> EgtbResult<()> {
        let size = self.size();
        let meta = self
            .side_meta(side)
            .ok_or_else(|| EgtbError::BadHeader(self.name.clone()))?;
        if size == 0 || idx >= size {
            return Err(EgtbError::BadHeader(self.name.clone()));
        }

        let mode = match self.mem_mode {
            MemMode::Smart if size < self.smart_threshold => MemMode::All,
            MemMode::Smart => MemMode::Tiny,
            mode => mode,
        };

        let block_len = EGTB_SIZE_COMPRESS_BLOCK as u64;
        let mut file = File::open(&meta.path)?;

        match mode {
            MemMode::All => {
                let mut data = vec![0u8; size as usize];
                if meta.compressed {
                    for b in 0..self.compressed_block_count() {
                        let lo = b as u64 * block_len;
                        let expected = (size - lo).min(block_len) as usize;
                        let out = Self::read_compressed_block(&mut file, meta, b, expected)?;
                        data[lo as usize..lo as usize + expected].copy_from_slice(&out);
                    }
                } else {
                    file.seek(SeekFrom::Start(meta.data_offset))?;
                    file.read_exact(&mut data)?;
                }
                buf.buf = data;
                buf.start = 0;
                buf.end = size;
            }
            MemMode::Tiny | MemMode::Smart => {
                let b = (idx / block_len) as usize;
                let lo = b as u64 * block_len;
                let expected = (size - lo).min(block_len) as usize;
                let data = if meta.compressed {
                    Self::read_compressed_block(&mut file, meta, b, expected)?
                } else {
                    let mut data = vec![0u8; expected];
                    file.seek(SeekFrom::Start(meta.data_offset + lo))?;
                    file.read_exact(&mut data)?;
                    data
                };
                buf.buf = data;
                buf.start = lo;
                buf.end = lo + expected as u64;
            }
        }
        debug!(table = %self.name, ?side, start = buf.start, end = buf.end, "buffer window loaded");
        Ok(())
    }
}

fn read_lock(lock: &RwLock<SideBuf>) -> std::sync::RwLockReadGuard<'_, SideBuf> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock(lock: &RwLock<SideBuf>) -> std::sync::RwLockWriteGuard<'_, SideBuf> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::EGTB_DTM_MAX;
    use std::io::Write;

    #[test]
    fn cell_translation_v0() {
        let table = cell_table(0).unwrap();
        assert_eq!(table(TB_DRAW), Score::DRAW);
        assert_eq!(table(TB_ILLEGAL), Score::ILLEGAL);
        assert_eq!(table(TB_UNSET), Score::UNKNOWN);
        assert_eq!(table(TB_WINNING), Score::WINNING);
        assert_eq!(table(TB_LOSING), -Score::WINNING);
        // mated on the spot
        assert_eq!(table(TB_DTM_BASE), -Score::MATE);
        // mate in one ply
        assert_eq!(table(TB_DTM_BASE + 1), Score(999));
        assert_eq!(table(TB_DTM_BASE + 2), Score(-998));
        assert_eq!(table(TB_DTM_BASE + EGTB_DTM_MAX), Score(-750));
        assert!(cell_table(1).is_none());
    }

    fn write_raw_table(dir: &Path, name: &str, cells_w: &[u8], cells_b: &[u8]) -> PathBuf {
        let mut header = FileHeader::new(name, 0, 10);
        header.add_side(Side::White);
        header.add_side(Side::Black);
        let path = dir.join(format!("{name}.xtb"));
        let mut f = File::create(&path).unwrap();
        header.write_to(&mut f).unwrap();
        f.write_all(cells_w).unwrap();
        f.write_all(cells_b).unwrap();
        path
    }

    #[test]
    fn raw_cells_read_in_both_memory_modes() {
        let material = Material::from_name("kqk").unwrap();
        let size = Layout::new(&material, 0).unwrap().size() as usize;
        let cells_w: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let cells_b: Vec<u8> = (0..size).map(|i| ((i * 7) % 251) as u8).collect();

        let dir = tempfile::tempdir().unwrap();
        let path = write_raw_table(dir.path(), "kqk", &cells_w, &cells_b);

        for mode in [MemMode::All, MemMode::Tiny] {
            let (header, material) = EgtbFile::probe_header(&path).unwrap();
            let mut file = EgtbFile::new(material);
            file.add_path(&path, &header);
            file.set_mem_mode(mode, EGTB_SMART_MODE_THRESHOLD);

            assert_eq!(file.size() as usize, size);
            for &idx in &[0usize, 1, 4095, 4096, 4097, size - 1] {
                assert_eq!(file.get_cell(idx as u64, Side::White), cells_w[idx]);
                assert_eq!(file.get_cell(idx as u64, Side::Black), cells_b[idx]);
            }
            assert!(!file.load_failed());
        }
    }

    #[test]
    fn unreadable_file_degrades_to_unset() {
        let dir = tempfile::tempdir().unwrap();
        let material = Material::from_name("kqk").unwrap();
        let size = Layout::new(&material, 0).unwrap().size() as usize;
        let cells = vec![0u8; size];
        let path = write_raw_table(dir.path(), "kqk", &cells, &cells);

        let (header, material) = EgtbFile::probe_header(&path).unwrap();
        let mut file = EgtbFile::new(material);
        file.add_path(&path, &header);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(file.get_cell(0, Side::White), TB_UNSET);
        assert!(file.load_failed());
        // stays failed, no retry
        assert_eq!(file.get_cell(1, Side::White), TB_UNSET);
    }

    #[test]
    fn stem_must_match_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_raw_table(dir.path(), "kqk", &[0; 8], &[0; 8]);
        let renamed = dir.path().join("krk.xtb");
        std::fs::rename(&path, &renamed).unwrap();
        assert!(matches!(
            EgtbFile::probe_header(&renamed),
            Err(EgtbError::BadHeader(_))
        ));
    }

    #[test]
    fn known_extensions() {
        assert!(EgtbFile::known_extension(Path::new("/tmp/kqk.xtb")));
        assert!(EgtbFile::known_extension(Path::new("kqk.XTB")));
        assert!(!EgtbFile::known_extension(Path::new("kqk.bin")));
        assert!(!EgtbFile::known_extension(Path::new("kqk")));
    }
}
