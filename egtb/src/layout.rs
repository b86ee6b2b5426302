/*
 * layout.rs
 * Part of the egtb-probe project
 * Created Date: Tuesday, January 21st 2025
 * Author: Paul Tsouchlos (DeveloperPaul123) (developer.paul.123@gmail.com)
 * -----
 * Last Modified: Fri Apr 25 2025
 * -----
 * Copyright (c) 2025 Paul Tsouchlos (DeveloperPaul123)
 * GNU General Public License v3.0 or later
 * https://www.gnu.org/licenses/gpl-3.0-standalone.html
 *
 */

//! Index attribute layouts.
//!
//! A layout turns a material signature plus the header's `order` field into
//! the ordered list of encoded slots, their sizes and multipliers, and the
//! total stream size. The key of a position is `sum(sub_key[i] * mult[i])`
//! plus, for pawn-vs-pawn signatures, an outer en-passant slot.

use arrayvec::ArrayVec;
use chess::{pieces::Piece, side::Side};

use crate::{
    defs::{
        EGTB_EP_SLOTS, EGTB_SIZE_KK2, EGTB_SIZE_KK8, EGTB_SIZE_P, EGTB_SIZE_PP, EGTB_SIZE_PPP,
        EGTB_SIZE_PPPP, EGTB_SIZE_X, EGTB_SIZE_XX, EGTB_SIZE_XXX, EGTB_SIZE_XXXX,
    },
    errors::{EgtbError, EgtbResult},
    material::Material,
};

/// Most slots a layout can carry: the king pair plus five piece-type groups
/// per side.
pub const MAX_ATTRS: usize = 11;

/// Slots the packed `order` field can reorder (3 bits each).
const MAX_ORDERED_ATTRS: usize = 6;

/// One kind of encoded slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// Lone king reduced to the 10-square triangle.
    K8,
    /// Lone king reduced to the left half board.
    K2,
    /// Lone king, no reduction.
    K,
    /// Both kings in one slot, 8-fold reduction on the leading one.
    Kk8,
    /// Both kings in one slot, mirror reduction only.
    Kk2,
    /// `count` identical pieces of one side encoded as a sorted tuple.
    Tuple { piece: Piece, count: u8 },
}

impl AttrKind {
    /// Number of sub-keys this slot contributes.
    pub fn size(&self) -> u64 {
        match self {
            AttrKind::K8 => 10,
            AttrKind::K2 => 32,
            AttrKind::K => 64,
            AttrKind::Kk8 => EGTB_SIZE_KK8 as u64,
            AttrKind::Kk2 => EGTB_SIZE_KK2 as u64,
            AttrKind::Tuple { piece, count } => {
                let sizes: [usize; 4] = if *piece == Piece::Pawn {
                    [EGTB_SIZE_P, EGTB_SIZE_PP, EGTB_SIZE_PPP, EGTB_SIZE_PPPP]
                } else {
                    [EGTB_SIZE_X, EGTB_SIZE_XX, EGTB_SIZE_XXX, EGTB_SIZE_XXXX]
                };
                sizes[*count as usize - 1] as u64
            }
        }
    }
}

/// A slot with its place value. `side` is relative to the signature:
/// [`Side::White`] is the side written first (the stronger one).
#[derive(Debug, Clone, Copy)]
pub struct IndexAttr {
    pub kind: AttrKind,
    pub side: Side,
    pub mult: u64,
}

/// The attribute layout of one signature.
#[derive(Debug, Clone)]
pub struct Layout {
    material: Material,
    attrs: ArrayVec<IndexAttr, MAX_ATTRS>,
    /// Walk order over `attrs`; multipliers decrease along this sequence.
    seq: ArrayVec<u8, MAX_ATTRS>,
    enpassantable: bool,
    /// Product of all slot sizes.
    base_size: u64,
    /// `base_size` times the en-passant slots.
    size: u64,
}

impl Layout {
    /// Build the layout for a signature. `order` is the header's packed
    /// slot sequence; 0 means declaration order.
    pub fn new(material: &Material, order: u32) -> EgtbResult<Layout> {
        let material = if material.strong_side() == Side::Black {
            material.swapped()
        } else {
            *material
        };
        if !material.is_valid() {
            return Err(EgtbError::InvalidName(material.name()));
        }

        let mut attrs: ArrayVec<IndexAttr, MAX_ATTRS> = ArrayVec::new();

        // the king pair comes first; with no pawn anywhere the full 8-fold
        // group applies, otherwise only the horizontal mirror survives
        let pawnless = !material.has_pawns(Side::White) && !material.has_pawns(Side::Black);
        attrs.push(IndexAttr {
            kind: if pawnless { AttrKind::Kk8 } else { AttrKind::Kk2 },
            side: Side::White,
            mult: 0,
        });

        for side in Side::iter() {
            for piece in [
                Piece::Queen,
                Piece::Rook,
                Piece::Bishop,
                Piece::Knight,
                Piece::Pawn,
            ] {
                let count = material.count(side, piece);
                if count == 0 {
                    continue;
                }
                if count > 4 {
                    return Err(EgtbError::InvalidName(material.name()));
                }
                attrs.push(IndexAttr {
                    kind: AttrKind::Tuple { piece, count },
                    side,
                    mult: 0,
                });
            }
        }

        let seq = Self::parse_order(&material, order, attrs.len())?;

        // place values right to left along the walk order
        let mut running = 1u64;
        for &i in seq.iter().rev() {
            attrs[i as usize].mult = running;
            running *= attrs[i as usize].kind.size();
        }
        let base_size = running;

        let enpassantable = material.is_enpassantable();
        let size = base_size * if enpassantable { EGTB_EP_SLOTS } else { 1 };

        Ok(Layout {
            material,
            attrs,
            seq,
            enpassantable,
            base_size,
            size,
        })
    }

    fn parse_order(
        material: &Material,
        order: u32,
        len: usize,
    ) -> EgtbResult<ArrayVec<u8, MAX_ATTRS>> {
        let mut seq: ArrayVec<u8, MAX_ATTRS> = (0..len as u8).collect();
        if order == 0 {
            return Ok(seq);
        }

        let invalid = || EgtbError::InvalidOrder {
            name: material.name(),
            order,
        };
        if len > MAX_ORDERED_ATTRS {
            return Err(invalid());
        }
        let mut used = [false; MAX_ORDERED_ATTRS];
        for (i, slot) in seq.iter_mut().enumerate() {
            let j = ((order >> (3 * i)) & 0x7) as usize;
            if j >= len || used[j] {
                return Err(invalid());
            }
            used[j] = true;
            *slot = j as u8;
        }
        Ok(seq)
    }

    /// Build a layout from an explicit slot list in declaration order.
    /// Only tests use this; signatures always go through [`Layout::new`].
    #[cfg(test)]
    pub(crate) fn with_attrs(
        material: &Material,
        kinds: &[(AttrKind, Side)],
        enpassantable: bool,
    ) -> Layout {
        let mut attrs: ArrayVec<IndexAttr, MAX_ATTRS> = kinds
            .iter()
            .map(|&(kind, side)| IndexAttr {
                kind,
                side,
                mult: 0,
            })
            .collect();
        let seq: ArrayVec<u8, MAX_ATTRS> = (0..attrs.len() as u8).collect();
        let mut running = 1u64;
        for &i in seq.iter().rev() {
            attrs[i as usize].mult = running;
            running *= attrs[i as usize].kind.size();
        }
        let base_size = running;
        Layout {
            material: *material,
            attrs,
            seq,
            enpassantable,
            base_size,
            size: base_size * if enpassantable { EGTB_EP_SLOTS } else { 1 },
        }
    }

    /// The signature, stronger side first.
    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn attrs(&self) -> &[IndexAttr] {
        &self.attrs
    }

    /// Attribute indices in walk order.
    pub fn seq(&self) -> impl Iterator<Item = usize> + '_ {
        self.seq.iter().map(|&i| i as usize)
    }

    pub fn is_enpassantable(&self) -> bool {
        self.enpassantable
    }

    /// Stream size without the en-passant slots.
    pub fn base_size(&self) -> u64 {
        self.base_size
    }

    /// Number of cells in one side's data stream.
    pub fn size(&self) -> u64 {
        self.size
    }
}
