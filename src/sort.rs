// SPDX-License-Identifier: Apache-2.0

//! Sorts understood by the bit-vector layer and the per-context table that
//! interns them.

use std::collections::BTreeMap;
use std::fmt;

use crate::smt_bv_error::SmtBvError;

/// A fixed-width bit-vector sort. Two sorts are equal iff their widths are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BvSort {
    width: u32,
}

impl BvSort {
    pub(crate) fn new(width: u32) -> Result<Self, SmtBvError> {
        if width == 0 {
            return Err(SmtBvError(
                "bit-vector sorts must be at least one bit wide".to_string(),
            ));
        }
        Ok(BvSort { width })
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl fmt::Display for BvSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(_ BitVec {})", self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortKind {
    Bool,
    Int,
    BitVec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
    BitVec(BvSort),
}

impl Sort {
    pub fn kind(&self) -> SortKind {
        match self {
            Sort::Bool => SortKind::Bool,
            Sort::Int => SortKind::Int,
            Sort::BitVec(_) => SortKind::BitVec,
        }
    }

    pub fn as_bv(&self) -> Option<BvSort> {
        match self {
            Sort::BitVec(sort) => Some(*sort),
            _ => None,
        }
    }

    pub fn bv_width(&self) -> Option<u32> {
        self.as_bv().map(|sort| sort.width())
    }
}

impl From<BvSort> for Sort {
    fn from(sort: BvSort) -> Self {
        Sort::BitVec(sort)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::BitVec(sort) => write!(f, "{}", sort),
        }
    }
}

/// Interns one `BvSort` per requested width. Each context owns its own
/// registry; nothing here is process-wide.
#[derive(Debug, Default)]
pub(crate) struct SortRegistry {
    bv_sorts: BTreeMap<u32, BvSort>,
}

impl SortRegistry {
    pub(crate) fn intern_bv(&mut self, width: u32) -> Result<BvSort, SmtBvError> {
        if let Some(sort) = self.bv_sorts.get(&width) {
            return Ok(*sort);
        }
        let sort = BvSort::new(width)?;
        log::trace!("interning bit-vector sort of width {}", width);
        self.bv_sorts.insert(width, sort);
        Ok(sort)
    }

    /// Records a sort that was derived by an operator rule rather than
    /// requested directly, e.g. the result of a `concat`.
    pub(crate) fn intern(&mut self, sort: Sort) -> Result<Sort, SmtBvError> {
        match sort {
            Sort::BitVec(bv) => self.intern_bv(bv.width()).map(Sort::BitVec),
            other => Ok(other),
        }
    }

    pub(crate) fn bv_widths(&self) -> Vec<u32> {
        self.bv_sorts.keys().copied().collect()
    }
}
