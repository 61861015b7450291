//! Record ordering policy.

use std::cmp::Ordering;

/// Ordering policy shared by run sorting and run merging.
///
/// Keys are always compared as byte strings. `reverse` inverts the key comparison only,
/// `stable` requests that records with equal keys keep their original relative order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SortOrder {
    pub reverse: bool,
    pub stable: bool,
}

impl SortOrder {
    pub fn new(reverse: bool, stable: bool) -> Self {
        SortOrder { reverse, stable }
    }

    /// Compares two keys taking sort direction into account.
    pub fn compare_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        let ordering = a.cmp(b);
        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }

    /// Total order used when stability is not requested: keys first, raw records on ties.
    /// Both comparisons follow the sort direction.
    pub fn compare_unstable(&self, a: (&[u8], &[u8]), b: (&[u8], &[u8])) -> Ordering {
        let ordering = a.0.cmp(b.0).then_with(|| a.1.cmp(b.1));
        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }
}
