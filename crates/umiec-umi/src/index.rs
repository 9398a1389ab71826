//! BK-tree candidate index for neighbour searches over distinct barcodes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::distance::{DistanceError, DistanceMetric};

/// Minimum number of distinct barcodes at a position before the clusterer builds a
/// [`BkTree`] instead of comparing every pair.
pub const DEFAULT_INDEX_THRESHOLD: usize = 100;

struct BkNode {
    /// Index of the barcode in the caller's slice
    index: usize,
    children: BTreeMap<usize, Box<BkNode>>,
}

/// BK-tree (Burkhard-Keller tree) over a slice of barcodes.
///
/// Each child edge is labelled with the distance between the child and its parent. Because
/// both Hamming and Levenshtein distance satisfy the triangle inequality, a query for all
/// barcodes within `k` of `q` only needs to descend into children whose edge label lies in
/// `[d - k, d + k]`, where `d` is the distance from `q` to the current node.
///
/// The tree stores indices rather than strings; queries borrow the same barcode slice that
/// was used to build it.
pub struct BkTree<'a> {
    barcodes: &'a [&'a str],
    metric: DistanceMetric,
    root: Option<Box<BkNode>>,
}

impl<'a> BkTree<'a> {
    /// Builds a tree containing every barcode in `barcodes`.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::LengthMismatch`] if the metric is Hamming and the barcodes
    /// do not all have the same length.
    pub fn build(barcodes: &'a [&'a str], metric: DistanceMetric) -> Result<Self, DistanceError> {
        let mut tree = Self { barcodes, metric, root: None };
        for index in 0..barcodes.len() {
            tree.insert(index)?;
        }
        Ok(tree)
    }

    fn insert(&mut self, index: usize) -> Result<(), DistanceError> {
        let (barcodes, metric) = (self.barcodes, self.metric);
        let Some(mut node) = self.root.as_deref_mut() else {
            self.root = Some(Box::new(BkNode { index, children: BTreeMap::new() }));
            return Ok(());
        };
        loop {
            let dist = metric.distance(barcodes[node.index], barcodes[index])?;
            match node.children.entry(dist) {
                Entry::Vacant(slot) => {
                    slot.insert(Box::new(BkNode { index, children: BTreeMap::new() }));
                    return Ok(());
                }
                Entry::Occupied(child) => node = child.into_mut().as_mut(),
            }
        }
    }

    /// Returns the indices of all barcodes within `max_distance` of `query`, in
    /// ascending index order.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::LengthMismatch`] for Hamming queries whose length differs
    /// from the indexed barcodes.
    pub fn find_within(&self, query: &str, max_distance: usize) -> Result<Vec<usize>, DistanceError> {
        let mut results = Vec::new();
        let mut stack: Vec<&BkNode> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            let dist = self.metric.distance(self.barcodes[node.index], query)?;
            if dist <= max_distance {
                results.push(node.index);
            }
            let lo = dist.saturating_sub(max_distance);
            let hi = dist + max_distance;
            stack.extend(node.children.range(lo..=hi).map(|(_, child)| child.as_ref()));
        }
        results.sort_unstable();
        Ok(results)
    }

    /// Number of barcodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.root.is_some() { self.barcodes.len() } else { 0 }
    }

    /// Returns true if the tree holds no barcodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}
