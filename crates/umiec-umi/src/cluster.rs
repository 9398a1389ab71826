//! # UMI Clustering
//!
//! Partitions the distinct UMI barcodes observed at one genomic position into clusters, each
//! cluster standing for one source molecule. Two barcodes are *adjacent* when their distance
//! (see [`DistanceMetric`]) is at most the configured threshold.
//!
//! ## Policies
//!
//! ### Connected components (default)
//!
//! Builds the undirected adjacency graph and takes its connected components with a
//! union-find. Clustering is transitive: if `A~B` and `B~C` then `A`, `B` and `C` share a
//! cluster even when `A` and `C` are further apart than the threshold. With low thresholds
//! and short barcodes this rarely merges distinct molecules, and it never splits a molecule
//! whose barcode accumulated errors along a chain.
//!
//! ### Directional
//!
//! The directed adjacency method from UMI-tools. Barcodes are visited in descending count
//! order; each unassigned barcode roots a new cluster and captures its unassigned neighbours
//! breadth-first, but a neighbour with count `c` can only be captured from a node with count
//! `p` when `2c <= p + 1`. Two similarly abundant barcodes are therefore never merged.
//!
//! ## Determinism
//!
//! Barcodes are processed in lexicographic order, each cluster's representative is its most
//! abundant member (ties go to the lexicographically smallest barcode) and clusters are
//! returned by descending total count, then by representative. The same input always
//! yields the same clusters in the same order.
//!
//! ## Candidate search
//!
//! Below [`ClusterOptions::index_threshold`] distinct barcodes every pair is compared.
//! Above it a [`BkTree`] prunes the comparisons; the resulting clusters are identical.

use std::collections::VecDeque;

use ahash::AHashMap;
use log::debug;

use crate::distance::{DistanceError, DistanceMetric};
use crate::index::{BkTree, DEFAULT_INDEX_THRESHOLD};

/// How adjacent barcodes are merged into clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ClusterPolicy {
    /// Connected components of the undirected adjacency graph
    #[default]
    Connected,
    /// UMI-tools directed adjacency with a count gradient
    Directional,
}

/// Parameters for [`UmiClusterer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOptions {
    /// Maximum distance at which two barcodes are adjacent. Zero means identity clustering.
    pub threshold: usize,
    /// Distance metric used to compare barcodes
    pub metric: DistanceMetric,
    /// Merge policy
    pub policy: ClusterPolicy,
    /// Number of distinct barcodes from which a BK-tree is used for neighbour search
    pub index_threshold: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            threshold: 1,
            metric: DistanceMetric::default(),
            policy: ClusterPolicy::default(),
            index_threshold: DEFAULT_INDEX_THRESHOLD,
        }
    }
}

/// A group of barcodes attributed to one source molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmiCluster {
    /// The most abundant member barcode
    pub representative: String,
    /// Member barcodes with their read counts, sorted by barcode
    pub members: Vec<(String, usize)>,
    /// Sum of member counts
    pub total_count: usize,
}

impl UmiCluster {
    /// The number of reads in this cluster.
    #[must_use]
    pub fn family_size(&self) -> usize {
        self.total_count
    }

    /// Returns true if `barcode` is one of the members.
    #[must_use]
    pub fn contains(&self, barcode: &str) -> bool {
        self.members.binary_search_by(|(b, _)| b.as_str().cmp(barcode)).is_ok()
    }
}

/// Result of assigning raw per-read barcodes to clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// The clusters, in canonical order
    pub clusters: Vec<UmiCluster>,
    /// For each input barcode, the index of its cluster in `clusters`
    pub cluster_of: Vec<usize>,
}

/// Disjoint-set forest with path halving and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// Finds adjacent barcodes, either by pairwise comparison or through a BK-tree.
enum Neighbours<'a> {
    Linear { barcodes: &'a [&'a str], metric: DistanceMetric },
    Indexed { barcodes: &'a [&'a str], tree: BkTree<'a> },
}

impl<'a> Neighbours<'a> {
    fn new(barcodes: &'a [&'a str], options: &ClusterOptions) -> Result<Self, DistanceError> {
        if barcodes.len() >= options.index_threshold {
            debug!("Building BK-tree over {} distinct barcodes", barcodes.len());
            Ok(Self::Indexed { barcodes, tree: BkTree::build(barcodes, options.metric)? })
        } else {
            Ok(Self::Linear { barcodes, metric: options.metric })
        }
    }

    /// Indices of all barcodes within `threshold` of barcode `i` (excluding `i`).
    fn of(&self, i: usize, threshold: usize) -> Result<Vec<usize>, DistanceError> {
        match self {
            Self::Linear { barcodes, metric } => {
                let mut hits = Vec::new();
                for (j, other) in barcodes.iter().enumerate() {
                    if j != i && metric.within(barcodes[i], other, threshold)? {
                        hits.push(j);
                    }
                }
                Ok(hits)
            }
            Self::Indexed { barcodes, tree } => {
                let mut hits = tree.find_within(barcodes[i], threshold)?;
                hits.retain(|&j| j != i);
                Ok(hits)
            }
        }
    }
}

/// Clusters UMI barcodes observed at a single position.
#[derive(Debug, Clone, Default)]
pub struct UmiClusterer {
    options: ClusterOptions,
}

impl UmiClusterer {
    /// Creates a clusterer with the given options.
    #[must_use]
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    /// The options this clusterer was built with.
    #[must_use]
    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Clusters a barcode to read-count map.
    ///
    /// Repeated barcodes in the input have their counts summed. An empty input yields no
    /// clusters.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::LengthMismatch`] when the Hamming metric is used and the
    /// barcodes do not all have the same length.
    pub fn cluster<'b, I>(&self, counts: I) -> Result<Vec<UmiCluster>, DistanceError>
    where
        I: IntoIterator<Item = (&'b str, usize)>,
    {
        let mut merged: AHashMap<&str, usize> = AHashMap::new();
        for (barcode, count) in counts {
            *merged.entry(barcode).or_insert(0) += count;
        }
        let mut distinct: Vec<(&str, usize)> = merged.into_iter().collect();
        distinct.sort_unstable_by(|a, b| a.0.cmp(b.0));
        self.cluster_sorted(&distinct)
    }

    /// Assigns each raw per-read barcode to a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError::LengthMismatch`] under the same conditions as
    /// [`UmiClusterer::cluster`].
    pub fn assign<S: AsRef<str>>(&self, umis: &[S]) -> Result<Assignment, DistanceError> {
        let clusters = self.cluster(umis.iter().map(|u| (u.as_ref(), 1)))?;
        let mut lookup: AHashMap<&str, usize> = AHashMap::new();
        for (idx, cluster) in clusters.iter().enumerate() {
            for (barcode, _) in &cluster.members {
                lookup.insert(barcode.as_str(), idx);
            }
        }
        let cluster_of = umis.iter().map(|u| lookup[u.as_ref()]).collect();
        Ok(Assignment { clusters, cluster_of })
    }

    fn cluster_sorted(&self, distinct: &[(&str, usize)]) -> Result<Vec<UmiCluster>, DistanceError> {
        if distinct.is_empty() {
            return Ok(Vec::new());
        }
        if self.options.metric == DistanceMetric::Hamming {
            let len = distinct[0].0.len();
            if let Some((other, _)) = distinct.iter().find(|(b, _)| b.len() != len) {
                return Err(DistanceError::LengthMismatch {
                    a: distinct[0].0.to_string(),
                    b: (*other).to_string(),
                });
            }
        }

        let groups = if self.options.threshold == 0 || distinct.len() == 1 {
            (0..distinct.len()).map(|i| vec![i]).collect()
        } else {
            let barcodes: Vec<&str> = distinct.iter().map(|(b, _)| *b).collect();
            let neighbours = Neighbours::new(&barcodes, &self.options)?;
            match self.options.policy {
                ClusterPolicy::Connected => self.connected(distinct.len(), &neighbours)?,
                ClusterPolicy::Directional => self.directional(distinct, &neighbours)?,
            }
        };

        let mut clusters: Vec<UmiCluster> =
            groups.into_iter().map(|group| build_cluster(distinct, &group)).collect();
        clusters.sort_by(|a, b| {
            b.total_count.cmp(&a.total_count).then_with(|| a.representative.cmp(&b.representative))
        });
        Ok(clusters)
    }

    fn connected(
        &self,
        n: usize,
        neighbours: &Neighbours<'_>,
    ) -> Result<Vec<Vec<usize>>, DistanceError> {
        let mut uf = UnionFind::new(n);
        for i in 0..n {
            for j in neighbours.of(i, self.options.threshold)? {
                if j > i {
                    uf.union(i, j);
                }
            }
        }
        let mut by_root: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for i in 0..n {
            let root = uf.find(i);
            by_root.entry(root).or_default().push(i);
        }
        Ok(by_root.into_values().collect())
    }

    fn directional(
        &self,
        distinct: &[(&str, usize)],
        neighbours: &Neighbours<'_>,
    ) -> Result<Vec<Vec<usize>>, DistanceError> {
        // Visit order: descending count, ties by barcode (distinct is already sorted by barcode)
        let mut order: Vec<usize> = (0..distinct.len()).collect();
        order.sort_by(|&a, &b| distinct[b].1.cmp(&distinct[a].1).then(a.cmp(&b)));

        let mut assigned = vec![false; distinct.len()];
        let mut groups = Vec::new();
        let mut queue = VecDeque::new();

        for root in order {
            if assigned[root] {
                continue;
            }
            assigned[root] = true;
            let mut group = vec![root];
            queue.push_back(root);

            while let Some(parent) = queue.pop_front() {
                let parent_count = distinct[parent].1;
                for child in neighbours.of(parent, self.options.threshold)? {
                    if !assigned[child] && 2 * distinct[child].1 <= parent_count + 1 {
                        assigned[child] = true;
                        group.push(child);
                        queue.push_back(child);
                    }
                }
            }
            groups.push(group);
        }
        Ok(groups)
    }
}

fn build_cluster(distinct: &[(&str, usize)], group: &[usize]) -> UmiCluster {
    let mut members: Vec<(String, usize)> =
        group.iter().map(|&i| (distinct[i].0.to_string(), distinct[i].1)).collect();
    members.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    let total_count = members.iter().map(|(_, c)| c).sum();
    // Members are sorted by barcode; keep the first of equally abundant members.
    let representative = members
        .iter()
        .fold(None::<&(String, usize)>, |best, m| match best {
            Some(b) if b.1 >= m.1 => Some(b),
            _ => Some(m),
        })
        .map(|(b, _)| b.clone())
        .unwrap_or_default();
    UmiCluster { representative, members, total_count }
}
