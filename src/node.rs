// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::point::Point;

/// Whether a node sits on a cell corner or inside a cell edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Cell corner. Carries its own slowness under the nodal law.
    Primary,
    /// Evenly spaced node on an edge between two primary nodes.
    Secondary,
}

/// A vertex of the shortest-path graph.
///
/// Nodes are immutable once the grid is built. Everything that changes
/// during a propagation run (times, parents, flags) lives in the run's
/// scratch context, indexed by [`GridNode::index`].
#[derive(Debug, Clone)]
pub struct GridNode<const N: usize> {
    position: Point<N>,
    index: usize,
    kind: NodeKind,
    owners: Vec<usize>,
}

impl<const N: usize> GridNode<N> {
    pub(crate) fn new(position: Point<N>, index: usize, kind: NodeKind, owners: Vec<usize>) -> Self {
        GridNode {
            position,
            index,
            kind,
            owners,
        }
    }

    /// Physical position.
    pub fn position(&self) -> &Point<N> {
        &self.position
    }

    /// Position in the grid's node sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Primary or secondary.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// True for cell corners.
    pub fn is_primary(&self) -> bool {
        self.kind == NodeKind::Primary
    }

    /// Cells this node lies on the boundary of.
    pub fn owners(&self) -> &[usize] {
        &self.owners
    }
}

/// Reference to a graph vertex during one propagation run.
///
/// Ordering is used as the tie-break between equal times in the priority
/// queue, so grid nodes come before synthetic sources and lower indices
/// before higher ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeRef {
    /// A node of the grid, by index.
    Grid(usize),
    /// A synthetic source node of the current run, by index.
    Source(usize),
}
