//! Compact arena tree used for prediction.
//!
//! Nodes are stored in breadth-first order so that the children of a node
//! occupy a contiguous index range. Child links are plain indices into the
//! arena; there are no back-pointers.

use std::collections::VecDeque;
use std::ops::Range;

use super::layout::TreeVariant;
use super::node::{Node, NodeStats};
use super::predicate::Predicate;
use super::NodeId;

/// Errors raised when a tree is built or read with the wrong layout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("node {node} holds {found} stats but the tree was built as {expected}")]
    VariantMismatch {
        node: u32,
        expected: TreeVariant,
        found: TreeVariant,
    },
    #[error("record has {actual} attributes; the {variant} layout expects {expected}")]
    RecordLength {
        variant: TreeVariant,
        expected: usize,
        actual: usize,
    },
    #[error("malformed predicate header: {0}")]
    MalformedPredicate(String),
    #[error("malformed {variant} record at position {position}: {reason}")]
    MalformedRecord {
        variant: TreeVariant,
        position: usize,
        reason: String,
    },
}

/// Structural validation errors for [`CompactTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    EmptyTree,
    /// The root carries a predicate.
    ConditionalRoot,
    /// A non-root node has no predicate.
    UnconditionalChild { node: NodeId },
    /// A child range runs past the end of the arena.
    ChildOutOfBounds { node: NodeId, end: u32, n_nodes: usize },
    /// Children must come after their parent in breadth-first order.
    BackwardChild { node: NodeId, child: NodeId },
    /// A node is referenced by more than one parent.
    DuplicateVisit { node: NodeId },
    /// A node is not reachable from the root.
    UnreachableNode { node: NodeId },
}

/// One node of a [`CompactTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompactNode {
    id: u32,
    predicate: Option<Predicate>,
    stats: NodeStats,
    first_child: NodeId,
    n_children: u32,
}

impl CompactNode {
    /// Node id from the model export.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.n_children == 0
    }

    #[inline]
    pub fn n_children(&self) -> usize {
        self.n_children as usize
    }
}

/// Immutable arena tree of a single variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactTree {
    variant: TreeVariant,
    nodes: Box<[CompactNode]>,
}

impl CompactTree {
    /// Flatten a node graph into an arena.
    ///
    /// Fails fast if any node's stats do not belong to `variant`.
    pub fn build(root: &Node, variant: TreeVariant) -> Result<Self, LayoutError> {
        let mut nodes = Vec::new();
        let mut queue = VecDeque::from([root]);
        let mut next_index: NodeId = 1;

        while let Some(node) = queue.pop_front() {
            let found = node.stats.variant();
            if found != variant {
                return Err(LayoutError::VariantMismatch {
                    node: node.id,
                    expected: variant,
                    found,
                });
            }

            let n_children = node.children.len() as u32;
            nodes.push(CompactNode {
                id: node.id,
                predicate: node.predicate.clone(),
                stats: node.stats.clone(),
                first_child: next_index,
                n_children,
            });
            next_index += n_children;
            queue.extend(node.children.iter());
        }

        Ok(Self {
            variant,
            nodes: nodes.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn variant(&self) -> TreeVariant {
        self.variant
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        0
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    #[inline]
    pub fn node(&self, node: NodeId) -> &CompactNode {
        &self.nodes[node as usize]
    }

    /// Index range of the children of `node`.
    #[inline]
    pub fn child_ids(&self, node: NodeId) -> Range<NodeId> {
        let n = self.node(node);
        n.first_child..n.first_child + n.n_children
    }

    /// Predicate of the first child: the field a node splits on.
    pub fn split_field(&self, node: NodeId) -> Option<&str> {
        self.child_ids(node)
            .find_map(|child| self.node(child).predicate())
            .map(Predicate::field)
    }

    /// Variant-checked node access.
    pub fn get_node(&self, node: NodeId, variant: TreeVariant) -> Result<&CompactNode, LayoutError> {
        if variant != self.variant {
            return Err(LayoutError::VariantMismatch {
                node: self.node(node).id,
                expected: variant,
                found: self.variant,
            });
        }
        Ok(self.node(node))
    }

    /// Variant-checked predicate access.
    pub fn get_predicate(
        &self,
        node: NodeId,
        variant: TreeVariant,
    ) -> Result<Option<&Predicate>, LayoutError> {
        self.get_node(node, variant).map(CompactNode::predicate)
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for node in 0..self.nodes.len() as NodeId {
            let d = depths[node as usize];
            max_depth = max_depth.max(d);
            for child in self.child_ids(node) {
                if let Some(slot) = depths.get_mut(child as usize) {
                    *slot = d + 1;
                }
            }
        }
        max_depth
    }

    /// Validate structural invariants.
    ///
    /// Trees produced by [`build`](Self::build) always pass; this guards
    /// arenas assembled by other means and is used in tests.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        if self.nodes[0].predicate.is_some() {
            return Err(TreeValidationError::ConditionalRoot);
        }

        let mut visited = vec![false; n_nodes];
        visited[0] = true;

        for (i, node) in self.nodes.iter().enumerate() {
            let i = i as NodeId;
            let end = node.first_child + node.n_children;
            if end as usize > n_nodes {
                return Err(TreeValidationError::ChildOutOfBounds {
                    node: i,
                    end,
                    n_nodes,
                });
            }
            for child in node.first_child..end {
                if child <= i {
                    return Err(TreeValidationError::BackwardChild { node: i, child });
                }
                if std::mem::replace(&mut visited[child as usize], true) {
                    return Err(TreeValidationError::DuplicateVisit { node: child });
                }
                if self.nodes[child as usize].predicate.is_none() {
                    return Err(TreeValidationError::UnconditionalChild { node: child });
                }
            }
        }

        match visited.iter().position(|&v| !v) {
            Some(node) => Err(TreeValidationError::UnreachableNode { node: node as NodeId }),
            None => Ok(()),
        }
    }

    /// Rebuild the recursive node graph rooted at `node`.
    pub fn to_node(&self, node: NodeId) -> Node {
        let n = self.node(node);
        Node {
            id: n.id,
            predicate: n.predicate.clone(),
            stats: n.stats.clone(),
            children: self.child_ids(node).map(|c| self.to_node(c)).collect(),
        }
    }
}
