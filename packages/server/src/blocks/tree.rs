use std::collections::HashMap;

use crate::entity::block;
use crate::error::AppError;

/// One node of a [`BlockForest`].
#[derive(Debug)]
pub struct BlockNode {
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub capacity: Option<i32>,
    children: Vec<i32>,
}

impl BlockNode {
    pub fn children(&self) -> &[i32] {
        &self.children
    }
}

/// Arena-indexed view of one attribute's block rows.
///
/// Nodes are indexed by id and linked through parent ids; no owning
/// pointers, so a structural cycle in the data cannot produce a cyclic
/// Rust structure. Construction validates the single-rooted-tree
/// invariant instead of trusting it.
pub struct BlockForest {
    nodes: HashMap<i32, BlockNode>,
    root: i32,
}

impl BlockForest {
    /// Build the forest from an attribute's block rows.
    ///
    /// Fails with `NotFound` when there is no root (the attribute is not
    /// block-typed or its root was never created) and with `Internal` on
    /// structural corruption (multiple roots, unknown parents, cycles).
    pub fn build(rows: Vec<block::Model>) -> Result<Self, AppError> {
        let mut nodes: HashMap<i32, BlockNode> = rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    BlockNode {
                        id: row.id,
                        parent_id: row.parent_id,
                        name: row.name,
                        capacity: row.capacity,
                        children: Vec::new(),
                    },
                )
            })
            .collect();

        let mut roots: Vec<i32> = Vec::new();
        let links: Vec<(i32, Option<i32>)> =
            nodes.values().map(|n| (n.id, n.parent_id)).collect();
        for (id, parent_id) in links {
            match parent_id {
                None => roots.push(id),
                Some(parent_id) => {
                    nodes
                        .get_mut(&parent_id)
                        .ok_or_else(|| {
                            AppError::Internal(format!(
                                "Block {id} references missing parent {parent_id}"
                            ))
                        })?
                        .children
                        .push(id);
                }
            }
        }

        let root = match roots.as_slice() {
            [] => return Err(AppError::NotFound("Attribute has no root block".into())),
            [root] => *root,
            _ => {
                return Err(AppError::Internal(format!(
                    "Attribute has {} root blocks",
                    roots.len()
                )));
            }
        };

        // Deterministic ordering for listings.
        for node in nodes.values_mut() {
            node.children.sort_unstable();
        }

        let forest = Self { nodes, root };

        // Every node must be reachable from the root; anything else means
        // a parent cycle detached from the tree.
        if forest.subtree_ids(root).len() != forest.nodes.len() {
            return Err(AppError::Internal(
                "Block tree contains a cycle or detached subtree".into(),
            ));
        }

        Ok(forest)
    }

    pub fn root_id(&self) -> i32 {
        self.root
    }

    pub fn get(&self, id: i32) -> Option<&BlockNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids on the path from `id` up to and including the root.
    pub fn ancestors(&self, id: i32) -> Vec<i32> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            path.push(node.id);
            current = node.parent_id.and_then(|p| self.nodes.get(&p));
        }
        path
    }

    /// Ids of `id` and all its descendants, preorder.
    pub fn subtree_ids(&self, id: i32) -> Vec<i32> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            // Reverse so the smallest child is visited first.
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Whether `id` lies within the subtree rooted at `ancestor`
    /// (inclusive).
    pub fn is_within(&self, id: i32, ancestor: i32) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Whether moving `id` under `new_parent` would create a cycle.
    pub fn reparent_would_cycle(&self, id: i32, new_parent: i32) -> bool {
        self.is_within(new_parent, id)
    }

    /// Subtree occupancy for every node, from a map of direct per-block
    /// assignment counts. Single post-order pass, O(nodes).
    pub fn occupancy_totals(&self, direct: &HashMap<i32, u64>) -> HashMap<i32, u64> {
        let mut totals: HashMap<i32, u64> = HashMap::with_capacity(self.nodes.len());
        // Children always appear after their parent in preorder, so a
        // reversed preorder walk accumulates bottom-up.
        for &id in self.subtree_ids(self.root).iter().rev() {
            let node = &self.nodes[&id];
            let mut total = direct.get(&id).copied().unwrap_or(0);
            for child in &node.children {
                total += totals.get(child).copied().unwrap_or(0);
            }
            totals.insert(id, total);
        }
        totals
    }
}
