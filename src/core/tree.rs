use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Category;

/// A category node with its children, as reconstructed from interval bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// An in-memory category hierarchy.
///
/// Built from a flat listing ordered by `left`; a node is a child of the
/// nearest preceding node whose interval still encloses it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub roots: Vec<CategoryNode>,
}

impl CategoryTree {
    /// Reconstructs the hierarchy from categories sorted by `left`.
    pub fn from_flat(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut roots: Vec<CategoryNode> = Vec::new();
        let mut stack: Vec<CategoryNode> = Vec::new();
        for category in categories {
            while stack
                .last()
                .is_some_and(|top| top.category.right < category.left)
            {
                if let Some(done) = stack.pop() {
                    attach(&mut stack, &mut roots, done);
                }
            }
            stack.push(CategoryNode {
                category,
                children: Vec::new(),
            });
        }
        while let Some(done) = stack.pop() {
            attach(&mut stack, &mut roots, done);
        }
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first iteration in `left` order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        let mut out = Vec::new();
        fn walk<'a>(nodes: &'a [CategoryNode], out: &mut Vec<&'a Category>) {
            for node in nodes {
                out.push(&node.category);
                walk(&node.children, out);
            }
        }
        walk(&self.roots, &mut out);
        out.into_iter()
    }

    pub fn as_map(&self) -> HashMap<i64, Category> {
        self.iter().map(|c| (c.id, c.clone())).collect()
    }

    /// Reassigns sequential interval bounds to the current node order,
    /// starting at `start`. Used before a bulk rewrite after reordering.
    pub fn renumber(&mut self, start: i64) -> i64 {
        fn walk(nodes: &mut [CategoryNode], mut next: i64) -> i64 {
            for node in nodes {
                node.category.left = next;
                next = walk(&mut node.children, next + 1);
                node.category.right = next;
                next += 1;
            }
            next
        }
        walk(&mut self.roots, start)
    }
}

fn attach(stack: &mut [CategoryNode], roots: &mut Vec<CategoryNode>, done: CategoryNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(done),
        None => roots.push(done),
    }
}
