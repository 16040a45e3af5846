//! In-memory forest of requirement, test and test-case nodes.
//!
//! The [`Forest`] owns every node. Structure is stored separately from
//! content: each node's parent is a non-owning [`NodeId`] lookup, and each
//! node's children are an ordered list of ids. Ownership therefore runs
//! strictly top-down, from the forest to its nodes.

use std::collections::HashMap;

use thiserror::Error;
use tracing::instrument;

use crate::domain::{Node, NodeId};

/// Structural links of a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Links {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An ordered forest of [`Node`]s.
///
/// Insertion order is tree order is display order. Identifiers are unique
/// across the whole forest.
///
/// Levels are derived data. Every structural change discards them, and
/// [`Forest::level`] returns `None` until [`Forest::assign_levels`] is run
/// again.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    /// Node content, keyed by id.
    nodes: HashMap<NodeId, Node>,

    /// Parent and children of each node, keyed by id.
    links: HashMap<NodeId, Links>,

    /// The root nodes, in order.
    roots: Vec<NodeId>,

    /// Dotted positions, valid only since the last `assign_levels`.
    levels: HashMap<NodeId, String>,
}

/// Errors that can occur when changing the shape of the forest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForestError {
    /// A node with the same id is already in the forest.
    #[error("a node with id '{0}' already exists")]
    DuplicateId(NodeId),
    /// The referenced node is not in the forest.
    #[error("node '{0}' not found")]
    NotFound(NodeId),
    /// Moving the node would make it its own ancestor.
    #[error("moving '{node}' under '{parent}' would create a cycle")]
    Cycle {
        /// The node being moved.
        node: NodeId,
        /// The requested new parent.
        parent: NodeId,
    },
}

impl Forest {
    /// Creates an empty forest with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(capacity),
            links: HashMap::with_capacity(capacity),
            roots: Vec::new(),
            levels: HashMap::new(),
        }
    }

    /// The number of nodes in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a node with this id is in the forest.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Looks up a node for in-place editing.
    ///
    /// Editing content never changes the structure, so levels stay valid.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// The ids of the root nodes, in order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The ids of a node's children, in order.
    ///
    /// Unknown ids have no children.
    #[must_use]
    pub fn children(&self, id: &str) -> &[NodeId] {
        self.links
            .get(id)
            .map_or(&[], |links| links.children.as_slice())
    }

    /// The parent of a node, or `None` for roots and unknown ids.
    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&NodeId> {
        self.links.get(id)?.parent.as_ref()
    }

    /// The dotted position of a node, e.g. `1.2.3`.
    ///
    /// Returns `None` if the node is unknown, or if the structure has changed
    /// since [`Forest::assign_levels`] last ran.
    #[must_use]
    pub fn level(&self, id: &str) -> Option<&str> {
        self.levels.get(id).map(String::as_str)
    }

    /// Appends a node to the end of the roots.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::DuplicateId`] if the id is taken.
    pub fn push_root(&mut self, node: Node) -> Result<NodeId, ForestError> {
        let id = self.register(node, None)?;
        self.roots.push(id.clone());
        Ok(id)
    }

    /// Appends a node to the end of `parent`'s children.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if `parent` is not in the forest, or
    /// [`ForestError::DuplicateId`] if the node's id is taken.
    pub fn push_child(&mut self, parent: &str, node: Node) -> Result<NodeId, ForestError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, node)
    }

    /// Inserts a node among `parent`'s children at `index`.
    ///
    /// An index past the end appends.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if `parent` is not in the forest, or
    /// [`ForestError::DuplicateId`] if the node's id is taken.
    pub fn insert_child(
        &mut self,
        parent: &str,
        index: usize,
        node: Node,
    ) -> Result<NodeId, ForestError> {
        let parent_id = self
            .nodes
            .get_key_value(parent)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ForestError::NotFound(NodeId::from(parent)))?;

        let id = self.register(node, Some(parent_id.clone()))?;
        let siblings = &mut self.links.entry(parent_id).or_default().children;
        let index = index.min(siblings.len());
        siblings.insert(index, id.clone());
        Ok(id)
    }

    /// Appends a node under `parent`, or at the roots if `parent` is `None`.
    ///
    /// # Errors
    ///
    /// See [`Forest::push_root`] and [`Forest::push_child`].
    pub fn push(&mut self, parent: Option<&str>, node: Node) -> Result<NodeId, ForestError> {
        match parent {
            Some(parent) => self.push_child(parent, node),
            None => self.push_root(node),
        }
    }

    /// Detaches a node and all of its descendants.
    ///
    /// Returns the removed nodes in pre-order (the node itself first), or
    /// `None` if the id is not in the forest.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: &str) -> Option<Vec<Node>> {
        let id = self.nodes.get_key_value(id)?.0.clone();
        self.unlink(&id);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let links = self.links.remove(&current).unwrap_or_default();
            if let Some(node) = self.nodes.remove(&current) {
                removed.push(node);
            }
            stack.extend(links.children.into_iter().rev());
        }

        self.levels.clear();
        Some(removed)
    }

    /// Moves a node (with its subtree) to the end of `new_parent`'s children,
    /// or to the end of the roots if `new_parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if either node is missing, or
    /// [`ForestError::Cycle`] if `new_parent` is the node itself or one of
    /// its descendants.
    #[instrument(level = "debug", skip(self))]
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), ForestError> {
        let id = self
            .nodes
            .get_key_value(id)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| ForestError::NotFound(NodeId::from(id)))?;

        let new_parent = match new_parent {
            Some(parent) => {
                let parent = self
                    .nodes
                    .get_key_value(parent)
                    .map(|(id, _)| id.clone())
                    .ok_or_else(|| ForestError::NotFound(NodeId::from(parent)))?;
                if self.is_ancestor_or_self(&id, &parent) {
                    return Err(ForestError::Cycle { node: id, parent });
                }
                Some(parent)
            }
            None => None,
        };

        self.unlink(&id);
        match &new_parent {
            Some(parent) => self
                .links
                .entry(parent.clone())
                .or_default()
                .children
                .push(id.clone()),
            None => self.roots.push(id.clone()),
        }
        self.links.entry(id).or_default().parent = new_parent;
        self.levels.clear();
        Ok(())
    }

    /// Recomputes the level of every node from the current structure.
    ///
    /// Roots are numbered `1`, `2`, ... and each child's level is its
    /// parent's level followed by `.` and its 1-based position. The walk
    /// also re-establishes every child's parent link. Running it twice
    /// without a structural change yields identical levels.
    #[instrument(level = "debug", skip(self))]
    pub fn assign_levels(&mut self) {
        let mut levels = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<(Option<NodeId>, NodeId, String)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(index, id)| (None, id.clone(), (index + 1).to_string()))
            .collect();

        while let Some((parent, id, level)) = stack.pop() {
            let links = self.links.entry(id.clone()).or_default();
            links.parent = parent;
            for (index, child) in links.children.iter().enumerate().rev() {
                stack.push((Some(id.clone()), child.clone(), format!("{level}.{}", index + 1)));
            }
            levels.insert(id, level);
        }

        self.levels = levels;
    }

    /// Walks the forest in pre-order: each root, then its full subtree, then
    /// the next root.
    ///
    /// Yields each node with its depth (0 for roots).
    pub fn iter(&self) -> impl Iterator<Item = (&Node, usize)> + '_ {
        let mut stack: Vec<(&NodeId, usize)> = self.roots.iter().rev().map(|id| (id, 0)).collect();

        std::iter::from_fn(move || {
            loop {
                let (id, depth) = stack.pop()?;
                let children = self.children(id);
                stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
                if let Some(node) = self.nodes.get(id) {
                    return Some((node, depth));
                }
            }
        })
    }

    /// Adds the node's content and links, without placing it in any
    /// sibling list.
    fn register(&mut self, node: Node, parent: Option<NodeId>) -> Result<NodeId, ForestError> {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            return Err(ForestError::DuplicateId(id));
        }

        self.nodes.insert(id.clone(), node);
        self.links.insert(
            id.clone(),
            Links {
                parent,
                children: Vec::new(),
            },
        );
        self.levels.clear();
        Ok(id)
    }

    /// Removes `id` from its parent's children (or from the roots).
    fn unlink(&mut self, id: &NodeId) {
        let parent = self.links.get_mut(id).and_then(|links| links.parent.take());
        let siblings = match parent {
            Some(parent) => match self.links.get_mut(&parent) {
                Some(links) => &mut links.children,
                None => return,
            },
            None => &mut self.roots,
        };
        siblings.retain(|sibling| sibling != id);
    }

    /// Whether `ancestor` is `node` itself or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

impl PartialEq for Forest {
    /// Two forests are equal when they have the same roots, and every node
    /// has the same content and the same children in the same order.
    /// Levels are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.roots == other.roots
            && self.nodes == other.nodes
            && self.nodes.keys().all(|id| {
                self.children(id) == other.children(id) && self.parent(id) == other.parent(id)
            })
    }
}
