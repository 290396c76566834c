//! Name-keyed resource tree.
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! [`NodeId`]. A node's parent link is a plain index, so it never owns its
//! parent, and nodes are only ever created as children of an existing node,
//! which rules out cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handlers::Handler;
use crate::routing::RegistrationError;
use crate::routing::path::NormalizedPath;

pub type NodeId = usize;

pub struct ResourceNode {
    name: String,
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl ResourceNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("handlers", &handlers)
            .finish()
    }
}

/// Result of walking the tree: the deepest existing node plus the segments
/// that had no matching child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    pub remaining: Vec<String>,
    pub directory: bool,
}

#[derive(Debug)]
pub struct ResourceTree {
    nodes: Vec<ResourceNode>,
    case_sensitive: bool,
}

impl ResourceTree {
    pub const ROOT: NodeId = 0;

    pub fn new(case_sensitive: bool) -> Self {
        Self {
            nodes: vec![ResourceNode {
                name: String::new(),
                parent: None,
                children: HashMap::new(),
                handlers: HashMap::new(),
            }],
            case_sensitive,
        }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Lookup key for a segment or handler name under this tree's case policy.
    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    pub fn node(&self, id: NodeId) -> &ResourceNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        self.nodes[parent].children.get(&self.key(segment)).copied()
    }

    pub fn handler(&self, node: NodeId, name: &str) -> Option<&Arc<dyn Handler>> {
        self.nodes[node].handlers.get(&self.key(name))
    }

    /// Attaches `handler` under `handler_name` at `path`, creating any
    /// missing nodes on the way.
    pub fn insert(
        &mut self,
        path: &str,
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        let path = NormalizedPath::parse(path);
        self.insert_segments(Self::ROOT, path.segments(), handler_name, handler)
    }

    pub fn insert_segments(
        &mut self,
        from: NodeId,
        segments: &[String],
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        if handler_name.is_empty() {
            return Err(RegistrationError::EmptyHandlerName);
        }

        let node = self.ensure_path(from, segments);
        let key = self.key(handler_name);
        if self.nodes[node].handlers.contains_key(&key) {
            return Err(RegistrationError::DuplicateHandler {
                path: self.path_of(node),
                name: handler_name.to_string(),
            });
        }
        self.nodes[node].handlers.insert(key, handler);
        Ok(node)
    }

    /// Walks `segments` from `from`, creating children as needed.
    pub fn ensure_path(&mut self, from: NodeId, segments: &[String]) -> NodeId {
        let mut current = from;
        for segment in segments {
            let key = self.key(segment);
            current = match self.nodes[current].children.get(&key) {
                Some(&child) => child,
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(ResourceNode {
                        name: segment.clone(),
                        parent: Some(current),
                        children: HashMap::new(),
                        handlers: HashMap::new(),
                    });
                    self.nodes[current].children.insert(key, id);
                    id
                }
            };
        }
        current
    }

    /// Normalizes `path` and walks it from the root.
    pub fn resolve(&self, path: &str) -> Resolution {
        let path = NormalizedPath::parse(path);
        let directory = path.is_directory();
        let (node, remaining) = self.resolve_segments(Self::ROOT, path.segments());
        Resolution {
            node,
            remaining,
            directory,
        }
    }

    /// Walks existing children from `from`, stopping at the deepest match.
    pub fn resolve_segments(&self, from: NodeId, segments: &[String]) -> (NodeId, Vec<String>) {
        let mut current = from;
        for (i, segment) in segments.iter().enumerate() {
            match self.child(current, segment) {
                Some(child) => current = child,
                None => return (current, segments[i..].to_vec()),
            }
        }
        (current, Vec::new())
    }

    /// Absolute path of a node, e.g. `/static/css`.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node != Self::ROOT {
                names.push(self.nodes[node].name.as_str());
            }
            current = self.nodes[node].parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::DynamicHandler;

    fn page() -> Arc<dyn Handler> {
        Arc::new(DynamicHandler::new(|_, _, _| Ok(())))
    }

    #[test]
    fn exact_path_resolves_with_no_remaining() {
        let mut tree = ResourceTree::new(true);
        let id = tree.insert("/a/b/c", "page", page()).unwrap();

        let res = tree.resolve("/a/b/c");
        assert_eq!(res.node, id);
        assert!(res.remaining.is_empty());
        assert!(tree.handler(res.node, "page").is_some());
    }

    #[test]
    fn missing_tail_is_returned_as_remaining() {
        let mut tree = ResourceTree::new(true);
        tree.insert("/a/b/c", "page", page()).unwrap();

        let res = tree.resolve("/a/b/x");
        assert_eq!(tree.path_of(res.node), "/a/b");
        assert_eq!(res.remaining, vec!["x".to_string()]);
    }

    #[test]
    fn normalization_applies_before_walking() {
        let mut tree = ResourceTree::new(true);
        tree.insert("/b", "page", page()).unwrap();
        tree.insert("/a/b", "page", page()).unwrap();

        assert_eq!(tree.resolve("/a/../b"), tree.resolve("/b"));
        assert_eq!(tree.resolve("/a/./b/"), tree.resolve("/a/b/"));
        assert!(tree.resolve("/a/./b/").directory);
    }

    #[test]
    fn case_policy_governs_matching() {
        let mut insensitive = ResourceTree::new(false);
        insensitive.insert("/Docs/Intro", "page", page()).unwrap();
        let res = insensitive.resolve("/docs/INTRO");
        assert!(res.remaining.is_empty());
        assert_eq!(insensitive.node(res.node).name(), "Intro");

        let mut sensitive = ResourceTree::new(true);
        sensitive.insert("/Docs/Intro", "page", page()).unwrap();
        let res = sensitive.resolve("/docs/Intro");
        assert_eq!(res.node, ResourceTree::ROOT);
        assert_eq!(res.remaining.len(), 2);
    }

    #[test]
    fn shared_prefixes_reuse_nodes() {
        let mut tree = ResourceTree::new(true);
        let a = tree.insert("/x/a", "one", page()).unwrap();
        let b = tree.insert("/x/b", "two", page()).unwrap();

        assert_eq!(tree.node(a).parent(), tree.node(b).parent());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn duplicate_handler_name_rejected() {
        let mut tree = ResourceTree::new(false);
        tree.insert("/x", "Index", page()).unwrap();

        let err = tree.insert("/x/", "index", page()).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateHandler { .. }));
    }
}
