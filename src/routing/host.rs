//! Virtual hosts and Host header resolution.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::HostConfig;
use crate::handlers::Handler;
use crate::routing::class::ResourceClass;
use crate::routing::path::NormalizedPath;
use crate::routing::tree::{NodeId, ResourceTree};
use crate::routing::{RegistrationError, RouteError};

/// Host name matching any request no other host claims.
pub const WILDCARD_HOST: &str = "*";

/// A handler selected for a request, with the path data it has to
/// interpret itself.
#[derive(Clone)]
pub struct Route {
    pub class: ResourceClass,
    pub handler: Arc<dyn Handler>,
    pub handler_name: String,
    pub node_path: String,
    pub remaining: Vec<String>,
    pub directory: bool,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("class", &self.class)
            .field("handler", &self.handler.kind())
            .field("handler_name", &self.handler_name)
            .field("node_path", &self.node_path)
            .field("remaining", &self.remaining)
            .field("directory", &self.directory)
            .finish()
    }
}

/// A named configuration scope owning its own resource tree.
#[derive(Debug)]
pub struct VirtualHost {
    name: String,
    aliases: Vec<String>,
    omit_resource_class: bool,
    default_class: ResourceClass,
    default_resource: String,
    tree: ResourceTree,
}

impl VirtualHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(&HostConfig::named(name))
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            name: config.name.clone(),
            aliases: config.aliases.clone(),
            omit_resource_class: config.omit_resource_class,
            default_class: config.default_class,
            default_resource: config.default_resource.clone(),
            tree: ResourceTree::new(config.case_sensitive),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD_HOST
    }

    pub fn case_sensitive(&self) -> bool {
        self.tree.is_case_sensitive()
    }

    pub fn omit_resource_class(&self) -> bool {
        self.omit_resource_class
    }

    pub fn default_resource(&self) -> &str {
        &self.default_resource
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    /// Splits the class off a path. With `omit_resource_class` every segment
    /// belongs to the host's default class.
    fn classify(&self, path: &NormalizedPath) -> Option<(ResourceClass, Vec<String>)> {
        let segments = path.segments();
        if self.omit_resource_class {
            return Some((self.default_class, segments.to_vec()));
        }
        let (first, rest) = segments.split_first()?;
        let class = ResourceClass::from_segment(first, self.case_sensitive())?;
        Some((class, rest.to_vec()))
    }

    /// Registers a handler at `path`, whose leading segment names the
    /// resource class unless the host omits it.
    pub fn insert(
        &mut self,
        path: &str,
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        let normalized = NormalizedPath::parse(path);
        let (class, segments) = self
            .classify(&normalized)
            .ok_or_else(|| RegistrationError::MissingResourceClass(path.to_string()))?;
        self.insert_in_class(class, &segments, handler_name, handler)
    }

    /// Registers a handler beneath an explicit class, `path` being relative
    /// to the class root.
    pub fn insert_class(
        &mut self,
        class: ResourceClass,
        path: &str,
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        let normalized = NormalizedPath::parse(path);
        self.insert_in_class(class, normalized.segments(), handler_name, handler)
    }

    fn insert_in_class(
        &mut self,
        class: ResourceClass,
        segments: &[String],
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        if handler.kind() != class.handler_kind() {
            return Err(RegistrationError::ClassMismatch {
                class,
                kind: handler.kind(),
            });
        }
        let class_root = self
            .tree
            .ensure_path(ResourceTree::ROOT, &[class.segment().to_string()]);
        self.tree
            .insert_segments(class_root, segments, handler_name, handler)
    }

    /// Resolves a request path to a handler.
    ///
    /// The deepest existing node is tried first: in the dynamic class a
    /// handler named after the next unresolved segment wins, then the
    /// host's default resource. If
    /// neither exists the walk climbs one level, handing the node's name
    /// back to the remaining segments, until the class root is passed.
    pub fn route(&self, path: &str) -> Result<Route, RouteError> {
        let normalized = NormalizedPath::parse(path);
        let not_found = || RouteError::NotFound(normalized.to_string());

        let (class, segments) = self.classify(&normalized).ok_or_else(not_found)?;
        let class_root = self
            .tree
            .child(ResourceTree::ROOT, class.segment())
            .ok_or_else(not_found)?;

        let (mut node, mut remaining) = self.tree.resolve_segments(class_root, &segments);
        loop {
            // File-backed classes map every remaining segment to a sub-path.
            let named = remaining
                .first()
                .filter(|_| !class.handler_kind().maps_sub_path());
            if let Some(first) = named {
                if let Some(handler) = self.tree.handler(node, first) {
                    let handler_name = remaining.remove(0);
                    return Ok(self.found(class, handler, handler_name, node, remaining, &normalized));
                }
            }
            if let Some(handler) = self.tree.handler(node, &self.default_resource) {
                let handler_name = self.default_resource.clone();
                return Ok(self.found(class, handler, handler_name, node, remaining, &normalized));
            }
            if node == class_root {
                debug!(host = %self.name, path = %normalized, "No handler on path");
                return Err(not_found());
            }
            let current = self.tree.node(node);
            remaining.insert(0, current.name().to_string());
            node = current.parent().ok_or_else(not_found)?;
        }
    }

    fn found(
        &self,
        class: ResourceClass,
        handler: &Arc<dyn Handler>,
        handler_name: String,
        node: NodeId,
        remaining: Vec<String>,
        path: &NormalizedPath,
    ) -> Route {
        Route {
            class,
            handler: Arc::clone(handler),
            handler_name,
            node_path: self.tree.path_of(node),
            remaining,
            directory: path.is_directory(),
        }
    }
}

/// Reduces a Host header value to a lookup key: port stripped, lowercase,
/// no trailing dot.
pub fn normalize_host(value: &str) -> String {
    let value = value.trim();
    let host = if let Some(rest) = value.strip_prefix('[') {
        // [v6]:port
        rest.split(']').next().unwrap_or(rest)
    } else {
        value.rsplit_once(':').map_or(value, |(host, _port)| host)
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Maps host names (and aliases) to virtual hosts.
#[derive(Debug, Default)]
pub struct HostResolver {
    names: HashMap<String, usize>,
    wildcard: Option<usize>,
}

impl HostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for the host at `index`.
    pub fn add(&mut self, name: &str, index: usize) -> Result<(), RegistrationError> {
        if name == WILDCARD_HOST {
            if self.wildcard.is_some() {
                return Err(RegistrationError::DuplicateHost(name.to_string()));
            }
            self.wildcard = Some(index);
            return Ok(());
        }

        let key = normalize_host(name);
        if key.is_empty() {
            return Err(RegistrationError::InvalidHostName(name.to_string()));
        }
        if self.names.contains_key(&key) {
            return Err(RegistrationError::DuplicateHost(name.to_string()));
        }
        self.names.insert(key, index);
        Ok(())
    }

    /// Exact name first, then the wildcard host.
    pub fn resolve(&self, host_header: Option<&str>) -> Result<usize, RouteError> {
        let key = host_header.map(normalize_host).unwrap_or_default();
        self.names
            .get(&key)
            .copied()
            .or(self.wildcard)
            .ok_or(RouteError::NoMatchingHost(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_normalization() {
        assert_eq!(normalize_host("Example.COM:8080"), "example.com");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:80"), "::1");
        assert_eq!(normalize_host(" a "), "a");
    }

    #[test]
    fn exact_then_wildcard() {
        let mut resolver = HostResolver::new();
        resolver.add("a.test", 0).unwrap();
        resolver.add(WILDCARD_HOST, 1).unwrap();

        assert_eq!(resolver.resolve(Some("A.test:80")).unwrap(), 0);
        assert_eq!(resolver.resolve(Some("b.test")).unwrap(), 1);
        assert_eq!(resolver.resolve(None).unwrap(), 1);
    }

    #[test]
    fn no_wildcard_means_no_match() {
        let mut resolver = HostResolver::new();
        resolver.add("a.test", 0).unwrap();

        let err = resolver.resolve(Some("b.test")).unwrap_err();
        assert!(matches!(err, RouteError::NoMatchingHost(_)));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut resolver = HostResolver::new();
        resolver.add("a.test", 0).unwrap();
        assert!(resolver.add("A.TEST", 1).is_err());
    }
}
