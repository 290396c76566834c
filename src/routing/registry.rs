use std::sync::Arc;

use tracing::info;

use crate::config::HostConfig;
use crate::handlers::Handler;
use crate::routing::class::ResourceClass;
use crate::routing::host::{HostResolver, Route, VirtualHost};
use crate::routing::tree::NodeId;
use crate::routing::{RegistrationError, RouteError};

/// All virtual hosts known to one server instance.
///
/// Filled during single-threaded startup, then shared behind an `Arc` and
/// only read.
#[derive(Debug, Default)]
pub struct Registry {
    hosts: Vec<VirtualHost>,
    resolver: HostResolver,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_host(&mut self, config: &HostConfig) -> Result<(), RegistrationError> {
        let index = self.hosts.len();
        self.resolver.add(&config.name, index)?;
        for alias in &config.aliases {
            self.resolver.add(alias, index)?;
        }
        self.hosts.push(VirtualHost::from_config(config));
        info!(host = %config.name, aliases = ?config.aliases, "Registered virtual host");
        Ok(())
    }

    pub fn host(&self, name: &str) -> Option<&VirtualHost> {
        self.hosts.iter().find(|h| h.name() == name)
    }

    fn host_mut(&mut self, name: &str) -> Result<&mut VirtualHost, RegistrationError> {
        self.hosts
            .iter_mut()
            .find(|h| h.name() == name)
            .ok_or_else(|| RegistrationError::UnknownHost(name.to_string()))
    }

    pub fn hosts(&self) -> &[VirtualHost] {
        &self.hosts
    }

    /// Attaches a handler to `host` at `path` (class segment included unless
    /// the host omits it).
    pub fn insert(
        &mut self,
        host: &str,
        path: &str,
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        self.host_mut(host)?.insert(path, handler_name, handler)
    }

    /// Attaches a handler beneath an explicit resource class of `host`.
    pub fn insert_class(
        &mut self,
        host: &str,
        class: ResourceClass,
        path: &str,
        handler_name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<NodeId, RegistrationError> {
        self.host_mut(host)?
            .insert_class(class, path, handler_name, handler)
    }

    /// Picks the virtual host for a Host header value.
    pub fn resolve_host(&self, host_header: Option<&str>) -> Result<&VirtualHost, RouteError> {
        let index = self.resolver.resolve(host_header)?;
        Ok(&self.hosts[index])
    }

    /// Host resolution followed by path routing.
    pub fn route(&self, host_header: Option<&str>, path: &str) -> Result<(&VirtualHost, Route), RouteError> {
        let host = self.resolve_host(host_header)?;
        let route = host.route(path)?;
        Ok((host, route))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{DynamicHandler, EmbeddedHandler, HandlerKind};

    fn page() -> Arc<dyn Handler> {
        Arc::new(DynamicHandler::new(|_, _, _| Ok(())))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_host(&HostConfig::named("a.test")).unwrap();
        registry
    }

    #[test]
    fn named_handler_consumes_segment() {
        let mut registry = registry();
        registry.insert("a.test", "/dynamic/app", "list", page()).unwrap();

        let (_, route) = registry.route(Some("a.test"), "/dynamic/app/list/2024").unwrap();
        assert_eq!(route.handler_name, "list");
        assert_eq!(route.node_path, "/dynamic/app");
        assert_eq!(route.remaining, vec!["2024".to_string()]);
        assert_eq!(route.class, ResourceClass::Dynamic);
    }

    #[test]
    fn default_resource_catches_trailing_segments() {
        let mut registry = registry();
        registry.insert("a.test", "/dynamic/blog", "index", page()).unwrap();

        let (_, route) = registry.route(Some("a.test"), "/dynamic/blog/2024/hello").unwrap();
        assert_eq!(route.handler_name, "index");
        assert_eq!(route.remaining, vec!["2024".to_string(), "hello".to_string()]);
    }

    #[test]
    fn climbs_to_ancestor_handler() {
        let mut registry = registry();
        registry.insert("a.test", "/dynamic/docs", "index", page()).unwrap();
        // Intermediate node without handlers of its own.
        registry.insert("a.test", "/dynamic/docs/api/v2", "index", page()).unwrap();

        let (_, route) = registry.route(Some("a.test"), "/dynamic/docs/api/v1").unwrap();
        assert_eq!(route.node_path, "/dynamic/docs");
        assert_eq!(route.remaining, vec!["api".to_string(), "v1".to_string()]);
    }

    #[test]
    fn unknown_class_or_path_is_not_found() {
        let mut registry = registry();
        registry.insert("a.test", "/dynamic/app", "index", page()).unwrap();

        assert!(matches!(
            registry.route(Some("a.test"), "/nope/app"),
            Err(RouteError::NotFound(_))
        ));
        assert!(matches!(
            registry.route(Some("a.test"), "/static/app"),
            Err(RouteError::NotFound(_))
        ));
        assert!(matches!(
            registry.route(Some("a.test"), "/"),
            Err(RouteError::NotFound(_))
        ));
    }

    #[test]
    fn omitted_class_uses_default() {
        let mut registry = Registry::new();
        let mut config = HostConfig::named("b.test");
        config.omit_resource_class = true;
        registry.register_host(&config).unwrap();
        registry.insert("b.test", "/shop", "index", page()).unwrap();

        let (_, route) = registry.route(Some("b.test"), "/shop/cart").unwrap();
        assert_eq!(route.class, ResourceClass::Dynamic);
        assert_eq!(route.node_path, "/dynamic/shop");
        assert_eq!(route.remaining, vec!["cart".to_string()]);
    }

    #[test]
    fn class_mismatch_rejected() {
        let mut registry = registry();
        let err = registry
            .insert("a.test", "/static/files", "index", page())
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ClassMismatch {
                class: ResourceClass::Static,
                kind: HandlerKind::Dynamic,
            }
        );

        let embedded: Arc<dyn Handler> = Arc::new(EmbeddedHandler::new());
        assert!(registry.insert("a.test", "/resource", "index", embedded).is_ok());
    }

    #[test]
    fn aliases_share_a_host() {
        let mut registry = Registry::new();
        let mut config = HostConfig::named("a.test");
        config.aliases = vec!["www.a.test".to_string()];
        registry.register_host(&config).unwrap();

        assert_eq!(registry.resolve_host(Some("WWW.a.test:8080")).unwrap().name(), "a.test");
        assert!(registry.insert("missing", "/dynamic", "index", page()).is_err());
    }
}
