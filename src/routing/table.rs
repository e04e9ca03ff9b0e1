//! Immutable route table.
//!
//! # Responsibilities
//! - Hold `(method, template, target)` triples in registration order
//! - Resolve a request to exactly one target, or none
//!
//! # Design Decisions
//! - Later registrations shadow earlier ones. `/api/v2/tile/entries/7` fits
//!   both `/tile/{L}/{N}` and `/tile/entries/{N}`; registering the entries
//!   routes last makes them win.
//! - Method mismatch is reported as no match, same as an unknown path

use axum::http::Method;

use crate::routing::template::{PathParams, PathTemplate};
use crate::routing::RouteError;

/// A single registered route.
#[derive(Debug, Clone)]
pub struct Route<T> {
    pub method: Method,
    pub template: PathTemplate,
    pub target: T,
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    pub route: &'a Route<T>,
    pub params: PathParams,
}

/// Ordered collection of routes.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route. Fails if the template is malformed or the same
    /// method and template are already registered.
    pub fn register(&mut self, method: Method, template: &str, target: T) -> Result<(), RouteError> {
        let template = PathTemplate::parse(template)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.template == template)
        {
            return Err(RouteError::DuplicateRoute {
                method: method.to_string(),
                template: template.to_string(),
            });
        }

        tracing::debug!(%method, template = %template, "Route registered");
        self.routes.push(Route {
            method,
            template,
            target,
        });
        Ok(())
    }

    /// Find the route for a request, preferring the most recently registered.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.routes
            .iter()
            .rev()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .template
                    .matches(path)
                    .map(|params| RouteMatch { route, params })
            })
    }

    pub fn routes(&self) -> &[Route<T>] {
        &self.routes
    }
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
