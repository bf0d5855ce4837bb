//! Route table and role policy.
//!
//! Rules are checked in order and the first match wins. A prefix matches on
//! whole path segments; a `*` segment matches any single segment.
//!
//! Rules only see paths that passed [`check_path`]: the path the policy
//! matches is byte for byte the path forwarded downstream, and no URL parser
//! along the way can rewrite it.
use anyhow::{Context, Result, bail};
use axum::http::Method;
use questline_trust::Role;
use serde::{Deserialize, Serialize};

/// Route rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub service: String,
    pub prefix: String,
    /// Empty means every method.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub public: bool,
    /// Role names, or `*` for any authenticated principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RouteRule {
    fn new(service: &str, prefix: &str, methods: &[&str], public: bool, roles: &[&str]) -> Self {
        Self {
            service: service.to_string(),
            prefix: prefix.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            public,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

pub fn default_rules() -> Vec<RouteRule> {
    const STAFF: &[&str] = &["OPERATOR", "ADMIN"];
    const MUTATIONS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];
    vec![
        RouteRule::new("auth", "/auth/login", &[], true, &[]),
        RouteRule::new("auth", "/auth/register", &[], true, &[]),
        RouteRule::new("auth", "/auth/duplicate", &[], true, &[]),
        RouteRule::new("auth", "/auth/all-users", &[], false, &["ADMIN"]),
        RouteRule::new("auth", "/auth/roles", &[], false, &["ADMIN"]),
        RouteRule::new("auth", "/auth", &[], false, &["*"]),
        RouteRule::new("events", "/events/requests/*/decision", &[], false, STAFF),
        RouteRule::new("events", "/events/requests", &[], false, &["*"]),
        RouteRule::new("events", "/events/*/requests", &["POST"], false, &["*"]),
        RouteRule::new("events", "/events", MUTATIONS, false, STAFF),
        RouteRule::new("events", "/events", &[], false, &["*"]),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Empty `roles` with `any` unset admits nobody.
    Authenticated { any: bool, roles: Vec<Role> },
}

impl Access {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            Access::Public => true,
            Access::Authenticated { any, roles } => *any || roles.contains(&role),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub service: String,
    pub prefix: String,
    segments: Vec<String>,
    methods: Vec<Method>,
    pub access: Access,
}

impl CompiledRule {
    fn compile(rule: RouteRule) -> Result<Self> {
        if !rule.prefix.starts_with('/') {
            bail!("route prefix {} must start with '/'", rule.prefix);
        }
        let methods = rule
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("parse method {m}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let access = if rule.public {
            Access::Public
        } else {
            // No roles listed is treated like `*`.
            let any = rule.roles.is_empty() || rule.roles.iter().any(|r| r == "*");
            let roles = rule
                .roles
                .iter()
                .filter(|r| r.as_str() != "*")
                .map(|r| {
                    r.parse::<Role>()
                        .map_err(|err| anyhow::anyhow!("parse role {r}: {err}"))
                })
                .collect::<Result<Vec<_>>>()?;
            Access::Authenticated { any, roles }
        };
        Ok(Self {
            segments: split(&rule.prefix).map(str::to_string).collect(),
            service: rule.service,
            prefix: rule.prefix,
            methods,
            access,
        })
    }

    fn matches(&self, service: &str, method: &Method, path: &str) -> bool {
        if self.service != service {
            return false;
        }
        if !self.methods.is_empty() && !self.methods.contains(method) {
            return false;
        }
        let mut path_segments = split(path);
        self.segments.iter().all(|expected| {
            path_segments
                .next()
                .is_some_and(|actual| expected == "*" || expected == actual)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathViolation {
    /// Dot segments, empty segments, percent escapes or backslashes.
    NotCanonical,
    /// Service-to-service endpoints are never reachable through the gateway.
    Internal,
}

pub fn check_path(path: &str) -> Result<(), PathViolation> {
    if path.contains(['%', '\\']) {
        return Err(PathViolation::NotCanonical);
    }
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(());
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(PathViolation::NotCanonical);
        }
        if segment.eq_ignore_ascii_case("internal") {
            return Err(PathViolation::Internal);
        }
    }
    Ok(())
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// First path segment, used as the service key.
pub fn service_key(path: &str) -> Option<&str> {
    split(path).next()
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<CompiledRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn resolve(&self, service: &str, method: &Method, path: &str) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(service, method, path))
    }
}
