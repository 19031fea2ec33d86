//! Caller identity resolution.

use std::collections::HashMap;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::config::UserConfig;

/// A resolved caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub is_admin: bool,
}

/// Resolves a request to the identity that made it, if any.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Resolves `Authorization: Bearer <token>` against configured users.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentityResolver {
    tokens: HashMap<String, Identity>,
}

impl TokenIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: &HashMap<String, UserConfig>) -> Self {
        users.iter().fold(Self::new(), |resolver, (name, user)| {
            resolver.with_user(&user.token, name, user.admin)
        })
    }

    pub fn with_user(mut self, token: &str, name: &str, is_admin: bool) -> Self {
        self.tokens.insert(
            token.to_string(),
            Identity {
                name: name.to_string(),
                is_admin,
            },
        );
        self
    }
}

impl IdentityResolver for TokenIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        self.tokens.get(token).cloned()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
