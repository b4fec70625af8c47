//! # Query Context
//!
//! Per-query values (database handles, the current user, feature flags)
//! made available to resolvers that opt in to receiving them.
//!
//! Lookups are typed: `ctx.get::<Pool>("db")`. A missing name fails with
//! `HikuError::ContextVariable`, a type mismatch with `HikuError::ContextType`.

use crate::HikuError;
use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable mapping of context variables shared by every unit of work of
/// one query.
#[derive(Clone, Default)]
pub struct Context {
    vars: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a variable.
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.vars.insert(name.into(), Arc::new(value));
    }

    /// Typed lookup.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<&T, HikuError> {
        let value = self
            .vars
            .get(name)
            .ok_or_else(|| HikuError::ContextVariable(name.to_string()))?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| HikuError::ContextType {
                key: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Check whether a variable is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let ctx = Context::new().with("limit", 10_u32).with("tenant", "acme".to_string());
        assert_eq!(ctx.get::<u32>("limit").ok(), Some(&10));
        assert_eq!(ctx.get::<String>("tenant").map(String::as_str).ok(), Some("acme"));
        assert!(ctx.contains("tenant"));
    }

    #[test]
    fn missing_variable_is_descriptive() {
        let ctx = Context::new();
        let err = ctx.get::<u32>("db").expect_err("missing");
        assert!(matches!(err, HikuError::ContextVariable(ref k) if k == "db"));
        assert!(err.to_string().contains("\"db\""));
    }

    #[test]
    fn wrong_type_is_reported() {
        let ctx = Context::new().with("limit", 10_u32);
        assert!(matches!(
            ctx.get::<String>("limit"),
            Err(HikuError::ContextType { .. })
        ));
    }
}
