//! Resolver contracts.
//!
//! Field resolvers answer a batch of requested fields for a batch of
//! identities; link resolvers turn required values (or nothing) into target
//! identities. Both may opt in to receiving the query `Context` at
//! registration time.

use crate::engine::TaskGroup;
use crate::query::{Options, QueryField};
use crate::{BoxError, Context, Ident};
use by_address::ByAddress;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// FIELD RESOLVER OUTPUT
// =============================================================================

/// Values returned by a field resolver.
///
/// `Flat` answers a root-context call (one value per requested field);
/// `Rows` answers a call with identities (one row per identity, one value per
/// requested field in each row).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRows {
    Flat(Vec<Value>),
    Rows(Vec<Vec<Value>>),
}

impl FieldRows {
    /// Materialize a lazily produced root-context answer.
    pub fn flat(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Flat(values.into_iter().collect())
    }

    /// Materialize lazily produced rows.
    pub fn rows<R, I>(rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = Value>,
    {
        Self::Rows(rows.into_iter().map(|r| r.into_iter().collect()).collect())
    }
}

// =============================================================================
// LINK RESOLVER OUTPUT
// =============================================================================

/// Identities returned by a link resolver.
///
/// Shape depends on cardinality and on whether the call was batched by
/// identities: a single `Ident`/`Nothing` for Maybe/One, a `List` of them for
/// Many or for a batched Maybe/One call, a `List` of `List`s for a batched
/// Many call.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkValue {
    Nothing,
    Ident(Ident),
    List(Vec<LinkValue>),
}

impl LinkValue {
    /// A list of identities.
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Ident>,
    {
        Self::List(ids.into_iter().map(|i| Self::Ident(i.into())).collect())
    }

    /// A list of per-identity answers for a batched call.
    pub fn batch(values: impl IntoIterator<Item = LinkValue>) -> Self {
        Self::List(values.into_iter().collect())
    }
}

impl From<Ident> for LinkValue {
    fn from(value: Ident) -> Self {
        Self::Ident(value)
    }
}

impl From<Option<Ident>> for LinkValue {
    fn from(value: Option<Ident>) -> Self {
        value.map_or(Self::Nothing, Self::Ident)
    }
}

// =============================================================================
// LINK RESOLVER INPUT
// =============================================================================

/// Values of the field a link requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Requires {
    /// The link declares no requirement.
    None,
    /// Root-context call: the single stored value.
    Single(Value),
    /// Batched call: one stored value per identity, in identity order.
    Batch(Vec<Value>),
}

/// Arguments handed to a link resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkArgs {
    pub requires: Requires,
    /// Resolved options, present only when the link declares options.
    pub options: Option<Options>,
}

// =============================================================================
// SUB-QUERY RESOLVERS
// =============================================================================

/// Continuation returned by a sub-query: runs once every unit of work the
/// sub-query submitted to its task group has completed.
pub type Collect = Box<dyn FnOnce() -> Result<FieldRows, BoxError> + Send>;

/// A field resolver whose resolution is itself a fan-out of units of work.
///
/// `fork` runs on the coordinator. It may submit any number of units of work
/// to `group` and must return the continuation assembling the final rows.
pub trait SubQuery: Send + Sync {
    fn fork(
        &self,
        fields: &[QueryField],
        ids: Option<&[Ident]>,
        group: &mut TaskGroup<'_>,
    ) -> Result<Collect, BoxError>;
}

// =============================================================================
// FUNCTION HANDLES
// =============================================================================

type PlainFieldFn = dyn Fn(&[QueryField], Option<&[Ident]>) -> Result<FieldRows, BoxError> + Send + Sync;
type ContextFieldFn =
    dyn Fn(&Context, &[QueryField], Option<&[Ident]>) -> Result<FieldRows, BoxError> + Send + Sync;
type PlainLinkFn = dyn Fn(&LinkArgs) -> Result<LinkValue, BoxError> + Send + Sync;
type ContextLinkFn = dyn Fn(&Context, &LinkArgs) -> Result<LinkValue, BoxError> + Send + Sync;

/// Field resolver handle.
///
/// Fields declared with clones of the same handle are resolved together in a
/// single call.
#[derive(Clone)]
pub enum FieldFunc {
    Plain(Arc<PlainFieldFn>),
    Contextual(Arc<ContextFieldFn>),
    SubQuery(Arc<dyn SubQuery>),
}

/// Identity of a field resolver, used to group fields into one call.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum FuncKey {
    Plain(ByAddress<Arc<PlainFieldFn>>),
    Contextual(ByAddress<Arc<ContextFieldFn>>),
    SubQuery(ByAddress<Arc<dyn SubQuery>>),
}

impl FieldFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[QueryField], Option<&[Ident]>) -> Result<FieldRows, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    /// A resolver that receives the query context.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&Context, &[QueryField], Option<&[Ident]>) -> Result<FieldRows, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::Contextual(Arc::new(f))
    }

    pub fn sub_query(sub: impl SubQuery + 'static) -> Self {
        Self::SubQuery(Arc::new(sub))
    }

    pub(crate) fn key(&self) -> FuncKey {
        match self {
            Self::Plain(f) => FuncKey::Plain(ByAddress(Arc::clone(f))),
            Self::Contextual(f) => FuncKey::Contextual(ByAddress(Arc::clone(f))),
            Self::SubQuery(s) => FuncKey::SubQuery(ByAddress(Arc::clone(s))),
        }
    }
}

impl fmt::Debug for FieldFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("FieldFunc::Plain"),
            Self::Contextual(_) => f.write_str("FieldFunc::Contextual"),
            Self::SubQuery(_) => f.write_str("FieldFunc::SubQuery"),
        }
    }
}

/// Link resolver handle.
#[derive(Clone)]
pub enum LinkFunc {
    Plain(Arc<PlainLinkFn>),
    Contextual(Arc<ContextLinkFn>),
}

impl LinkFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LinkArgs) -> Result<LinkValue, BoxError> + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    /// A resolver that receives the query context.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&Context, &LinkArgs) -> Result<LinkValue, BoxError> + Send + Sync + 'static,
    {
        Self::Contextual(Arc::new(f))
    }

    pub(crate) fn call(&self, ctx: &Context, args: &LinkArgs) -> Result<LinkValue, BoxError> {
        match self {
            Self::Plain(f) => f(args),
            Self::Contextual(f) => f(ctx, args),
        }
    }
}

impl fmt::Debug for LinkFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("LinkFunc::Plain"),
            Self::Contextual(_) => f.write_str("LinkFunc::Contextual"),
        }
    }
}
