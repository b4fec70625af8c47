//! # Execution Engine
//!
//! Resolves a query against a graph into a normalized `Store`.
//!
//! ## Execution Model
//!
//! For every (node, query, identities) triple the driver:
//!
//! 1. splits the query into fields, links and inline nodes
//! 2. submits one unit of work per distinct field resolver
//! 3. submits one unit of work per link, deferred until the field it
//!    requires has been stored
//! 4. recurses into the link target with the identities the link returned
//!
//! Units of work run on the configured `Executor`. Their results are applied
//! on the calling thread, so the store is only ever touched by one thread.
//! Execution is all-or-nothing: the first error aborts the query.

mod queue;

pub use queue::{Slot, TaskGroup};

use crate::executor::Executor;
use crate::query::{QueryField, QueryLink, QueryNode};
use crate::result::{Store, link_result_to_ids};
use crate::schema::{
    FieldFunc, FieldRows, FuncKey, Graph, Link, LinkArgs, LinkValue, Node, resolve_options,
};
use crate::split::{Split, split};
use crate::{Context, HikuError, Ident};
use indexmap::IndexMap;
use queue::{Queue, TaskId, Workflow};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identities a node is resolved for; `None` in root and inline contexts.
type Ids = Option<Arc<[Ident]>>;

// =============================================================================
// ENGINE
// =============================================================================

/// Entry point: executes queries on a fixed executor.
#[derive(Clone)]
pub struct Engine {
    executor: Arc<dyn Executor>,
}

impl Engine {
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Share an executor between several engines.
    pub fn from_arc(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Execute `query` against `graph` and return the normalized result.
    ///
    /// The query is merged first, so repeated links are resolved once with
    /// the union of their sub-queries. Blocks until every unit of work of the
    /// query has completed.
    pub fn execute(
        &self,
        graph: &Graph,
        query: &QueryNode,
        ctx: Context,
    ) -> Result<Store, HikuError> {
        let span = tracing::debug_span!("execute", items = query.items.len());
        let _guard = span.enter();

        // repeated items are resolved once
        let query = QueryNode::merge([query]);
        let mut driver = Driver {
            graph,
            ctx: Arc::new(ctx),
            store: Store::new(),
            queue: Queue::new(Arc::clone(&self.executor)),
        };
        driver.process_node(graph.root(), &query, None)?;
        queue::run(&mut driver)?;

        tracing::debug!(nodes = driver.store.index().len(), "query executed");
        Ok(driver.store)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish()
    }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver<'g> {
    graph: &'g Graph,
    ctx: Arc<Context>,
    store: Store,
    queue: Queue<'g, Driver<'g>>,
}

impl<'g> Workflow<'g> for Driver<'g> {
    fn queue(&mut self) -> &mut Queue<'g, Self> {
        &mut self.queue
    }
}

impl<'g> Driver<'g> {
    fn process_node(
        &mut self,
        node: &'g Node,
        query: &'g QueryNode,
        ids: Option<Vec<Ident>>,
    ) -> Result<(), HikuError> {
        if ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(());
        }
        tracing::debug!(
            node = node.display_name(),
            ids = ids.as_ref().map_or(0, Vec::len),
            "processing node"
        );

        let parts = split(node, query)?;

        // every inline sub-query is checked before any unit of work is submitted
        let inline = parts
            .nodes
            .iter()
            .map(|(inline, sub)| split(inline, sub).map(|p| (*inline, p)))
            .collect::<Result<Vec<_>, _>>()?;
        for (inline, inline_parts) in inline {
            self.store.open_scope(inline)?;
            self.schedule_parts(inline, inline_parts, None)?;
        }

        self.schedule_parts(node, parts, ids.map(Arc::from))
    }

    /// Schedule the fields and links of an already split query.
    fn schedule_parts(
        &mut self,
        node: &'g Node,
        parts: Split<'g>,
        ids: Ids,
    ) -> Result<(), HikuError> {
        // fields sharing a resolver handle are resolved in one call
        let mut calls: IndexMap<FuncKey, (&'g FieldFunc, Vec<QueryField>)> = IndexMap::new();
        for (field, requested) in parts.fields {
            let options = if field.options.is_empty() {
                None
            } else {
                Some(resolve_options(
                    &field.name,
                    &field.options,
                    requested.options.as_ref(),
                )?)
            };
            calls
                .entry(field.func.key())
                .or_insert_with(|| (&field.func, Vec::new()))
                .1
                .push(QueryField {
                    name: requested.name,
                    options,
                });
        }

        let mut handles: HashMap<String, TaskId> = HashMap::new();
        for (func, fields) in calls.into_values() {
            let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
            let task = self.schedule_fields(node, func, fields, names.clone(), ids.clone())?;
            handles.extend(names.into_iter().map(|name| (name, task)));
        }

        for (link, query_link) in parts.links {
            match link.requires.as_deref() {
                Some(requires) => {
                    let task = handles.get(requires).copied().ok_or_else(|| {
                        HikuError::UnknownField {
                            node: node.display_name().to_string(),
                            name: requires.to_string(),
                        }
                    })?;
                    let ids = ids.clone();
                    self.queue.add_callback(task, move |driver: &mut Driver<'g>| {
                        driver.schedule_link(node, link, query_link, ids)
                    });
                }
                None => self.schedule_link(node, link, query_link, ids.clone())?,
            }
        }
        Ok(())
    }

    fn schedule_fields(
        &mut self,
        node: &'g Node,
        func: &'g FieldFunc,
        fields: Vec<QueryField>,
        names: Vec<String>,
        ids: Ids,
    ) -> Result<TaskId, HikuError> {
        let store = move |driver: &mut Driver<'g>, ids: Ids, rows: FieldRows| {
            driver.store.store_fields(node, &names, ids.as_deref(), rows)
        };

        let task = match func {
            FieldFunc::Plain(f) => {
                let f = Arc::clone(f);
                let call_ids = ids.clone();
                self.queue.submit(
                    move || f(&fields, call_ids.as_deref()).map_err(HikuError::resolver),
                    move |driver, rows| store(driver, ids, rows),
                )
            }
            FieldFunc::Contextual(f) => {
                let f = Arc::clone(f);
                let ctx = Arc::clone(&self.ctx);
                let call_ids = ids.clone();
                self.queue.submit(
                    move || f(&ctx, &fields, call_ids.as_deref()).map_err(HikuError::resolver),
                    move |driver, rows| store(driver, ids, rows),
                )
            }
            FieldFunc::SubQuery(sub) => {
                let group = self.queue.fork();
                let collect = {
                    let mut tasks = TaskGroup::new(&mut self.queue, group, Arc::clone(&self.ctx));
                    sub.fork(&fields, ids.as_deref(), &mut tasks)
                        .map_err(HikuError::resolver)?
                };
                self.queue.seal(group, move |driver: &mut Driver<'g>| {
                    let rows = collect().map_err(HikuError::resolver)?;
                    store(driver, ids, rows)
                });
                group
            }
        };
        Ok(task)
    }

    fn schedule_link(
        &mut self,
        node: &'g Node,
        link: &'g Link,
        query_link: &'g QueryLink,
        ids: Ids,
    ) -> Result<(), HikuError> {
        let options = if link.options.is_empty() {
            None
        } else {
            Some(resolve_options(
                &link.name,
                &link.options,
                query_link.options.as_ref(),
            )?)
        };
        let args = LinkArgs {
            requires: self.store.link_reqs(node, link, ids.as_deref())?,
            options,
        };
        tracing::trace!(node = node.display_name(), link = %link.name, "scheduling link");

        let func = link.func.clone();
        let ctx = Arc::clone(&self.ctx);
        self.queue.submit(
            move || func.call(&ctx, &args).map_err(HikuError::resolver),
            move |driver: &mut Driver<'g>, value: LinkValue| {
                driver.process_link(node, link, query_link, ids, &value)
            },
        );
        Ok(())
    }

    fn process_link(
        &mut self,
        node: &'g Node,
        link: &'g Link,
        query_link: &'g QueryLink,
        ids: Ids,
        value: &LinkValue,
    ) -> Result<(), HikuError> {
        self.store.store_links(node, link, ids.as_deref(), value)?;

        let batched = ids.is_some() && link.requires.is_some();
        let targets = link_result_to_ids(node, link, batched, value)?;
        if targets.is_empty() {
            return Ok(());
        }
        let target = self.graph.node(&link.node)?;
        self.process_node(target, &query_link.node, Some(targets))
    }
}
