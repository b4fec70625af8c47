//! Completion queue driving one query execution.
//!
//! Units of work run on the executor; their completions come back over a
//! channel to the coordinating thread, where continuations run one at a time
//! with exclusive access to the execution state. Nothing the workers touch is
//! shared with the continuations except the slot each result is written to.

use crate::executor::Executor;
use crate::{BoxError, Context, HikuError};
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

// =============================================================================
// TYPES
// =============================================================================

/// Handle of a submitted unit of work or of a task group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(usize);

/// Continuation run on the coordinator with exclusive access to the state.
pub(crate) type Callback<'g, S> = Box<dyn FnOnce(&mut S) -> Result<(), HikuError> + 'g>;

type Work = Box<dyn FnOnce() -> Result<(), HikuError> + Send>;

/// Completion report sent back by a worker.
struct Done {
    id: TaskId,
    result: Result<(), HikuError>,
}

struct Group<'g, S> {
    remaining: usize,
    sealed: bool,
    then: Option<Callback<'g, S>>,
}

/// State that owns a queue and is handed to every continuation.
pub(crate) trait Workflow<'g>: Sized {
    fn queue(&mut self) -> &mut Queue<'g, Self>;
}

// =============================================================================
// SLOT
// =============================================================================

/// Write-once cell a unit of work leaves its result in.
pub struct Slot<T>(Arc<Mutex<Option<T>>>);

impl<T> Slot<T> {
    fn empty() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    fn fill(&self, value: T) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Take the result out. `None` until the unit of work has completed, or
    /// once the value was taken.
    pub fn take(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filled = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("Slot").field("filled", &filled).finish()
    }
}

// =============================================================================
// REPORTER
// =============================================================================

/// Sends a job's completion; a job dropped unrun reports `ExecutorShutdown`.
struct Reporter {
    id: TaskId,
    sender: Option<Sender<Done>>,
}

impl Reporter {
    fn report(mut self, result: Result<(), HikuError>) {
        if let Some(sender) = self.sender.take() {
            // receiver is gone once the query has already failed
            let _ = sender.send(Done {
                id: self.id,
                result,
            });
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Done {
                id: self.id,
                result: Err(HikuError::ExecutorShutdown),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

// =============================================================================
// QUEUE
// =============================================================================

pub(crate) struct Queue<'g, S> {
    executor: Arc<dyn Executor>,
    sender: Sender<Done>,
    receiver: Receiver<Done>,
    next_id: usize,
    in_flight: usize,
    steps: HashMap<TaskId, Callback<'g, S>>,
    parents: HashMap<TaskId, TaskId>,
    groups: HashMap<TaskId, Group<'g, S>>,
    callbacks: HashMap<TaskId, Vec<Callback<'g, S>>>,
    done: HashSet<TaskId>,
    ready: VecDeque<TaskId>,
    deferred: VecDeque<Callback<'g, S>>,
}

impl<'g, S> Queue<'g, S> {
    pub(crate) fn new(executor: Arc<dyn Executor>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            executor,
            sender,
            receiver,
            next_id: 0,
            in_flight: 0,
            steps: HashMap::new(),
            parents: HashMap::new(),
            groups: HashMap::new(),
            callbacks: HashMap::new(),
            done: HashSet::new(),
            ready: VecDeque::new(),
            deferred: VecDeque::new(),
        }
    }

    fn register(&mut self, parent: Option<TaskId>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        if let Some(parent) = parent {
            if let Some(group) = self.groups.get_mut(&parent) {
                group.remaining += 1;
            }
            self.parents.insert(id, parent);
        }
        id
    }

    fn dispatch(&mut self, id: TaskId, work: Work) {
        let reporter = Reporter {
            id,
            sender: Some(self.sender.clone()),
        };
        self.in_flight += 1;
        tracing::trace!(task = id.0, in_flight = self.in_flight, "unit of work submitted");
        self.executor.spawn(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|payload| Err(HikuError::ResolverPanicked(panic_message(&*payload))));
            reporter.report(result);
        }));
    }

    /// Submit `work`; `then` receives its result on the coordinator.
    pub(crate) fn submit<T, W, C>(&mut self, work: W, then: C) -> TaskId
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T, HikuError> + Send + 'static,
        C: FnOnce(&mut S, T) -> Result<(), HikuError> + 'g,
    {
        let slot = Slot::empty();
        let filled = slot.clone();
        let id = self.register(None);
        self.steps.insert(
            id,
            Box::new(move |state: &mut S| {
                let value = slot.take().ok_or(HikuError::ExecutorShutdown)?;
                then(state, value)
            }),
        );
        self.dispatch(
            id,
            Box::new(move || {
                filled.fill(work()?);
                Ok(())
            }),
        );
        id
    }

    /// Open a task group. It completes once sealed and once every unit of
    /// work submitted to it has completed.
    pub(crate) fn fork(&mut self) -> TaskId {
        let id = self.register(None);
        self.groups.insert(
            id,
            Group {
                remaining: 0,
                sealed: false,
                then: None,
            },
        );
        id
    }

    /// Close a group to new work; `then` runs when it completes.
    pub(crate) fn seal<C>(&mut self, group: TaskId, then: C)
    where
        C: FnOnce(&mut S) -> Result<(), HikuError> + 'g,
    {
        if let Some(entry) = self.groups.get_mut(&group) {
            entry.sealed = true;
            entry.then = Some(Box::new(then));
            if entry.remaining == 0 {
                self.ready.push_back(group);
            }
        }
    }

    /// Run `callback` once `id` has completed (right away if it already has).
    pub(crate) fn add_callback<C>(&mut self, id: TaskId, callback: C)
    where
        C: FnOnce(&mut S) -> Result<(), HikuError> + 'g,
    {
        if self.done.contains(&id) {
            self.deferred.push_back(Box::new(callback));
        } else {
            self.callbacks.entry(id).or_default().push(Box::new(callback));
        }
    }

    fn release(&mut self, group: TaskId) {
        if let Some(entry) = self.groups.get_mut(&group) {
            entry.remaining = entry.remaining.saturating_sub(1);
            if entry.remaining == 0 && entry.sealed {
                self.ready.push_back(group);
            }
        }
    }
}

/// Drain the queue: run continuations until no work is left in flight.
///
/// The first failure aborts the run; units of work still running are left to
/// finish and their results are discarded.
pub(crate) fn run<'g, S: Workflow<'g>>(state: &mut S) -> Result<(), HikuError> {
    loop {
        let queue = state.queue();

        if let Some(callback) = queue.deferred.pop_front() {
            callback(state)?;
            continue;
        }

        if let Some(group) = queue.ready.pop_front() {
            let then = queue.groups.remove(&group).and_then(|g| g.then);
            if let Some(then) = then {
                then(state)?;
            }
            finish(state, group)?;
            continue;
        }

        if queue.in_flight == 0 {
            return Ok(());
        }

        let done = queue
            .receiver
            .recv()
            .map_err(|_| HikuError::ExecutorShutdown)?;
        queue.in_flight -= 1;
        tracing::trace!(task = done.id.0, ok = done.result.is_ok(), "unit of work completed");
        done.result?;

        if let Some(step) = queue.steps.remove(&done.id) {
            step(state)?;
        }
        finish(state, done.id)?;
    }
}

fn finish<'g, S: Workflow<'g>>(state: &mut S, id: TaskId) -> Result<(), HikuError> {
    let queue = state.queue();
    queue.done.insert(id);
    if let Some(parent) = queue.parents.remove(&id) {
        queue.release(parent);
    }
    let callbacks = queue.callbacks.remove(&id).unwrap_or_default();
    for callback in callbacks {
        callback(state)?;
    }
    Ok(())
}

// =============================================================================
// TASK GROUP
// =============================================================================

pub(crate) trait Submit {
    fn submit_to_group(&mut self, group: TaskId, work: Work);
}

impl<S> Submit for Queue<'_, S> {
    fn submit_to_group(&mut self, group: TaskId, work: Work) {
        let id = self.register(Some(group));
        self.dispatch(id, work);
    }
}

/// Handle a sub-query uses to fan out its own units of work.
///
/// Every unit submitted here runs on the engine's executor; the sub-query's
/// `Collect` continuation runs after all of them have completed.
pub struct TaskGroup<'q> {
    queue: &'q mut dyn Submit,
    group: TaskId,
    ctx: Arc<Context>,
}

impl<'q> TaskGroup<'q> {
    pub(crate) fn new(queue: &'q mut dyn Submit, group: TaskId, ctx: Arc<Context>) -> Self {
        Self { queue, group, ctx }
    }

    /// Query context of the running execution.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Submit a unit of work; its result lands in the returned slot.
    pub fn submit<T, F>(&mut self, work: F) -> Slot<T>
    where
        T: Send + 'static,
        F: FnOnce(&Context) -> Result<T, BoxError> + Send + 'static,
    {
        let slot = Slot::empty();
        let filled = slot.clone();
        let ctx = Arc::clone(&self.ctx);
        self.queue.submit_to_group(
            self.group,
            Box::new(move || {
                filled.fill(work(&ctx).map_err(HikuError::resolver)?);
                Ok(())
            }),
        );
        slot
    }
}

impl fmt::Debug for TaskGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("group", &self.group)
            .field("ctx", &self.ctx)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
