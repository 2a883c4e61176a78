//! Runtime instance lifecycle.
//!
//! A runtime instance is one engine context on a dedicated OS thread. The
//! thread builds its resolver and context, evaluates the graph, reports
//! readiness, then serves invocation requests one at a time from an
//! unbounded queue:
//!
//! 1. Spawn the thread and evaluate under the deadline
//! 2. Hand a [`Handler`] back to the caller
//! 3. Serialize every [`Handler::invoke`] through the queue
//! 4. Exit once the last handler clone is dropped

use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use boa_engine::context::ContextBuilder;
use boa_engine::{Context, JsObject, JsValue};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, info_span, instrument};
use uuid::Uuid;

use jsmod_common::RuntimeError;

use crate::builtin::BuiltinRegistry;
use crate::evaluator::evaluate;
use crate::resolver::ModuleResolver;
use crate::source::{SourceFetcher, VirtualTree};
use crate::value::{describe_error, export, import, settle};
use crate::{CancelSignal, Deadline};

/// Everything a runtime instance needs, moved onto its thread.
pub struct InstanceSpec {
    /// Source tree including the main script.
    pub tree: VirtualTree,
    /// Built-in modules.
    pub builtins: BuiltinRegistry,
    /// Remote source fetcher.
    pub fetcher: Arc<dyn SourceFetcher>,
    /// Specifier of the main script.
    pub main_module: String,
    /// Link + evaluate budget.
    pub deadline: Duration,
    /// Per-loop iteration cap while the graph evaluates.
    pub loop_iteration_limit: u64,
}

enum Command {
    Invoke {
        input: Option<Value>,
        reply: oneshot::Sender<Result<Value, RuntimeError>>,
    },
}

struct HandlerInner {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    alive: watch::Receiver<()>,
}

/// Callable handle to the default export of one runtime instance.
///
/// Cheap to clone and safe to share across tasks. Calls are executed in
/// arrival order; the instance shuts down when the last clone is dropped.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl Handler {
    /// Invoke the handler with one argument.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Invocation`] if the call throws or its result
    /// rejects, and [`RuntimeError::Terminated`] if the instance is gone.
    pub async fn invoke(&self, input: Option<Value>) -> Result<Value, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Invoke { input, reply })
            .map_err(|_| RuntimeError::Terminated)?;

        response.await.map_err(|_| RuntimeError::Terminated)?
    }

    /// Identifier of the runtime instance behind this handler.
    pub fn instance_id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns `true` while the runtime instance thread is serving requests.
    pub fn is_alive(&self) -> bool {
        !self.inner.commands.is_closed()
    }

    /// Observe the instance lifetime without keeping the instance alive.
    pub fn monitor(&self) -> InstanceMonitor {
        InstanceMonitor {
            id: self.inner.id,
            alive: self.inner.alive.clone(),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("instance_id", &self.inner.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Lifetime observer for one runtime instance.
///
/// The instance thread holds the sending side and releases it after its
/// engine context and resolver are dropped.
#[derive(Debug, Clone)]
pub struct InstanceMonitor {
    id: Uuid,
    alive: watch::Receiver<()>,
}

impl InstanceMonitor {
    /// Identifier of the observed runtime instance.
    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    /// Returns `true` once the instance thread has released its resources.
    pub fn is_stopped(&self) -> bool {
        self.alive.has_changed().is_err()
    }

    /// Wait until the instance thread has released its resources.
    pub async fn stopped(mut self) {
        while self.alive.changed().await.is_ok() {}
    }
}

/// Spawn a runtime instance and wait until its handler is ready.
///
/// The wait is bounded by `spec.deadline`. When it expires, or when this
/// future is dropped, the instance is cancelled and any pending fetch stops.
///
/// # Errors
///
/// Returns the evaluation error of the graph, [`RuntimeError::DeadlineExceeded`]
/// on timeout, or [`RuntimeError::Io`] if the thread cannot be spawned.
#[instrument(skip(spec), fields(main = %spec.main_module))]
pub async fn spawn(spec: InstanceSpec) -> Result<Handler, RuntimeError> {
    let id = Uuid::new_v4();
    let budget = spec.deadline;
    let (cancel, signal) = CancelSignal::channel();
    let deadline = Deadline::new(budget, signal);
    let (ready_tx, ready_rx) = oneshot::channel();
    let (commands, queue) = mpsc::unbounded_channel();
    let (alive_tx, alive) = watch::channel(());

    thread::Builder::new()
        .name(format!("jsmod-runtime-{id}"))
        .spawn(move || {
            let _alive = alive_tx;
            run(id, spec, &deadline, ready_tx, queue);
        })?;

    match tokio::time::timeout(budget, ready_rx).await {
        Ok(Ok(Ok(()))) => Ok(Handler {
            inner: Arc::new(HandlerInner {
                id,
                commands,
                alive,
            }),
        }),
        Ok(Ok(Err(err))) => Err(err),
        Ok(Err(_)) => Err(RuntimeError::Terminated),
        Err(_) => {
            cancel.cancel();
            error!(
                instance_id = %id,
                deadline_ms = deadline_ms(budget),
                "Evaluation deadline exceeded"
            );
            Err(RuntimeError::DeadlineExceeded {
                duration_ms: deadline_ms(budget),
            })
        }
    }
}

fn deadline_ms(budget: Duration) -> u64 {
    u64::try_from(budget.as_millis()).unwrap_or(u64::MAX)
}

fn run(
    id: Uuid,
    spec: InstanceSpec,
    deadline: &Deadline,
    ready: oneshot::Sender<Result<(), RuntimeError>>,
    mut queue: mpsc::UnboundedReceiver<Command>,
) {
    let span = info_span!("runtime_instance", instance_id = %id);
    let _enter = span.enter();

    let resolver = Rc::new(ModuleResolver::new(spec.tree, spec.builtins, spec.fetcher));
    let context = ContextBuilder::default()
        .module_loader(resolver.clone())
        .build()
        .map_err(|err| RuntimeError::engine(err.to_string()));

    let mut context = match context {
        Ok(context) => context,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(spec.loop_iteration_limit);
    let evaluated = evaluate(&resolver, &spec.main_module, deadline, &mut context);
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(u64::MAX);

    let handler = match evaluated {
        Ok(handler) => handler,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        debug!("Caller stopped waiting, discarding instance");
        return;
    }
    info!("Runtime instance ready");

    let mut served: u64 = 0;
    while let Some(command) = queue.blocking_recv() {
        match command {
            Command::Invoke { input, reply } => {
                let start = Instant::now();
                let result = call(&handler, input.as_ref(), &mut context);
                served += 1;
                debug!(
                    request = served,
                    success = result.is_ok(),
                    duration_us = start.elapsed().as_micros(),
                    "Invocation finished"
                );
                // A caller that went away simply discards the reply.
                let _ = reply.send(result);
            }
        }
    }

    info!(requests = served, "Runtime instance stopped");
}

fn call(
    handler: &JsObject,
    input: Option<&Value>,
    context: &mut Context,
) -> Result<Value, RuntimeError> {
    let argument = import(input, context)?;
    let result = handler
        .call(&JsValue::undefined(), &[argument], context)
        .map_err(|err| RuntimeError::invocation(describe_error(&err, context)))?;

    context
        .run_jobs()
        .map_err(|err| RuntimeError::invocation(describe_error(&err, context)))?;

    let settled = settle(result, context)?;
    export(&settled, context)
}
