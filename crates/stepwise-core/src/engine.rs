//! The flow engine.
//!
//! `FlowEngine::sync` is the single driver: the caller hands it the latest
//! application data, the engine resolves the first incomplete step and, when
//! that differs from the current one, fires interceptors, publishes the new
//! step and starts loading its module on the tokio runtime.
//!
//! Every load is tagged with an activation token. A load whose token no
//! longer matches (because the flow moved on while it was in flight) is
//! discarded instead of published.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use stepwise_types::{EngineError, EngineState, FlowData, ProgressInfo, StepConfig};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::completion::find_next_step;
use crate::interceptor::{
    BoxInterceptor, Interceptor, TransitionContext, run_before_step, run_on_complete,
};
use crate::notify::{Notifier, Subscription, panic_reason};
use crate::progress;
use crate::registry::{ModuleLoader, ModuleRegistry};

/// Shared handle to a published snapshot.
pub type StateSnapshot<M> = Arc<EngineState<M>>;

/// Drives a multi-step flow from application data.
///
/// `D` is the data type step completion rules read, `M` the module type
/// loaders produce. Cloning the engine shares all state.
pub struct FlowEngine<D, M> {
    inner: Arc<EngineInner<D, M>>,
}

struct EngineInner<D, M> {
    steps: Vec<StepConfig<D>>,
    registry: RwLock<ModuleRegistry<M>>,
    interceptors: RwLock<Vec<BoxInterceptor<D>>>,
    publisher: Arc<Publisher<M>>,
}

/// Snapshot cell shared with in-flight load tasks.
///
/// The `current` lock is held only to swap the snapshot, feed the watch
/// channel and queue the snapshot for delivery. Listeners run after it is
/// released, one publish at a time and in the order snapshots were stored.
struct Publisher<M> {
    current: Mutex<Current<M>>,
    delivery: Mutex<Delivery<M>>,
    delivered: Condvar,
    notifier: Notifier<StateSnapshot<M>>,
    watch: watch::Sender<StateSnapshot<M>>,
}

struct Current<M> {
    snapshot: StateSnapshot<M>,
    activation: u64,
    seq: u64,
}

/// Snapshots waiting for listeners, keyed by publish sequence.
struct Delivery<M> {
    queue: VecDeque<(u64, StateSnapshot<M>)>,
    drainer: Option<ThreadId>,
    delivered: u64,
}

impl<M: Send + Sync + 'static> Publisher<M> {
    fn new() -> Self {
        let snapshot = Arc::new(EngineState::initial());
        let (watch, _) = watch::channel(Arc::clone(&snapshot));
        Self {
            current: Mutex::new(Current {
                snapshot,
                activation: 0,
                seq: 0,
            }),
            delivery: Mutex::new(Delivery {
                queue: VecDeque::new(),
                drainer: None,
                delivered: 0,
            }),
            delivered: Condvar::new(),
            notifier: Notifier::new(),
            watch,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Current<M>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, Delivery<M>> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> StateSnapshot<M> {
        Arc::clone(&self.lock().snapshot)
    }

    /// Start a new activation with `next` and publish it.
    fn begin(&self, next: EngineState<M>) -> u64 {
        let (activation, seq) = {
            let mut current = self.lock();
            current.activation += 1;
            let seq = self.store(&mut current, next);
            (current.activation, seq)
        };
        self.deliver(seq);
        activation
    }

    /// Update the snapshot if `activation` is still current, then publish.
    ///
    /// Returns `false` when the update was stale and dropped.
    fn update_if_current(
        &self,
        activation: u64,
        update: impl FnOnce(&EngineState<M>) -> EngineState<M>,
    ) -> bool {
        let seq = {
            let mut current = self.lock();
            if current.activation != activation {
                return false;
            }
            let next = update(&current.snapshot);
            self.store(&mut current, next)
        };
        self.deliver(seq);
        true
    }

    /// Publish the current snapshot again without changing it.
    fn republish(&self) {
        let seq = {
            let mut current = self.lock();
            let snapshot = Arc::clone(&current.snapshot);
            self.enqueue(&mut current, snapshot)
        };
        self.deliver(seq);
    }

    fn store(&self, current: &mut Current<M>, next: EngineState<M>) -> u64 {
        let snapshot = Arc::new(next);
        current.snapshot = Arc::clone(&snapshot);
        self.enqueue(current, snapshot)
    }

    fn enqueue(&self, current: &mut Current<M>, snapshot: StateSnapshot<M>) -> u64 {
        current.seq += 1;
        self.watch.send_replace(Arc::clone(&snapshot));
        self.lock_delivery().queue.push_back((current.seq, snapshot));
        current.seq
    }

    /// Return once snapshot `seq` has reached the listeners.
    ///
    /// The first caller to find the queue idle drains it. Callers on other
    /// threads wait for the drainer to pass `seq`. A publish made from inside
    /// a listener returns immediately and is delivered by the outer drain.
    fn deliver(&self, seq: u64) {
        let me = thread::current().id();
        let mut delivery = self.lock_delivery();
        loop {
            if delivery.delivered >= seq {
                return;
            }
            let drainer = delivery.drainer;
            match drainer {
                None => break,
                Some(drainer) if drainer == me => return,
                Some(_) => {
                    delivery = self
                        .delivered
                        .wait(delivery)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        delivery.drainer = Some(me);
        while let Some((next, snapshot)) = delivery.queue.pop_front() {
            drop(delivery);
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| self.notifier.notify(&snapshot)))
            {
                error!(
                    reason = %panic_reason(&*payload),
                    phase = %snapshot.phase(),
                    "state listener panicked"
                );
            }
            delivery = self.lock_delivery();
            delivery.delivered = next;
            self.delivered.notify_all();
        }
        delivery.drainer = None;
        self.delivered.notify_all();
    }
}

impl<D: FlowData, M: Send + Sync + 'static> FlowEngine<D, M> {
    /// Create an engine over `steps` in evaluation order.
    ///
    /// The engine starts at rest: no current step, nothing loading. Call
    /// [`sync`](Self::sync) to evaluate.
    pub fn new(steps: Vec<StepConfig<D>>) -> Self {
        Self::with_interceptors(steps, Vec::new())
    }

    /// Create an engine with an initial interceptor list.
    pub fn with_interceptors(steps: Vec<StepConfig<D>>, interceptors: Vec<BoxInterceptor<D>>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                steps,
                registry: RwLock::new(ModuleRegistry::new()),
                interceptors: RwLock::new(interceptors),
                publisher: Arc::new(Publisher::new()),
            }),
        }
    }

    /// Register the loader for `step_type`. Returns `true` if one was replaced.
    pub fn register_loader<T>(&self, step_type: impl Into<String>, loader: T) -> bool
    where
        T: ModuleLoader<M> + 'static,
    {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(step_type, loader)
    }

    /// Whether a loader is registered for `step_type`.
    pub fn has_loader(&self, step_type: &str) -> bool {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .has(step_type)
    }

    /// Append an interceptor. It sees transitions from the next `sync` on.
    pub fn add_interceptor(&self, interceptor: impl Interceptor<D> + 'static) {
        self.inner
            .interceptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(interceptor));
    }

    /// Re-evaluate the flow against `data`.
    ///
    /// Returns once the new step (or completion) and, when a load starts,
    /// the loading state have been delivered to listeners. The module itself
    /// is loaded on a spawned task. Syncing with data that resolves to the
    /// current step republishes the existing snapshot without firing
    /// interceptors or reloading.
    ///
    /// Listeners see snapshots in publish order, one at a time. If another
    /// thread is delivering, this call blocks until its own snapshots have
    /// been delivered. Listener panics are logged and never interrupt the
    /// transition. Matcher panics propagate to the caller.
    pub fn sync(&self, data: &D) {
        let next = find_next_step(&self.inner.steps, data);
        let previous = self.inner.publisher.snapshot();
        let previous_step_id = previous.current_step_id.as_deref();
        let ctx = TransitionContext {
            previous_step_id,
            data,
        };

        let Some(step) = next else {
            if previous.is_completed {
                return;
            }
            info!(previous_step_id, "flow completed");
            run_on_complete(&self.interceptors(), ctx);
            self.inner.publisher.begin(EngineState {
                is_completed: true,
                ..EngineState::initial()
            });
            return;
        };

        if previous_step_id == Some(step.id.as_str()) {
            self.inner.publisher.republish();
            return;
        }

        debug!(previous_step_id, step_id = %step.id, step_type = %step.step_type, "step changed");
        run_before_step(&self.interceptors(), step, ctx);
        let activation = self.inner.publisher.begin(EngineState {
            current_step_id: Some(step.id.clone()),
            ..EngineState::initial()
        });
        self.load(activation, step);
    }

    /// The latest published snapshot.
    pub fn state(&self) -> StateSnapshot<M> {
        self.inner.publisher.snapshot()
    }

    /// Configuration of the current step, if any.
    pub fn current_step_config(&self) -> Option<&StepConfig<D>> {
        let state = self.state();
        let id = state.current_step_id.as_deref()?;
        self.inner.steps.iter().find(|step| step.id == id)
    }

    /// Completion statistics for `data`. Does not touch engine state.
    pub fn progress(&self, data: &D) -> ProgressInfo {
        progress::progress(&self.inner.steps, data)
    }

    /// The configured steps in evaluation order.
    pub fn steps(&self) -> &[StepConfig<D>] {
        &self.inner.steps
    }

    /// Call `listener` with every snapshot published from now on.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StateSnapshot<M>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.publisher.notifier.subscribe(listener)
    }

    /// A receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<StateSnapshot<M>> {
        self.inner.publisher.watch.subscribe()
    }

    fn interceptors(&self) -> Vec<BoxInterceptor<D>> {
        self.inner
            .interceptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn load(&self, activation: u64, step: &StepConfig<D>) {
        let publisher = &self.inner.publisher;
        let step_type = step.step_type.clone();

        let loader = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&step_type);
        let Some(loader) = loader else {
            error!(step_id = %step.id, %step_type, "no loader registered for step type; register one before syncing");
            publisher.update_if_current(activation, |state| EngineState {
                error: Some(EngineError::NoLoader { step_type }),
                is_loading: false,
                ..state.clone()
            });
            return;
        };

        let Ok(handle) = Handle::try_current() else {
            error!(step_id = %step.id, %step_type, "module load needs a tokio runtime");
            publisher.update_if_current(activation, |state| EngineState {
                error: Some(EngineError::RuntimeUnavailable { step_type }),
                is_loading: false,
                ..state.clone()
            });
            return;
        };

        if !publisher.update_if_current(activation, |state| EngineState {
            is_loading: true,
            error: None,
            ..state.clone()
        }) {
            return;
        }

        let publisher = Arc::clone(publisher);
        handle.spawn(async move {
            let applied = match loader.load().await {
                Ok(module) => {
                    let module = Arc::new(module.into_primary());
                    publisher.update_if_current(activation, |state| EngineState {
                        active_module: Some(module),
                        is_loading: false,
                        error: None,
                        ..state.clone()
                    })
                }
                Err(e) => {
                    error!(%step_type, error = %e, "failed to load module");
                    let message = e.to_string();
                    let step_type = step_type.clone();
                    publisher.update_if_current(activation, |state| EngineState {
                        error: Some(EngineError::LoadFailed { step_type, message }),
                        is_loading: false,
                        ..state.clone()
                    })
                }
            };
            if applied {
                debug!(%step_type, "module load settled");
            } else {
                debug!(%step_type, activation, "discarding stale module load");
            }
        });
    }
}

impl<D, M> Clone for FlowEngine<D, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, M> fmt::Debug for FlowEngine<D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .publisher
            .current
            .lock()
            .map(|current| Arc::clone(&current.snapshot))
            .ok();
        f.debug_struct("FlowEngine")
            .field("steps", &self.inner.steps.len())
            .field("state", &state)
            .finish()
    }
}
