//! Execution sessions
//!
//! Each engine owns one [`Session`]: a state machine, an interrupt flag and a
//! frame stack. Only one thread executes on an engine at a time; nested
//! frames on the executing thread re-enter freely.
//!
//! ## State machine
//!
//! ```text
//! Idle ──enter──▶ Running ──exit──▶ {Idle, Interrupted, Faulted} ──▶ Idle
//! ```
//!
//! The terminal state of the last top-level call is kept as the session's
//! outcome; the session itself always returns to `Idle`.
//!
//! ## Safe points
//!
//! The interrupt flag is polled:
//! - on entry to every frame (script, host call, foreign engine)
//! - whenever script code calls `ScriptScope::poll` (loop back-edges)
//! - when long-running host code calls `HostContext::check_interrupt`
//!
//! Garbage collection requested while a call is active is deferred to the
//! end of the top-level call.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use hostbind_sdk::{HostContext, HostError, HostResult};
use parking_lot::ReentrantMutex;

use crate::engine::{Engine, EngineCore};
use crate::error::{from_host_call, ExecutionFault, ScriptError, ScriptFault, ScriptResult};
use crate::value::{ScriptFunction, ScriptValue};
use crate::scope::ScriptScope;

/// State of an engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// No call in progress
    Idle = 0,
    /// A call is in progress
    Running = 1,
    /// The last call was interrupted
    Interrupted = 2,
    /// The last call failed
    Faulted = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionState::Running,
            2 => SessionState::Interrupted,
            3 => SessionState::Faulted,
            _ => SessionState::Idle,
        }
    }
}

/// Kind of an active frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Script code of this engine
    Script,
    /// Host code called from script
    HostCall,
    /// A call into another engine
    Foreign,
}

/// Per-engine execution state
pub(crate) struct Session {
    state: AtomicU8,
    outcome: AtomicU8,
    interrupt: AtomicBool,
    gc_pending: AtomicBool,
    frames: ReentrantMutex<RefCell<Vec<FrameKind>>>,
    max_depth: usize,
}

impl Session {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
            outcome: AtomicU8::new(SessionState::Idle as u8),
            interrupt: AtomicBool::new(false),
            gc_pending: AtomicBool::new(false),
            frames: ReentrantMutex::new(RefCell::new(Vec::new())),
            max_depth: max_depth.max(1),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Terminal state of the last top-level call
    pub(crate) fn outcome(&self) -> SessionState {
        SessionState::from_u8(self.outcome.load(Ordering::Acquire))
    }

    /// Request an interrupt. Returns false when the session is not running.
    pub(crate) fn request_interrupt(&self) -> bool {
        if self.state() != SessionState::Running {
            return false;
        }
        self.interrupt.store(true, Ordering::Release);
        true
    }

    pub(crate) fn is_interrupt_requested(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Safe point
    pub(crate) fn poll(&self) -> ScriptResult<()> {
        if self.is_interrupt_requested() {
            Err(ScriptError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Depth on the calling thread; 0 when another thread holds the session
    pub(crate) fn depth(&self) -> usize {
        match self.frames.try_lock() {
            Some(frames) => frames.borrow().len(),
            None => 0,
        }
    }

    /// Is any call in progress on any thread?
    pub(crate) fn is_busy(&self) -> bool {
        match self.frames.try_lock() {
            Some(frames) => !frames.borrow().is_empty(),
            None => true,
        }
    }

    pub(crate) fn defer_gc(&self) {
        self.gc_pending.store(true, Ordering::Release);
    }

    /// Run `f` as a frame of `kind`. `on_idle` runs after every top-level
    /// frame; its argument is true when a deferred collection is pending.
    pub(crate) fn run<R>(
        &self,
        kind: FrameKind,
        on_idle: impl FnOnce(bool),
        f: impl FnOnce() -> ScriptResult<R>,
    ) -> ScriptResult<R> {
        let frames = self.frames.lock();
        let depth = frames.borrow().len();
        let top_level = depth == 0;

        if top_level {
            self.interrupt.store(false, Ordering::Release);
            self.state.store(SessionState::Running as u8, Ordering::Release);
            tracing::trace!(?kind, "session running");
        } else if depth >= self.max_depth {
            return Err(ScriptError::Script(ScriptFault::named(
                "RangeError",
                "maximum call depth exceeded",
            )));
        }

        frames.borrow_mut().push(kind);
        let result = self.poll().and_then(|_| f());
        frames.borrow_mut().pop();

        if top_level {
            let outcome = match &result {
                Ok(_) => SessionState::Idle,
                Err(ScriptError::Interrupted) => SessionState::Interrupted,
                Err(_) => SessionState::Faulted,
            };
            if outcome == SessionState::Interrupted {
                tracing::debug!("session interrupted");
            }
            self.outcome.store(outcome as u8, Ordering::Release);
            self.interrupt.store(false, Ordering::Release);
            self.state.store(SessionState::Idle as u8, Ordering::Release);
            on_idle(self.gc_pending.swap(false, Ordering::AcqRel));
        }
        result
    }

    /// Run `f` with the session held and no frames active. Returns `None`
    /// when the session is busy.
    pub(crate) fn with_idle<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let frames = self.frames.try_lock()?;
        if !frames.borrow().is_empty() {
            return None;
        }
        Some(f())
    }
}

// ============================================================================
// Engine-side frame helpers
// ============================================================================

impl EngineCore {
    /// Run `f` as a frame of this engine
    pub(crate) fn run_frame<R>(&self, kind: FrameKind, f: impl FnOnce() -> ScriptResult<R>) -> ScriptResult<R> {
        self.session.run(
            kind,
            |collect| {
                if collect {
                    self.sweep();
                } else {
                    self.cache.release_dropped();
                }
            },
            f,
        )
    }

    /// Call host code. Host failures become execution faults; an interrupt
    /// propagates only when it was requested on this engine.
    pub(crate) fn call_host<R>(&self, f: impl FnOnce(&dyn HostContext) -> HostResult<R>) -> ScriptResult<R> {
        let core = self.arc()?;
        self.run_frame(FrameKind::HostCall, || {
            let ctx = EngineContext { core };
            f(&ctx).map_err(|err| from_host_call(err, self.session.is_interrupt_requested()))
        })
    }

    /// Call a script function. Functions owned by another engine run on that
    /// engine under a foreign frame here.
    pub(crate) fn call_function(&self, function: &ScriptFunction, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        if function.engine_id() != self.id {
            let owner = function.engine()?;
            let result = self.run_frame(FrameKind::Foreign, || {
                let args = args
                    .iter()
                    .map(|arg| owner.adopt(arg.clone()))
                    .collect::<ScriptResult<Vec<_>>>()?;
                owner.call_function(function, &args).map_err(|err| {
                    if err.is_interrupt() && !self.session.is_interrupt_requested() {
                        ScriptError::Execution(ExecutionFault::nested(err))
                    } else {
                        err
                    }
                })
            })?;
            return self.adopt(result);
        }

        let core = self.arc()?;
        self.run_frame(FrameKind::Script, || {
            let scope = ScriptScope::new(Arc::clone(&core), Arc::clone(function.document()));
            function.body().call(&scope, args)
        })
    }
}

// ============================================================================
// Host context
// ============================================================================

/// Context handed to host code called from script.
///
/// Host code reaches the calling engine through [`downcast_context`]:
///
/// ```ignore
/// let engine = downcast_context::<EngineContext>(ctx)?.engine();
/// engine.evaluate("nested()")?;
/// ```
///
/// [`downcast_context`]: hostbind_sdk::downcast_context
pub struct EngineContext {
    core: Arc<EngineCore>,
}

impl EngineContext {
    /// Handle to the calling engine
    pub fn engine(&self) -> Engine {
        Engine::from_core(Arc::clone(&self.core))
    }
}

impl HostContext for EngineContext {
    fn engine_id(&self) -> u64 {
        self.core.id
    }

    fn engine_name(&self) -> &str {
        &self.core.name
    }

    fn call_depth(&self) -> usize {
        self.core.session.depth()
    }

    fn is_interrupt_requested(&self) -> bool {
        self.core.session.is_interrupt_requested()
    }

    fn check_interrupt(&self) -> HostResult<()> {
        self.core.session.poll().map_err(HostError::from)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineContext({})", self.core.name)
    }
}
