//! Evaluation frames.
//!
//! A `Frame` is a shared handle to one scope of variable bindings. Frames form
//! a parent chain; lookups walk the chain outward, binds always land in the
//! frame they are made on.
//!
//! Every frame has a write-once interposer slot. Once an interposer is
//! installed, all `bind`/`lookup` calls on that frame are routed through it,
//! and it receives a `RawFrame` to delegate to the original operations. A
//! frame created with `child()` from an interposed parent asks the parent's
//! interposer for its own interposer, so protection is in place before any
//! binding reaches the new frame.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::EvalError;
use crate::value::Value;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique frame identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    fn fresh() -> Self {
        FrameId(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Intercepts the operations of one frame.
pub trait FrameInterposer: Send + Sync {
    /// Handle `frame.bind(name, value)`.
    fn bind(&self, frame: RawFrame<'_>, name: &str, value: Value) -> Result<(), EvalError>;

    /// Handle `frame.lookup(name)`.
    fn lookup(&self, frame: RawFrame<'_>, name: &str) -> Option<Value>;

    /// Interposer for a child frame being created under an interposed frame.
    fn on_child(&self, child: FrameId) -> Option<Arc<dyn FrameInterposer>>;

    fn as_any(&self) -> &dyn Any;
}

/// Returned when a frame already has an interposer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0} already has an interposer installed")]
pub struct InterposerOccupied(pub FrameId);

struct FrameInner {
    id: FrameId,
    bindings: RwLock<FxHashMap<String, Value>>,
    parent: Option<Frame>,
    interposer: OnceLock<Arc<dyn FrameInterposer>>,
}

/// Shared handle to an evaluation frame.
#[derive(Clone)]
pub struct Frame(Arc<FrameInner>);

impl Frame {
    /// Create a root frame.
    pub fn new() -> Self {
        Frame::build(FrameId::fresh(), None, None)
    }

    fn build(
        id: FrameId,
        parent: Option<Frame>,
        interposer: Option<Arc<dyn FrameInterposer>>,
    ) -> Self {
        Frame(Arc::new(FrameInner {
            id,
            bindings: RwLock::new(FxHashMap::default()),
            parent,
            interposer: interposer.map_or_else(OnceLock::new, OnceLock::from),
        }))
    }

    /// Create a frame whose lookups fall back to `self`.
    #[must_use]
    pub fn child(&self) -> Frame {
        let id = FrameId::fresh();
        let inherited = self
            .interposer()
            .and_then(|interposer| interposer.on_child(id));
        Frame::build(id, Some(self.clone()), inherited)
    }

    pub fn id(&self) -> FrameId {
        self.0.id
    }

    pub fn parent(&self) -> Option<&Frame> {
        self.0.parent.as_ref()
    }

    /// Outermost frame of the chain.
    pub fn root(&self) -> Frame {
        let mut frame = self;
        while let Some(parent) = frame.parent() {
            frame = parent;
        }
        frame.clone()
    }

    pub fn bind(&self, name: &str, value: Value) -> Result<(), EvalError> {
        match self.interposer() {
            Some(interposer) => interposer.bind(RawFrame(self), name, value),
            None => {
                self.bind_unguarded(name, value);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.interposer() {
            Some(interposer) => interposer.lookup(RawFrame(self), name),
            None => RawFrame(self).lookup(name),
        }
    }

    /// Write a binding without consulting the interposer.
    pub(crate) fn bind_unguarded(&self, name: &str, value: Value) {
        self.0.bindings.write().insert(name.to_owned(), value);
    }

    /// Install `interposer`. Fails if one is already installed.
    pub fn install_interposer(
        &self,
        interposer: Arc<dyn FrameInterposer>,
    ) -> Result<(), InterposerOccupied> {
        self.0
            .interposer
            .set(interposer)
            .map_err(|_| InterposerOccupied(self.id()))
    }

    pub fn interposer(&self) -> Option<&Arc<dyn FrameInterposer>> {
        self.0.interposer.get()
    }

    pub fn is_interposed(&self) -> bool {
        self.0.interposer.get().is_some()
    }

    /// A handle that does not keep the frame alive.
    pub fn downgrade(&self) -> WeakFrame {
        WeakFrame(Arc::downgrade(&self.0))
    }

    /// Bindings visible from this frame, excluding the root frame's. Inner
    /// bindings shadow outer ones.
    pub(crate) fn capture(&self) -> FxHashMap<String, Value> {
        let mut captures = FxHashMap::default();
        let mut frame = self;
        while let Some(parent) = frame.parent() {
            for (name, value) in frame.0.bindings.read().iter() {
                captures
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
            frame = parent;
        }
        captures
    }

    /// Whether both handles refer to the same frame.
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Names bound directly on this frame, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.bindings.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id())
            .field("parent", &self.parent().map(Frame::id))
            .field("interposed", &self.is_interposed())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a frame.
#[derive(Clone, Debug)]
pub struct WeakFrame(Weak<FrameInner>);

impl WeakFrame {
    /// The frame, if anything still holds it.
    pub fn upgrade(&self) -> Option<Frame> {
        self.0.upgrade().map(Frame)
    }
}

/// The un-intercepted operations of a frame, handed to its interposer.
#[derive(Copy, Clone)]
pub struct RawFrame<'a>(&'a Frame);

impl<'a> RawFrame<'a> {
    pub fn id(self) -> FrameId {
        self.0.id()
    }

    pub fn frame(self) -> &'a Frame {
        self.0
    }

    pub fn bind(self, name: &str, value: Value) {
        self.0.bind_unguarded(name, value);
    }

    /// Local binding, then the parent's (intercepted) lookup.
    pub fn lookup(self, name: &str) -> Option<Value> {
        if let Some(value) = self.0 .0.bindings.read().get(name) {
            return Some(value.clone());
        }
        self.0.parent().and_then(|parent| parent.lookup(name))
    }
}
