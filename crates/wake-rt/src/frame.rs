//! The binding-frame arena.
//!
//! Runtime frames form a tree through parent links plus an invoker chain
//! for stack traces. Frames are arena-allocated and addressed by dense
//! ids; hash receivers hold the id of the frame they wait on, and they
//! always drain before the frame could go away, so no back-reference
//! bookkeeping is needed.

use std::collections::VecDeque;

use wake_ast::expr::DefBinding;
use wake_common::{Hash128, Location};

use crate::future::Future;
use crate::queue::HashReceiver;

/// A dense handle into the frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

/// Why a frame was allocated. Only call frames contribute to stack
/// traces: a definition frame's location is where its binding level was
/// written, not a place the user called anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Allocated by applying a function; its location is a call site.
    Call,
    /// Allocated for one fractured binding level.
    Definition,
}

/// One runtime binding frame: the scope link, the call provenance, the
/// definition-site identity, and one future per formal argument.
pub struct Frame {
    /// Enclosing lexical frame, if any.
    pub parent: Option<FrameId>,
    /// The frame that invoked this one, for stack traces.
    pub invoker: Option<FrameId>,
    pub kind: FrameKind,
    /// Where the call was written (for definition frames, where the
    /// binding was).
    pub call_site: Location,
    /// Structural hash of the defining binding.
    pub site: Hash128,
    pub(crate) futures: Vec<Future>,
    /// Memoized closure hash, once every argument resolved.
    pub(crate) hashcode: Option<Hash128>,
    /// Receivers awaiting the closure hash, FIFO.
    pub(crate) pending: VecDeque<HashReceiver>,
    /// Whether a hash computation is already walking this frame.
    pub(crate) in_flight: bool,
}

impl Frame {
    pub fn arg_count(&self) -> usize {
        self.futures.len()
    }

    pub fn future(&self, arg: usize) -> &Future {
        &self.futures[arg]
    }

    /// The memoized closure hash, if it has been computed.
    pub fn hashcode(&self) -> Option<Hash128> {
        self.hashcode
    }
}

/// Arena of all live frames.
#[derive(Default)]
pub struct FrameArena {
    frames: Vec<Frame>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a call frame with an explicit definition-site hash.
    pub fn alloc(
        &mut self,
        parent: Option<FrameId>,
        invoker: Option<FrameId>,
        call_site: Location,
        site: Hash128,
        nargs: usize,
    ) -> FrameId {
        self.alloc_with_kind(FrameKind::Call, parent, invoker, call_site, site, nargs)
    }

    /// Allocate a definition frame for a fractured binding level, taking
    /// the site identity from the binding's structural hash.
    pub fn alloc_for_binding(
        &mut self,
        binding: &DefBinding,
        parent: Option<FrameId>,
        invoker: Option<FrameId>,
        call_site: Location,
        nargs: usize,
    ) -> FrameId {
        self.alloc_with_kind(
            FrameKind::Definition,
            parent,
            invoker,
            call_site,
            binding.site_hash(),
            nargs,
        )
    }

    fn alloc_with_kind(
        &mut self,
        kind: FrameKind,
        parent: Option<FrameId>,
        invoker: Option<FrameId>,
        call_site: Location,
        site: Hash128,
        nargs: usize,
    ) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            parent,
            invoker,
            kind,
            call_site,
            site,
            futures: (0..nargs).map(|_| Future::new()).collect(),
            hashcode: None,
            pending: VecDeque::new(),
            in_flight: false,
        });
        id
    }

    pub fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The call sites along a frame's invoker chain, innermost first.
    /// Definition frames are skipped: their locations name where a
    /// binding level was written, which is not part of the call history.
    pub fn stack_trace(&self, from: FrameId) -> Vec<Location> {
        let mut out = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let frame = self.get(id);
            if frame.kind == FrameKind::Call {
                out.push(frame.call_site);
            }
            cursor = frame.invoker;
        }
        out
    }
}
