//! The thunk queue and the closure-hash state machine.
//!
//! `hash_frame` never blocks: if the code is memoized it fires the
//! receiver synchronously, otherwise the receiver joins the frame's
//! pending FIFO and at most one computation walks the frame. The
//! computation runs in stages -- parent hash, definition-site identity,
//! then each argument strictly left to right -- suspending whenever an
//! argument future is still empty. Suspended continuations are resumed by
//! `fulfill` through the FIFO thunk queue, so receiver ordering is
//! registration order everywhere.
//!
//! The finished code is a keyed hash (domain key 42) over the collected
//! words: a pure function of the site identity, the parent's code, and
//! the argument hashes. Evaluation order never leaks into it.

use std::collections::VecDeque;
use std::rc::Rc;

use wake_common::Hash128;

use crate::frame::{FrameArena, FrameId};
use crate::value::Value;

/// Domain key for binding-frame hashes.
const FRAME_KEY: u64 = 42;
/// Domain key for closure values (site folded with the frame code).
const CLOSURE_KEY: u64 = 3;

/// A queued unit of work.
pub type Thunk = Box<dyn FnOnce(&mut Runtime)>;
/// A continuation awaiting a 128-bit hash code.
pub type HashReceiver = Box<dyn FnOnce(&mut Runtime, Hash128)>;
/// A continuation awaiting a resolved value.
pub type ValueReceiver = Box<dyn FnOnce(&mut Runtime, Rc<Value>)>;

/// The single-threaded cooperative runtime: the frame arena plus the
/// thunk queue that drives suspended continuations.
#[derive(Default)]
pub struct Runtime {
    pub frames: FrameArena,
    queue: VecDeque<Thunk>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a thunk behind everything already queued.
    pub fn spawn(&mut self, thunk: Thunk) {
        self.queue.push_back(thunk);
    }

    /// Drain the queue until nothing is left to run.
    pub fn run_until_idle(&mut self) {
        while let Some(thunk) = self.queue.pop_front() {
            thunk(self);
        }
    }

    // ── Futures ─────────────────────────────────────────────────────────

    /// Fulfill one argument future. Waiters resume through the queue in
    /// registration order.
    pub fn fulfill(&mut self, frame: FrameId, arg: usize, value: Rc<Value>) {
        let waiters = self.frames.get_mut(frame).futures[arg].fulfill(Rc::clone(&value));
        for waiter in waiters {
            let value = Rc::clone(&value);
            self.spawn(Box::new(move |rt| waiter(rt, value)));
        }
    }

    // ── Value hashing ───────────────────────────────────────────────────

    /// Hash a value: data immediately, closures once their frame's code
    /// resolves.
    pub fn hash_value(&mut self, value: &Value, receiver: HashReceiver) {
        match value.data_hash() {
            Some(code) => receiver(self, code),
            None => {
                let Value::Closure { frame, site } = value else {
                    unreachable!("only closures lack a data hash");
                };
                let site = *site;
                self.hash_frame(
                    *frame,
                    Box::new(move |rt, frame_code| {
                        let mut words = Vec::new();
                        site.push_words(&mut words);
                        frame_code.push_words(&mut words);
                        receiver(rt, Hash128::keyed(CLOSURE_KEY, &words));
                    }),
                );
            }
        }
    }

    // ── Frame hashing ───────────────────────────────────────────────────

    /// Request a frame's closure hash. The receiver is invoked exactly
    /// once: synchronously if the code is memoized, otherwise after every
    /// argument future has resolved.
    pub fn hash_frame(&mut self, frame: FrameId, receiver: HashReceiver) {
        if let Some(code) = self.frames.get(frame).hashcode {
            receiver(self, code);
            return;
        }
        let entry = self.frames.get_mut(frame);
        entry.pending.push_back(receiver);
        if entry.in_flight {
            return;
        }
        entry.in_flight = true;
        let parent = entry.parent;

        match parent {
            Some(parent) => self.hash_frame(
                parent,
                Box::new(move |rt, parent_code| {
                    let mut words = Vec::new();
                    parent_code.push_words(&mut words);
                    rt.hash_stage_site(frame, words);
                }),
            ),
            None => self.hash_stage_site(frame, Vec::new()),
        }
    }

    /// Fold in the definition-site identity, then start on the arguments.
    fn hash_stage_site(&mut self, frame: FrameId, mut words: Vec<u64>) {
        self.frames.get(frame).site.push_words(&mut words);
        self.hash_stage_arg(frame, words, 0);
    }

    /// Hash argument `arg`, then continue with the next; finalize once all
    /// arguments are in.
    fn hash_stage_arg(&mut self, frame: FrameId, mut words: Vec<u64>, arg: usize) {
        if arg == self.frames.get(frame).arg_count() {
            let code = Hash128::keyed(FRAME_KEY, &words);
            let entry = self.frames.get_mut(frame);
            entry.hashcode = Some(code);
            entry.in_flight = false;
            let pending = std::mem::take(&mut entry.pending);
            for receiver in pending {
                receiver(self, code);
            }
            return;
        }

        let next: HashReceiver = Box::new(move |rt, code| {
            code.push_words(&mut words);
            rt.hash_stage_arg(frame, words, arg + 1);
        });

        let ready = self.frames.get(frame).futures[arg].value().cloned();
        match ready {
            Some(value) => self.hash_value(&value, next),
            None => {
                let waiter: ValueReceiver = Box::new(move |rt, value| rt.hash_value(&value, next));
                let raced = self.frames.get_mut(frame).futures[arg].await_value(waiter);
                debug_assert!(raced.is_none(), "the future was empty just above");
            }
        }
    }
}
