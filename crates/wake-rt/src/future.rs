//! One-shot argument futures.
//!
//! A future holds exactly one of: nothing yet, a FIFO of receivers
//! awaiting the value, or the resolved value. Fulfillment is a one-time
//! transition; waiters are dispatched through the runtime's thunk queue
//! in registration order.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::queue::ValueReceiver;
use crate::value::Value;

/// A one-shot cell for one argument of a binding frame.
#[derive(Default)]
pub struct Future {
    state: FutureState,
}

#[derive(Default)]
enum FutureState {
    #[default]
    Empty,
    Waiting(VecDeque<ValueReceiver>),
    Ready(Rc<Value>),
}

impl Future {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved value, if fulfillment already happened.
    pub fn value(&self) -> Option<&Rc<Value>> {
        match &self.state {
            FutureState::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, FutureState::Ready(_))
    }

    /// Register a receiver for the value. Returns the value immediately if
    /// it is already there, in which case nothing was registered.
    pub(crate) fn await_value(&mut self, receiver: ValueReceiver) -> Option<Rc<Value>> {
        match &mut self.state {
            FutureState::Ready(v) => Some(Rc::clone(v)),
            FutureState::Waiting(waiters) => {
                waiters.push_back(receiver);
                None
            }
            FutureState::Empty => {
                let mut waiters = VecDeque::new();
                waiters.push_back(receiver);
                self.state = FutureState::Waiting(waiters);
                None
            }
        }
    }

    /// Transition to resolved, returning the waiters to dispatch.
    ///
    /// # Panics
    ///
    /// Panics if the future was already fulfilled; it is a one-shot cell.
    pub(crate) fn fulfill(&mut self, value: Rc<Value>) -> VecDeque<ValueReceiver> {
        match std::mem::replace(&mut self.state, FutureState::Ready(value)) {
            FutureState::Empty => VecDeque::new(),
            FutureState::Waiting(waiters) => waiters,
            FutureState::Ready(_) => panic!("argument future fulfilled twice"),
        }
    }
}
