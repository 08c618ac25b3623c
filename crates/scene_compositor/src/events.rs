//! Outbound compositor events
//!
//! State transitions that scripts and UI layers observe (activation edges,
//! bind/unbind edges) are queued here during traversal and drained by the
//! embedder after each frame.

use std::collections::VecDeque;

use crate::graph::NodeKey;

/// Observable state change produced during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorEvent {
    /// A timed node entered or left the Active state
    NodeActive {
        /// Node that changed
        node: NodeKey,
        /// New activation state
        active: bool,
    },
    /// A bindable node was bound or unbound on its stack
    NodeBound {
        /// Node that changed
        node: NodeKey,
        /// New bound state
        bound: bool,
    },
    /// A pointing sensor went over or left its shapes
    SensorOver {
        /// Sensor node
        node: NodeKey,
        /// True while the pointer is over a governed shape
        over: bool,
    },
    /// A pointing sensor was activated (pressed) or released
    SensorActive {
        /// Sensor node
        node: NodeKey,
        /// True on press, false on release
        active: bool,
    },
}

/// FIFO queue of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<CompositorEvent>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&mut self, event: CompositorEvent) {
        self.events.push_back(event);
    }

    /// Pop the oldest pending event
    pub fn poll(&mut self) -> Option<CompositorEvent> {
        self.events.pop_front()
    }

    /// Drain every pending event in order
    pub fn drain(&mut self) -> Vec<CompositorEvent> {
        self.events.drain(..).collect()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
