//! Per-frame clock distribution to time-dependent nodes
//!
//! Time-dependent nodes register once in the [`TimeRegistry`] and get their
//! [`update_time`](crate::graph::NodeBehavior::update_time) hook called every
//! frame, strictly before any traversal pass. The tick order is never
//! structurally mutated while a pass runs: registrations during a pass are
//! queued and unregistrations only clear the membership flag, with the order
//! list swept once the pass ends.

mod activation;

pub use activation::{Activation, ActivationTimes, TimedAction};

use slotmap::SecondaryMap;

use crate::graph::{NodeKey, SceneGraph};
use crate::services::Services;

/// Context handed to time ticks
pub struct TickCtx<'a> {
    /// Scene graph, for dirty marking and sibling access
    pub graph: &'a mut SceneGraph,
    /// Shared compositor services
    pub srv: &'a mut Services,
}

/// Ordered registry of time-dependent nodes
#[derive(Default)]
pub struct TimeRegistry {
    order: Vec<NodeKey>,
    registered: SecondaryMap<NodeKey, ()>,
    pending: Vec<NodeKey>,
    ticking: bool,
}

impl TimeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the tick order; repeated calls are no-ops
    pub fn register(&mut self, key: NodeKey) {
        if self.registered.insert(key, ()).is_none() {
            if self.ticking {
                self.pending.push(key);
            } else {
                self.order.push(key);
            }
        }
    }

    /// Drop a node from the tick order; repeated calls are no-ops
    ///
    /// During a pass only the membership flag clears; the order list is
    /// swept afterwards.
    pub fn unregister(&mut self, key: NodeKey) {
        if self.registered.remove(key).is_some() && !self.ticking {
            self.order.retain(|k| *k != key);
        }
    }

    /// True while the node is in the tick order
    pub fn is_registered(&self, key: NodeKey) -> bool {
        self.registered.contains_key(key)
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// True when no node is registered
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    fn begin_tick(&mut self) -> Vec<NodeKey> {
        self.ticking = true;
        std::mem::take(&mut self.order)
    }

    fn end_tick(&mut self, mut order: Vec<NodeKey>) {
        order.append(&mut self.pending);
        order.retain(|k| self.registered.contains_key(*k));
        self.order = order;
        self.ticking = false;
    }
}

/// Tick every registered node once, in registration order
///
/// A node unregistered earlier in the same pass is skipped; a node
/// registered during the pass first ticks next frame. A node whose behavior
/// returns `false` or whose arena slot disappeared is unregistered.
pub fn run_tick_pass(graph: &mut SceneGraph, srv: &mut Services) {
    let order = srv.timing.begin_tick();
    for &key in &order {
        if !srv.timing.is_registered(key) {
            continue;
        }
        let Some(mut behavior) = graph.take_behavior(key) else {
            srv.timing.unregister(key);
            continue;
        };
        let keep = behavior.update_time(key, &mut TickCtx { graph, srv });
        graph.put_behavior(key, behavior);
        if !keep {
            srv.timing.unregister(key);
        }
    }
    srv.timing.end_tick(order);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::CompositorConfig;
    use crate::graph::{NodeBehavior, NodeKind, SceneNode};
    use crate::traverse::TraverseCtx;

    type TickLog = Rc<RefCell<Vec<&'static str>>>;

    struct TickProbe {
        log: TickLog,
        label: &'static str,
        keep: bool,
        unregister: Option<NodeKey>,
        register: Option<NodeKey>,
    }

    impl TickProbe {
        fn new(log: &TickLog, label: &'static str) -> Box<Self> {
            Box::new(Self {
                log: Rc::clone(log),
                label,
                keep: true,
                unregister: None,
                register: None,
            })
        }
    }

    impl NodeBehavior for TickProbe {
        fn traverse(&mut self, _key: NodeKey, _ctx: &mut TraverseCtx<'_>) {}

        fn update_time(&mut self, _key: NodeKey, ctx: &mut TickCtx<'_>) -> bool {
            self.log.borrow_mut().push(self.label);
            if let Some(victim) = self.unregister.take() {
                ctx.srv.timing.unregister(victim);
            }
            if let Some(newcomer) = self.register.take() {
                ctx.srv.timing.register(newcomer);
            }
            self.keep
        }
    }

    fn setup() -> (SceneGraph, Services, TickLog) {
        (
            SceneGraph::new(),
            Services::new(&CompositorConfig::default()),
            Rc::new(RefCell::new(Vec::new())),
        )
    }

    fn add(
        graph: &mut SceneGraph,
        srv: &mut Services,
        probe: Box<TickProbe>,
    ) -> NodeKey {
        let key = graph.insert(
            SceneNode::new(NodeKind::AudioClip).with_behavior(probe),
            srv,
        );
        srv.timing.register(key);
        key
    }

    #[test]
    fn test_ticks_in_registration_order() {
        let (mut graph, mut srv, log) = setup();
        add(&mut graph, &mut srv, TickProbe::new(&log, "a"));
        add(&mut graph, &mut srv, TickProbe::new(&log, "b"));
        add(&mut graph, &mut srv, TickProbe::new(&log, "c"));

        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut graph, mut srv, log) = setup();
        let key = add(&mut graph, &mut srv, TickProbe::new(&log, "a"));
        srv.timing.register(key);
        srv.timing.register(key);
        assert_eq!(srv.timing.len(), 1);

        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_unregister_during_pass_skips_later_entry() {
        let (mut graph, mut srv, log) = setup();
        let victim = graph.insert(
            SceneNode::new(NodeKind::AudioClip).with_behavior(TickProbe::new(&log, "c")),
            &mut srv,
        );
        let mut probe = TickProbe::new(&log, "a");
        probe.unregister = Some(victim);
        add(&mut graph, &mut srv, probe);
        srv.timing.register(victim);

        // Order is a, c; a unregisters c before c runs.
        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(!srv.timing.is_registered(victim));

        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a", "a"]);
    }

    #[test]
    fn test_register_during_pass_defers_to_next_frame() {
        let (mut graph, mut srv, log) = setup();
        let newcomer = graph.insert(
            SceneNode::new(NodeKind::AudioClip).with_behavior(TickProbe::new(&log, "new")),
            &mut srv,
        );
        let mut probe = TickProbe::new(&log, "a");
        probe.register = Some(newcomer);
        add(&mut graph, &mut srv, probe);

        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a"]);

        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["a", "a", "new"]);
    }

    #[test]
    fn test_returning_false_unregisters() {
        let (mut graph, mut srv, log) = setup();
        let mut probe = TickProbe::new(&log, "once");
        probe.keep = false;
        let key = add(&mut graph, &mut srv, probe);

        run_tick_pass(&mut graph, &mut srv);
        run_tick_pass(&mut graph, &mut srv);
        assert_eq!(*log.borrow(), vec!["once"]);
        assert!(!srv.timing.is_registered(key));
    }

    #[test]
    fn test_stale_node_is_dropped_from_order() {
        let (mut graph, mut srv, log) = setup();
        let key = add(&mut graph, &mut srv, TickProbe::new(&log, "gone"));
        // Remove the node without going through detach bookkeeping.
        graph.remove(key, &mut srv);
        srv.timing.register(key);

        run_tick_pass(&mut graph, &mut srv);
        assert!(log.borrow().is_empty());
        assert!(!srv.timing.is_registered(key));
    }
}
