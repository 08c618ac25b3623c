//! Pointing-device sensor node
//!
//! A touch sensor does not draw anything. During the pick pass it appends
//! itself to the traversal state's sensor list, so every shape visited after
//! it in the same grouping scope reports the sensor in its pick result. The
//! compositor drives the over/active edges from those results and the sensor
//! turns them into events, one per transition.

use crate::events::CompositorEvent;
use crate::graph::{NodeBehavior, NodeKey};
use crate::services::Services;
use crate::traverse::{TraverseCtx, TraverseMode};

/// Sensor governing the shapes that follow it in its parent group
pub struct TouchSensorBehavior {
    /// Disabled sensors never appear in pick results
    pub enabled: bool,
    over: bool,
    active: bool,
}

impl Default for TouchSensorBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchSensorBehavior {
    pub fn new() -> Self {
        Self {
            enabled: true,
            over: false,
            active: false,
        }
    }

    /// True while the pointer is over a governed shape
    pub fn is_over(&self) -> bool {
        self.over
    }

    /// True between press and release over a governed shape
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record pointer-over state, emitting an event on each transition
    pub fn set_over(&mut self, key: NodeKey, srv: &mut Services, over: bool) {
        if self.over == over {
            return;
        }
        self.over = over;
        srv.events.push(CompositorEvent::SensorOver { node: key, over });
        srv.request_redraw();
    }

    /// Record press/release state, emitting an event on each transition
    pub fn set_active(&mut self, key: NodeKey, srv: &mut Services, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        srv.events
            .push(CompositorEvent::SensorActive { node: key, active });
        srv.request_redraw();
    }
}

impl NodeBehavior for TouchSensorBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        // The entry is truncated when the enclosing group scope restores,
        // which is what limits the sensor to its own grouping scope.
        if ctx.state.mode == TraverseMode::Pick && self.enabled {
            ctx.state.sensors.push(key);
        }
    }
}
