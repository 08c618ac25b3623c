//! Behaviors of every scene node kind
//!
//! Each kind pairs a [`NodeKind`] tag with a [`NodeBehavior`] implementation
//! that answers the traversal passes it cares about and ignores the rest.
//! [`create_node`] builds a node with its kind's default behavior; callers
//! that need specific parameters construct the behavior themselves and
//! attach it with [`SceneNode::with_behavior`].

pub mod bindables;
pub mod grouping;
pub mod layer;
pub mod layout;
pub mod light;
pub mod media_nodes;
pub mod sensor;
pub mod shape;
pub mod sound;

pub use bindables::{BackgroundBehavior, FogBehavior, NavigationInfoBehavior, ViewpointBehavior};
pub use grouping::{GroupBehavior, Transform2DBehavior, Transform3DBehavior};
pub use layer::Layer3DBehavior;
pub use layout::{Justify, LayoutBehavior, PathLayoutBehavior};
pub use light::{ClipPlaneBehavior, DirectionalLightBehavior};
pub use media_nodes::{AudioClipBehavior, MovieTextureBehavior};
pub use sensor::TouchSensorBehavior;
pub use shape::{Geometry3D, Shape2DBehavior, Shape3DBehavior};
pub use sound::{Sound2DBehavior, Sound3DBehavior};

use crate::camera::{CameraPose, NavigationParams};
use crate::graph::{NodeBehavior, NodeKind, SceneNode};
use crate::render::FogParams;

/// Default behavior for a node kind
pub fn create_behavior(kind: NodeKind) -> Box<dyn NodeBehavior> {
    match kind {
        NodeKind::Group => Box::new(GroupBehavior::new()),
        NodeKind::Transform2D => Box::new(Transform2DBehavior::new()),
        NodeKind::Transform3D => Box::new(Transform3DBehavior::new()),
        NodeKind::Shape2D => Box::new(Shape2DBehavior::new(1.0, 1.0)),
        NodeKind::Shape3D => Box::new(Shape3DBehavior::cube(1.0)),
        NodeKind::Background => Box::new(BackgroundBehavior::new([0.0, 0.0, 0.0, 1.0])),
        NodeKind::Viewpoint => Box::new(ViewpointBehavior::new(CameraPose::default())),
        NodeKind::NavigationInfo => {
            Box::new(NavigationInfoBehavior::new(NavigationParams::default()))
        }
        NodeKind::Fog => Box::new(FogBehavior::new(FogParams::default())),
        NodeKind::Layer3D => Box::new(Layer3DBehavior::new(1.0, 1.0)),
        NodeKind::AudioClip => Box::new(AudioClipBehavior::new()),
        NodeKind::MovieTexture => Box::new(MovieTextureBehavior::new()),
        NodeKind::Sound2D => Box::new(Sound2DBehavior::new()),
        NodeKind::Sound3D => Box::new(Sound3DBehavior::new()),
        NodeKind::TouchSensor => Box::new(TouchSensorBehavior::new()),
        NodeKind::DirectionalLight => Box::new(DirectionalLightBehavior::new()),
        NodeKind::ClipPlane => Box::new(ClipPlaneBehavior::new()),
        NodeKind::Layout => Box::new(LayoutBehavior::new(1.0, 1.0)),
        NodeKind::PathLayout => Box::new(PathLayoutBehavior::new(Vec::new(), 1.0)),
    }
}

/// Node of the given kind with its default behavior attached
pub fn create_node(kind: NodeKind) -> SceneNode {
    SceneNode::new(kind).with_behavior(create_behavior(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [NodeKind; 19] = [
        NodeKind::Group,
        NodeKind::Transform2D,
        NodeKind::Transform3D,
        NodeKind::Shape2D,
        NodeKind::Shape3D,
        NodeKind::Background,
        NodeKind::Viewpoint,
        NodeKind::NavigationInfo,
        NodeKind::Fog,
        NodeKind::Layer3D,
        NodeKind::AudioClip,
        NodeKind::MovieTexture,
        NodeKind::Sound2D,
        NodeKind::Sound3D,
        NodeKind::TouchSensor,
        NodeKind::DirectionalLight,
        NodeKind::ClipPlane,
        NodeKind::Layout,
        NodeKind::PathLayout,
    ];

    #[test]
    fn every_kind_gets_a_behavior() {
        for kind in ALL_KINDS {
            let node = create_node(kind);
            assert_eq!(node.kind, kind);
        }
    }

    #[test]
    fn bindable_hook_matches_bindable_kinds() {
        for kind in ALL_KINDS {
            let mut behavior = create_behavior(kind);
            assert_eq!(
                behavior.bindable_mut().is_some(),
                kind.is_bindable(),
                "bindable hook mismatch for {kind:?}"
            );
        }
    }
}
