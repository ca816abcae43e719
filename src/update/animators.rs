//! Animators and constraints applied by the update thread each frame.
//!
//! Animators bake interpolated values into the frame's buffer for as long
//! as they are active; when one finishes it queues an animation-finished
//! notification and is dropped. Constraints are evaluated after animators,
//! so they observe the frame's animated values.

use glam::{Vec3, Vec4};

use crate::common::BufferIndex;
use crate::scene::graph::SceneGraph;
use crate::scene::NodeKey;
use crate::update::notifications::NotifierId;

/// Which property an animator drives, with its endpoints.
#[derive(Debug, Clone, Copy)]
pub enum AnimatorTarget {
    Position { from: Vec3, to: Vec3 },
    Size { from: Vec3, to: Vec3 },
    Color { from: Vec4, to: Vec4 },
}

/// Linear interpolation of one node property over a fixed duration.
pub struct PropertyAnimator {
    pub node: NodeKey,
    pub target: AnimatorTarget,
    pub duration: f32,
    pub notifier: NotifierId,
    elapsed: f32,
}

impl PropertyAnimator {
    #[must_use]
    pub fn new(node: NodeKey, target: AnimatorTarget, duration: f32, notifier: NotifierId) -> Self {
        Self {
            node,
            target,
            duration,
            notifier,
            elapsed: 0.0,
        }
    }

    /// Advances the animation and bakes the interpolated value. Returns
    /// true when the animation has reached its end.
    pub fn animate(&mut self, graph: &mut SceneGraph, buffer: BufferIndex, elapsed: f32) -> bool {
        self.elapsed += elapsed;
        let progress = if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        };

        if let Some(node) = graph.get_node_mut(self.node) {
            match self.target {
                AnimatorTarget::Position { from, to } => {
                    node.position.bake(buffer, from.lerp(to, progress));
                }
                AnimatorTarget::Size { from, to } => {
                    node.size.bake(buffer, from.lerp(to, progress));
                }
                AnimatorTarget::Color { from, to } => {
                    node.color.bake(buffer, from.lerp(to, progress));
                }
            }
        } else {
            // Target destroyed mid-flight; finish silently.
            return true;
        }

        progress >= 1.0
    }
}

/// A constraint re-evaluated every frame after animations.
///
/// The closure writes derived values into the frame's buffer; constraints
/// on a node are expected to write every frame they are active.
pub struct Constraint {
    apply: Box<dyn FnMut(&mut SceneGraph, BufferIndex) + Send>,
}

impl Constraint {
    pub fn new(apply: impl FnMut(&mut SceneGraph, BufferIndex) + Send + 'static) -> Self {
        Self {
            apply: Box::new(apply),
        }
    }

    pub fn apply(&mut self, graph: &mut SceneGraph, buffer: BufferIndex) {
        (self.apply)(graph, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::node::Node;

    #[test]
    fn test_animator_interpolates_and_finishes() {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(Node::new(), graph.root());
        let mut animator = PropertyAnimator::new(
            node,
            AnimatorTarget::Position {
                from: Vec3::ZERO,
                to: Vec3::new(10.0, 0.0, 0.0),
            },
            1.0,
            NotifierId(1),
        );

        assert!(!animator.animate(&mut graph, 0, 0.5));
        let halfway = graph.get_node(node).unwrap().position.get(0);
        assert!((halfway.x - 5.0).abs() < 1e-5);

        assert!(animator.animate(&mut graph, 0, 0.5));
        let end = graph.get_node(node).unwrap().position.get(0);
        assert!((end.x - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_animator_on_destroyed_node_finishes() {
        let mut graph = SceneGraph::new();
        let node = graph.add_node(Node::new(), graph.root());
        graph.remove_node(node);

        let mut animator = PropertyAnimator::new(
            node,
            AnimatorTarget::Color {
                from: Vec4::ONE,
                to: Vec4::ZERO,
            },
            1.0,
            NotifierId(2),
        );
        assert!(animator.animate(&mut graph, 0, 0.1));
    }

    #[test]
    fn test_constraint_sees_animated_value() {
        let mut graph = SceneGraph::new();
        let leader = graph.add_node(Node::new(), graph.root());
        let follower = graph.add_node(Node::new(), graph.root());

        let mut animator = PropertyAnimator::new(
            leader,
            AnimatorTarget::Position {
                from: Vec3::ZERO,
                to: Vec3::new(4.0, 0.0, 0.0),
            },
            1.0,
            NotifierId(3),
        );
        let mut constraint = Constraint::new(move |graph, buffer| {
            let Some(source) = graph.get_node(leader) else {
                return;
            };
            let position = source.position.get(buffer);
            if let Some(node) = graph.get_node_mut(follower) {
                node.position.bake(buffer, position + Vec3::new(0.0, 1.0, 0.0));
            }
        });

        animator.animate(&mut graph, 0, 1.0);
        constraint.apply(&mut graph, 0);

        let followed = graph.get_node(follower).unwrap().position.get(0);
        assert!((followed.x - 4.0).abs() < 1e-5);
        assert!((followed.y - 1.0).abs() < 1e-5);
    }
}
