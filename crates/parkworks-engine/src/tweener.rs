//! Entity position interpolation for variable-rate rendering.
//!
//! When frames are drawn faster than the simulation ticks, the tweener
//! remembers where every moving entity was before and after the last tick and
//! blends between the two when a frame is drawn. The blended position is
//! written as a render override on the registry. Logical positions are never
//! touched, so interpolation cannot leak into the simulation.

use parkworks_world::coords::CoordsXYZ;
use parkworks_world::entity::EntityId;
use parkworks_world::registry::EntityRegistry;

/// Pre- and post-tick positions of every tweened entity.
#[derive(Debug, Default)]
pub struct EntityTweener {
    entities: Vec<EntityId>,
    pre: Vec<CoordsXYZ>,
    /// `None` for entities that no longer exist after the tick.
    post: Vec<Option<CoordsXYZ>>,
}

impl EntityTweener {
    /// A tweener with nothing captured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture positions before a tick.
    ///
    /// Any interpolation from the previous frame is undone first so the
    /// captured positions are logical ones.
    pub fn pre_tick(&mut self, registry: &mut EntityRegistry) {
        self.restore(registry);
        self.reset();
        for entity in registry.iter().filter(|e| e.kind().should_tween()) {
            self.entities.push(entity.id);
            self.pre.push(entity.position);
        }
    }

    /// Capture positions after a tick.
    pub fn post_tick(&mut self, registry: &EntityRegistry) {
        self.post.clear();
        self.post.extend(
            self.entities
                .iter()
                .map(|id| registry.get(*id).map(|e| e.position)),
        );
    }

    /// Write positions blended by `alpha` as render overrides.
    pub fn tween(&self, registry: &mut EntityRegistry, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        for ((id, pre), post) in self.entities.iter().zip(&self.pre).zip(&self.post) {
            let Some(post) = post else {
                continue;
            };
            if pre == post {
                registry.clear_render_position(*id);
            } else {
                registry.set_render_position(*id, pre.lerp(*post, alpha));
            }
        }
    }

    /// Put every tracked entity back at its logical position.
    pub fn restore(&self, registry: &mut EntityRegistry) {
        for id in &self.entities {
            registry.clear_render_position(*id);
        }
    }

    /// Forget all captured positions.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.pre.clear();
        self.post.clear();
    }

    /// Entities captured by the last [`pre_tick`](Self::pre_tick).
    pub fn tracked(&self) -> usize {
        self.entities.len()
    }

    /// Whether the tweener holds a complete pre/post pair.
    pub fn is_primed(&self) -> bool {
        !self.entities.is_empty() && self.post.len() == self.entities.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
