//! Units shipped with the engine

use loom_ecs::TransformPropagation;

use crate::descriptor::SystemDescriptor;
use crate::error::ConstructError;
use crate::system::{Dependencies, System, SystemContext, SystemUnit};

/// Recomputes every [`GlobalTransform`](loom_ecs::GlobalTransform) from the roots down.
///
/// Request it in a stage after gameplay logic and before anything that
/// reads world-space positions. It has no dependencies, so it activates as
/// soon as startup begins.
pub struct TransformPropagationSystem;

impl TransformPropagationSystem {
    pub const NAME: &'static str = "transform_propagation";
}

impl System for TransformPropagationSystem {
    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        let updated = TransformPropagation::run(ctx.world_mut());
        log::trace!("propagated {} world transforms", updated);
    }
}

impl SystemUnit for TransformPropagationSystem {
    fn descriptor() -> SystemDescriptor {
        SystemDescriptor::new(Self::NAME)
    }

    fn construct(_deps: &Dependencies<'_>) -> Result<Self, ConstructError> {
        Ok(Self)
    }
}
