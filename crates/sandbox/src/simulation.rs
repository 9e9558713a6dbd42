use glam::{Quat, Vec3};

use repnet::{NetworkNode, ReplicatedEntityId, TransformReplica, Transport};

const ORBIT_RADIUS: f32 = 5.0;
const ORBIT_SPEED: f32 = 0.8;

/// Pose of the `index`-th moving entity at `now_ms`: a circle around the
/// origin, each entity phase-shifted and at its own height.
pub fn orbit(index: usize, now_ms: u64) -> (Quat, Vec3) {
    let phase = index as f32 * 0.7;
    let angle = now_ms as f32 / 1000.0 * ORBIT_SPEED + phase;
    let (sin, cos) = angle.sin_cos();

    let rotation = Quat::from_rotation_y(angle);
    let translation = Vec3::new(cos * ORBIT_RADIUS, index as f32, sin * ORBIT_RADIUS);
    (rotation, translation)
}

/// Moves every entity this node is authoritative for.
pub fn animate<T: Transport>(node: &mut NetworkNode<T>, now_ms: u64) {
    let owned: Vec<ReplicatedEntityId> = node
        .entities()
        .filter(|entity| entity.is_authoritative())
        .map(|entity| entity.id)
        .collect();

    for (index, id) in owned.into_iter().enumerate() {
        let (rotation, translation) = orbit(index, now_ms);
        if let Some(transform) = node.entity_state_mut::<TransformReplica>(id) {
            transform.set_trs(Vec3::ONE, rotation, translation);
        }
    }
}
