//! Resources ("cubes") that agents locate, haul, and deliver.

use crate::types::{ResourceId, Vec3};

/// A discrete resource in the world.
///
/// A resource is `carried` while attached to an agent and `retired` once it
/// has been dropped inside the delivery zone, at which point it leaves play
/// permanently.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub position: Vec3,
    pub carried: bool,
    pub retired: bool,
}

impl Resource {
    pub fn new(id: ResourceId, position: Vec3) -> Self {
        Self {
            id,
            position,
            carried: false,
            retired: false,
        }
    }

    /// Whether the resource can still be targeted for pickup.
    pub fn available(&self) -> bool {
        !self.carried && !self.retired
    }
}
