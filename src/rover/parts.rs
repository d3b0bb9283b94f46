//! Typed mapping from rover part roles to the entities that play them.
//!
//! The mapping is resolved once when the rover is assembled. A missing body
//! is reported immediately instead of being discovered frame after frame.

use bevy::prelude::*;
use smallvec::SmallVec;
use thiserror::Error;

/// Number of wheels on the rover.
pub const WHEEL_COUNT: usize = 4;

/// Role a scene node plays in the rover assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartRole {
    Body,
    /// Wheel slot, indexing [`crate::config::RoverConfig::wheel_offsets`].
    Wheel(usize),
}

/// Node names used by the built-in rover assembly.
pub const DEFAULT_PART_NAMES: &[(&str, PartRole)] = &[
    ("Body", PartRole::Body),
    ("Wheel_FL", PartRole::Wheel(0)),
    ("Wheel_FR", PartRole::Wheel(1)),
    ("Wheel_RL", PartRole::Wheel(2)),
    ("Wheel_RR", PartRole::Wheel(3)),
];

/// Name the default table gives to `role`.
pub fn part_name(role: PartRole) -> Option<&'static str> {
    DEFAULT_PART_NAMES
        .iter()
        .find(|(_, r)| *r == role)
        .map(|(name, _)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartMapError {
    #[error("no node named for the body role")]
    MissingBody,
    #[error("role {0:?} is claimed by more than one node")]
    DuplicateRole(PartRole),
    #[error("wheel slot {0} is out of range")]
    WheelSlot(usize),
}

/// Resolved rover parts. The body is always present.
#[derive(Clone, Debug, PartialEq)]
pub struct PartMap {
    pub body: Entity,
    /// Wheels indexed by slot; empty slots are `None`.
    pub wheels: SmallVec<[Option<Entity>; WHEEL_COUNT]>,
}

impl PartMap {
    /// Match named nodes to roles through `table`. Unlisted names are
    /// ignored; missing wheels are allowed, a missing body is not.
    pub fn resolve<'a>(
        nodes: impl IntoIterator<Item = (Entity, &'a str)>,
        table: &[(&str, PartRole)],
    ) -> Result<Self, PartMapError> {
        let mut body = None;
        let mut wheels: SmallVec<[Option<Entity>; WHEEL_COUNT]> =
            SmallVec::from_elem(None, WHEEL_COUNT);

        for (entity, name) in nodes {
            let Some(&(_, role)) = table.iter().find(|(n, _)| *n == name) else {
                continue;
            };
            let slot = match role {
                PartRole::Body => &mut body,
                PartRole::Wheel(index) => wheels
                    .get_mut(index)
                    .ok_or(PartMapError::WheelSlot(index))?,
            };
            if slot.replace(entity).is_some() {
                return Err(PartMapError::DuplicateRole(role));
            }
        }

        let body = body.ok_or(PartMapError::MissingBody)?;
        Ok(Self { body, wheels })
    }

    /// Entity playing `role`, if resolved.
    pub fn get(&self, role: PartRole) -> Option<Entity> {
        match role {
            PartRole::Body => Some(self.body),
            PartRole::Wheel(index) => self.wheels.get(index).copied().flatten(),
        }
    }

    /// Every resolved part, body first.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        std::iter::once(self.body).chain(self.wheels.iter().flatten().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn resolves_full_assembly() {
        let nodes = [
            (e(1), "Body"),
            (e(2), "Wheel_FL"),
            (e(3), "Wheel_FR"),
            (e(4), "Wheel_RL"),
            (e(5), "Wheel_RR"),
            (e(6), "Antenna"),
        ];
        let map = PartMap::resolve(nodes, DEFAULT_PART_NAMES).unwrap();
        assert_eq!(map.body, e(1));
        assert_eq!(map.get(PartRole::Wheel(3)), Some(e(5)));
        assert_eq!(map.entities().count(), 5);
    }

    #[test]
    fn missing_body_fails_fast() {
        let nodes = [(e(2), "Wheel_FL"), (e(3), "Chassis")];
        assert_eq!(
            PartMap::resolve(nodes, DEFAULT_PART_NAMES),
            Err(PartMapError::MissingBody)
        );
    }

    #[test]
    fn duplicate_roles_are_rejected() {
        let nodes = [(e(1), "Body"), (e(2), "Body")];
        assert_eq!(
            PartMap::resolve(nodes, DEFAULT_PART_NAMES),
            Err(PartMapError::DuplicateRole(PartRole::Body))
        );
    }

    #[test]
    fn wheels_are_optional() {
        let map = PartMap::resolve([(e(9), "Body")], DEFAULT_PART_NAMES).unwrap();
        assert_eq!(map.get(PartRole::Wheel(0)), None);
        assert_eq!(map.entities().collect::<Vec<_>>(), vec![e(9)]);
    }

    #[test]
    fn custom_table_maps_other_asset_names() {
        let table = [("chassis_main", PartRole::Body), ("tire.001", PartRole::Wheel(0))];
        let map = PartMap::resolve([(e(1), "tire.001"), (e(2), "chassis_main")], &table).unwrap();
        assert_eq!(map.body, e(2));
        assert_eq!(map.get(PartRole::Wheel(0)), Some(e(1)));
        assert_eq!(part_name(PartRole::Wheel(1)), Some("Wheel_FR"));
    }
}
