//! Query - joined views over the component store
//!
//! A query is declared with a tuple of 1-6 slots. A bare component type is a
//! required slot; [`Opt<T>`] is an optional slot that yields `Option<&T>`.
//!
//! ```ignore
//! let movers = Query::<(Position, Velocity, Opt<Name>)>::new();
//! for (entity, (position, velocity, name)) in movers.iter(&world) {
//!     // ...
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;

use loom_core::TypeKey;

use crate::component::Component;
use crate::entity::EntityId;
use crate::store::ComponentStore;
use crate::world::World;

/// Whether a slot must be present for an entity to match
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Required,
    Optional,
}

/// One component slot of a query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuerySlot {
    pub key: TypeKey,
    pub access: Access,
}

/// Ordered slot list describing what a query reads
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueryShape {
    slots: Vec<QuerySlot>,
}

impl QueryShape {
    /// Shape of a fetch tuple
    pub fn of<Q: Fetch>() -> Self {
        let mut slots = Vec::new();
        Q::describe(&mut slots);
        Self { slots }
    }

    /// Build a shape from explicit slots
    pub fn from_slots(slots: Vec<QuerySlot>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[QuerySlot] {
        &self.slots
    }

    /// Keys of the required slots
    pub fn required(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.access == Access::Required)
            .map(|slot| slot.key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match slot.access {
                Access::Required => write!(f, "{}", slot.key)?,
                Access::Optional => write!(f, "Opt<{}>", slot.key)?,
            }
        }
        f.write_str(")")
    }
}

/// Optional slot marker
pub struct Opt<T>(PhantomData<fn() -> T>);

/// Something that can be fetched for a single entity from the store.
///
/// Implemented for every [`Component`] (required), for [`Opt<T>`]
/// (optional) and for tuples of up to six fetches.
pub trait Fetch: 'static {
    /// What the fetch yields for one entity
    type Item<'w>;

    /// Fetch for one entity; `None` when a required slot is missing
    fn fetch<'w>(store: &'w ComponentStore, entity: EntityId) -> Option<Self::Item<'w>>;

    /// Append this fetch's slots
    fn describe(slots: &mut Vec<QuerySlot>);
}

impl<T: Component> Fetch for T {
    type Item<'w> = &'w T;

    fn fetch<'w>(store: &'w ComponentStore, entity: EntityId) -> Option<Self::Item<'w>> {
        store.try_get::<T>(entity)
    }

    fn describe(slots: &mut Vec<QuerySlot>) {
        slots.push(QuerySlot {
            key: TypeKey::of::<T>(),
            access: Access::Required,
        });
    }
}

impl<T: Component> Fetch for Opt<T> {
    type Item<'w> = Option<&'w T>;

    fn fetch<'w>(store: &'w ComponentStore, entity: EntityId) -> Option<Self::Item<'w>> {
        store.try_get_optional::<T>(entity)
    }

    fn describe(slots: &mut Vec<QuerySlot>) {
        slots.push(QuerySlot {
            key: TypeKey::of::<T>(),
            access: Access::Optional,
        });
    }
}

macro_rules! impl_fetch_tuple {
    ($($name:ident),+) => {
        impl<$($name: Fetch),+> Fetch for ($($name,)+) {
            type Item<'w> = ($(<$name as Fetch>::Item<'w>,)+);

            fn fetch<'w>(store: &'w ComponentStore, entity: EntityId) -> Option<Self::Item<'w>> {
                Some(($(<$name as Fetch>::fetch(store, entity)?,)+))
            }

            fn describe(slots: &mut Vec<QuerySlot>) {
                $(<$name as Fetch>::describe(slots);)+
            }
        }
    };
}

impl_fetch_tuple!(A);
impl_fetch_tuple!(A, B);
impl_fetch_tuple!(A, B, C);
impl_fetch_tuple!(A, B, C, D);
impl_fetch_tuple!(A, B, C, D, E);
impl_fetch_tuple!(A, B, C, D, E, F);

/// Joins one entity into a query item
pub type Joiner<Q> = for<'w> fn(&'w ComponentStore, EntityId) -> Option<<Q as Fetch>::Item<'w>>;

/// A live, re-evaluable view over entities matching `Q`.
///
/// The query itself holds no borrow; each call borrows the world for its
/// own duration only.
pub struct Query<Q: Fetch> {
    joiner: Joiner<Q>,
    shape: QueryShape,
    custom_joiner: bool,
}

impl<Q: Fetch> Query<Q> {
    /// Query using the direct store join
    pub fn new() -> Self {
        Self {
            joiner: Q::fetch,
            shape: QueryShape::of::<Q>(),
            custom_joiner: false,
        }
    }

    /// Query whose slots are fetched through a custom joiner, e.g. one that
    /// resolves a slot from the entity's parent instead of the entity itself
    pub fn with_joiner(joiner: Joiner<Q>) -> Self {
        Self {
            joiner,
            shape: QueryShape::of::<Q>(),
            custom_joiner: true,
        }
    }

    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    pub fn has_custom_joiner(&self) -> bool {
        self.custom_joiner
    }

    /// Iterate matching entities in registry order.
    ///
    /// The live entity list is copied up front; items are joined lazily.
    pub fn iter<'w>(&self, world: &'w World) -> QueryIter<'w, Q> {
        QueryIter {
            store: world.components(),
            entities: world.registry().snapshot().into_iter(),
            joiner: self.joiner,
        }
    }

    /// Point lookup; `None` if the entity is dead or misses a required slot
    pub fn get<'w>(&self, world: &'w World, entity: EntityId) -> Option<Q::Item<'w>> {
        if !world.is_alive(entity) {
            return None;
        }
        (self.joiner)(world.components(), entity)
    }

    /// Whether the entity currently matches
    pub fn contains(&self, world: &World, entity: EntityId) -> bool {
        self.get(world, entity).is_some()
    }

    /// Ids of every matching entity, safe to hold while mutating the world
    pub fn entities(&self, world: &World) -> Vec<EntityId> {
        self.iter(world).map(|(entity, _)| entity).collect()
    }

    pub fn count(&self, world: &World) -> usize {
        self.iter(world).count()
    }
}

impl<Q: Fetch> Default for Query<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: Fetch> Clone for Query<Q> {
    fn clone(&self) -> Self {
        Self {
            joiner: self.joiner,
            shape: self.shape.clone(),
            custom_joiner: self.custom_joiner,
        }
    }
}

impl<Q: Fetch> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("shape", &format_args!("{}", self.shape))
            .field("custom_joiner", &self.custom_joiner)
            .finish()
    }
}

/// Iterator returned by [`Query::iter`]
pub struct QueryIter<'w, Q: Fetch> {
    store: &'w ComponentStore,
    entities: std::vec::IntoIter<EntityId>,
    joiner: Joiner<Q>,
}

impl<'w, Q: Fetch> Iterator for QueryIter<'w, Q> {
    type Item = (EntityId, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        for entity in self.entities.by_ref() {
            if let Some(item) = (self.joiner)(self.store, entity) {
                return Some((entity, item));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entities.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct A(u32);
    impl Component for A {}

    #[derive(Debug, PartialEq)]
    struct B(u32);
    impl Component for B {}

    #[test]
    fn test_shape_of_tuple() {
        let shape = QueryShape::of::<(A, Opt<B>)>();
        assert_eq!(
            shape.slots(),
            &[
                QuerySlot { key: TypeKey::of::<A>(), access: Access::Required },
                QuerySlot { key: TypeKey::of::<B>(), access: Access::Optional },
            ]
        );
        assert_eq!(shape.required().collect::<Vec<_>>(), vec![TypeKey::of::<A>()]);
        assert_eq!(shape.to_string(), "(A, Opt<B>)");
    }

    #[test]
    fn test_required_and_optional_join() {
        let mut world = World::new();
        let both = world.spawn();
        let only_a = world.spawn();
        let only_b = world.spawn();

        world.add(both, A(1)).unwrap();
        world.add(both, B(10)).unwrap();
        world.add(only_a, A(2)).unwrap();
        world.add(only_b, B(20)).unwrap();

        let query = Query::<(A, Opt<B>)>::new();
        let rows: Vec<_> = query.iter(&world).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (both, (&A(1), Some(&B(10)))));
        assert_eq!(rows[1], (only_a, (&A(2), None)));
    }

    #[test]
    fn test_point_lookup() {
        let mut world = World::new();
        let e = world.spawn();
        world.add(e, A(5)).unwrap();

        let query = Query::<(A, B)>::new();
        assert!(query.get(&world, e).is_none());

        world.add(e, B(6)).unwrap();
        assert_eq!(query.get(&world, e), Some((&A(5), &B(6))));

        world.despawn(e);
        assert!(query.get(&world, e).is_none());
    }

    #[test]
    fn test_view_reflects_live_store() {
        let mut world = World::new();
        let query = Query::<A>::new();

        let first = world.spawn();
        world.add(first, A(1)).unwrap();
        assert_eq!(query.entities(&world), vec![first]);

        let second = world.spawn();
        world.add(second, A(2)).unwrap();
        world.remove::<A>(first);
        assert_eq!(query.entities(&world), vec![second]);
        assert_eq!(query.count(&world), 1);
    }

    #[test]
    fn test_six_slots() {
        let query = Query::<(A, B, Opt<A>, Opt<B>, A, B)>::new();
        assert_eq!(query.shape().len(), 6);
    }
}
