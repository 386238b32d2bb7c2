use std::collections::HashMap;
use crate::bodies::{BodyId, RigidBody, INACTIVE_INDEX};
use crate::error::PhysicsError;
use crate::Result;

/// Generic storage trait for physics objects
pub trait Storage<T, H> {
    /// Creates a new empty storage
    fn new() -> Self;

    /// Adds an item to the storage and returns its handle
    fn add(&mut self, item: T) -> H;

    /// Gets a reference to an item by its handle
    fn get(&self, handle: H) -> Option<&T>;

    /// Gets a mutable reference to an item by its handle
    fn get_mut(&mut self, handle: H) -> Option<&mut T>;

    /// Returns the number of items in the storage
    fn len(&self) -> usize;

    /// Returns whether the storage is empty
    fn is_empty(&self) -> bool;

    /// Clears all items from the storage
    fn clear(&mut self);

    /// Returns all handles in insertion order
    fn handles(&self) -> Vec<H>;
}

/// Dense storage for rigid bodies, addressable by [`BodyId`].
///
/// Bodies keep their insertion order, which is also the order active indices are handed
/// out in. Island-local copies of a storage keep the ids of the world they came from.
#[derive(Debug, Clone, Default)]
pub struct BodyStorage {
    items: Vec<RigidBody>,
    lookup: HashMap<BodyId, usize>,
    next_id: u32,
}

impl Storage<RigidBody, BodyId> for BodyStorage {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, mut item: RigidBody) -> BodyId {
        let id = BodyId::new(self.next_id);
        self.next_id += 1;
        item.set_id(id);
        self.insert(item);
        id
    }

    fn get(&self, handle: BodyId) -> Option<&RigidBody> {
        self.lookup.get(&handle).map(|&index| &self.items[index])
    }

    fn get_mut(&mut self, handle: BodyId) -> Option<&mut RigidBody> {
        self.lookup.get(&handle).map(|&index| &mut self.items[index])
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.lookup.clear();
    }

    fn handles(&self) -> Vec<BodyId> {
        self.items.iter().map(RigidBody::get_id).collect()
    }
}

impl BodyStorage {
    /// Stores a body under the id it already carries, replacing any body with that id
    pub(crate) fn insert(&mut self, body: RigidBody) {
        let id = body.get_id();
        debug_assert!(id.is_valid());
        match self.lookup.get(&id) {
            Some(&index) => self.items[index] = body,
            None => {
                self.lookup.insert(id, self.items.len());
                self.items.push(body);
            }
        }
    }

    /// Gets a body by its id, returning an error if not found
    pub fn get_body(&self, id: BodyId) -> Result<&RigidBody> {
        self.get(id)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Body with id {:?} not found", id)))
    }

    /// Gets a mutable reference to a body by its id, returning an error if not found
    pub fn get_body_mut(&mut self, id: BodyId) -> Result<&mut RigidBody> {
        self.get_mut(id)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Body with id {:?} not found", id)))
    }

    /// Borrows two different bodies mutably at the same time
    pub fn get_pair_mut(&mut self, first: BodyId, second: BodyId) -> Result<(&mut RigidBody, &mut RigidBody)> {
        let first_index = self.index_of(first)?;
        let second_index = self.index_of(second)?;

        if first_index == second_index {
            return Err(PhysicsError::InvalidParameter(format!(
                "Body {:?} cannot be paired with itself",
                first
            )));
        }

        if first_index < second_index {
            let (low, high) = self.items.split_at_mut(second_index);
            Ok((&mut low[first_index], &mut high[0]))
        } else {
            let (low, high) = self.items.split_at_mut(first_index);
            Ok((&mut high[0], &mut low[second_index]))
        }
    }

    /// Iterates over all bodies in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.items.iter()
    }

    /// Iterates mutably over all bodies in insertion order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RigidBody> {
        self.items.iter_mut()
    }

    /// Hands out active indices to every non-static body and returns the active body list.
    ///
    /// `active[i]` is the body with active index `i`. Static bodies get `INACTIVE_INDEX`.
    pub(crate) fn update_active_bodies(&mut self, max_active_bodies: u32) -> Result<Vec<BodyId>> {
        let mut active = Vec::new();
        for body in &mut self.items {
            if body.is_static() {
                body.set_active_index(INACTIVE_INDEX);
                continue;
            }

            if active.len() >= max_active_bodies as usize {
                return Err(PhysicsError::InvalidParameter(format!(
                    "More than {} active bodies",
                    max_active_bodies
                )));
            }

            body.set_active_index(active.len() as u32);
            active.push(body.get_id());
        }

        Ok(active)
    }

    fn index_of(&self, id: BodyId) -> Result<usize> {
        self.lookup
            .get(&id)
            .copied()
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Body with id {:?} not found", id)))
    }
}
