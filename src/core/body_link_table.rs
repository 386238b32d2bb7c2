use std::sync::atomic::{AtomicU32, Ordering};

/// Union-find node for one active body slot
#[derive(Debug)]
struct BodyLink {
    /// Index of a body in the same island with an index lower than or equal to this one
    linked_to: AtomicU32,

    /// Dense island index of this body, assigned while building islands
    island_index: u32,
}

/// Lock-free union-find over active body indices.
///
/// Every slot points at a slot with an equal or lower index. A slot that points at
/// itself is the root of its set, and the root is always the lowest index in the set.
/// Because links only ever point downwards, following them can never cycle, which is
/// what makes it safe to walk the table while other threads are linking.
#[derive(Debug)]
pub struct BodyLinkTable {
    links: Box<[BodyLink]>,
}

impl BodyLinkTable {
    /// Creates a table for `max_active_bodies` slots, each in its own set
    pub fn new(max_active_bodies: u32) -> Self {
        let links = (0..max_active_bodies)
            .map(|index| BodyLink {
                linked_to: AtomicU32::new(index),
                island_index: 0,
            })
            .collect();

        Self { links }
    }

    /// Number of body slots in the table
    #[inline]
    pub fn max_active_bodies(&self) -> u32 {
        self.links.len() as u32
    }

    /// Merges the sets containing `first` and `second`.
    ///
    /// Does nothing if either index is out of range, so static and inactive bodies never
    /// join an island. Safe to call from many threads at once.
    pub fn link_bodies(&self, first: u32, second: u32) {
        let max = self.max_active_bodies();
        if first >= max || second >= max {
            return;
        }

        let mut first_root = first;
        let mut second_root = second;

        loop {
            // Resume from the previous roots; if a CAS lost a race they now point further down.
            first_root = self.get_lowest_body_index(first_root);
            second_root = self.get_lowest_body_index(second_root);

            if first_root == second_root {
                return;
            }

            // Always hang the higher root under the lower one. The root we found must still
            // point at itself; if it does not, another thread re-parented it and we retry.
            let (low, high) = if first_root < second_root {
                (first_root, second_root)
            } else {
                (second_root, first_root)
            };

            if self.links[high as usize]
                .linked_to
                .compare_exchange_weak(high, low, Ordering::Relaxed, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            // Shortcut the bodies we were called with straight to the root. If another thread
            // already moved them lower, fetch_min leaves them alone.
            self.links[first as usize].linked_to.fetch_min(low, Ordering::Relaxed);
            self.links[second as usize].linked_to.fetch_min(low, Ordering::Relaxed);
            return;
        }
    }

    /// Returns the root (lowest index) of the set containing `index`
    pub fn get_lowest_body_index(&self, index: u32) -> u32 {
        let mut index = index;
        loop {
            let linked_to = self.links[index as usize].linked_to.load(Ordering::Relaxed);
            if linked_to == index {
                return index;
            }

            debug_assert!(linked_to < index);
            index = linked_to;
        }
    }

    /// Returns the slot `index` currently points at (not necessarily the root)
    #[inline]
    pub(crate) fn get_linked_to(&self, index: u32) -> u32 {
        self.links[index as usize].linked_to.load(Ordering::Relaxed)
    }

    /// Returns the island index assigned to `index` by the last island build
    #[inline]
    pub fn get_island_index(&self, index: u32) -> u32 {
        self.links[index as usize].island_index
    }

    #[inline]
    pub(crate) fn set_island_index(&mut self, index: u32, island_index: u32) {
        self.links[index as usize].island_index = island_index;
    }

    /// Puts `index` back into its own set
    #[inline]
    pub(crate) fn reset_link(&mut self, index: u32) {
        *self.links[index as usize].linked_to.get_mut() = index;
    }

    /// Puts every slot back into its own set
    pub(crate) fn reset_all_links(&mut self) {
        for (index, link) in self.links.iter_mut().enumerate() {
            *link.linked_to.get_mut() = index as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_fully_split() {
        let table = BodyLinkTable::new(8);
        for index in 0..8 {
            assert_eq!(table.get_lowest_body_index(index), index);
        }
    }

    #[test]
    fn higher_root_goes_under_lower_root() {
        let table = BodyLinkTable::new(8);
        table.link_bodies(5, 3);
        assert_eq!(table.get_linked_to(5), 3);
        assert_eq!(table.get_linked_to(3), 3);

        table.link_bodies(7, 1);
        table.link_bodies(7, 5);
        for index in [1, 3, 5, 7] {
            assert_eq!(table.get_lowest_body_index(index), 1);
        }
        assert_eq!(table.get_lowest_body_index(0), 0);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let table = BodyLinkTable::new(4);
        table.link_bodies(1, 4);
        table.link_bodies(u32::MAX, 2);
        for index in 0..4 {
            assert_eq!(table.get_lowest_body_index(index), index);
        }
    }

    #[test]
    fn call_sites_are_compressed_to_root() {
        let table = BodyLinkTable::new(6);
        table.link_bodies(4, 5);
        table.link_bodies(3, 4);
        table.link_bodies(0, 5);

        // 5 and 0 were passed in, so they point at the root directly.
        assert_eq!(table.get_linked_to(5), 0);
        assert_eq!(table.get_lowest_body_index(4), 0);
        assert_eq!(table.get_lowest_body_index(3), 0);
    }

    #[test]
    fn reset_restores_self_links() {
        let mut table = BodyLinkTable::new(3);
        table.link_bodies(0, 2);
        table.reset_link(2);
        assert_eq!(table.get_lowest_body_index(2), 2);
    }

    #[test]
    fn reset_all_splits_every_set() {
        let mut table = BodyLinkTable::new(4);
        table.link_bodies(0, 1);
        table.link_bodies(2, 3);
        table.link_bodies(1, 3);
        table.reset_all_links();
        for index in 0..4 {
            assert_eq!(table.get_lowest_body_index(index), index);
        }
    }
}
