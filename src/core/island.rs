use crate::bodies::{BodyId, INACTIVE_INDEX};
use crate::core::body_link_table::BodyLinkTable;
use crate::core::stack_allocator::{ScratchBuffer, StackAllocator};
use crate::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};

/// Island-grouped constraint (or contact) indices plus the end offset of every island
#[derive(Debug)]
struct IslandBuckets {
    /// Indices grouped by island
    indices: ScratchBuffer<u32>,

    /// End offset into `indices` for every island (one extra slot at the end)
    ends: ScratchBuffer<u32>,
}

impl IslandBuckets {
    fn range(&self, island: u32) -> &[u32] {
        let island = island as usize;
        let begin = if island > 0 { self.ends[island - 1] as usize } else { 0 };
        let end = self.ends[island] as usize;
        &self.indices[begin..end]
    }
}

/// Keeps track of connected bodies and groups them into islands that can be solved
/// independently on separate threads.
///
/// A step goes through these phases:
/// 1. [`prepare_contact_constraints`](Self::prepare_contact_constraints) and
///    [`prepare_non_contact_constraints`](Self::prepare_non_contact_constraints)
/// 2. any number of concurrent [`link_bodies`](Self::link_bodies),
///    [`link_constraint`](Self::link_constraint) and [`link_contact`](Self::link_contact) calls
/// 3. [`finalize`](Self::finalize)
/// 4. island queries while the islands are being solved
/// 5. [`reset_islands`](Self::reset_islands), which hands all scratch memory back
#[derive(Debug)]
pub struct IslandBuilder {
    // Intermediate data
    body_links: BodyLinkTable,
    constraint_links: Option<ScratchBuffer<AtomicU32>>,
    contact_links: Option<ScratchBuffer<AtomicU32>>,

    // Final data
    body_islands: Option<ScratchBuffer<BodyId>>,
    body_island_ends: Option<ScratchBuffer<u32>>,
    constraint_islands: Option<IslandBuckets>,
    contact_islands: Option<IslandBuckets>,
    islands_sorted: Option<ScratchBuffer<u32>>,
    num_position_steps: Option<ScratchBuffer<u8>>,

    // Counters
    num_active_bodies: u32,
    num_constraints: u32,
    max_contacts: u32,
    num_contacts: u32,
    num_islands: u32,
}

impl IslandBuilder {
    /// Creates a builder for at most `max_active_bodies` active bodies
    pub fn new(max_active_bodies: u32) -> Self {
        Self {
            body_links: BodyLinkTable::new(max_active_bodies),
            constraint_links: None,
            contact_links: None,
            body_islands: None,
            body_island_ends: None,
            constraint_islands: None,
            contact_islands: None,
            islands_sorted: None,
            num_position_steps: None,
            num_active_bodies: 0,
            num_constraints: 0,
            max_contacts: 0,
            num_contacts: 0,
            num_islands: 0,
        }
    }

    /// Returns the maximum number of active bodies this builder supports
    #[inline]
    pub fn get_max_active_bodies(&self) -> u32 {
        self.body_links.max_active_bodies()
    }

    /// Returns the union-find table shared by all linking threads
    #[inline]
    pub fn body_link_table(&self) -> &BodyLinkTable {
        &self.body_links
    }

    /// Allocates room to record the island key of up to `max_contacts` contacts.
    ///
    /// Must be called before [`prepare_non_contact_constraints`](Self::prepare_non_contact_constraints)
    /// so the scratch memory can be released in reverse order.
    pub fn prepare_contact_constraints(&mut self, max_contacts: u32, allocator: &mut StackAllocator) -> Result<()> {
        debug_assert_eq!(self.num_contacts, 0, "reset_islands was not called");
        debug_assert_eq!(self.num_islands, 0, "reset_islands was not called");
        debug_assert!(self.contact_links.is_none());

        self.contact_links = Some(allocator.allocate(max_contacts as usize)?);
        self.max_contacts = max_contacts;
        Ok(())
    }

    /// Allocates room to record the island key of `num_constraints` constraints
    pub fn prepare_non_contact_constraints(&mut self, num_constraints: u32, allocator: &mut StackAllocator) -> Result<()> {
        debug_assert_eq!(self.num_islands, 0, "reset_islands was not called");
        debug_assert!(self.constraint_links.is_none());

        self.constraint_links = Some(allocator.allocate(num_constraints as usize)?);
        self.num_constraints = num_constraints;
        Ok(())
    }

    /// Links two bodies by their index in the active body list
    #[inline]
    pub fn link_bodies(&self, first: u32, second: u32) {
        self.body_links.link_bodies(first, second);
    }

    /// Links constraint `constraint_index` to a body pair given by active body indices.
    ///
    /// At least one of the two bodies must be active.
    pub fn link_constraint(&self, constraint_index: u32, first: u32, second: u32) {
        self.link_bodies(first, second);

        debug_assert!(constraint_index < self.num_constraints);
        if let Some(links) = &self.constraint_links {
            links[constraint_index as usize].store(island_key(first, second), Ordering::Relaxed);
        }
    }

    /// Links contact `contact_index` to a body pair given by active body indices.
    ///
    /// At least one of the two bodies must be active.
    pub fn link_contact(&self, contact_index: u32, first: u32, second: u32) {
        self.link_bodies(first, second);

        debug_assert!(contact_index < self.max_contacts);
        if let Some(links) = &self.contact_links {
            links[contact_index as usize].store(island_key(first, second), Ordering::Relaxed);
        }
    }

    /// Builds the islands once all linking is done.
    ///
    /// `active_bodies[i]` is the body with active index `i`; only the first
    /// `num_contacts` contact links are used.
    pub fn finalize(&mut self, active_bodies: &[BodyId], num_contacts: u32, allocator: &mut StackAllocator) -> Result<()> {
        debug_assert!(num_contacts <= self.max_contacts);
        debug_assert!(active_bodies.len() <= self.get_max_active_bodies() as usize);
        self.num_contacts = num_contacts;

        self.build_body_islands(active_bodies, allocator)?;

        if let Some(links) = &self.constraint_links {
            self.constraint_islands = build_constraint_islands(
                &self.body_links,
                self.num_islands,
                &links[..self.num_constraints as usize],
                allocator,
            )?;
        }

        if let Some(links) = &self.contact_links {
            self.contact_islands = build_constraint_islands(
                &self.body_links,
                self.num_islands,
                &links[..self.num_contacts as usize],
                allocator,
            )?;
        }

        self.sort_islands(allocator)?;

        self.num_position_steps = Some(allocator.allocate(self.num_islands as usize)?);

        debug!(
            num_islands = self.num_islands,
            num_active_bodies = self.num_active_bodies,
            num_constraints = self.num_constraints,
            num_contacts = self.num_contacts,
            "islands finalized"
        );
        Ok(())
    }

    /// Number of islands built by the last [`finalize`](Self::finalize)
    #[inline]
    pub fn get_num_islands(&self) -> u32 {
        self.num_islands
    }

    /// Bodies in island `island_index`. Islands are ordered by constraint count, largest first.
    pub fn get_bodies_in_island(&self, island_index: u32) -> &[BodyId] {
        debug_assert!(island_index < self.num_islands);
        let (Some(bodies), Some(ends)) = (&self.body_islands, &self.body_island_ends) else {
            return &[];
        };

        let island = self.sorted_island(island_index) as usize;
        let begin = if island > 0 { ends[island - 1] as usize } else { 0 };
        &bodies[begin..ends[island] as usize]
    }

    /// Constraint indices in island `island_index`, `None` if the island has no constraints
    pub fn get_constraints_in_island(&self, island_index: u32) -> Option<&[u32]> {
        debug_assert!(island_index < self.num_islands);
        let buckets = self.constraint_islands.as_ref()?;
        let range = buckets.range(self.sorted_island(island_index));
        (!range.is_empty()).then_some(range)
    }

    /// Contact indices in island `island_index`, `None` if the island has no contacts
    pub fn get_contacts_in_island(&self, island_index: u32) -> Option<&[u32]> {
        debug_assert!(island_index < self.num_islands);
        let buckets = self.contact_islands.as_ref()?;
        let range = buckets.range(self.sorted_island(island_index));
        (!range.is_empty()).then_some(range)
    }

    /// Sets the number of position solver steps for island `island_index`. Must be less than 256.
    pub fn set_num_position_steps(&mut self, island_index: u32, num_position_steps: u32) {
        debug_assert!(island_index < self.num_islands);
        debug_assert!(num_position_steps < 256);
        if let Some(steps) = self.num_position_steps.as_mut() {
            steps[island_index as usize] = num_position_steps.min(255) as u8;
        }
    }

    /// Number of position solver steps for island `island_index`
    pub fn get_num_position_steps(&self, island_index: u32) -> u32 {
        debug_assert!(island_index < self.num_islands);
        self.num_position_steps
            .as_ref()
            .map_or(0, |steps| u32::from(steps[island_index as usize]))
    }

    /// Releases the island data in reverse allocation order. Must be called before the next step,
    /// also when [`finalize`](Self::finalize) failed.
    pub fn reset_islands(&mut self, allocator: &mut StackAllocator) {
        if let Some(steps) = self.num_position_steps.take() {
            allocator.free(steps);
        }

        if let Some(sorted) = self.islands_sorted.take() {
            allocator.free(sorted);
        }

        if let Some(buckets) = self.contact_islands.take() {
            allocator.free(buckets.ends);
            allocator.free(buckets.indices);
        }

        if let Some(buckets) = self.constraint_islands.take() {
            allocator.free(buckets.ends);
            allocator.free(buckets.indices);
        }

        if let Some(ends) = self.body_island_ends.take() {
            allocator.free(ends);
        }
        match self.body_islands.take() {
            Some(bodies) => allocator.free(bodies),
            // Building the body islands resets the links. It never ran, so links made this step remain.
            None => self.body_links.reset_all_links(),
        }

        if let Some(links) = self.constraint_links.take() {
            allocator.free(links);
        }
        if let Some(links) = self.contact_links.take() {
            allocator.free(links);
        }

        trace!(num_islands = self.num_islands, "island scratch released");

        self.num_active_bodies = 0;
        self.num_constraints = 0;
        self.max_contacts = 0;
        self.num_contacts = 0;
        self.num_islands = 0;
    }

    #[inline]
    fn sorted_island(&self, island_index: u32) -> u32 {
        self.islands_sorted
            .as_ref()
            .map_or(island_index, |sorted| sorted[island_index as usize])
    }

    /// Assigns a dense island index to every active body and groups the body ids by island.
    ///
    /// Also puts every body link back into its own set, ready for the next step.
    fn build_body_islands(&mut self, active_bodies: &[BodyId], allocator: &mut StackAllocator) -> Result<()> {
        let num_active_bodies = active_bodies.len() as u32;
        self.num_active_bodies = num_active_bodies;

        debug_assert!(self.body_islands.is_none());
        let mut body_islands: ScratchBuffer<BodyId> = allocator.allocate(active_bodies.len())?;

        // One extra slot because every body counts towards the start of the next island.
        let mut island_starts: ScratchBuffer<u32> = match allocator.allocate(active_bodies.len() + 1) {
            Ok(buffer) => buffer,
            Err(err) => {
                allocator.free(body_islands);
                return Err(err);
            }
        };

        debug_assert_eq!(self.num_islands, 0);
        for index in 0..num_active_bodies {
            let linked_to = self.body_links.get_linked_to(index);
            let island_index = if linked_to != index {
                // Scanning low to high means the lower body already has its island.
                debug_assert!(linked_to < index);
                self.body_links.get_island_index(linked_to)
            } else {
                let island_index = self.num_islands;
                self.num_islands += 1;
                island_index
            };

            self.body_links.set_island_index(index, island_index);
            island_starts[island_index as usize + 1] += 1;
        }

        // Turn the counts into start offsets
        for island in 1..self.num_islands as usize {
            island_starts[island] += island_starts[island - 1];
        }

        // Scatter the bodies; every start advances until it points at the island end.
        for index in 0..num_active_bodies {
            let island_index = self.body_links.get_island_index(index) as usize;
            let start = &mut island_starts[island_index];
            body_islands[*start as usize] = active_bodies[index as usize];
            *start += 1;

            self.body_links.reset_link(index);
        }

        debug_assert!(
            self.num_islands == 0 || island_starts[self.num_islands as usize - 1] == num_active_bodies
        );

        self.body_islands = Some(body_islands);
        self.body_island_ends = Some(island_starts);
        Ok(())
    }

    /// Orders the islands so that the ones with the most constraints and contacts come first.
    ///
    /// Big islands take longest to solve, so starting them first gives the worker pool the
    /// best chance of finishing all islands at the same time.
    fn sort_islands(&mut self, allocator: &mut StackAllocator) -> Result<()> {
        if self.num_contacts == 0 && self.num_constraints == 0 {
            trace!("no constraints or contacts, island sort skipped");
            return Ok(());
        }

        let num_islands = self.num_islands as usize;
        let mut sorted: ScratchBuffer<u32> = allocator.allocate(num_islands)?;
        for (island, slot) in sorted.iter_mut().enumerate() {
            *slot = island as u32;
        }

        let mut counts: ScratchBuffer<u32> = match allocator.allocate(num_islands) {
            Ok(buffer) => buffer,
            Err(err) => {
                allocator.free(sorted);
                return Err(err);
            }
        };
        for island in 0..self.num_islands {
            let constraints = self
                .constraint_islands
                .as_ref()
                .map_or(0, |buckets| buckets.range(island).len());
            let contacts = self
                .contact_islands
                .as_ref()
                .map_or(0, |buckets| buckets.range(island).len());
            counts[island as usize] = (constraints + contacts) as u32;
        }

        // Stable, so islands with equal counts keep the order of their lowest body.
        sorted.sort_by(|&left, &right| counts[right as usize].cmp(&counts[left as usize]));

        allocator.free(counts);
        self.islands_sorted = Some(sorted);
        Ok(())
    }
}

impl Drop for IslandBuilder {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.constraint_links.is_none()
                    && self.contact_links.is_none()
                    && self.body_islands.is_none()
                    && self.islands_sorted.is_none(),
                "island builder dropped without reset_islands"
            );
        }
    }
}

/// The body whose island a constraint belongs to: the lower of the two active indices.
///
/// `INACTIVE_INDEX` is the largest `u32`, so this picks the active body when only one is.
#[inline]
fn island_key(first: u32, second: u32) -> u32 {
    let key = first.min(second);
    debug_assert_ne!(key, INACTIVE_INDEX, "at least one body must be active");
    key
}

/// Counting sort of constraint indices into island buckets keyed by their body's island
fn build_constraint_islands(
    body_links: &BodyLinkTable,
    num_islands: u32,
    constraint_to_body: &[AtomicU32],
    allocator: &mut StackAllocator,
) -> Result<Option<IslandBuckets>> {
    if constraint_to_body.is_empty() {
        return Ok(None);
    }

    let mut indices: ScratchBuffer<u32> = allocator.allocate(constraint_to_body.len())?;
    // One extra slot so counting into `island + 1` needs no branch.
    let mut ends: ScratchBuffer<u32> = match allocator.allocate(num_islands as usize + 1) {
        Ok(buffer) => buffer,
        Err(err) => {
            allocator.free(indices);
            return Err(err);
        }
    };

    for link in constraint_to_body {
        let body_index = link.load(Ordering::Relaxed);
        let next_island = body_links.get_island_index(body_index) as usize + 1;
        debug_assert!(next_island <= num_islands as usize);
        ends[next_island] += 1;
    }

    for island in 1..num_islands as usize {
        ends[island] += ends[island - 1];
    }

    for (constraint, link) in constraint_to_body.iter().enumerate() {
        let body_index = link.load(Ordering::Relaxed);
        let island = body_links.get_island_index(body_index) as usize;
        indices[ends[island] as usize] = constraint as u32;
        ends[island] += 1;
    }

    Ok(Some(IslandBuckets { indices, ends }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: u32) -> Vec<BodyId> {
        (0..count).map(|index| BodyId::new(100 + index)).collect()
    }

    #[test]
    fn no_links_gives_one_island_per_body() {
        let mut allocator = StackAllocator::new(4096);
        let mut builder = IslandBuilder::new(4);
        builder.prepare_contact_constraints(0, &mut allocator).unwrap();
        builder.prepare_non_contact_constraints(0, &mut allocator).unwrap();

        let bodies = ids(3);
        builder.finalize(&bodies, 0, &mut allocator).unwrap();

        assert_eq!(builder.get_num_islands(), 3);
        for island in 0..3 {
            assert_eq!(builder.get_bodies_in_island(island), &bodies[island as usize..=island as usize]);
            assert!(builder.get_constraints_in_island(island).is_none());
            assert!(builder.get_contacts_in_island(island).is_none());
        }

        builder.reset_islands(&mut allocator);
        assert!(allocator.is_empty());
    }

    #[test]
    fn body_links_are_reset_by_finalize() {
        let mut allocator = StackAllocator::new(4096);
        let mut builder = IslandBuilder::new(4);
        builder.prepare_contact_constraints(0, &mut allocator).unwrap();
        builder.prepare_non_contact_constraints(0, &mut allocator).unwrap();
        builder.link_bodies(0, 3);
        builder.link_bodies(1, 2);

        builder.finalize(&ids(4), 0, &mut allocator).unwrap();
        assert_eq!(builder.get_num_islands(), 2);
        for index in 0..4 {
            assert_eq!(builder.body_link_table().get_lowest_body_index(index), index);
        }

        builder.reset_islands(&mut allocator);
    }

    #[test]
    fn sort_is_skipped_without_constraints() {
        let mut allocator = StackAllocator::new(4096);
        let mut builder = IslandBuilder::new(4);
        builder.prepare_contact_constraints(0, &mut allocator).unwrap();
        builder.prepare_non_contact_constraints(0, &mut allocator).unwrap();
        builder.link_bodies(2, 3);
        builder.finalize(&ids(4), 0, &mut allocator).unwrap();

        assert!(builder.islands_sorted.is_none());
        // Without a sort the natural order is used: island roots ascending.
        assert_eq!(builder.get_bodies_in_island(2), &ids(4)[2..4]);

        builder.reset_islands(&mut allocator);
    }

    #[test]
    fn position_steps_are_stored_per_island() {
        let mut allocator = StackAllocator::new(4096);
        let mut builder = IslandBuilder::new(2);
        builder.prepare_contact_constraints(0, &mut allocator).unwrap();
        builder.prepare_non_contact_constraints(0, &mut allocator).unwrap();
        builder.finalize(&ids(2), 0, &mut allocator).unwrap();

        builder.set_num_position_steps(0, 3);
        builder.set_num_position_steps(1, 255);
        assert_eq!(builder.get_num_position_steps(0), 3);
        assert_eq!(builder.get_num_position_steps(1), 255);

        builder.reset_islands(&mut allocator);
    }

    #[test]
    fn island_key_prefers_active_body() {
        assert_eq!(island_key(7, INACTIVE_INDEX), 7);
        assert_eq!(island_key(INACTIVE_INDEX, 2), 2);
        assert_eq!(island_key(4, 1), 1);
    }
}
