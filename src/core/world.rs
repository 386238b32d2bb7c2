use crate::bodies::{BodyId, RigidBody};
use crate::constraints::{Constraint, ContactConstraint};
use crate::core::island::IslandBuilder;
use crate::core::scheduler::{IslandScheduler, SequentialScheduler};
use crate::core::stack_allocator::StackAllocator;
use crate::core::storage::{BodyStorage, Storage};
use crate::core::{ConstraintId, PhysicsSettings};
use crate::error::PhysicsError;
use crate::math::Vec3;
use crate::Result;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use crate::core::scheduler::parallel::ParallelScheduler;

/// Number of constraints and contacts linked by one scheduler job
const LINK_BATCH_SIZE: u32 = 64;

/// Summary of one simulation step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Number of islands the active bodies were split into
    pub num_islands: u32,

    /// Number of bodies that took part in the step
    pub num_active_bodies: u32,

    /// Constraints plus contacts in the largest island
    pub largest_island_constraints: u32,
}

/// The main physics world that owns the bodies and constraints and steps them island by island
pub struct PhysicsWorld {
    /// All rigid bodies in the world
    bodies: BodyStorage,

    /// All constraints in the world, indexed by `ConstraintId`
    constraints: Vec<Box<dyn Constraint>>,

    /// Contacts queued for the next step
    contacts: Vec<ContactConstraint>,

    /// Configuration for the simulation
    settings: PhysicsSettings,

    island_builder: IslandBuilder,
    allocator: StackAllocator,
    scheduler: Box<dyn IslandScheduler>,

    /// Time step of the previous step, 0 before the first step
    previous_dt: f32,

    /// The total elapsed simulation time
    time: f32,
}

impl PhysicsWorld {
    /// Creates a new physics world with the given settings
    pub fn new(settings: PhysicsSettings) -> Result<Self> {
        settings.validate()?;

        #[cfg(feature = "parallel")]
        let scheduler: Box<dyn IslandScheduler> = Box::new(ParallelScheduler::new(settings.worker_threads)?);

        #[cfg(not(feature = "parallel"))]
        let scheduler: Box<dyn IslandScheduler> = Box::new(SequentialScheduler);

        Self::with_scheduler(settings, scheduler)
    }

    /// Creates a new physics world that runs all work on the calling thread
    pub fn new_sequential(settings: PhysicsSettings) -> Result<Self> {
        Self::with_scheduler(settings, Box::new(SequentialScheduler))
    }

    /// Creates a new physics world with a custom scheduler
    pub fn with_scheduler(settings: PhysicsSettings, scheduler: Box<dyn IslandScheduler>) -> Result<Self> {
        settings.validate()?;

        debug!(
            max_active_bodies = settings.max_active_bodies,
            threads = scheduler.num_threads(),
            "physics world created"
        );

        Ok(Self {
            bodies: BodyStorage::new(),
            constraints: Vec::new(),
            contacts: Vec::new(),
            island_builder: IslandBuilder::new(settings.max_active_bodies),
            allocator: StackAllocator::new(settings.temp_allocator_size),
            scheduler,
            settings,
            previous_dt: 0.0,
            time: 0.0,
        })
    }

    /// Returns the current simulation time
    pub fn get_time(&self) -> f32 {
        self.time
    }

    /// Returns the simulation settings
    pub fn get_settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Sets the gravity for the simulation
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.settings.gravity = gravity;
    }

    /// Adds a rigid body to the world and returns its id
    pub fn add_body(&mut self, body: RigidBody) -> BodyId {
        self.bodies.add(body)
    }

    /// Gets a reference to a rigid body by its id
    pub fn get_body(&self, id: BodyId) -> Result<&RigidBody> {
        self.bodies.get_body(id)
    }

    /// Gets a mutable reference to a rigid body by its id
    pub fn get_body_mut(&mut self, id: BodyId) -> Result<&mut RigidBody> {
        self.bodies.get_body_mut(id)
    }

    /// Adds a constraint between two existing bodies, at least one of them dynamic
    pub fn add_constraint(&mut self, constraint: Box<dyn Constraint>) -> Result<ConstraintId> {
        let [first, second] = constraint.bodies();
        let body1 = self.bodies.get_body(first)?;
        let body2 = self.bodies.get_body(second)?;

        if first == second {
            return Err(PhysicsError::InvalidParameter(format!(
                "{} constraint connects body {:?} to itself",
                constraint.constraint_type(),
                first
            )));
        }

        if !body1.is_dynamic() && !body2.is_dynamic() {
            return Err(PhysicsError::InvalidParameter(format!(
                "{} constraint needs at least one dynamic body",
                constraint.constraint_type()
            )));
        }

        let id = ConstraintId(self.constraints.len() as u32);
        self.constraints.push(constraint);
        Ok(id)
    }

    /// Gets a constraint by its id
    pub fn get_constraint(&self, id: ConstraintId) -> Result<&dyn Constraint> {
        self.constraints
            .get(id.index() as usize)
            .map(|constraint| constraint.as_ref())
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("Constraint with id {:?} not found", id)))
    }

    /// Gets a mutable reference to a constraint by its id
    pub fn get_constraint_mut(&mut self, id: ConstraintId) -> Result<&mut dyn Constraint> {
        match self.constraints.get_mut(id.index() as usize) {
            Some(constraint) => Ok(constraint.as_mut()),
            None => Err(PhysicsError::ResourceNotFound(format!("Constraint with id {:?} not found", id))),
        }
    }

    /// Queues a contact found by collision detection for the next step.
    ///
    /// `point1` and `point2` are the world space contact points on each body and `normal`
    /// points from body 1 towards body 2.
    pub fn add_contact_pair(&mut self, first: BodyId, second: BodyId, point1: Vec3, point2: Vec3, normal: Vec3) -> Result<()> {
        if self.contacts.len() >= self.settings.max_contacts as usize {
            return Err(PhysicsError::InvalidParameter(format!(
                "More than {} contacts queued",
                self.settings.max_contacts
            )));
        }

        let body1 = self.bodies.get_body(first)?;
        let body2 = self.bodies.get_body(second)?;
        if first == second || (!body1.is_dynamic() && !body2.is_dynamic()) {
            return Err(PhysicsError::InvalidParameter(format!(
                "Contact between {:?} and {:?} needs two different bodies, one of them dynamic",
                first, second
            )));
        }

        let contact = ContactConstraint::new(body1, body2, point1, point2, normal);
        self.contacts.push(contact);
        Ok(())
    }

    /// Returns the number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Returns the number of constraints in the world
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Returns the number of contacts queued for the next step
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Clears the world of all bodies, constraints and contacts
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.constraints.clear();
        self.contacts.clear();
        self.previous_dt = 0.0;
        self.time = 0.0;
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Bodies are linked into islands through their constraints and the contacts queued since
    /// the last step, then every island is solved as an independent job. Queued contacts are
    /// consumed by the step.
    pub fn step(&mut self, dt: f32) -> Result<StepStats> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(PhysicsError::InvalidParameter(format!("Time step must be positive, got {}", dt)));
        }

        let active_bodies = self.bodies.update_active_bodies(self.settings.max_active_bodies)?;

        let result = self.solve_islands(&active_bodies, dt);
        self.island_builder.reset_islands(&mut self.allocator);
        self.contacts.clear();
        let stats = result?;

        self.previous_dt = dt;
        self.time += dt;

        debug!(
            num_islands = stats.num_islands,
            num_active_bodies = stats.num_active_bodies,
            largest_island_constraints = stats.largest_island_constraints,
            "step complete"
        );
        Ok(stats)
    }

    fn apply_gravity(&mut self, dt: f32) {
        let delta = self.settings.gravity * dt;
        for body in self.bodies.iter_mut().filter(|body| body.is_dynamic()) {
            let velocity = body.get_linear_velocity() + delta;
            body.set_linear_velocity(velocity);
        }
    }

    /// Island key pair of a constraint: the active index of every dynamic body, inactive otherwise.
    ///
    /// Returns `None` when neither body is dynamic; such a constraint has nothing to solve.
    fn link_indices(&self, [first, second]: [BodyId; 2]) -> Option<(u32, u32)> {
        let index = |id: BodyId| {
            self.bodies
                .get(id)
                .filter(|body| body.is_dynamic())
                .map(RigidBody::get_active_index)
        };

        match (index(first), index(second)) {
            (None, None) => None,
            (first, second) => Some((
                first.unwrap_or(crate::bodies::INACTIVE_INDEX),
                second.unwrap_or(crate::bodies::INACTIVE_INDEX),
            )),
        }
    }

    fn solve_islands(&mut self, active_bodies: &[BodyId], dt: f32) -> Result<StepStats> {
        let mut constraint_slots = Vec::new();
        let mut constraint_links = Vec::new();
        for (slot, constraint) in self.constraints.iter().enumerate() {
            if !constraint.is_enabled() {
                continue;
            }
            if let Some(link) = self.link_indices(constraint.bodies()) {
                constraint_slots.push(slot);
                constraint_links.push(link);
            }
        }

        let mut contact_slots = Vec::new();
        let mut contact_links = Vec::new();
        for (slot, contact) in self.contacts.iter().enumerate() {
            if let Some(link) = self.link_indices(contact.bodies()) {
                contact_slots.push(slot);
                contact_links.push(link);
            }
        }

        let num_constraints = constraint_links.len() as u32;
        let num_contacts = contact_links.len() as u32;

        self.island_builder
            .prepare_contact_constraints(num_contacts, &mut self.allocator)?;
        self.island_builder
            .prepare_non_contact_constraints(num_constraints, &mut self.allocator)?;

        let builder = &self.island_builder;
        let total = num_constraints + num_contacts;
        self.scheduler.run(total.div_ceil(LINK_BATCH_SIZE), &|batch| {
            let begin = batch * LINK_BATCH_SIZE;
            let end = (begin + LINK_BATCH_SIZE).min(total);
            for index in begin..end {
                if index < num_constraints {
                    let (first, second) = constraint_links[index as usize];
                    builder.link_constraint(index, first, second);
                } else {
                    let contact = index - num_constraints;
                    let (first, second) = contact_links[contact as usize];
                    builder.link_contact(contact, first, second);
                }
            }
        });

        self.island_builder
            .finalize(active_bodies, num_contacts, &mut self.allocator)?;

        // Nothing below can fail, so velocities only change in a step that completes.
        self.apply_gravity(dt);

        let num_islands = self.island_builder.get_num_islands();
        for island in 0..num_islands {
            let num_position_steps = self
                .island_builder
                .get_bodies_in_island(island)
                .iter()
                .filter_map(|&id| self.bodies.get(id))
                .filter_map(RigidBody::get_motion_properties)
                .map(|motion| match motion.get_num_position_steps_override() {
                    0 => self.settings.num_position_steps,
                    steps => steps,
                })
                .max()
                .unwrap_or(self.settings.num_position_steps);
            self.island_builder.set_num_position_steps(island, num_position_steps);
        }

        // Every constraint taken out here is put back.
        let mut constraints: Vec<Option<Box<dyn Constraint>>> =
            std::mem::take(&mut self.constraints).into_iter().map(Some).collect();
        let mut contacts: Vec<Option<ContactConstraint>> =
            std::mem::take(&mut self.contacts).into_iter().map(Some).collect();

        let mut jobs = Vec::with_capacity(num_islands as usize);
        let mut largest_island_constraints = 0;
        for island in 0..num_islands {
            let job = self.build_island_job(island, &constraint_slots, &mut constraints, &contact_slots, &mut contacts);
            largest_island_constraints = largest_island_constraints.max((job.constraints.len() + job.contacts.len()) as u32);
            jobs.push(Mutex::new(job));
        }

        let settings = &self.settings;
        let warm_start_ratio = if self.previous_dt > 0.0 { dt / self.previous_dt } else { 1.0 };
        self.scheduler.run(num_islands, &|island| {
            let mut job = jobs[island as usize].lock().unwrap_or_else(PoisonError::into_inner);
            job.solve(dt, warm_start_ratio, settings);
        });

        for job in jobs {
            let job = job.into_inner().unwrap_or_else(PoisonError::into_inner);
            for &id in &job.island_bodies {
                if let Some(body) = job.bodies.get(id) {
                    self.bodies.insert(body.clone());
                }
            }
            for (slot, constraint) in job.constraints {
                constraints[slot] = Some(constraint);
            }
        }
        self.constraints = constraints.into_iter().flatten().collect();

        Ok(StepStats {
            num_islands,
            num_active_bodies: active_bodies.len() as u32,
            largest_island_constraints,
        })
    }

    /// Copies the bodies of one island, plus the non-moving bodies its constraints touch, and
    /// moves its constraints and contacts into a job that can be solved on any thread
    fn build_island_job(
        &self,
        island: u32,
        constraint_slots: &[usize],
        constraints: &mut [Option<Box<dyn Constraint>>],
        contact_slots: &[usize],
        contacts: &mut [Option<ContactConstraint>],
    ) -> IslandJob {
        let builder = &self.island_builder;
        let island_bodies = builder.get_bodies_in_island(island).to_vec();

        let mut bodies = BodyStorage::new();
        for &id in &island_bodies {
            if let Some(body) = self.bodies.get(id) {
                bodies.insert(body.clone());
            }
        }

        let copy_missing = |bodies: &mut BodyStorage, ids: [BodyId; 2]| {
            for id in ids {
                if bodies.get(id).is_none() {
                    if let Some(body) = self.bodies.get(id) {
                        bodies.insert(body.clone());
                    }
                }
            }
        };

        let mut island_constraints = Vec::new();
        for &index in builder.get_constraints_in_island(island).unwrap_or(&[]) {
            let slot = constraint_slots[index as usize];
            if let Some(constraint) = constraints[slot].take() {
                copy_missing(&mut bodies, constraint.bodies());
                island_constraints.push((slot, constraint));
            }
        }

        let mut island_contacts = Vec::new();
        for &index in builder.get_contacts_in_island(island).unwrap_or(&[]) {
            if let Some(contact) = contacts[contact_slots[index as usize]].take() {
                copy_missing(&mut bodies, contact.bodies());
                island_contacts.push(contact);
            }
        }

        IslandJob {
            bodies,
            island_bodies,
            constraints: island_constraints,
            contacts: island_contacts,
            num_position_steps: builder.get_num_position_steps(island),
        }
    }
}

/// Everything needed to solve one island independently of all others
struct IslandJob {
    /// Copies of the island's bodies and of the static or kinematic bodies it touches
    bodies: BodyStorage,

    /// The bodies that belong to this island and are written back after solving
    island_bodies: Vec<BodyId>,

    /// Constraints with the slot they came from
    constraints: Vec<(usize, Box<dyn Constraint>)>,

    contacts: Vec<ContactConstraint>,
    num_position_steps: u32,
}

impl IslandJob {
    fn solve(&mut self, dt: f32, warm_start_ratio: f32, settings: &PhysicsSettings) {
        for (_, constraint) in &mut self.constraints {
            constraint.setup_velocity_constraint(dt, &self.bodies);
        }
        for contact in &mut self.contacts {
            contact.setup_velocity_constraint(dt, &self.bodies);
        }

        if settings.use_warm_start {
            for (_, constraint) in &mut self.constraints {
                constraint.warm_start_velocity_constraint(warm_start_ratio, &mut self.bodies);
            }
            for contact in &mut self.contacts {
                contact.warm_start_velocity_constraint(warm_start_ratio, &mut self.bodies);
            }
        }

        for _ in 0..settings.num_velocity_steps {
            for (_, constraint) in &mut self.constraints {
                constraint.solve_velocity_constraint(dt, &mut self.bodies);
            }
            for contact in &mut self.contacts {
                contact.solve_velocity_constraint(dt, &mut self.bodies);
            }
        }

        for &id in &self.island_bodies {
            if let Some(body) = self.bodies.get_mut(id) {
                body.integrate_position(dt);
            }
        }

        let mut position_iterations = 0;
        for _ in 0..self.num_position_steps {
            let mut applied = false;
            for (_, constraint) in &mut self.constraints {
                applied |= constraint.solve_position_constraint(dt, settings.baumgarte, &mut self.bodies);
            }
            for contact in &mut self.contacts {
                applied |= contact.solve_position_constraint(dt, settings.baumgarte, &mut self.bodies);
            }

            position_iterations += 1;
            if !applied {
                break;
            }
        }

        trace!(
            bodies = self.island_bodies.len(),
            constraints = self.constraints.len(),
            contacts = self.contacts.len(),
            position_iterations,
            "island solved"
        );
    }
}
