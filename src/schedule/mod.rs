//! Glue between this crate's systems and an external task-graph scheduler
//! (spec.md §1, §5).
//!
//! The real scheduler is an external collaborator — this module only
//! defines the trait contract a host must implement ([`TaskGraphBuilder`])
//! plus constructors that register this crate's systems as nodes against
//! it. Parallelism *within* one system (across candidate pairs, across
//! pixel rows) is `rayon`'s job; the task graph only orders and overlaps
//! whole systems against each other.

use crate::broadphase::{BroadPhase, BroadPhaseOutput, LeafAllocator, LeafInput};
use crate::core::config::WorldConfig;
use crate::core::targets::SCHEDULE;
use crate::core::types::{LeafId, Number, ObjectId, Vec3};
use crate::entity::{EcsRead, EntityId};
use crate::narrowphase::{generate_contacts, ContactBuffer};
use crate::object::manager::ObjectManager;
use crate::object::primitive::CollisionPrimitive;
use crate::raytrace::{render, Camera, TextureTable, Tlas, TraceResult};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Opaque reference to a registered node, passed back in as a dependency
/// of a later node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskHandle(pub usize);

/// What a host's task-graph/scheduler must expose for this crate's systems
/// to be registered against it. `work` runs once all of `deps` have
/// completed; this module never calls it directly.
pub trait TaskGraphBuilder {
    fn add_node(&mut self, name: &'static str, deps: &[TaskHandle], work: Box<dyn FnOnce() + Send>) -> TaskHandle;
}

/// Read-only access to the per-object primitive table (spec.md §3); the
/// concrete [`crate::object::manager::ObjectManager`] implements this, but
/// systems are written against the trait so a host can substitute its own
/// storage.
pub trait ObjectTable {
    fn primitives(&self, id: ObjectId) -> &[CollisionPrimitive];
}

impl ObjectTable for crate::object::manager::ObjectManager {
    fn primitives(&self, id: ObjectId) -> &[CollisionPrimitive] { self.primitives(id) }
}

/// What the rigid-body solver needs from this crate: the contacts found
/// this step. The solver itself lives outside this crate entirely.
pub trait SolverSurface {
    fn submit_contacts(&mut self, contacts: &[crate::narrowphase::ContactConstraint]);
}

/// What a host's reflection/serialization registry must expose for
/// [`register_types`] to announce this crate's wire-relevant types against
/// (spec.md §6 `registerTypes`). The registry itself is an external
/// collaborator; this crate only ever calls `register_component`.
pub trait TypeRegistry {
    fn register_component(&mut self, name: &'static str);
}

/// Announces this crate's collision-relevant types to a host's type
/// registry (spec.md §6 `registerTypes(registry, solver)`). `solver` isn't
/// read here — contact delivery happens later, per-step, through
/// [`SolverSurface::submit_contacts`] in [`setup_narrowphase`] — but it's
/// still a parameter so a host can register solver-side reflection for the
/// same types in one call.
pub fn register_types<R: TypeRegistry, S: SolverSurface>(registry: &mut R, _solver: &mut S) {
    registry.register_component("EntityId");
    registry.register_component("ResponseType");
    registry.register_component("ContactConstraint");
    debug!(target: SCHEDULE, "registered collision types");
}

/// Everything a running world's collision step needs between `init()` and
/// its first tick: the object table, tuned parameters, broad-phase state,
/// the contact sink, and the leaf/entity bookkeeping `register_entity`
/// grows (spec.md §6 "registration entry points").
pub struct CollisionContext {
    pub objects: Arc<ObjectManager>,
    pub config: WorldConfig,
    pub broadphase: Arc<Mutex<BroadPhase>>,
    pub contacts: Arc<ContactBuffer>,
    leaves: LeafAllocator,
    entity_leaves: HashMap<EntityId, LeafId>,
}

impl CollisionContext {
    /// Registers one entity's collision participation and returns the
    /// stable [`LeafId`] the broad-phase will index it by from now on
    /// (spec.md §6 `registerEntity(context, entity, objectID, numDofs,
    /// solver) -> LeafID`).
    ///
    /// `object_id` isn't otherwise retained here: per-tick broad-phase
    /// input is still built by the host from its own ECS query (see
    /// [`setup_broadphase`]'s `leaves` parameter) — this call only reserves
    /// the index and remembers which leaf an entity owns. `num_dofs` and
    /// `solver` are the rigid-body solver's concern, not collision
    /// detection's; they're accepted only to match the registration
    /// signature a host calls once per entity alongside its own solver-side
    /// registration.
    pub fn register_entity<S: SolverSurface>(&mut self, entity: EntityId, _object_id: ObjectId, _num_dofs: u32, _solver: &mut S) -> LeafId {
        let leaf = self.leaves.reserve_leaf();
        self.entity_leaves.insert(entity, leaf);
        debug!(target: SCHEDULE, entity = entity.index, leaf, "registered entity");
        leaf
    }

    /// The leaf a previously-registered entity owns, if any.
    pub fn leaf_for_entity(&self, entity: EntityId) -> Option<LeafId> { self.entity_leaves.get(&entity).copied() }
}

/// Builds one world's [`CollisionContext`] (spec.md §6 `init(context,
/// objectManager, dt, numSubsteps, gravity, maxDynamicObjects, solver,
/// optionalCvxSolver)`).
///
/// The upstream `context` parameter is the host's own ECS/task-graph
/// handle, which this crate never reads from or writes to directly — it's
/// the caller's to keep, not this crate's to store, so there's nothing to
/// accept here under that name. `solver` and `optional_convex_solver`
/// aren't retained for the same reason `registerTypes`' `solver` isn't:
/// contacts are delivered per-step through [`SolverSurface::submit_contacts`]
/// in [`setup_narrowphase`], not held as a long-lived reference here.
pub fn init<S: SolverSurface>(
    objects: Arc<ObjectManager>,
    dt: Number,
    num_substeps: u32,
    gravity: Vec3,
    max_dynamic_objects: u32,
    _solver: &mut S,
    _optional_convex_solver: Option<&mut dyn SolverSurface>,
) -> CollisionContext {
    let config = WorldConfig {
        dt,
        num_substeps,
        gravity,
        max_dynamic_objects,
        ..WorldConfig::default()
    };
    let contacts = Arc::new(ContactBuffer::new(config.max_contacts as usize));
    debug!(target: SCHEDULE, max_dynamic_objects, num_substeps, "collision context initialized");
    CollisionContext {
        objects,
        contacts,
        leaves: LeafAllocator::new(max_dynamic_objects),
        entity_leaves: HashMap::new(),
        broadphase: Arc::new(Mutex::new(BroadPhase::new())),
        config,
    }
}

/// Registers the broad-phase pass as one task-graph node.
pub fn setup_broadphase<B: TaskGraphBuilder>(
    builder: &mut B,
    deps: &[TaskHandle],
    broadphase: Arc<Mutex<BroadPhase>>,
    leaves: Arc<Vec<LeafInput>>,
    config: WorldConfig,
    output: Arc<Mutex<BroadPhaseOutput>>,
) -> TaskHandle {
    builder.add_node(
        "broadphase",
        deps,
        Box::new(move || {
            let mut bp = broadphase.lock().expect("broadphase mutex poisoned");
            let result = bp.update(&leaves, &config);
            *output.lock().expect("broadphase output mutex poisoned") = result;
        }),
    )
}

/// Registers the narrow-phase pass as one task-graph node. Fans the
/// candidate pairs produced by broad-phase out across `rayon`'s pool;
/// every pair's contacts land in the same lock-free [`ContactBuffer`].
pub fn setup_narrowphase<B, E, O>(
    builder: &mut B,
    deps: &[TaskHandle],
    ecs: Arc<E>,
    objects: Arc<O>,
    entities: Arc<Vec<EntityId>>,
    broadphase_output: Arc<Mutex<BroadPhaseOutput>>,
    contacts: Arc<ContactBuffer>,
) -> TaskHandle
where
    B: TaskGraphBuilder,
    E: EcsRead + Send + Sync + 'static,
    O: ObjectTable + Send + Sync + 'static,
{
    builder.add_node(
        "narrowphase",
        deps,
        Box::new(move || {
            let pairs = broadphase_output.lock().expect("broadphase output mutex poisoned").pairs.clone();
            pairs.par_iter().for_each(|pair| {
                let entity_a = entities[pair.a as usize];
                let entity_b = entities[pair.b as usize];
                let trs_a = ecs.transform(entity_a);
                let trs_b = ecs.transform(entity_b);
                let primitives_a = objects.primitives(ecs.object_id(entity_a));
                let primitives_b = objects.primitives(ecs.object_id(entity_b));
                generate_contacts(entity_a, &trs_a, primitives_a, entity_b, &trs_b, primitives_b, &contacts);
            });
        }),
    )
}

/// Registers one frame of the ray tracer as a task-graph node, independent
/// of the collision pipeline (it reads its own scene snapshot, not this
/// step's contacts).
pub fn setup_raytrace<B: TaskGraphBuilder>(
    builder: &mut B,
    deps: &[TaskHandle],
    tlas: Arc<Tlas>,
    textures: Arc<TextureTable>,
    camera: Camera,
    width: u32,
    height: u32,
    light_dir: Vec3,
    ambient: f32,
    output: Arc<Mutex<Vec<TraceResult>>>,
) -> TaskHandle {
    builder.add_node(
        "raytrace",
        deps,
        Box::new(move || {
            let frame = render(&tlas, &textures, &camera, width, height, light_dir, ambient);
            *output.lock().expect("raytrace output mutex poisoned") = frame;
        }),
    )
}

/// A trivial [`TaskGraphBuilder`] that runs each node synchronously the
/// moment it's registered. Only useful for tests and examples exercising
/// `setup_*` without pulling in a real scheduler; a host that actually
/// wants overlap between stages supplies its own implementation.
#[derive(Default)]
pub struct LinearTaskGraph {
    next_id: usize,
}

impl LinearTaskGraph {
    pub fn new() -> Self { Self::default() }
}

impl TaskGraphBuilder for LinearTaskGraph {
    fn add_node(&mut self, _name: &'static str, _deps: &[TaskHandle], work: Box<dyn FnOnce() + Send>) -> TaskHandle {
        work();
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        handle
    }
}
