//! Rigid-body world on top of rapier2d
//!
//! rapier does the integration, contact generation and solving. This module
//! keeps a glam-side copy of every body (pushed into rapier before a step and
//! read back after it), tags every collider with a collision type and an
//! owning entity, and runs the collision handler protocol on the contacts
//! rapier reports:
//!
//! - `begin`: first step a pair touches; `false` ignores the pair until it separates
//! - `pre_solve`: every touching step; `false` means no physical response
//! - `post_solve`: after a step in which the pair got its response (its flag is ignored)
//! - `separate`: the step a touching pair stops touching, or the pair is removed
//!
//! Callbacks run between rapier steps, against the contacts at the bodies'
//! current positions. What they answer decides how rapier treats the pair on
//! the next step; a pair with a `begin` or `pre_solve` callback gets no
//! response until those callbacks have seen it.
//!
//! Callbacks only ever see an [`Arbiter`] and the caller's context, never the
//! world itself, so nothing can add or remove bodies while a step runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::mem;

use glam::Vec2;
use rapier2d::na::{Point2, Vector2};
use rapier2d::parry::mass_properties::MassProperties;
use rapier2d::parry::query::ShapeCastOptions;
use rapier2d::parry::shape::Ball;
use rapier2d::prelude::*;

use super::entity::EntityId;
use crate::error::{ConfigError, SimError};
use crate::tuning::{check_mass, check_size};

/// Typical sprite size in world units; rapier scales its tolerances by it
const LENGTH_UNIT: f32 = 100.0;

/// Contact points further apart than this do not count as touching
const CONTACT_SLOP: f32 = 0.5;

fn vec2_to_na(v: Vec2) -> Vector2<f32> {
    Vector2::new(v.x, v.y)
}

fn vec2_to_point(v: Vec2) -> Point2<f32> {
    Point2::new(v.x, v.y)
}

fn na_to_vec2(v: &Vector2<f32>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Shape categories, usable as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum CollisionType {
    Player = 1 << 0,
    WallKill = 1 << 1,
    WallSensor = 1 << 2,
    Pellet = 1 << 3,
    EnemyPawn = 1 << 4,
    EnemySlider = 1 << 5,
}

impl CollisionType {
    /// The arena walls
    pub const WALL: CollisionType = CollisionType::WallKill;

    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Broad-phase filter: two shapes interact only if each one's categories
/// intersect the other's mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeFilter {
    pub categories: u32,
    pub mask: u32,
}

impl ShapeFilter {
    pub const ALL_MASKS: u32 = u32::MAX;

    pub const ALL: ShapeFilter = ShapeFilter {
        categories: Self::ALL_MASKS,
        mask: Self::ALL_MASKS,
    };

    /// Filter in the shape's own category that ignores the given categories
    pub fn excluding(category: CollisionType, ignored: u32) -> Self {
        Self {
            categories: category.bits(),
            mask: Self::ALL_MASKS ^ ignored,
        }
    }

    fn groups(&self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.categories),
            Group::from_bits_truncate(self.mask),
        )
    }
}

/// Handle to a body in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(u32);

/// Handle to a shape in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeHandle(u32);

/// The body/shape pair owned by one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsBody {
    pub body: BodyHandle,
    pub shape: ShapeHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyKind {
    Dynamic { mass: f32, moment: f32 },
    /// Infinite mass, never moved by the solver
    Static,
}

/// A rigid body (rotation is not simulated)
///
/// Edits to `position` and `velocity` reach rapier at the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    kind: BodyKind,
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Body {
    /// Dynamic body; rejects non-finite or non-positive mass
    pub fn dynamic(mass: f32, moment: f32) -> Result<Self, ConfigError> {
        check_mass("body", mass)?;
        Ok(Self {
            kind: BodyKind::Dynamic { mass, moment },
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
        })
    }

    pub fn fixed() -> Self {
        Self {
            kind: BodyKind::Static,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, BodyKind::Dynamic { .. })
    }

    fn to_rapier(&self) -> RigidBody {
        match self.kind {
            BodyKind::Dynamic { mass, moment } => RigidBodyBuilder::dynamic()
                .translation(vec2_to_na(self.position))
                .linvel(vec2_to_na(self.velocity))
                .additional_mass_properties(MassProperties::new(Point2::origin(), mass, moment))
                .locked_axes(LockedAxes::ROTATION_LOCKED)
                .can_sleep(false)
                .build(),
            BodyKind::Static => RigidBodyBuilder::fixed()
                .translation(vec2_to_na(self.position))
                .build(),
        }
    }
}

/// Moment of inertia of a solid box
pub fn moment_for_box(mass: f32, size: Vec2) -> f32 {
    mass * (size.x * size.x + size.y * size.y) / 12.0
}

/// Shape geometry, relative to the owning body's position
#[derive(Debug, Clone, Copy, PartialEq)]
enum Geometry {
    /// Box centred on the body, with rounded edges
    Box { half_extents: Vec2, radius: f32 },
    /// Axis-aligned segment with a thickness radius
    Segment { a: Vec2, b: Vec2, radius: f32 },
}

/// A collision shape
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    geometry: Geometry,
    pub collision_type: CollisionType,
    pub filter: ShapeFilter,
    /// Entity that owns this shape (used to dispatch collision policies)
    pub owner: Option<EntityId>,
    body: Option<BodyHandle>,
}

impl Shape {
    /// Box of the given full size, rounded by `radius`
    pub fn boxed(size: Vec2, radius: f32, collision_type: CollisionType) -> Result<Self, ConfigError> {
        check_size("box shape", size)?;
        Ok(Self::new(
            Geometry::Box {
                half_extents: size * 0.5,
                radius: radius.max(0.0),
            },
            collision_type,
        ))
    }

    /// Axis-aligned segment from `a` to `b`
    pub fn segment(a: Vec2, b: Vec2, radius: f32, collision_type: CollisionType) -> Result<Self, ConfigError> {
        let ends = ((a.x, a.y), (b.x, b.y));
        if a.x != b.x && a.y != b.y {
            return Err(ConfigError::SkewedSegment { a: ends.0, b: ends.1 });
        }
        if a == b && radius <= 0.0 {
            return Err(ConfigError::DegenerateSegment { a: ends.0, b: ends.1 });
        }
        Ok(Self::new(
            Geometry::Segment {
                a,
                b,
                radius: radius.max(0.0),
            },
            collision_type,
        ))
    }

    fn new(geometry: Geometry, collision_type: CollisionType) -> Self {
        Self {
            geometry,
            collision_type,
            filter: ShapeFilter {
                categories: collision_type.bits(),
                mask: ShapeFilter::ALL_MASKS,
            },
            owner: None,
            body: None,
        }
    }

    pub fn with_filter(mut self, filter: ShapeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Frictionless, non-bouncing collider tagged with `handle`
    fn to_collider(&self, handle: ShapeHandle) -> Collider {
        let builder = match self.geometry {
            Geometry::Box {
                half_extents: h,
                radius,
            } if radius > 0.0 => ColliderBuilder::round_cuboid(h.x, h.y, radius),
            Geometry::Box { half_extents: h, .. } => ColliderBuilder::cuboid(h.x, h.y),
            Geometry::Segment { a, b, radius } if radius > 0.0 => {
                ColliderBuilder::capsule_from_endpoints(vec2_to_point(a), vec2_to_point(b), radius)
            }
            Geometry::Segment { a, b, .. } => ColliderBuilder::segment(vec2_to_point(a), vec2_to_point(b)),
        };
        builder
            .collision_groups(self.filter.groups())
            .density(0.0)
            .friction(0.0)
            .restitution(0.0)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
            .user_data(u128::from(handle.0))
            .build()
    }
}

/// Collision callback: gets the arbiter and the caller's context
pub type Callback<C> = Box<dyn Fn(&mut Arbiter<'_>, &mut C) -> Result<bool, SimError>>;

/// Box a closure as a [`Callback`], pinning down its argument lifetimes
pub fn callback<C, F>(f: F) -> Callback<C>
where
    F: Fn(&mut Arbiter<'_>, &mut C) -> Result<bool, SimError> + 'static,
{
    Box::new(f)
}

/// Callbacks for one pair of collision types
pub struct CollisionHandler<C> {
    pub begin: Option<Callback<C>>,
    pub pre_solve: Option<Callback<C>>,
    pub post_solve: Option<Callback<C>>,
    pub separate: Option<Callback<C>>,
}

impl<C> Default for CollisionHandler<C> {
    fn default() -> Self {
        Self {
            begin: None,
            pre_solve: None,
            post_solve: None,
            separate: None,
        }
    }
}

impl<C> CollisionHandler<C> {
    /// Whether callbacks get a say before rapier resolves the pair
    fn gates_response(&self) -> bool {
        self.begin.is_some() || self.pre_solve.is_some()
    }
}

/// Deepest point of a touching pair
#[derive(Debug, Clone, Copy, PartialEq)]
struct Contact {
    /// Unit normal pointing from the first shape towards the second
    normal: Vec2,
    /// Penetration depth along the normal, zero when merely touching
    depth: f32,
    point: Vec2,
}

/// Who a contact is between, captured when it starts
#[derive(Debug, Clone, Copy, PartialEq)]
struct PairInfo {
    shapes: [ShapeHandle; 2],
    collision_types: [CollisionType; 2],
    owners: [Option<EntityId>; 2],
    bodies: [BodyHandle; 2],
}

#[derive(Debug, Clone, Copy)]
struct ContactState {
    info: PairInfo,
    contact: Contact,
    /// `begin` rejected this pair
    ignored: bool,
    /// Last `pre_solve` answer
    solid: bool,
    /// No `post_solve` has run for this contact yet
    fresh: bool,
}

impl ContactState {
    fn responds(&self) -> bool {
        !self.ignored && self.solid
    }
}

/// One touching pair as presented to a callback
///
/// Shapes are ordered as the handler was registered: `shapes()[0]` has the
/// handler's first collision type. The normal points from shape 0 to shape 1.
pub struct Arbiter<'a> {
    shapes: [ShapeHandle; 2],
    collision_types: [CollisionType; 2],
    owners: [Option<EntityId>; 2],
    body_handles: [BodyHandle; 2],
    contact: Contact,
    first_contact: bool,
    bodies: &'a mut BTreeMap<BodyHandle, BodySlot>,
}

impl<'a> Arbiter<'a> {
    fn new(
        state: &ContactState,
        first_contact: bool,
        swapped: bool,
        bodies: &'a mut BTreeMap<BodyHandle, BodySlot>,
    ) -> Self {
        let PairInfo {
            mut shapes,
            mut collision_types,
            mut owners,
            bodies: mut body_handles,
        } = state.info;
        let mut contact = state.contact;
        if swapped {
            shapes.swap(0, 1);
            collision_types.swap(0, 1);
            owners.swap(0, 1);
            body_handles.swap(0, 1);
            contact.normal = -contact.normal;
        }
        Self {
            shapes,
            collision_types,
            owners,
            body_handles,
            contact,
            first_contact,
            bodies,
        }
    }

    pub fn shapes(&self) -> [ShapeHandle; 2] {
        self.shapes
    }

    pub fn collision_types(&self) -> [CollisionType; 2] {
        self.collision_types
    }

    /// Entity owning shape `index`
    pub fn owner(&self, index: usize) -> Result<EntityId, SimError> {
        self.owners[index].ok_or(SimError::MissingOwner(self.shapes[index]))
    }

    pub fn normal(&self) -> Vec2 {
        self.contact.normal
    }

    /// Penetration depth along the normal
    pub fn depth(&self) -> f32 {
        self.contact.depth
    }

    pub fn point(&self) -> Vec2 {
        self.contact.point
    }

    /// True while a contact has not yet been through `post_solve`
    pub fn is_first_contact(&self) -> bool {
        self.first_contact
    }

    /// A removed body is gone by the time `separate` runs
    pub fn body(&self, index: usize) -> Option<&Body> {
        self.bodies.get(&self.body_handles[index]).map(|slot| &slot.body)
    }

    pub fn body_mut(&mut self, index: usize) -> Option<&mut Body> {
        self.bodies
            .get_mut(&self.body_handles[index])
            .map(|slot| &mut slot.body)
    }
}

/// Nearest hit of a segment query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    pub shape: ShapeHandle,
    /// Centre of the swept circle at impact
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction along the query segment
    pub alpha: f32,
}

#[derive(Debug)]
struct BodySlot {
    body: Body,
    handle: RigidBodyHandle,
}

#[derive(Debug)]
struct ShapeSlot {
    shape: Shape,
    collider: ColliderHandle,
}

fn shape_of(colliders: &ColliderSet, handle: ColliderHandle) -> Option<ShapeHandle> {
    colliders
        .get(handle)
        .map(|collider| ShapeHandle(collider.user_data as u32))
}

/// Tells rapier which pairs get a physical response
struct ResponseFilter<'a> {
    shapes: &'a BTreeMap<ShapeHandle, ShapeSlot>,
    contacts: &'a BTreeMap<(ShapeHandle, ShapeHandle), ContactState>,
    /// Type pairs (both orders) whose callbacks must see a contact first
    gated: &'a BTreeSet<(CollisionType, CollisionType)>,
}

impl ResponseFilter<'_> {
    fn responds(&self, a: ShapeHandle, b: ShapeHandle) -> bool {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(state) = self.contacts.get(&key) {
            return state.responds();
        }
        match (self.shapes.get(&a), self.shapes.get(&b)) {
            (Some(sa), Some(sb)) => !self
                .gated
                .contains(&(sa.shape.collision_type, sb.shape.collision_type)),
            _ => true,
        }
    }
}

impl PhysicsHooks for ResponseFilter<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let pair = (
            shape_of(context.colliders, context.collider1),
            shape_of(context.colliders, context.collider2),
        );
        let responds = match pair {
            (Some(a), Some(b)) => self.responds(a, b),
            _ => true,
        };
        // Contacts are still computed for silent pairs so they can separate
        Some(if responds {
            SolverFlags::COMPUTE_IMPULSES
        } else {
            SolverFlags::empty()
        })
    }
}

/// Deepest contact point of a pair rapier considers close, if any is within slop
fn deepest_contact(pair: &ContactPair, colliders: &ColliderSet) -> Option<Contact> {
    // Colliders never rotate, so local frames only differ by a translation
    let origin = na_to_vec2(colliders.get(pair.collider1)?.translation());
    pair.manifolds
        .iter()
        .flat_map(|manifold| manifold.points.iter().map(move |point| (manifold, point)))
        .filter(|(_, point)| point.dist <= CONTACT_SLOP)
        .min_by(|(_, p), (_, q)| p.dist.total_cmp(&q.dist))
        .map(|(manifold, point)| Contact {
            normal: na_to_vec2(&manifold.local_n1),
            depth: (-point.dist).max(0.0),
            point: origin + na_to_vec2(&point.local_p1.coords),
        })
}

/// Registered handler for a type pair, and whether the pair must be swapped
/// to match the registration order
fn lookup<C>(
    handlers: &HashMap<(CollisionType, CollisionType), CollisionHandler<C>>,
    [a, b]: [CollisionType; 2],
) -> Option<(&CollisionHandler<C>, bool)> {
    handlers
        .get(&(a, b))
        .map(|handler| (handler, false))
        .or_else(|| handlers.get(&(b, a)).map(|handler| (handler, true)))
}

/// Owns every body and shape, parameterised by the context type handed to callbacks
pub struct PhysicsWorld<C> {
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    bodies: BTreeMap<BodyHandle, BodySlot>,
    shapes: BTreeMap<ShapeHandle, ShapeSlot>,
    static_body: BodyHandle,
    static_handle: RigidBodyHandle,
    handlers: HashMap<(CollisionType, CollisionType), CollisionHandler<C>>,
    contacts: BTreeMap<(ShapeHandle, ShapeHandle), ContactState>,
    /// Contacts cut short by `remove`, reported at the start of the next step
    severed: Vec<ContactState>,
    next_body: u32,
    next_shape: u32,
}

impl<C> Default for PhysicsWorld<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PhysicsWorld<C> {
    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.length_unit = LENGTH_UNIT;

        let mut rigid_bodies = RigidBodySet::new();
        let static_body = BodyHandle(0);
        let static_handle = rigid_bodies.insert(Body::fixed().to_rapier());
        let mut bodies = BTreeMap::new();
        bodies.insert(
            static_body,
            BodySlot {
                body: Body::fixed(),
                handle: static_handle,
            },
        );

        Self {
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies,
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bodies,
            shapes: BTreeMap::new(),
            static_body,
            static_handle,
            handlers: HashMap::new(),
            contacts: BTreeMap::new(),
            severed: Vec::new(),
            next_body: 1,
            next_shape: 0,
        }
    }

    /// Add a body together with its one shape
    pub fn add(&mut self, body: Body, shape: Shape) -> PhysicsBody {
        let body_handle = BodyHandle(self.next_body);
        self.next_body += 1;
        let handle = self.rigid_bodies.insert(body.to_rapier());
        self.bodies.insert(body_handle, BodySlot { body, handle });
        let shape = self.attach(body_handle, handle, shape);
        PhysicsBody {
            body: body_handle,
            shape,
        }
    }

    /// Add static geometry to the world's built-in static body
    pub fn add_static(&mut self, shape: Shape) -> ShapeHandle {
        self.attach(self.static_body, self.static_handle, shape)
    }

    fn attach(&mut self, body: BodyHandle, parent: RigidBodyHandle, mut shape: Shape) -> ShapeHandle {
        let handle = ShapeHandle(self.next_shape);
        self.next_shape += 1;
        shape.body = Some(body);
        let collider =
            self.colliders
                .insert_with_parent(shape.to_collider(handle), parent, &mut self.rigid_bodies);
        self.shapes.insert(handle, ShapeSlot { shape, collider });
        self.query_pipeline.update(&self.colliders);
        handle
    }

    /// Remove a body and its shape together
    ///
    /// Returns false (and does nothing) if the pair was already removed.
    /// Contacts the pair was part of get their `separate` at the next step.
    pub fn remove(&mut self, pair: PhysicsBody) -> bool {
        let shape = self.shapes.remove(&pair.shape);
        let body = if pair.body == self.static_body {
            None
        } else {
            self.bodies.remove(&pair.body)
        };

        if let Some(slot) = &body {
            self.rigid_bodies.remove(
                slot.handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        } else if let Some(slot) = &shape {
            self.colliders.remove(
                slot.collider,
                &mut self.island_manager,
                &mut self.rigid_bodies,
                true,
            );
        }

        let severed: Vec<_> = self
            .contacts
            .keys()
            .filter(|&&(a, b)| a == pair.shape || b == pair.shape)
            .copied()
            .collect();
        for key in severed {
            if let Some(state) = self.contacts.remove(&key) {
                self.severed.push(state);
            }
        }

        self.query_pipeline.update(&self.colliders);
        shape.is_some() || body.is_some()
    }

    /// Register (or fetch) the handler for a pair of collision types
    pub fn add_collision_handler(
        &mut self,
        type_a: CollisionType,
        type_b: CollisionType,
    ) -> &mut CollisionHandler<C> {
        self.handlers.entry((type_a, type_b)).or_default()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle).map(|slot| &slot.body)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(&handle).map(|slot| &mut slot.body)
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&Shape> {
        self.shapes.get(&handle).map(|slot| &slot.shape)
    }

    /// Number of bodies, not counting the built-in static body
    pub fn body_count(&self) -> usize {
        self.bodies.len() - 1
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of pairs currently touching
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Nearest shape hit by a segment swept with the given radius
    ///
    /// Sees bodies where the last step (or `add`) left them.
    pub fn segment_query(
        &self,
        start: Vec2,
        end: Vec2,
        radius: f32,
        filter: ShapeFilter,
    ) -> Option<SegmentHit> {
        let dir = end - start;
        let query = QueryFilter::default().groups(filter.groups());

        let (collider, alpha, normal) = if radius > 0.0 {
            let (collider, hit) = self.query_pipeline.cast_shape(
                &self.rigid_bodies,
                &self.colliders,
                &Isometry::translation(start.x, start.y),
                &vec2_to_na(dir),
                &Ball::new(radius),
                ShapeCastOptions::with_max_time_of_impact(1.0),
                query,
            )?;
            (collider, hit.time_of_impact, na_to_vec2(&hit.normal1))
        } else {
            let ray = Ray::new(vec2_to_point(start), vec2_to_na(dir));
            let (collider, hit) = self.query_pipeline.cast_ray_and_get_normal(
                &self.rigid_bodies,
                &self.colliders,
                &ray,
                1.0,
                true,
                query,
            )?;
            (collider, hit.time_of_impact, na_to_vec2(&hit.normal))
        };

        Some(SegmentHit {
            shape: shape_of(&self.colliders, collider)?,
            point: start.lerp(end, alpha),
            normal,
            alpha,
        })
    }

    /// Advance the world by `dt`, running collision callbacks against `ctx`
    ///
    /// The first callback error aborts the step and is returned. A `dt` that
    /// is not positive only reports contacts severed by `remove`.
    pub fn step(&mut self, dt: f32, ctx: &mut C) -> Result<(), SimError> {
        for state in mem::take(&mut self.severed) {
            self.run_separate(&state, ctx)?;
        }
        if dt.is_nan() || dt <= 0.0 {
            return Ok(());
        }

        self.push_bodies();
        self.integration_parameters.dt = dt;

        let gated: BTreeSet<_> = self
            .handlers
            .iter()
            .filter(|(_, handler)| handler.gates_response())
            .flat_map(|(&(a, b), _)| [(a, b), (b, a)])
            .collect();
        let filter = ResponseFilter {
            shapes: &self.shapes,
            contacts: &self.contacts,
            gated: &gated,
        };

        self.pipeline.step(
            &Vector2::zeros(),
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &filter,
            &(),
        );

        self.pull_bodies();
        self.dispatch(ctx)
    }

    /// Hand glam-side edits to rapier
    fn push_bodies(&mut self) {
        for slot in self.bodies.values() {
            if !slot.body.is_dynamic() {
                continue;
            }
            let Some(rigid) = self.rigid_bodies.get_mut(slot.handle) else {
                continue;
            };
            let position = vec2_to_na(slot.body.position);
            if *rigid.translation() != position {
                rigid.set_translation(position, true);
            }
            let velocity = vec2_to_na(slot.body.velocity);
            if *rigid.linvel() != velocity {
                rigid.set_linvel(velocity, true);
            }
        }
    }

    fn pull_bodies(&mut self) {
        for slot in self.bodies.values_mut() {
            if !slot.body.is_dynamic() {
                continue;
            }
            if let Some(rigid) = self.rigid_bodies.get(slot.handle) {
                slot.body.position = na_to_vec2(rigid.translation());
                slot.body.velocity = na_to_vec2(rigid.linvel());
            }
        }
    }

    /// Pairs touching right now, keyed with the lower shape handle first
    fn touching(&self) -> BTreeMap<(ShapeHandle, ShapeHandle), Contact> {
        let mut touching = BTreeMap::new();
        for pair in self.narrow_phase.contact_pairs() {
            let (Some(a), Some(b)) = (
                shape_of(&self.colliders, pair.collider1),
                shape_of(&self.colliders, pair.collider2),
            ) else {
                continue;
            };
            let Some(mut contact) = deepest_contact(pair, &self.colliders) else {
                continue;
            };
            let key = if a < b {
                (a, b)
            } else {
                contact.normal = -contact.normal;
                (b, a)
            };
            touching.insert(key, contact);
        }
        touching
    }

    fn pair_info(&self, (a, b): (ShapeHandle, ShapeHandle)) -> Option<PairInfo> {
        let (sa, sb) = (&self.shapes.get(&a)?.shape, &self.shapes.get(&b)?.shape);
        Some(PairInfo {
            shapes: [a, b],
            collision_types: [sa.collision_type, sb.collision_type],
            owners: [sa.owner, sb.owner],
            bodies: [sa.body?, sb.body?],
        })
    }

    /// Run the handler protocol over what the last rapier step left behind
    fn dispatch(&mut self, ctx: &mut C) -> Result<(), SimError> {
        let touching = self.touching();

        let solved: Vec<_> = self
            .contacts
            .iter()
            .filter(|(_, state)| state.responds())
            .map(|(&key, _)| key)
            .collect();
        for key in solved {
            let Some(state) = self.contacts.get_mut(&key) else {
                continue;
            };
            let first_contact = mem::replace(&mut state.fresh, false);
            let state = *state;
            if let Some((handler, swapped)) = lookup(&self.handlers, state.info.collision_types)
                && let Some(post_solve) = &handler.post_solve
            {
                let mut arbiter = Arbiter::new(&state, first_contact, swapped, &mut self.bodies);
                post_solve(&mut arbiter, ctx)?;
            }
        }

        let ended: Vec<_> = self
            .contacts
            .keys()
            .filter(|key| !touching.contains_key(*key))
            .copied()
            .collect();
        for key in ended {
            if let Some(state) = self.contacts.remove(&key) {
                self.run_separate(&state, ctx)?;
            }
        }

        for (key, contact) in touching {
            let first_contact = !self.contacts.contains_key(&key);
            if first_contact {
                let Some(info) = self.pair_info(key) else {
                    continue;
                };
                self.contacts.insert(
                    key,
                    ContactState {
                        info,
                        contact,
                        ignored: false,
                        solid: true,
                        fresh: true,
                    },
                );
            }
            let Some(state) = self.contacts.get_mut(&key) else {
                continue;
            };
            state.contact = contact;
            if state.ignored {
                continue;
            }
            let state = *state;

            let Some((handler, swapped)) = lookup(&self.handlers, state.info.collision_types) else {
                continue;
            };
            let mut arbiter = Arbiter::new(&state, first_contact, swapped, &mut self.bodies);
            let mut ignored = false;
            if first_contact
                && let Some(begin) = &handler.begin
                && !begin(&mut arbiter, ctx)?
            {
                let [type_a, type_b] = state.info.collision_types;
                log::trace!("{type_a:?} x {type_b:?} ignored until separation");
                ignored = true;
            }
            let solid = match &handler.pre_solve {
                Some(pre_solve) if !ignored => pre_solve(&mut arbiter, ctx)?,
                _ => true,
            };
            if let Some(state) = self.contacts.get_mut(&key) {
                state.ignored = ignored;
                state.solid = solid;
            }
        }

        Ok(())
    }

    fn run_separate(&mut self, state: &ContactState, ctx: &mut C) -> Result<(), SimError> {
        let Some((handler, swapped)) = lookup(&self.handlers, state.info.collision_types) else {
            return Ok(());
        };
        if let Some(separate) = &handler.separate {
            let mut arbiter = Arbiter::new(state, false, swapped, &mut self.bodies);
            separate(&mut arbiter, ctx)?;
        }
        Ok(())
    }
}
