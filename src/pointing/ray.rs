//! Ray casting against the room cube and the dome hemisphere

use nalgebra::{Point3, Vector3};

use crate::constants::{DOME_PUSH_FACTOR, FLOOR_Y, PARALLEL_EPSILON, WORLD_MAX, WORLD_MIN};
use crate::projection::DomeGeometry;

/// Half-line starting at `origin`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a new ray
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// Axis-aligned room cube
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomBounds {
    /// Wall position on the negative x and z sides
    pub min: f64,
    /// Wall position on the positive x and z sides, and ceiling height
    pub max: f64,
    /// Floor height
    pub floor: f64,
}

impl Default for RoomBounds {
    fn default() -> Self {
        Self {
            min: WORLD_MIN,
            max: WORLD_MAX,
            floor: FLOOR_Y,
        }
    }
}

impl RoomBounds {
    fn contains_x(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }

    fn contains_y(&self, y: f64) -> bool {
        self.floor <= y && y <= self.max
    }

    fn contains_z(&self, z: f64) -> bool {
        self.min <= z && z <= self.max
    }
}

/// Surface the pointer ray is cast against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// Six planes of the room cube
    Room(RoomBounds),
    /// Dome hemisphere; hits are pulled inside by `push_factor`
    Dome {
        geometry: DomeGeometry,
        push_factor: f64,
    },
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::Room(RoomBounds::default())
    }
}

impl Boundary {
    /// Dome boundary with the default push factor
    pub fn dome(geometry: DomeGeometry) -> Self {
        Boundary::Dome {
            geometry,
            push_factor: DOME_PUSH_FACTOR,
        }
    }

    /// First point where `ray` meets this boundary, if any
    pub fn intersect(&self, ray: &Ray) -> Option<Point3<f64>> {
        match self {
            Boundary::Room(bounds) => intersect_room(ray, bounds),
            Boundary::Dome {
                geometry,
                push_factor,
            } => intersect_dome(ray, geometry)
                .map(|hit| geometry.push_inside(&hit, *push_factor)),
        }
    }
}

/// Nearest intersection of a ray with the walls, floor or ceiling of the room
///
/// Each plane is tested with `t = (plane - origin) / direction`; near-parallel
/// axes are skipped, only forward hits (`t > 0`) whose other two coordinates
/// lie inside the cube are kept, and the smallest `t` wins.
pub fn intersect_room(ray: &Ray, bounds: &RoomBounds) -> Option<Point3<f64>> {
    let o = ray.origin;
    let d = ray.direction;
    let mut best: Option<(f64, Point3<f64>)> = None;

    let mut consider = |t: f64, hit: Point3<f64>| {
        if t > 0.0 && best.map_or(true, |(best_t, _)| t < best_t) {
            best = Some((t, hit));
        }
    };

    if d.x.abs() > PARALLEL_EPSILON {
        for wall in [bounds.min, bounds.max] {
            let t = (wall - o.x) / d.x;
            let y = o.y + d.y * t;
            let z = o.z + d.z * t;
            if bounds.contains_y(y) && bounds.contains_z(z) {
                consider(t, Point3::new(wall, y, z));
            }
        }
    }

    if d.y.abs() > PARALLEL_EPSILON {
        for level in [bounds.floor, bounds.max] {
            let t = (level - o.y) / d.y;
            let x = o.x + d.x * t;
            let z = o.z + d.z * t;
            if bounds.contains_x(x) && bounds.contains_z(z) {
                consider(t, Point3::new(x, level, z));
            }
        }
    }

    if d.z.abs() > PARALLEL_EPSILON {
        for wall in [bounds.min, bounds.max] {
            let t = (wall - o.z) / d.z;
            let x = o.x + d.x * t;
            let y = o.y + d.y * t;
            if bounds.contains_x(x) && bounds.contains_y(y) {
                consider(t, Point3::new(x, y, wall));
            }
        }
    }

    best.map(|(_, hit)| hit)
}

/// Intersection of a ray with the dome hemisphere, on the dome surface
///
/// Solves `|P + tD|² = R²` with `P` relative to the dome centre and keeps the
/// smaller positive root. Hits below the hemisphere's ground cutoff are
/// rejected. The returned point has not been pushed inside.
pub fn intersect_dome(ray: &Ray, dome: &DomeGeometry) -> Option<Point3<f64>> {
    let p = ray.origin - dome.center();
    let d = ray.direction;

    let a = d.norm_squared();
    if a == 0.0 {
        return None;
    }
    let b = 2.0 * p.dot(&d);
    let c = p.norm_squared() - dome.radius * dome.radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let near = (-b - sqrt_disc) / (2.0 * a);
    let far = (-b + sqrt_disc) / (2.0 * a);
    let t = if near > 0.0 {
        near
    } else if far > 0.0 {
        far
    } else {
        return None;
    };

    let hit = ray.at(t);
    if hit.y < dome.ground_cutoff() {
        return None;
    }
    Some(hit)
}
