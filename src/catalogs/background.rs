//! Decorative background star field
//!
//! These points are not catalog objects: they are never projected, tracked
//! or detected. They only give the renderer a sky texture to draw behind the
//! catalog.

use std::f64::consts::PI;

use nalgebra::Point3;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constants::DOME_PUSH_FACTOR;
use crate::projection::ProjectionMode;

/// Height band used for room-mode background stars
const ROOM_STAR_MAX_HEIGHT: f64 = 15.0;

/// Generate `count` reproducible background points for a projection mode
///
/// In dome mode the points are spread over the upper hemisphere just inside
/// the dome surface. In room mode they are scattered over a square twice the
/// size of the room, between the horizon and a fixed height.
pub fn generate_background_stars(
    count: usize,
    mode: &ProjectionMode,
    seed: u64,
) -> Vec<Point3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stars = Vec::with_capacity(count);

    match mode {
        ProjectionMode::Dome(dome) => {
            let theta_dist = Uniform::from(0.0..2.0 * PI);
            let phi_dist = Uniform::from(0.0..PI / 2.0);
            let radius = dome.radius * DOME_PUSH_FACTOR;
            let center = dome.center();

            for _ in 0..count {
                let theta = theta_dist.sample(&mut rng);
                let phi = phi_dist.sample(&mut rng);
                stars.push(Point3::new(
                    center.x + radius * phi.sin() * theta.cos(),
                    center.y + radius * phi.cos(),
                    center.z + radius * phi.sin() * theta.sin(),
                ));
            }
        }
        ProjectionMode::Flat { world_scale } => {
            let extent = 2.0 * world_scale;
            let horizontal = Uniform::from(-extent..extent);
            let height = Uniform::from(0.0..ROOM_STAR_MAX_HEIGHT);

            for _ in 0..count {
                stars.push(Point3::new(
                    horizontal.sample(&mut rng),
                    height.sample(&mut rng),
                    horizontal.sample(&mut rng),
                ));
            }
        }
    }

    stars
}
