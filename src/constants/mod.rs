//! Constants module for astronomical and scene calculations

// Time constants
/// Seconds in a day
pub const DAY_S: f64 = 86_400.0;
/// J2000.0 epoch as Julian date
pub const J2000: f64 = 2_451_545.0;
/// Days in a Julian century
pub const JULIAN_CENTURY: f64 = 36_525.0;

// Sidereal time polynomial (IAU 1982 GMST, degrees)
/// GMST at J2000.0 in degrees
pub const GMST_AT_J2000_DEG: f64 = 280.460_618_37;
/// Mean sidereal rotation in degrees per day
pub const GMST_DEG_PER_DAY: f64 = 360.985_647_366_29;
/// Quadratic coefficient of the GMST polynomial
pub const GMST_T2: f64 = 0.000_387_933;
/// Divisor of the cubic term of the GMST polynomial
pub const GMST_T3_DIVISOR: f64 = 38_710_000.0;

// Angles
/// Degrees in a full circle
pub const FULL_CIRCLE_DEG: f64 = 360.0;
/// Hours in a full circle of right ascension
pub const FULL_CIRCLE_HOURS: f64 = 24.0;
/// Degrees of rotation per hour of right ascension
pub const DEG_PER_HOUR: f64 = 15.0;

// Pointer limits
/// Pitch is clamped to this magnitude to stay away from the poles
pub const PITCH_LIMIT_DEG: f64 = 89.0;

// Scene
/// Half-extent of the room cube walls
pub const WORLD_MAX: f64 = 30.0;
/// Negative half-extent of the room cube walls
pub const WORLD_MIN: f64 = -30.0;
/// Largest-axis magnitude of a flat projection
pub const WORLD_SCALE: f64 = 30.0;
/// Height of the room floor
pub const FLOOR_Y: f64 = -1.0;
/// Default dome radius
pub const DOME_RADIUS: f64 = 30.0;
/// Vertical shift that places the dome rim on the floor
pub const DOME_GROUND_OFFSET: f64 = 1.0;
/// Fraction of the radius at which dome hits are drawn
pub const DOME_PUSH_FACTOR: f64 = 0.98;

// Ray casting
/// Direction components below this magnitude are treated as parallel to a plane
pub const PARALLEL_EPSILON: f64 = 0.001;

// Coordinate cache
/// Sidereal hours that must elapse before the projected sky is rebuilt (~3.6 s)
pub const LST_UPDATE_THRESHOLD_HOURS: f64 = 0.001;

// Detection
/// Hit distance for stars and galaxies
pub const THRESHOLD_OBJECT: f64 = 1.0;
/// Hit distance for planets
pub const THRESHOLD_PLANET: f64 = 1.5;
/// Hit distance for the Moon and the Sun
pub const THRESHOLD_MOON: f64 = 2.0;
/// Angular proximity for camera detection, degrees
pub const THRESHOLD_CAMERA_DEG: f64 = 2.0;

// Network and serial
/// TCP port of the tracking protocol
pub const SERVER_PORT: u16 = 12345;
/// Interval between DATA/SENSOR updates in milliseconds
pub const SERVER_UPDATE_INTERVAL_MS: u64 = 100;
/// Default serial baud rate
pub const SERIAL_BAUD_RATE: u32 = 115_200;
/// Maximum outbound command rate
pub const SERIAL_MAX_HZ: f64 = 50.0;
/// Slowest command rate a configuration may ask for
pub const SERIAL_MIN_HZ: f64 = 1.0;

// Interactive session
/// Pointer rotation per frame while a turn key is held, degrees
pub const POINTER_STEP_DEG: f64 = 1.0;
/// Pointer rotation per frame with the fine-control modifier, degrees
pub const POINTER_FINE_STEP_DEG: f64 = 0.1;
/// Field of view change per second while a zoom key is held, degrees
pub const ZOOM_RATE_DEG_PER_S: f64 = 200.0;
/// Number of decorative background stars
pub const BACKGROUND_STAR_COUNT: usize = 150;
/// Seed for the background star layout
pub const BACKGROUND_STAR_SEED: u64 = 0x5eed_0001;
/// Upper bound on actuator lines consumed per frame
pub const SENSOR_LINES_PER_FRAME: usize = 16;
