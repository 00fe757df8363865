//! # Chassis kinematics
//!
//! Maps a chassis velocity onto the four corner modules and back again.
//!
//! Each module's velocity is the chassis translational velocity plus the
//! tangential velocity induced by the chassis rotation at the module's offset
//! from the centre of rotation:
//!
//! ```text
//! v_i = (vx - omega * ry_i, vy + omega * rx_i)
//! ```
//!
//! Stacking this for all modules gives an overdetermined linear system
//! `A * [vx, vy, omega] = b`, which the inverse mapping solves in the least
//! squares sense through the normal equations `AᵀA x = Aᵀb`. The inverse of
//! `AᵀA` is computed once when the kinematics are built.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

// Internal
use comms_if::eqpt::mech::NUM_MODULES;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Module speeds below this are treated as zero and the module holds its
/// previous angle.
///
/// Units: meters/second
pub const MODULE_SPEED_EPSILON_MS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity of the chassis in the chassis frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Forward velocity.
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Leftward velocity.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Anticlockwise rotation rate.
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

/// Displacement of the chassis in the chassis frame over one cycle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct Twist2D {
    pub dx_m: f64,
    pub dy_m: f64,
    pub dtheta_rad: f64,
}

/// Desired (or measured) output of one module.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Signed wheel speed.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Wheel direction relative to chassis forwards, unbounded.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// Odometry snapshot of one module.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    /// Cumulative distance travelled by the wheel since the last reset.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Wheel direction relative to chassis forwards.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// Position of each module relative to the chassis centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleGeometry {
    /// `[x, y]` offset of each module, in `MODULE_IDS` order.
    ///
    /// Units: meters
    /// Frame: Chassis body (X+ forwards, Y+ left)
    pub module_pos_m_cb: [[f64; 2]; NUM_MODULES],
}

/// Kinematics of a chassis with a fixed module geometry.
#[derive(Debug, Clone)]
pub struct ChassisKinematics {
    geometry: ModuleGeometry,

    /// `(A^T A)^-1`, the inverse mapping applies this to `A^T b`.
    ata_inv: Matrix3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("The module geometry is degenerate, all modules lie at the same point")]
    DegenerateGeometry,

    #[error("Chassis velocity is not finite: {0:?}")]
    NonFiniteVelocity(ChassisVelocity),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleGeometry {
    /// A rectangular chassis with the modules at its corners.
    ///
    /// `length_m` is measured along the chassis X axis and `width_m` along Y.
    pub fn rectangular(length_m: f64, width_m: f64) -> Self {
        let x = 0.5 * length_m;
        let y = 0.5 * width_m;
        Self {
            module_pos_m_cb: [[x, y], [x, -y], [-x, y], [-x, -y]]
        }
    }
}

impl ChassisVelocity {
    pub fn new(vx_ms: f64, vy_ms: f64, omega_rads: f64) -> Self {
        Self { vx_ms, vy_ms, omega_rads }
    }

    pub fn is_finite(&self) -> bool {
        self.vx_ms.is_finite() && self.vy_ms.is_finite() && self.omega_rads.is_finite()
    }
}

impl ChassisKinematics {
    /// Build the kinematics for the given geometry.
    pub fn new(geometry: ModuleGeometry) -> Result<Self, KinematicsError> {
        // A has rows [1, 0, -ry] and [0, 1, rx] for each module.
        let mut ata = Matrix3::zeros();
        for [rx, ry] in geometry.module_pos_m_cb.iter() {
            ata[(0, 0)] += 1.0;
            ata[(1, 1)] += 1.0;
            ata[(0, 2)] -= ry;
            ata[(2, 0)] -= ry;
            ata[(1, 2)] += rx;
            ata[(2, 1)] += rx;
            ata[(2, 2)] += rx * rx + ry * ry;
        }

        let ata_inv = ata.try_inverse().ok_or(KinematicsError::DegenerateGeometry)?;

        Ok(Self { geometry, ata_inv })
    }

    pub fn geometry(&self) -> &ModuleGeometry {
        &self.geometry
    }

    /// Calculate the module states required to achieve a chassis velocity.
    ///
    /// Modules whose required speed is below `MODULE_SPEED_EPSILON_MS` keep
    /// their entry in `prev_angles_rad`, so a stationary chassis does not
    /// jitter its wheels.
    pub fn forward(
        &self,
        velocity: &ChassisVelocity,
        prev_angles_rad: &[f64; NUM_MODULES]
    ) -> Result<[ModuleState; NUM_MODULES], KinematicsError> {
        if !velocity.is_finite() {
            return Err(KinematicsError::NonFiniteVelocity(*velocity))
        }

        let mut states = [ModuleState::default(); NUM_MODULES];

        for (i, [rx, ry]) in self.geometry.module_pos_m_cb.iter().enumerate() {
            let vx = velocity.vx_ms - velocity.omega_rads * ry;
            let vy = velocity.vy_ms + velocity.omega_rads * rx;
            let speed_ms = vx.hypot(vy);

            states[i] = if speed_ms < MODULE_SPEED_EPSILON_MS {
                ModuleState {
                    speed_ms: 0.0,
                    angle_rad: prev_angles_rad[i]
                }
            }
            else {
                ModuleState {
                    speed_ms,
                    angle_rad: vy.atan2(vx)
                }
            };
        }

        Ok(states)
    }

    /// Calculate the chassis velocity from the four module states.
    pub fn inverse(&self, states: &[ModuleState; NUM_MODULES]) -> ChassisVelocity {
        let mut vectors = [[0f64; 2]; NUM_MODULES];
        for (v, s) in vectors.iter_mut().zip(states.iter()) {
            *v = [s.speed_ms * s.angle_rad.cos(), s.speed_ms * s.angle_rad.sin()];
        }

        let x = self.solve(&vectors);

        ChassisVelocity::new(x[0], x[1], x[2])
    }

    /// Calculate the chassis displacement between two sets of module
    /// positions.
    ///
    /// Each module's distance delta is taken to lie along its current angle.
    pub fn inverse_positions(
        &self,
        prev: &[ModulePosition; NUM_MODULES],
        curr: &[ModulePosition; NUM_MODULES]
    ) -> Twist2D {
        let mut vectors = [[0f64; 2]; NUM_MODULES];
        for i in 0..NUM_MODULES {
            let delta_m = curr[i].distance_m - prev[i].distance_m;
            vectors[i] = [
                delta_m * curr[i].angle_rad.cos(),
                delta_m * curr[i].angle_rad.sin()
            ];
        }

        let x = self.solve(&vectors);

        Twist2D {
            dx_m: x[0],
            dy_m: x[1],
            dtheta_rad: x[2]
        }
    }

    /// Module states pointing each wheel at the chassis centre with zero
    /// speed, locking the chassis in place.
    ///
    /// The angles follow the geometry. A square chassis gives exactly
    /// ±45° at the front and ±135° at the rear, a rectangular one points
    /// each wheel along its own diagonal.
    pub fn x_formation(&self) -> [ModuleState; NUM_MODULES] {
        let mut states = [ModuleState::default(); NUM_MODULES];
        for (s, [rx, ry]) in states.iter_mut().zip(self.geometry.module_pos_m_cb.iter()) {
            s.angle_rad = ry.atan2(*rx);
        }
        states
    }

    /// Least squares solution of `A x = b`, where `b` is the stack of module
    /// vectors.
    fn solve(&self, vectors: &[[f64; 2]; NUM_MODULES]) -> Vector3<f64> {
        let mut atb = Vector3::zeros();
        for ([rx, ry], [bx, by]) in self.geometry.module_pos_m_cb.iter().zip(vectors.iter()) {
            atb[0] += bx;
            atb[1] += by;
            atb[2] += -ry * bx + rx * by;
        }

        self.ata_inv * atb
    }
}

/// Scale all module speeds down by the same factor if any exceeds
/// `max_speed_ms`.
///
/// Returns `true` if the speeds were scaled.
pub fn desaturate(states: &mut [ModuleState; NUM_MODULES], max_speed_ms: f64) -> bool {
    let max_found = states
        .iter()
        .map(|s| s.speed_ms.abs())
        .fold(0f64, f64::max);

    if max_found > max_speed_ms {
        let scale = max_speed_ms / max_found;
        for s in states.iter_mut() {
            s.speed_ms *= scale;
        }
        true
    }
    else {
        false
    }
}
