//! # Chassis odometry
//!
//! Dead reckoning of the chassis pose on the field from module motion and the
//! heading sensor.
//!
//! Every update only uses the change in module distances since the previous
//! update. The chassis displacement is found with the inverse kinematics and
//! integrated along a constant curvature arc (the exponential of the twist)
//! before being rotated into the field frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use serde::{Deserialize, Serialize};

// Internal
use crate::kinematics::{ChassisKinematics, ModulePosition};
use comms_if::eqpt::mech::NUM_MODULES;
use util::maths::{get_ang_dist, wrap_to_pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Heading changes smaller than this use the series expansion of the twist
/// exponential.
const SMALL_ANGLE_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pose of the chassis in the field frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Anticlockwise from the field X axis, in the range [-pi, pi).
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// Running pose estimate of the chassis.
#[derive(Debug, Clone)]
pub struct ChassisOdometry {
    kinematics: ChassisKinematics,

    pose: Pose2D,

    /// Baselines for the next update, `None` after a reset until the next
    /// update establishes them.
    prev_positions: Option<[ModulePosition; NUM_MODULES]>,
    prev_heading_rad: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self { x_m, y_m, heading_rad }
    }
}

impl ChassisOdometry {
    pub fn new(kinematics: ChassisKinematics, initial_pose: Pose2D) -> Self {
        Self {
            kinematics,
            pose: initial_pose,
            prev_positions: None,
            prev_heading_rad: None,
        }
    }

    /// The current pose estimate.
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Integrate the motion since the last update into the pose.
    ///
    /// `heading_rad` is the heading sensor reading. Only its change between
    /// updates is used, so the sensor's zero does not need to match the
    /// field frame.
    ///
    /// The first update after creation or a reset only records the
    /// baselines and leaves the pose unchanged.
    pub fn update(
        &mut self,
        positions: &[ModulePosition; NUM_MODULES],
        heading_rad: f64
    ) -> Pose2D {
        let (prev_positions, prev_heading_rad) = match (self.prev_positions, self.prev_heading_rad) {
            (Some(p), Some(h)) => (p, h),
            _ => {
                self.rebaseline(positions, heading_rad);
                return self.pose
            }
        };

        let twist = self.kinematics.inverse_positions(&prev_positions, positions);
        let dtheta = get_ang_dist(prev_heading_rad, heading_rad);

        // Exponential of the twist
        let (s, c) = if dtheta.abs() < SMALL_ANGLE_RAD {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        }
        else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };
        let dx_cb = twist.dx_m * s - twist.dy_m * c;
        let dy_cb = twist.dx_m * c + twist.dy_m * s;

        // Rotate into the field frame
        let (sin_h, cos_h) = self.pose.heading_rad.sin_cos();
        self.pose.x_m += dx_cb * cos_h - dy_cb * sin_h;
        self.pose.y_m += dx_cb * sin_h + dy_cb * cos_h;
        self.pose.heading_rad = wrap_to_pi(self.pose.heading_rad + dtheta);

        self.rebaseline(positions, heading_rad);

        self.pose
    }

    /// Overwrite the pose estimate.
    ///
    /// The baselines are cleared with the pose, so motion before the reset is
    /// never applied to the new pose.
    pub fn reset(&mut self, pose: Pose2D) {
        debug!("Odometry reset to {:?}", pose);
        self.pose = Pose2D {
            heading_rad: wrap_to_pi(pose.heading_rad),
            ..pose
        };
        self.rebase();
    }

    /// Clear the baselines without changing the pose.
    ///
    /// Used when a sensor's reference changes, e.g. when the heading sensor
    /// is zeroed or the drive encoders are reset.
    pub fn rebase(&mut self) {
        self.prev_positions = None;
        self.prev_heading_rad = None;
    }

    fn rebaseline(&mut self, positions: &[ModulePosition; NUM_MODULES], heading_rad: f64) {
        self.prev_positions = Some(*positions);
        self.prev_heading_rad = Some(heading_rad);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use crate::kinematics::{ChassisVelocity, ModuleGeometry};

    const DT: f64 = 0.02;

    /// Integrates module distances for a chassis velocity held over `n`
    /// cycles, feeding each cycle into the odometry.
    struct Driver {
        kin: ChassisKinematics,
        positions: [ModulePosition; NUM_MODULES],
        heading_rad: f64,
    }

    impl Driver {
        fn new() -> Self {
            Self {
                kin: ChassisKinematics::new(ModuleGeometry::rectangular(0.6731, 0.6731)).unwrap(),
                positions: [ModulePosition::default(); NUM_MODULES],
                heading_rad: 0.0,
            }
        }

        fn drive(&mut self, odom: &mut ChassisOdometry, vel: ChassisVelocity, n: usize) {
            let prev = [0.0; NUM_MODULES];
            let states = self.kin.forward(&vel, &prev).unwrap();
            for _ in 0..n {
                for i in 0..NUM_MODULES {
                    self.positions[i].distance_m += states[i].speed_ms * DT;
                    self.positions[i].angle_rad = states[i].angle_rad;
                }
                self.heading_rad += vel.omega_rads * DT;
                odom.update(&self.positions, self.heading_rad);
            }
        }
    }

    fn assert_pose_eq(a: Pose2D, b: Pose2D, tol: f64) {
        assert!((a.x_m - b.x_m).abs() < tol, "{:?} != {:?}", a, b);
        assert!((a.y_m - b.y_m).abs() < tol, "{:?} != {:?}", a, b);
        assert!(get_ang_dist(a.heading_rad, b.heading_rad).abs() < tol, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_straight_line() {
        let mut driver = Driver::new();
        let mut odom = ChassisOdometry::new(driver.kin.clone(), Pose2D::default());

        // Baseline
        odom.update(&driver.positions, 0.0);

        driver.drive(&mut odom, ChassisVelocity::new(1.0, 0.0, 0.0), 50);
        assert_pose_eq(odom.pose(), Pose2D::new(1.0, 0.0, 0.0), 1e-9);
    }

    #[test]
    fn test_closed_square() {
        let mut driver = Driver::new();
        let start = Pose2D::new(2.0, -1.0, 0.3);
        let mut odom = ChassisOdometry::new(driver.kin.clone(), start);
        odom.update(&driver.positions, 0.0);

        // Drive a side then turn on the spot by 90 degrees, four times
        for _ in 0..4 {
            driver.drive(&mut odom, ChassisVelocity::new(1.5, 0.0, 0.0), 40);
            driver.drive(&mut odom, ChassisVelocity::new(0.0, 0.0, FRAC_PI_2), 50);
        }

        assert_pose_eq(odom.pose(), start, 1e-6);
    }

    #[test]
    fn test_closed_square_crabbing() {
        let mut driver = Driver::new();
        let mut odom = ChassisOdometry::new(driver.kin.clone(), Pose2D::default());
        odom.update(&driver.positions, 0.0);

        driver.drive(&mut odom, ChassisVelocity::new(1.0, 0.0, 0.0), 50);
        assert_pose_eq(odom.pose(), Pose2D::new(1.0, 0.0, 0.0), 1e-9);
        driver.drive(&mut odom, ChassisVelocity::new(0.0, 1.0, 0.0), 50);
        assert_pose_eq(odom.pose(), Pose2D::new(1.0, 1.0, 0.0), 1e-9);
        driver.drive(&mut odom, ChassisVelocity::new(-1.0, 0.0, 0.0), 50);
        driver.drive(&mut odom, ChassisVelocity::new(0.0, -1.0, 0.0), 50);

        assert_pose_eq(odom.pose(), Pose2D::default(), 1e-9);
    }

    #[test]
    fn test_arc_is_exact() {
        let mut driver = Driver::new();
        let mut odom = ChassisOdometry::new(driver.kin.clone(), Pose2D::default());
        odom.update(&driver.positions, 0.0);

        // Half circle of radius 1 m
        driver.drive(&mut odom, ChassisVelocity::new(1.0, 0.0, 1.0), 157);
        let theta = 157.0 * DT;
        let expected = Pose2D::new(theta.sin(), 1.0 - theta.cos(), theta);
        assert_pose_eq(odom.pose(), expected, 1e-6);
    }

    #[test]
    fn test_reset_uses_new_baseline() {
        let mut driver = Driver::new();
        let mut odom = ChassisOdometry::new(driver.kin.clone(), Pose2D::default());
        odom.update(&driver.positions, 0.0);
        driver.drive(&mut odom, ChassisVelocity::new(1.0, 0.0, 0.0), 50);

        // Teleport, then jump the encoders as if they had been reset. The
        // jump must not be read as motion.
        odom.reset(Pose2D::new(5.0, 5.0, 0.0));
        for p in driver.positions.iter_mut() {
            p.distance_m = 0.0;
        }
        odom.update(&driver.positions, driver.heading_rad);
        assert_pose_eq(odom.pose(), Pose2D::new(5.0, 5.0, 0.0), 1e-12);

        driver.drive(&mut odom, ChassisVelocity::new(0.0, 1.0, 0.0), 50);
        assert_pose_eq(odom.pose(), Pose2D::new(5.0, 6.0, 0.0), 1e-9);
    }

    #[test]
    fn test_no_motion_keeps_pose() {
        let mut driver = Driver::new();
        let mut odom = ChassisOdometry::new(driver.kin.clone(), Pose2D::default());
        odom.update(&driver.positions, 0.0);

        driver.drive(&mut odom, ChassisVelocity::new(1.0, 0.0, 0.5), 10);
        let pose = odom.pose();

        // Readings held at their previous values
        for _ in 0..10 {
            odom.update(&driver.positions, driver.heading_rad);
        }
        assert_pose_eq(pose, odom.pose(), 1e-12);
    }
}
