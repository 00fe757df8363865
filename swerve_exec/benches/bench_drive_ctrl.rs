//! # Drive Control Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::tc::drive_ctrl::DriveCmd;
use swerve_lib::{
    drive_ctrl::{DriveCtrl, InitData, InputData, Params},
    eqpt::sim::{SimParams, SimRig},
    kinematics::{ChassisKinematics, ChassisVelocity},
};
use util::module::State;

const CYCLE_PERIOD_S: f64 = 0.02;

fn drive_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build the controller against simulated equipment ----

    let params: Params = util::params::parse(include_str!("../../params/drive_ctrl.toml")).unwrap();
    let kinematics = ChassisKinematics::new(params.geometry.clone()).unwrap();

    let sim_params = SimParams {
        drive_free_speed_ms: 4.8,
        arm_free_speed_rads: 2.6535,
        arm_initial_pos_rad: 0.0,
        arm_gravity_v: 0.0,
        arm_zero_cos_offset_rad: 0.0,
    };
    let (mut rig, eqpt, _) = SimRig::new(
        &sim_params,
        kinematics.clone(),
        params.chassis_offsets_rad,
        0.0,
        -1.0
    );

    let mut drive_ctrl = DriveCtrl::init(InitData {
        params,
        eqpt,
        cycle_period_s: CYCLE_PERIOD_S,
    }).unwrap();

    drive_ctrl.proc(&InputData {
        cmds: vec![DriveCmd::Drive { x: 0.6, y: -0.3, rot: 0.4, field_relative: true }]
    }).unwrap();

    // Bench the kinematics alone
    let vel = ChassisVelocity::new(1.2, -0.8, 2.0);
    let prev_angles = [0.0; 4];
    c.bench_function("ChassisKinematics::forward", |b| {
        b.iter(|| kinematics.forward(&vel, &prev_angles).unwrap())
    });

    // Bench a full cycle
    let input = InputData::default();
    c.bench_function("DriveCtrl::proc", |b| {
        b.iter(|| {
            let out = drive_ctrl.proc(&input).unwrap();
            rig.step(CYCLE_PERIOD_S);
            out
        })
    });
}

criterion_group!(benches, drive_ctrl_benchmark);
criterion_main!(benches);
