//! Driving-state simulator invariants across many seeds.

use rand::rngs::StdRng;
use rand::SeedableRng;
use traj_refiner::simulate::{generate_speeds, simulate_driving_state, DrivingStateSimulator, StopConfig};
use traj_refiner::{Coordinate, CoordinateSystem, SimulatorConfig, Trajectory};

/// Zig-zag route through Shanghai with uneven spacing.
fn route(n: usize) -> Trajectory {
    let coords: Vec<Coordinate> = (0..n)
        .map(|i| {
            let step = if i % 7 == 0 { 0.004 } else { 0.0007 };
            let wiggle = if i % 2 == 0 { 0.0003 } else { -0.0003 };
            Coordinate::new(121.40 + i as f64 * step, 31.20 + wiggle)
        })
        .collect();
    Trajectory::from_coords(CoordinateSystem::Wgs84, &coords)
}

#[test]
fn speeds_stay_within_bounds_for_every_seed() {
    let config = SimulatorConfig {
        max_speed: 80.0,
        initial_speed: 0.0,
        ..SimulatorConfig::default()
    };
    for seed in 0..50 {
        let speeds = generate_speeds(500, &config, &mut StdRng::seed_from_u64(seed));
        assert!(speeds.iter().all(|s| (0.0..=80.0).contains(s)), "seed {}", seed);
    }
}

#[test]
fn steady_state_settles_near_cruising_band() {
    let config = SimulatorConfig::default();
    let speeds = generate_speeds(20_000, &config, &mut StdRng::seed_from_u64(2024));
    let tail = &speeds[1_000..];
    let mean = tail.iter().sum::<f64>() / tail.len() as f64;
    assert!(mean > 50.0 && mean < 95.0, "mean speed {}", mean);
}

#[test]
fn timestamps_never_decrease_with_stops() {
    let config = SimulatorConfig {
        stop: Some(StopConfig::default()),
        ..SimulatorConfig::default()
    };
    let simulator = DrivingStateSimulator::new(config.clone()).unwrap();
    let start = config.start_epoch_ms().unwrap();
    let traj = route(120);

    for seed in 0..30 {
        let result = simulator.simulate(&traj, &mut StdRng::seed_from_u64(seed)).unwrap();
        assert_eq!(result.len(), traj.len());
        assert_eq!(result.points[0].timestamp, Some(start));

        for pair in result.points.windows(2) {
            let dt = pair[1].timestamp.unwrap() - pair[0].timestamp.unwrap();
            // Stationary steps take 10 s, which is inside the default clamp
            assert!((5_000..=30_000).contains(&dt), "seed {} step {}ms", seed, dt);
        }
        for (p, original) in result.points.iter().zip(&traj.points) {
            assert!(p.same_position(original));
            assert!((0.0..=config.max_speed).contains(&p.speed.unwrap()));
        }
        assert!(result.points.iter().any(|p| p.speed == Some(0.0)), "seed {}", seed);
    }
}

#[test]
fn offset_trajectories_keep_their_coordinate_system() {
    let mut traj = route(30);
    traj.coord_system = CoordinateSystem::Gcj02;
    let result = simulate_driving_state(&traj, &SimulatorConfig::default(), &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(result.coord_system, CoordinateSystem::Gcj02);
    assert!(result.points.iter().all(|p| p.direction.is_none()));
}

#[test]
fn custom_start_time_is_read_as_utc() {
    let config = SimulatorConfig {
        start_time: "2020-01-01 00:00:00".to_string(),
        ..SimulatorConfig::default()
    };
    let result = simulate_driving_state(&route(5), &config, &mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(result.points[0].timestamp, Some(1_577_836_800_000));
}
