#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use swarm::simulation::agent::{Agent, AgentPool, Species};
use swarm::simulation::geometric_utils::{
    blend_heading, face_toward, hue_to_rgb, normalize_or, random_in_ball, random_unit_vec3,
    rgb_to_hue,
};
use swarm::simulation::spatial::SpatialIndex;

fn create_test_pool(positions: &[Vec3]) -> AgentPool {
    AgentPool::new(
        positions
            .iter()
            .enumerate()
            .map(|(id, &pos)| Agent::new(id, Species::Drifter, pos, Vec3::X, 0.0, 1.0))
            .collect(),
    )
}

#[test]
fn test_normalize_or_guards_zero() {
    assert_eq!(normalize_or(Vec3::ZERO, Vec3::Y), Vec3::Y);
    assert_eq!(normalize_or(Vec3::splat(f32::NAN), Vec3::Z), Vec3::Z);
    assert!((normalize_or(Vec3::new(3.0, 4.0, 0.0), Vec3::Y) - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-6);
}

#[test]
fn test_blend_heading_extremes() {
    let full = blend_heading(Vec3::X, Vec3::Y * 5.0, 1.0);
    assert!((full - Vec3::Y).length() < 1e-5);

    let none = blend_heading(Vec3::X, Vec3::Y, 0.0);
    assert_eq!(none, Vec3::X);

    let ignored = blend_heading(Vec3::X, Vec3::ZERO, 0.5);
    assert_eq!(ignored, Vec3::X);

    let half = blend_heading(Vec3::X, Vec3::Y, 0.5);
    let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
    assert!((half - expected).length() < 1e-5);
}

#[test]
fn test_blend_heading_reverses_without_nan() {
    let reversed = blend_heading(Vec3::X, Vec3::NEG_X, 0.5);
    assert!(reversed.is_finite());
    assert!((reversed.length() - 1.0).abs() < 1e-5);
    assert!(reversed.x.abs() < 1e-4);
}

#[test]
fn test_face_toward_point() {
    let heading = face_toward(Vec3::X, Vec3::new(0.0, -2.0, 0.0), Vec3::ZERO, 1.0);
    assert!((heading - Vec3::Y).length() < 1e-5);
}

#[test]
fn test_random_samples_in_range() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..200 {
        assert!(random_in_ball(&mut rng, 2.0).length() <= 2.0 + 1e-5);
        assert!((random_unit_vec3(&mut rng).length() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_hue_color_conversion() {
    assert_eq!(hue_to_rgb(0.0), [1.0, 0.0, 0.0]);
    assert!((rgb_to_hue([0.0, 1.0, 0.0]) - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(rgb_to_hue([0.5, 0.5, 0.5]), 0.0);

    for step in 0..100 {
        let hue = step as f32 / 100.0;
        let recovered = rgb_to_hue(hue_to_rgb(hue));
        let distance = (recovered - hue).abs();
        assert!(distance.min(1.0 - distance) < 1e-4, "{hue} -> {recovered}");
        assert!((0.0..1.0).contains(&recovered));
    }
}

#[test]
fn test_spatial_neighbors_sorted_and_exclusive() {
    let pool = create_test_pool(&[
        Vec3::new(0.3, 0.0, 0.0),
        Vec3::ZERO,
        Vec3::new(0.0, 0.2, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -0.5),
    ]);
    let index = SpatialIndex::build(&pool).unwrap();

    assert_eq!(index.neighbors(Vec3::ZERO, 0.5, 1), vec![0, 2, 4]);
    assert_eq!(index.neighbors(Vec3::ZERO, 0.25, 1), vec![2]);
    assert!(index.neighbors(Vec3::new(2.0, 0.0, 0.0), 0.1, 3).is_empty());
}

#[test]
fn test_spatial_index_finds_coincident_agents() {
    let pool = create_test_pool(&[Vec3::ONE, Vec3::ONE, Vec3::ONE]);
    let index = SpatialIndex::build(&pool).unwrap();

    assert_eq!(index.neighbors(Vec3::ONE, 0.0, 0), vec![1, 2]);
}

#[test]
fn test_spatial_index_rejects_non_finite_positions() {
    let pool = create_test_pool(&[Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0)]);
    assert!(SpatialIndex::build(&pool).is_err());
}

#[test]
fn test_pool_renumbers_ids() {
    let mut agents = vec![
        Agent::new(7, Species::Prey, Vec3::ZERO, Vec3::ZERO, 1.5, 0.1),
        Agent::new(3, Species::Predator, Vec3::ONE, Vec3::Y, -0.25, 4.0),
    ];
    agents.reverse();
    let pool = AgentPool::new(agents);

    assert_eq!(pool.get(0).unwrap().id, 0);
    assert_eq!(pool.get(1).unwrap().id, 1);
    assert_eq!(pool.first_of(Species::Prey).unwrap().id, 1);

    let prey = pool.get(1).unwrap();
    assert_eq!(prey.forward(), Vec3::NEG_Z);
    assert!((prey.hue() - 0.5).abs() < 1e-6);
    assert_eq!(prey.mass(), 0.5);
    assert!((pool.get(0).unwrap().hue() - 0.75).abs() < 1e-6);
}
