#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::fs;

use swarm::simulation::params::{RuleSet, SwarmConfig, Tunable};
use swarm::simulation::state::{FollowTarget, SimulationState};
use swarm::simulation::swarm::Swarm;
use swarm::simulation::events::ControlEvent;

fn create_test_config() -> SwarmConfig {
    SwarmConfig {
        agent_count: 20,
        predator_count: 2,
        food_count: 3,
        rng_seed: Some(42),
        ..SwarmConfig::predator_prey()
    }
}

#[test]
fn test_save_and_load() {
    let mut swarm = Swarm::new(create_test_config()).unwrap();

    // Run simulation for a bit to create some state
    for _ in 0..5 {
        swarm.step(0.05).unwrap();
    }

    let save_path = "test_save.json";

    // Save the swarm
    swarm.save_to_file(save_path).unwrap();

    // Load it back
    let loaded = SimulationState::load_from_file(save_path).unwrap();

    // Verify the loaded state matches
    let original = swarm.state();
    assert_eq!(loaded.agents.len(), original.agents.len());
    assert_eq!(loaded.food.len(), original.food.len());
    assert_eq!(loaded.tick, original.tick);
    assert_eq!(loaded.time, original.time);
    assert_eq!(loaded.rules, original.rules);

    for (loaded_agent, agent) in loaded.agents.iter().zip(original.agents.iter()) {
        assert_eq!(loaded_agent.id, agent.id);
        assert_eq!(loaded_agent.species, agent.species);
        assert_eq!(loaded_agent.position, agent.position);
        assert_eq!(loaded_agent.hue(), agent.hue());
        assert!((loaded_agent.forward() - agent.forward()).length() < 1e-6);
    }

    // Clean up
    fs::remove_file(save_path).ok();
}

#[test]
fn test_loaded_simulation_continues() {
    let mut swarm = Swarm::new(create_test_config()).unwrap();
    swarm.run(3, 0.05).unwrap();

    let save_path = "test_save_continue.json";
    swarm.save_to_file(save_path).unwrap();

    let mut loaded = Swarm::load_from_file(save_path, &create_test_config()).unwrap();
    fs::remove_file(save_path).ok();

    for _ in 0..5 {
        loaded.step(0.05).unwrap();
    }

    assert_eq!(loaded.state().tick, 8);
    assert!(loaded.state().agents.is_finite());
}

#[test]
fn test_save_preserves_runtime_changes() {
    let mut swarm = Swarm::new(create_test_config()).unwrap();
    swarm.queue(ControlEvent::SetParam {
        name: "aversion".to_string(),
        value: 0.25,
    });
    swarm.queue(ControlEvent::Follow(FollowTarget::Predator));
    swarm.step(0.05).unwrap();

    let save_path = "test_save_runtime.json";
    swarm.save_to_file(save_path).unwrap();
    let loaded = SimulationState::load_from_file(save_path).unwrap();
    fs::remove_file(save_path).ok();

    assert_eq!(loaded.rules.tunable().get("aversion"), Some(0.25));
    assert_eq!(loaded.follow, FollowTarget::Predator);
    assert!(matches!(loaded.rules, RuleSet::PredatorPrey(_)));
}

#[test]
fn test_load_repairs_out_of_range_values() {
    let swarm = Swarm::new(create_test_config()).unwrap();
    let save_path = "test_save_repair.json";
    swarm.save_to_file(save_path).unwrap();

    let json = fs::read_to_string(save_path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["state"]["rules"]["cohesion"] = serde_json::json!(9.0);
    value["state"]["agents"]["agents"][0]["hue"] = serde_json::json!(1.75);
    value["state"]["agents"]["agents"][0]["forward"] = serde_json::json!([0.0, 3.0, 0.0]);
    fs::write(save_path, serde_json::to_string(&value).unwrap()).unwrap();

    let loaded = SimulationState::load_from_file(save_path).unwrap();
    fs::remove_file(save_path).ok();

    assert_eq!(loaded.rules.tunable().get("cohesion"), Some(0.4));
    let agent = loaded.agents.get(0).unwrap();
    assert!((agent.hue() - 0.75).abs() < 1e-6);
    assert!((agent.forward().length() - 1.0).abs() < 1e-6);
}

#[test]
fn test_load_renumbers_agent_ids() {
    let swarm = Swarm::new(create_test_config()).unwrap();
    let save_path = "test_save_ids.json";
    swarm.save_to_file(save_path).unwrap();

    let json = fs::read_to_string(save_path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["state"]["agents"]["agents"][0]["id"] = serde_json::json!(99);
    value["state"]["agents"]["agents"][1]["id"] = serde_json::json!(0);
    fs::write(save_path, serde_json::to_string(&value).unwrap()).unwrap();

    let loaded = SimulationState::load_from_file(save_path).unwrap();
    fs::remove_file(save_path).ok();

    for (index, agent) in loaded.agents.iter().enumerate() {
        assert_eq!(agent.id, index);
    }
}

#[test]
fn test_load_missing_file_fails() {
    let result = SimulationState::load_from_file("does_not_exist.json");
    assert!(result.is_err());
}
