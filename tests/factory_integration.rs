use factory_planner::factory::{solve_factory, FactoryInput, FactoryOutput, Recipe, Target};
use indexmap::IndexMap;

const EPSILON: f64 = 1e-6;

fn recipe(
    id: &str,
    machine: &str,
    base_crafts_per_min: f64,
    inputs: &[(&str, f64)],
    outputs: &[(&str, f64)],
) -> Recipe {
    Recipe {
        id: id.to_string(),
        machine: machine.to_string(),
        base_crafts_per_min,
        inputs: inputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        outputs: outputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        speed_multiplier: 1.0,
        productivity_multiplier: 1.0,
    }
}

fn map(pairs: &[(&str, f64)]) -> IndexMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn feasible_gear_production() {
    let input = FactoryInput {
        recipes: vec![recipe(
            "gear",
            "assembler",
            60.0,
            &[("iron_plate", 1.0)],
            &[("iron_gear", 1.0)],
        )],
        machines: map(&[("assembler", 10.0)]),
        raw_supply: map(&[("iron_plate", 200.0)]),
        target: Target {
            item: "iron_gear".to_string(),
            rate_per_min: 10.0,
        },
    };

    match solve_factory(&input).unwrap() {
        FactoryOutput::Ok {
            crafts_per_min,
            machines_used,
            production,
        } => {
            assert!((crafts_per_min["gear"] - 10.0).abs() < EPSILON);
            assert!((machines_used["assembler"] - 10.0 / 60.0).abs() < EPSILON);
            assert!((production["iron_gear"] - 10.0).abs() < EPSILON);
        }
        FactoryOutput::Infeasible { .. } => panic!("expected a feasible plan"),
    }
}

#[test]
fn infeasible_machine_capacity_reports_bottleneck() {
    let input = FactoryInput {
        recipes: vec![recipe(
            "gear",
            "assembler",
            60.0,
            &[("iron_plate", 1.0)],
            &[("iron_gear", 1.0)],
        )],
        machines: map(&[("assembler", 1.0)]),
        raw_supply: map(&[("iron_plate", 1_000_000.0)]),
        target: Target {
            item: "iron_gear".to_string(),
            rate_per_min: 5000.0,
        },
    };

    match solve_factory(&input).unwrap() {
        FactoryOutput::Infeasible {
            max_rate,
            bottlenecks,
            ..
        } => {
            assert!((max_rate - 60.0).abs() < EPSILON);
            assert!(bottlenecks.iter().any(|b| b == "assembler"));
        }
        FactoryOutput::Ok { .. } => panic!("expected infeasible"),
    }
}

#[test]
fn byproduct_is_unconstrained_and_reported() {
    let input = FactoryInput {
        recipes: vec![recipe(
            "r1",
            "assembler",
            60.0,
            &[("ore", 1.0)],
            &[("plate", 1.0), ("slag", 0.5)],
        )],
        machines: map(&[("assembler", 100.0)]),
        raw_supply: map(&[("ore", 1000.0)]),
        target: Target {
            item: "plate".to_string(),
            rate_per_min: 10.0,
        },
    };

    match solve_factory(&input).unwrap() {
        FactoryOutput::Ok { production, .. } => {
            assert!((production["slag"] - 5.0).abs() < EPSILON);
        }
        FactoryOutput::Infeasible { .. } => panic!("expected feasible"),
    }
}

#[test]
fn raw_supply_never_exceeded() {
    let input = FactoryInput {
        recipes: vec![recipe(
            "gear",
            "assembler",
            60.0,
            &[("iron_plate", 1.0)],
            &[("iron_gear", 1.0)],
        )],
        machines: map(&[("assembler", 1000.0)]),
        raw_supply: map(&[("iron_plate", 5.0)]),
        target: Target {
            item: "iron_gear".to_string(),
            rate_per_min: 10.0,
        },
    };

    match solve_factory(&input).unwrap() {
        FactoryOutput::Infeasible { max_rate, bottlenecks, .. } => {
            assert!((max_rate - 5.0).abs() < EPSILON);
            assert!(bottlenecks.iter().any(|b| b == "iron_plate"));
        }
        FactoryOutput::Ok { .. } => panic!("expected infeasible on raw supply"),
    }
}

#[test]
fn rejects_non_positive_target_rate() {
    let input = FactoryInput {
        recipes: vec![recipe("r1", "m", 60.0, &[], &[("x", 1.0)])],
        machines: IndexMap::new(),
        raw_supply: IndexMap::new(),
        target: Target {
            item: "x".to_string(),
            rate_per_min: 0.0,
        },
    };
    assert!(solve_factory(&input).is_err());
}
