//! Data model and validation for the factory LP engine.
//!
//! A [`Recipe`] consumes and produces items in fixed ratios at a
//! machine, a [`FactoryInput`] bundles the recipe book with machine
//! caps, raw supply budgets, and the requested target rate.

mod solver;

pub use solver::solve_factory;

use crate::error::{PlannerError, Result};
use crate::tolerance::EPSILON;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

fn default_multiplier() -> f64 {
    1.0
}

/// A production transformation: consumes `inputs`, produces `outputs`,
/// running on a `machine` at `base_crafts_per_min` crafts per minute
/// (before speed/productivity scaling).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Recipe {
    pub id: String,
    pub machine: String,
    pub base_crafts_per_min: f64,
    #[serde(default)]
    pub inputs: IndexMap<String, f64>,
    #[serde(default)]
    pub outputs: IndexMap<String, f64>,
    #[serde(default = "default_multiplier")]
    pub speed_multiplier: f64,
    #[serde(default = "default_multiplier")]
    pub productivity_multiplier: f64,
}

impl Recipe {
    /// Crafts per minute at this recipe's speed, before productivity scaling.
    /// Zero means the recipe is disabled and must be pinned to `x_r = 0`.
    pub fn effective_rate(&self) -> f64 {
        self.base_crafts_per_min * self.speed_multiplier
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(PlannerError::invalid("recipe id must not be empty"));
        }
        if self.base_crafts_per_min < 0.0 {
            return Err(PlannerError::invalid(format!(
                "recipe {}: base_crafts_per_min must be non-negative",
                self.id
            )));
        }
        if self.speed_multiplier < 0.0 {
            return Err(PlannerError::invalid(format!(
                "recipe {}: speed_multiplier must be non-negative",
                self.id
            )));
        }
        if self.productivity_multiplier < 1.0 {
            return Err(PlannerError::invalid(format!(
                "recipe {}: productivity_multiplier must be >= 1",
                self.id
            )));
        }
        for (item, count) in self.inputs.iter().chain(self.outputs.iter()) {
            if *count < 0.0 {
                return Err(PlannerError::invalid(format!(
                    "recipe {}: count for {} must be non-negative",
                    self.id, item
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Target {
    pub item: String,
    pub rate_per_min: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FactoryInput {
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub machines: IndexMap<String, f64>,
    #[serde(default)]
    pub raw_supply: IndexMap<String, f64>,
    pub target: Target,
}

impl FactoryInput {
    pub fn validate(&self) -> Result<()> {
        if self.recipes.is_empty() {
            return Err(PlannerError::invalid("recipes must not be empty"));
        }
        let mut seen_ids = IndexSet::new();
        for recipe in &self.recipes {
            recipe.validate()?;
            if !seen_ids.insert(recipe.id.clone()) {
                return Err(PlannerError::invalid(format!(
                    "duplicate recipe id: {}",
                    recipe.id
                )));
            }
        }
        for (machine, cap) in &self.machines {
            if *cap < 0.0 || cap.fract().abs() > EPSILON {
                return Err(PlannerError::invalid(format!(
                    "machine cap for {} must be a non-negative integer",
                    machine
                )));
            }
        }
        for (item, rate) in &self.raw_supply {
            if *rate < 0.0 {
                return Err(PlannerError::invalid(format!(
                    "raw supply for {} must be non-negative",
                    item
                )));
            }
        }
        if self.target.item.is_empty() {
            return Err(PlannerError::invalid("target item must not be empty"));
        }
        if self.target.rate_per_min <= 0.0 {
            return Err(PlannerError::invalid(
                "target rate_per_min must be strictly positive",
            ));
        }
        Ok(())
    }
}

/// How an item behaves across the recipe book's steady-state balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRole {
    Raw,
    Target,
    Intermediate,
    Byproduct,
}

/// Classifies every item referenced by any recipe, in first-seen order:
/// the target item first, then raw supplies, then anything produced but
/// never consumed (a byproduct), everything else is an intermediate.
pub(crate) fn classify_items(input: &FactoryInput) -> IndexMap<String, ItemRole> {
    let mut produced: IndexSet<String> = IndexSet::new();
    let mut consumed: IndexSet<String> = IndexSet::new();
    let mut order: IndexSet<String> = IndexSet::new();

    for recipe in &input.recipes {
        for item in recipe.inputs.keys() {
            order.insert(item.clone());
            if recipe.inputs.get(item).copied().unwrap_or(0.0) > 0.0 {
                consumed.insert(item.clone());
            }
        }
        for item in recipe.outputs.keys() {
            order.insert(item.clone());
            if recipe.outputs.get(item).copied().unwrap_or(0.0) > 0.0 {
                produced.insert(item.clone());
            }
        }
    }
    order.insert(input.target.item.clone());
    for item in input.raw_supply.keys() {
        order.insert(item.clone());
    }

    order
        .into_iter()
        .map(|item| {
            let role = if item == input.target.item {
                ItemRole::Target
            } else if input.raw_supply.contains_key(&item) {
                ItemRole::Raw
            } else if produced.contains(&item) && !consumed.contains(&item) {
                ItemRole::Byproduct
            } else {
                ItemRole::Intermediate
            };
            (item, role)
        })
        .collect()
}

/// Output of a feasible solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FactoryOutput {
    Ok {
        crafts_per_min: IndexMap<String, f64>,
        machines_used: IndexMap<String, f64>,
        production: IndexMap<String, f64>,
    },
    Infeasible {
        reason: String,
        max_rate: f64,
        bottlenecks: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: &str, inputs: &[(&str, f64)], outputs: &[(&str, f64)]) -> Recipe {
        Recipe {
            id: id.to_owned(),
            machine: "assembler".to_owned(),
            base_crafts_per_min: 60.0,
            inputs: inputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            outputs: outputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            speed_multiplier: 1.0,
            productivity_multiplier: 1.0,
        }
    }

    #[test]
    fn classifies_byproduct_and_target() {
        let input = FactoryInput {
            recipes: vec![recipe("r1", &[("ore", 1.0)], &[("plate", 1.0), ("slag", 0.5)])],
            machines: IndexMap::new(),
            raw_supply: [("ore".to_string(), 100.0)].into_iter().collect(),
            target: Target {
                item: "plate".to_string(),
                rate_per_min: 10.0,
            },
        };
        let roles = classify_items(&input);
        assert_eq!(roles["ore"], ItemRole::Raw);
        assert_eq!(roles["plate"], ItemRole::Target);
        assert_eq!(roles["slag"], ItemRole::Byproduct);
    }

    #[test]
    fn rejects_negative_counts() {
        let input = FactoryInput {
            recipes: vec![recipe("r1", &[("ore", -1.0)], &[])],
            machines: IndexMap::new(),
            raw_supply: IndexMap::new(),
            target: Target {
                item: "ore".to_string(),
                rate_per_min: 1.0,
            },
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_target_rate() {
        let input = FactoryInput {
            recipes: vec![recipe("r1", &[], &[("ore", 1.0)])],
            machines: IndexMap::new(),
            raw_supply: IndexMap::new(),
            target: Target {
                item: "ore".to_string(),
                rate_per_min: 0.0,
            },
        };
        assert!(input.validate().is_err());
    }
}
