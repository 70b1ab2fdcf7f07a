//! The factory LP engine: primary minimum-machine LP, and the phase-2
//! diagnostic run when the primary LP is infeasible.
//!
//! Our constants (invariant over the lifetime of a solve) are:
//! - EffectiveRate(r) -> crafts/min a recipe r runs at
//! - productivity_multiplier(r) -> output scaling for recipe r
//! - in(r,i), out(r,i) -> how much of item i recipe r consumes/produces
//!
//! Our variables are:
//! - x_r -> crafts/min of recipe r
//! - m_t -> machines of type t in use, tied to the x_r by an accounting equality
//! - y -> (diagnostic phase only) the achieved target rate
//!
//! The one identity that closes the loop between x_r and m_t is:
//! - m_t = sum(x_r / EffectiveRate(r) for r using machine t)

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};

use super::{classify_items, FactoryInput, FactoryOutput, ItemRole, Recipe};
use crate::error::{PlannerError, Result};
use crate::tolerance::{clamp_zero, is_binding};

pub fn solve_factory(input: &FactoryInput) -> Result<FactoryOutput> {
    input.validate()?;
    info!(
        "factory solve: {} recipes, {} machine types, {} raw items, target {}={}/min",
        input.recipes.len(),
        input.machines.len(),
        input.raw_supply.len(),
        input.target.item,
        input.target.rate_per_min
    );

    let roles = classify_items(input);
    match solve_primary(input, &roles)? {
        PrimaryOutcome::Feasible(output) => Ok(output),
        PrimaryOutcome::Infeasible => {
            debug!("primary LP infeasible, running diagnostic phase");
            solve_diagnostic(input, &roles)
        }
    }
}

enum PrimaryOutcome {
    Feasible(FactoryOutput),
    Infeasible,
}

fn solve_primary(input: &FactoryInput, roles: &IndexMap<String, ItemRole>) -> Result<PrimaryOutcome> {
    let mut vars = ProblemVariables::new();
    let x = add_recipe_vars(&mut vars, &input.recipes);
    let machine_types = machine_type_union(input);
    let m = add_machine_vars(&mut vars, &machine_types);

    let objective = sum_of(&m);
    let mut problem = vars.minimise(objective).using(default_solver);

    add_balance_constraints(&mut problem, input, roles, &x, None);
    add_machine_constraints(&mut problem, input, &machine_types, &m, &x);

    match problem.solve() {
        Ok(solution) => {
            let crafts_per_min: IndexMap<String, f64> = input
                .recipes
                .iter()
                .map(|r| (r.id.clone(), clamp_zero(solution.value(x[&r.id]))))
                .collect();
            let machines_used: IndexMap<String, f64> = machine_types
                .iter()
                .map(|t| (t.clone(), clamp_zero(solution.value(m[t]))))
                .collect();
            let production: IndexMap<String, f64> = roles
                .keys()
                .map(|item| {
                    let value = solution.eval(net_production_expr(&input.recipes, &x, item));
                    (item.clone(), clamp_zero(value))
                })
                .collect();
            Ok(PrimaryOutcome::Feasible(FactoryOutput::Ok {
                crafts_per_min,
                machines_used,
                production,
            }))
        }
        Err(ResolutionError::Infeasible) => Ok(PrimaryOutcome::Infeasible),
        Err(e) => Err(PlannerError::solver("primary", e.to_string())),
    }
}

fn solve_diagnostic(input: &FactoryInput, roles: &IndexMap<String, ItemRole>) -> Result<FactoryOutput> {
    let mut vars = ProblemVariables::new();
    let x = add_recipe_vars(&mut vars, &input.recipes);
    let machine_types = machine_type_union(input);
    let m = add_machine_vars(&mut vars, &machine_types);
    let y = vars.add(variable().min(0.0).name("achieved_rate".to_string()));

    let mut problem = vars.maximise(1.0 * y).using(default_solver);

    add_balance_constraints(&mut problem, input, roles, &x, Some(y));
    add_machine_constraints(&mut problem, input, &machine_types, &m, &x);

    let solution = problem
        .solve()
        .map_err(|e| PlannerError::solver("diagnostic", e.to_string()))?;

    let max_rate = clamp_zero(solution.value(y));

    let mut bottlenecks = Vec::new();
    for t in &machine_types {
        let cap = input.machines.get(t).copied().unwrap_or(0.0);
        let used = solution.value(m[t]);
        if is_binding(cap, used) {
            bottlenecks.push(t.clone());
        }
    }
    for (item, role) in roles {
        if *role != ItemRole::Raw {
            continue;
        }
        let supply = input.raw_supply.get(item).copied().unwrap_or(0.0);
        let consumption = solution.eval(consumption_expr(&input.recipes, &x, item));
        if is_binding(supply, consumption) {
            bottlenecks.push(item.clone());
        }
    }

    warn!(
        "target unreachable: requested {:.6}/min, maximum achievable {:.6}/min",
        input.target.rate_per_min, max_rate
    );

    Ok(FactoryOutput::Infeasible {
        reason: format!(
            "target rate {:.6}/min for {} is not achievable; maximum achievable rate is {:.6}/min",
            input.target.rate_per_min, input.target.item, max_rate
        ),
        max_rate,
        bottlenecks,
    })
}

fn add_recipe_vars(vars: &mut ProblemVariables, recipes: &[Recipe]) -> IndexMap<String, Variable> {
    recipes
        .iter()
        .map(|r| {
            let name = format!("x_{}", r.id);
            let var = if r.effective_rate() <= 0.0 {
                vars.add(variable().min(0.0).max(0.0).name(name))
            } else {
                vars.add(variable().min(0.0).name(name))
            };
            (r.id.clone(), var)
        })
        .collect()
}

fn machine_type_union(input: &FactoryInput) -> IndexSet<String> {
    let mut set: IndexSet<String> = input.machines.keys().cloned().collect();
    for r in &input.recipes {
        set.insert(r.machine.clone());
    }
    set
}

fn add_machine_vars(
    vars: &mut ProblemVariables,
    machine_types: &IndexSet<String>,
) -> IndexMap<String, Variable> {
    machine_types
        .iter()
        .map(|t| (t.clone(), vars.add(variable().min(0.0).name(format!("m_{}", t)))))
        .collect()
}

fn sum_of(vars: &IndexMap<String, Variable>) -> Expression {
    vars.values().fold(Expression::from(0.0), |acc, v| acc + *v)
}

/// Σ_r (productivity(r) * out(r,item) - in(r,item)) * x_r, net production.
fn net_production_expr(recipes: &[Recipe], x: &IndexMap<String, Variable>, item: &str) -> Expression {
    recipes.iter().fold(Expression::from(0.0), |acc, r| {
        let produced = r.outputs.get(item).copied().unwrap_or(0.0) * r.productivity_multiplier;
        let consumed = r.inputs.get(item).copied().unwrap_or(0.0);
        let coeff = produced - consumed;
        if coeff == 0.0 {
            acc
        } else {
            acc + coeff * x[&r.id]
        }
    })
}

/// Σ_r (in(r,item) - productivity(r) * out(r,item)) * x_r, net consumption.
fn consumption_expr(recipes: &[Recipe], x: &IndexMap<String, Variable>, item: &str) -> Expression {
    recipes.iter().fold(Expression::from(0.0), |acc, r| {
        let produced = r.outputs.get(item).copied().unwrap_or(0.0) * r.productivity_multiplier;
        let consumed = r.inputs.get(item).copied().unwrap_or(0.0);
        let coeff = consumed - produced;
        if coeff == 0.0 {
            acc
        } else {
            acc + coeff * x[&r.id]
        }
    })
}

fn add_balance_constraints<S: SolverModel>(
    problem: &mut S,
    input: &FactoryInput,
    roles: &IndexMap<String, ItemRole>,
    x: &IndexMap<String, Variable>,
    y: Option<Variable>,
) {
    for (item, role) in roles {
        match role {
            ItemRole::Byproduct => {}
            ItemRole::Intermediate => {
                let expr = net_production_expr(&input.recipes, x, item);
                problem.add_constraint(constraint!(expr == 0.0));
            }
            ItemRole::Raw => {
                let supply = input.raw_supply.get(item).copied().unwrap_or(0.0);
                let consumption = consumption_expr(&input.recipes, x, item);
                problem.add_constraint(constraint!(consumption <= supply));
                let produced = net_production_expr(&input.recipes, x, item);
                problem.add_constraint(constraint!(produced <= 0.0));
            }
            ItemRole::Target => {
                let expr = net_production_expr(&input.recipes, x, item);
                match y {
                    Some(y_var) => {
                        problem.add_constraint(constraint!(expr - y_var == 0.0));
                    }
                    None => {
                        problem.add_constraint(constraint!(expr == input.target.rate_per_min));
                    }
                }
            }
        }
    }
}

fn add_machine_constraints<S: SolverModel>(
    problem: &mut S,
    input: &FactoryInput,
    machine_types: &IndexSet<String>,
    m: &IndexMap<String, Variable>,
    x: &IndexMap<String, Variable>,
) {
    for t in machine_types {
        let cap = input.machines.get(t).copied().unwrap_or(0.0);
        let accounting = machine_accounting_expr(&input.recipes, x, t);
        let m_var = m[t];
        problem.add_constraint(constraint!(m_var - accounting == 0.0));
        problem.add_constraint(constraint!(m_var <= cap));
    }
}

/// Σ_{r uses t, EffectiveRate(r) > 0} x_r / EffectiveRate(r)
fn machine_accounting_expr(recipes: &[Recipe], x: &IndexMap<String, Variable>, machine: &str) -> Expression {
    recipes.iter().fold(Expression::from(0.0), |acc, r| {
        if r.machine != machine {
            return acc;
        }
        let rate = r.effective_rate();
        if rate <= 0.0 {
            return acc;
        }
        acc + (1.0 / rate) * x[&r.id]
    })
}
