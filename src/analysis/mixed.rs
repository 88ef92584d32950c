//! Linear mixed-effects model with a random intercept per subject
//!
//! Fitted by maximum likelihood (not REML). With V_i = σ²(I + λJ) the
//! fixed effects and σ² have closed forms for a given variance ratio
//! λ = σ²_b / σ², so the likelihood is profiled over λ alone: a coarse
//! grid on ln λ, widened upward while the likelihood still rises at its
//! edge, followed by golden-section refinement. λ = 0 is admissible.
//!
//! Inference uses Wald z-tests on the fixed effects with covariance
//! σ²(X'V⁻¹X)⁻¹.

use crate::analysis::formula::{build_design, build_formula, Design};
use crate::analysis::linalg::SpdSystem;
use crate::config::StudyConfig;
use crate::data::Table;
use crate::errors::{Result, SynthError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Name under which the random-intercept variance is reported
pub const GROUP_VAR: &str = "Group Var";

/// Grid on ln λ used to bracket the optimum
const LN_LAMBDA_MIN: f64 = -12.0;
const LN_LAMBDA_MAX: f64 = 12.0;
const LN_LAMBDA_STEP: f64 = 0.5;

/// Hard ceiling for widening the grid
const LN_LAMBDA_CAP: f64 = 40.0;

/// Golden-section stopping rule
const GOLDEN_TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 200;

/// One fixed-effect row of the summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedEffect {
    pub name: String,
    pub coef: f64,
    pub std_err: f64,
    pub z: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// What the narrative and report stages consume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub formula: String,
    /// Estimates in design order, ending with the group variance
    pub params: Vec<(String, f64)>,
    /// Fixed-effect p-values in design order
    pub pvalues: Vec<(String, f64)>,
}

impl ModelSummary {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn pvalue(&self, name: &str) -> Option<f64> {
        self.pvalues.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Full result of a model fit
#[derive(Debug, Clone, Serialize)]
pub struct MixedModelFit {
    pub summary: ModelSummary,
    pub fixed_effects: Vec<FixedEffect>,
    pub group_var: f64,
    pub scale: f64,
    pub log_likelihood: f64,
    pub n_obs: usize,
    pub n_groups: usize,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub iterations: usize,
    /// Human-readable summary table
    pub summary_text: String,
}

/// Sufficient statistics of one subject
#[derive(Debug)]
struct SubjectBlock {
    n: f64,
    xtx: Array2<f64>,
    xty: Array1<f64>,
    col_sums: Array1<f64>,
    y_sum: f64,
    yty: f64,
}

/// Profiled quantities at a given λ
#[derive(Debug)]
struct ProfilePoint {
    lambda: f64,
    beta: Array1<f64>,
    sigma2: f64,
    log_likelihood: f64,
    system: SpdSystem,
}

/// `v v'`
fn outer(v: &Array1<f64>) -> Array2<f64> {
    let column = v.view().insert_axis(Axis(1));
    column.dot(&column.t())
}

fn subject_blocks(design: &Design) -> Vec<SubjectBlock> {
    let p = design.n_params();
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut blocks: Vec<SubjectBlock> = Vec::new();

    for ((row, &y), subject) in design.x.iter().zip(&design.y).zip(&design.subjects) {
        let next = blocks.len();
        let idx = *index.entry(subject.as_str()).or_insert(next);
        if idx == blocks.len() {
            blocks.push(SubjectBlock {
                n: 0.0,
                xtx: Array2::zeros((p, p)),
                xty: Array1::zeros(p),
                col_sums: Array1::zeros(p),
                y_sum: 0.0,
                yty: 0.0,
            });
        }
        let x = ArrayView1::from(row.as_slice());
        let block = &mut blocks[idx];
        block.n += 1.0;
        block.y_sum += y;
        block.yty += y * y;
        block.col_sums += &x;
        block.xty.scaled_add(y, &x);
        let column = x.insert_axis(Axis(1));
        block.xtx += &column.dot(&column.t());
    }

    blocks
}

/// GLS solution and profile log-likelihood at λ; `None` if degenerate
fn profile(blocks: &[SubjectBlock], p: usize, n_obs: f64, lambda: f64) -> Option<ProfilePoint> {
    let mut a = Array2::<f64>::zeros((p, p));
    let mut b = Array1::<f64>::zeros(p);
    let mut log_det = 0.0;

    for block in blocks {
        let c = lambda / (1.0 + block.n * lambda);
        log_det += (1.0 + block.n * lambda).ln();
        b += &block.xty;
        b.scaled_add(-c * block.y_sum, &block.col_sums);
        a += &block.xtx;
        a.scaled_add(-c, &outer(&block.col_sums));
    }

    let system = SpdSystem::new(a)?;
    let beta = system.solve(&b).ok()?;

    let mut rss = 0.0;
    for block in blocks {
        let c = lambda / (1.0 + block.n * lambda);
        let rr = block.yty - 2.0 * beta.dot(&block.xty) + beta.dot(&block.xtx.dot(&beta));
        let r_sum = block.y_sum - block.col_sums.dot(&beta);
        rss += rr - c * r_sum * r_sum;
    }

    let sigma2 = rss / n_obs;
    if !sigma2.is_finite() || sigma2 <= 0.0 {
        return None;
    }

    let log_likelihood = -0.5 * n_obs * ((2.0 * PI).ln() + sigma2.ln() + 1.0) - 0.5 * log_det;

    Some(ProfilePoint {
        lambda,
        beta,
        sigma2,
        log_likelihood,
        system,
    })
}

/// Maximize the profile likelihood over λ ≥ 0
fn maximize(blocks: &[SubjectBlock], p: usize, n_obs: f64) -> Result<(ProfilePoint, usize)> {
    let at = |lambda: f64| profile(blocks, p, n_obs, lambda);
    let ll = |u: f64| at(u.exp()).map_or(f64::NEG_INFINITY, |pt| pt.log_likelihood);

    let mut grid: Vec<f64> = (0..)
        .map(|k| LN_LAMBDA_MIN + k as f64 * LN_LAMBDA_STEP)
        .take_while(|u| *u <= LN_LAMBDA_MAX + 1e-9)
        .collect();
    let mut values: Vec<f64> = grid.iter().map(|&u| ll(u)).collect();

    // widen upward while the likelihood still rises at the edge
    let base_len = grid.len();
    while let [.., prev, last] = values.as_slice() {
        let edge = grid[grid.len() - 1];
        if *last <= *prev || edge >= LN_LAMBDA_CAP {
            break;
        }
        let next = edge + LN_LAMBDA_STEP;
        grid.push(next);
        values.push(ll(next));
    }
    if grid.len() > base_len {
        debug!(ln_lambda = grid[grid.len() - 1], "Variance-ratio grid widened");
    }

    let boundary = at(0.0).ok_or_else(|| {
        SynthError::ModelFit(
            "singular fixed-effects design or zero residual variance".to_string(),
        )
    })?;

    let (best, best_ll) = values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });

    if best_ll <= boundary.log_likelihood {
        debug!("Random-intercept variance estimated on the boundary");
        return Ok((boundary, 0));
    }
    if best == grid.len() - 1 {
        return Err(SynthError::ModelFit(
            format!(
                "random-intercept variance did not converge (diverged past ln λ = {})",
                LN_LAMBDA_CAP
            ),
        ));
    }

    let mut lo = grid[best.saturating_sub(1)];
    let mut hi = grid[best + 1];
    let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
    let mut x1 = hi - ratio * (hi - lo);
    let mut x2 = lo + ratio * (hi - lo);
    let mut f1 = ll(x1);
    let mut f2 = ll(x2);
    let mut iterations = 0;

    while hi - lo > GOLDEN_TOLERANCE {
        if iterations >= MAX_ITERATIONS {
            return Err(SynthError::ModelFit(format!(
                "optimizer did not converge after {} iterations",
                MAX_ITERATIONS
            )));
        }
        iterations += 1;
        if f1 < f2 {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + ratio * (hi - lo);
            f2 = ll(x2);
        } else {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - ratio * (hi - lo);
            f1 = ll(x1);
        }
    }

    let point = at(((lo + hi) / 2.0).exp()).ok_or_else(|| {
        SynthError::ModelFit("likelihood became degenerate at the optimum".to_string())
    })?;
    Ok((point, iterations))
}

/// Fit `outcome ~ time [* group] + covariates` with a random intercept per
/// subject and return the summary text, estimates and p-values
pub fn run_mixed_model(table: &Table, config: &StudyConfig) -> Result<MixedModelFit> {
    let formula = build_formula(table, config);
    if formula.is_empty() {
        return Err(SynthError::ModelFit(
            "formula has no usable terms; none of the configured columns are in the table"
                .to_string(),
        ));
    }
    let formula_text = formula.to_string();
    info!(formula = %formula_text, "Fitting mixed-effects model");

    let design = build_design(table, &formula, &config.id_col)?;
    let n_obs = design.n_obs();
    let p = design.n_params();
    if n_obs <= p {
        return Err(SynthError::ModelFit(format!(
            "{} complete observations for {} fixed effects",
            n_obs, p
        )));
    }

    let blocks = subject_blocks(&design);
    let (point, iterations) = maximize(&blocks, p, n_obs as f64)?;

    let normal = Normal::new(0.0, 1.0).map_err(|e| SynthError::ModelFit(e.to_string()))?;
    let z_crit = normal.inverse_cdf(0.975);
    let cov = point.system.inverse()?;

    let fixed_effects: Vec<FixedEffect> = design
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let coef = point.beta[i];
            let std_err = (point.sigma2 * cov[[i, i]]).sqrt();
            let z = coef / std_err;
            FixedEffect {
                name: name.clone(),
                coef,
                std_err,
                z,
                p_value: 2.0 * (1.0 - normal.cdf(z.abs())),
                ci_lower: coef - z_crit * std_err,
                ci_upper: coef + z_crit * std_err,
            }
        })
        .collect();

    let group_var = point.lambda * point.sigma2;
    let mut params: Vec<(String, f64)> = fixed_effects
        .iter()
        .map(|fe| (fe.name.clone(), fe.coef))
        .collect();
    params.push((GROUP_VAR.to_string(), group_var));
    let pvalues = fixed_effects
        .iter()
        .map(|fe| (fe.name.clone(), fe.p_value))
        .collect();

    let sizes: Vec<usize> = blocks.iter().map(|b| b.n as usize).collect();
    let mut fit = MixedModelFit {
        summary: ModelSummary {
            formula: formula_text,
            params,
            pvalues,
        },
        fixed_effects,
        group_var,
        scale: point.sigma2,
        log_likelihood: point.log_likelihood,
        n_obs,
        n_groups: blocks.len(),
        min_group_size: sizes.iter().copied().min().unwrap_or(0),
        max_group_size: sizes.iter().copied().max().unwrap_or(0),
        iterations,
        summary_text: String::new(),
    };
    fit.summary_text = render_summary(&fit, config.primary_outcome());

    info!(
        log_likelihood = fit.log_likelihood,
        groups = fit.n_groups,
        "Mixed-effects model converged"
    );
    Ok(fit)
}

fn render_summary(fit: &MixedModelFit, outcome: &str) -> String {
    let name_width = fit
        .fixed_effects
        .iter()
        .map(|fe| fe.name.len())
        .chain(std::iter::once(GROUP_VAR.len()))
        .max()
        .unwrap_or(0);
    let width = (name_width + 56).max(62);
    let mean_size = fit.n_obs as f64 / fit.n_groups.max(1) as f64;

    let mut out = Vec::new();
    out.push(format!("{:^width$}", "Mixed Linear Model Regression Results"));
    out.push("=".repeat(width));
    out.push(format!("Model:            MixedLM   Dependent Variable: {}", outcome));
    out.push(format!(
        "No. Observations: {:<9} Method:             ML",
        fit.n_obs
    ));
    out.push(format!(
        "No. Groups:       {:<9} Scale:              {:.4}",
        fit.n_groups, fit.scale
    ));
    out.push(format!(
        "Min. group size:  {:<9} Log-Likelihood:     {:.4}",
        fit.min_group_size, fit.log_likelihood
    ));
    out.push(format!(
        "Max. group size:  {:<9} Converged:          Yes",
        fit.max_group_size
    ));
    out.push(format!("Mean group size:  {:.1}", mean_size));
    out.push("-".repeat(width));
    out.push(format!(
        "{:<nw$} {:>9} {:>9} {:>8} {:>7} {:>9} {:>9}",
        "",
        "Coef.",
        "Std.Err.",
        "z",
        "P>|z|",
        "[0.025",
        "0.975]",
        nw = name_width
    ));
    out.push("-".repeat(width));
    for fe in &fit.fixed_effects {
        out.push(format!(
            "{:<nw$} {:>9.3} {:>9.3} {:>8.3} {:>7.3} {:>9.3} {:>9.3}",
            fe.name,
            fe.coef,
            fe.std_err,
            fe.z,
            fe.p_value,
            fe.ci_lower,
            fe.ci_upper,
            nw = name_width
        ));
    }
    out.push(format!("{:<nw$} {:>9.3}", GROUP_VAR, fit.group_var, nw = name_width));
    out.push("=".repeat(width));
    out.join("\n")
}
