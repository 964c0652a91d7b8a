//! Estimation of the free pose parameters from image observations.
//!
//! Every calibration minimizes a scalar [`CalibrationCost`] over the pose
//! parameters that are not fixed, using a derivative-free Nelder-Mead simplex.
//! When a horizon is fixed, the distance between the projected horizon and the
//! fixed row is added as a penalty so the tilt stays coupled to the height.
//!
//! The costs of distance-like observations have false minima where a high
//! camera looks steeply down, so the simplex is started from several tilts and
//! heights around the estimates and the best descent wins.

mod cost;
mod parameters;

pub use cost::*;
pub use parameters::*;

use crate::{CameraError, GroundCamera};
use argmin::core::{
    ArgminKV, ArgminOp, Error, Executor, IterState, Observe, ObserverMode, TerminationReason,
};
use argmin::solver::neldermead::NelderMead;
use log::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Settings of the simplex minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Seed values of the free parameters.
    pub estimates: FitEstimates,
    /// Iteration cap of every simplex run.
    pub max_iterations: u64,
    /// Number of additional runs started from the best vertex of the previous run.
    pub restarts: usize,
    /// A run stops once the standard deviation of the simplex costs drops below this.
    pub sd_tolerance: f64,
    /// Penalty per pixel of horizon deviation when a horizon is fixed.
    pub horizon_weight: f64,
    /// Also start the simplex from lower tilts and other heights and keep the best result.
    pub multi_start: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            estimates: FitEstimates::default(),
            max_iterations: 2000,
            restarts: 2,
            sd_tolerance: 1e-12,
            horizon_weight: 0.01,
            multi_start: true,
        }
    }
}

impl FitOptions {
    pub fn estimates(self, estimates: FitEstimates) -> Self {
        Self { estimates, ..self }
    }

    pub fn max_iterations(self, max_iterations: u64) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn restarts(self, restarts: usize) -> Self {
        Self { restarts, ..self }
    }

    pub fn sd_tolerance(self, sd_tolerance: f64) -> Self {
        Self {
            sd_tolerance,
            ..self
        }
    }

    pub fn horizon_weight(self, horizon_weight: f64) -> Self {
        Self {
            horizon_weight,
            ..self
        }
    }

    pub fn multi_start(self, multi_start: bool) -> Self {
        Self {
            multi_start,
            ..self
        }
    }
}

/// Outcome of a calibration.
///
/// The camera has already been updated to the fitted values when this is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Fitted value of every free parameter, in vector order.
    pub parameters: Vec<(PoseParameter, f64)>,
    /// Cost including the horizon penalty at the fitted values.
    pub cost: f64,
    /// Simplex iterations summed over all starts and runs.
    pub iterations: u64,
    /// Why the last run of the best start stopped.
    pub termination: String,
    /// `false` when the best start was stopped by the iteration cap.
    pub converged: bool,
}

impl FitReport {
    /// The fitted value of `parameter`, if it was free.
    pub fn value(&self, parameter: PoseParameter) -> Option<f64> {
        self.parameters
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|&(_, value)| value)
    }
}

struct FitObserver;

impl<T: ArgminOp> Observe<T> for FitObserver {
    fn observe_iter(&mut self, state: &IterState<T>, _kv: &ArgminKV) -> Result<(), Error> {
        debug!(
            "on iteration {} out of {} with total evaluations {} and current cost {}",
            state.iter, state.max_iters, state.cost_func_count, state.cost
        );
        Ok(())
    }
}

/// The cost of a free parameter vector, evaluated on a scratch copy of the camera.
#[derive(Clone)]
struct CalibrationProblem<C> {
    camera: GroundCamera,
    free: FreeParameters,
    cost: C,
    horizon_weight: f64,
    rejected: Arc<AtomicUsize>,
}

impl<C: CalibrationCost> CalibrationProblem<C> {
    fn evaluate(&self, values: &[f64]) -> Result<f64, CameraError> {
        let mut camera = self.camera.clone();
        camera.apply_free(&self.free, values);
        let mut total = self.cost.cost(&camera)?;
        if let Some(target) = camera.fixed_horizon() {
            total += (target - camera.horizon_row()?).abs() * self.horizon_weight;
        }
        Ok(total)
    }
}

impl<C: CalibrationCost> ArgminOp for CalibrationProblem<C> {
    type Param = Vec<f64>;
    type Output = f64;
    type Hessian = ();
    type Jacobian = ();
    type Float = f64;

    fn apply(&self, p: &Self::Param) -> Result<Self::Output, Error> {
        match self.evaluate(p) {
            Ok(cost) if !cost.is_nan() => Ok(cost),
            // Unusable poses rank last in the simplex.
            _ => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Ok(f64::INFINITY)
            }
        }
    }
}

/// Result of a chain of simplex runs from one start.
struct Descent {
    cost: f64,
    center: Vec<f64>,
    iterations: u64,
    reason: TerminationReason,
}

/// Runs the simplex from `start`, restarting around the best vertex while the cost keeps improving.
fn descend<C: CalibrationCost + Clone>(
    problem: &CalibrationProblem<C>,
    free: &FreeParameters,
    start: Vec<f64>,
    options: &FitOptions,
) -> Result<Descent, CameraError> {
    let mut descent = Descent {
        cost: f64::INFINITY,
        center: start,
        iterations: 0,
        reason: TerminationReason::NotTerminated,
    };
    for run in 0..=options.restarts {
        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new()
            .with_initial_params(free.simplex(&descent.center))
            .sd_tolerance(options.sd_tolerance);
        // The initial parameter is empty because the simplex carries its own vertices.
        let state = Executor::new(problem.clone(), solver, vec![])
            .add_observer(FitObserver, ObserverMode::Always)
            .max_iters(options.max_iterations)
            .run()
            .map_err(|e| CameraError::Optimization(e.to_string()))?
            .state;
        descent.iterations += state.iter;
        debug!(
            "simplex run {} ended with cost {} after {} iterations ({:?})",
            run, state.best_cost, state.iter, state.termination_reason
        );
        let previous = descent.cost;
        if state.best_cost >= previous {
            break;
        }
        descent.cost = state.best_cost;
        descent.center = state.best_param;
        descent.reason = state.termination_reason;
        if previous - descent.cost <= options.sd_tolerance {
            break;
        }
    }
    Ok(descent)
}

impl GroundCamera {
    /// Fits the free pose parameters to `cost` and stores the result in the camera.
    ///
    /// Parameters the cost [releases](CalibrationCost::releases) become free
    /// before the free set is assembled. Non-convergence is not an error; the
    /// best vertex found is applied and reported.
    pub fn fit<C: CalibrationCost + Clone>(&mut self, cost: &C) -> Result<FitReport, CameraError> {
        for &parameter in cost.releases() {
            self.release(parameter);
        }
        let options = self.fit_options;
        let free = FreeParameters::new(&self.constraints);
        let problem = CalibrationProblem {
            camera: self.clone(),
            free: free.clone(),
            cost: cost.clone(),
            horizon_weight: options.horizon_weight,
            rejected: Arc::new(AtomicUsize::new(0)),
        };
        if free.is_empty() {
            info!("all pose parameters are fixed, only evaluating the cost");
            self.apply_free(&free, &[]);
            return Ok(FitReport {
                parameters: vec![],
                cost: problem.evaluate(&[])?,
                iterations: 0,
                termination: "no free parameters".to_string(),
                converged: true,
            });
        }

        info!(
            "fitting {} with free parameters {:?}",
            cost.description(),
            free.parameters()
        );
        let seed = free.seed(&options.estimates);
        let starts = if options.multi_start {
            free.starts(&seed)
        } else {
            vec![seed]
        };
        let mut best: Option<Descent> = None;
        let mut iterations = 0;
        for (index, start) in starts.into_iter().enumerate() {
            let descent = descend(&problem, &free, start, &options)?;
            iterations += descent.iterations;
            debug!(
                "start {} of {} ended with cost {}",
                index,
                cost.description(),
                descent.cost
            );
            if best.as_ref().map_or(true, |best| descent.cost < best.cost) {
                best = Some(descent);
            }
            if best
                .as_ref()
                .map_or(false, |best| best.cost <= options.sd_tolerance)
            {
                break;
            }
        }
        let Descent {
            cost: best_cost,
            center,
            reason,
            ..
        } = best.ok_or_else(|| CameraError::Optimization("no simplex start".to_string()))?;

        let rejected = problem.rejected.load(Ordering::Relaxed);
        if rejected > 0 {
            warn!("{} cost evaluations were rejected as degenerate", rejected);
        }
        if !best_cost.is_finite() {
            return Err(CameraError::Optimization(format!(
                "no valid pose found for {}",
                cost.description()
            )));
        }

        self.apply_free(&free, &center);
        let converged = !matches!(
            reason,
            TerminationReason::MaxItersReached | TerminationReason::NotTerminated
        );
        let parameters: Vec<(PoseParameter, f64)> =
            free.parameters().iter().copied().zip(center).collect();
        info!(
            "fitted {:?} with cost {} after {} iterations",
            parameters, best_cost, iterations
        );
        Ok(FitReport {
            parameters,
            cost: best_cost,
            iterations,
            termination: format!("{:?}", reason),
            converged,
        })
    }
}
