//! Ignition scheduler
//!
//! Decides how many copies of the template fire burn at every second so that
//! their summed heat release follows a target curve. The schedule
//! `n_of_fires[t]`, `t` in `[0, t_end)`, never decreases: fires are ignited
//! over time and never put out.

use serde::{Deserialize, Serialize};

use super::config::{Optimization, SchedulerConfig};
use super::curve::{sort_by_distance, TargetCurve};
use super::template::FireTemplate;
use crate::error::{SafirError, SafirResult};

/// Consecutive sign changes of the mean error without improvement tolerated
/// by the corrector optimization
pub const MAX_FLIPS: usize = 20;

/// Consecutive failed attempts tolerated at one time index by the iterative
/// optimization; the count restarts once the error there is within bounds
pub const MAX_ATTEMPTS: usize = 10;

/// Summary of a finished schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub n_of_fires: Vec<usize>,
    pub target: Vec<f64>,
    pub estimated: Vec<f64>,
    pub mean_relative_error: f64,
    pub peak_fires: usize,
    pub corrector: f64,
    pub iterations: usize,
}

/// Travelling fire schedule built from a template fire
#[derive(Debug, Clone)]
pub struct FireScheduler {
    template: FireTemplate,
    points: Vec<[f64; 3]>,
    target: Vec<f64>,
    kernel: Vec<f64>,
    time_step: usize,
    n_of_fires: Vec<usize>,
    corrector: f64,
    iterations: usize,
}

impl FireScheduler {
    /// Set up a scheduler. Candidate points are ordered nearest to the
    /// template origin first.
    pub fn new(
        template: FireTemplate,
        mut points: Vec<[f64; 3]>,
        curve: &TargetCurve,
        time_step: usize,
    ) -> SafirResult<Self> {
        if time_step == 0 {
            return Err(SafirError::InvalidInput("time step must be positive".to_string()));
        }
        if template.end_time == 0 {
            return Err(SafirError::InvalidInput("fire template ends at 0 s".to_string()));
        }
        sort_by_distance(&mut points, template.origin);
        let target = curve.values(template.end_time);
        let kernel = template.kernel();
        let n_of_fires = vec![0; template.end_time];

        log::debug!(
            "Scheduler ready: {} candidate points, t_end = {} s",
            points.len(),
            template.end_time
        );
        Ok(Self {
            template,
            points,
            target,
            kernel,
            time_step,
            n_of_fires,
            corrector: 0.0,
            iterations: 0,
        })
    }

    pub fn t_end(&self) -> usize {
        self.template.end_time
    }

    pub fn template(&self) -> &FireTemplate {
        &self.template
    }

    /// Candidate points, nearest first
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Target curve at every second from 0 to `t_end`
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    pub fn n_of_fires(&self) -> &[usize] {
        &self.n_of_fires
    }

    pub fn corrector(&self) -> f64 {
        self.corrector
    }

    /// Replace the schedule. It must cover `[0, t_end)` and never decrease.
    pub fn set_schedule(&mut self, n_of_fires: Vec<usize>) -> SafirResult<()> {
        if n_of_fires.len() != self.t_end() {
            return Err(SafirError::CountMismatch {
                what: "schedule length".to_string(),
                declared: self.t_end(),
                found: n_of_fires.len(),
            });
        }
        if !is_monotone(&n_of_fires) {
            return Err(SafirError::InvalidInput("schedule decreases".to_string()));
        }
        self.check_points(&n_of_fires)?;
        self.n_of_fires = n_of_fires;
        Ok(())
    }

    fn check_points(&self, n_of_fires: &[usize]) -> SafirResult<()> {
        let required = n_of_fires.last().copied().unwrap_or(0);
        if required > self.points.len() {
            return Err(SafirError::NotEnoughFirePoints {
                required,
                available: self.points.len(),
            });
        }
        Ok(())
    }

    // ========================
    // Plateau method
    // ========================

    /// Number of fires needed at every second if each fire burned at `q_max`
    /// from ignition: `n = ceil(x (x + 1 + corrector))`, `x = sqrt(target / q_max)`
    pub fn plateau(&self, corrector: f64) -> SafirResult<Vec<usize>> {
        let mut n_of_fires = Vec::with_capacity(self.t_end());
        let mut burning = 0;
        for t in 0..self.t_end() {
            let x = (self.target[t].max(0.0) / self.template.q_max).sqrt();
            let count = (x * (x + 1.0 + corrector)).ceil().max(0.0) as usize;
            burning = burning.max(count);
            n_of_fires.push(burning);
        }
        self.check_points(&n_of_fires)?;
        Ok(n_of_fires)
    }

    /// Replace the schedule with the plateau estimate
    pub fn apply_plateau(&mut self, corrector: f64) -> SafirResult<()> {
        self.n_of_fires = self.plateau(corrector)?;
        self.corrector = corrector;
        log::info!(
            "Plateau schedule: {} fires at t_end (corrector {corrector})",
            self.n_of_fires.last().copied().unwrap_or(0)
        );
        Ok(())
    }

    // ========================
    // Curve estimation
    // ========================

    /// Summed heat release of the current schedule, from 0 to `t_end`
    pub fn estimate(&self) -> Vec<f64> {
        self.estimate_schedule(&self.n_of_fires)
    }

    /// Summed heat release of a schedule: one template kernel per fire,
    /// shifted to its ignition second
    pub fn estimate_schedule(&self, n_of_fires: &[usize]) -> Vec<f64> {
        let mut estimated = vec![0.0; self.t_end() + 1];
        let mut burning = 0;
        for (t, &count) in n_of_fires.iter().enumerate() {
            let ignited = count.saturating_sub(burning);
            burning = count;
            if ignited == 0 {
                continue;
            }
            for (slot, q) in estimated[t..].iter_mut().zip(&self.kernel) {
                *slot += ignited as f64 * q;
            }
        }
        estimated
    }

    /// Mean error of an estimate over `[time_step, t_end)`
    pub fn mean_error(&self, estimated: &[f64], relative: bool) -> f64 {
        let range = self.time_step..self.t_end();
        if range.is_empty() {
            return 0.0;
        }
        let count = range.len() as f64;
        let sum: f64 = range
            .map(|t| {
                if relative {
                    relative_error(estimated[t], self.target[t])
                } else {
                    estimated[t] - self.target[t]
                }
            })
            .sum();
        sum / count
    }

    // ========================
    // Optimization
    // ========================

    /// Plateau estimate refined by the configured optimization
    pub fn run(&mut self, config: &SchedulerConfig) -> SafirResult<()> {
        self.apply_plateau(0.0)?;
        match config.optimization {
            Optimization::None => {}
            Optimization::Coeff => {
                self.optimize_corr(config)?;
            }
            Optimization::Iter => {
                self.optimize_iter(config)?;
            }
        }
        Ok(())
    }

    /// Perturb the plateau corrector until the mean error is within
    /// `precision`. The step doubles while the error keeps its sign; once a
    /// sign change brackets the root, the corrector bisects between the last
    /// values on either side. Returns the final corrector.
    pub fn optimize_corr(&mut self, config: &SchedulerConfig) -> SafirResult<f64> {
        let precision = config.precision;
        let mut corrector = 0.0;
        let mut n_of_fires = self.plateau(corrector)?;
        let mut delta = self.mean_error(&self.estimate_schedule(&n_of_fires), config.relative);
        let mut step = precision;
        let mut best = delta.abs();
        let mut flips = 0;
        let mut iterations = 0;
        // Last correctors with a negative and a positive mean error
        let mut below = None;
        let mut above = None;

        while delta.abs() > precision {
            if delta > 0.0 {
                above = Some(corrector);
            } else {
                below = Some(corrector);
            }
            let bracket = below.zip(above);
            let exhausted = bracket.is_some_and(|(lo, hi): (f64, f64)| {
                (hi - lo).abs() <= f64::EPSILON * hi.abs().max(lo.abs()).max(1.0)
            });
            if iterations >= config.max_iterations || flips >= MAX_FLIPS || exhausted {
                return Err(SafirError::ConvergenceFailed {
                    iterations,
                    mean_error: delta,
                });
            }
            iterations += 1;

            corrector = match bracket {
                Some((lo, hi)) => (lo + hi) / 2.0,
                None if delta > 0.0 => corrector - step,
                None => corrector + step,
            };
            n_of_fires = self.plateau(corrector)?;
            let next = self.mean_error(&self.estimate_schedule(&n_of_fires), config.relative);
            log::debug!("Iteration {iterations}: corrector {corrector}, mean error {next}");

            if next * delta < 0.0 {
                step /= 2.0;
                flips += 1;
            } else if bracket.is_none() {
                step *= 2.0;
            }
            if next.abs() < best {
                best = next.abs();
                flips = 0;
            }
            delta = next;
        }

        self.n_of_fires = n_of_fires;
        self.corrector = corrector;
        self.iterations = iterations;
        log::info!("Corrector optimization finished after {iterations} iterations (corrector {corrector})");
        Ok(corrector)
    }

    /// Walk the grid `initial_time + k * optim_step` and shift ignition times
    /// until the relative error at every grid time lies in `[bottom, top]`.
    /// Returns the number of schedule changes.
    pub fn optimize_iter(&mut self, config: &SchedulerConfig) -> SafirResult<usize> {
        let step = config.optim_step();
        let t_end = self.t_end();
        let start = config.initial_time.max(step);
        let mut n_of_fires = self.n_of_fires.clone();
        let mut attempts = Attempts::new(t_end);
        let mut iterations = 0;
        let mut t = start;

        while t < t_end {
            let estimated = self.estimate_schedule(&n_of_fires);
            let error = relative_error(estimated[t], self.target[t]);
            if error >= config.bottom && error <= config.top {
                attempts.pass(t);
                t += step;
                continue;
            }

            let failed = attempts.fail(t);
            iterations += 1;
            if failed > MAX_ATTEMPTS || iterations > config.max_iterations {
                return Err(SafirError::NoConvergence {
                    time: t,
                    iterations: failed - 1,
                });
            }

            let changed_from = if error < config.bottom {
                Some(advance_fire(&mut n_of_fires, t, step, config.initial_time))
            } else {
                delay_fire(&mut n_of_fires, t, step)
            };
            self.check_points(&n_of_fires)?;

            match changed_from {
                Some(from) => {
                    log::debug!("Error {error:.3} at {t} s, schedule changed from {from} s");
                    t = grid_time(from, start, step).min(t);
                }
                None => log::debug!("Error {error:.3} at {t} s, no fire can be moved"),
            }
        }

        self.n_of_fires = n_of_fires;
        self.iterations = iterations;
        log::info!("Iterative optimization converged after {iterations} changes");
        Ok(iterations)
    }

    /// Summary of the current schedule
    pub fn report(&self) -> ScheduleReport {
        let estimated = self.estimate();
        ScheduleReport {
            mean_relative_error: self.mean_error(&estimated, true),
            peak_fires: self.n_of_fires.last().copied().unwrap_or(0),
            n_of_fires: self.n_of_fires.clone(),
            target: self.target.clone(),
            estimated,
            corrector: self.corrector,
            iterations: self.iterations,
        }
    }
}

/// Failed attempts per grid time since the error there was last in bounds
struct Attempts(Vec<usize>);

impl Attempts {
    fn new(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Record a failure at `t` and return the consecutive failures there
    fn fail(&mut self, t: usize) -> usize {
        self.0[t] += 1;
        self.0[t]
    }

    fn pass(&mut self, t: usize) {
        self.0[t] = 0;
    }
}

/// `(estimated - target) / target`; a zero target is met only by zero
pub fn relative_error(estimated: f64, target: f64) -> f64 {
    if target == 0.0 {
        if estimated == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (estimated - target) / target
    }
}

pub fn is_monotone(n_of_fires: &[usize]) -> bool {
    n_of_fires.windows(2).all(|w| w[0] <= w[1])
}

/// First second at which `k` fires burn
fn ignition(n_of_fires: &[usize], k: usize) -> Option<usize> {
    n_of_fires.iter().position(|&count| count >= k)
}

/// Smallest grid time at or after `from`
fn grid_time(from: usize, start: usize, step: usize) -> usize {
    if from <= start {
        start
    } else {
        start + (from - start).div_ceil(step) * step
    }
}

/// Heat release at `t` too low: ignite the latest burning fire one step
/// earlier, or add a fire at `t - step` when that would pass `floor`.
/// Returns the first second the change touches.
fn advance_fire(n_of_fires: &mut [usize], t: usize, step: usize, floor: usize) -> usize {
    let k = n_of_fires[t];
    if k > 0 {
        if let Some(t_from) = ignition(n_of_fires, k) {
            if let Some(t_to) = t_from.checked_sub(step).filter(|&to| to >= floor) {
                for count in &mut n_of_fires[t_to..t_from] {
                    *count += 1;
                }
                return t_to;
            }
        }
    }
    let at = t.saturating_sub(step);
    for count in &mut n_of_fires[at..] {
        *count += 1;
    }
    at
}

/// Heat release at `t` too high: ignite a fire one step later, starting with
/// the latest one and backtracking over earlier fires while a move would
/// break monotonicity. A fire pushed past the end is removed. Returns the
/// first second the change touches, or `None` when no fire can move.
fn delay_fire(n_of_fires: &mut [usize], t: usize, step: usize) -> Option<usize> {
    let len = n_of_fires.len();
    for k in (1..=n_of_fires[t]).rev() {
        let Some(t_from) = ignition(n_of_fires, k) else {
            continue;
        };
        let t_to = t_from + step;
        if t_to >= len {
            for count in &mut n_of_fires[t_from..] {
                *count = count.saturating_sub(1);
            }
            return Some(t_from);
        }

        for count in &mut n_of_fires[t_from..t_to] {
            *count = count.saturating_sub(1);
        }
        if is_monotone(n_of_fires) {
            return Some(t_from);
        }
        for count in &mut n_of_fires[t_from..t_to] {
            *count += 1;
        }
    }
    None
}
