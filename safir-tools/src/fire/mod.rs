//! Travelling fire scheduling
//!
//! A growing fire is modelled as a set of identical localized fires ignited
//! one after another at candidate points, nearest to the template origin
//! first. The scheduler picks how many burn at every second so that their
//! summed heat release follows a target curve, then writes the set as a
//! LOCAFI multi-fire file.
//!
//! ## Example
//! ```rust,no_run
//! use safir_tools::fire::{load_points, FireScheduler, FireTemplate, SchedulerConfig, TargetCurve};
//!
//! let template = FireTemplate::load("locafi.txt")?;
//! let points = load_points("points.txt")?;
//! let config = SchedulerConfig::load("scheduler.txt")?;
//! let curve = TargetCurve::TSquared { alpha: config.alpha.unwrap_or(11.72) };
//!
//! let mut scheduler = FireScheduler::new(template, points, &curve, config.time_step)?;
//! scheduler.run(&config)?;
//! scheduler.save_lcfs("fires.lcf")?;
//! # Ok::<(), safir_tools::error::SafirError>(())
//! ```

mod config;
mod curve;
mod lcfs;
mod scheduler;
mod template;

pub use config::{Optimization, SchedulerConfig};
pub use curve::{load_points, parse_points, sort_by_distance, TargetCurve};
pub use lcfs::shift_table;
pub use scheduler::{is_monotone, relative_error, FireScheduler, ScheduleReport, MAX_ATTEMPTS, MAX_FLIPS};
pub use template::{interpolate, FireTemplate, Table};
