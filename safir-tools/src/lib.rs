//! SAFIR tools - input file engine and travelling fire scheduler
//!
//! This library works on the text files of the SAFIR structural fire solver:
//! - Structural input files (`.IN`): nodes, beams, trusses, shells, solids,
//!   section types and materials, with mutations that keep the file valid
//! - Thermal input files: fire model rewrite and torsion result splicing
//! - XML result files: relaxation normalization and result extraction
//! - Travelling fires: ignition schedules built from a template fire
//!
//! ## Example
//! ```rust,no_run
//! use safir_tools::prelude::*;
//!
//! let mut doc = InputDocument::load("frame.in")?;
//!
//! // Add a profile and give it to beam 2
//! let section = SectionType::profile("hea300.tem", vec![1, 2]);
//! let index = doc.append_section_type(ElementFamily::Beam, section, &[2])?;
//! assert_eq!(doc.element(ElementFamily::Beam, 2).map(|e| e.section), Some(index));
//!
//! doc.save("frame.in")?;
//! # Ok::<(), SafirError>(())
//! ```

pub mod elements;
pub mod error;
pub mod fire;
pub mod io;
pub mod model;
pub mod results;
pub mod thermal;

// Re-export common types
pub mod prelude {
    pub use crate::elements::{Element, ElementFamily, Material, Node, SectionType};
    pub use crate::error::{SafirError, SafirResult};
    pub use crate::fire::{FireScheduler, FireTemplate, Optimization, SchedulerConfig, TargetCurve};
    pub use crate::model::{Domain, FamilyIndex, InputDocument};
    pub use crate::results::{fix_result_file, normalize_relaxations, ResultFile};
    pub use crate::thermal::{apply_fire_model, splice_torsion, FireModel, FireModelChange};
}
