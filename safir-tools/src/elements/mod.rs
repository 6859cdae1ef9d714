//! Structural entities of an input file

mod element;
mod material;
mod node;
mod section;

pub use element::{Element, ElementFamily};
pub use material::Material;
pub use node::Node;
pub use section::SectionType;

pub(crate) use section::format_number;
