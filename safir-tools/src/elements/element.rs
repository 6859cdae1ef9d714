//! Element families and element records (`ELEM` lines)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element family of a structural input file, by topological dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementFamily {
    Truss,
    Beam,
    Shell,
    Solid,
}

impl ElementFamily {
    pub const ALL: [ElementFamily; 4] = [Self::Truss, Self::Beam, Self::Shell, Self::Solid];

    /// Keyword opening the family block
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Truss => "NODOFTRUSS",
            Self::Beam => "NODOFBEAM",
            Self::Shell => "NODOFSHELL",
            Self::Solid => "NODOFSOLID",
        }
    }

    /// Keyword of the count declaration line (`BEAM  n_elements  n_types`)
    pub fn count_keyword(&self) -> &'static str {
        match self {
            Self::Truss => "TRUSS",
            Self::Beam => "BEAM",
            Self::Shell => "SHELL",
            Self::Solid => "SOLID",
        }
    }

    /// Extension of the section-type files referenced by beams and shells
    pub fn section_extension(&self) -> Option<&'static str> {
        match self {
            Self::Beam => Some(".tem"),
            Self::Shell => Some(".tsh"),
            Self::Truss | Self::Solid => None,
        }
    }

    /// Number of topology nodes expected on an `ELEM` line, if fixed
    pub fn node_count(&self) -> Option<usize> {
        match self {
            Self::Truss => Some(2),
            Self::Shell => Some(4),
            Self::Solid => Some(8),
            Self::Beam => None,
        }
    }
}

impl fmt::Display for ElementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Truss => "truss",
            Self::Beam => "beam",
            Self::Shell => "shell",
            Self::Solid => "solid",
        };
        f.write_str(name)
    }
}

/// A beam, truss, shell or solid element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element tag as written in the file
    pub tag: usize,
    /// Node tags defining the topology
    pub nodes: Vec<usize>,
    /// 1-based position in the family's section-type list
    pub section: usize,
}

impl Element {
    pub fn new(tag: usize, nodes: Vec<usize>, section: usize) -> Self {
        Self { tag, nodes, section }
    }

    pub fn first_node(&self) -> Option<usize> {
        self.nodes.first().copied()
    }

    /// Last node of the element chain (third node for beams with orientation nodes)
    pub fn last_node(&self) -> Option<usize> {
        match self.nodes.len() {
            0 => None,
            1 | 2 | 3 => self.nodes.last().copied(),
            _ => self.nodes.get(2).copied(),
        }
    }
}
