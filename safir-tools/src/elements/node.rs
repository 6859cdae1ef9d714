//! Node - a point of the structural mesh as read from a `NODE` line

use serde::{Deserialize, Serialize};

/// A node of the structural model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Tag as written in the file (1-based, follows line order in `NODES`)
    pub tag: usize,
    /// Coordinates, two for 2D models and three for 3D models
    pub coords: Vec<f64>,
}

impl Node {
    /// Create a new node with the given tag and coordinates
    pub fn new(tag: usize, coords: Vec<f64>) -> Self {
        Self { tag, coords }
    }

    pub fn x(&self) -> f64 {
        self.coords.first().copied().unwrap_or(0.0)
    }

    pub fn y(&self) -> f64 {
        self.coords.get(1).copied().unwrap_or(0.0)
    }

    pub fn z(&self) -> f64 {
        self.coords.get(2).copied().unwrap_or(0.0)
    }

    /// Get the coordinates as a 3D point (missing components are zero)
    pub fn point(&self) -> [f64; 3] {
        [self.x(), self.y(), self.z()]
    }

    /// Shift the node by a vector; only the stored dimensions are moved
    pub fn translate(&mut self, vector: [f64; 3]) {
        for (c, v) in self.coords.iter_mut().zip(vector) {
            *c += v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Node::new(3, vec![1.0, 2.0, 3.0]);
        assert_eq!(node.tag, 3);
        assert_eq!(node.point(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_translate_2d_node_keeps_dimension() {
        let mut n = Node::new(1, vec![1.0, 1.0]);
        n.translate([1.0, 2.0, 3.0]);
        assert_eq!(n.coords, vec![2.0, 3.0]);
    }
}
