//! Mutations of the input document
//!
//! Every edit works on a copy of the line sequence and commits it through a
//! fresh scan, so a failed edit leaves the document as it was.

use serde::{Deserialize, Serialize};

use super::scan::{first_token, FamilyView};
use super::InputDocument;
use crate::elements::{format_number, ElementFamily, SectionType};
use crate::error::{SafirError, SafirResult};

/// Axis-aligned box, open on every side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Domain {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Bounding box of a point cloud
    pub fn from_points(points: &[[f64; 3]]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut domain = Self::new(*first, *first);
        for p in rest {
            for axis in 0..3 {
                domain.min[axis] = domain.min[axis].min(p[axis]);
                domain.max[axis] = domain.max[axis].max(p[axis]);
            }
        }
        Some(domain)
    }

    /// Bounding box of the `XYZ_INTENSITIES` points of a CFD transfer file
    pub fn from_transfer(text: &str) -> SafirResult<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let start = lines
            .iter()
            .position(|l| l.contains("XYZ_INTENSITIES"))
            .ok_or_else(|| SafirError::InvalidInput("no XYZ_INTENSITIES block in transfer file".to_string()))?;

        let mut points = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(start + 1) {
            match first_token(line) {
                Some("NI") => break,
                None => continue,
                Some(_) => {}
            }
            let coords = line
                .split_whitespace()
                .map(|t| t.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .ok()
                .filter(|c| c.len() == 3)
                .ok_or_else(|| SafirError::malformed(i + 1, "transfer point needs three coordinates"))?;
            points.push([coords[0], coords[1], coords[2]]);
        }

        Self::from_points(&points)
            .ok_or_else(|| SafirError::InvalidInput("XYZ_INTENSITIES block has no points".to_string()))
    }

    /// Is the point strictly inside the box
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] > self.min[axis] && point[axis] < self.max[axis])
    }
}

/// Re-join tokens with tabs, keeping the line's indentation and terminator
fn rejoin(line: &str, tokens: &[String]) -> String {
    let indent = &line[..line.len() - line.trim_start().len()];
    let body = line.trim_end_matches(['\r', '\n']);
    let terminator = &line[body.len()..];
    format!("{indent}{}{terminator}", tokens.join("\t"))
}

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn set_last_token(lines: &mut [String], line: usize, value: usize) {
    let mut t = tokens(&lines[line]);
    if let Some(last) = t.last_mut() {
        *last = value.to_string();
    }
    lines[line] = rejoin(&lines[line], &t);
}

fn set_type_count(lines: &mut [String], line: usize, count: usize) {
    let mut t = tokens(&lines[line]);
    if t.len() >= 3 {
        t[2] = count.to_string();
    }
    lines[line] = rejoin(&lines[line], &t);
}

fn element_line(view: &FamilyView, tag: usize) -> SafirResult<usize> {
    view.elements
        .iter()
        .position(|e| e.tag == tag)
        .map(|i| view.index.element_lines[i])
        .ok_or_else(|| SafirError::ElementNotFound {
            family: view.index.family.to_string(),
            tag,
        })
}

fn check_section_kind(family: ElementFamily, section: &SectionType) -> SafirResult<()> {
    match (family, section) {
        (ElementFamily::Beam | ElementFamily::Shell, SectionType::Profile { .. })
        | (ElementFamily::Truss, SectionType::Truss { .. }) => Ok(()),
        _ => Err(SafirError::InvalidInput(format!(
            "{family} elements cannot use section type '{}'",
            section.file()
        ))),
    }
}

fn unresolved(view: &FamilyView, element: usize, index: usize) -> SafirError {
    SafirError::UnresolvedSection {
        family: view.index.family.to_string(),
        element,
        index,
        available: view.sections.len(),
    }
}

impl InputDocument {
    /// Append a section type after the family's last one and point the
    /// listed elements at it. Returns the new 1-based index.
    pub fn append_section_type(
        &mut self,
        family: ElementFamily,
        section: SectionType,
        reassign: &[usize],
    ) -> SafirResult<usize> {
        check_section_kind(family, &section)?;
        let view = self.family_view(family)?;
        let new_index = view.sections.len() + 1;
        let positions = reassign
            .iter()
            .map(|tag| element_line(view, *tag))
            .collect::<SafirResult<Vec<_>>>()?;
        let elem_start = view.index.elem_start;
        let count_line = view.index.count_line;

        let block = section.to_lines(self.newline());
        let shift = block.len();
        let mut lines = self.lines.clone();
        lines.splice(elem_start..elem_start, block);
        for position in positions {
            set_last_token(&mut lines, position + shift, new_index);
        }
        match count_line {
            Some(line) => set_type_count(&mut lines, line, new_index),
            None => log::debug!("No {family} count declaration to update"),
        }

        self.commit(lines)?;
        log::info!(
            "Appended {family} section type {new_index} ({}), {} elements reassigned",
            section.file(),
            reassign.len()
        );
        Ok(new_index)
    }

    /// Point an element at another section type
    pub fn reassign_section(&mut self, family: ElementFamily, tag: usize, index: usize) -> SafirResult<()> {
        let view = self.family_view(family)?;
        let line = element_line(view, tag)?;
        if index == 0 || index > view.sections.len() {
            return Err(unresolved(view, tag, index));
        }
        let mut lines = self.lines.clone();
        set_last_token(&mut lines, line, index);
        self.commit(lines)
    }

    /// Rewrite the section type count of the family's count declaration
    pub fn set_declared_type_count(&mut self, family: ElementFamily, count: usize) -> SafirResult<()> {
        let view = self.family_view(family)?;
        let line = view.index.count_line.ok_or_else(|| {
            SafirError::InvalidInput(format!("no {} count declaration", family.count_keyword()))
        })?;
        let mut lines = self.lines.clone();
        set_type_count(&mut lines, line, count);
        self.commit(lines)
    }

    /// Double the declared section type count. Returns the new count.
    pub fn double_declared_type_count(&mut self, family: ElementFamily) -> SafirResult<usize> {
        let declared = self
            .family_view(family)?
            .index
            .declared_types
            .ok_or_else(|| SafirError::InvalidInput(format!("no {} count declaration", family.count_keyword())))?;
        self.set_declared_type_count(family, declared * 2)?;
        Ok(declared * 2)
    }

    /// Append a copy of every section type with `prefix` on its file name and
    /// double the declared count. Returns the index offset from each type to
    /// its copy.
    pub fn duplicate_section_types(&mut self, family: ElementFamily, prefix: &str) -> SafirResult<usize> {
        let view = self.family_view(family)?;
        let offset = view.sections.len();
        if offset == 0 {
            return Err(SafirError::InvalidInput(format!("no {family} section types to duplicate")));
        }

        let mut block = Vec::new();
        for (span, section) in view.index.type_spans.iter().zip(&view.sections) {
            let file = section.file();
            for i in span.clone() {
                if i == span.start {
                    block.push(self.lines[i].replacen(file, &format!("{prefix}{file}"), 1));
                } else {
                    block.push(self.lines[i].clone());
                }
            }
        }
        let elem_start = view.index.elem_start;
        let count = view.index.count_line.map(|line| (line, view.index.declared_types.unwrap_or(offset) * 2));

        let mut lines = self.lines.clone();
        lines.splice(elem_start..elem_start, block);
        if let Some((line, doubled)) = count {
            set_type_count(&mut lines, line, doubled);
        }
        self.commit(lines)?;
        log::info!("Duplicated {offset} {family} section types with prefix '{prefix}'");
        Ok(offset)
    }

    /// Shift the section index of every beam whose first and last node lie
    /// strictly inside `domain`. Returns the tags of the moved beams.
    pub fn reassign_sections_in_domain(&mut self, domain: &Domain, offset: usize) -> SafirResult<Vec<usize>> {
        let view = self.family_view(ElementFamily::Beam)?;
        let nodes = self.node_lookup();
        let point = |element: usize, tag: Option<usize>| {
            tag.and_then(|t| nodes.get(&t))
                .map(|n| n.point())
                .ok_or_else(|| SafirError::InvalidInput(format!("beam {element} references a missing node")))
        };

        let mut lines = self.lines.clone();
        let mut moved = Vec::new();
        for (element, &line) in view.elements.iter().zip(&view.index.element_lines) {
            let first = point(element.tag, element.first_node())?;
            let last = point(element.tag, element.last_node())?;
            if domain.contains(first) && domain.contains(last) {
                let index = element.section + offset;
                if index > view.sections.len() {
                    return Err(unresolved(view, element.tag, index));
                }
                set_last_token(&mut lines, line, index);
                moved.push(element.tag);
            }
        }

        self.commit(lines)?;
        log::info!("{} beams inside the domain moved by {offset} section types", moved.len());
        Ok(moved)
    }

    /// Replace the file name of a section type
    pub fn rename_section_file(&mut self, family: ElementFamily, index: usize, new_file: &str) -> SafirResult<()> {
        let view = self.family_view(family)?;
        let (span, section) = index
            .checked_sub(1)
            .and_then(|i| view.index.type_spans.get(i).zip(view.sections.get(i)))
            .ok_or_else(|| SafirError::InvalidInput(format!("{family} section type {index} does not exist")))?;
        let line = span.start;
        let renamed = self.lines[line].replacen(section.file(), new_file, 1);

        let mut lines = self.lines.clone();
        lines[line] = renamed;
        self.commit(lines)
    }

    /// Move every node by `vector`, rewriting each `NODE` line in place
    pub fn translate_nodes(&mut self, vector: [f64; 3]) -> SafirResult<()> {
        let mut lines = self.lines.clone();
        for (node, &line) in self.nodes().iter().zip(self.node_lines()) {
            let mut moved = node.clone();
            moved.translate(vector);
            let mut t: Vec<String> = tokens(&lines[line]).into_iter().take(2).collect();
            t.extend(moved.coords.iter().map(|c| format_number(*c)));
            lines[line] = rejoin(&lines[line], &t);
        }
        self.commit(lines)?;
        log::info!("Translated {} nodes by {:?}", self.nodes().len(), vector);
        Ok(())
    }
}
