//! Input document - the structural input file as an ordered line sequence
//!
//! The lines are the single source of truth. Nodes, elements, section types,
//! materials and the per-family [`FamilyIndex`] are views derived by a scan of
//! those lines, and every mutation re-derives all of them from the edited text.

mod edit;
mod scan;

use std::collections::HashMap;
use std::path::Path;

use crate::elements::{Element, ElementFamily, Material, Node, SectionType};
use crate::error::{SafirError, SafirResult};
use crate::io;

pub use edit::Domain;
pub use scan::FamilyIndex;

use scan::{FamilyView, ScanView};

/// A parsed SAFIR input file
#[derive(Debug, Clone)]
pub struct InputDocument {
    lines: Vec<String>,
    newline: &'static str,
    view: ScanView,
}

impl InputDocument {
    /// Parse a document from text
    pub fn from_text(text: &str) -> SafirResult<Self> {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let view = scan::scan(&lines)?;
        Ok(Self {
            lines,
            newline,
            view,
        })
    }

    /// Read and parse a document from disk
    pub fn load(path: impl AsRef<Path>) -> SafirResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let document = Self::from_text(&text)?;
        log::info!(
            "Loaded {} ({} lines, {} nodes)",
            path.display(),
            document.lines.len(),
            document.view.nodes.len()
        );
        Ok(document)
    }

    /// The document text, byte for byte as parsed apart from edited lines
    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    /// Write the document through a temporary file renamed over `path`
    pub fn save(&self, path: impl AsRef<Path>) -> SafirResult<()> {
        io::write_atomic(path.as_ref(), &self.to_text())?;
        log::info!("Saved {}", path.as_ref().display());
        Ok(())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    // ========================
    // Entity views
    // ========================

    pub fn nodes(&self) -> &[Node] {
        &self.view.nodes
    }

    /// Node by its file tag
    pub fn node(&self, tag: usize) -> Option<&Node> {
        self.view.nodes.iter().find(|n| n.tag == tag)
    }

    pub fn families(&self) -> impl Iterator<Item = ElementFamily> + '_ {
        self.view.families.keys().copied()
    }

    pub fn elements(&self, family: ElementFamily) -> &[Element] {
        self.view
            .families
            .get(&family)
            .map(|f| f.elements.as_slice())
            .unwrap_or_default()
    }

    pub fn beams(&self) -> &[Element] {
        self.elements(ElementFamily::Beam)
    }

    pub fn trusses(&self) -> &[Element] {
        self.elements(ElementFamily::Truss)
    }

    pub fn shells(&self) -> &[Element] {
        self.elements(ElementFamily::Shell)
    }

    pub fn solids(&self) -> &[Element] {
        self.elements(ElementFamily::Solid)
    }

    /// Element of a family by its file tag
    pub fn element(&self, family: ElementFamily, tag: usize) -> Option<&Element> {
        self.elements(family).iter().find(|e| e.tag == tag)
    }

    pub fn section_types(&self, family: ElementFamily) -> &[SectionType] {
        self.view
            .families
            .get(&family)
            .map(|f| f.sections.as_slice())
            .unwrap_or_default()
    }

    /// Section type by its 1-based index as written on `ELEM` lines
    pub fn section_type(&self, family: ElementFamily, index: usize) -> Option<&SectionType> {
        index
            .checked_sub(1)
            .and_then(|i| self.section_types(family).get(i))
    }

    /// Section type an element references
    pub fn element_section(&self, family: ElementFamily, tag: usize) -> SafirResult<&SectionType> {
        let element = self.element(family, tag).ok_or_else(|| SafirError::ElementNotFound {
            family: family.to_string(),
            tag,
        })?;
        self.section_type(family, element.section)
            .ok_or_else(|| SafirError::UnresolvedSection {
                family: family.to_string(),
                element: tag,
                index: element.section,
                available: self.section_types(family).len(),
            })
    }

    pub fn family_index(&self, family: ElementFamily) -> Option<&FamilyIndex> {
        self.view.families.get(&family).map(|f| &f.index)
    }

    pub fn materials(&self) -> &[Material] {
        &self.view.materials
    }

    /// End time of the analysis (`TIME` block)
    pub fn end_time(&self) -> Option<f64> {
        self.view.end_time
    }

    /// Check that every element resolves its section type and that the
    /// declared counts match what was parsed
    pub fn validate(&self) -> SafirResult<()> {
        for (family, view) in &self.view.families {
            if *family != ElementFamily::Solid {
                let available = view.sections.len();
                if let Some(bad) = view
                    .elements
                    .iter()
                    .find(|e| e.section == 0 || e.section > available)
                {
                    return Err(SafirError::UnresolvedSection {
                        family: family.to_string(),
                        element: bad.tag,
                        index: bad.section,
                        available,
                    });
                }
                check_declared(*family, "section types", view.index.declared_types, available)?;
            }
            check_declared(*family, "elements", view.index.declared_elements, view.elements.len())?;
        }
        Ok(())
    }

    // ========================
    // Internals shared with the editor
    // ========================

    pub(crate) fn newline(&self) -> &'static str {
        self.newline
    }

    pub(crate) fn family_view(&self, family: ElementFamily) -> SafirResult<&FamilyView> {
        self.view
            .families
            .get(&family)
            .ok_or_else(|| SafirError::InvalidInput(format!("no {family} elements in input file")))
    }

    pub(crate) fn node_lookup(&self) -> HashMap<usize, &Node> {
        self.view.nodes.iter().map(|n| (n.tag, n)).collect()
    }

    pub(crate) fn node_lines(&self) -> &[usize] {
        &self.view.node_lines
    }

    /// Replace the line sequence, re-deriving every view.
    ///
    /// The document is left untouched when the new lines do not scan.
    pub(crate) fn commit(&mut self, lines: Vec<String>) -> SafirResult<()> {
        let view = scan::scan(&lines)?;
        self.lines = lines;
        self.view = view;
        Ok(())
    }
}

fn check_declared(family: ElementFamily, what: &str, declared: Option<usize>, found: usize) -> SafirResult<()> {
    match declared {
        Some(declared) if declared != found => Err(SafirError::CountMismatch {
            what: format!("{family} {what}"),
            declared,
            found,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const FRAME: &str = "\
Frame with two section types
NNODE 7
NDIM 3
BEAM 3 2
NODES
NODE 1 0.0 0.0 0.0
NODE 2 0.0 0.0 1.5
NODE 3 0.0 0.0 3.0
NODE 4 2.5 0.0 3.0
NODE 5 5.0 0.0 3.0
NODE 6 5.0 0.0 1.5
NODE 7 5.0 0.0 0.0
FIXATIONS
BLOCK 1 F0 F0 F0 F0 F0 F0 F0
END_FIX
NODOFBEAM
hea200.tem
     TRANSLATE    1    1
     END_TRANS
ipe300.TEM
     TRANSLATE    1    1
     TRANSLATE    2    2
     END_TRANS
ELEM 1 1 2 3 1
ELEM 2 3 4 5 2
ELEM 3 5 6 7 1
PRECISION 1.0E-3
LOADS
END_LOAD
MATERIALS
STEELEC3EN
210000e6 0.3 355e6 1200 1200
SILCONC_EN
0.2 30e6 0 0
TIME
1.0 1800.
ENDTIME
TIMEPRINT
60. 1800.
END_TIMEPR
";

    #[test]
    fn test_parse_frame() {
        let doc = InputDocument::from_text(FRAME).unwrap();
        assert_eq!(doc.nodes().len(), 7);
        assert_eq!(doc.beams().len(), 3);
        assert_eq!(doc.beams()[1].nodes, vec![3, 4, 5]);
        assert_eq!(doc.section_types(ElementFamily::Beam).len(), 2);
        assert_eq!(
            doc.section_type(ElementFamily::Beam, 2),
            Some(&SectionType::profile("ipe300.TEM", vec![1, 2]))
        );
        assert_eq!(doc.materials().len(), 2);
        assert_eq!(doc.end_time(), Some(1800.0));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_family_index() {
        let doc = InputDocument::from_text(FRAME).unwrap();
        let index = doc.family_index(ElementFamily::Beam).unwrap();
        assert_eq!(index.keyword_line, 15);
        assert_eq!(index.elem_start, 23);
        assert_eq!(index.elem_end, 26);
        assert_eq!(index.count_line, Some(3));
        assert_eq!(index.declared_types, Some(2));
        assert_eq!(index.type_names, vec!["hea200.tem", "ipe300.TEM"]);
    }

    #[test]
    fn test_text_is_verbatim() {
        let doc = InputDocument::from_text(FRAME).unwrap();
        assert_eq!(doc.to_text(), FRAME);
    }

    #[test]
    fn test_crlf_is_detected() {
        let text = FRAME.replace('\n', "\r\n");
        let doc = InputDocument::from_text(&text).unwrap();
        assert_eq!(doc.newline(), "\r\n");
        assert_eq!(doc.to_text(), text);
    }

    #[test]
    fn test_zero_based_lookup_is_rejected() {
        let doc = InputDocument::from_text(FRAME).unwrap();
        assert!(doc.section_type(ElementFamily::Beam, 0).is_none());
        assert!(doc.section_type(ElementFamily::Beam, 3).is_none());
    }

    #[test]
    fn test_non_numeric_node_is_malformed() {
        let text = FRAME.replace("NODE 4 2.5 0.0 3.0", "NODE 4 2.5 x 3.0");
        let err = InputDocument::from_text(&text).unwrap_err();
        assert!(matches!(err, SafirError::Malformed { line: 9, .. }));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_validate_declared_count() {
        let text = FRAME.replace("BEAM 3 2", "BEAM 4 2");
        let doc = InputDocument::from_text(&text).unwrap();
        assert!(matches!(
            doc.validate(),
            Err(SafirError::CountMismatch { declared: 4, found: 3, .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.IN");
        let doc = InputDocument::from_text(FRAME).unwrap();
        doc.save(&path).unwrap();
        let reloaded = InputDocument::load(&path).unwrap();
        assert_eq!(reloaded.to_text(), FRAME);
    }
}
