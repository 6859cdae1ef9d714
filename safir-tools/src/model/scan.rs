//! Keyword-driven scanner deriving the entity views from the line sequence
//!
//! Every block of the input file is located by the same small state machine,
//! driven by a grammar entry of (start keyword, element keyword, terminators).
//! Keywords are matched on the first whitespace token of a line.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::elements::{Element, ElementFamily, Material, Node, SectionType};
use crate::error::{SafirError, SafirResult};

/// Keywords ending an element block besides the start of another family
const BLOCK_END: [&str; 3] = ["PRECISION", "RELAX_ELEM", "RELAX"];

/// Block of the file a grammar entry locates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Block {
    Nodes,
    Family(ElementFamily),
}

/// One row of the grammar table
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grammar {
    pub block: Block,
    pub start: &'static str,
    pub element: &'static str,
}

impl Grammar {
    fn terminates(&self, token: &str) -> bool {
        match self.block {
            Block::Nodes => token == "FIXATIONS",
            Block::Family(family) => {
                BLOCK_END.contains(&token)
                    || ElementFamily::ALL
                        .iter()
                        .any(|other| *other != family && other.keyword() == token)
            }
        }
    }

    fn name(&self) -> String {
        match self.block {
            Block::Nodes => "node".to_string(),
            Block::Family(family) => family.to_string(),
        }
    }
}

pub(crate) const GRAMMAR: [Grammar; 5] = [
    Grammar { block: Block::Nodes, start: "NODES", element: "NODE" },
    Grammar { block: Block::Family(ElementFamily::Truss), start: "NODOFTRUSS", element: "ELEM" },
    Grammar { block: Block::Family(ElementFamily::Beam), start: "NODOFBEAM", element: "ELEM" },
    Grammar { block: Block::Family(ElementFamily::Shell), start: "NODOFSHELL", element: "ELEM" },
    Grammar { block: Block::Family(ElementFamily::Solid), start: "NODOFSOLID", element: "ELEM" },
];

/// Line positions of a located block (0-based line indices)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    pub keyword_line: usize,
    pub elem_start: usize,
    pub elem_end: usize,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Seeking,
    Header { keyword_line: usize },
    Elements { keyword_line: usize, elem_start: usize },
    Done(BlockSpan),
}

/// Derived addressing index of one element family
///
/// Line positions are 0-based indices into the document lines. The index is
/// rebuilt by every rescan, so it is never stale after an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyIndex {
    pub family: ElementFamily,
    /// Line of the `NODOF*` keyword
    pub keyword_line: usize,
    /// Line of the first `ELEM` line
    pub elem_start: usize,
    /// One past the last element line
    pub elem_end: usize,
    /// Section type file names in list order
    pub type_names: Vec<String>,
    /// Line of the `BEAM n_elements n_types` style declaration
    pub count_line: Option<usize>,
    pub declared_elements: Option<usize>,
    pub declared_types: Option<usize>,
    pub(crate) type_spans: Vec<Range<usize>>,
    pub(crate) element_lines: Vec<usize>,
}

impl FamilyIndex {
    pub fn type_count(&self) -> usize {
        self.type_names.len()
    }
}

/// Everything a scan derives from one family block
#[derive(Debug, Clone)]
pub(crate) struct FamilyView {
    pub index: FamilyIndex,
    pub elements: Vec<Element>,
    pub sections: Vec<SectionType>,
}

/// All entity views of a document
#[derive(Debug, Clone, Default)]
pub(crate) struct ScanView {
    pub nodes: Vec<Node>,
    pub node_lines: Vec<usize>,
    pub families: BTreeMap<ElementFamily, FamilyView>,
    pub materials: Vec<Material>,
    pub end_time: Option<f64>,
}

pub(crate) fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Scan the whole line sequence
pub(crate) fn scan(lines: &[String]) -> SafirResult<ScanView> {
    let mut view = ScanView::default();

    for grammar in &GRAMMAR {
        let Some(span) = locate(lines, grammar)? else {
            continue;
        };
        match grammar.block {
            Block::Nodes => {
                for i in span.elem_start..span.elem_end {
                    view.nodes.push(parse_node(&lines[i], i)?);
                    view.node_lines.push(i);
                }
            }
            Block::Family(family) => {
                let family_view = scan_family(lines, family, span)?;
                view.families.insert(family, family_view);
            }
        }
    }

    view.materials = parse_materials(lines)?;
    view.end_time = parse_end_time(lines)?;

    log::debug!(
        "Scanned {} lines: {} nodes, {} element families, {} materials",
        lines.len(),
        view.nodes.len(),
        view.families.len(),
        view.materials.len()
    );
    Ok(view)
}

/// Locate a block with the tagged-state scanner
pub(crate) fn locate(lines: &[String], grammar: &Grammar) -> SafirResult<Option<BlockSpan>> {
    let mut state = ScanState::Seeking;

    for (i, line) in lines.iter().enumerate() {
        let token = first_token(line);
        state = match state {
            ScanState::Seeking if token == Some(grammar.start) => {
                ScanState::Header { keyword_line: i }
            }
            ScanState::Header { keyword_line } if token == Some(grammar.element) => {
                ScanState::Elements {
                    keyword_line,
                    elem_start: i,
                }
            }
            ScanState::Header { keyword_line } if token.is_some_and(|t| grammar.terminates(t)) => {
                return Err(missing_section(grammar, keyword_line));
            }
            ScanState::Elements {
                keyword_line,
                elem_start,
            } if token != Some(grammar.element) => ScanState::Done(BlockSpan {
                keyword_line,
                elem_start,
                elem_end: i,
            }),
            other => other,
        };
        if matches!(state, ScanState::Done(_)) {
            break;
        }
    }

    match state {
        ScanState::Seeking => Ok(None),
        ScanState::Header { keyword_line } => Err(missing_section(grammar, keyword_line)),
        ScanState::Elements {
            keyword_line,
            elem_start,
        } => Ok(Some(BlockSpan {
            keyword_line,
            elem_start,
            elem_end: lines.len(),
        })),
        ScanState::Done(span) => Ok(Some(span)),
    }
}

fn missing_section(grammar: &Grammar, keyword_line: usize) -> SafirError {
    SafirError::MissingSection {
        family: grammar.name(),
        keyword: grammar.start.to_string(),
        line: keyword_line + 1,
    }
}

fn scan_family(lines: &[String], family: ElementFamily, span: BlockSpan) -> SafirResult<FamilyView> {
    let (sections, type_spans) = parse_sections(lines, family, span)?;

    let mut elements = Vec::with_capacity(span.elem_end - span.elem_start);
    let mut element_lines = Vec::with_capacity(span.elem_end - span.elem_start);
    for i in span.elem_start..span.elem_end {
        elements.push(parse_element(&lines[i], i, family)?);
        element_lines.push(i);
    }

    let count_line = lines[..span.keyword_line]
        .iter()
        .position(|line| parse_count_line(line, family).is_some());
    let declared = count_line.and_then(|i| parse_count_line(&lines[i], family));

    let index = FamilyIndex {
        family,
        keyword_line: span.keyword_line,
        elem_start: span.elem_start,
        elem_end: span.elem_end,
        type_names: sections.iter().map(|s| s.file().to_string()).collect(),
        count_line,
        declared_elements: declared.map(|(elements, _)| elements),
        declared_types: declared.map(|(_, types)| types),
        type_spans,
        element_lines,
    };

    Ok(FamilyView {
        index,
        elements,
        sections,
    })
}

/// `BEAM  n_elements  n_types`
pub(crate) fn parse_count_line(line: &str, family: ElementFamily) -> Option<(usize, usize)> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != family.count_keyword() {
        return None;
    }
    let elements = tokens.next()?.parse().ok()?;
    let types = tokens.next()?.parse().ok()?;
    Some((elements, types))
}

fn is_section_file(token: &str, extension: &str) -> bool {
    token.len() > extension.len() && token.to_lowercase().ends_with(extension)
}

type SectionList = (Vec<SectionType>, Vec<Range<usize>>);

fn parse_sections(lines: &[String], family: ElementFamily, span: BlockSpan) -> SafirResult<SectionList> {
    let header = span.keyword_line + 1..span.elem_start;
    match family {
        ElementFamily::Beam | ElementFamily::Shell => {
            let extension = family.section_extension().unwrap_or_default();
            parse_profile_sections(lines, header, extension)
        }
        ElementFamily::Truss => parse_truss_sections(lines, header),
        ElementFamily::Solid => Ok((Vec::new(), Vec::new())),
    }
}

fn parse_profile_sections(lines: &[String], header: Range<usize>, extension: &str) -> SafirResult<SectionList> {
    let mut sections = Vec::new();
    let mut spans = Vec::new();
    let mut open: Option<(usize, String, Vec<usize>)> = None;

    for i in header {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        let Some(&first) = tokens.first() else {
            continue;
        };

        if is_section_file(first, extension) {
            if let Some((start, file, _)) = &open {
                return Err(SafirError::malformed(
                    start + 1,
                    format!("section type '{file}' is not closed by END_TRANS"),
                ));
            }
            open = Some((i, first.to_string(), Vec::new()));
        } else if first == "TRANSLATE" {
            let Some((_, _, materials)) = open.as_mut() else {
                return Err(SafirError::malformed(i + 1, "TRANSLATE outside a section type"));
            };
            let material = tokens
                .last()
                .and_then(|t| t.parse::<usize>().ok())
                .filter(|_| tokens.len() >= 3)
                .ok_or_else(|| SafirError::malformed(i + 1, "TRANSLATE needs a local and a global material"))?;
            materials.push(material);
        } else if first == "END_TRANS" {
            let Some((start, file, materials)) = open.take() else {
                return Err(SafirError::malformed(i + 1, "END_TRANS outside a section type"));
            };
            sections.push(SectionType::profile(&file, materials));
            spans.push(start..i + 1);
        }
    }

    if let Some((start, file, _)) = open {
        return Err(SafirError::malformed(
            start + 1,
            format!("section type '{file}' is not closed by END_TRANS"),
        ));
    }
    Ok((sections, spans))
}

fn parse_truss_sections(lines: &[String], header: Range<usize>) -> SafirResult<SectionList> {
    let mut sections = Vec::new();
    let mut spans = Vec::new();

    for i in header {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        let Some((&file, rest)) = tokens.split_first() else {
            continue;
        };
        let Some((&material, parameters)) = rest.split_last() else {
            return Err(SafirError::malformed(i + 1, "truss section needs a file and a material"));
        };
        let material = material
            .parse::<usize>()
            .map_err(|_| SafirError::malformed(i + 1, format!("invalid truss material '{material}'")))?;
        let parameters = parameters
            .iter()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| SafirError::malformed(i + 1, format!("non-numeric truss parameter '{t}'")))
            })
            .collect::<SafirResult<Vec<_>>>()?;
        sections.push(SectionType::truss(file, parameters, material));
        spans.push(i..i + 1);
    }
    Ok((sections, spans))
}

fn parse_node(line: &str, i: usize) -> SafirResult<Node> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SafirError::malformed(i + 1, "NODE line needs a tag and at least two coordinates"));
    }
    let tag = tokens[1]
        .parse::<usize>()
        .map_err(|_| SafirError::malformed(i + 1, format!("invalid node tag '{}'", tokens[1])))?;
    let coords = tokens[2..]
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| SafirError::malformed(i + 1, format!("non-numeric coordinate '{t}'")))
        })
        .collect::<SafirResult<Vec<_>>>()?;
    Ok(Node::new(tag, coords))
}

fn parse_element(line: &str, i: usize, family: ElementFamily) -> SafirResult<Element> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SafirError::malformed(i + 1, "ELEM line needs a tag, nodes and a section index"));
    }
    let numbers = tokens[1..]
        .iter()
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| SafirError::malformed(i + 1, format!("non-integer token '{t}' in ELEM line")))
        })
        .collect::<SafirResult<Vec<_>>>()?;

    let tag = numbers[0];
    let section = numbers[numbers.len() - 1];
    let nodes = numbers[1..numbers.len() - 1].to_vec();
    if let Some(expected) = family.node_count() {
        if nodes.len() != expected {
            return Err(SafirError::malformed(
                i + 1,
                format!("{family} ELEM line has {} nodes, expected {expected}", nodes.len()),
            ));
        }
    }
    Ok(Element::new(tag, nodes, section))
}

/// Materials between the last `MATERIALS` keyword and the last `TIME` line,
/// read backward from `TIME`
fn parse_materials(lines: &[String]) -> SafirResult<Vec<Material>> {
    let Some(time) = lines.iter().rposition(|l| first_token(l) == Some("TIME")) else {
        return Ok(Vec::new());
    };
    let Some(start) = lines[..time].iter().rposition(|l| first_token(l) == Some("MATERIALS")) else {
        return Ok(Vec::new());
    };

    let mut materials = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for i in (start + 1..time).rev() {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };
        if first.parse::<f64>().is_ok() {
            let row = tokens
                .iter()
                .map(|t| {
                    t.parse::<f64>()
                        .map_err(|_| SafirError::malformed(i + 1, format!("non-numeric material parameter '{t}'")))
                })
                .collect::<SafirResult<Vec<_>>>()?;
            rows.push(row);
        } else {
            let mut material = Material::new(first);
            rows.reverse();
            material.parameters = std::mem::take(&mut rows);
            materials.push(material);
        }
    }

    if !rows.is_empty() {
        return Err(SafirError::malformed(start + 2, "material parameters without a material name"));
    }
    materials.reverse();
    Ok(materials)
}

/// Second token of the line preceding the last `ENDTIME`
fn parse_end_time(lines: &[String]) -> SafirResult<Option<f64>> {
    let Some(end) = lines.iter().rposition(|l| first_token(l) == Some("ENDTIME")) else {
        return Ok(None);
    };
    let Some(previous) = end.checked_sub(1) else {
        return Ok(None);
    };
    match lines[previous].split_whitespace().nth(1) {
        Some(token) => token
            .parse::<f64>()
            .map(Some)
            .map_err(|_| SafirError::malformed(previous + 1, format!("invalid end time '{token}'"))),
        None => Ok(None),
    }
}
