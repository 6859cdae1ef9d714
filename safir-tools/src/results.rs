//! Solver XML results
//!
//! The solver writes some relaxation fields of its XML output as `-0.100E+01`
//! and `0.000E+00`. [`normalize_relaxations`] rewrites them before the file
//! goes to any XML tooling, and [`ResultFile`] reads the normalized text.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::elements::Node;
use crate::error::{SafirError, SafirResult};
use crate::io;

/// Values written per Gauss point in an `MNV` block
pub const MNV_VALUES: usize = 7;

/// Rewrite the relaxation fields of every line carrying `RLX`.
/// Returns the normalized text and the number of lines touched.
pub fn normalize_relaxations(text: &str) -> (String, usize) {
    let mut fixed = 0;
    let normalized = text
        .split_inclusive('\n')
        .map(|line| {
            if line.contains("RLX") {
                fixed += 1;
                Cow::Owned(line.replace("-0.100E+01", "-1").replace("0.000E+00", "0"))
            } else {
                Cow::Borrowed(line)
            }
        })
        .collect::<String>();
    (normalized, fixed)
}

/// Path of the normalized copy of a result file (`<chid>_fixed.XML`)
pub fn fixed_path(xml: &Path) -> PathBuf {
    let stem = xml.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    xml.with_file_name(format!("{stem}_fixed.XML"))
}

/// Write the normalized copy of a result file next to it.
/// Returns the copy's path and the number of fixed lines.
pub fn fix_result_file(xml: &Path) -> SafirResult<(PathBuf, usize)> {
    let text = std::fs::read_to_string(xml)?;
    let (normalized, fixed) = normalize_relaxations(&text);
    let target = fixed_path(xml);
    io::write_atomic(&target, &normalized)?;
    log::info!("{fixed} XML file lines fixed (relaxations) in {}", target.display());
    Ok((target, fixed))
}

/// Reaction record of a supported node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Node tag
    pub node: usize,
    /// Reaction components, as many as the record's `NR`
    pub values: Vec<f64>,
}

/// Internal forces of one beam: `NGBM` Gauss points of [`MNV_VALUES`] values
pub type BeamForces = Vec<[f64; MNV_VALUES]>;

/// Temperature statistics of one time step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureStats {
    pub time: f64,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl TemperatureStats {
    fn from_values(time: f64, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { time, min, mean, max })
    }
}

#[derive(Debug, Clone, Default)]
struct XmlElement {
    name: String,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            ..Self::default()
        }
    }

    /// Parse a document under a nameless root
    fn parse(text: &str) -> SafirResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);
        let mut stack = vec![XmlElement::default()];

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::named(e.name().as_ref())),
                Event::Empty(e) => {
                    let leaf = Self::named(e.name().as_ref());
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(leaf);
                    }
                }
                Event::End(_) => {
                    let element = match stack.pop() {
                        Some(element) if !stack.is_empty() => element,
                        _ => return Err(SafirError::InvalidInput("unbalanced XML end tag".to_string())),
                    };
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(SafirError::InvalidInput("unclosed XML element".to_string())),
        }
    }

    /// All elements named `name`, in document order
    fn descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.descendants(name, found);
        }
    }

    fn value<T: FromStr>(&self) -> SafirResult<T> {
        self.text
            .trim()
            .parse()
            .map_err(|_| SafirError::InvalidInput(format!("invalid <{}> value '{}'", self.name, self.text)))
    }
}

/// A parsed solver result file
#[derive(Debug, Clone)]
pub struct ResultFile {
    root: XmlElement,
}

impl ResultFile {
    /// Normalize and parse result text
    pub fn from_text(text: &str) -> SafirResult<Self> {
        let (normalized, _) = normalize_relaxations(text);
        Ok(Self {
            root: XmlElement::parse(&normalized)?,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> SafirResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Parsing {}", path.as_ref().display());
        Self::from_text(&text)
    }

    fn all(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.root.descendants(name, &mut found);
        found
    }

    fn nth(&self, name: &str, index: usize) -> SafirResult<&XmlElement> {
        let all = self.all(name);
        let available = all.len();
        all.into_iter().nth(index).ok_or_else(|| {
            SafirError::InvalidInput(format!("no <{name}> block {index} in results ({available} found)"))
        })
    }

    /// Times of the saved steps
    pub fn times(&self) -> SafirResult<Vec<f64>> {
        self.all("TIME").into_iter().map(XmlElement::value).collect()
    }

    /// Node coordinates of the `NODES` block
    pub fn nodes(&self) -> SafirResult<Vec<Node>> {
        let block = self.nth("NODES", 0)?;
        block
            .children
            .iter()
            .filter(|n| n.name == "N")
            .enumerate()
            .map(|(i, n)| {
                let coords = n.children.iter().map(XmlElement::value).collect::<SafirResult<Vec<f64>>>()?;
                Ok(Node::new(i + 1, coords))
            })
            .collect()
    }

    /// Reactions of a step; every node record must hold exactly `NR` values
    pub fn reactions(&self, step: usize) -> SafirResult<Vec<Reaction>> {
        let block = self.nth("REACTIONS", step)?;
        let mut reactions = Vec::new();
        let mut current: Option<(Reaction, usize)> = None;

        for child in &block.children {
            match child.name.as_str() {
                "N" => {
                    if let Some(record) = current.take() {
                        reactions.push(close_reaction(record)?);
                    }
                    current = Some((Reaction { node: child.value()?, values: Vec::new() }, 0));
                }
                "NR" | "R" => {
                    let Some((reaction, declared)) = current.as_mut() else {
                        return Err(SafirError::InvalidInput(format!("<{}> before a reaction node", child.name)));
                    };
                    if child.name == "NR" {
                        *declared = child.value()?;
                    } else {
                        reaction.values.push(child.value()?);
                    }
                }
                _ => {}
            }
        }
        if let Some(record) = current {
            reactions.push(close_reaction(record)?);
        }
        Ok(reactions)
    }

    /// Number of Gauss points per beam (`NGBM`)
    pub fn gauss_points(&self) -> SafirResult<usize> {
        self.nth("NGBM", 0)?.value()
    }

    /// Beam internal forces of a step. The first `MNV` block precedes the
    /// saved steps, so step `k` reads block `k + 1`.
    pub fn beam_forces(&self, step: usize) -> SafirResult<Vec<BeamForces>> {
        let ngbm = self.gauss_points()?;
        let block = self.nth("MNV", step + 1)?;
        let mut beams = Vec::with_capacity(block.children.len());

        for (b, beam) in block.children.iter().enumerate() {
            let mut points = Vec::with_capacity(ngbm);
            for gauss in &beam.children {
                let values = gauss
                    .children
                    .iter()
                    .filter(|v| !v.text.trim().is_empty())
                    .map(XmlElement::value)
                    .collect::<SafirResult<Vec<f64>>>()?;
                let values: [f64; MNV_VALUES] = values.try_into().map_err(|v: Vec<f64>| SafirError::CountMismatch {
                    what: format!("MNV values of beam {}", b + 1),
                    declared: MNV_VALUES,
                    found: v.len(),
                })?;
                points.push(values);
            }
            if points.len() != ngbm {
                return Err(SafirError::CountMismatch {
                    what: format!("Gauss points of beam {}", b + 1),
                    declared: ngbm,
                    found: points.len(),
                });
            }
            beams.push(points);
        }
        Ok(beams)
    }

    /// Node temperatures of a step
    pub fn temperatures(&self, step: usize) -> SafirResult<Vec<f64>> {
        self.nth("TEMPERATURES", step)?
            .children
            .iter()
            .map(XmlElement::value)
            .collect()
    }

    /// Minimum, mean and maximum temperature of every step, optionally over a
    /// subset of 1-based node tags
    pub fn temperature_stats(&self, nodes: Option<&[usize]>) -> SafirResult<Vec<TemperatureStats>> {
        let times = self.times()?;
        let steps = self.all("TEMPERATURES").len();
        if steps != times.len() {
            return Err(SafirError::CountMismatch {
                what: "temperature steps".to_string(),
                declared: times.len(),
                found: steps,
            });
        }

        let mut stats = Vec::with_capacity(steps);
        for (step, time) in times.into_iter().enumerate() {
            let all = self.temperatures(step)?;
            let values = match nodes {
                Some(tags) => tags
                    .iter()
                    .map(|tag| {
                        tag.checked_sub(1).and_then(|i| all.get(i)).copied().ok_or_else(|| {
                            SafirError::InvalidInput(format!("node {tag} has no temperature at step {step}"))
                        })
                    })
                    .collect::<SafirResult<Vec<_>>>()?,
                None => all,
            };
            if let Some(s) = TemperatureStats::from_values(time, &values) {
                stats.push(s);
            }
        }
        Ok(stats)
    }
}

fn close_reaction((reaction, declared): (Reaction, usize)) -> SafirResult<Reaction> {
    if reaction.values.len() != declared {
        return Err(SafirError::CountMismatch {
            what: format!("reactions of node {}", reaction.node),
            declared,
            found: reaction.values.len(),
        });
    }
    Ok(reaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RESULTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SAFIR_RESULTS>
<NODES>
 <N><P>0.0</P><P>0.0</P><P>0.0</P></N>
 <N><P>2.5</P><P>0.0</P><P>3.0</P></N>
</NODES>
<NGBM>2</NGBM>
<RELAX><BEAMS>
 <RLX>-0.100E+01 0.000E+00</RLX>
</BEAMS></RELAX>
<MNV></MNV>
<STEP>
 <TIME>60.</TIME>
 <TEMPERATURES><T>20.</T><T>100.</T><T>300.</T></TEMPERATURES>
 <REACTIONS>
  <N>1</N><NR>2</NR><R>1.5</R><R>-2.0</R>
  <N>7</N><NR>1</NR><R>4.0</R>
 </REACTIONS>
 <MNV>
  <B>
   <G><V>1</V><V>2</V><V>3</V><V>4</V><V>5</V><V>6</V><V>7</V></G>
   <G><V>1</V><V>2</V><V>3</V><V>4</V><V>5</V><V>6</V><V>8</V></G>
  </B>
 </MNV>
</STEP>
<STEP>
 <TIME>120.</TIME>
 <TEMPERATURES><T>40.</T><T>200.</T><T>600.</T></TEMPERATURES>
 <REACTIONS>
  <N>1</N><NR>2</NR><R>1.0</R>
 </REACTIONS>
 <MNV>
  <B>
   <G><V>1</V><V>2</V><V>3</V><V>4</V><V>5</V><V>6</V><V>7</V></G>
  </B>
 </MNV>
</STEP>
</SAFIR_RESULTS>
"#;

    #[test]
    fn test_normalize_relaxations() {
        let text = "<A>0.000E+00</A>\n<RLX>-0.100E+01 0.000E+00</RLX>\n";
        let (fixed, count) = normalize_relaxations(text);
        assert_eq!(count, 1);
        assert_eq!(fixed, "<A>0.000E+00</A>\n<RLX>-1 0</RLX>\n");
    }

    #[test]
    fn test_fixed_path() {
        assert_eq!(fixed_path(Path::new("/tmp/frame.XML")), PathBuf::from("/tmp/frame_fixed.XML"));
    }

    #[test]
    fn test_nodes_and_times() {
        let results = ResultFile::from_text(RESULTS).unwrap();
        let nodes = results.nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].point(), [2.5, 0.0, 3.0]);
        assert_eq!(results.times().unwrap(), vec![60.0, 120.0]);
    }

    #[test]
    fn test_reactions() {
        let results = ResultFile::from_text(RESULTS).unwrap();
        let reactions = results.reactions(0).unwrap();
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0], Reaction { node: 1, values: vec![1.5, -2.0] });
        assert_eq!(reactions[1].node, 7);
    }

    #[test]
    fn test_reaction_count_mismatch() {
        let results = ResultFile::from_text(RESULTS).unwrap();
        assert!(matches!(
            results.reactions(1),
            Err(SafirError::CountMismatch { declared: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_beam_forces() {
        let results = ResultFile::from_text(RESULTS).unwrap();
        let forces = results.beam_forces(0).unwrap();
        assert_eq!(forces.len(), 1);
        assert_eq!(forces[0][1][6], 8.0);
        assert!(matches!(
            results.beam_forces(1),
            Err(SafirError::CountMismatch { declared: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_temperature_stats() {
        let results = ResultFile::from_text(RESULTS).unwrap();
        let stats = results.temperature_stats(None).unwrap();
        assert_eq!(stats.len(), 2);
        assert_relative_eq!(stats[0].mean, 140.0);
        assert_relative_eq!(stats[1].max, 600.0);

        let steel = results.temperature_stats(Some(&[2, 3][..])).unwrap();
        assert_relative_eq!(steel[0].min, 100.0);
        assert!(results.temperature_stats(Some(&[4][..])).is_err());
    }

    #[test]
    fn test_fix_result_file() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("frame.XML");
        std::fs::write(&xml, RESULTS).unwrap();
        let (path, fixed) = fix_result_file(&xml).unwrap();
        assert_eq!(fixed, 1);
        assert!(std::fs::read_to_string(path).unwrap().contains("<RLX>-1 0</RLX>"));
    }
}
