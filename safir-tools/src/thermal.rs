//! Thermal analysis files: fire-model rewrite of a section's thermal input
//! and the torsion-result splice into its `.tem` results

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::elements::{format_number, ElementFamily};
use crate::error::{SafirError, SafirResult};

/// Markers of the flux boundary block, in search priority
pub const FLUX_MARKERS: [&str; 4] = ["HOT", "CFD", "HASEMI", "LOCAFI"];

/// Thermal attack model of a section analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireModel {
    /// ISO 834 standard fire
    Iso,
    /// Ambient temperature
    Cold,
    /// CFD transfer file
    Cfd,
    /// Localised fire (LOCAFI)
    Locafi,
    /// Hasemi localised fire
    Hasemi,
}

impl FireModel {
    /// Natural fire models feed the thermal analysis from a fire file
    pub fn is_natural(&self) -> bool {
        matches!(self, Self::Cfd | Self::Locafi | Self::Hasemi)
    }

    /// Boundary function substituted for `FISO`
    fn flux_function(&self) -> &'static str {
        match self {
            Self::Iso => "FISO",
            Self::Cold => "F20",
            Self::Cfd => "CFD",
            Self::Locafi => "LOCAFI",
            Self::Hasemi => "HASEMI",
        }
    }

    /// `MAKE.*` keyword of the natural fire analysis for a section family
    fn make_keyword(&self, family: ElementFamily) -> SafirResult<Option<&'static str>> {
        let keyword = match (family, self) {
            (_, Self::Iso | Self::Cold) => None,
            (ElementFamily::Beam, Self::Cfd) => Some("MAKE.TEMCD"),
            (ElementFamily::Beam, Self::Locafi) => Some("MAKE.TEMLF"),
            (ElementFamily::Beam, Self::Hasemi) => Some("MAKE.TEMHA"),
            (ElementFamily::Shell, Self::Cfd) => Some("MAKE.TSHCD"),
            (ElementFamily::Shell, Self::Hasemi) => Some("MAKE.TSHHA"),
            _ => {
                return Err(SafirError::UnsupportedFireModel {
                    model: self.to_string(),
                    family: family.to_string(),
                })
            }
        };
        Ok(keyword)
    }
}

impl fmt::Display for FireModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iso => "iso",
            Self::Cold => "cold",
            Self::Cfd => "cfd",
            Self::Locafi => "locafi",
            Self::Hasemi => "hasemi",
        };
        f.write_str(name)
    }
}

impl FromStr for FireModel {
    type Err = SafirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iso" | "fiso" | "standard" => Ok(Self::Iso),
            "cold" | "f20" => Ok(Self::Cold),
            "cfd" | "fds" => Ok(Self::Cfd),
            "lcf" | "locafi" => Ok(Self::Locafi),
            "hsm" | "hasemi" => Ok(Self::Hasemi),
            other => Err(SafirError::InvalidInput(format!("unknown fire model '{other}'"))),
        }
    }
}

/// What a thermal input file is rewritten for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireModelChange {
    pub model: FireModel,
    /// Beam for `.tem` sections, shell for `.tsh` sections
    pub family: ElementFamily,
    /// 1-based section type index in the structural file
    pub section_index: usize,
    /// Structural input file the natural fire analysis reads its geometry from
    pub structural_file: String,
    pub end_time: f64,
}

enum Pending {
    None,
    Convection,
    EndTime,
}

/// Rewrite the thermal input of a section for another fire model
pub fn apply_fire_model(text: &str, change: &FireModelChange) -> SafirResult<String> {
    if !matches!(change.family, ElementFamily::Beam | ElementFamily::Shell) {
        return Err(SafirError::InvalidInput(format!(
            "{} sections have no thermal analysis",
            change.family
        )));
    }
    let make = change.model.make_keyword(change.family)?;
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };

    let mut out: Vec<String> = Vec::new();
    let mut pending = Pending::None;

    for line in text.split_inclusive('\n') {
        match std::mem::replace(&mut pending, Pending::None) {
            Pending::Convection => {
                out.push(line.replace("25", "35"));
                continue;
            }
            Pending::EndTime => {
                match line.split_whitespace().next() {
                    Some(step) => out.push(format!(
                        "    {step}    {}{newline}",
                        format_number(change.end_time)
                    )),
                    None => out.push(line.to_string()),
                }
                continue;
            }
            Pending::None => {}
        }

        let body = line.trim_end_matches(['\r', '\n']);
        let first = line.split_whitespace().next();

        if let Some(keyword) = make.filter(|_| body == "MAKE.TEM") {
            out.push(format!("{keyword}{newline}"));
            let type_line = match change.family {
                ElementFamily::Shell => format!("SHELL_TYPE {}{newline}", change.section_index),
                _ => format!("BEAM_TYPE {}{newline}", change.section_index),
            };
            let file_line = format!("{}{newline}", change.structural_file);
            match change.family {
                ElementFamily::Shell => out.extend([file_line, type_line]),
                _ => out.extend([type_line, file_line]),
            }
        } else if line.starts_with("   F  ") && line.contains("FISO") {
            out.extend(rewrite_boundary(line, change.model));
        } else if change.model.is_natural() && line.contains("STEEL") {
            out.push(line.to_string());
            pending = Pending::Convection;
        } else if matches!(first, Some("TIME" | "TIMEPRINT")) {
            // Both the calculation and the print interval end at the new end time
            out.push(line.to_string());
            pending = Pending::EndTime;
        } else {
            out.push(line.to_string());
        }
    }

    log::info!(
        "Thermal input rewritten for {} fire ({} section {})",
        change.model,
        change.family,
        change.section_index
    );
    Ok(out.concat())
}

/// `   F  ` boundary line with a `FISO`/`FISO0` frontier
fn rewrite_boundary(line: &str, model: FireModel) -> Vec<String> {
    if model == FireModel::Iso {
        return vec![line.to_string()];
    }
    let line = line.replace("FISO0", "FISO");
    if model == FireModel::Cold {
        return vec![line.replace("FISO", "F20")];
    }

    let function = model.flux_function();
    let flux = format!("FLUX {}", line[4..].replace("FISO", function));
    if line.contains("F20") {
        vec![flux.replace("F20", "NO"), line.replace("FISO", "NO")]
    } else {
        vec![flux]
    }
}

/// Does a thermal results file already carry torsion results
pub fn has_torsion(tem: &str) -> bool {
    tem.contains("GJ") && warping_start(tem).is_some()
}

fn warping_start(text: &str) -> Option<usize> {
    text.find("w\n").or_else(|| text.find("w\r\n"))
}

/// Splice the torsion block of `tor` (from its `w` line up to `COLD`) into
/// `tem` right before the first flux marker. A file that already carries
/// torsion results is returned unchanged.
pub fn splice_torsion(tem: &str, tor: &str) -> SafirResult<String> {
    if has_torsion(tem) {
        log::debug!("Torsion results already present");
        return Ok(tem.to_string());
    }
    if !has_torsion(tor) {
        return Err(SafirError::TorsionMissing("no GJ and w lines in torsion file".to_string()));
    }
    let start = warping_start(tor).unwrap_or_default();
    let end = tor[start..]
        .find("COLD")
        .map(|offset| start + offset)
        .ok_or_else(|| SafirError::TorsionMissing("no COLD line after the torsion block".to_string()))?;
    let block = &tor[start..end];

    let position = FLUX_MARKERS
        .iter()
        .find_map(|marker| tem.find(marker))
        .ok_or_else(|| SafirError::FluxMarkerMissing("thermal results file".to_string()))?;

    let mut spliced = String::with_capacity(tem.len() + block.len());
    spliced.push_str(&tem[..position]);
    spliced.push_str(block);
    spliced.push_str(&tem[position..]);
    log::info!("Torsion results spliced ({} bytes)", block.len());
    Ok(spliced)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEAM_THERMAL: &str = "\
hea200 section
NNODE 50
MAKE.TEM
hea200.tem
FRONTIER
   F  1  FISO  NO  NO  NO
   F  2  FISO0  F20  NO  NO
   F  3  F20  NO  NO  NO
END_FRONT
MATERIALS
STEELEC3
   25.  9.  0.5
TIME
   5.  1800.
ENDTIME
TIMEPRINT
   60.  1800.
END_TIMEPR
";

    fn change(model: FireModel, family: ElementFamily) -> FireModelChange {
        FireModelChange {
            model,
            family,
            section_index: 2,
            structural_file: "frame.IN".to_string(),
            end_time: 1200.0,
        }
    }

    #[test]
    fn test_model_aliases() {
        assert_eq!("FDS".parse::<FireModel>().unwrap(), FireModel::Cfd);
        assert_eq!("lcf".parse::<FireModel>().unwrap(), FireModel::Locafi);
        assert_eq!("f20".parse::<FireModel>().unwrap(), FireModel::Cold);
        assert!("smoke".parse::<FireModel>().is_err());
    }

    #[test]
    fn test_locafi_rewrite() {
        let out = apply_fire_model(BEAM_THERMAL, &change(FireModel::Locafi, ElementFamily::Beam)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(&lines[2..5], ["MAKE.TEMLF", "BEAM_TYPE 2", "frame.IN"]);
        assert_eq!(lines[7], "FLUX   1  LOCAFI  NO  NO  NO");
        assert_eq!(lines[8], "FLUX   2  LOCAFI  NO  NO  NO");
        assert_eq!(lines[9], "   F  2  NO  F20  NO  NO");
        assert_eq!(lines[10], "   F  3  F20  NO  NO  NO");
        assert_eq!(lines[14], "   35.  9.  0.5");
        assert_eq!(lines[16], "    5.    1200.0");
        assert_eq!(lines[19], "    60.    1200.0");
        assert_eq!(lines[20], "END_TIMEPR");
    }

    #[test]
    fn test_cold_rewrite_keeps_make() {
        let out = apply_fire_model(BEAM_THERMAL, &change(FireModel::Cold, ElementFamily::Beam)).unwrap();
        assert!(out.contains("\nMAKE.TEM\n"));
        assert!(out.contains("   F  1  F20  NO  NO  NO\n"));
        assert!(out.contains("   25.  9.  0.5\n"));
    }

    #[test]
    fn test_shell_rewrite_order() {
        let text = BEAM_THERMAL.replace("hea200.tem", "slab.tsh");
        let out = apply_fire_model(&text, &change(FireModel::Hasemi, ElementFamily::Shell)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(&lines[2..5], ["MAKE.TSHHA", "frame.IN", "SHELL_TYPE 2"]);
    }

    #[test]
    fn test_locafi_on_shell_is_rejected() {
        let err = apply_fire_model(BEAM_THERMAL, &change(FireModel::Locafi, ElementFamily::Shell)).unwrap_err();
        assert!(matches!(err, SafirError::UnsupportedFireModel { .. }));
    }

    const TEM: &str = "\
 NUMBER OF POSITIONS
 10
 HOT
 TIME 60.
 20.0 21.0
";

    const TOR: &str = "\
 TORSION ANALYSIS
       w
 1  0.000E+00
 2  1.250E-03
 GJ
   1.52E+05
 COLD
 TIME 0.
";

    #[test]
    fn test_splice_before_hot() {
        let out = splice_torsion(TEM, TOR).unwrap();
        let expected = "\
 NUMBER OF POSITIONS
 10
 w
 1  0.000E+00
 2  1.250E-03
 GJ
   1.52E+05
 HOT
 TIME 60.
 20.0 21.0
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_splice_is_idempotent() {
        let once = splice_torsion(TEM, TOR).unwrap();
        let twice = splice_torsion(&once, TOR).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_splice_errors() {
        assert!(matches!(
            splice_torsion(TEM, " COLD\n"),
            Err(SafirError::TorsionMissing(_))
        ));
        assert!(matches!(
            splice_torsion(" TIME 60.\n", TOR),
            Err(SafirError::FluxMarkerMissing(_))
        ));
    }
}
