//! Input document round trips and mutations on a slab resting on a solid block

use safir_tools::prelude::*;

const SLAB: &str = "\
Slab on a concrete block
NNODE 10
NDIM 3
SHELL 2 2
SOLID 1 1
NODES
NODE 1 0.0 0.0 0.0
NODE 2 1.0 0.0 0.0
NODE 3 1.0 1.0 0.0
NODE 4 0.0 1.0 0.0
NODE 5 0.0 0.0 1.0
NODE 6 1.0 0.0 1.0
NODE 7 1.0 1.0 1.0
NODE 8 0.0 1.0 1.0
NODE 9 2.0 0.0 1.0
NODE 10 2.0 1.0 1.0
FIXATIONS
BLOCK 1 F0 F0 F0
END_FIX
NODOFSHELL
slab.tsh
     TRANSLATE    1    1
     TRANSLATE    2    2
     END_TRANS
slab_edge.TSH
     TRANSLATE    1    1
     TRANSLATE    2    2
     END_TRANS
ELEM 1 5 6 7 8 1
ELEM 2 6 9 10 7 2
NODOFSOLID
ELEM 1 1 2 3 4 5 6 7 8 2
PRECISION 1.0E-3
LOADS
END_LOAD
MATERIALS
SILCONC_EN
0.2 30e6 0 0
STEELEC2EN
210000e6 0.3 500e6 1200 1200
TIME
1.0 1800.
ENDTIME
TIMEPRINT
60. 1800.
END_TIMEPR
";

#[test]
fn test_round_trip_is_verbatim() {
    let doc = InputDocument::from_text(SLAB).unwrap();
    assert_eq!(doc.to_text(), SLAB);
}

#[test]
fn test_entities() {
    let doc = InputDocument::from_text(SLAB).unwrap();
    assert_eq!(doc.nodes().len(), 10);
    assert_eq!(doc.shells().len(), 2);
    assert_eq!(doc.solids().len(), 1);
    assert!(doc.beams().is_empty());
    assert_eq!(doc.materials().len(), 2);

    let shells = doc.section_types(ElementFamily::Shell);
    assert_eq!(shells.len(), 2);
    assert_eq!(shells[0], SectionType::profile("slab.tsh", vec![1, 2]));
    assert_eq!(doc.element_section(ElementFamily::Shell, 2).unwrap().file(), "slab_edge.TSH");

    let solid = doc.element(ElementFamily::Solid, 1).unwrap();
    assert_eq!(solid.nodes, (1..=8).collect::<Vec<_>>());
    assert_eq!(doc.family_index(ElementFamily::Shell).unwrap().declared_types, Some(2));
    assert!(doc.validate().is_ok());
}

#[test]
fn test_append_shell_type() {
    let mut doc = InputDocument::from_text(SLAB).unwrap();
    let before: Vec<String> = doc.lines().to_vec();
    let shell = doc.family_index(ElementFamily::Shell).unwrap().clone();
    let solid = doc.family_index(ElementFamily::Solid).unwrap().clone();

    let section = SectionType::profile("slab_hot.tsh", vec![1, 2]);
    let index = doc.append_section_type(ElementFamily::Shell, section, &[1]).unwrap();
    assert_eq!(index, 3);

    assert_eq!(doc.element(ElementFamily::Shell, 1).unwrap().section, 3);
    assert_eq!(doc.element(ElementFamily::Shell, 2).unwrap().section, 2);
    assert_eq!(doc.section_types(ElementFamily::Shell)[2].file(), "slab_hot.tsh");

    let lines = doc.lines();
    assert_eq!(lines.len(), before.len() + 4);
    assert_eq!(lines[3], "SHELL\t2\t3\n");
    assert_eq!(lines[4], before[4]);
    assert_eq!(lines[shell.elem_start], "slab_hot.tsh\n");
    assert_eq!(lines[shell.elem_start + 1], "     TRANSLATE    1    1\n");
    assert_eq!(lines[shell.elem_start + 4], "ELEM\t1\t5\t6\t7\t8\t3\n");
    assert_eq!(lines[shell.elem_start + 5..], before[shell.elem_start + 1..]);

    // The solid block only moves down
    let moved = doc.family_index(ElementFamily::Solid).unwrap();
    assert_eq!(moved.keyword_line, solid.keyword_line + 4);
    assert_eq!(moved.elem_start, solid.elem_start + 4);
    assert_eq!(doc.solids().len(), 1);
    assert!(doc.validate().is_ok());

    let reparsed = InputDocument::from_text(&doc.to_text()).unwrap();
    assert_eq!(reparsed.section_types(ElementFamily::Shell).len(), 3);
}

#[test]
fn test_reassign_shell() {
    let mut doc = InputDocument::from_text(SLAB).unwrap();
    doc.reassign_section(ElementFamily::Shell, 2, 1).unwrap();
    assert_eq!(doc.element(ElementFamily::Shell, 2).unwrap().section, 1);
    assert!(doc.validate().is_ok());

    let text = doc.to_text();
    assert!(doc.reassign_section(ElementFamily::Shell, 2, 3).is_err());
    assert!(doc.reassign_section(ElementFamily::Shell, 7, 1).is_err());
    assert_eq!(doc.to_text(), text);
}

#[test]
fn test_short_solid_element_rejected() {
    let text = SLAB.replace("ELEM 1 1 2 3 4 5 6 7 8 2", "ELEM 1 1 2 3 4 5 6 7 2");
    let err = InputDocument::from_text(&text).unwrap_err();
    assert!(matches!(err, SafirError::Malformed { .. }));
}

#[test]
fn test_shell_section_needs_end_trans() {
    let text = SLAB.replacen("     END_TRANS\n", "", 1);
    assert!(InputDocument::from_text(&text).is_err());
}
