//! Benchmarks for input parsing and fire scheduling

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use safir_tools::prelude::*;

const TEMPLATE: &str = "\
FIRE_POS  0.0 0.0 0.0
Z_CEILING  4.0
DIAMETER
    0.0 0.5
    1200.0 3.0
END_DIAM
RHR
    0.0 0.0
    300.0 1e6
    1200.0 1e6
END_RHR
";

fn create_frame_file(stories: usize, bays: usize) -> String {
    let nodes_per_story = bays + 1;
    let node_count = (stories + 1) * nodes_per_story;
    let columns = stories * nodes_per_story;
    let beams = stories * bays;

    let mut text = String::from("Generated frame\n");
    text.push_str(&format!("NNODE {node_count}\nNDIM 2\nBEAM {} 2\nNODES\n", columns + beams));

    // Create nodes
    for story in 0..=stories {
        for bay in 0..=bays {
            let tag = story * nodes_per_story + bay + 1;
            text.push_str(&format!("NODE {tag} {}.0 {}.0\n", bay * 6, story * 3));
        }
    }
    text.push_str("FIXATIONS\nEND_FIX\nNODOFBEAM\n");
    text.push_str("column.tem\n     TRANSLATE    1    1\n     END_TRANS\n");
    text.push_str("beam.tem\n     TRANSLATE    1    1\n     END_TRANS\n");

    // Create columns, then beams
    let mut tag = 1;
    for story in 0..stories {
        for bay in 0..=bays {
            let i = story * nodes_per_story + bay + 1;
            text.push_str(&format!("ELEM {tag} {i} {} 1\n", i + nodes_per_story));
            tag += 1;
        }
    }
    for story in 1..=stories {
        for bay in 0..bays {
            let i = story * nodes_per_story + bay + 1;
            text.push_str(&format!("ELEM {tag} {i} {} 2\n", i + 1));
            tag += 1;
        }
    }
    text.push_str("PRECISION 1.0E-3\nMATERIALS\nSTEELEC3EN\n210000e6 0.3 355e6 1200 1200\nTIME\n1.0 3600.\nENDTIME\n");
    text
}

fn create_scheduler(alpha: f64) -> FireScheduler {
    let template = FireTemplate::parse(TEMPLATE).unwrap();
    let points = (0..400).map(|i| [(i % 20) as f64, (i / 20) as f64, 0.0]).collect();
    FireScheduler::new(template, points, &TargetCurve::TSquared { alpha }, 1).unwrap()
}

fn benchmark_parse(c: &mut Criterion) {
    let text = create_frame_file(20, 10);
    c.bench_function("parse_frame_20story_10bay", |b| {
        b.iter(|| {
            let doc = InputDocument::from_text(black_box(&text)).unwrap();
            black_box(&doc);
        })
    });
}

fn benchmark_append_section(c: &mut Criterion) {
    let text = create_frame_file(20, 10);
    c.bench_function("append_section_20story_10bay", |b| {
        b.iter(|| {
            let mut doc = InputDocument::from_text(&text).unwrap();
            let section = SectionType::profile("hot.tem", vec![1]);
            doc.append_section_type(ElementFamily::Beam, section, &[1, 2, 3]).unwrap();
            black_box(&doc);
        })
    });
}

fn benchmark_estimate(c: &mut Criterion) {
    let mut scheduler = create_scheduler(46.88);
    scheduler.apply_plateau(0.0).unwrap();
    c.bench_function("estimate_medium_growth", |b| {
        b.iter(|| {
            black_box(scheduler.estimate());
        })
    });
}

fn benchmark_corrector(c: &mut Criterion) {
    let config = SchedulerConfig {
        optimization: Optimization::Coeff,
        precision: 0.01,
        ..SchedulerConfig::default()
    };
    c.bench_function("corrector_medium_growth", |b| {
        b.iter(|| {
            let mut scheduler = create_scheduler(46.88);
            let _ = scheduler.run(&config);
            black_box(&scheduler);
        })
    });
}

criterion_group!(
    benches,
    benchmark_parse,
    benchmark_append_section,
    benchmark_estimate,
    benchmark_corrector,
);

criterion_main!(benches);
