mod config;
mod executor;
mod models;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use safir_tools::prelude::*;
use safir_tools::fire::load_points;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::RunnerConfig;
use executor::SolverRunner;

#[derive(Parser, Debug)]
#[command(name = "safir-runner")]
#[command(about = "SAFIR input file tools, travelling fire scheduler and solver runner", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the solver on one input file
    Run {
        input: PathBuf,
        /// Log every solver line
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run the solver on several input files in turn
    Batch {
        inputs: Vec<PathBuf>,
        /// Write the batch report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Build a travelling fire schedule and write the LCF file
    Schedule {
        /// LOCAFI template fire
        #[arg(short, long)]
        template: PathBuf,
        /// Candidate fire points, `x y z` per line
        #[arg(short, long)]
        points: PathBuf,
        /// Scheduler options (`key value` lines or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Tabulated target curve instead of the t-squared one
        #[arg(long)]
        curve: Option<PathBuf>,
        /// Fire growth factor, overrides the config file
        #[arg(short, long)]
        alpha: Option<f64>,
        #[arg(short, long, default_value = "fires.lcf")]
        output: PathBuf,
        /// Write the schedule summary as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Write the normalized `<chid>_fixed.XML` copy of a result file
    FixXml { xml: PathBuf },
    /// Temperature statistics of a result file
    Temperatures {
        xml: PathBuf,
        /// Restrict to these node tags
        #[arg(short, long, value_delimiter = ',')]
        nodes: Vec<usize>,
    },
    /// Translate every node of a structural input file
    Move {
        input: PathBuf,
        #[arg(num_args = 3, allow_negative_numbers = true, required = true)]
        vector: Vec<f64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Give the beams inside a CFD transfer domain their own section types
    CfdSections {
        input: PathBuf,
        /// CFD transfer file bounding the domain
        #[arg(short, long)]
        transfer: PathBuf,
        #[arg(short, long, default_value = "cfd_")]
        prefix: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Splice the torsion results into a thermal results file
    Torsion {
        tem: PathBuf,
        tor: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite a section's thermal input for another fire model
    Thermal {
        input: PathBuf,
        #[arg(short, long)]
        model: FireModel,
        #[arg(short, long, value_enum, default_value_t = SectionFamily::Beam)]
        family: SectionFamily,
        /// 1-based section type index in the structural file
        #[arg(short, long)]
        section: usize,
        /// Structural input file of the natural fire analysis
        #[arg(long)]
        structural: String,
        #[arg(short, long)]
        end_time: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SectionFamily {
    Beam,
    Shell,
}

impl From<SectionFamily> for ElementFamily {
    fn from(family: SectionFamily) -> Self {
        match family {
            SectionFamily::Beam => ElementFamily::Beam,
            SectionFamily::Shell => ElementFamily::Shell,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safir_runner=info,safir_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match dispatch(args.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Run one command; `Ok(false)` reports a solver run that did not succeed
async fn dispatch(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Run { input, verbose } => {
            let runner = SolverRunner::new(RunnerConfig::from_env()).verbose(verbose);
            let report = runner.run(&input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.status.is_success())
        }
        Commands::Batch { inputs, report } => {
            if inputs.is_empty() {
                bail!("no input files given");
            }
            let runner = SolverRunner::new(RunnerConfig::from_env());
            let batch = runner.run_batch(&inputs).await;
            let json = serde_json::to_string_pretty(&batch)?;
            match report {
                Some(path) => fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
            Ok(batch.failed() == 0)
        }
        Commands::Schedule {
            template,
            points,
            config,
            curve,
            alpha,
            output,
            report,
        } => {
            schedule(&template, &points, config.as_deref(), curve.as_deref(), alpha, &output, report.as_deref())?;
            Ok(true)
        }
        Commands::FixXml { xml } => {
            let (path, fixed) = fix_result_file(&xml).with_context(|| format!("fixing {}", xml.display()))?;
            tracing::info!("{} lines fixed in {}", fixed, path.display());
            Ok(true)
        }
        Commands::Temperatures { xml, nodes } => {
            let results = ResultFile::load(&xml).with_context(|| format!("reading {}", xml.display()))?;
            let subset = (!nodes.is_empty()).then_some(nodes.as_slice());
            let stats = results.temperature_stats(subset)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(true)
        }
        Commands::Move { input, vector, output } => {
            let mut doc = InputDocument::load(&input).with_context(|| format!("reading {}", input.display()))?;
            doc.translate_nodes([vector[0], vector[1], vector[2]])?;
            doc.save(output.as_ref().unwrap_or(&input))?;
            Ok(true)
        }
        Commands::CfdSections {
            input,
            transfer,
            prefix,
            output,
        } => {
            let mut doc = InputDocument::load(&input).with_context(|| format!("reading {}", input.display()))?;
            let domain = Domain::from_transfer(&fs::read_to_string(&transfer)?)
                .with_context(|| format!("reading the domain of {}", transfer.display()))?;
            let offset = doc.duplicate_section_types(ElementFamily::Beam, &prefix)?;
            let moved = doc.reassign_sections_in_domain(&domain, offset)?;
            tracing::info!("{} beams use {} section types", moved.len(), prefix);
            doc.save(output.as_ref().unwrap_or(&input))?;
            Ok(true)
        }
        Commands::Torsion { tem, tor, output } => {
            let tem_text = fs::read_to_string(&tem).with_context(|| format!("reading {}", tem.display()))?;
            let tor_text = fs::read_to_string(&tor).with_context(|| format!("reading {}", tor.display()))?;
            let spliced = splice_torsion(&tem_text, &tor_text)?;
            safir_tools::io::write_atomic(output.as_ref().unwrap_or(&tem), &spliced)?;
            Ok(true)
        }
        Commands::Thermal {
            input,
            model,
            family,
            section,
            structural,
            end_time,
            output,
        } => {
            let text = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let change = FireModelChange {
                model,
                family: family.into(),
                section_index: section,
                structural_file: structural,
                end_time,
            };
            let rewritten = apply_fire_model(&text, &change)?;
            safir_tools::io::write_atomic(output.as_ref().unwrap_or(&input), &rewritten)?;
            tracing::info!("{} rewritten for the {} fire model", input.display(), model);
            Ok(true)
        }
    }
}

fn schedule(
    template: &Path,
    points: &Path,
    config: Option<&Path>,
    curve: Option<&Path>,
    alpha: Option<f64>,
    output: &Path,
    report: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = match config {
        Some(path) => SchedulerConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    if alpha.is_some() {
        config.alpha = alpha;
    }
    config.validate()?;

    let template = FireTemplate::load(template).with_context(|| format!("reading {}", template.display()))?;
    let points = load_points(points).with_context(|| format!("reading {}", points.display()))?;
    let curve = match (curve, config.alpha) {
        (Some(path), _) => TargetCurve::load_table(path).with_context(|| format!("reading {}", path.display()))?,
        (None, Some(alpha)) => TargetCurve::TSquared { alpha },
        (None, None) => bail!("no target curve: give alpha or a curve file"),
    };

    let mut scheduler = FireScheduler::new(template, points, &curve, config.time_step)?;
    scheduler.run(&config)?;
    scheduler.save_lcfs(output)?;
    tracing::info!("Ignition file written to {}", output.display());

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&scheduler.report())?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
