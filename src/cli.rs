use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    distance::{ibs_distance, select_clustering_samples},
    input::{load_genotype_matrix, load_manual_verdicts, load_samples},
    pipeline::{PurityAnalysis, run_purity_analysis},
    reconcile::{ReconcilerConfig, ReconciliationReport, reconcile},
    report::{Dimensions, RunReport},
    thresholds::ThresholdSet,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Classify seed-lot genetic purity from SNP genotype calls", long_about = None)]
struct Cli {
    /// Tab-delimited genotype table: marker ids in the first column, one column per sample
    #[arg(value_name = "GENOTYPES")]
    genotypes: PathBuf,

    /// Tab-delimited sample sheet (sample, accession, genotype, name, lot, pedigree)
    #[arg(long, value_name = "SAMPLES")]
    samples: PathBuf,

    /// JSON threshold policy; omitted fields take the reference defaults
    #[arg(long, value_name = "JSON")]
    thresholds: Option<PathBuf>,

    /// Manual accession verdicts (accession, verdict) to reconcile against
    #[arg(long, value_name = "VERDICTS")]
    verdicts: Option<PathBuf>,

    /// Include an IBS distance matrix over the largest groups in the report
    #[arg(long, requires = "report")]
    distances: bool,

    /// Number of largest groups to include in the distance matrix
    #[arg(long, default_value_t = 6, requires = "distances")]
    top_groups: usize,

    /// Maximum samples per group in the distance matrix
    #[arg(long, default_value_t = 15, requires = "distances")]
    per_group: usize,

    /// Write the full JSON run report here
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let thresholds = match &cli.thresholds {
        Some(path) => ThresholdSet::from_path(path)
            .with_context(|| format!("failed to load thresholds {}", path.display()))?,
        None => ThresholdSet::default(),
    };

    let metadata = load_samples(&cli.samples)
        .with_context(|| format!("failed to load sample sheet {}", cli.samples.display()))?;
    let matrix = load_genotype_matrix(&cli.genotypes, &metadata)
        .with_context(|| format!("failed to load genotypes {}", cli.genotypes.display()))?;

    let analysis = run_purity_analysis(&matrix, &thresholds);
    print_summary(&analysis);

    let reconciliation = match &cli.verdicts {
        Some(path) => {
            let verdicts = load_manual_verdicts(path)
                .with_context(|| format!("failed to load verdicts {}", path.display()))?;
            let config = ReconcilerConfig {
                primary: thresholds,
                ..ReconcilerConfig::default()
            };
            let result = reconcile(&analysis.rows, &verdicts, &config);
            print_reconciliation(&result);
            Some(result)
        }
        None => None,
    };

    if let Some(path) = &cli.report {
        let dimensions = Dimensions {
            markers: matrix.n_markers(),
            samples: matrix.n_samples(),
            groups: analysis.groups.len(),
            malformed_calls: matrix.malformed_calls(),
        };
        let mut report = RunReport::new(&analysis, dimensions);
        if let Some(result) = reconciliation {
            report = report.with_reconciliation(result);
        }
        if cli.distances {
            let selection = select_clustering_samples(&matrix, cli.top_groups, cli.per_group);
            let distances = ibs_distance(&matrix, &selection.samples)
                .context("failed to compute distance matrix")?;
            report = report.with_distances(distances);
        }
        report.write(path)?;
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| String::from("NA"), |v| format!("{v:.3}"))
}

fn print_summary(analysis: &PurityAnalysis) {
    let counts = analysis.status_counts;
    println!(
        "Classified {total} samples: {pass} PASS, {warn} WARNING, {fail} FAIL.",
        total = counts.total(),
        pass = counts.pass,
        warn = counts.warning,
        fail = counts.fail,
    );

    println!("group\ttype\tn\tpass\twarning\tfail\tmedian_het\tmedian_concordance");
    for g in &analysis.groups {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            g.group,
            g.group_type,
            g.n_samples,
            g.status.pass,
            g.status.warning,
            g.status.fail,
            fmt_opt(g.median_het),
            fmt_opt(g.median_concordance),
        );
    }
}

fn print_reconciliation(result: &ReconciliationReport) {
    let agreement = result.agreement;
    println!(
        "Reconciled {n} accessions: primary policy agrees on {p}, alternate on {a}; {changed} samples changed status.",
        n = agreement.accessions,
        p = agreement.primary_agree,
        a = agreement.alternate_agree,
        changed = result.transitions.changed(),
    );
}
