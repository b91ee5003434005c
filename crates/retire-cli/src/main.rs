use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tabwriter::TabWriter;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use retire_algo::{
    build_cluster_graph, group_analysis_rows, group_frame, normalize_features, persist_dataframe,
    run_pipeline, target_explanation_rows, target_frame, GroupRow, OutputStage, PipelineConfig,
};
use retire_cli::cli::{Cli, Commands, GraphCommands};
use retire_cli::manifest::record_manifest;
use retire_core::{graph_stats, ClusterGraph, ClusterGraphDocument, Diagnostics, PlantTable};
use retire_io::{load_plants_from_csv, validate_dataset};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;

    match cli.command {
        Commands::Normalize {
            dataset,
            out,
            config,
        } => cmd_normalize(&dataset, &out, config.as_deref()),
        Commands::Cluster {
            dataset,
            out,
            config,
        } => cmd_cluster(&dataset, &out, config.as_deref()),
        Commands::Analyze {
            dataset,
            graph,
            groups_out,
            targets_out,
            config,
        } => cmd_analyze(&dataset, &graph, &groups_out, &targets_out, config.as_deref()),
        Commands::Run {
            dataset,
            out_dir,
            config,
        } => cmd_run(&dataset, &out_dir, config.as_deref()),
        Commands::Validate { spec } => validate_dataset(&spec),
        Commands::Graph { command } => match command {
            GraphCommands::Stats { graph_file } => cmd_graph_stats(&graph_file),
        },
        Commands::Completions { shell, out } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            match out {
                Some(path) => {
                    let mut file = fs::File::create(&path)
                        .with_context(|| format!("creating '{}'", path.display()))?;
                    generate(shell, &mut cmd, name, &mut file);
                }
                None => generate(shell, &mut cmd, name, &mut io::stdout()),
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading pipeline config '{}'", path))?;
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn load_table(dataset: &str) -> Result<PlantTable> {
    let import = load_plants_from_csv(dataset)
        .with_context(|| format!("importing dataset '{}'", dataset))?;
    report_diagnostics(&import.diagnostics);
    info!(
        rows = import.stats.rows_imported,
        skipped = import.stats.rows_skipped,
        "loaded plant dataset"
    );
    Ok(import.table)
}

fn report_diagnostics(diagnostics: &Diagnostics) {
    for issue in &diagnostics.issues {
        warn!("{}", issue);
    }
}

fn load_graph(path: &str) -> Result<ClusterGraph> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading cluster graph '{}'", path))?;
    let doc: ClusterGraphDocument =
        serde_json::from_str(&json).context("parsing cluster graph JSON")?;
    Ok(ClusterGraph::from_document(doc)?)
}

fn write_graph(graph: &ClusterGraph, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&graph.to_document())?;
    fs::write(out, json).with_context(|| format!("writing '{}'", out.display()))?;
    Ok(())
}

fn cmd_normalize(dataset: &str, out: &str, config: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let table = load_table(dataset)?;
    let features = normalize_features(&table, &config.normalizer)?;
    report_diagnostics(features.diagnostics());

    let mut df = features.to_dataframe()?;
    persist_dataframe(&mut df, Path::new(out), OutputStage::Normalize.as_str())?;
    info!(rows = features.len(), out, "wrote scaled feature table");
    record_manifest(Path::new(out), "normalize", &[("dataset", dataset)])
}

fn cmd_cluster(dataset: &str, out: &str, config: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let table = load_table(dataset)?;
    let features = normalize_features(&table, &config.normalizer)?;
    report_diagnostics(features.diagnostics());
    let graph = build_cluster_graph(&features, &config.cluster)?;

    write_graph(&graph, Path::new(out))?;
    info!(
        clusters = graph.node_count(),
        edges = graph.edge_count(),
        out,
        "wrote cluster graph"
    );
    record_manifest(
        Path::new(out),
        "cluster",
        &[
            ("dataset", dataset),
            ("metric", config.cluster.metric.as_str()),
            (
                "cluster_threshold",
                &config.cluster.cluster_threshold.to_string(),
            ),
        ],
    )
}

fn cmd_analyze(
    dataset: &str,
    graph_file: &str,
    groups_out: &str,
    targets_out: &str,
    config: Option<&str>,
) -> Result<()> {
    let config = load_config(config)?;
    let table = load_table(dataset)?;
    let graph = load_graph(graph_file)?;

    let rows = group_analysis_rows(&graph, &table)?;
    let mut groups = group_frame(&rows)?;
    let targets_rows = target_explanation_rows(&graph, &table, &config.thresholds)?;
    let mut targets = target_frame(&targets_rows)?;

    persist_dataframe(&mut groups, Path::new(groups_out), OutputStage::Groups.as_str())?;
    persist_dataframe(
        &mut targets,
        Path::new(targets_out),
        OutputStage::Targets.as_str(),
    )?;
    print_group_summary(&rows)?;
    info!(groups_out, targets_out, "wrote analysis tables");
    record_manifest(
        Path::new(groups_out),
        "analyze",
        &[("dataset", dataset), ("graph", graph_file)],
    )
}

fn cmd_run(dataset: &str, out_dir: &str, config: Option<&str>) -> Result<()> {
    let config = load_config(config)?;
    let table = load_table(dataset)?;
    let outputs = run_pipeline(&table, &config)?;
    report_diagnostics(outputs.features.diagnostics());

    let dir = Path::new(out_dir);
    let mut features_df = outputs.features.to_dataframe()?;
    persist_dataframe(
        &mut features_df,
        &dir.join("features.csv"),
        OutputStage::Normalize.as_str(),
    )?;
    write_graph(&outputs.graph, &dir.join("clusters.json"))?;
    let mut groups = outputs.groups;
    persist_dataframe(&mut groups, &dir.join("groups.csv"), OutputStage::Groups.as_str())?;
    let mut targets = outputs.targets;
    persist_dataframe(
        &mut targets,
        &dir.join("targets.csv"),
        OutputStage::Targets.as_str(),
    )?;

    let rows = group_analysis_rows(&outputs.graph, &table)?;
    print_group_summary(&rows)?;
    info!(out_dir, "pipeline outputs written");
    record_manifest(
        &dir.join("groups.csv"),
        "run",
        &[
            ("dataset", dataset),
            ("metric", config.cluster.metric.as_str()),
            (
                "cluster_threshold",
                &config.cluster.cluster_threshold.to_string(),
            ),
        ],
    )
}

fn cmd_graph_stats(graph_file: &str) -> Result<()> {
    let graph = load_graph(graph_file)?;
    let stats = graph_stats(&graph);

    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "metric\tvalue")?;
    writeln!(tw, "nodes\t{}", stats.node_count)?;
    writeln!(tw, "edges\t{}", stats.edge_count)?;
    writeln!(tw, "components\t{}", stats.connected_components)?;
    writeln!(tw, "min degree\t{}", stats.min_degree)?;
    writeln!(tw, "avg degree\t{:.2}", stats.avg_degree)?;
    writeln!(tw, "max degree\t{}", stats.max_degree)?;
    writeln!(tw, "density\t{:.3}", stats.density)?;
    tw.flush()?;
    Ok(())
}

fn print_group_summary(rows: &[GroupRow]) -> Result<()> {
    let mut tw = TabWriter::new(io::stdout());
    writeln!(
        tw,
        "Group\tPlants\tAvg MW\tAvg Age\tRetirement Rate\tAvg Emissions"
    )?;
    for row in rows {
        writeln!(
            tw,
            "{}\t{}\t{:.1}\t{:.1}\t{:.2}\t{:.2}",
            row.group,
            row.plant_count,
            row.avg_capacity_mw,
            row.avg_age_years,
            row.retirement_rate,
            row.avg_emissions_rate
        )?;
    }
    tw.flush()?;
    Ok(())
}
