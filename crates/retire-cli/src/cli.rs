use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize a plant dataset into z-scored feature columns
    Normalize {
        /// Path to the coal plants CSV
        dataset: String,
        /// Output path for the scaled feature table
        #[arg(short, long, default_value = "out/features.csv")]
        out: String,
        /// Optional pipeline config JSON
        #[arg(long)]
        config: Option<String>,
    },
    /// Build the cluster graph over a plant dataset
    Cluster {
        /// Path to the coal plants CSV
        dataset: String,
        /// Output path for the cluster graph JSON
        #[arg(short, long, default_value = "out/clusters.json")]
        out: String,
        /// Optional pipeline config JSON
        #[arg(long)]
        config: Option<String>,
    },
    /// Derive group summaries and target explanations
    Analyze {
        /// Path to the coal plants CSV
        dataset: String,
        /// Cluster graph JSON produced by `retire cluster`
        #[arg(long)]
        graph: String,
        /// Output path for the group analysis table
        #[arg(long, default_value = "out/groups.csv")]
        groups_out: String,
        /// Output path for the target explanations table
        #[arg(long, default_value = "out/targets.csv")]
        targets_out: String,
        /// Optional pipeline config JSON
        #[arg(long)]
        config: Option<String>,
    },
    /// Run the full pipeline: normalize, cluster, analyze
    Run {
        /// Path to the coal plants CSV
        dataset: String,
        /// Directory for all four output tables
        #[arg(long, default_value = "out")]
        out_dir: String,
        /// Optional pipeline config JSON
        #[arg(long)]
        config: Option<String>,
    },
    /// Validate a dataset against a schema
    Validate {
        /// Path to the dataset specification file
        #[arg(long)]
        spec: String,
    },
    /// Graph utilities
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Graph stats summary
    Stats {
        /// Cluster graph JSON produced by `retire cluster`
        graph_file: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_command_parses() {
        let cli = Cli::parse_from(["retire", "run", "plants.csv", "--out-dir", "results"]);
        match cli.command {
            Commands::Run {
                dataset, out_dir, ..
            } => {
                assert_eq!(dataset, "plants.csv");
                assert_eq!(out_dir, "results");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn graph_stats_parses() {
        let cli = Cli::parse_from(["retire", "graph", "stats", "out/clusters.json"]);
        match cli.command {
            Commands::Graph {
                command: GraphCommands::Stats { graph_file },
            } => assert_eq!(graph_file, "out/clusters.json"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
