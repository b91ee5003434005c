//! # retire-cli: Command-Line Front End
//!
//! The `retire` binary wires the ingestion and pipeline crates together:
//! `normalize`, `cluster`, and `analyze` run individual stages (exchanging
//! the cluster graph as JSON between invocations), `run` executes the full
//! pipeline, `validate` checks a dataset against a column spec, and
//! `graph stats` summarizes a cluster graph.

pub mod cli;
pub mod manifest;
