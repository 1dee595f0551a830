//! # omics-statistics
//!
//! A Rust library for differential abundance analysis of quantitative proteomics and
//! phosphoproteomics tables, such as TMT-labelled Proteome Discoverer exports.
//!
//! The crate turns a tab-separated protein or peptide table into a ranked list of
//! analytes that differ between two sample groups. Each stage is a plain function that
//! takes its input and explicit parameters and returns a new table, so any
//! intermediate result can be inspected.
//!
//! ## Core Features
//!
//! - **Loading**: tab-separated tables with normalized header names
//! - **Filtering**: column allow-lists, missing-value filter, quality predicates for
//!   protein and peptide tables
//! - **Annotation**: gene names parsed from UniProt-style descriptions, reference gene
//!   set flags
//! - **Normalization**: per-sample total-abundance equalization
//! - **Testing**: per-row linear models with empirical-Bayes moderated t statistics,
//!   ordinary t-tests, and multiple testing correction
//!
//! ## Quick Start
//!
//! [`pipeline::run_protein_pipeline`] chains every protein stage using a
//! [`config::PipelineConfig`]. The stages can also be called one by one, and the
//! [`testing::inference::DifferentialAbundance`] trait runs the tests on any
//! [`data::groups::ExpressionMatrix`].
//!
//! ## Module Organization
//!
//! - **[`data`]**: Loading, filtering, annotation, normalization and design matrices
//! - **[`testing`]**: Statistical tests, variance moderation and multiple testing correction
//! - **[`config`]**: Column specs, thresholds and group assignment, loadable from TOML
//! - **[`pipeline`]**: End-to-end protein and peptide runs

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod testing;

pub use error::{OmicsError, Result};
