//! Association-rule classification of viral proteins by short amino-acid
//! repeat motifs.
//!
//! Each repeat is turned into a basket of categorical items (positional
//! residues, length bucket, n-grams, residue composition, repeat type).
//! FP-growth mines rules predicting a single virus, and a basket is
//! classified by the best matching rule or, failing that, by the majority
//! training label.

pub mod analysis;
pub mod baseline;
pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data_handling;
pub mod features;
pub mod helper_functions;
pub mod mining;
pub mod models;
