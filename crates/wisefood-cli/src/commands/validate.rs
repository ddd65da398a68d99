//! Validate command
//!
//! Parses the configuration and runs a full composition without writing
//! anything, so missing secret identifiers surface before deploy time.

use std::path::PathBuf;

use clap::Args;
use wisefood_compiler::{compose, default_generators, ResourceSet};

use super::{load_config, load_model};
use crate::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Deployment configuration file
    #[arg(short, long, env = "WISEFOOD_CONFIG")]
    pub config: PathBuf,

    /// Platform model file (built-in model if not specified)
    #[arg(short, long)]
    pub model: Option<PathBuf>,
}

/// Compose every component and return the result
pub fn validate(args: &ValidateArgs) -> Result<ResourceSet> {
    let config = load_config(&args.config)?;
    let model = load_model(args.model.as_deref())?;
    Ok(compose(&model, &config, &default_generators())?)
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let set = validate(&args)?;

    println!("Configuration: {}", args.config.display());
    println!("Resources:     {}", set.len());
    println!("Workloads:     {}", set.workload_count());
    println!("Routes:        {}", set.count_kind("Ingress"));
    println!();
    println!("All validations passed");
    Ok(())
}
