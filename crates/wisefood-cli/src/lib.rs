//! wisefood CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// wisefood - deployment manifests for the wisefood platform
#[derive(Parser, Debug)]
#[command(name = "wisefood")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the manifests of a deployment
    Render(commands::render::RenderArgs),
    /// Check a deployment configuration without writing manifests
    Validate(commands::validate::ValidateArgs),
    /// List the platform components in generation order
    Components,
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => commands::render::run(args),
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Components => commands::components::run(),
        }
    }
}
