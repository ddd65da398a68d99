//! Render command

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wisefood_compiler::{compose, default_generators, select_generators};

use super::{load_config, load_model, OutputFormat};
use crate::Result;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Deployment configuration file
    #[arg(short, long, env = "WISEFOOD_CONFIG")]
    pub config: PathBuf,

    /// Platform model file (built-in model if not specified)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Only render these components (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Write manifests to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Compose the deployment and serialize it
pub fn render(args: &RenderArgs) -> Result<String> {
    let config = load_config(&args.config)?;
    let model = load_model(args.model.as_deref())?;
    let generators = if args.only.is_empty() {
        default_generators()
    } else {
        select_generators(args.only.as_slice())?
    };

    let set = compose(&model, &config, &generators)?;
    let rendered = match args.format {
        OutputFormat::Yaml => set.to_yaml()?,
        OutputFormat::Json => set.to_json()?,
    };
    Ok(rendered)
}

pub fn run(args: RenderArgs) -> Result<()> {
    let rendered = render(&args)?;
    match args.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)?;
            info!(path = %path.display(), "wrote manifests");
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{write, CONFIG};
    use crate::Error;

    fn args(config: PathBuf) -> RenderArgs {
        RenderArgs {
            config,
            model: None,
            only: Vec::new(),
            format: OutputFormat::Yaml,
            output: None,
        }
    }

    #[test]
    fn renders_every_component_as_yaml() {
        let (_dir, path) = write(CONFIG, "demo.yaml");
        let yaml = render(&args(path)).unwrap();
        assert!(yaml.contains("kind: StatefulSet"));
        assert!(yaml.contains("name: platform-init"));
        assert!(yaml.starts_with("apiVersion:"));
    }

    #[test]
    fn only_limits_components() {
        let (_dir, path) = write(CONFIG, "demo.yaml");
        let mut args = args(path);
        args.only = vec!["cache".to_string()];
        args.format = OutputFormat::Json;

        let json = render(&args).unwrap();
        assert!(json.contains("\"redis\""));
        assert!(!json.contains("keycloak"));
    }

    #[test]
    fn unknown_component_is_rejected() {
        let (_dir, path) = write(CONFIG, "demo.yaml");
        let mut args = args(path);
        args.only = vec!["mailer".to_string()];
        assert!(matches!(render(&args), Err(Error::Compile(_))));
    }

    #[test]
    fn writes_output_file() {
        let (dir, path) = write(CONFIG, "demo.yaml");
        let output = dir.path().join("out.yaml");
        let mut args = args(path);
        args.output = Some(output.clone());

        run(args).unwrap();
        let written = std::fs::read_to_string(output).unwrap();
        assert!(written.contains("kind: Deployment"));
    }
}
