mod cli;

use solconf::overrides::{cast_overrides, merge_overrides, OverrideSpec};
use solconf::value::Value;
use solconf::var_path::VarPath;
use solconf::{ConfigOptions, LoaderContext};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("SOLCONF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Evaluate(eval_cli) => evaluate(eval_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn evaluate(cli: cli::EvaluateCommand) -> anyhow::Result<()> {
    let overrides = overrides(&cli.input)?;

    let context = LoaderContext::default();
    let value = context.load_config(
        &cli.input.config,
        ConfigOptions {
            package_name: cli.input.package_name.clone(),
            overrides,
            ..Default::default()
        },
    )?;

    let value = match &cli.select {
        Some(path) => VarPath::parse(path)?.get(&value)?,
        None => value,
    };

    output(&cli.output, &value)?;
    Ok(())
}

/// Overrides from the overrides file, refined by the command line
fn overrides(input: &cli::InputArgs) -> anyhow::Result<Vec<OverrideSpec>> {
    let cli_specs = input.overrides.iter().map(|spec| OverrideSpec::from(spec.as_str()));

    let Some(path) = &input.overrides_file else {
        return Ok(cli_specs.collect());
    };

    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read overrides file {}: {e}", path.display()))?;
    let merged = merge_overrides([OverrideSpec::from(text)], cli_specs)?;
    Ok(merged.into_iter().map(OverrideSpec::from).collect())
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}

/// developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    match cli.command {
        Overrides { specs } => {
            let overrides = cast_overrides(specs.into_iter().map(OverrideSpec::from))?;
            println!("{overrides:#?}");
        }
        Module { config } => {
            let context = LoaderContext::default();
            let module = context.load_config(
                &config,
                ConfigOptions {
                    resolve: false,
                    ..Default::default()
                },
            )?;
            println!("{module:#?}");
        }
    }

    Ok(())
}
