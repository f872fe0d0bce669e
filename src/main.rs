//! viper-transform - compile modules and bundles with the OXC reference compiler

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use viper_transform::bundler::{bundle, BundleConfig};
use viper_transform::compiler::{Compiler, HelpersOutput};
use viper_transform::config::{OutputFormat, PluginOptions};
use viper_transform::plugin::{PluginContext, Session};
use viper_transform::transpiler::OxcCompiler;

#[derive(Parser)]
#[command(name = "viper-transform")]
#[command(author, version, about = "Compile bundler modules and chunks with deduplicated helpers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one module the way the input plugin would
    Transform {
        /// Module to compile
        input: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Plugin options as a JSON file
        #[arg(long)]
        options: Option<PathBuf>,
        /// Write the source map next to the output
        #[arg(long)]
        map: bool,
    },
    /// Verify the compiler configuration of a module and print its helper strategy
    Check {
        /// Module whose configuration is checked
        input: PathBuf,
        /// Plugin options as a JSON file
        #[arg(long)]
        options: Option<PathBuf>,
    },
    /// Bundle entry modules into one chunk
    Bundle {
        /// Entry point file(s)
        #[arg(required = true)]
        entry: Vec<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format (es, cjs, amd, iife, umd, system)
        #[arg(long, default_value = "es")]
        format: OutputFormat,
        /// Global name for iife and umd bundles
        #[arg(long)]
        name: Option<String>,
        /// Input plugin options as a JSON file
        #[arg(long)]
        options: Option<PathBuf>,
        /// Also compile the finished chunk, with these output plugin options
        #[arg(long)]
        output_options: Option<PathBuf>,
    },
    /// Print the helper definitions as a standalone file
    Helpers {
        /// Only these helpers (and their dependencies)
        #[arg(long, value_delimiter = ',')]
        whitelist: Option<Vec<String>>,
        /// Shape of the generated file
        #[arg(long, value_enum, default_value = "module")]
        output_type: HelpersType,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HelpersType {
    Module,
    Global,
    Var,
}

impl From<HelpersType> for HelpersOutput {
    fn from(value: HelpersType) -> Self {
        match value {
            HelpersType::Module => HelpersOutput::Module,
            HelpersType::Global => HelpersOutput::Global,
            HelpersType::Var => HelpersOutput::Var,
        }
    }
}

/// Reports plugin warnings on stderr
struct ConsoleContext;

impl PluginContext for ConsoleContext {
    fn warn(&self, message: &str) {
        eprintln!("{}: {}", "Warning".yellow(), message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            input,
            output,
            options,
            map,
        } => transform_file(&input, output.as_deref(), options.as_deref(), map).await,
        Commands::Check { input, options } => check_file(&input, options.as_deref()),
        Commands::Bundle {
            entry,
            output,
            format,
            name,
            options,
            output_options,
        } => {
            let config = BundleConfig {
                entries: entry,
                format,
                name,
                file_name: output
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "bundle.js".to_string()),
                ..Default::default()
            };
            bundle_files(config, output.as_deref(), options.as_deref(), output_options.as_deref()).await
        }
        Commands::Helpers {
            whitelist,
            output_type,
        } => {
            let code = OxcCompiler::new().build_external_helpers(whitelist.as_deref(), output_type.into());
            println!("{}", code);
            Ok(())
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<PluginOptions> {
    match path {
        Some(path) => Ok(PluginOptions::from_file(path)?),
        None => Ok(PluginOptions::default()),
    }
}

fn module_id(path: &Path) -> Result<String> {
    let path = std::fs::canonicalize(path).into_diagnostic()?;
    Ok(path.to_string_lossy().into_owned())
}

fn session() -> Session {
    Session::new(Arc::new(OxcCompiler::new()))
}

/// Compile a single module
async fn transform_file(
    input: &Path,
    output: Option<&Path>,
    options: Option<&Path>,
    map: bool,
) -> Result<()> {
    let plugin = session().input_plugin(load_options(options)?)?;
    let id = module_id(input)?;
    let source = tokio::fs::read_to_string(&id).await.into_diagnostic()?;

    let Some(result) = plugin.transform(&ConsoleContext, &source, &id).await? else {
        eprintln!(
            "{}: {} is not handled by the configured filters",
            "Info".cyan(),
            input.display()
        );
        println!("{}", source);
        return Ok(());
    };

    match output {
        Some(output_path) => {
            std::fs::write(output_path, &result.code).into_diagnostic()?;
            if let (true, Some(source_map)) = (map, &result.map) {
                let map_path = PathBuf::from(format!("{}.map", output_path.display()));
                std::fs::write(&map_path, source_map).into_diagnostic()?;
            }
            println!(
                "{}: Compiled {} -> {}",
                "Success".green(),
                input.display(),
                output_path.display()
            );
        }
        None => println!("{}", result.code),
    }
    Ok(())
}

/// Run the preflight check for a module's configuration
fn check_file(input: &Path, options: Option<&Path>) -> Result<()> {
    let plugin = session().input_plugin(load_options(options)?)?;
    let id = module_id(input)?;

    match plugin.check(&id)? {
        Some(strategy) => println!(
            "{}: {} uses {:?} helpers",
            "Success".green(),
            input.display(),
            strategy
        ),
        None => println!(
            "{}: {} is excluded by the compiler configuration",
            "Info".cyan(),
            input.display()
        ),
    }
    Ok(())
}

/// Bundle entries, optionally compiling the chunk again
async fn bundle_files(
    config: BundleConfig,
    output: Option<&Path>,
    options: Option<&Path>,
    output_options: Option<&Path>,
) -> Result<()> {
    let session = session();
    let input = session.input_plugin(load_options(options)?)?;
    let output_plugin = match output_options {
        Some(path) => Some(session.output_plugin(PluginOptions::from_file(path)?)?),
        None => None,
    };

    eprintln!("{}: Bundling...", "Info".cyan());
    eprintln!("  Entry points: {}", config.entries.len());
    eprintln!("  Format: {}", config.format);

    let bundled = bundle(&config, &ConsoleContext, &input, output_plugin.as_ref()).await?;

    match output {
        Some(out_path) => {
            if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).into_diagnostic()?;
            }
            std::fs::write(out_path, &bundled.code).into_diagnostic()?;
            if let Some(map) = &bundled.map {
                let map_path = PathBuf::from(format!("{}.map", out_path.display()));
                std::fs::write(map_path, map).into_diagnostic()?;
            }
            eprintln!(
                "{}: Bundle written to {}",
                "Success".green(),
                out_path.display()
            );
            eprintln!("  Modules: {}", bundled.modules.len());
            eprintln!("  Size: {} bytes", bundled.code.len());
        }
        None => println!("{}", bundled.code),
    }
    Ok(())
}
