use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use indexmap::IndexMap;

use bpo_core::config::{self, BpoConfig, CONFIG_FILE_NAME};
use bpo_core::model::to_json_pretty;
use bpo_core::transform::{Diagnostic, DuplicatePolicy, FlattenOptions, PathIndex};
use bpo_core::{Blueprint, FlatBlueprint};

#[derive(Parser)]
#[command(
    name = "bpo",
    about = "Flatten extraction blueprints for optimization and rebuild them",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a nested blueprint into flat-path fields and a path index
    Flatten {
        /// Blueprint to flatten
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the flat blueprint
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Where to write the path index
        #[arg(long)]
        index: Option<PathBuf>,

        /// How to handle two fields that flatten to the same path
        #[arg(long)]
        duplicates: Option<DuplicateArg>,
    },

    /// Rebuild a nested blueprint from a flat one and its path index
    Unflatten {
        /// Flat blueprint
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Path index written by `bpo flatten`
        #[arg(long)]
        index: Option<PathBuf>,

        /// Where to write the rebuilt blueprint
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the instruction of one field in a flat blueprint
    SetInstruction {
        /// Flat blueprint, updated in place
        #[arg(short, long)]
        input: PathBuf,

        /// Flat field name, e.g. `customer.name`
        #[arg(long)]
        field: String,

        /// New instruction text
        #[arg(long)]
        instruction: String,
    },

    /// Show how a blueprint flattens
    Inspect {
        /// Blueprint to inspect
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: InspectFormat,
    },

    /// Initialize a new bpo configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum InspectFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DuplicateArg {
    Reject,
    LastWriteWins,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Reject => DuplicatePolicy::Reject,
            DuplicateArg::LastWriteWins => DuplicatePolicy::LastWriteWins,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Flatten {
            input,
            output,
            index,
            duplicates,
        } => cmd_flatten(input, output, index, duplicates),

        Commands::Unflatten {
            input,
            index,
            output,
        } => cmd_unflatten(input, index, output),

        Commands::SetInstruction {
            input,
            field,
            instruction,
        } => cmd_set_instruction(input, &field, &instruction),

        Commands::Inspect { input, format } => cmd_inspect(input, format),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "bpo", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Try to load the project config file from the current directory.
fn try_load_config() -> Result<Option<BpoConfig>> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    let loaded = config::load_config(&config_path).map_err(|e| anyhow::anyhow!(e))?;
    if loaded.is_none() {
        log::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
    }
    Ok(loaded)
}

fn load_blueprint(path: &Path) -> Result<Blueprint> {
    Blueprint::load(path).with_context(|| format!("failed to load blueprint {}", path.display()))
}

fn load_index(path: &Path) -> Result<PathIndex> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse path index {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("  wrote {}", path.display());
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let level = if diagnostic.is_lossy() { "warning" } else { "note" };
        eprintln!("  {level}: {diagnostic}");
    }
}

fn cmd_flatten(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    index: Option<PathBuf>,
    duplicates: Option<DuplicateArg>,
) -> Result<()> {
    let cfg = try_load_config()?.unwrap_or_default();
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let output = output.unwrap_or_else(|| PathBuf::from(&cfg.flat_output));
    let index_path = index.unwrap_or_else(|| PathBuf::from(&cfg.index_output));

    let mut options = FlattenOptions::from(&cfg.flatten);
    if let Some(duplicates) = duplicates {
        options.duplicate_paths = duplicates.into();
    }

    let blueprint = load_blueprint(&input)?;
    eprintln!("Flattening {}", input.display());
    let flattened = blueprint.flatten_for_optimization(&options)?;
    print_diagnostics(&flattened.diagnostics);

    write_file(&output, &flattened.blueprint.to_json_pretty()?)?;
    write_file(&index_path, &to_json_pretty(&flattened.index)?)?;

    if flattened.index.is_empty() {
        eprintln!("Blueprint was already flat; index is empty.");
    }
    eprintln!(
        "Flattened into {} fields ({} diagnostics)",
        flattened.blueprint.properties.len(),
        flattened.diagnostics.len()
    );
    Ok(())
}

fn cmd_unflatten(
    input: Option<PathBuf>,
    index: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let cfg = try_load_config()?.unwrap_or_default();
    let input = input.unwrap_or_else(|| PathBuf::from(&cfg.flat_output));
    let index_path = index.unwrap_or_else(|| PathBuf::from(&cfg.index_output));
    let output = output.unwrap_or_else(|| PathBuf::from(&cfg.output));

    let flat = FlatBlueprint::load(&input)
        .with_context(|| format!("failed to load flat blueprint {}", input.display()))?;
    let index = load_index(&index_path)?;

    eprintln!("Rebuilding {}", input.display());
    let rebuilt = Blueprint::unflatten_from_optimization(&flat, &index)?;
    print_diagnostics(&rebuilt.diagnostics);
    write_file(&output, &rebuilt.blueprint.to_json_pretty()?)?;
    eprintln!(
        "Rebuilt {} top-level properties ({} diagnostics)",
        rebuilt.blueprint.properties.len(),
        rebuilt.diagnostics.len()
    );
    Ok(())
}

fn cmd_set_instruction(input: PathBuf, field: &str, instruction: &str) -> Result<()> {
    let mut flat = FlatBlueprint::load(&input)
        .with_context(|| format!("failed to load flat blueprint {}", input.display()))?;

    if !flat.update_instruction(field, instruction) {
        anyhow::bail!("no field named '{}' in {}", field, input.display());
    }

    flat.save(&input)
        .with_context(|| format!("failed to write {}", input.display()))?;
    eprintln!("Updated instruction for '{}'", field);
    Ok(())
}

fn cmd_inspect(input: PathBuf, format: InspectFormat) -> Result<()> {
    let options = try_load_config()?
        .map(|cfg| FlattenOptions::from(&cfg.flatten))
        .unwrap_or_default();
    let blueprint = load_blueprint(&input)?;
    let flattened = blueprint.flatten_for_optimization(&options)?;

    let mut diagnostic_counts: IndexMap<String, usize> = IndexMap::new();
    for diagnostic in &flattened.diagnostics {
        let kind = serde_json::to_value(&diagnostic.kind)?
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown")
            .to_string();
        *diagnostic_counts.entry(kind).or_default() += 1;
    }

    let fields: Vec<serde_json::Value> = flattened
        .blueprint
        .properties
        .iter()
        .map(|(name, field)| {
            serde_json::json!({
                "name": name,
                "path": flattened.index.get(name).map(ToString::to_string),
                "type": field.field_type,
                "inference_type": field.inference_type,
            })
        })
        .collect();

    let summary = serde_json::json!({
        "class": blueprint.class,
        "description": blueprint.description,
        "nested": blueprint.is_nested(),
        "definitions": blueprint.definitions.keys().collect::<Vec<_>>(),
        "fields": fields,
        "diagnostic_counts": diagnostic_counts,
        "diagnostics": flattened.diagnostics,
    });

    match format {
        InspectFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{}", yaml);
        }
        InspectFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
