//! `processing-config` CLI entry-point.
//!
//! Available sub-commands:
//! - `init`: combine a base definition with an optional overlay and create it.
//! - `combine`: print the merged definition without touching the store.
//! - `validate`: check a definition offline.
//! - `remove`: delete every workflow with a given name.
//! - `list`: print the project's workflows.
//! - `seed-action-types`: register action types from a JSON file.
//!
//! The configuration store lives in a JSON snapshot (`CONFIG_STORE_PATH`) that
//! is loaded before and saved after every mutating command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{
    ActionType, ConfigService, EngineConfig, EngineError, MemoryConfigStore, NameResolvers,
    PageRequest, StoreActionTypeCatalog, WorkflowDefinition, WorkflowLifecycleManager,
};
use resolvers::{
    ActionTypeNameResolver, BoilerplateNameResolver, ClassificationWorkflowNameResolver,
    ReferenceCatalog,
};

#[derive(Debug, Parser)]
#[command(
    name = "processing-config",
    about = "Initialise and inspect processing workflow configuration",
    version
)]
struct Cli {
    /// Project the workflows belong to.
    #[arg(long, env = "PROJECT_ID", global = true, default_value = "default")]
    project_id: String,

    /// JSON snapshot of the configuration store.
    #[arg(
        long,
        env = "CONFIG_STORE_PATH",
        global = true,
        default_value = "processing-config.json"
    )]
    store: PathBuf,

    /// Classification workflow, expression and tag names to resolve against.
    #[arg(long, env = "REFERENCE_CATALOG_FILE", global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a workflow from a base definition and an optional overlay.
    Init {
        #[arg(long, env = "WORKFLOW_BASE_DATA_FILE")]
        base: PathBuf,
        #[arg(long, env = "WORKFLOW_OVERLAY_FILE")]
        overlay: Option<PathBuf>,
        /// Remove existing workflows with the same name first.
        #[arg(long, env = "OVERWRITE_EXISTING", default_value_t = true, action = ArgAction::Set)]
        overwrite_existing: bool,
    },
    /// Print the merged definition.
    Combine {
        #[arg(long, env = "WORKFLOW_BASE_DATA_FILE")]
        base: PathBuf,
        #[arg(long, env = "WORKFLOW_OVERLAY_FILE")]
        overlay: PathBuf,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Delete every workflow with this name.
    Remove { name: String },
    /// Print the project's workflows.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 100)]
        page_size: u32,
    },
    /// Register the action types listed in a JSON array.
    SeedActionTypes { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let output = run(cli)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Execute one command and return what it prints.
fn run(cli: Cli) -> Result<String> {
    match cli.command {
        Command::Combine { base, overlay } => {
            let mut combined = read_definition(&base)?;
            engine::combine_workflows(&mut combined, &read_definition(&overlay)?);
            Ok(serde_json::to_string_pretty(&combined)?)
        }
        Command::Validate { path } => {
            let definition = read_definition(&path)?;
            let conditions = validate_definition(&definition, EngineConfig::default().max_condition_depth)?;
            Ok(format!(
                "Definition '{}' is valid ({} processing rules, {} conditions)",
                definition.name,
                definition.processing_rules.len(),
                conditions
            ))
        }
        command => {
            let store = Arc::new(
                MemoryConfigStore::load_or_default(&cli.store)
                    .with_context(|| format!("cannot open store {}", cli.store.display()))?,
            );
            let service = Arc::new(ConfigService::new(store.clone(), EngineConfig::default()));
            let output = run_against_store(command, &cli.project_id, cli.catalog.as_deref(), &service)?;
            store
                .save(&cli.store)
                .with_context(|| format!("cannot save store {}", cli.store.display()))?;
            Ok(output)
        }
    }
}

fn run_against_store(
    command: Command,
    project_id: &str,
    catalog: Option<&Path>,
    service: &Arc<ConfigService>,
) -> Result<String> {
    match command {
        Command::Init {
            base,
            overlay,
            overwrite_existing,
        } => {
            let base = read_definition(&base)?;
            let overlay = overlay.as_deref().map(read_definition).transpose()?;
            let manager = lifecycle_manager(service, catalog)?;
            let workflow_id = manager
                .create_from_definitions(base, overlay.as_ref(), project_id, overwrite_existing)
                .context("workflow initialisation failed")?;
            info!("Workflow initialised with id {workflow_id}");
            Ok(workflow_id.to_string())
        }
        Command::Remove { name } => {
            let removed = lifecycle_manager(service, catalog)?.remove_matching(project_id, &name)?;
            Ok(format!("Removed {removed} workflow(s) named '{name}'"))
        }
        Command::List { page, page_size } => {
            let page = service.page_workflows(project_id, PageRequest::new(page, page_size)?)?;
            Ok(serde_json::to_string_pretty(&page)?)
        }
        Command::SeedActionTypes { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let action_types: Vec<ActionType> = serde_json::from_str(&text)
                .with_context(|| format!("invalid action type list {}", path.display()))?;

            let mut created = 0;
            for action_type in action_types {
                let internal_name = action_type.internal_name.clone();
                match service.create_action_type(project_id, action_type) {
                    Ok(_) => created += 1,
                    Err(EngineError::Conflict(_)) => {
                        warn!("Action type '{internal_name}' already exists, skipping")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(format!("Registered {created} action type(s)"))
        }
        Command::Combine { .. } | Command::Validate { .. } => {
            bail!("command does not use the configuration store")
        }
    }
}

fn read_definition(path: &Path) -> Result<WorkflowDefinition> {
    Ok(WorkflowDefinition::from_path(path)?)
}

fn lifecycle_manager(
    service: &Arc<ConfigService>,
    catalog: Option<&Path>,
) -> Result<WorkflowLifecycleManager> {
    let catalog = match catalog {
        Some(path) => ReferenceCatalog::from_path(path)
            .with_context(|| format!("cannot load reference catalog {}", path.display()))?,
        None => ReferenceCatalog::default(),
    };
    let catalog = Arc::new(catalog);

    let resolvers = NameResolvers::new(
        Arc::new(ActionTypeNameResolver::new(Arc::new(StoreActionTypeCatalog::new(
            service.store().clone(),
        )))),
        Arc::new(ClassificationWorkflowNameResolver::new(catalog.clone())),
        Arc::new(BoilerplateNameResolver::new(catalog)),
    );
    Ok(WorkflowLifecycleManager::new(service.clone(), resolvers))
}

/// Offline checks: every action names a type and every condition builds.
/// Returns the number of conditions checked.
fn validate_definition(definition: &WorkflowDefinition, max_depth: usize) -> Result<usize> {
    let mut conditions = 0;
    for rule in &definition.processing_rules {
        for action in &rule.actions {
            if action.type_id.is_none() && action.type_name.is_none() {
                bail!(
                    "action '{}' of rule '{}' needs a typeId or a typeName",
                    action.name,
                    rule.name
                );
            }
        }
        let all = rule
            .rule_conditions
            .iter()
            .chain(rule.actions.iter().flat_map(|action| &action.action_conditions));
        for condition in all {
            condition
                .to_condition(max_depth)
                .with_context(|| format!("rule '{}'", rule.name))?;
            conditions += 1;
        }
    }
    Ok(conditions)
}
