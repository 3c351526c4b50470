//! delivman CLI - delivery documentation for component trees.

mod builtin;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use delivman_core::{ComponentId, Parameter, Partition, PluginRegistry, SettingsStore, ValueCell};
use delivman_storage::settings_file::{
    general_settings_path, load_if_present, project_settings_path, user_settings_path,
};
use delivman_storage::{EngineConfig, ProjectContext, SettingsFiles};

use crate::builtin::{TextPlugin, TEXT_PLUGIN};

#[derive(Parser)]
#[command(name = "delivman")]
#[command(about = "Document what changed in each delivery", long_about = None)]
struct Cli {
    /// Project file
    #[arg(long, global = true, default_value = "delivman.json")]
    project: PathBuf,

    /// Accept project files written by older tools
    #[arg(long, global = true)]
    legacy: bool,

    /// Withdraw a delivery when any plugin fails to collect it
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty project file
    Init,
    /// Add a component; parents are given as a slash-separated path
    AddComponent {
        /// Component path, e.g. server/api
        path: String,
        /// Hide the component from customer documents
        #[arg(long)]
        internal: bool,
    },
    /// Add a delivery and collect information for every component
    AddDelivery {
        /// Delivery name
        name: String,
        /// Person who integrated the delivery
        #[arg(long)]
        integrator: Option<String>,
        /// Creation time (RFC 3339), defaults to now
        #[arg(long)]
        created: Option<DateTime<Utc>>,
    },
    /// Remove a delivery and everything recorded for it
    RemoveDelivery {
        /// Delivery name
        name: String,
    },
    /// List deliveries and components
    List,
    /// Show a component, or what changed in a delivery
    Show {
        /// Component path
        #[arg(long, conflicts_with = "delivery")]
        component: Option<String>,
        /// Delivery name
        #[arg(long)]
        delivery: Option<String>,
    },
    /// Configure how a component is documented
    Set {
        /// Component path
        component: String,
        /// Plugin name
        #[arg(long, default_value = TEXT_PLUGIN)]
        plugin: String,
        /// Strategy to select
        #[arg(long)]
        strategy: Option<String>,
        /// Strategy parameter
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// Read or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective value of a setting
    Get {
        /// Setting name
        name: String,
    },
    /// Store a setting
    Set {
        /// Setting name
        name: String,
        /// Value: true/false, an integer or text
        value: String,
        /// Where to store it
        #[arg(long, value_enum, default_value = "user")]
        scope: Scope,
    },
    /// List the settings of every partition
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    User,
    Project,
}

impl From<Scope> for Partition {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::User => Partition::User,
            Scope::Project => Partition::Project,
        }
    }
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

fn init_logging() -> LogHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

/// Replace the log filter with the configured one unless RUST_LOG is set.
fn apply_log_filter(handle: &LogHandle, settings: &SettingsStore) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    let Some(directives) = settings.log_filter() else {
        return;
    };
    match EnvFilter::try_new(directives) {
        Ok(filter) => {
            if let Err(e) = handle.reload(filter) {
                warn!("cannot apply log filter: {}", e);
            }
        }
        Err(e) => warn!("invalid log filter '{}': {}", directives, e),
    }
}

async fn load_settings(settings: &mut SettingsStore) {
    match general_settings_path() {
        Ok(path) => {
            if let Err(e) = load_if_present(settings, &path, Partition::General).await {
                warn!("ignoring {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("cannot locate general settings: {}", e),
    }
    if let Some(path) = user_settings_path() {
        if let Err(e) = load_if_present(settings, &path, Partition::User).await {
            warn!("ignoring {}: {}", path.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log = init_logging();
    let cli = Cli::parse();

    let mut plugins = PluginRegistry::new();
    plugins.register(Arc::new(TextPlugin));
    let config = EngineConfig {
        legacy: cli.legacy,
        rollback_on_failure: cli.strict,
        ..Default::default()
    };
    let mut ctx = ProjectContext::new(plugins, config);
    load_settings(ctx.settings_mut()).await;
    apply_log_filter(&log, ctx.settings());

    if let Commands::Init = cli.command {
        if cli.project.exists() {
            bail!("{} already exists", cli.project.display());
        }
        ctx.save(&cli.project).await?;
        println!("Created {}", cli.project.display());
        return Ok(());
    }

    let missing = ctx
        .load(&cli.project)
        .await
        .with_context(|| format!("cannot open {}", cli.project.display()))?;
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(String::as_str).collect();
        println!("Plugins not available, their data is kept: {}", names.join(", "));
    }
    apply_log_filter(&log, ctx.settings());

    run(cli.command, &mut ctx, &cli.project).await?;

    if ctx.is_dirty() {
        ctx.save(&cli.project).await?;
        info!("Saved {}", cli.project.display());
    }
    Ok(())
}

async fn run(command: Commands, ctx: &mut ProjectContext, project: &Path) -> Result<()> {
    match command {
        Commands::Init => {}
        Commands::AddComponent { path, internal } => {
            let names = split_path(&path);
            let Some((name, parents)) = names.split_last() else {
                bail!("empty component path");
            };
            let parent = if parents.is_empty() {
                ctx.tree().root()
            } else {
                find_component(ctx, &parents.join("/"))?
            };
            if ctx.tree().find_child(parent, name).is_some() {
                bail!("component '{}' already exists", path);
            }
            let id = ctx.create_component(parent, name)?;
            if internal {
                if let Some(component) = ctx.tree_mut().get_mut(id) {
                    component.customer_relevant = false;
                }
            }
            println!("Added component {}", names.join("/"));
        }
        Commands::AddDelivery {
            name,
            integrator,
            created,
        } => {
            let integrator = integrator
                .or_else(|| std::env::var("USER").ok())
                .unwrap_or_else(|| "unknown".to_string());
            let created = created.unwrap_or_else(Utc::now);
            let report = ctx.add_delivery(&name, &integrator, created).await?;
            println!("Added delivery {}: {}", name, report);
        }
        Commands::RemoveDelivery { name } => {
            ctx.remove_delivery(&name)?;
            println!("Removed delivery {}", name);
        }
        Commands::List => list(ctx),
        Commands::Show {
            component,
            delivery,
        } => match (component, delivery) {
            (Some(path), _) => show_component(ctx, &path).await?,
            (None, Some(delivery)) => show_delivery(ctx, &delivery)?,
            (None, None) => bail!("give --component or --delivery"),
        },
        Commands::Set {
            component,
            plugin,
            strategy,
            params,
        } => {
            let id = find_component(ctx, &component)?;
            if let Some(strategy) = strategy {
                ctx.select_strategy(id, &plugin, &strategy)?;
            }
            for param in params {
                let Some((name, value)) = param.split_once('=') else {
                    bail!("parameter '{}' is not NAME=VALUE", param);
                };
                ctx.set_parameter(id, &plugin, Parameter::new(name, parse_value(value)))?;
            }
        }
        Commands::Settings { action } => settings(ctx, action, project).await?,
    }
    Ok(())
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn find_component(ctx: &ProjectContext, path: &str) -> Result<ComponentId> {
    ctx.tree()
        .find_by_path(&split_path(path))
        .with_context(|| format!("no component '{}'", path))
}

/// Parse a command-line value: booleans and integers keep their kind.
fn parse_value(text: &str) -> ValueCell {
    if let Ok(b) = text.parse::<bool>() {
        ValueCell::Boolean(b)
    } else if let Ok(i) = text.parse::<i64>() {
        ValueCell::Integer(i)
    } else {
        ValueCell::String(text.to_string())
    }
}

fn list(ctx: &ProjectContext) {
    println!("Deliveries ({})", ctx.deliveries().len());
    for delivery in ctx.deliveries() {
        println!(
            "  {} | {} | {}",
            delivery.name,
            delivery.integrator,
            delivery.created.format("%Y-%m-%d %H:%M")
        );
    }

    println!("Components ({})", ctx.tree().len());
    let tree = ctx.tree();
    for id in tree.descendants(tree.root()) {
        let Some(component) = tree.get(id) else { continue };
        let depth = tree.ancestors(id).count();
        let marker = if component.customer_relevant { "" } else { " (internal)" };
        println!("{}{}{}", "  ".repeat(depth), component.name(), marker);
    }
}

async fn show_component(ctx: &mut ProjectContext, path: &str) -> Result<()> {
    let id = find_component(ctx, path)?;
    let plugins: Vec<String> = ctx.plugins().names().map(str::to_string).collect();
    let deliveries: Vec<String> = ctx.deliveries().iter().map(|d| d.name.clone()).collect();

    let component = ctx
        .tree()
        .get(id)
        .with_context(|| format!("no component '{}'", path))?;
    println!("Component: {}", path);
    println!("  Customer relevant: {}", component.customer_relevant);
    for (plugin, state) in &component.importers {
        println!("  {} [{}]", plugin, state.strategy);
        for parameter in &state.parameters {
            println!("    {} = {}", parameter.name, parameter.value);
        }
    }

    for delivery in &deliveries {
        for plugin in &plugins {
            let info = ctx.delivery_information(id, delivery, plugin).await?;
            let marker = if info.is_new { "*" } else { " " };
            println!("  {} {} [{}]: {}", marker, delivery, plugin, info.content);
        }
    }
    Ok(())
}

fn show_delivery(ctx: &ProjectContext, name: &str) -> Result<()> {
    let delivery = ctx
        .deliveries()
        .get(name)
        .with_context(|| format!("no delivery '{}'", name))?;
    println!("Delivery: {}", delivery.name);
    println!("  Integrator: {}", delivery.integrator);
    println!("  Created: {}", delivery.created);

    let changed = ctx.new_deliveries_for(name)?;
    println!("  Changed components ({})", changed.len());
    for entry in changed {
        let content = ctx
            .tree()
            .get(entry.component)
            .and_then(|c| c.info(name, &entry.plugin))
            .map(|info| info.content.to_string())
            .unwrap_or_default();
        println!("    {} [{}]: {}", entry.path.join("/"), entry.plugin, content);
    }
    Ok(())
}

async fn settings(ctx: &mut ProjectContext, action: SettingsAction, project: &Path) -> Result<()> {
    match action {
        SettingsAction::Get { name } => match ctx.settings().get(&name) {
            Some(value) => println!("{}", value),
            None => bail!("setting '{}' is not set", name),
        },
        SettingsAction::Set { name, value, scope } => {
            let partition = Partition::from(scope);
            let path = match partition {
                Partition::User => user_settings_path().context("no user configuration directory")?,
                _ => project_settings_path(project),
            };
            let settings = ctx.settings_mut();
            settings.add(name.as_str(), parse_value(&value), &[partition]);
            settings.save(&path, partition).await?;
            println!("{} = {} ({})", name, value, partition);
        }
        SettingsAction::List => {
            for partition in Partition::PRECEDENCE {
                let entries = ctx.settings().partition(partition);
                if entries.is_empty() {
                    continue;
                }
                println!("{}:", partition);
                for (name, value) in entries {
                    println!("  {} = {}", name, value);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), ValueCell::Boolean(true));
        assert_eq!(parse_value("-3"), ValueCell::Integer(-3));
        assert_eq!(parse_value("v1.2"), ValueCell::String("v1.2".into()));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/server//api/"), vec!["server", "api"]);
    }
}
