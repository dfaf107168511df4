use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stateful_deploy::events::{EventSink, FanoutSink, JsonLinesSink, Reporter, TracingSink};
use stateful_deploy::types::{
    DependencyDescriptor, Instance, ModuleInfo, ModuleKind, Operation, Performer, PerformerKind,
    PluginContext,
};
use stateful_deploy::{EngineSettings, StatefulPlugin};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stateful-deploy")]
#[command(about = "Render stateful module manifests and reconcile them against a cluster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct StatefulDeployCli {
    /// Plugin context JSON as sent by the host
    #[arg(short, long, global = true, conflicts_with = "folder")]
    context: Option<PathBuf>,

    /// Module folder, used when no context file is given
    #[arg(short, long, global = true)]
    folder: Option<PathBuf>,

    /// Instance id for run commands
    #[arg(short, long, global = true)]
    instance: Option<String>,

    /// Engine settings (YAML or JSON)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose output; events are also mirrored into the log
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Link config dependents and check the config resolves
    Init,
    /// Remove dist/ and tmp/
    Clear,
    /// Render, then re-render on change until Ctrl-C
    Build,
    /// Deploy rendered manifests and hold until Ctrl-C
    Run,
    /// Delete the deployed stateful set and service
    RunClear,
    /// Inspect or update version-bearing fields
    Deps {
        #[command(subcommand)]
        command: DepsCommand,
    },
}

#[derive(Subcommand)]
enum DepsCommand {
    /// Print every dependency descriptor as JSON
    List,
    /// Write a descriptor's version back into its file
    Sync {
        /// Descriptor JSON, as printed by `deps list`
        #[arg(short, long)]
        descriptor: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StatefulDeployCli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting stateful-deploy v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &cli.settings {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };
    let context = load_context(&cli).await?;
    let sink: Arc<dyn EventSink> = if cli.verbose {
        let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(JsonLinesSink), Arc::new(TracingSink)];
        Arc::new(FanoutSink::new(sinks))
    } else {
        Arc::new(JsonLinesSink)
    };
    let plugin = StatefulPlugin::new(settings, Reporter::new(sink));

    match cli.command {
        Command::Init => plugin.build_init(&context).await?,
        Command::Clear => plugin.build_clear(&context).await?,
        Command::Build => {
            let operation = stop_on_ctrl_c();
            plugin.build_start(&context, &operation).await?;
        }
        Command::Run => {
            let operation = stop_on_ctrl_c();
            plugin.run_start(&context, &operation).await?;
        }
        Command::RunClear => plugin.run_clear(&context).await?,
        Command::Deps { command } => match command {
            DepsCommand::List => {
                let dependencies = plugin.dependencies_list(&context).await?;
                println!("{}", serde_json::to_string_pretty(&dependencies)?);
            }
            DepsCommand::Sync { descriptor } => {
                let descriptor: DependencyDescriptor =
                    serde_json::from_str(&descriptor).context("Invalid dependency descriptor")?;
                let changed = plugin.dependencies_sync(&context, &descriptor).await?;
                println!("{}", serde_json::json!({ "changed": changed }));
            }
        },
    }

    Ok(())
}

async fn load_context(cli: &StatefulDeployCli) -> Result<PluginContext> {
    if let Some(path) = &cli.context {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read context {}", path.display()))?;
        let mut context: PluginContext = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid plugin context in {}", path.display()))?;
        if let Some(instance_id) = &cli.instance {
            context.instance = Some(Instance {
                instance_id: instance_id.clone(),
            });
        }
        return Ok(context);
    }

    let folder = match &cli.folder {
        Some(folder) => folder.clone(),
        None => std::env::current_dir()?,
    };
    Ok(standalone_context(&folder, cli.instance.clone()))
}

/// A lone instanced performer named after its folder.
fn standalone_context(folder: &Path, instance: Option<String>) -> PluginContext {
    let id = folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "module".to_string());

    PluginContext {
        performer: Performer {
            performer_id: id.clone(),
            kind: PerformerKind::Instanced,
            folder: folder.to_path_buf(),
            module: ModuleInfo {
                module_id: id.clone(),
                fullname: id,
                kind: ModuleKind::Stateful,
            },
            linked: false,
            labels: Vec::new(),
            dependents: Vec::new(),
        },
        performers: Vec::new(),
        instance: instance.map(|instance_id| Instance { instance_id }),
    }
}

fn stop_on_ctrl_c() -> Operation {
    stop_on_signal(tokio::signal::ctrl_c())
}

/// Only a delivered signal stops the operation; if the listener cannot be
/// installed the operation keeps running until its work finishes.
fn stop_on_signal<F>(signal: F) -> Operation
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let operation = Operation::generate();
    let handle = operation.clone();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Stop requested for operation {}", handle.id());
                handle.request_stop();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });
    operation
}
