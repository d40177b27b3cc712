//! Plugin catalog commands.
//!
//! Provides list and show operations over the configured catalog, and
//! schema setup for the database-backed one.

use anyhow::Result;
use clap::Subcommand;
use protogen_core::catalog::{PluginFilter, PluginInfo, PluginRecord};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List catalog records
    List {
        /// Only plugins in this group
        #[arg(short, long)]
        group: Option<String>,

        /// Only plugins with this name
        #[arg(short, long)]
        name: Option<String>,

        /// Only this exact version
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Resolve a coordinate and show how it would be run
    Show {
        /// Plugin coordinate, e.g. `acme/go:latest`
        plugin: String,
    },

    /// Create or update the catalog schema in the configured database
    Migrate,
}

#[derive(Debug, Serialize, Tabled)]
struct PluginRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<PluginInfo> for PluginRow {
    fn from(info: PluginInfo) -> Self {
        Self {
            group: info.group,
            name: info.name,
            version: info.version,
            created_at: info.created_at.to_rfc3339(),
            id: info.id.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PluginDetail {
    #[serde(flatten)]
    record: PluginRecord,
    image: String,
    command: Vec<String>,
}

pub async fn execute(cmd: PluginCommands, ctx: &Context, format: OutputFormat) -> Result<()> {
    match cmd {
        PluginCommands::List {
            group,
            name,
            version,
        } => {
            let filter = PluginFilter {
                group,
                name,
                version,
            };
            let runtime = ctx.runtime().await?;
            let plugins = runtime.orchestrator.list_plugins(&filter).await?;

            match format {
                OutputFormat::Table => {
                    let rows: Vec<PluginRow> = plugins.into_iter().map(PluginRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&plugins, format)?,
            }
        }

        PluginCommands::Show { plugin } => {
            let runtime = ctx.runtime().await?;
            let record = runtime.orchestrator.resolve(&plugin).await?;
            let invocation = runtime.executor.invocation(&record);

            match format {
                OutputFormat::Table => {
                    let sandbox = &record.sandbox;
                    output::print_header(&format!("Plugin: {}", record.coordinate));
                    output::print_detail("ID", &record.id.to_string());
                    output::print_detail("Created", &record.created_at.to_rfc3339());
                    output::print_detail("Image", invocation.image());
                    output::print_detail("Network", sandbox.network());
                    output::print_detail("Memory", sandbox.memory());
                    output::print_detail("CPUs", sandbox.cpus());
                    if let Some(user) = sandbox.user() {
                        output::print_detail("User", user);
                    }
                    if let Some(dir) = sandbox.working_dir() {
                        output::print_detail("Workdir", dir);
                    }
                    if sandbox.read_only {
                        output::print_detail("Read-only", "yes");
                    }
                    output::print_detail("Command", &invocation.to_string());
                }
                _ => {
                    let mut command = vec![invocation.program().to_string()];
                    command.extend(invocation.redacted_args());
                    let detail = PluginDetail {
                        image: invocation.image().to_string(),
                        command,
                        record,
                    };
                    output::print_item(&detail, format)?;
                }
            }
        }

        PluginCommands::Migrate => {
            ctx.database().await?.migrate().await?;
            output::print_success("Catalog schema is up to date");
        }
    }

    Ok(())
}
