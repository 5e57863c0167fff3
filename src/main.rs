use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tabled::{Table, Tabled};

mod backend;
mod config;
mod diagnostics;
mod llm;
mod logging;
mod mcp;

use backend::Backend;
use mcp::invoker::ToolInvoker;
use mcp::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "modelbridge")]
#[command(about = "Expose a remote model deployment as MCP tools over stdio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the config file for a single run
#[derive(clap::Args)]
struct Overrides {
    /// Model service base URL
    #[arg(long, env = config::ENDPOINT_ENV)]
    endpoint: Option<String>,

    /// Primary deployment name
    #[arg(long, env = config::DEPLOYMENT_ENV)]
    deployment: Option<String>,

    /// Tool call timeout in seconds
    #[arg(long, env = config::TIMEOUT_ENV)]
    timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut config::Config) {
        if let Some(endpoint) = self.endpoint {
            config.backend.endpoint = endpoint;
        }
        if let Some(deployment) = self.deployment {
            config.backend.deployment = deployment;
        }
        if let Some(secs) = self.timeout_secs {
            config.server.tool_timeout_secs = secs;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve {
        #[command(flatten)]
        overrides: Overrides,

        /// Skip the startup connectivity check
        #[arg(long)]
        no_check: bool,
    },

    /// Check connectivity to the model endpoint
    Check,

    /// List the tools this server exposes
    Tools,

    /// Ask the model a single question
    Ask {
        /// Question or prompt
        question: String,

        /// Additional context placed before the question
        #[arg(long)]
        context: Option<String>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Describe the configured model services
    Models,

    /// Write a default config file to ~/.modelbridge/config.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    });
    let mut config = config::Config::load()?;

    match cli.command {
        Commands::Serve {
            overrides,
            no_check,
        } => {
            overrides.apply(&mut config);
            let check = config.server.check_on_startup && !no_check;
            mcp::transport::run_stdio(&config, check).await?;
        }

        Commands::Check => {
            let client = llm::ModelClient::new(&config)?;
            let outcome = client.health_check().await;
            println!("{}", diagnostics::render_report(&outcome, &client));
            if !outcome.is_ready() {
                std::process::exit(1);
            }
        }

        Commands::Tools => {
            list_tools();
        }

        Commands::Ask {
            question,
            context,
            overrides,
        } => {
            overrides.apply(&mut config);
            run_ask(&config, question, context).await?;
        }

        Commands::Models => {
            let client = llm::ModelClient::new(&config)?;
            println!("{}", client.describe());
        }

        Commands::Init => {
            init_config()?;
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "Tool")]
    name: String,
    #[tabled(rename = "Required")]
    required: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn list_tools() {
    let registry = ToolRegistry::new();
    let rows: Vec<ToolRow> = registry
        .descriptors()
        .iter()
        .map(|tool| ToolRow {
            name: tool.name.clone(),
            required: if tool.input_schema.required.is_empty() {
                "-".to_string()
            } else {
                tool.input_schema.required.join(", ")
            },
            description: tool.description.clone(),
        })
        .collect();

    println!("{}", "🧰 Tools".bold());
    println!();
    println!("{}", Table::new(rows));
}

async fn run_ask(config: &config::Config, question: String, context: Option<String>) -> Result<()> {
    let client = llm::ModelClient::new(config)?;
    let invoker = ToolInvoker::new(client, config.tool_timeout());

    let mut args = json!({ "question": question });
    if let Some(context) = context {
        args["context"] = json!(context);
    }

    match invoker
        .invoke(&ToolRegistry::new(), mcp::tools::ToolName::AskModel.as_str(), &args)
        .await
    {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("{} {}", "❌".red(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn init_config() -> Result<()> {
    let config_path = config::Config::config_path()?;
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&config_path, include_str!("../default_config.toml"))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("✓ Created {}", config_path.display());
    println!("\nNext steps:");
    println!("  export {}=<your key>", config::Config::default().backend.api_key_env);
    println!("  modelbridge check");
    Ok(())
}
