use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

use probemesh::archive::{collect_endpoints, ArchiveClient};
use probemesh::catalog::{TestCategory, ToolCatalog};
use probemesh::command::DirectTool;
use probemesh::engine::{ExecutionEngine, RunSummary};
use probemesh::hostspec::{local_node, parse_host_spec};
use probemesh::logging;
use probemesh::matrix::{resolve_matrix, ToolMode};
use probemesh::push::push_all;

/// Measurement orchestration and archival pipeline for network probe fleets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Archival endpoint configuration shared by the delivering subcommands.
#[derive(Args, Debug)]
struct ArchiveOpts {
    /// Archiver base URLs; also honors ARCHIVER_URLS / ARCHIVE_URLS
    /// (comma- or semicolon-separated)
    #[arg(long = "archiver-urls", num_args = 1..)]
    archiver_urls: Vec<String>,

    /// Bearer token for archival requests; falls back to ARCHIVER_BEARER,
    /// then ARCHIVER_API_KEY
    #[arg(long)]
    auth_token: Option<String>,

    /// Timeout for each archival delivery attempt, per endpoint
    #[arg(long, default_value_t = 30)]
    archive_timeout_secs: u64,
}

impl ArchiveOpts {
    fn client(&self) -> Result<ArchiveClient> {
        let endpoints = collect_endpoints(&self.archiver_urls, self.auth_token.as_deref());
        ArchiveClient::new(endpoints, Duration::from_secs(self.archive_timeout_secs))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run scheduled measurements against a list of hosts
    Run {
        /// Destination host specs (e.g. 10.0.0.1@shore-STAR)
        #[arg(long, num_args = 1.., required = true)]
        hosts: Vec<String>,

        /// Directory for JSON results and run logs
        #[arg(long, default_value = "./probe_results")]
        output_dir: PathBuf,

        /// Test categories to run (default: all)
        #[arg(long = "tests", value_enum, num_args = 1..)]
        tests: Vec<TestCategory>,

        /// Tool selection policy
        #[arg(long, value_enum, default_value = "auto")]
        tool_mode: ToolMode,

        /// When --tool-mode=subset, run only these tools
        #[arg(long = "tools", num_args = 1..)]
        tools: Vec<String>,

        /// Also run reverse direction for throughput/latency
        #[arg(long)]
        reverse: bool,

        /// Kill any probe process exceeding this wall-clock budget
        #[arg(long, default_value_t = 300)]
        probe_timeout_secs: u64,

        /// Local source identity (defaults to HOST_IP/HOST_NAME env)
        #[arg(long)]
        source: Option<String>,

        #[command(flatten)]
        archive: ArchiveOpts,
    },

    /// Run probe binaries directly, without the external scheduler
    Direct {
        /// Destination host specs
        #[arg(long, num_args = 1.., required = true)]
        hosts: Vec<String>,

        /// Directory for JSON results and run logs
        #[arg(long, default_value = "./direct_results")]
        output_dir: PathBuf,

        /// Tools to run (default: all)
        #[arg(long = "tools", value_enum, num_args = 1..)]
        tools: Vec<DirectTool>,

        /// Kill any probe process exceeding this wall-clock budget
        #[arg(long, default_value_t = 300)]
        probe_timeout_secs: u64,

        /// Local source identity (defaults to HOST_IP/HOST_NAME env)
        #[arg(long)]
        source: Option<String>,

        #[command(flatten)]
        archive: ArchiveOpts,
    },

    /// Re-deliver saved JSON artifacts from a results tree
    Push {
        /// Results tree to walk (category directories of JSON artifacts)
        #[arg(long)]
        source_dir: PathBuf,

        /// Local source identity (defaults to HOST_IP/HOST_NAME env)
        #[arg(long)]
        source: Option<String>,

        #[command(flatten)]
        archive: ArchiveOpts,
    },

    /// List all test categories with their supported tools and exit
    ListTests,
}

fn source_node(spec: Option<&str>) -> probemesh::hostspec::NodeRef {
    match spec {
        Some(spec) => parse_host_spec(spec).1,
        None => local_node(),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::ListTests => {
            let catalog = ToolCatalog::builtin();
            println!("Available Tests/Tools:");
            for entry in catalog.entries() {
                let tools: Vec<&str> = entry.tools.iter().map(|t| t.name).collect();
                println!("  {}: {}", entry.category, tools.join(", "));
            }
            Ok(())
        }

        Commands::Run {
            hosts,
            output_dir,
            tests,
            tool_mode,
            tools,
            reverse,
            probe_timeout_secs,
            source,
            archive,
        } => {
            logging::init_run_logging(&output_dir)?;

            let client = archive.client()?;
            log_endpoints(&client);

            let categories = if tests.is_empty() {
                TestCategory::ALL.to_vec()
            } else {
                tests
            };

            info!("Hosts: {}", hosts.join(", "));
            info!(
                "Tests: {}",
                categories
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            info!("Tool mode: {:?}", tool_mode);

            let catalog = ToolCatalog::builtin();
            let src = source_node(source.as_deref());
            let engine = ExecutionEngine::new(
                output_dir,
                Duration::from_secs(probe_timeout_secs),
                src,
            )?;
            info!("Run id: {}", engine.run_id());

            let mut summary = RunSummary::default();
            for host in &hosts {
                let (target, node) = parse_host_spec(host);
                // One matrix per host: subset skips are counted per host,
                // matching how the run loop reports them.
                let matrix = resolve_matrix(&catalog, &categories, tool_mode, &tools, reverse);
                engine.run_matrix(&catalog, &matrix, &target, &node, &client, &mut summary);
            }

            summary.log_totals();
            Ok(())
        }

        Commands::Direct {
            hosts,
            output_dir,
            tools,
            probe_timeout_secs,
            source,
            archive,
        } => {
            logging::init_run_logging(&output_dir)?;

            let client = archive.client()?;
            log_endpoints(&client);

            let tools = if tools.is_empty() {
                DirectTool::ALL.to_vec()
            } else {
                tools
            };

            info!("Hosts: {}", hosts.join(", "));
            info!(
                "Tools: {}",
                tools.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
            );

            let src = source_node(source.as_deref());
            let engine = ExecutionEngine::new(
                output_dir,
                Duration::from_secs(probe_timeout_secs),
                src,
            )?;

            let mut summary = RunSummary::default();
            for host in &hosts {
                let (target, node) = parse_host_spec(host);
                for tool in &tools {
                    engine.run_direct(*tool, &target, &node, &client, &mut summary);
                }
            }

            summary.log_totals();
            Ok(())
        }

        Commands::Push {
            source_dir,
            source,
            archive,
        } => {
            logging::init_console_logging();

            let client = archive.client()?;
            log_endpoints(&client);

            let src = source_node(source.as_deref());
            let summary = push_all(&source_dir, &src, &client)?;
            info!(
                "Push complete: {} files, {} delivered, {} delivery failures, {} skipped",
                summary.files, summary.delivered, summary.delivery_failures, summary.skipped
            );
            Ok(())
        }
    }
}

fn log_endpoints(client: &ArchiveClient) {
    if client.has_endpoints() {
        let urls: Vec<&str> = client
            .endpoints()
            .iter()
            .map(|e| e.base_url.as_str())
            .collect();
        info!("Archiver endpoints: {}", urls.join(", "));
    } else {
        warn!(
            "No archiver endpoints configured (use --archiver-urls or ARCHIVER_URLS). \
             Results will only be saved to disk."
        );
    }
}
