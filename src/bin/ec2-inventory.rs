//! CLI binary for the ec2-inventory crate.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use ec2_inventory::{
    comma_list, parse_regions, ArbitraryPaths, CredentialResolver, Ec2ClientFactory,
    InventoryError, MetadataAggregator, ReportConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ec2-inventory")]
#[command(
    author,
    version,
    about = "Tabulate EC2 instance metadata across AWS profiles and regions"
)]
struct Cli {
    /// Comma-delimited AWS profile names
    #[arg(short, long, default_value = "default")]
    profiles: String,

    /// Comma-delimited regions, or `all`
    #[arg(short, long, default_value = "us-east-1")]
    regions: String,

    /// Tag key shown as a column (and filtered on with --strict)
    #[arg(short = 'k', long, default_value = "ops_group")]
    tag_key: String,

    /// Tag value to filter on with --strict
    #[arg(short = 'v', long)]
    tag_value: Option<String>,

    /// Only fetch instances matching the tag filter
    #[arg(short, long)]
    strict: bool,

    /// Comma-delimited dot paths added as columns, labelled by full path
    #[arg(short = 'x', long, conflicts_with = "property")]
    properties: Option<String>,

    /// A single dot path added as a column, labelled by its last segment
    #[arg(short = 'X', long)]
    property: Option<String>,

    /// Column label to sort by [default: "Tag: <tag-key>"]
    #[arg(long)]
    sort_by: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    /// Send requests to this endpoint instead of the regional one
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(format!("unknown format: {} (expected table, json, or raw)", s)),
        }
    }
}

impl Cli {
    fn report_config(&self) -> ReportConfig {
        let paths = match (&self.property, &self.properties) {
            (Some(single), _) => ArbitraryPaths::Single(single.trim().to_string()),
            (None, Some(many)) => ArbitraryPaths::Many(comma_list(many)),
            (None, None) => ArbitraryPaths::None,
        };

        ReportConfig {
            profiles: comma_list(&self.profiles),
            regions: parse_regions(&self.regions),
            tag_key: self.tag_key.clone(),
            tag_value: self.tag_value.clone().filter(|v| !v.is_empty()),
            strict: self.strict,
            paths,
            sort_by: self.sort_by.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), InventoryError> {
    let plan = cli.report_config().plan()?;

    let timeout = Duration::from_secs(cli.timeout);
    let mut factory = Ec2ClientFactory::new()
        .with_timeout(timeout)
        .with_resolver(CredentialResolver::from_env().with_timeout(timeout));
    if let Some(endpoint_url) = &cli.endpoint_url {
        factory = factory.with_endpoint_url(endpoint_url);
    }

    let mut aggregator = MetadataAggregator::new(factory);
    if !cli.quiet {
        aggregator = aggregator.on_unit(|unit| {
            eprintln!(
                "[{}/{}] {}/{}",
                unit.index + 1,
                unit.total,
                unit.region,
                unit.profile
            );
        });
    }

    let report = plan.run(&mut aggregator).await?;

    match cli.format {
        OutputFormat::Table => println!("\n{}\n", report.table),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.table.to_json())?)
        }
        OutputFormat::Raw => println!("{}", serde_json::to_string_pretty(&report.records)?),
    }
    Ok(())
}
