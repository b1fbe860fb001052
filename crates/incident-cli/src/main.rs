use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use incident_api::IncidentTimelineApi;
use incident_core::{
    normalize, normalize_page, parse_filter_date, sample_incidents, DateRange, FacetFilter,
    FilterState, Incident, IncidentSource, StaticSource, Stats,
};
use incident_notion::{
    NotionClient, NotionConfig, DEFAULT_BASE_URL, DEFAULT_NOTION_VERSION, DEFAULT_TIMEOUT_SECS,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "incidents")]
#[command(about = "Incident timeline CLI")]
struct Cli {
    /// Read records from a JSON file instead of Notion.
    #[arg(long, global = true, conflicts_with = "sample")]
    input: Option<PathBuf>,

    /// Use the built-in sample records instead of Notion.
    #[arg(long, global = true, default_value_t = false)]
    sample: bool,

    #[command(flatten)]
    notion: NotionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct NotionArgs {
    #[arg(long, env = "NOTION_API_KEY", hide_env_values = true, global = true)]
    notion_api_key: Option<String>,
    #[arg(long, env = "NOTION_DATABASE_ID", global = true)]
    notion_database_id: Option<String>,
    #[arg(long, env = "NOTION_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    notion_base_url: String,
    #[arg(long, env = "NOTION_VERSION", default_value = DEFAULT_NOTION_VERSION, global = true)]
    notion_version: String,
    #[arg(
        long,
        env = "NOTION_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        global = true
    )]
    request_timeout_secs: u64,
}

impl NotionArgs {
    fn config(&self) -> NotionConfig {
        NotionConfig {
            api_key: self.notion_api_key.clone(),
            database_id: self.notion_database_id.clone(),
            base_url: self.notion_base_url.clone(),
            notion_version: self.notion_version.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch records once and print them; fails if the source fails.
    Fetch,
    /// Print the filtered, grouped timeline, falling back to sample data.
    View(ViewArgs),
    /// Print counts over the loaded record set.
    Stats,
    /// Print the built-in sample records.
    Sample,
}

#[derive(Debug, Args)]
struct ViewArgs {
    #[arg(long = "type")]
    incident_type: Option<String>,
    #[arg(long)]
    resident: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`. Ignored unless `--end` is also set.
    #[arg(long)]
    start: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`. Ignored unless `--start` is also set.
    #[arg(long)]
    end: Option<String>,
}

impl ViewArgs {
    fn filters(&self) -> Result<FilterState> {
        Ok(FilterState {
            incident_type: facet(self.incident_type.as_deref()),
            resident: facet(self.resident.as_deref()),
            location: facet(self.location.as_deref()),
            date_range: DateRange::new(
                filter_date("start", self.start.as_deref())?,
                filter_date("end", self.end.as_deref())?,
            ),
        })
    }
}

fn facet(value: Option<&str>) -> FacetFilter {
    value.map_or(FacetFilter::All, FacetFilter::parse)
}

fn filter_date(flag: &str, value: Option<&str>) -> Result<Option<time::Date>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_filter_date(raw)
            .map(Some)
            .ok_or_else(|| anyhow!("--{flag} must be a YYYY-MM-DD date, got `{raw}`")),
    }
}

/// Records from a file: either a list of flat rows, a list of Notion pages,
/// or a Notion query response with a `results` list.
fn read_records(path: &Path) -> Result<Vec<Incident>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    let value: Value = serde_json::from_str(&body)
        .with_context(|| format!("records file {} is not valid JSON", path.display()))?;

    let rows = match &value {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(object) => match object.get("results") {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => return Err(anyhow!("records file object has no `results` list")),
        },
        _ => return Err(anyhow!("records file must hold a JSON list or object")),
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(record) if record.contains_key("properties") => Ok(normalize_page(row)),
            Value::Object(record) => Ok(normalize(record)),
            _ => Err(anyhow!("record {index} is not a JSON object")),
        })
        .collect()
}

fn source(cli: &Cli) -> Result<Arc<dyn IncidentSource>> {
    if cli.sample {
        return Ok(Arc::new(StaticSource::sample()));
    }
    if let Some(path) = &cli.input {
        let incidents = read_records(path)?;
        tracing::debug!(path = %path.display(), count = incidents.len(), "loaded records file");
        return Ok(Arc::new(StaticSource::new(incidents)));
    }
    Ok(Arc::new(NotionClient::new(cli.notion.config())))
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Sample => {
            let incidents = sample_incidents();
            emit_json(serde_json::json!({
                "count": incidents.len(),
                "incidents": incidents,
            }))
        }
        Command::Fetch => {
            let api = IncidentTimelineApi::new(source(&cli)?);
            let incidents = api.fetch().await?;
            emit_json(serde_json::json!({
                "count": incidents.len(),
                "incidents": incidents,
            }))
        }
        Command::View(args) => {
            let filters = args.filters()?;
            let api = IncidentTimelineApi::new(source(&cli)?);
            let timeline = api.load().await.view(&filters);
            emit_json(serde_json::to_value(timeline)?)
        }
        Command::Stats => {
            let api = IncidentTimelineApi::new(source(&cli)?);
            let load = api.load().await;
            let stats = Stats::collect(&load.incidents, load.incidents.len());
            emit_json(serde_json::json!({
                "origin": load.origin,
                "error": load.error,
                "stats": stats,
            }))
        }
    }
}
