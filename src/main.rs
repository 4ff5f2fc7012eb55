mod storage;

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reportctl::api::{CategoryHandle, ReportHandle, SectionHandle, TimeRangeHandle};
use reportctl::soap::Intercepted;
use reportctl::{ApiClient, SoapChannel, SoapConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use url::Url;

type Client = ApiClient<Intercepted<SoapChannel>>;

#[derive(Parser)]
#[command(name = "reportctl", version, about = "Query a SOAP reporting service")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SOAP endpoint of the reporting service
    #[arg(long, env = "REPORTCTL_ENDPOINT")]
    endpoint: Url,

    /// Schema namespace the service's operations live in
    #[arg(long, env = "REPORTCTL_NAMESPACE", default_value = reportctl::soap::DEFAULT_NAMESPACE)]
    namespace: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[arg(long, short, env = "REPORTCTL_USERNAME")]
    username: String,

    /// Password; falls back to the system keyring, then a prompt
    #[arg(long, env = "REPORTCTL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log more (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// List available reports
    Reports,
    /// List the categories of a report
    Categories { report: String },
    /// Look up a single category of a report by name
    Category { report: String, name: String },
    /// List the time ranges of a report
    TimeRanges { report: String },
    /// Fetch report rows
    Data {
        report: String,
        category: String,
        time_range: String,
        /// e.g. "num_bytes desc"
        #[arg(long)]
        order_by: Option<String>,
    },
    /// Show current traffic
    Traffic,
    /// Show disk usage over a time range
    DiskUsage { report: String, time_range: String },
    /// List the network usage sections of a report
    Sections { report: String },
    /// Sample network usage of a section
    NetworkUsage {
        report: String,
        section: String,
        /// Window start, seconds since the epoch
        #[arg(long)]
        start: i64,
        /// Window end, seconds since the epoch
        #[arg(long)]
        end: i64,
        /// Sample width in seconds
        #[arg(long, default_value = "300")]
        interval: u32,
    },
    /// Forget the stored password
    Logout,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "reportctl=debug",
        _ => "reportctl=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Picks the one item named `name` out of a list call's result.
fn pick<T>(
    items: Vec<T>,
    name: &str,
    kind: &str,
    name_of: impl Fn(&T) -> Option<&str>,
) -> Result<T> {
    let mut matches: Vec<T> = items
        .into_iter()
        .filter(|item| name_of(item) == Some(name))
        .collect();
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => bail!("no {kind} named {name:?}"),
        count => bail!("{count} {kind}s are named {name:?}"),
    }
}

async fn report(client: &mut Client, name: &str) -> Result<ReportHandle> {
    let reports = client.available_reports().await?;
    pick(reports, name, "report", ReportHandle::name)
}

async fn time_range(
    client: &mut Client,
    report: &ReportHandle,
    name: &str,
) -> Result<TimeRangeHandle> {
    let ranges = client.time_ranges(report).await?;
    pick(ranges, name, "time range", TimeRangeHandle::name)
}

async fn category(
    client: &mut Client,
    report: &ReportHandle,
    name: &str,
) -> Result<CategoryHandle> {
    client
        .category(name, report)
        .await?
        .ok_or_else(|| anyhow!("no unique category named {name:?}"))
}

async fn section(
    client: &mut Client,
    report: &ReportHandle,
    name: &str,
) -> Result<SectionHandle> {
    let sections = client.network_usage_sections(report).await?;
    pick(sections, name, "section", SectionHandle::name)
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Logout = cli.command {
        return storage::forget(&cli.username);
    }

    let credentials = storage::load_credentials(&cli.username, cli.password)?;
    let config = SoapConfig::new(cli.endpoint)
        .namespace(cli.namespace)
        .timeout(Duration::from_secs(cli.timeout));
    let channel = SoapChannel::new(config).context("unable to create HTTP client")?;
    let mut client = ApiClient::new(Intercepted::traced(channel), credentials);

    let authenticated = client.authenticate().await.map(|_| ());
    authenticated.with_context(|| client_error(&client))?;

    match cli.command {
        Command::Reports => print_json(&client.available_reports().await?),
        Command::Categories { report: name } => {
            let report = report(&mut client, &name).await?;
            print_json(&client.categories(&report).await?)
        }
        Command::Category { report: report_name, name } => {
            let report = report(&mut client, &report_name).await?;
            print_json(&client.category(&name, &report).await?)
        }
        Command::TimeRanges { report: name } => {
            let report = report(&mut client, &name).await?;
            print_json(&client.time_ranges(&report).await?)
        }
        Command::Data {
            report: report_name,
            category: category_name,
            time_range: range_name,
            order_by,
        } => {
            let report = report(&mut client, &report_name).await?;
            let category = category(&mut client, &report, &category_name).await?;
            let range = time_range(&mut client, &report, &range_name).await?;
            let rows = client
                .report_data(&report, &category, &range, order_by.as_deref())
                .await?;
            print_json(&rows)
        }
        Command::Traffic => print_json(&client.current_traffic().await?),
        Command::DiskUsage {
            report: report_name,
            time_range: range_name,
        } => {
            let report = report(&mut client, &report_name).await?;
            let range = time_range(&mut client, &report, &range_name).await?;
            print_json(&client.disk_usage(&report, &range).await?)
        }
        Command::Sections { report: name } => {
            let report = report(&mut client, &name).await?;
            print_json(&client.network_usage_sections(&report).await?)
        }
        Command::NetworkUsage {
            report: report_name,
            section: section_name,
            start,
            end,
            interval,
        } => {
            let report = report(&mut client, &report_name).await?;
            let section = section(&mut client, &report, &section_name).await?;
            let usage = client
                .network_usage(&report, &section, start, end, interval)
                .await?;
            print_json(&usage)
        }
        Command::Logout => Ok(()),
    }
}

fn client_error(client: &Client) -> String {
    match client.error_message() {
        message if message.is_empty() => "authentication failed".to_string(),
        message => format!("authentication failed: {message}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli).await
}
