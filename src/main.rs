use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

mod config;
mod dashboard;
mod error;
mod format;
mod html;
mod kpi;
mod loader;
mod models;
mod narrative;
mod ranking;
mod report;
mod segments;
mod series;
mod table;

use config::{AppContext, DashboardConfig};

#[derive(Parser)]
#[command(name = "kpi-dashboard")]
#[command(about = "Subscription revenue KPI dashboard over exported analysis tables", long_about = None)]
struct Cli {
    /// TOML file overriding the built-in defaults
    #[arg(long, global = true, env = "KPI_DASHBOARD_CONFIG")]
    config: Option<PathBuf>,
    /// Directory searched before the configured ones
    #[arg(long, global = true, env = "KPI_DASHBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Rows kept in ranked panels
    #[arg(long, global = true)]
    top: Option<usize>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where each input file resolves, or which are missing
    Check,
    /// Print KPIs, callouts and the summary to stdout
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Write the full dashboard to a file
    Report {
        #[arg(long, value_enum, default_value_t = ReportFormat::Html)]
        format: ReportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Html,
    Markdown,
}

impl ReportFormat {
    fn default_path(self) -> PathBuf {
        match self {
            ReportFormat::Html => PathBuf::from("dashboard.html"),
            ReportFormat::Markdown => PathBuf::from("dashboard.md"),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = DashboardConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(top) = cli.top {
        config.top_n = top;
    }
    config.validate()?;

    let mut ctx = AppContext::new(config);

    match cli.command {
        Commands::Check => {
            let missing = loader::missing_datasets(&ctx.config);
            for dataset in loader::Dataset::ALL {
                if let Some(path) = loader::resolve(dataset, &ctx.config) {
                    println!("found {}", path.display());
                }
            }
            if !missing.is_empty() {
                let names: Vec<String> = missing
                    .iter()
                    .map(|dataset| dataset.file_name(&ctx.config))
                    .collect();
                println!("{}", report::missing_warning(&names));
                println!("{}", report::MISSING_HINT);
                anyhow::bail!(
                    "{} of {} input files missing",
                    names.len(),
                    loader::Dataset::ALL.len()
                );
            }
            println!("All input files present.");
        }
        Commands::Summary { json } => {
            let inputs = loader::load_inputs(&mut ctx).context("failed to load inputs")?;
            let view = dashboard::build(&inputs, &ctx.config)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }

            if !view.is_complete() {
                for warning in report::input_warnings(&view) {
                    println!("{warning}");
                }
                println!("{}", report::MISSING_HINT);
            }

            let currency = view.currency_label.as_str();
            if let Some(kpis) = &view.kpis {
                println!("Conversion rate: {}", format::percent(kpis.conversion_rate));
                println!("Mean retention: {}", format::percent(kpis.retention_mean));
                println!("ARPU: {}", narrative::money(kpis.arpu_overall, currency));
                println!(
                    "Average premium duration: {}",
                    format::months(kpis.avg_premium_duration)
                );
            }
            if let Some(peak) = view.retention.as_ref().and_then(|p| p.peak.as_ref()) {
                println!("{}", narrative::retention_callout(peak));
            }
            if let Some(peak) = view.arpu.as_ref().and_then(|p| p.peak.as_ref()) {
                println!("{}", narrative::arpu_callout(peak, currency));
            }
            if let Some(top) = view.segments.as_ref().and_then(|s| s.first()) {
                println!("{}", narrative::segment_callout(top, currency));
            }
            match &view.significant {
                Some(rows) if rows.is_empty() => println!("No significant features."),
                Some(rows) => println!("{}", narrative::significance_callout(&rows[0])),
                None => {}
            }
            if let Some(top) = view.importance.as_ref().and_then(|i| i.first()) {
                println!("{}", narrative::importance_callout(top));
            }
            if let Some(summary) = &view.narrative {
                println!();
                println!("Summary:");
                for line in summary.lines() {
                    println!("- {line}");
                }
            }
        }
        Commands::Report { format: report_format, out } => {
            let inputs = loader::load_inputs(&mut ctx).context("failed to load inputs")?;
            let view = dashboard::build(&inputs, &ctx.config)?;
            let generated_at = chrono::Local::now().naive_local();

            let body = match report_format {
                ReportFormat::Html => html::render_html(&view, generated_at),
                ReportFormat::Markdown => report::build_report(&view, generated_at),
            };
            let out = out.unwrap_or_else(|| report_format.default_path());
            std::fs::write(&out, &body)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!("wrote {} bytes to {}", body.len(), out.display());

            for warning in report::input_warnings(&view) {
                println!("{warning}");
            }
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
