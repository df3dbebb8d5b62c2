use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use enrollmap::config::AppConfig;
use enrollmap::request::DashboardParams;
use enrollmap::stats::StatsReport;
use enrollmap::types::FeatureRecord;
use enrollmap::{data, processing, render, server, stats};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dataset and the dashboard API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print descriptive statistics for a selection
    Summary {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        selection: SelectionArgs,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the choropleth for a selection to a PNG
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(short, long, value_name = "PNG", default_value = "choropleth.png")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct SelectionArgs {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    theme: Option<String>,
    /// Zone code, or __ALL__
    #[arg(long)]
    zone: Option<String>,
    /// Case-insensitive part of the locality name
    #[arg(long)]
    locality: Option<String>,
    /// Metric key, e.g. Matrícula or institutions_total
    #[arg(long)]
    metric: Option<String>,
    /// total, male or female
    #[arg(long)]
    gender: Option<String>,
    /// total, public or private
    #[arg(long)]
    institution: Option<String>,
}

impl From<SelectionArgs> for DashboardParams {
    fn from(args: SelectionArgs) -> Self {
        Self {
            year: args.year,
            theme: args.theme,
            zone: args.zone,
            locality: args.locality,
            metric: args.metric,
            gender: args.gender,
            institution: args.institution,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(&config)?;
            // A load failure is served as an error state rather than aborting.
            let loaded = data::load_dataset(&app_config.input.geojson);
            server::start_server(app_config, loaded).await?;
        }
        Commands::Summary {
            config,
            selection,
            json,
        } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let dataset = data::load_dataset(&app_config.input.geojson)?;
            let (filter, selection) = DashboardParams::from(selection).resolve(&app_config.defaults)?;

            let filtered = processing::filter_features(&dataset.records, &filter);
            let all: Vec<&FeatureRecord> = dataset.records.iter().collect();
            let report = stats::stats_report(&filtered, &all, &selection);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Render {
            config,
            selection,
            output,
        } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let dataset = data::load_dataset(&app_config.input.geojson)?;
            let (filter, selection) = DashboardParams::from(selection).resolve(&app_config.defaults)?;

            let filtered = processing::filter_features(&dataset.records, &filter);
            let img = render::render_choropleth(&app_config.render, &filtered, &selection);
            render::write_png(&img, &output)?;
            info!("Wrote {} localities to {:?}", filtered.len(), output);
        }
    }

    Ok(())
}

fn print_report(report: &StatsReport) {
    let s = &report.statistics;
    let or_dash = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    println!("{} ({} localities)", report.metric_label, s.count);
    println!("  Total:    {}", s.total);
    println!("  Average:  {:.0}", s.average);
    println!("  Median:   {}", or_dash(s.median));
    println!("  Range:    {}", or_dash(report.range));
    if let (Some(max), Some(rec)) = (s.max, &s.max_record) {
        println!("  Maximum:  {} ({})", max, rec.locality_name);
    }
    if let (Some(min), Some(rec)) = (s.min, &s.min_record) {
        println!("  Minimum:  {} ({})", min, rec.locality_name);
    }
    if let Some(change) = report.year_over_year_change {
        println!("  Year over year: {:+.1}%", change);
    }

    println!("Distribution:");
    for bucket in &report.distribution {
        println!("  {:>8}: {}", bucket.range.label, bucket.count);
    }

    println!(
        "Enrollment: male {} ({:.1}%), female {} ({:.1}%)",
        report.gender.male,
        report.gender.male_percentage,
        report.gender.female,
        report.gender.female_percentage
    );
    println!(
        "Institutions: public {}, private {}, total {} ({:.1}% public)",
        report.institutions.public,
        report.institutions.private,
        report.institutions.total,
        report.institutions.public_percentage
    );

    println!("Top:");
    for (i, r) in report.top.iter().enumerate() {
        println!("  {}. {} {}", i + 1, r.name, r.value);
    }
    println!("Bottom:");
    for (i, r) in report.bottom.iter().enumerate() {
        println!("  {}. {} {}", i + 1, r.name, r.value);
    }
}
