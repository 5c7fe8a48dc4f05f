use clap::{Parser, Subcommand};

use hrkpi::period::week_label;
use hrkpi::{
    BucketStatus, Cadence, Hrkpi, MetricConfig, MetricKey, MetricPoint, PeriodSpec, Settings,
    Thresholds, TrendBucket, TrendRequest,
};

#[derive(Parser)]
#[command(name = "hrkpi", about = "Workforce KPI engine CLI")]
struct Cli {
    /// Database path (default: $HRKPI_DB or ~/.hrkpi/hrkpi.db)
    #[arg(long)]
    db: Option<String>,

    /// Company id (default: stored default_company_id, then $HRKPI_COMPANY_ID, then 1)
    #[arg(long)]
    company: Option<i64>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List metric definitions
    Definitions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current metric values with health status
    Current {
        /// Single metric (default: all)
        #[arg(long)]
        metric: Option<String>,
        /// Explicit period: 2025-01, 2025-W05, 30d, mtd, wtd, a date, or a..b
        #[arg(long)]
        period: Option<String>,
        /// Persist computed values to the metrics history
        #[arg(long)]
        record: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a bucketed trend for one metric
    Trend {
        /// Metric key, e.g. absenteeism_rate
        metric: String,
        /// day, week, month or auto
        #[arg(long, default_value = "auto")]
        cadence: String,
        /// Number of closed buckets (default depends on cadence)
        #[arg(long)]
        limit: Option<u32>,
        /// Include the current, still-open period
        #[arg(long)]
        partial: bool,
        /// Abort on the first failing bucket
        #[arg(long)]
        fail_fast: bool,
        /// Reference date instead of today (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show active headcount split into direct and indirect labor
    Breakdown {
        /// Reference date instead of today (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import provider JSON exports
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },
    /// Manage per-metric targets and thresholds
    Thresholds {
        #[command(subcommand)]
        action: ThresholdAction,
    },
    /// Show stored metric history
    History {
        metric: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show fact store status
    Status,
}

#[derive(Subcommand)]
enum ImportTarget {
    /// Import employee records
    Employees { file: String },
    /// Import daily timecard records
    Timecards { file: String },
}

#[derive(Subcommand)]
enum ThresholdAction {
    /// Add a time-effective target/threshold record
    Set {
        metric: String,
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        red: Option<f64>,
        #[arg(long)]
        yellow: Option<f64>,
        #[arg(long)]
        green: Option<f64>,
        /// First effective day (default: today)
        #[arg(long)]
        from: Option<String>,
        /// Last effective day (default: open-ended)
        #[arg(long)]
        to: Option<String>,
    },
    /// List configured records
    Show {
        #[arg(long)]
        metric: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

fn parse_date(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings = Settings::from_env()?;
    if let Some(path) = &cli.db {
        settings.db_path = Some(path.into());
    }
    let kpi = Hrkpi::open(settings).await?;
    // Resolved per command so `config set` can repair a bad stored default.
    let explicit_company = cli.company;
    let company = || kpi.resolve_company(explicit_company);

    match cli.command {
        Commands::Definitions { json } => print_definitions(json)?,
        Commands::Current {
            metric,
            period,
            record,
            json,
        } => handle_current(&kpi, company().await?, metric.as_deref(), period.as_deref(), record, json).await?,
        Commands::Trend {
            metric,
            cadence,
            limit,
            partial,
            fail_fast,
            as_of,
            json,
        } => {
            let metric: MetricKey = metric.parse()?;
            let request = TrendRequest {
                cadence: cadence.parse::<Cadence>()?,
                limit,
                include_partial: partial,
                fail_fast,
            };
            let reference = match as_of {
                Some(s) => parse_date(&s)?,
                None => today(),
            };
            let buckets = kpi
                .compute_trend_as_of(company().await?, metric, request, reference)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&buckets)?);
            } else {
                print_trend(metric, &buckets);
            }
        }
        Commands::Breakdown { as_of, json } => {
            let as_of = as_of.as_deref().map(parse_date).transpose()?;
            let breakdown = kpi.headcount_breakdown(company().await?, as_of).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                println!("Headcount as of {}", as_of.unwrap_or_else(today));
                println!("  Direct labor:   {}", breakdown.direct);
                println!("  Indirect labor: {}", breakdown.indirect);
                println!("  Total:          {}", breakdown.total());
            }
        }
        Commands::Import { target } => {
            let company = company().await?;
            let report = match target {
                ImportTarget::Employees { file } => {
                    let json = std::fs::read_to_string(&file)?;
                    kpi.import_employees(company, &json).await?
                }
                ImportTarget::Timecards { file } => {
                    let json = std::fs::read_to_string(&file)?;
                    kpi.import_time_entries(company, &json).await?
                }
            };
            println!("Imported: {}", report.imported);
            println!("Rejected: {}", report.rejected);
            for e in &report.errors {
                eprintln!("  {e}");
            }
        }
        Commands::Thresholds { action } => handle_thresholds(&kpi, company().await?, action).await?,
        Commands::History { metric, json } => {
            let metric: MetricKey = metric.parse()?;
            let rows = kpi.history(company().await?, metric).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No history recorded for {metric}.");
            } else {
                let def = metric.definition();
                for r in rows {
                    println!(
                        "  {}..{}  {:>10}  {}",
                        r.period_start,
                        r.period_end,
                        def.format_value(Some(r.value)).unwrap_or_default(),
                        r.status.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Config { action } => handle_config(&kpi, action).await?,
        Commands::Status => print_status(&kpi, company().await?).await?,
    }
    Ok(())
}

fn print_definitions(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hrkpi::definitions())?);
        return Ok(());
    }
    for def in hrkpi::definitions() {
        println!("{} ({})", def.name, def.key);
        println!("  {}", def.description);
        println!("  Formula:  {}", def.formula);
        println!(
            "  Cadences: {} (default {})",
            def.supported_cadences(),
            def.default_cadence
        );
        for rule in def.edge_rules {
            println!("  - {rule}");
        }
    }
    Ok(())
}

async fn handle_current(
    kpi: &Hrkpi,
    company: i64,
    metric: Option<&str>,
    period: Option<&str>,
    record: bool,
    json: bool,
) -> anyhow::Result<()> {
    let metrics: Vec<MetricKey> = match metric {
        Some(m) => vec![m.parse()?],
        None => MetricKey::ALL.to_vec(),
    };

    let points: Vec<MetricPoint> = match period {
        Some(expr) => {
            let p = PeriodSpec::parse(expr)?.resolve(today())?;
            let mut points = Vec::with_capacity(metrics.len());
            for m in metrics {
                points.push(kpi.compute_for_period(company, m, p).await?);
            }
            points
        }
        None if metrics.len() == MetricKey::ALL.len() => kpi.compute_current_all(company).await?,
        None => {
            let mut points = Vec::with_capacity(metrics.len());
            for m in metrics {
                points.push(kpi.compute_current(company, m).await?);
            }
            points
        }
    };

    if record {
        let mut written = 0;
        for p in &points {
            if kpi.record_history(company, p).await? {
                written += 1;
            }
        }
        log::info!("recorded {written} of {} points", points.len());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }
    println!("Company {company}");
    for p in &points {
        let def = p.metric_key.definition();
        println!(
            "  {:<18} {:>10}  {:<6}  {}",
            def.name,
            def.format_value(p.value).unwrap_or_else(|| "n/a".to_string()),
            p.status.map(|s| s.as_str()).unwrap_or("-"),
            p.period
        );
    }
    Ok(())
}

fn print_trend(metric: MetricKey, buckets: &[TrendBucket]) {
    let def = metric.definition();
    println!("{} trend", def.name);
    for b in buckets {
        let label = if b.bucket_start == b.bucket_end {
            b.bucket_start.to_string()
        } else if (b.bucket_end - b.bucket_start).num_days() == 6 {
            week_label(b.bucket_start)
        } else {
            b.bucket_start.format("%Y-%m").to_string()
        };
        let value = match b.status {
            BucketStatus::Error => "error".to_string(),
            _ => def.format_value(b.value).unwrap_or_else(|| "n/a".to_string()),
        };
        println!(
            "  {:<10} {:>10}  {:<7} {:<6} {:>5.0}%{}",
            label,
            value,
            b.status.as_str(),
            b.health.map(|h| h.as_str()).unwrap_or("-"),
            b.meta.coverage_pct * 100.0,
            b.error.as_deref().map(|e| format!("  {e}")).unwrap_or_default()
        );
    }
}

async fn handle_thresholds(kpi: &Hrkpi, company: i64, action: ThresholdAction) -> anyhow::Result<()> {
    match action {
        ThresholdAction::Set {
            metric,
            target,
            red,
            yellow,
            green,
            from,
            to,
        } => {
            let thresholds = Thresholds { red, yellow, green };
            let config = MetricConfig {
                company_id: company,
                metric_key: metric.parse()?,
                target_value: target,
                thresholds: (!thresholds.is_empty()).then_some(thresholds),
                effective_from: match from {
                    Some(s) => parse_date(&s)?,
                    None => today(),
                },
                effective_to: to.as_deref().map(parse_date).transpose()?,
            };
            let id = kpi.set_metric_config(config).await?;
            println!("Stored config #{id}.");
        }
        ThresholdAction::Show { metric, json } => {
            let metric = metric.as_deref().map(str::parse::<MetricKey>).transpose()?;
            let configs = kpi.metric_configs(company, metric).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&configs)?);
            } else if configs.is_empty() {
                println!("No thresholds configured.");
            } else {
                for c in configs {
                    let t = c.thresholds.unwrap_or_default();
                    println!(
                        "  {:<18} {}..{}  target={:?} red={:?} yellow={:?} green={:?}",
                        c.metric_key,
                        c.effective_from,
                        c.effective_to.map(|d| d.to_string()).unwrap_or_default(),
                        c.target_value,
                        t.red,
                        t.yellow,
                        t.green
                    );
                }
            }
        }
    }
    Ok(())
}

async fn print_status(kpi: &Hrkpi, company: i64) -> anyhow::Result<()> {
    let counts = kpi.store_counts().await?;
    println!("Fact Store Status");
    println!("  Database:   {}", kpi.settings().db_path()?.display());
    println!("  Company:    {company}");
    println!("  Companies:  {}", counts.companies);
    println!("  Employees:  {}", counts.employees);
    println!("  Timecards:  {}", counts.time_entries);
    println!("  Configs:    {}", counts.metric_configs);
    println!("  History:    {}", counts.history_rows);
    match (counts.first_work_date, counts.last_work_date) {
        (Some(first), Some(last)) => println!("  Work dates: {first}..{last}"),
        _ => println!("  Work dates: none"),
    }
    Ok(())
}

async fn handle_config(kpi: &Hrkpi, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match kpi.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            kpi.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = kpi.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
