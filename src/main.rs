// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use retail_star::analytics::{self, TablePreview};
use retail_star::load::{recent_runs, run_invalid_total, verify_counts};
use retail_star::pipeline::{open_existing_database, run_pipeline, RunPlan};
use retail_star::{charts, export, load_csv, logging, transform, Config};

#[derive(Parser)]
#[command(name = "retail-star", version, about = "Retail transactions → star schema → revenue reports")]
struct Cli {
    /// Config file (defaults to ./retail-star.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, transform and load into SQLite, recording the run
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Also dump the four tables as CSV into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Transform only: validate the input and print what would be loaded
    Transform {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Monthly revenue and top products, printed and saved as text charts
    Report {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        charts_dir: Option<PathBuf>,
    },
    /// List tables, preview rows and show recent runs
    Inspect {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// Interactive revenue charts in the terminal
    #[cfg(feature = "tui")]
    Charts {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        top: Option<usize>,
    },
}

fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Run { input, db, export_dir } => run_full(&config, input, db, export_dir),
        Command::Transform { input, export_dir } => run_transform(&config, input, export_dir),
        Command::Report { db, top, charts_dir } => run_report(&config, db, top, charts_dir),
        Command::Inspect { db, rows } => run_inspect(&config, db, rows),
        #[cfg(feature = "tui")]
        Command::Charts { db, top } => run_charts(&config, db, top),
    }
}

fn run_full(
    config: &Config,
    input: Option<PathBuf>,
    db: Option<PathBuf>,
    export_dir: Option<PathBuf>,
) -> Result<()> {
    println!("⭐ Retail Star - CSV → Star Schema → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let plan = RunPlan {
        input: input.unwrap_or_else(|| config.input.path.clone()),
        database: db.unwrap_or_else(|| config.database.path.clone()),
        export_dir: export_dir.or_else(|| config.output.export_dir.clone()),
    };

    let outcome = run_pipeline(&plan)?;

    println!("\n📂 {}", outcome.output.report.summary());
    print_invalid(&outcome.output.report.invalid);
    println!("\n💾 Loaded into {}:", plan.database.display());
    println!("   dim_customers  {:>8}", outcome.load.customers);
    println!("   dim_products   {:>8}", outcome.load.products);
    println!("   dim_date       {:>8}", outcome.load.dates);
    println!("   fact_orders    {:>8}", outcome.load.facts);
    for path in &outcome.exported {
        println!("   ↳ exported {}", path.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Run {} complete", outcome.run.run_id);
    println!("   Fingerprint: {}", outcome.run.fingerprint);

    Ok(())
}

fn run_transform(config: &Config, input: Option<PathBuf>, export_dir: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.input.path.clone());
    let raw = load_csv(&input)?;
    let output = transform(&raw)?;

    println!("📂 {}", output.report.summary());
    print_invalid(&output.report.invalid);
    println!("🔍 Contract: {}", output.validation.summary());
    println!(
        "⭐ {} customers, {} products, {} dates, {} order lines (revenue {})",
        output.schema.customers.len(),
        output.schema.products.len(),
        output.schema.dates.len(),
        output.schema.facts.len(),
        output
            .schema
            .total_revenue()
            .map_or_else(|| "out of range".to_string(), |r| r.to_string())
    );

    if let Some(dir) = export_dir.or_else(|| config.output.export_dir.clone()) {
        for path in export::export_star_schema(&dir, &output.schema)? {
            println!("   ↳ exported {}", path.display());
        }
    }

    Ok(())
}

fn run_report(
    config: &Config,
    db: Option<PathBuf>,
    top: Option<usize>,
    charts_dir: Option<PathBuf>,
) -> Result<()> {
    let conn = open_existing_database(&db.unwrap_or_else(|| config.database.path.clone()))?;
    let months = analytics::monthly_revenue(&conn)?;
    let products = analytics::top_products(&conn, top.unwrap_or(config.reports.top_n))?;

    println!("{}", charts::monthly_revenue_chart(&months));
    println!("{}", charts::top_products_chart(&products));

    let dir = charts_dir.unwrap_or_else(|| config.output.charts_dir.clone());
    for path in charts::write_charts(&dir, &months, &products)? {
        println!("✓ Saved {}", path.display());
    }

    Ok(())
}

fn run_inspect(config: &Config, db: Option<PathBuf>, rows: usize) -> Result<()> {
    let conn = open_existing_database(&db.unwrap_or_else(|| config.database.path.clone()))?;

    println!("🗄️  Tables: {}", analytics::list_tables(&conn)?.join(", "));
    for (table, count) in verify_counts(&conn)? {
        let preview = analytics::preview(&conn, &table, rows)?;
        println!("\n── {} ({} rows) ──", table, count);
        print_preview(&preview);
    }

    println!("\n🕒 Recent runs:");
    for run in recent_runs(&conn, 5)? {
        println!(
            "   {}  {}  {} raw / {} facts / {} invalid  {}",
            run.finished_at.format("%Y-%m-%d %H:%M:%S"),
            run.run_id,
            run.raw_rows,
            run.fact_rows,
            run_invalid_total(&run),
            &run.fingerprint[..12.min(run.fingerprint.len())]
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_charts(config: &Config, db: Option<PathBuf>, top: Option<usize>) -> Result<()> {
    let conn = open_existing_database(&db.unwrap_or_else(|| config.database.path.clone()))?;
    let months = analytics::monthly_revenue(&conn)?;
    let products = analytics::top_products(&conn, top.unwrap_or(config.reports.top_n))?;

    let mut app = ui::App::new(months, products);
    ui::run_ui(&mut app)?;

    Ok(())
}

fn print_invalid(invalid: &retail_star::InvalidRowCounts) {
    for (reason, count) in invalid.iter() {
        println!("   ✗ {:<24} {:>8}", reason.as_str(), count);
    }
}

fn print_preview(preview: &TablePreview) {
    println!("   {}", preview.columns.join(" | "));
    for row in &preview.rows {
        println!("   {}", row.join(" | "));
    }
}
