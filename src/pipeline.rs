// 🔁 Pipeline - extract → transform → (export) → load → audit
// The only place the transform core meets files and the database.

use crate::export::export_star_schema;
use crate::extract::load_csv;
use crate::load::{insert_run, load_star_schema, setup_database, LoadSummary, RunRecord};
use crate::transform::{transform, TransformOutput};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where one pipeline run reads from and writes to
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub input: PathBuf,
    pub database: PathBuf,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub output: TransformOutput,
    pub load: LoadSummary,
    pub run: RunRecord,
    pub exported: Vec<PathBuf>,
}

pub fn run_pipeline(plan: &RunPlan) -> Result<RunOutcome> {
    let started_at = Utc::now();

    let raw = load_csv(&plan.input)?;
    let output = transform(&raw).context("Transform failed; nothing was loaded")?;

    let exported = match &plan.export_dir {
        Some(dir) => export_star_schema(dir, &output.schema)?,
        None => Vec::new(),
    };

    let mut conn = open_database(&plan.database)?;
    let load = load_star_schema(&mut conn, &output.schema)?;

    let run = RunRecord::new(&plan.input.display().to_string(), started_at, &output);
    insert_run(&conn, &run)?;
    info!(run_id = %run.run_id, fingerprint = %run.fingerprint, "run recorded");

    Ok(RunOutcome {
        output,
        load,
        run,
        exported,
    })
}

/// Open (creating parent directories as needed) and prepare the store
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Open an existing store for read-only reporting
pub fn open_existing_database(path: &Path) -> Result<Connection> {
    if !path.exists() {
        anyhow::bail!(
            "Database not found at {} (run the pipeline first: retail-star run)",
            path.display()
        );
    }
    Connection::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}
