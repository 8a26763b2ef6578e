// End-to-end: CSV on disk → run_pipeline → SQLite → reports

use retail_star::analytics::{monthly_revenue, top_products};
use retail_star::load::{recent_runs, run_invalid_total, verify_counts};
use retail_star::pipeline::{open_existing_database, run_pipeline, RunPlan};
use retail_star::InvalidReason;
use std::fs;
use std::path::Path;

const EXPORT: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850.0,United Kingdom
536365,71053,WHITE METAL LANTERN,6,12/1/2010 8:26,3.39,17850.0,United Kingdom
C536379,D,Discount,-1,12/1/2010 9:41,27.5,14527.0,United Kingdom
536414,22139,,56,12/1/2010 11:52,0,,United Kingdom
540001,85123A,WHITE HANGING HEART T-LIGHT HOLDER,12,1/4/2011 10:00,2.55,,United Kingdom
,22139,RETROSPOT TEA SET,1,1/4/2011 10:05,4.95,13047,United Kingdom
";

fn plan(dir: &Path) -> RunPlan {
    let input = dir.join("online_retail.csv");
    fs::write(&input, EXPORT).unwrap();

    RunPlan {
        input,
        database: dir.join("db").join("retail.db"),
        export_dir: Some(dir.join("staging")),
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_pipeline_loads_star_schema_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let plan = plan(dir.path());

    let outcome = run_pipeline(&plan).unwrap();

    let report = &outcome.output.report;
    assert_eq!(report.raw_rows, 6);
    assert_eq!(report.valid_rows, 4);
    assert_eq!(report.return_rows, 1);
    assert_eq!(report.invalid.get(InvalidReason::NonPositivePrice), 1);
    assert_eq!(report.invalid.get(InvalidReason::MissingInvoiceId), 1);
    assert!(outcome.output.validation.is_clean());

    // 17850, 14527, UNKNOWN / 85123A, 71053, D / two days / four lines
    assert_eq!(outcome.load.customers, 3);
    assert_eq!(outcome.load.products, 3);
    assert_eq!(outcome.load.dates, 2);
    assert_eq!(outcome.load.facts, 4);
    assert_eq!(outcome.exported.len(), 4);
    assert!(outcome.exported.iter().all(|p| p.exists()));

    let conn = open_existing_database(&plan.database).unwrap();

    let counts = verify_counts(&conn).unwrap();
    assert_eq!(
        counts,
        vec![
            ("dim_customers".to_string(), 3),
            ("dim_products".to_string(), 3),
            ("dim_date".to_string(), 2),
            ("fact_orders".to_string(), 4),
        ]
    );

    let months = monthly_revenue(&conn).unwrap();
    assert_eq!(months.len(), 2);
    assert_eq!(months[0].period(), "2010-12");
    assert!(approx(months[0].revenue, 15.30 + 20.34 - 27.50));
    assert_eq!(months[1].period(), "2011-01");
    assert!(approx(months[1].revenue, 30.60));

    let top = top_products(&conn, 2).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].description, "WHITE HANGING HEART T-LIGHT HOLDER");
    assert!(approx(top[0].revenue, 45.90));
    assert_eq!(top[1].description, "WHITE METAL LANTERN");

    let runs = recent_runs(&conn, 5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, outcome.run.run_id);
    assert_eq!(run_invalid_total(&runs[0]), 2);
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let plan = plan(dir.path());

    let first = run_pipeline(&plan).unwrap();
    let second = run_pipeline(&plan).unwrap();

    assert_eq!(first.output.schema, second.output.schema);
    assert_eq!(first.run.fingerprint, second.run.fingerprint);
    assert_ne!(first.run.run_id, second.run.run_id);

    // Tables replaced, not appended; both runs audited
    let conn = open_existing_database(&plan.database).unwrap();
    let facts = verify_counts(&conn)
        .unwrap()
        .into_iter()
        .find(|(table, _)| table == "fact_orders")
        .map(|(_, count)| count);
    assert_eq!(facts, Some(4));
    assert_eq!(recent_runs(&conn, 10).unwrap().len(), 2);
}

#[test]
fn test_missing_database_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_existing_database(&dir.path().join("nope.db")).unwrap_err();
    assert!(err.to_string().contains("Database not found"));
}

#[test]
fn test_missing_input_fails_before_touching_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let plan = RunPlan {
        input: dir.path().join("absent.csv"),
        database: dir.path().join("retail.db"),
        export_dir: None,
    };

    assert!(run_pipeline(&plan).is_err());
    assert!(!plan.database.exists());
}
