// Retail Star - Core Library
// Transform core (normalize → dimensions → facts → contract) plus the
// extract / load / report collaborators used by the CLI and the API server.

pub mod error;
pub mod extract;
pub mod normalizer;
pub mod dimensions;
pub mod fact;
pub mod contract;
pub mod transform;

pub mod config;
pub mod logging;
pub mod load;
pub mod export;
pub mod analytics;
pub mod charts;
pub mod pipeline;

// Re-export commonly used types
pub use error::{LookupKind, TransformError, UnresolvedKey};
pub use extract::{load_csv, read_rows, RawTransactionRow};
pub use normalizer::{
    normalize, InvalidReason, InvalidRowCounts, Normalized, NormalizedRow, Validity,
    UNKNOWN_CUSTOMER,
};
pub use dimensions::{
    CustomerBuilder, DateBuilder, DimCustomer, DimDate, DimProduct, Dimension, DimensionBuilder,
    DimensionRow, ProductBuilder, SurrogateKey,
};
pub use fact::{assemble, FactOrderLine};
pub use contract::{validate, Rule, ValidationReport, Violation};
pub use transform::{transform, StarSchema, TransformOutput, TransformReport};
pub use config::Config;
pub use load::{
    insert_run, load_star_schema, recent_runs, setup_database, verify_counts, LoadSummary,
    RunRecord,
};
pub use analytics::{list_tables, monthly_revenue, preview, top_products, MonthlyRevenue, ProductRevenue};
pub use pipeline::{run_pipeline, RunOutcome, RunPlan};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
