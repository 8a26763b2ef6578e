// 📈 Charts - plain-text bar charts of the revenue reports
//
// Written next to the report output so a run leaves something viewable
// without a terminal UI. Bars scale to the largest absolute value; negative
// months (returns outweighing sales) are drawn with a lighter glyph.

use crate::analytics::{MonthlyRevenue, ProductRevenue};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 32;

pub fn render_bar_chart(title: &str, points: &[(String, f64)], width: usize) -> String {
    let mut out = format!("{}\n{}\n", title, "═".repeat(title.chars().count()));

    if points.is_empty() {
        out.push_str("(no data)\n");
        return out;
    }

    let max = points
        .iter()
        .map(|(_, v)| v.abs())
        .fold(0.0_f64, f64::max);

    for (label, value) in points {
        let len = if max > 0.0 {
            ((value.abs() / max) * width as f64).round() as usize
        } else {
            0
        };
        let glyph = if *value < 0.0 { "░" } else { "█" };
        out.push_str(&format!(
            "{:<label_width$} │{:<width$}│ {:>14.2}\n",
            truncate(label, LABEL_WIDTH),
            glyph.repeat(len),
            value,
            label_width = LABEL_WIDTH,
            width = width,
        ));
    }

    out
}

pub fn monthly_revenue_chart(months: &[MonthlyRevenue]) -> String {
    let points: Vec<(String, f64)> = months.iter().map(|m| (m.period(), m.revenue)).collect();
    render_bar_chart("Monthly Revenue", &points, BAR_WIDTH)
}

pub fn top_products_chart(products: &[ProductRevenue]) -> String {
    let points: Vec<(String, f64)> = products
        .iter()
        .map(|p| (p.description.clone(), p.revenue))
        .collect();
    render_bar_chart("Top Products by Revenue", &points, BAR_WIDTH)
}

/// Write both charts into `dir`, returning the file paths
pub fn write_charts(
    dir: &Path,
    months: &[MonthlyRevenue],
    products: &[ProductRevenue],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create chart directory {}", dir.display()))?;

    let charts = [
        ("monthly_revenue.txt", monthly_revenue_chart(months)),
        ("top_products.txt", top_products_chart(products)),
    ];

    let mut paths = Vec::new();
    for (name, body) in charts {
        let path = dir.join(name);
        fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "saved chart");
        paths.push(path);
    }

    Ok(paths)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 1).collect();
        format!("{}…", cut)
    }
}
