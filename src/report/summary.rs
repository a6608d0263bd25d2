//! Run summary display

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::report::ProcessingReport;

/// Timings and headline counts shown at the end of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub load_time: Duration,
    pub pipeline_time: Duration,
    pub save_time: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_load_time(&mut self, duration: Duration) {
        self.load_time = duration;
    }

    pub fn set_pipeline_time(&mut self, duration: Duration) {
        self.pipeline_time = duration;
    }

    pub fn set_save_time(&mut self, duration: Duration) {
        self.save_time = duration;
    }

    pub fn total_time(&self) -> Duration {
        self.load_time + self.pipeline_time + self.save_time
    }

    pub fn display(&self, report: &ProcessingReport) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("📁 Panel Rows"), Cell::new(report.panel_rows)]);
        table.add_row(vec![
            Cell::new("🧮 Encoded Features"),
            Cell::new(report.encoded_features),
        ]);
        table.add_row(vec![
            Cell::new("🗑️  Indeterminate Labels"),
            Cell::new(report.label.indeterminate).fg(if report.label.indeterminate == 0 {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![
            Cell::new("✅ Labeled Rows"),
            Cell::new(report.labeled_rows)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);

        let positive_pct = if report.labeled_rows > 0 {
            report.label.positives as f64 / report.labeled_rows as f64 * 100.0
        } else {
            0.0
        };
        table.add_row(vec![
            Cell::new("📉 Dropout Rate"),
            Cell::new(format!("{:.1}%", positive_pct)).add_attribute(Attribute::Bold),
        ]);

        for (level, color) in [("low", Color::Green), ("medium", Color::Yellow), ("high", Color::Red)] {
            if let Some(count) = report.risk_counts.get(level) {
                table.add_row(vec![
                    Cell::new(format!("🎯 Risk {}", level)),
                    Cell::new(count).fg(color),
                ]);
            }
        }

        table.add_row(vec![
            Cell::new("⏱️  Total Time"),
            Cell::new(format!("{:.2}s", self.total_time().as_secs_f64())),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        if !report.issues.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("ISSUES").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for issue in &report.issues {
                let text = serde_json::to_string(issue).unwrap_or_default();
                println!("        {} {}", style("•").dim(), text);
            }
        }
    }
}
