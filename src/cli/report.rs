use super::ui;
use crate::core::ledger::{Ledger, filter_by_category, time_frame};
use crate::core::{Summary, UnrecognizedEntry};
use chrono::NaiveDateTime;
use comfy_table::Cell;

impl Summary {
    /// Renders the per-currency totals under `title`, followed by the USD total.
    /// Unconverted currencies show "N/A" in the USD column.
    pub fn display_as_table(&self, title: &str) -> String {
        let mut output = format!("{}\n\n", ui::style_text(title, ui::StyleType::Title));

        if self.lines.is_empty() {
            output.push_str(&ui::style_text("No transactions", ui::StyleType::Subtle));
        } else {
            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Currency"),
                ui::header_cell("Total"),
                ui::header_cell("USD Value"),
            ]);
            for line in &self.lines {
                table.add_row(vec![
                    Cell::new(&line.currency),
                    ui::amount_cell(line.total),
                    ui::optional_amount_cell(line.usd),
                ]);
            }
            output.push_str(&table.to_string());
        }

        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text("Total USD value:", ui::StyleType::TotalLabel),
            ui::style_text(
                &format!("{:.2} USD", self.total_usd),
                ui::StyleType::TotalValue
            )
        ));

        output
    }
}

/// Lists amounts no price source could convert, in red.
pub fn display_unresolved(entries: &[UnrecognizedEntry]) -> String {
    let mut output = ui::style_text("Unrecognized currencies:", ui::StyleType::Error);
    for entry in entries {
        output.push_str(&format!(
            "\n  {}",
            ui::style_text(
                &format!("{} {}", entry.total, entry.currency),
                ui::StyleType::Error
            )
        ));
    }
    output
}

fn format_frame(frame: Option<(NaiveDateTime, NaiveDateTime)>) -> String {
    match frame {
        Some((start, end)) => format!("{start} - {end}"),
        None => "N/A".to_string(),
    }
}

/// Summary of a freshly loaded transaction log.
pub fn display_banner(ledger: &Ledger, wagering: &[String]) -> String {
    let overall = time_frame(ledger.rows());
    let filtered = time_frame(filter_by_category(ledger.rows(), wagering));

    [
        ui::style_text(
            &format!("File successfully read: {}", ledger.source().display()),
            ui::StyleType::Highlight,
        ),
        format!(
            "{} {}",
            ui::style_text("UID:", ui::StyleType::TotalLabel),
            ledger.uid()
        ),
        format!(
            "{} {}",
            ui::style_text("Time frame (Overall):", ui::StyleType::TotalLabel),
            format_frame(overall)
        ),
        format!(
            "{} {}",
            ui::style_text("Time frame (Filtered):", ui::StyleType::TotalLabel),
            format_frame(filtered)
        ),
    ]
    .join("\n")
}
