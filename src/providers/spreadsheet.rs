//! Reads transaction logs from spreadsheet and CSV exports.

use crate::core::config::ColumnConfig;
use crate::core::ledger::{Ledger, LedgerError, TransactionRow, parse_timestamp};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::path::Path;
use tracing::debug;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Positions of the required columns in a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndices {
    create_date: usize,
    description: usize,
    uid: usize,
    amount: usize,
}

impl ColumnIndices {
    /// Finds every configured column, reporting all missing ones at once.
    fn locate(header: &[String], columns: &ColumnConfig) -> Result<Self, LedgerError> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        let wanted = [
            &columns.create_date,
            &columns.description,
            &columns.uid,
            &columns.amount,
        ];
        let found: Vec<Option<usize>> = wanted.iter().map(|name| find(name.as_str())).collect();

        match found.as_slice() {
            [Some(create_date), Some(description), Some(uid), Some(amount)] => Ok(Self {
                create_date: *create_date,
                description: *description,
                uid: *uid,
                amount: *amount,
            }),
            _ => Err(LedgerError::MissingColumns(
                wanted
                    .iter()
                    .zip(&found)
                    .filter(|(_, index)| index.is_none())
                    .map(|(name, _)| name.to_string())
                    .collect(),
            )),
        }
    }
}

/// Loads and validates the transaction log at `path`.
pub fn load_ledger(path: &Path, columns: &ColumnConfig) -> Result<Ledger, LedgerError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = if extension == "csv" {
        read_csv(path, columns)?
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(path, columns)?
    } else {
        return Err(LedgerError::UnsupportedFormat(path.display().to_string()));
    };

    debug!(rows = rows.len(), path = %path.display(), "Read transaction log");
    Ledger::new(path, rows)
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn read_workbook(path: &Path, columns: &ColumnConfig) -> Result<Vec<TransactionRow>, LedgerError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| read_error(path, "workbook has no worksheets"))?
        .map_err(|e| read_error(path, e))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let indices = ColumnIndices::locate(&header, columns)?;

    Ok(rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| TransactionRow {
            create_date: cells.get(indices.create_date).and_then(cell_timestamp),
            description: cell_text(cells.get(indices.description)),
            uid: cell_text(cells.get(indices.uid)),
            raw_amount: cell_text(cells.get(indices.amount)),
        })
        .collect())
}

fn read_csv(path: &Path, columns: &ColumnConfig) -> Result<Vec<TransactionRow>, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| read_error(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| read_error(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let indices = ColumnIndices::locate(&header, columns)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| read_error(path, e))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let field = |index: usize| record.get(index).unwrap_or_default().to_string();
        rows.push(TransactionRow {
            create_date: record.get(indices.create_date).and_then(parse_timestamp),
            description: field(indices.description),
            uid: field(indices.uid),
            raw_amount: field(indices.amount),
        });
    }
    Ok(rows)
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(cell) => cell.to_string(),
    }
}

fn cell_timestamp(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime(),
        Data::DateTimeIso(text) | Data::String(text) => parse_timestamp(text),
        Data::Float(serial) => excel_serial_to_datetime(*serial),
        Data::Int(serial) => excel_serial_to_datetime(*serial as f64),
        _ => None,
    }
}

/// Converts an Excel serial day number to a timestamp.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    base.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_csv_ledger() {
        let file = csv_file(
            "UID,Create Date,Description,real money change amount,Balance\n\
             1001,2024-01-01 10:00:00,Original Bet,-10USDFIAT,90\n\
             1001,not a date,Sports Bet,-0.01BTC,1\n\
             ,,,,\n\
             1001,2024-01-15,Third Party Win,20USDFIAT,110\n",
        );

        let ledger = load_ledger(file.path(), &ColumnConfig::default()).unwrap();
        assert_eq!(ledger.uid(), "1001");
        assert_eq!(ledger.rows().len(), 3);

        let first = &ledger.rows()[0];
        assert_eq!(first.description, "Original Bet");
        assert_eq!(first.raw_amount, "-10USDFIAT");
        assert_eq!(first.create_date, parse_timestamp("2024-01-01 10:00:00"));
        assert_eq!(ledger.rows()[1].create_date, None);
        assert_eq!(ledger.rows()[2].create_date, parse_timestamp("2024-01-15"));
    }

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    fn text_cell(reference: &str, text: &str) -> String {
        format!(
            r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{text}</t></is></c>"#
        )
    }

    fn worksheet(rows: &[(u32, Vec<String>)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(r, cells)| format!(r#"<row r="{r}">{}</row>"#, cells.concat()))
            .collect();
        format!(r#"<worksheet xmlns="{MAIN_NS}"><sheetData>{rows}</sheetData></worksheet>"#)
    }

    /// Writes a two-sheet workbook: "Log" holds the transactions, "Other" another account.
    fn xlsx_file() -> tempfile::NamedTempFile {
        let header = |row: u32| {
            vec![
                text_cell(&format!("A{row}"), "UID"),
                text_cell(&format!("B{row}"), " Create Date "),
                text_cell(&format!("C{row}"), "Description"),
                text_cell(&format!("D{row}"), "real money change amount"),
            ]
        };
        let log = worksheet(&[
            (1, header(1)),
            (
                2,
                vec![
                    r#"<c r="A2"><v>1001</v></c>"#.to_string(),
                    r#"<c r="B2" s="1"><v>45306.5</v></c>"#.to_string(),
                    text_cell("C2", "Original Bet"),
                    text_cell("D2", "-10USDFIAT"),
                ],
            ),
            (
                3,
                vec![
                    r#"<c r="A3"><v>1001</v></c>"#.to_string(),
                    r#"<c r="B3"><v>45307.25</v></c>"#.to_string(),
                    text_cell("C3", "Sports Bet"),
                    text_cell("D3", "-0.01BTC"),
                ],
            ),
            (
                5,
                vec![
                    r#"<c r="A5"><v>1001</v></c>"#.to_string(),
                    text_cell("B5", "2024-01-20 08:30:00"),
                    text_cell("C5", "Third Party Win"),
                    text_cell("D5", "20USDFIAT"),
                ],
            ),
        ]);
        let other = worksheet(&[
            (1, header(1)),
            (
                2,
                vec![
                    r#"<c r="A2"><v>2002</v></c>"#.to_string(),
                    text_cell("B2", "2024-01-01"),
                    text_cell("C2", "Original Bet"),
                    text_cell("D2", "-1USDFIAT"),
                ],
            ),
        ]);

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Log" sheetId="1" r:id="rId1"/><sheet name="Other" sheetId="2" r:id="rId2"/></sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/styles.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#
                ),
            ),
            ("xl/worksheets/sheet1.xml", log),
            ("xl/worksheets/sheet2.xml", other),
        ];

        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut writer = zip::ZipWriter::new(file.as_file().try_clone().unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    #[test]
    fn test_load_xlsx_ledger_reads_first_sheet() {
        let file = xlsx_file();
        let ledger = load_ledger(file.path(), &ColumnConfig::default()).unwrap();

        assert_eq!(ledger.uid(), "1001");
        assert_eq!(ledger.rows().len(), 3);

        let at = |d: u32, h: u32, m: u32| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        let rows = ledger.rows();
        // Date-formatted cell, bare serial number, then a text timestamp
        assert_eq!(rows[0].create_date, Some(at(15, 12, 0)));
        assert_eq!(rows[1].create_date, Some(at(16, 6, 0)));
        assert_eq!(rows[2].create_date, Some(at(20, 8, 30)));

        assert_eq!(rows[0].description, "Original Bet");
        assert_eq!(rows[0].raw_amount, "-10USDFIAT");
        assert_eq!(rows[1].raw_amount, "-0.01BTC");
        assert_eq!(rows[2].description, "Third Party Win");
        assert!(rows.iter().all(|row| row.uid == "1001"));
    }

    #[test]
    fn test_missing_columns_are_all_reported() {
        let file = csv_file("UID,Description\n1,Original Bet\n");
        let err = load_ledger(file.path(), &ColumnConfig::default()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::MissingColumns(vec![
                "Create Date".to_string(),
                "real money change amount".to_string()
            ])
        );
        assert_eq!(
            err.to_string(),
            "Columns not found: Create Date, real money change amount"
        );
    }

    #[test]
    fn test_multiple_accounts_are_refused() {
        let file = csv_file(
            "Create Date,Description,UID,real money change amount\n\
             2024-01-01,Original Bet,1,10USD\n\
             2024-01-02,Original Bet,2,10USD\n",
        );
        let err = load_ledger(file.path(), &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, LedgerError::MultipleAccounts(_)));
    }

    #[test]
    fn test_custom_column_names() {
        let file = csv_file("When,What,Who,How much\n2024-01-01,Original Bet,7,1BTC\n");
        let columns = ColumnConfig {
            create_date: "When".to_string(),
            description: "What".to_string(),
            uid: "Who".to_string(),
            amount: "How much".to_string(),
        };
        let ledger = load_ledger(file.path(), &columns).unwrap();
        assert_eq!(ledger.uid(), "7");
        assert_eq!(ledger.rows()[0].raw_amount, "1BTC");
    }

    #[test]
    fn test_unsupported_and_unreadable_files() {
        let err = load_ledger(Path::new("log.txt"), &ColumnConfig::default()).unwrap_err();
        assert_eq!(err, LedgerError::UnsupportedFormat("log.txt".to_string()));

        let err = load_ledger(Path::new("/nonexistent/log.xlsx"), &ColumnConfig::default())
            .unwrap_err();
        assert!(matches!(err, LedgerError::Read { .. }));
    }

    #[test]
    fn test_excel_serial_to_datetime() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(excel_serial_to_datetime(45306.5), Some(expected));
        assert_eq!(excel_serial_to_datetime(-1.0), None);
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(cell_text(Some(&Data::Float(1001.0))), "1001");
        assert_eq!(cell_text(Some(&Data::String("-5TRX".to_string()))), "-5TRX");
        assert_eq!(cell_text(Some(&Data::Empty)), "");
        assert_eq!(cell_text(None), "");
        assert_eq!(
            cell_timestamp(&Data::String("2024-01-15 12:00:00".to_string())),
            parse_timestamp("2024-01-15 12:00:00")
        );
        assert_eq!(cell_timestamp(&Data::Bool(true)), None);
    }
}
