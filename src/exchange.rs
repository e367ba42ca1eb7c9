//! Spreadsheet exchange: UTF-8 CSV files with a named header row.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const BOM: &str = "\u{feff}";

/// Outcome of a bulk import. Row failures never abort the batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn record<T>(&mut self, line: usize, outcome: AppResult<T>) {
        match outcome {
            Ok(_) => self.success_count += 1,
            Err(e) => {
                log::warn!("import row {line} rejected: {e}");
                self.error_count += 1;
                self.errors.push(format!("row {line}: {e}"));
            }
        }
    }
}

pub struct Sheet {
    columns: HashMap<String, usize>,
    records: Vec<csv::StringRecord>,
}

pub struct SheetRow<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl SheetRow<'_> {
    /// Trimmed cell text; empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    pub fn opt(&self, column: &str) -> Option<String> {
        let v = self.get(column);
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    }
}

impl Sheet {
    /// Reads a whole file, refusing anything above the configured upload size.
    pub fn read(path: &Path, config: &Config) -> AppResult<Sheet> {
        if let Some(len) = config.check_file_size(path)? {
            return Err(AppError::validation(format!(
                "file is {len} bytes, larger than the {} byte limit",
                config.max_file_size
            )));
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(path)?;
        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches(BOM).trim().to_string(), i))
            .collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Sheet { columns, records })
    }

    /// Yields `(line, row)` where `line` is the spreadsheet row number
    /// (1-based, header on line 1).
    pub fn rows(&self) -> impl Iterator<Item = (usize, SheetRow<'_>)> {
        self.records.iter().enumerate().map(move |(i, record)| {
            (
                i + 2,
                SheetRow {
                    columns: &self.columns,
                    record,
                },
            )
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Writes a header row and data rows. The BOM keeps spreadsheet apps
/// from misreading Korean headers.
pub fn write_sheet<I>(path: &Path, headers: &[&str], rows: I) -> AppResult<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(BOM.as_bytes())?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(headers)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(&row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

pub fn yes_no(flag: bool) -> String {
    if flag { "Y" } else { "N" }.to_string()
}

pub fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "academyd-exchange-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir.join(name)
    }

    #[test]
    fn written_sheet_reads_back_by_header_name() {
        let path = temp_file("sheet.csv");
        let n = write_sheet(
            &path,
            &["이름", "연락처"],
            vec![
                vec!["김철수".to_string(), "010-1111-2222".to_string()],
                vec!["이, 영희".to_string(), String::new()],
            ],
        )
        .expect("write");
        assert_eq!(n, 2);

        let sheet = Sheet::read(&path, &Config::default()).expect("read");
        let rows: Vec<_> = sheet.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(rows[0].1.get("이름"), "김철수");
        assert_eq!(rows[1].1.get("이름"), "이, 영희");
        assert_eq!(rows[1].1.opt("연락처"), None);
        assert_eq!(rows[1].1.get("없는열"), "");
    }

    #[test]
    fn oversized_files_are_refused() {
        let path = temp_file("big.csv");
        std::fs::write(&path, "이름\n가나다\n").expect("write");
        let cfg = Config {
            max_file_size: 4,
            ..Config::default()
        };
        let err = Sheet::read(&path, &cfg).err().expect("refused");
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn summary_counts_and_formats_rows() {
        let mut summary = ImportSummary::default();
        summary.record(2, Ok(()));
        summary.record::<()>(3, Err(AppError::validation("name is required")));
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.errors, vec!["row 3: name is required".to_string()]);
    }
}
