//! CSV and zip downloads.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/{family}/{category}/as-csv` | Optional `measure`, `filters` |
//! | `GET`  | `/download-all` | Zip of one CSV per category and measure |

use std::io::{Cursor, Write};

use axum::{
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use ecco_core::{
  Engine, GeographyFamily, export::archive_name, query::CsvExport, store::StatsStore,
};
use serde::Deserialize;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{datasets::DatasetPath, error::ApiError};

// ─── Encoding ────────────────────────────────────────────────────────────────

fn write_csv<W: Write>(out: W, export: &CsvExport) -> Result<W, ApiError> {
  let mut wtr = csv::Writer::from_writer(out);
  wtr.write_record(&export.header)?;
  for row in &export.rows {
    wtr.write_record(row)?;
  }
  wtr.into_inner().map_err(|e| ApiError::Export(e.to_string()))
}

/// Encode an export as CSV, header first.
pub fn encode_csv(export: &CsvExport) -> Result<Vec<u8>, ApiError> {
  write_csv(Vec::new(), export)
}

/// A deflated zip archive that CSV exports are encoded into directly, one
/// entry at a time.
pub struct CsvArchive {
  writer:  ZipWriter<Cursor<Vec<u8>>>,
  options: SimpleFileOptions,
  entries: usize,
}

impl Default for CsvArchive {
  fn default() -> Self {
    Self {
      writer:  ZipWriter::new(Cursor::new(Vec::new())),
      options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
      entries: 0,
    }
  }
}

impl CsvArchive {
  /// Start a new entry at `path` and encode `export` into it.
  pub fn add(&mut self, path: String, export: &CsvExport) -> Result<(), ApiError> {
    self.writer.start_file(path, self.options)?;
    write_csv(&mut self.writer, export)?;
    self.entries += 1;
    Ok(())
  }

  pub fn entries(&self) -> usize { self.entries }

  /// Write the central directory and return the archive bytes.
  pub fn finish(self) -> Result<Vec<u8>, ApiError> {
    Ok(self.writer.finish()?.into_inner())
  }
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
  (
    StatusCode::OK,
    [
      (header::CONTENT_TYPE, content_type.to_owned()),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\""),
      ),
    ],
    body,
  )
    .into_response()
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CsvParams {
  pub measure: Option<String>,
  pub filters: Option<String>,
}

/// `GET /{family}/{category}/as-csv[?measure=...][&filters=...]`
pub async fn as_csv<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path((family, category)): DatasetPath,
  Query(params): Query<CsvParams>,
) -> Result<Response, ApiError> {
  let family = GeographyFamily::parse(&family)?;
  let export = engine
    .csv_export(
      family,
      &category,
      params.measure.as_deref(),
      params.filters.as_deref(),
    )
    .await?;
  let body = encode_csv(&export)?;
  Ok(attachment("text/csv; charset=utf-8", &export.filename, body))
}

/// `GET /download-all`
pub async fn all<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
) -> Result<Response, ApiError> {
  let plan = engine.export_plan().await?;

  // Each export is dropped once encoded; only the compressed archive grows.
  let mut archive = CsvArchive::default();
  for entry in plan {
    let export = engine
      .csv_export(entry.family, &entry.category, Some(&entry.measure), None)
      .await?;
    archive.add(entry.path, &export)?;
  }
  tracing::info!(files = archive.entries(), "built bulk export");

  let archive = archive.finish()?;
  let filename = archive_name(&engine.settings().export_prefix);
  Ok(attachment("application/zip", &filename, archive))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn csv_quotes_fields_with_commas() {
    let export = CsvExport {
      filename: "x.csv".into(),
      header:   vec!["GEOID".into(), "County".into()],
      rows:     vec![vec!["08031".into(), "Denver, City and County".into()]],
    };
    let text = String::from_utf8(encode_csv(&export).unwrap()).unwrap();
    assert_eq!(text, "GEOID,County\n08031,\"Denver, City and County\"\n");
  }

  #[test]
  fn archive_entries_hold_encoded_csv() {
    let export = |value: &str| CsvExport {
      filename: "x.csv".into(),
      header:   vec!["GEOID".into(), "value".into()],
      rows:     vec![vec!["08031".into(), value.into()]],
    };
    let mut archive = CsvArchive::default();
    archive.add("county/A/a.csv".into(), &export("1")).unwrap();
    archive.add("county/A/b.csv".into(), &export("2")).unwrap();
    assert_eq!(archive.entries(), 2);

    let mut reader = zip::ZipArchive::new(Cursor::new(archive.finish().unwrap())).unwrap();
    let mut names: Vec<&str> = reader.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["county/A/a.csv", "county/A/b.csv"]);

    let mut text = String::new();
    std::io::Read::read_to_string(&mut reader.by_name("county/A/b.csv").unwrap(), &mut text)
      .unwrap();
    assert_eq!(text, "GEOID,value\n08031,2\n");
  }
}
