//! Conversion of user-selected files into the CSV the ingestion service accepts
//!
//! A `.csv` candidate is passed through byte for byte. A `.xlsx` candidate is
//! parsed as a workbook and its first sheet (by position) is written out as
//! CSV under the same base name. Every other extension is refused before the
//! file is touched.

use calamine::{Data, Range, Reader, Xlsx};
use log::{debug, warn};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::errors::{ClassifiedError, ErrorCategory};

pub const CSV_MEDIA_TYPE: &str = "text/csv";

const CSV_EXTENSION: &str = ".csv";
const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Where the bytes of a candidate come from
#[derive(Clone, Debug)]
pub enum CandidateSource {
    /// Read lazily, only once the extension has been accepted
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file picked by the user, not yet checked or converted
#[derive(Clone, Debug)]
pub struct UploadCandidate {
    pub name: String,
    pub source: CandidateSource,
}

impl UploadCandidate {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        UploadCandidate {
            name,
            source: CandidateSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadCandidate {
            name: name.into(),
            source: CandidateSource::Bytes(bytes),
        }
    }

    fn kind(&self) -> Option<CandidateKind> {
        let lower = self.name.to_lowercase();
        if lower.ends_with(CSV_EXTENSION) {
            Some(CandidateKind::Csv)
        } else if lower.ends_with(WORKBOOK_EXTENSION) {
            Some(CandidateKind::Workbook)
        } else {
            None
        }
    }

    async fn read(self) -> std::io::Result<Vec<u8>> {
        match self.source {
            CandidateSource::Bytes(bytes) => Ok(bytes),
            CandidateSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CandidateKind {
    Csv,
    Workbook,
}

/// CSV ready to be handed to the ingestion service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedFile {
    pub file_name: String,
    pub media_type: &'static str,
    pub contents: Vec<u8>,
}

/// Why a workbook could not be turned into CSV
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("workbook could not be opened: {0}")]
    Open(#[from] calamine::XlsxError),

    #[error("workbook contains no sheets")]
    NoSheets,

    #[error("sheet could not be written as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not UTF-8")]
    Encoding,
}

/// Normalize a candidate into CSV
///
/// Exactly one outcome per call: the normalized file, or a
/// `FORMAT_UNSUPPORTED` / `FORMAT_PARSE_ERROR` classified error. Workbook
/// parsing runs on the blocking pool so the caller's task stays responsive.
pub async fn normalize(candidate: UploadCandidate) -> Result<NormalizedFile, ClassifiedError> {
    let kind = candidate.kind().ok_or_else(|| {
        debug!("rejecting {:?}: unsupported extension", candidate.name);
        ClassifiedError::new(
            ErrorCategory::FormatUnsupported,
            "Please upload a .xlsx or .csv file",
        )
    })?;

    let name = candidate.name.clone();
    let bytes = candidate.read().await.map_err(|e| {
        warn!("could not read {:?}: {}", name, e);
        parse_error()
    })?;

    match kind {
        CandidateKind::Csv => Ok(NormalizedFile {
            file_name: name,
            media_type: CSV_MEDIA_TYPE,
            contents: bytes,
        }),
        CandidateKind::Workbook => {
            let csv = tokio::task::spawn_blocking(move || workbook_to_csv(&bytes))
                .await
                .map_err(|e| {
                    warn!("workbook conversion task failed: {}", e);
                    parse_error()
                })?
                .map_err(|e| {
                    warn!("could not convert {:?}: {}", name, e);
                    parse_error()
                })?;

            debug!("converted {:?} to {} bytes of CSV", name, csv.len());
            Ok(NormalizedFile {
                file_name: csv_name(&name),
                media_type: CSV_MEDIA_TYPE,
                contents: csv.into_bytes(),
            })
        }
    }
}

fn parse_error() -> ClassifiedError {
    ClassifiedError::new(
        ErrorCategory::FormatParseError,
        "Error parsing .xlsx file. Please ensure it has the correct format.",
    )
}

/// `plant.XLSX` becomes `plant.csv`
fn csv_name(workbook_name: &str) -> String {
    let cut = workbook_name.len().saturating_sub(WORKBOOK_EXTENSION.len());
    let base = workbook_name.get(..cut).unwrap_or(workbook_name);
    format!("{}{}", base, CSV_EXTENSION)
}

/// Convert the first sheet of an in-memory workbook to CSV text
pub fn workbook_to_csv(bytes: &[u8]) -> Result<String, WorkbookError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_names = workbook.sheet_names();
    let first = first_sheet(&sheet_names)?.to_string();
    let range = workbook.worksheet_range(&first)?;

    range_to_csv(&range)
}

fn first_sheet(names: &[String]) -> Result<&str, WorkbookError> {
    names
        .first()
        .map(String::as_str)
        .ok_or(WorkbookError::NoSheets)
}

/// Write the used area of a sheet as CSV
///
/// The first used row becomes the header line and the first used column the
/// first field, wherever the table sits on the sheet.
fn range_to_csv(range: &Range<Data>) -> Result<String, WorkbookError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in range.rows() {
        let record: Vec<String> = row.iter().map(cell_text).collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| WorkbookError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| WorkbookError::Encoding)
}

/// Text of a cell the way a spreadsheet shows it
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => general_number(*f),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == chrono::NaiveTime::MIN => {
                value.date().format("%Y-%m-%d").to_string()
            }
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// A number as the General format shows it
///
/// Workbooks keep 15 significant digits, so anything past that is binary
/// noise from the stored double (`0.1 + 0.2`).
fn general_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    format!("{:.14e}", value)
        .parse::<f64>()
        .unwrap_or(value)
        .to_string()
}
