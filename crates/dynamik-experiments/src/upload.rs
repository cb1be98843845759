//! Upload checks and CSV header handling.

use dynamik_common::settings::UploadSettings;
use dynamik_common::units::format_size;
use dynamik_common::{DynamikError, RejectionKind, Result};
use tracing::debug;

/// A file as received from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, content: Vec<u8>) -> Self {
        Self { name: name.into(), content_type, content }
    }

    fn is_csv(&self) -> bool {
        let by_extension = self
            .name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("csv"));
        let by_type = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.split(';').next().is_some_and(|m| m.trim().eq_ignore_ascii_case("text/csv")));
        by_extension || by_type
    }
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl From<&UploadSettings> for UploadPolicy {
    fn from(settings: &UploadSettings) -> Self {
        Self { max_bytes: settings.max_bytes, max_files: settings.max_files }
    }
}

impl UploadPolicy {
    /// Reject the whole batch on the first offending file.
    pub fn check(&self, files: &[UploadedFile]) -> Result<()> {
        if files.is_empty() {
            return Err(DynamikError::rejected("", RejectionKind::Empty, "no file selected"));
        }
        if files.len() > self.max_files {
            return Err(DynamikError::rejected(
                &files[self.max_files].name,
                RejectionKind::TooManyFiles,
                format!("too many files, at most {} allowed", self.max_files),
            ));
        }

        for file in files {
            if !file.is_csv() {
                return Err(DynamikError::rejected(
                    &file.name,
                    RejectionKind::WrongType,
                    "only CSV files allowed",
                ));
            }
            if file.content.len() as u64 > self.max_bytes {
                return Err(DynamikError::rejected(
                    &file.name,
                    RejectionKind::TooLarge,
                    format!("file is larger than {}", format_size(self.max_bytes)),
                ));
            }
            if file.content.is_empty() {
                return Err(DynamikError::rejected(&file.name, RejectionKind::Empty, "file is empty"));
            }
        }
        Ok(())
    }
}

fn reader(content: &[u8]) -> csv::Reader<&[u8]> {
    let content = content.strip_prefix("\u{feff}".as_bytes()).unwrap_or(content);
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content)
}

fn fields(record: &csv::ByteRecord) -> Vec<String> {
    record.iter().map(|field| String::from_utf8_lossy(field).into_owned()).collect()
}

/// First `limit` records of a CSV file, header included. Blank lines are
/// skipped; reading stops at the first malformed record.
pub fn preview_rows(content: &[u8], limit: usize) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for record in reader(content).byte_records().take(limit) {
        match record {
            Ok(record) => rows.push(fields(&record)),
            Err(e) => {
                debug!("Preview stopped at malformed record: {e}");
                break;
            }
        }
    }
    rows
}

/// Column names from the header record, trimmed, first occurrence kept.
pub fn parse_header(content: &[u8]) -> Vec<String> {
    let first = match reader(content).byte_records().next() {
        Some(Ok(record)) => fields(&record),
        Some(Err(e)) => {
            debug!("Unreadable CSV header: {e}");
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut headers: Vec<String> = Vec::new();
    for column in first {
        if !column.is_empty() && !headers.contains(&column) {
            headers.push(column);
        }
    }
    headers
}

/// Merged headers of several files, in first-seen order.
pub fn merge_headers<'a>(files: impl IntoIterator<Item = &'a [u8]>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for content in files {
        for column in parse_header(content) {
            if !headers.contains(&column) {
                headers.push(column);
            }
        }
    }
    headers
}
