//! Document loader: walks a source directory and turns every supported file
//! into one or more `Document`s.
//!
//! Unsupported extensions are reported as skipped; unreadable files are
//! recorded as failures. Neither aborts the walk.

use calamine::Reader;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentFormat, DocumentMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a directory: partial success is the normal case.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub files_loaded: usize,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load every file under `dir` (recursively, in path order).
    ///
    /// A missing directory is a configuration error; everything below that is
    /// isolated per file. The directory is canonicalized first so the same
    /// file always gets the same source path (and document id), however the
    /// directory was spelled.
    pub fn load_dir(&self, dir: &Path) -> Result<LoadReport> {
        if !dir.is_dir() {
            return Err(Error::Configuration(format!("source directory {} does not exist", dir.display())));
        }
        let root = dir.canonicalize()?;
        let mut report = LoadReport::default();
        for path in list_files(&root) {
            match self.load_file(&path) {
                Ok(docs) => {
                    tracing::info!("loaded {} document(s) from {}", docs.len(), path.display());
                    report.files_loaded += 1;
                    report.documents.extend(docs);
                }
                Err(Error::UnsupportedFormat(p)) => {
                    tracing::warn!("skipping unsupported file type: {}", p.display());
                    report.skipped.push(p);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failures.push(FileFailure { path: path.clone(), reason: failure_reason(e) });
                }
            }
        }
        tracing::info!(
            "loaded {} documents from {} files ({} skipped, {} failed)",
            report.documents.len(),
            report.files_loaded,
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Load a single file into its documents.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
        let source_path = path.to_string_lossy().to_string();
        let title = path.file_stem().map(|s| s.to_string_lossy().to_string());
        let base = DocumentMetadata { source_path, page: None, sheet: None, title };
        match format {
            DocumentFormat::Text | DocumentFormat::Markdown => read_text(path, format, base),
            DocumentFormat::Pdf => read_pdf(path, base),
            DocumentFormat::Docx => read_docx(path, base),
            DocumentFormat::Spreadsheet => read_spreadsheet(path, base),
        }
    }
}

fn failure_reason(e: Error) -> String {
    match e {
        Error::LoadFailure { reason, .. } => reason,
        other => other.to_string(),
    }
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

fn read_text(path: &Path, format: DocumentFormat, meta: DocumentMetadata) -> Result<Vec<Document>> {
    let bytes = fs::read(path).map_err(|e| Error::load(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| Error::load(path, "unsupported encoding (not UTF-8)"))?;
    let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
    Ok(vec![Document::new(format, text, meta)])
}

fn read_pdf(path: &Path, meta: DocumentMetadata) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load(path).map_err(|e| Error::load(path, format!("corrupt pdf: {e}")))?;
    if pdf.is_encrypted() {
        return Err(Error::load(path, "encrypted pdf"));
    }
    let mut docs = Vec::new();
    for page_number in pdf.get_pages().keys().copied() {
        let text = match pdf.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("no text on page {} of {}: {}", page_number, path.display(), e);
                continue;
            }
        };
        let text = text.replace('\0', "");
        if text.trim().is_empty() {
            continue;
        }
        let page_meta = DocumentMetadata { page: Some(page_number), ..meta.clone() };
        docs.push(Document::new(DocumentFormat::Pdf, text, page_meta));
    }
    if docs.is_empty() {
        return Err(Error::load(path, "no extractable text (image-only or empty pdf)"));
    }
    Ok(docs)
}

fn read_docx(path: &Path, meta: DocumentMetadata) -> Result<Vec<Document>> {
    let bytes = fs::read(path).map_err(|e| Error::load(path, e))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| Error::load(path, format!("corrupt docx: {e}")))?;
    let mut content = String::new();
    for child in docx.document.children {
        // tables, section properties and the like carry no body text here
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            content.push_str(&t.text);
                        }
                    }
                }
            }
            content.push('\n');
        }
    }
    Ok(vec![Document::new(DocumentFormat::Docx, content, meta)])
}

fn read_spreadsheet(path: &Path, meta: DocumentMetadata) -> Result<Vec<Document>> {
    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|e| Error::load(path, format!("corrupt spreadsheet: {e}")))?;
    let mut docs = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("cannot read sheet '{}' in {}: {}", sheet_name, path.display(), e);
                continue;
            }
        };
        let mut sheet_text = String::new();
        for row in range.rows() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            sheet_text.push_str(&cells.join(" | "));
            sheet_text.push('\n');
        }
        if sheet_text.is_empty() {
            continue;
        }
        let sheet_meta = DocumentMetadata { sheet: Some(sheet_name.clone()), ..meta.clone() };
        docs.push(Document::new(DocumentFormat::Spreadsheet, sheet_text, sheet_meta));
    }
    Ok(docs)
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty | calamine::Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}
