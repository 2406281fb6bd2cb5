//! Tabular store: the spreadsheet tasks are read from and results written back to.
//!
//! `.xlsx`/`.xlsm` files are read with calamine and written with
//! rust_xlsxwriter, thumbnails becoming images anchored in the embed column.
//! Anything else is treated as CSV, where the embed column holds the
//! thumbnail path.

use crate::{CaptureResult, CaptureTask, PersistenceError, TableColumns, ThumbnailSize};
use calamine::{open_workbook, Data, Reader, Xlsx};
use image::imageops::FilterType;
use rust_xlsxwriter::{Image, Workbook};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => SheetFormat::Xlsx,
            _ => SheetFormat::Csv,
        }
    }
}

/// In-memory copy of the table plus the mapping from tasks to rows.
#[derive(Debug, Clone)]
pub struct TaskSheet {
    path: PathBuf,
    columns: TableColumns,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Row index of each task, in task order.
    task_rows: Vec<usize>,
    /// Thumbnail file per row, anchored as an image when saved as xlsx.
    images: BTreeMap<usize, PathBuf>,
    image_size: ThumbnailSize,
}

/// Outcome of the thumbnail embedding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub embedded: usize,
    pub missing: usize,
    pub failed: usize,
}

impl TaskSheet {
    /// Read the table at `path`; header names are trimmed before matching.
    ///
    /// Rows longer than the header row get unnamed header cells so that
    /// columns appended later never land on existing data.
    pub fn load(path: impl Into<PathBuf>, columns: TableColumns) -> Result<Self, PersistenceError> {
        let path = path.into();
        let (mut headers, mut rows) = match SheetFormat::from_path(&path) {
            SheetFormat::Csv => read_csv(&path)?,
            SheetFormat::Xlsx => read_xlsx(&path)?,
        };

        let width = rows.iter().map(Vec::len).fold(headers.len(), usize::max);
        headers.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let mut sheet = Self {
            path,
            columns,
            headers,
            rows,
            task_rows: Vec::new(),
            images: BTreeMap::new(),
            image_size: ThumbnailSize::default(),
        };
        sheet.index_tasks()?;

        info!(
            "Loaded {} rows from {} ({} with a target)",
            sheet.rows.len(),
            sheet.path.display(),
            sheet.task_rows.len()
        );
        Ok(sheet)
    }

    fn index_tasks(&mut self) -> Result<(), PersistenceError> {
        let target = self.require_column(&self.columns.target_column)?;
        self.require_column(&self.columns.label_column)?;

        self.task_rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row[target].trim().is_empty())
            .map(|(idx, _)| idx)
            .collect();
        Ok(())
    }

    fn column(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, PersistenceError> {
        self.column(name)
            .ok_or_else(|| PersistenceError::MissingColumn(name.trim().to_string()))
    }

    /// Index of `name`, appending an empty column when absent.
    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.trim().to_string());
        for row in &mut self.rows {
            row.resize(self.headers.len(), String::new());
        }
        self.headers.len() - 1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SheetFormat {
        SheetFormat::from_path(&self.path)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows skipped because their target cell is empty.
    pub fn skipped_rows(&self) -> usize {
        self.rows.len() - self.task_rows.len()
    }

    /// One task per row with a non-empty target, in row order.
    pub fn tasks(&self) -> Vec<CaptureTask> {
        let target = self.column(&self.columns.target_column);
        let label = self.column(&self.columns.label_column);

        match (target, label) {
            (Some(target), Some(label)) => self
                .task_rows
                .iter()
                .map(|&row| CaptureTask::new(&self.rows[row][target], &self.rows[row][label]))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Fill the artifact column from `results`, which must be in task order.
    /// Failed tasks and rows without a target get an empty cell.
    pub fn record_results(&mut self, results: &[CaptureResult]) {
        if results.len() != self.task_rows.len() {
            warn!(
                "Recording {} results for {} tasks; unmatched rows stay empty",
                results.len(),
                self.task_rows.len()
            );
        }

        let column = self.ensure_column(&self.columns.artifact_column.clone());
        for row in &mut self.rows {
            row[column].clear();
        }

        for (&row, result) in self.task_rows.iter().zip(results) {
            if let Some(artifact) = result.artifact() {
                self.rows[row][column] = artifact.display().to_string();
            }
        }
    }

    /// Write a resized copy of every artifact present on disk into
    /// `thumbnail_dir` and record it in the embed column: as the thumbnail
    /// path, and as an inline image once the sheet is saved as xlsx.
    ///
    /// Individual image failures are logged and counted, never fatal.
    pub fn embed_thumbnails(&mut self, thumbnail_dir: &Path, size: ThumbnailSize) -> Result<EmbedReport, PersistenceError> {
        std::fs::create_dir_all(thumbnail_dir)?;

        let artifact_column = self.ensure_column(&self.columns.artifact_column.clone());
        let embed_column = self.ensure_column(&self.columns.embed_column.clone());
        let mut report = EmbedReport::default();
        self.images.clear();
        self.image_size = size;

        for &row in &self.task_rows {
            self.rows[row][embed_column].clear();

            let artifact = PathBuf::from(self.rows[row][artifact_column].trim());
            if artifact.as_os_str().is_empty() || !artifact.exists() {
                report.missing += 1;
                continue;
            }

            match write_thumbnail(&artifact, thumbnail_dir, size) {
                Ok(thumbnail) => {
                    self.rows[row][embed_column] = thumbnail.display().to_string();
                    self.images.insert(row, thumbnail);
                    report.embedded += 1;
                }
                Err(e) => {
                    warn!("Failed to embed {}: {}", artifact.display(), e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Embedded {} thumbnails ({} missing, {} failed)",
            report.embedded, report.missing, report.failed
        );
        Ok(report)
    }

    /// Write the table back to the file it was loaded from.
    pub fn save(&self) -> Result<(), PersistenceError> {
        self.save_to(&self.path)
    }

    /// Write the table to `path`, in the format its extension names.
    pub fn save_to(&self, path: &Path) -> Result<(), PersistenceError> {
        match SheetFormat::from_path(path) {
            SheetFormat::Csv => self.write_csv(path)?,
            SheetFormat::Xlsx => self.write_xlsx(path)?,
        }

        info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    fn write_csv(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_xlsx(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let embed_column = self.column(&self.columns.embed_column);

        for (col, header) in self.headers.iter().enumerate() {
            worksheet.write_string(0, sheet_col(col), header.as_str())?;
        }

        for (idx, row) in self.rows.iter().enumerate() {
            let sheet_row = idx as u32 + 1;
            for (col, value) in row.iter().enumerate() {
                // Cells holding an image stay empty.
                let anchored = Some(col) == embed_column && self.images.contains_key(&idx);
                if !value.is_empty() && !anchored {
                    worksheet.write_string(sheet_row, sheet_col(col), value.as_str())?;
                }
            }
        }

        if let Some(col) = embed_column.filter(|_| !self.images.is_empty()) {
            worksheet.set_column_width_pixels(sheet_col(col), pixels(self.image_size.width))?;

            for (&idx, thumbnail) in &self.images {
                let sheet_row = idx as u32 + 1;
                let image = Image::new(thumbnail)?;
                worksheet.set_row_height_pixels(sheet_row, pixels(self.image_size.height))?;
                worksheet.insert_image(sheet_row, sheet_col(col), &image)?;
                debug!("Anchored {} at row {}", thumbnail.display(), sheet_row + 1);
            }
        }

        workbook.save(path)?;
        Ok(())
    }
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), PersistenceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

/// First worksheet of the workbook; its first row holds the headers.
fn read_xlsx(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), PersistenceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PersistenceError::EmptyWorkbook(path.to_path_buf()))??;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    Ok((headers, rows.collect()))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn sheet_col(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

fn pixels(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn write_thumbnail(artifact: &Path, thumbnail_dir: &Path, size: ThumbnailSize) -> Result<PathBuf, PersistenceError> {
    let img = image::open(artifact)?;
    let thumbnail = img.resize_exact(size.width, size.height, FilterType::Triangle);

    let file_name = artifact
        .file_stem()
        .map(|stem| format!("{}.png", stem.to_string_lossy()))
        .unwrap_or_else(|| "thumbnail.png".to_string());
    let path = thumbnail_dir.join(file_name);

    thumbnail.save(&path)?;
    Ok(path)
}
