//! Lesson packs on disk (JSON, CSV and Excel)

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::info;
use std::path::{Path, PathBuf};

use crate::error::{LingoError, LingoResult};
use crate::lesson::{DailyLesson, ItemKind, SentenceItem, WordItem};
use crate::services::ContentProvider;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Load a lesson pack, picking the parser from the file extension
pub fn load_lesson_file<P: AsRef<Path>>(file_path: P) -> LingoResult<DailyLesson> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let lesson = match extension.as_str() {
        "json" => {
            let payload = std::fs::read_to_string(path).map_err(|e| {
                LingoError::Import(format!("Failed to read {}: {}", path.display(), e))
            })?;
            DailyLesson::from_json(&payload)?
        }
        "csv" => parse_csv(path)?,
        "xlsx" => parse_excel(path)?,
        _ => return Err(LingoError::Import(format!("Unsupported file format: .{}", extension))),
    };

    info!(
        "Loaded lesson '{}' from {} ({} words, {} sentences)",
        lesson.theme,
        path.display(),
        lesson.words.len(),
        lesson.sentences.len()
    );
    Ok(lesson)
}

/// Column index mapping for tabular packs.
///
/// `Word`/`Meaning` columns feed word rows and `English`/`Korean` columns feed
/// sentence rows; the generic `Text`/`Translation` columns serve either kind.
#[derive(Debug, Default, Clone)]
struct ColumnMapping {
    kind: usize,
    text: Option<usize>,
    translation: Option<usize>,
    word: Option<usize>,
    meaning: Option<usize>,
    english: Option<usize>,
    korean: Option<usize>,
    id: Option<usize>,
    phonetic: Option<usize>,
    example: Option<usize>,
    situation: Option<usize>,
    theme: Option<usize>,
}

impl ColumnMapping {
    fn text_for(&self, kind: ItemKind) -> Option<usize> {
        match kind {
            ItemKind::Word => self.word.or(self.text),
            ItemKind::Sentence => self.english.or(self.text),
        }
    }

    fn translation_for(&self, kind: ItemKind) -> Option<usize> {
        match kind {
            ItemKind::Word => self.meaning.or(self.translation),
            ItemKind::Sentence => self.korean.or(self.translation),
        }
    }
}

/// Detect column indices from header names
fn detect_columns(headers: &[String]) -> LingoResult<ColumnMapping> {
    let mut kind = None;
    let mut mapping = ColumnMapping::default();

    for (i, header) in headers.iter().enumerate() {
        let name = header.trim().to_lowercase();
        let slot = match name.as_str() {
            "type" | "kind" => &mut kind,
            "text" => &mut mapping.text,
            "translation" => &mut mapping.translation,
            "word" => &mut mapping.word,
            "meaning" => &mut mapping.meaning,
            "english" => &mut mapping.english,
            "korean" => &mut mapping.korean,
            "id" => &mut mapping.id,
            "phonetic" | "pronunciation" => &mut mapping.phonetic,
            "example" => &mut mapping.example,
            "situation" | "context" => &mut mapping.situation,
            "theme" => &mut mapping.theme,
            _ => continue,
        };
        if slot.replace(i).is_some() {
            return Err(LingoError::Import(format!(
                "Duplicate column '{}' in file header",
                header.trim()
            )));
        }
    }

    mapping.kind = kind.ok_or_else(|| missing_column("Type"))?;
    for item_kind in [ItemKind::Word, ItemKind::Sentence] {
        if mapping.text_for(item_kind).is_none() {
            return Err(missing_column("Text"));
        }
        if mapping.translation_for(item_kind).is_none() {
            return Err(missing_column("Translation"));
        }
    }
    Ok(mapping)
}

fn missing_column(name: &str) -> LingoError {
    LingoError::Import(format!("Missing required '{}' column in file header", name))
}

/// Accumulates rows into a lesson
struct LessonBuilder {
    mapping: ColumnMapping,
    theme: Option<String>,
    words: Vec<WordItem>,
    sentences: Vec<SentenceItem>,
}

impl LessonBuilder {
    fn new(mapping: ColumnMapping) -> Self {
        Self {
            mapping,
            theme: None,
            words: Vec::new(),
            sentences: Vec::new(),
        }
    }

    fn push_row(&mut self, row: &[String], line: usize) -> LingoResult<()> {
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        let kind = match cell(Some(self.mapping.kind)).to_lowercase().as_str() {
            "word" | "vocabulary" => ItemKind::Word,
            "sentence" | "conversation" => ItemKind::Sentence,
            // blank spacer row
            "" => return Ok(()),
            other => {
                return Err(LingoError::Import(format!(
                    "Row {}: unknown item type '{}'",
                    line, other
                )))
            }
        };

        let text = cell(self.mapping.text_for(kind));
        if text.is_empty() {
            return Ok(());
        }
        if self.theme.is_none() {
            let theme = cell(self.mapping.theme);
            if !theme.is_empty() {
                self.theme = Some(theme);
            }
        }

        let id = cell(self.mapping.id);
        let translation = cell(self.mapping.translation_for(kind));

        match kind {
            ItemKind::Word => {
                let id = if id.is_empty() {
                    format!("w{}", self.words.len() + 1)
                } else {
                    id
                };
                self.words.push(WordItem {
                    id,
                    word: text,
                    meaning: translation,
                    phonetic: cell(self.mapping.phonetic),
                    example: cell(self.mapping.example),
                });
            }
            ItemKind::Sentence => {
                let id = if id.is_empty() {
                    format!("s{}", self.sentences.len() + 1)
                } else {
                    id
                };
                self.sentences.push(SentenceItem {
                    id,
                    english: text,
                    korean: translation,
                    situation: cell(self.mapping.situation),
                });
            }
        }
        Ok(())
    }

    fn finish(self, path: &Path) -> LingoResult<DailyLesson> {
        let theme = self.theme.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Daily Lesson")
                .to_string()
        });
        let lesson = DailyLesson {
            theme,
            words: self.words,
            sentences: self.sentences,
        };
        lesson.validate()?;
        Ok(lesson)
    }
}

/// Parse a CSV lesson pack
pub fn parse_csv(path: &Path) -> LingoResult<DailyLesson> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| LingoError::Import(format!("Failed to open CSV file: {}", e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LingoError::Import(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut builder = LessonBuilder::new(detect_columns(&headers)?);

    for (i, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| LingoError::Import(format!("Failed to read CSV row: {}", e)))?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        builder.push_row(&row, i + 2)?;
    }

    builder.finish(path)
}

/// Parse the first sheet of an Excel lesson pack
pub fn parse_excel(path: &Path) -> LingoResult<DailyLesson> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| LingoError::Import(format!("Failed to open Excel file: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LingoError::Import("No sheets found in Excel file".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LingoError::Import(format!("Failed to read sheet: {}", e)))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| LingoError::Import("Empty file - no header row".to_string()))?;
    let headers: Vec<String> = header_row.iter().map(get_cell_string).collect();
    let mut builder = LessonBuilder::new(detect_columns(&headers)?);

    for (i, row) in rows.enumerate() {
        let cells: Vec<String> = row.iter().map(get_cell_string).collect();
        builder.push_row(&cells, i + 2)?;
    }

    builder.finish(path)
}

/// Helper to extract string from Excel cell
fn get_cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Content provider that serves a lesson pack from disk.
///
/// The file is re-read on every fetch so edits show up on the next start.
#[derive(Debug, Clone)]
pub struct FileLessonProvider {
    path: PathBuf,
}

impl FileLessonProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentProvider for FileLessonProvider {
    fn fetch_daily_lesson(&self) -> BoxFuture<'_, LingoResult<DailyLesson>> {
        async move {
            load_lesson_file(&self.path).map_err(|e| match e {
                LingoError::LessonFetchFailed(_) => e,
                other => LingoError::LessonFetchFailed(other.to_string()),
            })
        }
        .boxed()
    }
}

// ============= Python Bindings =============

/// Load a lesson pack and return it as JSON
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(name = "load_lesson_file")]
pub fn py_load_lesson_file(file_path: &str) -> PyResult<String> {
    let lesson = load_lesson_file(file_path)?;
    serde_json::to_string(&lesson)
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
}
