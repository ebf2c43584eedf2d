use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Instant,
};

/// Columns every QA table must carry.
pub const QA_REQUIRED_COLUMNS: [&str; 2] = ["question", "tag"];

/// Columns of the tag → answer side table.
pub const TAG_ANSWER_COLUMNS: [&str; 2] = ["tag", "answer"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl QaRecord {
    fn trimmed(self) -> Self {
        let answer = self
            .answer
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty());

        QaRecord {
            question: self.question.trim().to_string(),
            tag: self.tag.trim().to_string(),
            answer,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("{path}: missing required column(s): {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("{0}: file not found")]
    NotFound(PathBuf),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}

/// A CSV table kept as raw records so unknown columns survive a rewrite.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: csv::StringRecord,
    pub rows: Vec<csv::StringRecord>,
}

impl Table {
    /// Read a table and fail fast if any of `required` is absent from its header.
    pub fn read(path: &Path, required: &[&str]) -> Result<Self, TableError> {
        let mut reader = open_reader(path)?;
        let headers = reader.headers()?.clone();
        check_columns(path, &headers, required)?;

        let now = Instant::now();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, csv::Error>>()?;

        log::debug!(
            "took {}ms to read {} rows from {}",
            now.elapsed().as_micros() as f64 / 1000.0,
            rows.len(),
            path.display()
        );

        Ok(Table { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Write the header plus the given rows, in the given order.
    pub fn write_rows<'a>(
        &self,
        path: &Path,
        rows: impl IntoIterator<Item = &'a csv::StringRecord>,
    ) -> Result<usize, TableError> {
        let mut csv_wrt = csv::Writer::from_path(path)?;
        csv_wrt.write_record(&self.headers)?;

        let mut count = 0;
        for row in rows {
            csv_wrt.write_record(row)?;
            count += 1;
        }
        csv_wrt.flush()?;

        Ok(count)
    }
}

/// Read a QA table (`question`, `tag`, optional `answer`).
pub fn read_qa_table(path: &Path) -> Result<Vec<QaRecord>, TableError> {
    let mut reader = open_reader(path)?;
    let headers = trimmed_headers(&mut reader)?;
    check_columns(path, &headers, &QA_REQUIRED_COLUMNS)?;

    let mut records = vec![];
    for record in reader.deserialize::<QaRecord>() {
        records.push(record?.trimmed());
    }

    log::info!("loaded {} QA rows from {}", records.len(), path.display());

    Ok(records)
}

/// Canonical answer per tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagAnswers {
    answers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TagAnswerRow {
    tag: String,
    #[serde(default)]
    answer: Option<String>,
}

impl TagAnswers {
    /// Read the side table. Later rows win when a tag repeats.
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let mut reader = open_reader(path)?;
        let headers = trimmed_headers(&mut reader)?;
        check_columns(path, &headers, &TAG_ANSWER_COLUMNS)?;

        let mut answers = HashMap::new();
        for row in reader.deserialize::<TagAnswerRow>() {
            let row = row?;
            answers.insert(
                row.tag.trim().to_string(),
                row.answer.unwrap_or_default().trim().to_string(),
            );
        }

        log::info!("loaded {} tag answers from {}", answers.len(), path.display());

        Ok(TagAnswers { answers })
    }

    /// Like [`TagAnswers::read`], but a missing file or malformed header only
    /// warns and yields an empty table.
    pub fn read_lenient(path: &Path) -> Result<Self, TableError> {
        match Self::read(path) {
            Ok(answers) => Ok(answers),
            Err(TableError::NotFound(path)) => {
                log::warn!("tag/answer file not found at {}", path.display());
                Ok(Self::default())
            }
            Err(err @ TableError::MissingColumns { .. }) => {
                log::warn!("{err}");
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }

    pub fn resolve(&self, tag: &str) -> Option<&str> {
        self.answers.get(tag).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Fill records that carry no answer with their tag's canonical answer.
    /// Returns how many records were filled.
    pub fn backfill(&self, records: &mut [QaRecord]) -> usize {
        let mut filled = 0;
        for record in records.iter_mut().filter(|r| r.answer.is_none()) {
            if let Some(answer) = self.resolve(&record.tag) {
                record.answer = Some(answer.to_string());
                filled += 1;
            }
        }
        filled
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagAnswers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        TagAnswers {
            answers: iter
                .into_iter()
                .map(|(tag, answer)| (tag.into(), answer.into()))
                .collect(),
        }
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, TableError> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(csv::Reader::from_reader(file)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(TableError::NotFound(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Trim header names in place so serde field matching sees `tag`, not ` tag`.
fn trimmed_headers(
    reader: &mut csv::Reader<std::fs::File>,
) -> Result<csv::StringRecord, TableError> {
    let headers: csv::StringRecord = reader.headers()?.iter().map(str::trim).collect();
    reader.set_headers(headers.clone());
    Ok(headers)
}

fn check_columns(
    path: &Path,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), TableError> {
    let missing = required
        .iter()
        .filter(|column| !headers.iter().any(|header| header.trim() == **column))
        .map(|column| column.to_string())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TableError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}
