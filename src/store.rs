//! Loading the rubric and exam queue from disk, and persisting rubric
//! mutations back.
//!
//! Load failures are fatal and happen before any worker starts; persistence
//! is best-effort and never fatal to the calling worker.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Result, TaPoolError};
use crate::state::{Exam, Rubric, WorkItem, END_MARKER_STUDENT_ID, QUESTIONS, UNKNOWN_STUDENT_ID};

/// Read the rubric file: one `"<question>, <code>"` line per question.
///
/// Only the first [`QUESTIONS`] lines are consumed; order is preserved.
pub async fn load_rubric(path: &Path) -> Result<Rubric> {
    let text = fs::read_to_string(path).await?;

    let mut codes = [' '; QUESTIONS];
    let mut filled = 0;
    for (lineno, line) in text.lines().enumerate() {
        if filled == QUESTIONS {
            break;
        }
        let Some((_, value)) = line.split_once(',') else {
            return Err(TaPoolError::MalformedRubric {
                line: lineno + 1,
                reason: "missing ',' separator".to_string(),
            });
        };
        let value = value.trim_start_matches([' ', '\t']);
        let Some(code) = value.chars().next() else {
            return Err(TaPoolError::MalformedRubric {
                line: lineno + 1,
                reason: "no grading code after separator".to_string(),
            });
        };
        codes[filled] = code;
        filled += 1;
    }

    if filled < QUESTIONS {
        return Err(TaPoolError::MalformedRubric {
            line: filled + 1,
            reason: format!("expected {QUESTIONS} grading codes, found {filled}"),
        });
    }
    Ok(codes)
}

/// List the exam directory and build the ordered work queue.
///
/// Entries are sorted lexicographically by file name, so the queue order is
/// a deterministic function of the source names alone. Each item's student
/// id is the leading integer of its file's first line, defaulting to
/// [`UNKNOWN_STUDENT_ID`]; an id of [`END_MARKER_STUDENT_ID`] loads as the
/// end-of-queue marker.
pub async fn load_exams(dir: &Path) -> Result<Vec<WorkItem>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }
    if names.is_empty() {
        return Err(TaPoolError::EmptyExamSet(dir.to_path_buf()));
    }
    names.sort();

    let mut items = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        // Unreadable files keep their queue slot with an unknown id
        let student_id = match fs::read_to_string(&path).await {
            Ok(text) => text
                .lines()
                .next()
                .and_then(parse_leading_int)
                .unwrap_or(UNKNOWN_STUDENT_ID),
            Err(_) => UNKNOWN_STUDENT_ID,
        };
        if student_id == END_MARKER_STUDENT_ID {
            items.push(WorkItem::EndMarker);
        } else {
            items.push(WorkItem::Exam(Exam::new(student_id, path)));
        }
    }
    Ok(items)
}

/// Parse an optionally signed decimal integer from the start of a line,
/// ignoring leading whitespace.
fn parse_leading_int(line: &str) -> Option<i64> {
    let s = line.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Writes the shared rubric back to its source file.
#[derive(Debug, Clone)]
pub struct RubricStore {
    path: PathBuf,
}

impl RubricStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the rubric file. Callers treat failure as a logged warning,
    /// never as fatal.
    pub async fn persist(&self, rubric: &Rubric) -> std::io::Result<()> {
        let mut out = String::new();
        for (i, code) in rubric.iter().enumerate() {
            out.push_str(&format!("{}, {}\n", i + 1, code));
        }
        fs::write(&self.path, out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn load_rubric_preserves_order() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rubric.txt", "1, A\n2,B\n3, \tC\n4, D\n5, E\n");
        let rubric = load_rubric(&path).await.unwrap();
        assert_eq!(rubric, ['A', 'B', 'C', 'D', 'E']);
    }

    #[tokio::test]
    async fn load_rubric_ignores_extra_lines() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "rubric.txt",
            "1, A\n2, B\n3, C\n4, D\n5, E\n6, F\nnot a rubric line\n",
        );
        let rubric = load_rubric(&path).await.unwrap();
        assert_eq!(rubric, ['A', 'B', 'C', 'D', 'E']);
    }

    #[tokio::test]
    async fn load_rubric_rejects_missing_separator() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rubric.txt", "1, A\n3\n");
        let err = load_rubric(&path).await.unwrap_err();
        assert!(matches!(err, TaPoolError::MalformedRubric { line: 2, .. }));
    }

    #[tokio::test]
    async fn load_rubric_rejects_missing_code() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rubric.txt", "1, \n");
        let err = load_rubric(&path).await.unwrap_err();
        assert!(matches!(err, TaPoolError::MalformedRubric { line: 1, .. }));
    }

    #[tokio::test]
    async fn load_rubric_rejects_short_file() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rubric.txt", "1, A\n2, B\n");
        let err = load_rubric(&path).await.unwrap_err();
        match err {
            TaPoolError::MalformedRubric { reason, .. } => {
                assert!(reason.contains("found 2"), "unexpected reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_exams_orders_by_file_name() {
        let dir = tempdir().unwrap();
        // Created out of order on purpose
        write(dir.path(), "exam_c.txt", "3003\n");
        write(dir.path(), "exam_a.txt", "1001\n");
        write(dir.path(), "exam_b.txt", "2002\n");

        let items = load_exams(dir.path()).await.unwrap();
        let ids: Vec<i64> = items
            .iter()
            .map(|item| match item {
                WorkItem::Exam(e) => e.student_id,
                WorkItem::EndMarker => END_MARKER_STUDENT_ID,
            })
            .collect();
        assert_eq!(ids, vec![1001, 2002, 3003]);
    }

    #[tokio::test]
    async fn load_exams_maps_9999_to_end_marker() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "1001\n");
        write(dir.path(), "z_end.txt", "9999\n");

        let items = load_exams(dir.path()).await.unwrap();
        assert!(!items[0].is_end_marker());
        assert!(items[1].is_end_marker());
    }

    #[tokio::test]
    async fn load_exams_defaults_unparseable_ids() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", "no number here\n");
        write(dir.path(), "b.txt", "");

        let items = load_exams(dir.path()).await.unwrap();
        for item in &items {
            match item {
                WorkItem::Exam(e) => assert_eq!(e.student_id, UNKNOWN_STUDENT_ID),
                WorkItem::EndMarker => panic!("no end marker expected"),
            }
        }
    }

    #[tokio::test]
    async fn load_exams_rejects_empty_directory() {
        let dir = tempdir().unwrap();
        let err = load_exams(dir.path()).await.unwrap_err();
        assert!(matches!(err, TaPoolError::EmptyExamSet(_)));
    }

    #[test]
    fn parse_leading_int_matches_scanf() {
        assert_eq!(parse_leading_int("1001"), Some(1001));
        assert_eq!(parse_leading_int("  42 extra"), Some(42));
        assert_eq!(parse_leading_int("-1 rest"), Some(-1));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("x12"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[tokio::test]
    async fn persist_writes_numbered_lines() {
        let dir = tempdir().unwrap();
        let store = RubricStore::new(dir.path().join("rubric.txt"));
        store.persist(&['F', 'G', 'H', 'I', 'J']).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "1, F\n2, G\n3, H\n4, I\n5, J\n");
    }
}
