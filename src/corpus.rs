use crate::exam::ExamKey;
use crate::extract::{extract_record, QuestionRecord};
use crate::normalize::normalize_newlines;
use ahash::AHashMap;
use anyhow::{Context, Result};
use globset::GlobSet;
use ignore::WalkBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `## 問36・問38（図問題）`: one heading may declare several questions.
static QUESTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(#{1,4})[ \t]+(問\d+(?:[・、]問?\d+)*)[ \t]*(?:[（(][^）)\n]*[）)])?[ \t\r]*$",
    )
    .expect("question heading regex")
});

static QUESTION_HEADING_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+問\d").expect("question start regex"));

static ANY_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]").expect("heading regex"));

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number regex"));

/// A markdown document handed to the indexer.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name, used for the exam key and the explanation filter
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub question_headings: usize,
    pub blocks_discarded: usize,
    pub records_indexed: usize,
    pub entries_indexed: usize,
}

/// Question records from the explanation corpus, keyed two ways.
///
/// Both maps are filled in the same pass, so every record under
/// `(exam, n)` also appears in the per-exam list for `exam`.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    by_exact_key: AHashMap<(ExamKey, u32), Vec<Arc<QuestionRecord>>>,
    by_exam: AHashMap<ExamKey, Vec<(u32, Arc<QuestionRecord>)>>,
    stats: IndexStats,
}

impl CorpusIndex {
    /// Index every explanation document. Documents whose name lacks
    /// `explanation_marker` or an exam key are skipped.
    pub fn build<I>(documents: I, explanation_marker: &str) -> Self
    where
        I: IntoIterator<Item = SourceDocument>,
    {
        let mut index = CorpusIndex::default();

        for doc in documents {
            index.stats.documents_seen += 1;

            if !doc.name.contains(explanation_marker) {
                debug!(name = %doc.name, "not an explanation document, skipping");
                index.stats.documents_skipped += 1;
                continue;
            }
            let Some(exam) = ExamKey::from_filename(&doc.name) else {
                debug!(name = %doc.name, "no exam key in file name, skipping");
                index.stats.documents_skipped += 1;
                continue;
            };

            index.index_document(exam, &doc);
            index.stats.documents_indexed += 1;
        }

        info!(
            documents = index.stats.documents_indexed,
            records = index.stats.records_indexed,
            discarded = index.stats.blocks_discarded,
            "corpus indexed"
        );
        index
    }

    fn index_document(&mut self, exam: ExamKey, doc: &SourceDocument) {
        let text = normalize_newlines(&doc.text);
        let text: &str = &text;

        for caps in QUESTION_HEADING.captures_iter(text) {
            let Some(heading) = caps.get(0) else { continue };
            let level = caps[1].len();
            let numbers = parse_question_numbers(&caps[2]);
            if numbers.is_empty() {
                continue;
            }
            self.stats.question_headings += 1;

            let end = block_end(text, heading.end(), level);
            let record = extract_record(&text[heading.end()..end]);
            if !record.has_linkable_text() {
                debug!(name = %doc.name, heading = %caps[2].trim(), "no problem text or choices, discarding block");
                self.stats.blocks_discarded += 1;
                continue;
            }

            let record = Arc::new(record);
            for n in numbers {
                self.by_exact_key
                    .entry((exam, n))
                    .or_default()
                    .push(Arc::clone(&record));
                self.by_exam
                    .entry(exam)
                    .or_default()
                    .push((n, Arc::clone(&record)));
                self.stats.entries_indexed += 1;
            }
            self.stats.records_indexed += 1;
        }
    }

    /// Candidates filed under exactly this exam and question number, in scan order.
    pub fn candidates(&self, exam: ExamKey, question_number: u32) -> &[Arc<QuestionRecord>] {
        self.by_exact_key
            .get(&(exam, question_number))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every indexed question of one exam, in scan order.
    pub fn exam_candidates(&self, exam: ExamKey) -> &[(u32, Arc<QuestionRecord>)] {
        self.by_exam.get(&exam).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exams(&self) -> impl Iterator<Item = &ExamKey> {
        self.by_exam.keys()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

/// `問35・36・37` → [35, 36, 37]
pub fn parse_question_numbers(heading: &str) -> Vec<u32> {
    heading
        .split(['・', '、'])
        .filter_map(|part| NUMBER.find(part))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// End of the block that starts at `from` under a question heading of
/// `level`: the next question heading at the same or a shallower level,
/// else the next strictly shallower heading, else end of text.
fn block_end(text: &str, from: usize, level: usize) -> usize {
    let rest = &text[from..];
    let next_question = QUESTION_HEADING_START
        .captures_iter(rest)
        .find(|caps| caps[1].len() <= level);
    let next = next_question.or_else(|| {
        ANY_HEADING
            .captures_iter(rest)
            .find(|caps| caps[1].len() < level)
    });
    next.and_then(|caps| caps.get(0))
        .map(|m| from + m.start())
        .unwrap_or(text.len())
}

/// Collect markdown documents under `exam_dir` in file-name order, skipping
/// names matched by `exclude`.
pub fn discover(exam_dir: &Path, exclude: &GlobSet) -> Result<Vec<SourceDocument>> {
    if !exam_dir.is_dir() {
        anyhow::bail!("exam directory not found: {}", exam_dir.display());
    }

    let mut builder = WalkBuilder::new(exam_dir);
    builder
        .hidden(true)
        .git_ignore(true)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut documents = Vec::new();
    for entry in builder.build() {
        let entry = entry.with_context(|| format!("walking {}", exam_dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }

        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("md"))
            .unwrap_or(false);
        if !is_markdown {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if exclude.is_match(name) {
            debug!(name, "excluded");
            continue;
        }

        match fs::read_to_string(path) {
            Ok(text) => documents.push(SourceDocument {
                name: name.to_string(),
                path: path.to_path_buf(),
                text,
            }),
            Err(e) => warn!(path = %path.display(), error = %e, "unreadable document, skipping"),
        }
    }

    Ok(documents)
}
