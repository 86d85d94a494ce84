use crate::corpus::CorpusIndex;
use crate::exam::ExamKey;
use crate::matcher::AnswerMatcher;
use crate::normalize::normalize_newlines;
use crate::resolve::{resolve, IndexRow, MatchSource};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// `| 2022本試 | 問5 | ④（左大脳半球の下前頭回） |`
static ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\|[ \t]*(\d{4}[本再]試)[ \t]*\|([^|\n]*)\|([^|\n]+)\|[ \t]*$")
        .expect("frequency row regex")
});

static ATTACHED_PROBLEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n- \*\*問題文\*\* [^\n]+").expect("attached problem regex"));
static ATTACHED_CHOICES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n- \*\*選択肢\*\* [^\n]+").expect("attached choices regex"));

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number regex"));

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub rows: usize,
    pub matched_exact: usize,
    pub matched_fallback: usize,
    pub unmatched: usize,
    pub skipped: usize,
    /// `2022本試 問5` labels of rows left without text
    pub unmatched_rows: Vec<String>,
}

impl LinkReport {
    pub fn matched(&self) -> usize {
        self.matched_exact + self.matched_fallback
    }
}

#[derive(Debug, Clone)]
pub struct Annotated {
    pub text: String,
    pub report: LinkReport,
}

/// Remove lines attached by an earlier run.
pub fn strip_attachments(content: &str) -> String {
    let without_problems = ATTACHED_PROBLEM.replace_all(content, "");
    ATTACHED_CHOICES.replace_all(&without_problems, "").into_owned()
}

/// Parse one table row. `None` for rows whose question cell has no number.
pub fn parse_row(exam: &str, question: &str, answer: &str) -> Option<IndexRow> {
    Some(IndexRow {
        exam: exam.parse::<ExamKey>().ok()?,
        question_number: NUMBER.find(question)?.as_str().parse().ok()?,
        answer_text: answer.trim().to_string(),
    })
}

/// Attach problem text and choices under every row of the frequency table
/// that resolves against `index`. A CRLF document comes back with CRLF line
/// endings throughout.
pub fn annotate(content: &str, index: &CorpusIndex, matcher: &AnswerMatcher) -> Annotated {
    let crlf = content.contains("\r\n");
    let content = strip_attachments(&normalize_newlines(content));
    let mut report = LinkReport::default();

    let text = ROW
        .replace_all(&content, |caps: &Captures| {
            let line = caps[0].to_string();
            report.rows += 1;

            let Some(row) = parse_row(&caps[1], &caps[2], &caps[3]) else {
                debug!(line = %line, "row without a question number, leaving as is");
                report.skipped += 1;
                return line;
            };

            let resolved = resolve(&row, index, matcher);
            let block = resolved.as_ref().and_then(|m| m.to_block());
            match (resolved.as_ref().map(|m| m.source), block) {
                (Some(source), Some(block)) => {
                    match source {
                        MatchSource::ExactKey => report.matched_exact += 1,
                        MatchSource::ExamFallback => report.matched_fallback += 1,
                    }
                    format!("{}\n{}", line, block)
                }
                _ => {
                    report.unmatched += 1;
                    report
                        .unmatched_rows
                        .push(format!("{} 問{}", row.exam, row.question_number));
                    line
                }
            }
        })
        .into_owned();
    let text = if crlf { text.replace('\n', "\r\n") } else { text };

    info!(
        rows = report.rows,
        matched = report.matched(),
        unmatched = report.unmatched,
        "frequency table annotated"
    );
    Annotated { text, report }
}

/// Annotate the frequency document at `path`, writing it back unless
/// `dry_run` is set.
pub fn link_file(
    path: &Path,
    index: &CorpusIndex,
    matcher: &AnswerMatcher,
    dry_run: bool,
) -> Result<LinkReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading frequency document {}", path.display()))?;
    let annotated = annotate(&content, index, matcher);
    if !dry_run && annotated.text != content {
        fs::write(path, &annotated.text)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(annotated.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{discover, SourceDocument};
    use crate::exam::Session;
    use globset::GlobSet;
    use std::path::PathBuf;

    const EXPLANATION: &str = "# 2022年度 本試験 問題解説\n\n\
## 問5\n\n### 問題文（全文）\n運動性言語中枢が\n存在する部位はどれか。\n\n### 選択肢\n- **a.** 左大脳半球の上側頭回\n- **b.** 右大脳半球の上側頭回\n- **c.** 右大脳半球の下前頭回\n- **d.** 左大脳半球の下前頭回\n\n### 正解\n**d.** 左大脳半球の下前頭回\n\n---\n\n\
## 問9\n\n### 問題文\n前腕を回内させる筋はどれか。\n\n### 選択肢\n- **a.** 円回内筋\n- **b.** 回外筋\n\n### 正解\n**a.** 円回内筋\n";

    const FREQUENCY: &str = "# 記号問題 頻度順\n\n\
| 試験 | 問 | 正解 |\n\
|------|----|------|\n\
| 2022本試 | 問5 | ④（左大脳半球の下前頭回） |\n\
| 2022本試 | 問8 | 円回内筋 |\n\
| 2019再試 | 問1 | 小脳 |\n\
| 2022本試 | - | 何か |\n";

    fn index() -> CorpusIndex {
        CorpusIndex::build(
            [SourceDocument {
                name: "2022本試験_問題解説.md".to_string(),
                path: PathBuf::from("2022本試験_問題解説.md"),
                text: EXPLANATION.to_string(),
            }],
            "問題解説",
        )
    }

    #[test]
    fn test_parse_row() {
        let row = parse_row("2022本試", " 問5 ", " ④（下前頭回） ").unwrap();
        assert_eq!(row.exam, ExamKey::new(2022, Session::Main));
        assert_eq!(row.question_number, 5);
        assert_eq!(row.answer_text, "④（下前頭回）");
        assert!(parse_row("2022本試", " - ", "x").is_none());
        assert!(parse_row("2022追試", "問5", "x").is_none());
    }

    #[test]
    fn test_annotate_rows() {
        let annotated = annotate(FREQUENCY, &index(), &AnswerMatcher::default());

        assert!(annotated.text.contains(
            "| 2022本試 | 問5 | ④（左大脳半球の下前頭回） |\n\
             - **問題文** 運動性言語中枢が 存在する部位はどれか。\n\
             - **選択肢** 左大脳半球の上側頭回 / 右大脳半球の上側頭回 / 右大脳半球の下前頭回 / 左大脳半球の下前頭回\n"
        ));
        assert!(annotated.text.contains(
            "| 2022本試 | 問8 | 円回内筋 |\n- **問題文** 前腕を回内させる筋はどれか。\n"
        ));
        assert!(annotated.text.contains("| 2019再試 | 問1 | 小脳 |\n| 2022本試 | - | 何か |\n"));

        let report = annotated.report;
        assert_eq!(report.rows, 4);
        assert_eq!(report.matched_exact, 1);
        assert_eq!(report.matched_fallback, 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.unmatched_rows, vec!["2019再試 問1"]);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let index = index();
        let matcher = AnswerMatcher::default();
        let first = annotate(FREQUENCY, &index, &matcher).text;
        let second = annotate(&first, &index, &matcher).text;
        assert_eq!(first, second);
        assert_eq!(strip_attachments(&first), FREQUENCY);
    }

    #[test]
    fn test_bare_label_answer_is_not_linked() {
        let unrelated = CorpusIndex::build(
            [SourceDocument {
                name: "2022本試験_問題解説.md".to_string(),
                path: PathBuf::from("2022本試験_問題解説.md"),
                text: "## 問1\n\n### 問題文\n無関係な問題。\n\n### 正解\n**b**\n".to_string(),
            }],
            "問題解説",
        );
        let content = "| 2022本試 | 問7 | b |\n";
        let annotated = annotate(content, &unrelated, &AnswerMatcher::default());
        assert_eq!(annotated.text, content);
        assert_eq!(annotated.report.matched(), 0);
        assert_eq!(annotated.report.unmatched, 1);
    }

    #[test]
    fn test_annotate_crlf_document() {
        let crlf = FREQUENCY.replace('\n', "\r\n");
        let index = index();
        let matcher = AnswerMatcher::default();

        let first = annotate(&crlf, &index, &matcher);
        assert_eq!(first.report.rows, 4);
        assert_eq!(first.report.matched(), 2);
        assert!(first.text.contains(
            "| 2022本試 | 問8 | 円回内筋 |\r\n- **問題文** 前腕を回内させる筋はどれか。\r\n"
        ));
        assert!(!first.text.replace("\r\n", "").contains('\n'));

        let second = annotate(&first.text, &index, &matcher);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn test_crlf_explanation_is_indexed() {
        let index = CorpusIndex::build(
            [SourceDocument {
                name: "2022本試験_問題解説.md".to_string(),
                path: PathBuf::from("2022本試験_問題解説.md"),
                text: EXPLANATION.replace('\n', "\r\n"),
            }],
            "問題解説",
        );
        let annotated = annotate(FREQUENCY, &index, &AnswerMatcher::default());
        assert_eq!(annotated.report.matched(), 2);
        assert!(annotated
            .text
            .contains("- **問題文** 運動性言語中枢が 存在する部位はどれか。\n"));
        assert!(!annotated.text.contains('\r'));
    }

    #[test]
    fn test_header_rows_are_not_rows() {
        let annotated = annotate("| 試験 | 問 | 正解 |\n|---|---|---|\n", &index(), &AnswerMatcher::default());
        assert_eq!(annotated.report.rows, 0);
    }

    #[test]
    fn test_link_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let exam_dir = dir.path().join("試験問題");
        fs::create_dir_all(exam_dir.join("2022")).unwrap();
        fs::write(exam_dir.join("2022").join("2022本試験_問題解説.md"), EXPLANATION).unwrap();
        let freq_path = exam_dir.join("記号問題頻度順.md");
        fs::write(&freq_path, FREQUENCY).unwrap();

        let build = || {
            let docs = discover(&exam_dir, &GlobSet::empty()).unwrap();
            CorpusIndex::build(docs, "問題解説")
        };
        let matcher = AnswerMatcher::default();

        let report = link_file(&freq_path, &build(), &matcher, false).unwrap();
        assert_eq!(report.matched(), 2);
        let first = fs::read(&freq_path).unwrap();

        link_file(&freq_path, &build(), &matcher, false).unwrap();
        let second = fs::read(&freq_path).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, FREQUENCY.as_bytes());
    }

    #[test]
    fn test_link_file_dry_run_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let freq_path = dir.path().join("記号問題頻度順.md");
        fs::write(&freq_path, FREQUENCY).unwrap();

        let report = link_file(&freq_path, &index(), &AnswerMatcher::default(), true).unwrap();
        assert_eq!(report.matched(), 2);
        assert_eq!(fs::read_to_string(&freq_path).unwrap(), FREQUENCY);
    }
}
