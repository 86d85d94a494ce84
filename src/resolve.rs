use crate::corpus::CorpusIndex;
use crate::exam::ExamKey;
use crate::extract::QuestionRecord;
use crate::matcher::AnswerMatcher;

pub const PROBLEM_PREFIX: &str = "- **問題文** ";
pub const CHOICES_PREFIX: &str = "- **選択肢** ";

/// One row of the frequency table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub exam: ExamKey,
    pub question_number: u32,
    pub answer_text: String,
}

/// Which lookup produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    ExactKey,
    ExamFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub problem_text: String,
    pub choices: String,
    /// Question number the record was filed under in the corpus
    pub question_number: u32,
    pub source: MatchSource,
}

impl MatchResult {
    fn from_record(record: &QuestionRecord, question_number: u32, source: MatchSource) -> Self {
        Self {
            problem_text: record.problem_text.clone(),
            choices: record.joined_choices(),
            question_number,
            source,
        }
    }

    /// Lines to attach under the row, or `None` when there is nothing to show.
    pub fn to_block(&self) -> Option<String> {
        let mut lines = Vec::new();
        if !self.problem_text.is_empty() {
            lines.push(format!("{}{}", PROBLEM_PREFIX, self.problem_text));
        }
        if !self.choices.is_empty() {
            lines.push(format!("{}{}", CHOICES_PREFIX, self.choices));
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

/// Find the corpus record for `row`: first among records filed under its
/// exact question number, then among every record of the same exam, since
/// numbering drifts between revisions. No match is a normal outcome.
pub fn resolve(row: &IndexRow, index: &CorpusIndex, matcher: &AnswerMatcher) -> Option<MatchResult> {
    let exact = index
        .candidates(row.exam, row.question_number)
        .iter()
        .find(|record| matcher.matches(&row.answer_text, &record.answer_text))
        .map(|record| MatchResult::from_record(record, row.question_number, MatchSource::ExactKey));

    exact.or_else(|| {
        index
            .exam_candidates(row.exam)
            .iter()
            .find(|(_, record)| matcher.matches(&row.answer_text, &record.answer_text))
            .map(|(n, record)| MatchResult::from_record(record, *n, MatchSource::ExamFallback))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::SourceDocument;
    use crate::exam::Session;
    use std::path::PathBuf;

    const CORPUS: &str = "## 問5\n\n### 問題文\n運動性言語中枢はどこにあるか。\n\n### 選択肢\n- **a.** 左大脳半球の上側頭回\n- **d.** 左大脳半球の下前頭回\n\n### 正解\n**d.** 左大脳半球の下前頭回\n\n\
## 問12\n\n### 問題文\n前腕を回内させる筋はどれか。\n\n### 選択肢\n- **a.** 円回内筋\n- **b.** 回外筋\n\n### 正解\n**a.** 円回内筋\n";

    fn index() -> CorpusIndex {
        CorpusIndex::build(
            [SourceDocument {
                name: "2022本試験_問題解説.md".to_string(),
                path: PathBuf::from("2022本試験_問題解説.md"),
                text: CORPUS.to_string(),
            }],
            "問題解説",
        )
    }

    fn row(year: u16, q: u32, answer: &str) -> IndexRow {
        IndexRow {
            exam: ExamKey::new(year, Session::Main),
            question_number: q,
            answer_text: answer.to_string(),
        }
    }

    #[test]
    fn test_exact_key_match() {
        let result = resolve(&row(2022, 5, "④（左大脳半球の下前頭回）"), &index(), &AnswerMatcher::default())
            .expect("row should resolve");
        assert_eq!(result.source, MatchSource::ExactKey);
        assert_eq!(result.problem_text, "運動性言語中枢はどこにあるか。");
        assert_eq!(result.choices, "左大脳半球の上側頭回 / 左大脳半球の下前頭回");
    }

    #[test]
    fn test_falls_back_when_number_drifted() {
        let result = resolve(&row(2022, 13, "円回内筋"), &index(), &AnswerMatcher::default())
            .expect("fallback should find 問12");
        assert_eq!(result.source, MatchSource::ExamFallback);
        assert_eq!(result.question_number, 12);
        assert_eq!(result.problem_text, "前腕を回内させる筋はどれか。");
    }

    #[test]
    fn test_falls_back_when_exact_candidate_disagrees() {
        let result = resolve(&row(2022, 5, "a. 円回内筋"), &index(), &AnswerMatcher::default())
            .expect("fallback should find 問12");
        assert_eq!(result.source, MatchSource::ExamFallback);
        assert_eq!(result.question_number, 12);
    }

    #[test]
    fn test_unknown_exam_resolves_to_none() {
        assert_eq!(resolve(&row(2019, 5, "下前頭回"), &index(), &AnswerMatcher::default()), None);
    }

    #[test]
    fn test_unmatched_answer_resolves_to_none() {
        assert_eq!(resolve(&row(2022, 5, "小脳"), &index(), &AnswerMatcher::default()), None);
        assert_eq!(resolve(&row(2022, 5, "③"), &index(), &AnswerMatcher::default()), None);
    }

    #[test]
    fn test_to_block() {
        let full = MatchResult {
            problem_text: "問い".to_string(),
            choices: "甲 / 乙".to_string(),
            question_number: 1,
            source: MatchSource::ExactKey,
        };
        assert_eq!(full.to_block().as_deref(), Some("- **問題文** 問い\n- **選択肢** 甲 / 乙"));

        let choices_only = MatchResult {
            problem_text: String::new(),
            ..full.clone()
        };
        assert_eq!(choices_only.to_block().as_deref(), Some("- **選択肢** 甲 / 乙"));

        let empty = MatchResult {
            problem_text: String::new(),
            choices: String::new(),
            ..full
        };
        assert_eq!(empty.to_block(), None);
    }
}
