use crate::corpus::SourceDocument;
use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// `## 問12（図問題）` or `### 問3・問4（図問題：…`
static FIGURE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#{2,3}[ \t]+(問\d+[・問\d]*)[ \t]*[（(]図問題").expect("figure heading regex")
});

static NEXT_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n##\s+").expect("next section regex"));

static BARE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[・\-*]\s*$").expect("bare bullet regex"));

const ROOT_SCOPE: &str = "ルート";
const SKIPPED_LINES: [&str; 6] = ["）", "---", "（", "正解", "解説", "選択肢"];
const FIGURE_HINTS: [&str; 4] = ["図", "選", "示す", "どれか"];

const SUMMARY_SOFT_LIMIT: usize = 180;
const SUMMARY_MAX_LINES: usize = 6;
const SUMMARY_HARD_LIMIT: usize = 250;
const LISTED_LIMIT: usize = 220;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FigureQuestion {
    /// First directory under the exam directory, or `ルート`
    pub scope: String,
    pub file: String,
    pub question: String,
    pub summary: String,
}

fn truncate_chars(s: &str, limit: usize) -> (String, bool) {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(limit).collect();
    (head, chars.next().is_some())
}

fn clean_line(line: &str) -> String {
    line.trim().replace('#', "").replace("**", "").trim().to_string()
}

/// Short prose summary of a figure question block.
pub fn summarize(block: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in block.split('\n') {
        let s = clean_line(line);
        if s.chars().count() < 3 || SKIPPED_LINES.contains(&s.as_str()) || BARE_BULLET.is_match(&s) {
            continue;
        }
        lines.push(s);
        if lines.join(" ").chars().count() >= SUMMARY_SOFT_LIMIT || lines.len() >= SUMMARY_MAX_LINES {
            break;
        }
    }
    let mut summary = lines.join(" ").trim().to_string();

    if summary.is_empty() {
        let hinted = block
            .split('\n')
            .map(clean_line)
            .find(|s| s.chars().count() > 15 && FIGURE_HINTS.iter().any(|hint| s.contains(hint)));
        if let Some(s) = hinted {
            let (head, cut) = truncate_chars(&s, LISTED_LIMIT);
            summary = if cut { format!("{}...", head) } else { head };
        }
    }

    if summary.chars().count() > SUMMARY_HARD_LIMIT {
        let (head, _) = truncate_chars(&summary, SUMMARY_HARD_LIMIT - 3);
        summary = format!("{}...", head);
    }
    summary
}

fn scope_of(exam_dir: &Path, doc: &SourceDocument) -> String {
    let Ok(rel) = doc.path.strip_prefix(exam_dir) else {
        return ROOT_SCOPE.to_string();
    };
    let mut components = rel.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => ROOT_SCOPE.to_string(),
    }
}

/// Every figure question in `documents`, once per (scope, file, question).
pub fn collect_figure_questions(exam_dir: &Path, documents: &[SourceDocument]) -> Vec<FigureQuestion> {
    let mut seen = AHashSet::new();
    let mut found = Vec::new();

    for doc in documents {
        let scope = scope_of(exam_dir, doc);
        let text = doc.text.as_str();

        for caps in FIGURE_HEADING.captures_iter(text) {
            let Some(heading) = caps.get(0) else { continue };
            let question = caps[1].trim().to_string();
            if !seen.insert((scope.clone(), doc.name.clone(), question.clone())) {
                continue;
            }

            let start = heading.end();
            let end = NEXT_SECTION
                .find(&text[start..])
                .map(|m| start + m.start())
                .unwrap_or(text.len());

            found.push(FigureQuestion {
                scope: scope.clone(),
                file: doc.name.clone(),
                question,
                summary: summarize(text[start..end].trim()),
            });
        }
    }

    found
}

/// Markdown listing grouped by scope.
pub fn render_listing(questions: &[FigureQuestion]) -> String {
    let mut by_scope: BTreeMap<&str, Vec<&FigureQuestion>> = BTreeMap::new();
    for q in questions {
        by_scope.entry(q.scope.as_str()).or_default().push(q);
    }

    let mut out: Vec<String> = [
        "# 図を含む問題 一覧",
        "",
        "過去問から「（図問題）」として記載されている問題を抽出した一覧です。",
        "実際の試験では図が配布されるため、本一覧では問題文・要旨のみ記載しています。",
        "",
        "---",
        "",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for (scope, mut entries) in by_scope {
        entries.sort_by(|a, b| (&a.file, &a.question).cmp(&(&b.file, &b.question)));
        out.push(format!("## {}", scope));
        out.push(String::new());
        for q in entries {
            out.push(format!("- **{}**（{}）", q.question, q.file));
            if !q.summary.is_empty() {
                let (head, cut) = truncate_chars(&q.summary, LISTED_LIMIT);
                out.push(format!("  {}{}", head, if cut { "..." } else { "" }));
            }
            out.push(String::new());
        }
        out.push("---".to_string());
        out.push(String::new());
    }

    out.join("\n")
}
