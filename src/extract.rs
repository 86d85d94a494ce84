use once_cell::sync::Lazy;
use regex::Regex;

/// Separator used when choices are rendered on one line.
pub const CHOICE_SEPARATOR: &str = " / ";

/// Problem sub-headings, most complete first.
static PROBLEM_HEADERS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"#{3,4}\s*問題文[（(]全文[）)]\s*\n").expect("full text header regex"),
        Regex::new(r"#{3,4}\s*問題文[（(]要旨[）)]\s*\n").expect("abridged header regex"),
        Regex::new(r"#{3,4}\s*問題文\s*\n").expect("problem header regex"),
    ]
});

static ANSWER_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#{3,4}\s*正解\s*\n").expect("answer header regex"));

static CHOICES_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"#{3,4}\s*選択肢\s*\n+((?:-\s*\*\*[a-e①②③④⑤⑥⑦⑧⑨⑩][.．、:：]?\*\*[^\n]*\n?)+)",
    )
    .expect("choices section regex")
});

static CHOICE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s*\*\*[a-e①②③④⑤⑥⑦⑧⑨⑩][.．、:：]?\*\*\s*").expect("choice prefix regex")
});

/// Where a sub-section body stops: the next heading, a rule, or end of block.
static SECTION_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n#{2,4}\s|\n---").expect("section end regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// One question as written in an explanation document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionRecord {
    pub problem_text: String,
    pub choices: Vec<String>,
    pub answer_text: String,
}

impl QuestionRecord {
    pub fn joined_choices(&self) -> String {
        self.choices.join(CHOICE_SEPARATOR)
    }

    /// A record with neither problem text nor choices cannot be attached to
    /// anything useful.
    pub fn has_linkable_text(&self) -> bool {
        !self.problem_text.is_empty() || !self.choices.is_empty()
    }
}

/// Extract a record from one question block. Missing sub-sections leave the
/// corresponding field empty.
pub fn extract_record(block: &str) -> QuestionRecord {
    QuestionRecord {
        problem_text: extract_problem(block),
        choices: extract_choices(block),
        answer_text: extract_answer(block),
    }
}

fn extract_problem(block: &str) -> String {
    PROBLEM_HEADERS
        .iter()
        .find_map(|header| section_body(block, header))
        .map(|body| body.trim().replace('\n', " "))
        .unwrap_or_default()
}

fn extract_choices(block: &str) -> Vec<String> {
    let Some(caps) = CHOICES_SECTION.captures(block) else {
        return Vec::new();
    };

    caps[1]
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-'))
        .map(|line| CHOICE_PREFIX.replace(line, "").trim().to_string())
        .collect()
}

fn extract_answer(block: &str) -> String {
    section_body(block, &ANSWER_HEADER)
        .map(|body| {
            let unbolded = body.trim().replace("**", "");
            WHITESPACE_RUN.replace_all(unbolded.trim(), " ").into_owned()
        })
        .unwrap_or_default()
}

/// Body following `header`: at least one character, ending before the next
/// heading or rule.
fn section_body<'a>(block: &'a str, header: &Regex) -> Option<&'a str> {
    let m = header.find(block)?;
    let rest = &block[m.end()..];
    let first = rest.chars().next()?;
    let end = SECTION_END
        .find_at(rest, first.len_utf8())
        .map(|end| end.start())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\n\n### 問題文（全文）\n右手の掌を下に向ける運動は\nどれか。\n\n### 選択肢\n- **a.** 回外\n- **b.** 回内\n- **c.** 屈曲\n\n### 正解\n**b.** 回内\n\n### 解説\n前腕の運動。\n\n---\n";

    #[test]
    fn test_extract_full_block() {
        let record = extract_record(BLOCK);
        assert_eq!(record.problem_text, "右手の掌を下に向ける運動は どれか。");
        assert_eq!(record.choices, vec!["回外", "回内", "屈曲"]);
        assert_eq!(record.joined_choices(), "回外 / 回内 / 屈曲");
        assert_eq!(record.answer_text, "b. 回内");
    }

    #[test]
    fn test_problem_priority() {
        let block = "### 問題文\n短い版\n\n### 問題文(全文)\n長い版\n";
        assert_eq!(extract_record(block).problem_text, "長い版");

        let block = "#### 問題文（要旨）\n要旨版\n#### 問題文\n素の版\n";
        assert_eq!(extract_record(block).problem_text, "要旨版");
    }

    #[test]
    fn test_problem_stops_at_rule() {
        let block = "### 問題文\n一行目\n二行目\n---\n無関係な文";
        assert_eq!(extract_record(block).problem_text, "一行目 二行目");
    }

    #[test]
    fn test_circled_choices() {
        let block = "### 選択肢\n- **①** 上腕二頭筋\n- **②、** 上腕三頭筋\n-**③**烏口腕筋\n\n### 正解\n②";
        let record = extract_record(block);
        assert_eq!(record.choices, vec!["上腕二頭筋", "上腕三頭筋", "烏口腕筋"]);
        assert_eq!(record.answer_text, "②");
    }

    #[test]
    fn test_choices_require_labels() {
        let block = "### 選択肢\n- 回外\n- 回内\n";
        assert!(extract_record(block).choices.is_empty());
    }

    #[test]
    fn test_answer_collapses_whitespace() {
        let block = "### 正解\n**d.**   左大脳半球の\n下前頭回\n### 解説\nx";
        assert_eq!(extract_record(block).answer_text, "d. 左大脳半球の 下前頭回");
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let record = extract_record("## 解説のみ\n本文だけのブロック\n");
        assert_eq!(record, QuestionRecord::default());
        assert!(!record.has_linkable_text());
    }

    #[test]
    fn test_header_without_body() {
        assert_eq!(extract_record("### 正解\n").answer_text, "");
    }
}
