use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::BTreeMap;

static THEME_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{3,4} \d+\. ").expect("theme start regex"));

static THEME_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{3,4}) \d+\. ").expect("theme number regex"));

/// `- 2022本 問5`: one sitting where the theme was asked.
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^- \d{4}(?:本|再) 問\d+").expect("reference regex"));

/// Lines carrying this mark point at a different theme and are not counted.
const NOT_THIS_THEME: char = '※';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub block: String,
    pub references: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestructureReport {
    pub themes: usize,
    /// Reference count → number of themes with that count
    pub by_frequency: BTreeMap<usize, usize>,
}

#[derive(Debug, Clone)]
pub struct Restructured {
    pub text: String,
    pub report: RestructureReport,
}

fn is_section_line(line: &str) -> bool {
    line.starts_with("## ")
}

/// Number of exam references in a theme block.
pub fn count_references(block: &str) -> usize {
    block
        .lines()
        .filter(|line| !line.contains(NOT_THIS_THEME) && REFERENCE.is_match(line))
        .count()
}

/// Split everything after the intro into themes. A theme runs from its
/// `### N.` / `#### N.` line to the next theme or `## ` section line; text
/// stranded after a section line is carried into the following theme.
pub fn split_themes(lines: &[&str]) -> Vec<Theme> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| THEME_START.is_match(line))
        .map(|(i, _)| i)
        .collect();

    let mut themes = Vec::with_capacity(starts.len());
    let mut prev_end = 0;

    for (idx, &start) in starts.iter().enumerate() {
        let next = starts.get(idx + 1).copied().unwrap_or(lines.len());
        let end = (start + 1..next)
            .find(|&j| is_section_line(lines[j]))
            .unwrap_or(next);

        let mut block_lines: Vec<&str> = Vec::new();
        if idx > 0 && prev_end < start {
            let gap = &lines[prev_end..start];
            if let Some(g) = gap.iter().position(|line| is_section_line(line)) {
                block_lines.extend_from_slice(&gap[g + 1..]);
            }
        }
        block_lines.extend_from_slice(&lines[start..end]);

        let block = block_lines.join("\n");
        let references = count_references(&block);
        themes.push(Theme { block, references });
        prev_end = end;
    }

    themes
}

/// Section heading generated for a reference count.
pub fn frequency_heading(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("## ★ 1回のみ出題".to_string()),
        2 | 3 => Some(format!("## ★★ {}回出題", count)),
        n => Some(format!("## ★★★ {}回出題", n)),
    }
}

/// Regroup themes by how often they were asked, most frequent first,
/// renumbering them from 1. The first `intro_lines` lines are kept as is.
pub fn restructure(content: &str, intro_lines: usize) -> Restructured {
    let lines: Vec<&str> = content.lines().collect();
    let split = intro_lines.min(lines.len());
    let intro = lines[..split].join("\n");

    let mut themes = split_themes(&lines[split..]);
    themes.sort_by_key(|theme| Reverse(theme.references));

    let mut by_frequency = BTreeMap::new();
    let mut out = vec![intro, String::new()];
    let mut current = None;

    for (i, theme) in themes.iter().enumerate() {
        *by_frequency.entry(theme.references).or_insert(0) += 1;

        if current != Some(theme.references) {
            current = Some(theme.references);
            if let Some(heading) = frequency_heading(theme.references) {
                out.push(heading);
                out.push(String::new());
            }
        }

        let number = i + 1;
        let renumbered = THEME_NUMBER.replacen(&theme.block, 1, |caps: &regex::Captures| {
            format!("{} {}. ", &caps[1], number)
        });
        out.push(renumbered.into_owned());
        out.push(String::new());
    }

    let text = format!("{}\n", out.join("\n").trim_end());
    Restructured {
        text,
        report: RestructureReport {
            themes: themes.len(),
            by_frequency,
        },
    }
}
