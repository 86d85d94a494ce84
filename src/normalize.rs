use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Leading choice label such as `a.`, `d `, a bare `c` or `④`. A Latin letter
/// only counts as a label when a separator, whitespace or the end of the text
/// follows it, so `eGFR` keeps its first letter.
static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[①②③④⑤⑥⑦⑧⑨⑩]|[a-e](?:[.．、:：]|\s|$))[.．、:：\s]*")
        .expect("leading label regex")
});

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(]([^）)]*)[）)]").expect("parenthetical regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Canonical comparison form of an answer: label removed, parentheticals
/// unwrapped, whitespace removed.
///
/// Every pass that changes the text shortens it, so repeating until the
/// text is stable terminates and makes the result idempotent.
pub fn normalize_answer(raw: &str) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `text` with CRLF line endings turned into LF. Borrowed when there are none.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

fn normalize_once(s: &str) -> String {
    let unlabeled = LEADING_LABEL.replace(s, "");
    let unwrapped = PARENTHETICAL.replace_all(&unlabeled, "$1");
    WHITESPACE.replace_all(&unwrapped, "").into_owned()
}
