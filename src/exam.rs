use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})([本再])試験").expect("exam filename regex"));
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})([本再])試$").expect("exam label regex"));

/// Which sitting of a given year an exam belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {
    /// 本試験
    Main,
    /// 再試験
    Retake,
}

impl Session {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "本" => Some(Session::Main),
            "再" => Some(Session::Retake),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            Session::Main => '本',
            Session::Retake => '再',
        }
    }
}

/// Exam identifier shared by explanation filenames and frequency rows.
///
/// Explanation documents are named `2022本試験_問題解説.md` and friends, while
/// the frequency table writes the same exam as `2022本試`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExamKey {
    pub year: u16,
    pub session: Session,
}

impl ExamKey {
    pub fn new(year: u16, session: Session) -> Self {
        Self { year, session }
    }

    /// Derive the key from a file stem or name. Names that do not start with
    /// `<year><本|再>試験` have no key.
    pub fn from_filename(name: &str) -> Option<Self> {
        let caps = FILENAME_RE.captures(name)?;
        Self::from_parts(&caps[1], &caps[2])
    }

    fn from_parts(year: &str, tag: &str) -> Option<Self> {
        Some(Self::new(year.parse().ok()?, Session::from_tag(tag)?))
    }
}

impl fmt::Display for ExamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}試", self.year, self.session.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseExamKeyError(String);

impl fmt::Display for ParseExamKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not an exam label: {:?}", self.0)
    }
}

impl std::error::Error for ParseExamKeyError {}

impl FromStr for ExamKey {
    type Err = ParseExamKeyError;

    /// Parses the row form, `2022本試`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LABEL_RE
            .captures(s)
            .and_then(|caps| Self::from_parts(&caps[1], &caps[2]))
            .ok_or_else(|| ParseExamKeyError(s.to_string()))
    }
}
