//! Compiled glob patterns over absolute paths.
//!
//! Supported syntax, per `/`-separated segment:
//! - `**` on its own matches zero or more whole segments;
//! - `*` matches any run of characters inside one segment;
//! - `?` matches exactly one character inside one segment;
//! - `[abc]`, `[a-z]` match one character from the set, `[!...]` or `[^...]` one outside it
//!   (a `]` right after the opening bracket is a member; an unclosed `[` is literal);
//! - everything else is literal.
//!
//! Wildcards never match the special segments `.` and `..`, and never match a segment
//! that starts with `.` unless the pattern segment itself starts with a literal `.`.
//! Matching is whole-path and segment-wise: the path is split into segments and the
//! pattern is evaluated against them with a dynamic-programming table, so `**` can
//! never straddle a partial segment.

use std::fmt::{Display, Formatter};
use std::path::{Component, Path};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern '{0}' is not an absolute path")]
    NotAbsolute(String),
    #[error("pattern '{0}' contains a '.' or '..' segment")]
    DotSegment(String),
    #[error("pattern '{0}' combines '**' with other characters in one segment")]
    BadGlobstar(String),
    #[error("pattern '{0}' contains a NUL character")]
    Nul(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Glyph {
    Lit(char),
    Star,
    Any,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Glyph {
    fn accepts(&self, c: char) -> bool {
        match self {
            Glyph::Lit(l) => *l == c,
            Glyph::Any => true,
            Glyph::Class { negated, ranges } => ranges.iter().any(|(lo, hi)| *lo <= c && c <= *hi) != *negated,
            Glyph::Star => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wild { glyphs: Vec<Glyph>, dot_leading: bool },
    Globstar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        if trimmed.is_empty() { return Err(PatternError::Empty); }
        if trimmed.contains('\0') { return Err(PatternError::Nul(source.to_string())); }
        if !trimmed.starts_with('/') { return Err(PatternError::NotAbsolute(source.to_string())); }

        let mut segments = Vec::new();
        for raw in trimmed.split('/').filter(|s| !s.is_empty()) {
            if raw == "." || raw == ".." {
                return Err(PatternError::DotSegment(source.to_string()));
            }
            if raw == "**" {
                // Consecutive globstars are equivalent to one
                if segments.last() != Some(&Segment::Globstar) { segments.push(Segment::Globstar); }
                continue;
            }
            if raw.contains("**") {
                return Err(PatternError::BadGlobstar(source.to_string()));
            }
            let glyphs = parse_glyphs(raw);
            if glyphs.iter().all(|g| matches!(g, Glyph::Lit(_))) {
                segments.push(Segment::Literal(raw.to_string()));
            } else {
                segments.push(Segment::Wild { glyphs, dot_leading: raw.starts_with('.') });
            }
        }
        Ok(Self { source: trimmed.to_string(), segments })
    }

    pub fn as_str(&self) -> &str { &self.source }

    /// Whole-path match against an absolute path. Relative paths, paths with `.`/`..`
    /// components and non-UTF-8 segments never match.
    pub fn matches_path(&self, path: &Path) -> bool {
        if !path.is_absolute() { return false; }
        let mut names: Vec<&str> = Vec::new();
        for comp in path.components() {
            match comp {
                Component::RootDir | Component::Prefix(_) => {}
                Component::Normal(os) => match os.to_str() {
                    Some(s) => names.push(s),
                    None => return false,
                },
                Component::CurDir | Component::ParentDir => return false,
            }
        }
        self.matches_segments(&names)
    }

    pub fn matches_segments(&self, names: &[&str]) -> bool {
        let p = self.segments.len();
        let s = names.len();
        let width = s + 1;
        // table[i * width + j]: segments[i..] matches names[j..]
        let mut table = vec![false; (p + 1) * width];
        table[p * width + s] = true;
        for i in (0..p).rev() {
            for j in (0..=s).rev() {
                let here = match &self.segments[i] {
                    Segment::Globstar => {
                        table[(i + 1) * width + j]
                            || (j < s && !is_hidden(names[j]) && table[i * width + j + 1])
                    }
                    seg => j < s && segment_matches(seg, names[j]) && table[(i + 1) * width + j + 1],
                };
                table[i * width + j] = here;
            }
        }
        table[0]
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.source) }
}

fn is_hidden(name: &str) -> bool { name.starts_with('.') }

fn segment_matches(seg: &Segment, name: &str) -> bool {
    match seg {
        Segment::Literal(lit) => lit == name,
        Segment::Wild { glyphs, dot_leading } => {
            if name == "." || name == ".." { return false; }
            if is_hidden(name) && !dot_leading { return false; }
            wildcard_match(glyphs, name)
        }
        Segment::Globstar => false,
    }
}

fn parse_glyphs(raw: &str) -> Vec<Glyph> {
    let chars: Vec<char> = raw.chars().collect();
    let mut glyphs = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => glyphs.push(Glyph::Star),
            '?' => glyphs.push(Glyph::Any),
            '[' => {
                if let Some((class, next)) = parse_class(&chars, i) {
                    glyphs.push(class);
                    i = next;
                    continue;
                }
                glyphs.push(Glyph::Lit('['));
            }
            other => glyphs.push(Glyph::Lit(other)),
        }
        i += 1;
    }
    glyphs
}

/// Parse a bracket expression starting at `chars[open] == '['`. Returns the class and
/// the index just past the closing `]`, or None when the bracket is never closed.
fn parse_class(chars: &[char], open: usize) -> Option<(Glyph, usize)> {
    let mut i = open + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated { i += 1; }
    let first = i;
    let mut ranges = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c == ']' && i > first {
            return Some((Glyph::Class { negated, ranges }, i + 1));
        }
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|&hi| hi != ']') {
            let hi = chars[i + 2];
            if c <= hi { ranges.push((c, hi)); }
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    None
}

/// Single-segment wildcard match with star backtracking.
fn wildcard_match(glyphs: &[Glyph], name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();
    let (mut p, mut c) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while c < chars.len() {
        match glyphs.get(p) {
            Some(Glyph::Star) => { star = Some((p, c)); p += 1; }
            Some(g) if g.accepts(chars[c]) => { p += 1; c += 1; }
            _ => match star {
                Some((sp, sc)) => {
                    p = sp + 1;
                    c = sc + 1;
                    star = Some((sp, sc + 1));
                }
                None => return false,
            },
        }
    }
    while glyphs.get(p) == Some(&Glyph::Star) { p += 1; }
    p == glyphs.len()
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod pattern_tests;
