//! Glob-based ignore filter.
//!
//! Hides OS metadata files and the sidecar `_dav/` tree from every listing,
//! and turns direct requests for such paths into 404s.

use regex::Regex;

use crate::davpath::DavPath;

// always hidden, in addition to user-supplied patterns.
const DEFAULT_PATTERNS: &[&str] = &[
    ".DS_Store",
    "._*",
    ".AppleDouble",
    ".Spotlight-V100",
    ".Trashes",
    "Thumbs.db",
    "desktop.ini",
    "_dav",
];

#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: Vec<Regex>,
}

impl IgnoreFilter {
    pub fn new(extra: &[String]) -> IgnoreFilter {
        let mut patterns = Vec::new();
        for glob in DEFAULT_PATTERNS.iter().map(|s| s.to_string()).chain(extra.iter().cloned()) {
            if let Ok(re) = Regex::new(&glob_to_regex(&glob)) {
                patterns.push(re);
            }
        }
        IgnoreFilter { patterns }
    }

    /// Does a single name match any ignore pattern?
    pub fn matches_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }

    /// A path is hidden when any of its segments matches.
    pub fn hides(&self, path: &DavPath) -> bool {
        path.segments().iter().any(|seg| self.matches_name(seg))
    }

    /// Filter a directory listing.
    pub fn filter_names(&self, names: Vec<String>) -> Vec<String> {
        names.into_iter().filter(|n| !self.matches_name(n)).collect()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        IgnoreFilter::new(&[])
    }
}

// `*` matches within a segment, `?` a single character; everything else
// is literal. Anchored on both ends.
fn glob_to_regex(glob: &str) -> String {
    let mut re = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => re.push_str("[^/]*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    re
}
