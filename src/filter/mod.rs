//! filter
//!
//! Ignore-pattern path filter for review file selection.
//!
//! A filter is an ordered list of gitignore-style pattern lines taken from
//! the review-files trailer. Later lines take precedence over earlier ones,
//! mirroring conventional ignore-file semantics, so evaluation scans the
//! rules from last to first and returns the sense of the first match.
//! "No rule matches" is a distinct third outcome, not a default deny.
//!
//! A filter with zero rules is the *match-all* state: the tree rewrite
//! adopts the whole target tree without walking it.
//!
//! Pure function of its rule set and the query path; no I/O.
//!
//! # Example
//!
//! ```
//! use review_follow::filter::{ReviewFilter, Selection};
//!
//! let filter = ReviewFilter::new("src\n!src/vendor\n");
//! assert_eq!(filter.classify("src", true), Selection::Include);
//! assert_eq!(filter.classify("src/vendor", true), Selection::Exclude);
//! assert_eq!(filter.classify("docs", true), Selection::NoMatch);
//! ```

use globset::{GlobBuilder, GlobMatcher};

/// Outcome of classifying one path against the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A rule selects this path: content comes from the target.
    Include,
    /// A negated rule rejects this path: content stays with the parent.
    Exclude,
    /// No rule has an opinion on this path.
    NoMatch,
}

/// One compiled pattern line.
#[derive(Debug)]
struct Rule {
    /// Sense of the rule; a leading `!` negates it.
    include: bool,
    /// A trailing `/` restricts the rule to directories.
    dir_only: bool,
    /// Compiled matcher. `None` for lines that can never match
    /// (comments, bare negations, unparsable globs).
    matcher: Option<GlobMatcher>,
}

impl Rule {
    fn parse(line: &str) -> Self {
        let mut pattern = line;
        let mut include = true;

        if let Some(rest) = pattern.strip_prefix('!') {
            include = false;
            pattern = rest;
        }
        if pattern.starts_with('#') {
            // comment line, never matches
            return Rule {
                include,
                dir_only: false,
                matcher: None,
            };
        }
        // unescape a literal leading '!' or '#'
        pattern = pattern
            .strip_prefix("\\!")
            .or_else(|| pattern.strip_prefix("\\#"))
            .map(|rest| &line[line.len() - rest.len() - 1..])
            .unwrap_or(pattern);

        let dir_only = pattern.ends_with('/');
        let pattern = pattern.trim_end_matches('/');

        // A pattern without a slash matches the final path component at any
        // depth; a pattern with a slash is anchored at the tree root.
        let glob = if let Some(anchored) = pattern.strip_prefix('/') {
            anchored.to_string()
        } else if pattern.contains('/') {
            pattern.to_string()
        } else {
            format!("**/{pattern}")
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .build()
            .ok()
            .map(|g| g.compile_matcher());

        Rule {
            include,
            dir_only,
            matcher,
        }
    }

    fn matches(&self, path: &str, is_directory: bool) -> bool {
        if self.dir_only && !is_directory {
            return false;
        }
        match &self.matcher {
            Some(m) => m.is_match(path),
            None => false,
        }
    }
}

/// An ordered set of review file rules.
#[derive(Debug)]
pub struct ReviewFilter {
    /// Rules in declaration order; evaluation scans them reversed because
    /// later lines have higher priority.
    rules: Vec<Rule>,
}

impl ReviewFilter {
    /// Build a filter from newline-separated pattern text.
    ///
    /// Blank and whitespace-only lines are dropped. Unparsable lines are
    /// kept as rules that never match, so they count against
    /// [`match_all`](Self::match_all) but have no structural effect.
    pub fn new(lines: &str) -> Self {
        Self::from_lines(lines.split('\n'))
    }

    /// Build a filter from individual pattern lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim();
                if line.is_empty() {
                    None
                } else {
                    Some(Rule::parse(line))
                }
            })
            .collect();
        Self { rules }
    }

    /// Whether the filter has no rules and therefore selects everything.
    ///
    /// Callers use this to adopt the whole target tree without a walk.
    pub fn match_all(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a path against the rule set.
    ///
    /// Scans rules from highest to lowest precedence and returns the sense
    /// of the first structural match.
    pub fn classify(&self, path: &str, is_directory: bool) -> Selection {
        for rule in self.rules.iter().rev() {
            if rule.matches(path, is_directory) {
                return if rule.include {
                    Selection::Include
                } else {
                    Selection::Exclude
                };
            }
        }
        Selection::NoMatch
    }
}
