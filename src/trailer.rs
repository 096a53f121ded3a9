//! trailer
//!
//! Commit-message trailer parsing and rewriting.
//!
//! A trailer is a `Key: value` line inside the final paragraph of a commit
//! message. The final paragraph is treated as an existing trailer block when
//! it carries the well-known `Change-Id:` marker, when every line in it is
//! trailer-shaped, or when it already contains the key being rewritten;
//! otherwise a fresh trailer paragraph is started with a separating blank
//! line. This recognition is what makes [`insert_trailers`] idempotent:
//! applying the same rewrite twice yields the same message as applying it
//! once.
//!
//! # Example
//!
//! ```
//! use review_follow::trailer::insert_trailers;
//!
//! let message = "Subject\n\nBody line\n";
//! let updated = insert_trailers(message, "Review-Target", "refs/heads/main");
//! assert_eq!(updated, "Subject\n\nBody line\n\nReview-Target: refs/heads/main\n");
//! ```

/// Marker trailer identifying an existing footer paragraph.
const FOOTER_MARKER: &str = "Change-Id:";

/// Rewrite all `key` trailers in `message`.
///
/// `values` is newline-separated; entries are trimmed and blank entries
/// dropped. One `key: value` line is written per remaining entry, replacing
/// any existing `key` lines in place: the first old `key` line anchors the
/// insertion point, later `key` lines are elided, and all other trailer
/// lines keep their relative order. Old key lines are matched
/// case-insensitively, mirroring how [`trailer_values`] reads them, so a
/// rewrite never leaves two differently-cased copies behind. An empty
/// `values` removes every `key` trailer.
///
/// Messages without a final trailer paragraph get one, separated by a blank
/// line; messages not ending in a newline are terminated first.
pub fn insert_trailers(message: &str, key: &str, values: &str) -> String {
    let new_lines: Vec<&str> = values
        .split('\n')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    // Locate the last blank-line-delimited paragraph and decide whether it
    // is an existing trailer block.
    let footer = message.rfind("\n\n").and_then(|p| {
        let tail = &message[p + 2..];
        let has_key = tail.lines().any(|line| is_key_line(line, key));
        let block = has_key
            || tail.lines().any(|line| line.starts_with(FOOTER_MARKER))
            || is_trailer_block(tail);
        block.then_some((p + 2, tail, has_key))
    });

    let Some((start, tail, has_key)) = footer else {
        if new_lines.is_empty() {
            return message.to_string();
        }
        // start a new trailer paragraph
        let mut out = String::with_capacity(message.len() + 64);
        out.push_str(message);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        push_trailers(&mut out, key, &new_lines);
        return out;
    };

    // Removing a key that is not present is a no-op; in particular it must
    // not grow a stray blank paragraph.
    if new_lines.is_empty() && !has_key {
        return message.to_string();
    }

    let mut out = String::with_capacity(message.len() + 64);
    out.push_str(&message[..start]);
    let mut replaced = false;
    for line in tail.lines() {
        if is_key_line(line, key) {
            if !replaced {
                push_trailers(&mut out, key, &new_lines);
                replaced = true;
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    if !replaced {
        push_trailers(&mut out, key, &new_lines);
    }

    out
}

fn push_trailers(out: &mut String, key: &str, values: &[&str]) {
    for value in values {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
}

/// Whether `line` is a trailer for `key`, compared case-insensitively.
fn is_key_line(line: &str, key: &str) -> bool {
    split_trailer(line).is_some_and(|(k, _)| k.eq_ignore_ascii_case(key))
}

/// Values of all `key` trailers in the message's footer paragraph.
///
/// The footer is the last blank-line-delimited paragraph; a message that is
/// a single paragraph has no footer. Key comparison is case-insensitive,
/// values are trimmed.
pub fn trailer_values(message: &str, key: &str) -> Vec<String> {
    let Some(p) = message.rfind("\n\n") else {
        return Vec::new();
    };

    message[p + 2..]
        .lines()
        .filter_map(|line| {
            let (k, v) = split_trailer(line)?;
            if k.eq_ignore_ascii_case(key) {
                Some(v.trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Split a line into `(key, value)` if it is trailer-shaped.
fn split_trailer(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let well_formed = !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    well_formed.then_some((key, value))
}

/// Whether every non-blank line of the paragraph is trailer-shaped.
fn is_trailer_block(paragraph: &str) -> bool {
    let mut any = false;
    for line in paragraph.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if split_trailer(line).is_none() {
            return false;
        }
        any = true;
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;

    mod insert {
        use super::*;

        #[test]
        fn new_paragraph_single_value() {
            assert_eq!(
                insert_trailers("A\n\nB\nC\n", "C", "value"),
                "A\n\nB\nC\n\nC: value\n"
            );
        }

        #[test]
        fn new_paragraph_two_values() {
            assert_eq!(
                insert_trailers("A\n\nB\nC\n", "C", "value1 \n value2"),
                "A\n\nB\nC\n\nC: value1\nC: value2\n"
            );
        }

        #[test]
        fn append_to_existing_footer() {
            assert_eq!(
                insert_trailers("A\n\nB: no-footer\n\nChange-Id: footer\n", "B", "value"),
                "A\n\nB: no-footer\n\nChange-Id: footer\nB: value\n"
            );
        }

        #[test]
        fn append_two_to_existing_footer() {
            assert_eq!(
                insert_trailers(
                    "A\n\nB: no-footer\n\nChange-Id: footer\n",
                    "B",
                    "value1 \n value2"
                ),
                "A\n\nB: no-footer\n\nChange-Id: footer\nB: value1\nB: value2\n"
            );
        }

        #[test]
        fn replace_one_with_one() {
            assert_eq!(
                insert_trailers(
                    "A\n\nB: no-footer\n\nChange-Id: footer\nD: between\nE: last\n",
                    "D",
                    "value"
                ),
                "A\n\nB: no-footer\n\nChange-Id: footer\nD: value\nE: last\n"
            );
        }

        #[test]
        fn replace_one_with_two() {
            assert_eq!(
                insert_trailers(
                    "A\n\nB: no-footer\n\nChange-Id: footer\nD: between\nE: last\n",
                    "D",
                    "value1 \n value2"
                ),
                "A\n\nB: no-footer\n\nChange-Id: footer\nD: value1\nD: value2\nE: last\n"
            );
        }

        #[test]
        fn replace_two_with_one() {
            assert_eq!(
                insert_trailers(
                    "A\n\nB: no-footer\n\nChange-Id: footer\nD: between\nE: other\nD: another\n",
                    "D",
                    "value"
                ),
                "A\n\nB: no-footer\n\nChange-Id: footer\nD: value\nE: other\n"
            );
        }

        #[test]
        fn replace_two_with_two() {
            assert_eq!(
                insert_trailers(
                    "A\n\nB: no-footer\n\nChange-Id: footer\nD: between\nE: other\nD: another\n",
                    "D",
                    "value1 \n value2"
                ),
                "A\n\nB: no-footer\n\nChange-Id: footer\nD: value1\nD: value2\nE: other\n"
            );
        }

        #[test]
        fn remove_before_marker() {
            assert_eq!(
                insert_trailers("A\n\nB: no-footer\n\nC: remove\nChange-Id: footer\n", "C", ""),
                "A\n\nB: no-footer\n\nChange-Id: footer\n"
            );
        }

        #[test]
        fn remove_after_marker() {
            assert_eq!(
                insert_trailers("A\n\nB: no-footer\n\nChange-Id: footer\nC: remove\n", "C", ""),
                "A\n\nB: no-footer\n\nChange-Id: footer\n"
            );
        }

        #[test]
        fn values_trimmed_and_blanks_dropped() {
            assert_eq!(
                insert_trailers("A\n", "B", "\n with whitespace \n "),
                "A\n\nB: with whitespace\n"
            );
        }

        #[test]
        fn remove_absent_key_is_noop() {
            assert_eq!(insert_trailers("A\n", "B", ""), "A\n");
            assert_eq!(
                insert_trailers("A\n\nChange-Id: footer\n", "B", ""),
                "A\n\nChange-Id: footer\n"
            );
        }

        #[test]
        fn subject_only_message() {
            assert_eq!(insert_trailers("Subject\n", "K", "v"), "Subject\n\nK: v\n");
        }

        #[test]
        fn message_without_trailing_newline() {
            assert_eq!(insert_trailers("Subject", "K", "v"), "Subject\n\nK: v\n");
            assert_eq!(
                insert_trailers("A\n\nK: old", "K", "new"),
                "A\n\nK: new\n"
            );
        }

        #[test]
        fn trailer_paragraph_without_marker_is_reused() {
            // The final paragraph is trailer-shaped, so no extra blank line
            // is inserted even though Change-Id is absent.
            assert_eq!(
                insert_trailers("A\n\nK: old\nOther: x\n", "K", "new"),
                "A\n\nK: new\nOther: x\n"
            );
        }

        #[test]
        fn replaces_differently_cased_key() {
            assert_eq!(
                insert_trailers("Subject\n\nreview-target: old\n", "Review-Target", "new"),
                "Subject\n\nReview-Target: new\n"
            );
            assert_eq!(
                insert_trailers(
                    "Subject\n\nreview-target: old\nChange-Id: I1\n",
                    "Review-Target",
                    "new"
                ),
                "Subject\n\nReview-Target: new\nChange-Id: I1\n"
            );
        }

        #[test]
        fn mixed_case_duplicates_collapse() {
            let msg = "Subject\n\nreview-target: old\nReview-Target: new\n";
            let once = insert_trailers(msg, "Review-Target", "new");
            assert_eq!(once, "Subject\n\nReview-Target: new\n");
            assert_eq!(trailer_values(&once, "Review-Target"), vec!["new".to_string()]);
        }

        #[test]
        fn idempotent_on_fresh_paragraph() {
            let once = insert_trailers("A\n\nB\nC\n", "C", "value");
            let twice = insert_trailers(&once, "C", "value");
            assert_eq!(once, twice);
        }

        #[test]
        fn idempotent_with_existing_footer() {
            let msg = "A\n\nChange-Id: I123\nD: between\nE: last\n";
            let once = insert_trailers(msg, "D", "v1\nv2");
            let twice = insert_trailers(&once, "D", "v1\nv2");
            assert_eq!(once, twice);
        }

        #[test]
        fn idempotent_on_mixed_paragraph() {
            let once = insert_trailers("Subject\n\nK: v\nplain\n", "K", "v");
            let twice = insert_trailers(&once, "K", "v");
            assert_eq!(once, twice);
        }
    }

    mod values {
        use super::*;

        #[test]
        fn reads_footer_values() {
            let msg = "Subject\n\nBody\n\nReview-Target: refs/heads/main\nChange-Id: I1\n";
            assert_eq!(
                trailer_values(msg, "Review-Target"),
                vec!["refs/heads/main".to_string()]
            );
        }

        #[test]
        fn multiple_values_in_order() {
            let msg = "S\n\nReview-Files: src\nChange-Id: I1\nReview-Files: !*.md\n";
            assert_eq!(
                trailer_values(msg, "Review-Files"),
                vec!["src".to_string(), "!*.md".to_string()]
            );
        }

        #[test]
        fn key_match_is_case_insensitive() {
            let msg = "S\n\nreview-target: x\n";
            assert_eq!(trailer_values(msg, "Review-Target"), vec!["x".to_string()]);
        }

        #[test]
        fn subject_only_has_no_footer() {
            assert!(trailer_values("Fix: something\n", "Fix").is_empty());
        }

        #[test]
        fn non_trailer_lines_skipped() {
            let msg = "S\n\nnot a trailer\nK: v\n";
            assert_eq!(trailer_values(msg, "K"), vec!["v".to_string()]);
        }

        #[test]
        fn absent_key_is_empty() {
            let msg = "S\n\nChange-Id: I1\n";
            assert!(trailer_values(msg, "Review-Target").is_empty());
        }
    }
}
