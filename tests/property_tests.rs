//! Property-based tests for trailer rewriting.
//!
//! The rewrite must be idempotent over arbitrary well-formed messages:
//! applying the same rewrite twice yields the same message as applying it
//! once, and the written values must be recoverable afterwards.

use proptest::prelude::*;

use review_follow::trailer::{insert_trailers, trailer_values};

/// A subject or body line: printable, no colon, so it never looks like a
/// trailer.
fn prose_line() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 .,]{0,40}"
}

/// A commit message of a subject and zero or more body paragraphs.
fn message() -> impl Strategy<Value = String> {
    (
        prose_line(),
        prop::collection::vec(prop::collection::vec(prose_line(), 1..4), 0..3),
    )
        .prop_map(|(subject, paragraphs)| {
            let mut out = subject;
            out.push('\n');
            for paragraph in paragraphs {
                out.push('\n');
                for line in paragraph {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
            out
        })
}

fn trailer_key() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9-]{0,15}"
}

fn trailer_value() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9./_-]{0,20}"
}

proptest! {
    #[test]
    fn insert_is_idempotent(
        message in message(),
        key in trailer_key(),
        values in prop::collection::vec(trailer_value(), 0..4),
    ) {
        let joined = values.join("\n");
        let once = insert_trailers(&message, &key, &joined);
        let twice = insert_trailers(&once, &key, &joined);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn inserted_values_are_recoverable(
        message in message(),
        key in trailer_key(),
        values in prop::collection::vec(trailer_value(), 0..4),
    ) {
        let joined = values.join("\n");
        let updated = insert_trailers(&message, &key, &joined);
        prop_assert_eq!(trailer_values(&updated, &key), values);
    }

    #[test]
    fn result_stays_newline_terminated(
        message in message(),
        key in trailer_key(),
        value in trailer_value(),
    ) {
        let updated = insert_trailers(&message, &key, &value);
        prop_assert!(updated.ends_with('\n'));
    }

    #[test]
    fn rewrite_then_remove_clears_the_key(
        message in message(),
        key in trailer_key(),
        value in trailer_value(),
    ) {
        let inserted = insert_trailers(&message, &key, &value);
        let removed = insert_trailers(&inserted, &key, "");
        prop_assert!(trailer_values(&removed, &key).is_empty());
    }
}
