//! Reconciliation of incoming text fragments with accumulated content.
//!
//! The upstream does not guarantee clean incremental deltas: it may emit
//! true deltas, resend whole-message supersets, partial tokens, or exact
//! duplicates, inconsistently within one stream. This module decides, for
//! each incoming fragment, whether to discard, append, or replace, so the
//! displayed text grows without flicker or duplication.
//!
//! Deliberately a standalone pure function: if the upstream is ever fixed to
//! emit strict append-only deltas, this whole unit can be deleted.

/// Fragments shorter than this are treated as tokens (deltas or re-sent
/// tokens); longer ones as snapshots.
pub const SMALL_FRAGMENT_CHARS: usize = 50;

/// Fold newly received text fragments into the accumulated text.
///
/// Decision order, first match wins:
/// 1. identical to `previous`: discard
/// 2. short and already contained in `previous` (after trimming): discard
/// 3. `previous` empty: first content, take it
/// 4. longer than `previous` and contains it (trimmed): cumulative
///    snapshot, replace
/// 5. short: incremental delta, append
/// 6. otherwise: unrelated replacement chunk, replace
pub fn reconcile<S: AsRef<str>>(previous: &str, incoming: &[S]) -> String {
    let new_text: String = incoming.iter().map(|s| s.as_ref()).collect();

    if new_text.is_empty() || new_text == previous {
        return previous.to_string();
    }

    let is_short = new_text.chars().count() < SMALL_FRAGMENT_CHARS;
    if is_short && previous.contains(new_text.trim()) {
        return previous.to_string();
    }

    if previous.is_empty() {
        return new_text;
    }

    if new_text.len() > previous.len() && new_text.contains(previous.trim()) {
        return new_text;
    }

    if is_short {
        let mut next = String::with_capacity(previous.len() + new_text.len());
        next.push_str(previous);
        next.push_str(&new_text);
        return next;
    }

    new_text
}
