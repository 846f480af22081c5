//! Update filter predicates.
//!
//! A filter key describes an expected update shape:
//!
//! * `"any"` matches every update.
//! * A bare key matches the update's kind tag — the container name of a
//!   typed variant (`"message"`, `"callbackQuery"`, …) or a raw update's
//!   class tag (`"UpdatesTooLong"`).
//! * A dotted key `"<alias>.<field>"` expands the alias through a fixed
//!   table and matches when the aliased container is present *and* carries
//!   the named field: `"msg.text"` is a new message that has text.
//!
//! Matching is pure — no side effects, never an error; a key that fits
//! nothing is simply `false`.

use crate::update::Update;

/// Alias table for dotted shorthand keys.
const ALIASES: [(&str, &str); 4] = [
    ("cb",       "callbackQuery"),
    ("msg",      "message"),
    ("editMsg",  "editedMessage"),
    ("editPost", "editedChannelPost"),
];

fn expand_alias(alias: &str) -> Option<&'static str> {
    ALIASES.iter().find(|(a, _)| *a == alias).map(|(_, full)| *full)
}

/// Does `update` match the single filter `key`?
pub fn matches(key: &str, update: &Update) -> bool {
    if key == "any" {
        return true;
    }
    if let Some((alias, field)) = key.split_once('.') {
        return match expand_alias(alias) {
            Some(base) => update.container(base).is_some_and(|c| c.has(field)),
            None => false,
        };
    }
    update.kind() == key
}

/// Does `update` match any of `keys`?  Logical OR, short-circuiting on the
/// first success.
pub fn matches_any<I, S>(keys: I, update: &Update) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter().any(|key| matches(key.as_ref(), update))
}
