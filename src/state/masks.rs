//! The mask engine: IRC glob patterns over `nick!user@host` identifiers.
//!
//! A [`UserMaskSet`] keeps a set of mask patterns and one compiled matcher,
//! the `|`-union of each mask's regex. Masks are split at the wildcards `*`
//! and `?`; the literal pieces are meta-escaped and rejoined with `.*` and
//! `.` respectively, each mask anchored `^...$`. Both the masks and the
//! matched subjects are case-folded, so matching is rfc1459-insensitive.

use std::collections::HashSet;

use limelight_proto::{fold, Name};
use regex::Regex;

/// Whether a mask contains any glob characters.
pub fn has_wildcards(mask: &str) -> bool {
    mask.contains(['*', '?'])
}

/// Expand a bare lookup target to full userhost shape: a missing `!` gets
/// `!*` appended, a missing `@` gets `@*`, so `nick` becomes `nick!*@*`.
pub fn expand_userhost(target: &str) -> String {
    let mut expanded = target.to_string();
    if !expanded.contains('!') {
        expanded.push_str("!*");
    }
    if !expanded.contains('@') {
        expanded.push_str("@*");
    }
    expanded
}

fn glob_to_regex(mask: &str) -> String {
    let many: Vec<String> = mask
        .split('*')
        .map(|piece| {
            piece
                .split('?')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect();
    format!("^{}$", many.join(".*"))
}

/// A set of userhost glob patterns with a compiled combined matcher.
///
/// The matcher is rebuilt on every add or remove.
#[derive(Debug, Default)]
pub struct UserMaskSet {
    masks: HashSet<Name>,
    matcher: Option<Regex>,
}

impl UserMaskSet {
    /// An empty set, matching nothing.
    pub fn new() -> Self {
        UserMaskSet::default()
    }

    /// Add a mask. Returns false if it was already present.
    pub fn add(&mut self, mask: Name) -> bool {
        if !self.masks.insert(mask) {
            return false;
        }
        self.rebuild();
        true
    }

    /// Add several masks at once. Returns true if any was new.
    pub fn add_all(&mut self, masks: impl IntoIterator<Item = Name>) -> bool {
        let mut added = false;
        for mask in masks {
            added |= self.masks.insert(mask);
        }
        self.rebuild();
        added
    }

    /// Remove a mask. Returns false if it was not present.
    pub fn remove(&mut self, mask: &Name) -> bool {
        if !self.masks.remove(mask) {
            return false;
        }
        self.rebuild();
        true
    }

    /// Whether any mask matches the given userhost.
    pub fn matches(&self, userhost: &str) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(&fold(userhost)),
            None => false,
        }
    }

    /// The patterns, as originally written.
    pub fn masks(&self) -> impl Iterator<Item = &Name> {
        self.masks.iter()
    }

    /// Whether the set holds no masks.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    fn rebuild(&mut self) {
        if self.masks.is_empty() {
            self.matcher = None;
            return;
        }
        let expr = self
            .masks
            .iter()
            .map(|mask| glob_to_regex(mask.folded()))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&expr) {
            Ok(matcher) => self.matcher = Some(matcher),
            Err(e) => {
                tracing::error!(error = %e, "mask regex failed to compile");
                self.matcher = None;
            }
        }
    }
}

impl std::fmt::Display for UserMaskSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for mask in &self.masks {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{mask}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion() {
        assert_eq!(expand_userhost("nick"), "nick!*@*");
        assert_eq!(expand_userhost("nick!user"), "nick!user@*");
        assert_eq!(expand_userhost("*@evil.host"), "*!*@evil.host");
        assert_eq!(expand_userhost("a!b@c"), "a!b@c");
    }

    #[test]
    fn wildcard_detection() {
        assert!(has_wildcards("*!*@evil.*"));
        assert!(has_wildcards("n?ck"));
        assert!(!has_wildcards("nick!user@host"));
    }

    #[test]
    fn matches_star_and_question() {
        let mut set = UserMaskSet::new();
        set.add(Name::new("*!*@evil.*"));
        assert!(set.matches("bob!x@evil.host"));
        assert!(!set.matches("bob!x@good.host"));

        set.add(Name::new("b?b!*@*"));
        assert!(set.matches("bab!any@where"));
        assert!(!set.matches("bobby!any@where"));
    }

    #[test]
    fn matching_is_case_folded() {
        let mut set = UserMaskSet::new();
        set.add(Name::new("NICK[1]!*@*"));
        assert!(set.matches("nick{1}!user@host"));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = UserMaskSet::new();
        assert!(!set.matches("anyone!any@where"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        let mut set = UserMaskSet::new();
        set.add(Name::new("*!*@host.example"));
        assert!(set.matches("a!b@host.example"));
        assert!(!set.matches("a!b@hostxexample"));
    }

    #[test]
    fn remove_invalidates_matcher() {
        let mut set = UserMaskSet::new();
        let mask = Name::new("*!*@evil.*");
        set.add(mask.clone());
        assert!(set.matches("bob!x@evil.host"));
        assert!(set.remove(&mask));
        assert!(!set.matches("bob!x@evil.host"));
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_add_reports_false() {
        let mut set = UserMaskSet::new();
        assert!(set.add(Name::new("a!b@c")));
        assert!(!set.add(Name::new("a!b@c")));
    }
}
