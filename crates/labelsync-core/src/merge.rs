//! Prefix-scoped label merge
//!
//! The merge replaces the managed namespace of a host's labels wholesale
//! and leaves everything else alone:
//!
//! ```text
//! existing  {hwsw/os: old, team: infra}
//! sourced   {hwsw/os: Ubuntu, hwsw/ver: 20.04}
//! prefix    hwsw/
//! result    {hwsw/os: Ubuntu, hwsw/ver: 20.04, team: infra}
//! ```
//!
//! Re-running with the same `sourced` input always converges to the same
//! set, and an empty `sourced` set clears the namespace on the host.

use crate::labels::LabelSet;

/// Compute the label set to write back for one host
///
/// Starts from `existing`, drops every key under `prefix` and overlays
/// `sourced`. With `enforce_cleanup` the prefix match ignores case, which
/// also retires keys written under a differently-cased prefix (`HWSW/x`).
pub fn merge(existing: &LabelSet, sourced: &LabelSet, prefix: &str, enforce_cleanup: bool) -> LabelSet {
    let mut merged = existing.clone();

    if enforce_cleanup {
        let prefix = prefix.to_lowercase();
        merged.retain(|key, _| !key.to_lowercase().starts_with(&prefix));
    } else {
        merged.retain(|key, _| !key.starts_with(prefix));
    }

    merged.extend(sourced.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Keys that `merge` would remove from `existing` and not put back
pub fn retired_keys<'a>(existing: &'a LabelSet, merged: &LabelSet) -> Vec<&'a str> {
    existing
        .keys()
        .filter(|key| !merged.contains_key(*key))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_managed_namespace() {
        let existing = labels(&[("hwsw/os", "old"), ("team", "infra")]);
        let sourced = labels(&[("hwsw/os", "Ubuntu"), ("hwsw/ver", "20.04")]);

        let merged = merge(&existing, &sourced, "hwsw/", false);

        assert_eq!(
            merged,
            labels(&[("team", "infra"), ("hwsw/os", "Ubuntu"), ("hwsw/ver", "20.04")])
        );
    }

    #[test]
    fn empty_source_clears_namespace() {
        let existing = labels(&[("hwsw/a", "1"), ("other", "2")]);
        let merged = merge(&existing, &LabelSet::new(), "hwsw/", false);
        assert_eq!(merged, labels(&[("other", "2")]));
    }

    #[test]
    fn cleanup_case_sensitivity() {
        let existing = labels(&[("HWSW/x", "1"), ("hwsw/y", "2"), ("keep", "3")]);

        let lenient = merge(&existing, &LabelSet::new(), "hwsw/", false);
        assert!(lenient.contains_key("HWSW/x"));
        assert!(!lenient.contains_key("hwsw/y"));

        let strict = merge(&existing, &LabelSet::new(), "hwsw/", true);
        assert!(!strict.contains_key("HWSW/x"));
        assert!(!strict.contains_key("hwsw/y"));
        assert_eq!(strict.get("keep").map(String::as_str), Some("3"));
    }

    #[test]
    fn retired_keys_lists_removed_labels() {
        let existing = labels(&[("hwsw/a", "1"), ("hwsw/b", "2"), ("team", "x")]);
        let sourced = labels(&[("hwsw/a", "9")]);
        let merged = merge(&existing, &sourced, "hwsw/", false);

        assert_eq!(retired_keys(&existing, &merged), vec!["hwsw/b"]);
    }
}
