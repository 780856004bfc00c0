//! Case normalization for sourced labels
//!
//! Inventories are rarely consistent about casing (`OS: Ubuntu` on one VM,
//! `os: ubuntu` on the next). A [`TransformSpec`] names a text transform for
//! the label name and/or the value, applied to every label under the managed
//! prefix before the merge.

use crate::labels::HostLabels;
use serde::{Deserialize, Serialize};

/// Named text transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseTransform {
    /// `Ubuntu LTS` -> `ubuntu lts`
    Lower,
    /// `Ubuntu LTS` -> `UBUNTU LTS`
    Upper,
    /// `ubuntu LTS` -> `Ubuntu lts`
    Capitalize,
    /// `ubuntu lts` -> `Ubuntu Lts`
    Title,
    /// `Ubuntu LTS` -> `uBUNTU lts`
    Swapcase,
}

impl CaseTransform {
    /// Apply the transform to `text`
    pub fn apply(self, text: &str) -> String {
        match self {
            CaseTransform::Lower => text.to_lowercase(),
            CaseTransform::Upper => text.to_uppercase(),
            CaseTransform::Capitalize => {
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                    None => String::new(),
                }
            }
            CaseTransform::Title => {
                let mut out = String::with_capacity(text.len());
                let mut word_start = true;
                for c in text.chars() {
                    if c.is_alphabetic() {
                        if word_start {
                            out.extend(c.to_uppercase());
                        } else {
                            out.extend(c.to_lowercase());
                        }
                        word_start = false;
                    } else {
                        out.push(c);
                        word_start = true;
                    }
                }
                out
            }
            CaseTransform::Swapcase => text
                .chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else {
                        c.to_uppercase().collect::<Vec<_>>()
                    }
                })
                .collect(),
        }
    }
}

/// Which transform to apply to label names and to label values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Transform for the part of the key after the prefix
    #[serde(default)]
    pub label: Option<CaseTransform>,
    /// Transform for the value
    #[serde(default)]
    pub value: Option<CaseTransform>,
}

impl TransformSpec {
    /// True when neither keys nor values are transformed
    pub fn is_identity(&self) -> bool {
        self.label.is_none() && self.value.is_none()
    }
}

/// Apply `spec` to every label under `prefix`
///
/// Keys outside `prefix` pass through untouched. When two keys collapse to
/// the same key after the transform, the one sorting last wins.
pub fn normalize(labels: HostLabels, spec: &TransformSpec, prefix: &str) -> HostLabels {
    if spec.is_identity() {
        return labels;
    }

    labels
        .into_iter()
        .map(|(host, set)| {
            let converted = set
                .into_iter()
                .map(|(key, value)| match key.strip_prefix(prefix) {
                    Some(name) => {
                        let key = match spec.label {
                            Some(t) => format!("{prefix}{}", t.apply(name)),
                            None => key.clone(),
                        };
                        let value = match spec.value {
                            Some(t) => t.apply(&value),
                            None => value,
                        };
                        (key, value)
                    }
                    None => (key, value),
                })
                .collect();
            (host, converted)
        })
        .collect()
}
