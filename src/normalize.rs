use std::fmt;

use serde::{Deserialize, Serialize};

const SEPARATOR: char = '-';
const PREFIX_LEN: usize = 4;
const CODE_LEN: usize = 7;

/// A postal code with its separators stripped, as sent to the lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Seven ASCII digits.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == CODE_LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// The display form `NNNN-NNN`. Keys that are not well formed are
    /// returned unchanged.
    pub fn formatted(&self) -> String {
        if self.is_well_formed() {
            format!("{}{}{}", &self.0[..PREFIX_LEN], SEPARATOR, &self.0[PREFIX_LEN..])
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip every separator from a raw postal code.
///
/// Total over all inputs: nothing is validated here. Callers that care can
/// check [`CanonicalKey::is_well_formed`].
pub fn normalize(raw: &str) -> CanonicalKey {
    CanonicalKey(raw.chars().filter(|c| *c != SEPARATOR).collect())
}
