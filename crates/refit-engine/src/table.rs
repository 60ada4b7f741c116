use std::collections::HashMap;

use refit_core::ObfuscationFilter;

/// Result of one name-table insertion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New mapping recorded.
    Recorded,
    /// Both names are identical; nothing to translate.
    IgnoredIdentical,
    /// The left name does not look obfuscator-generated; assumed canonical.
    IgnoredReadable,
    /// Same mapping already present.
    IgnoredDuplicate,
    /// A different mapping for this name already exists; it wins.
    RejectedConflict,
}

/// Insertion-ordered obfuscated-to-readable identifier mapping.
#[derive(Debug, Default)]
pub struct NameTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `obfuscated -> readable`, first mapping wins on conflict.
    pub fn add(
        &mut self,
        filter: &dyn ObfuscationFilter,
        obfuscated: &str,
        readable: &str,
    ) -> AddOutcome {
        if obfuscated == readable {
            return AddOutcome::IgnoredIdentical;
        }
        if !filter.is_obfuscated(obfuscated) {
            return AddOutcome::IgnoredReadable;
        }
        if let Some(&at) = self.index.get(obfuscated) {
            if self.entries[at].1 == readable {
                AddOutcome::IgnoredDuplicate
            } else {
                AddOutcome::RejectedConflict
            }
        } else {
            self.index
                .insert(obfuscated.to_string(), self.entries.len());
            self.entries
                .push((obfuscated.to_string(), readable.to_string()));
            AddOutcome::Recorded
        }
    }

    pub fn get(&self, obfuscated: &str) -> Option<&str> {
        self.index
            .get(obfuscated)
            .map(|&at| self.entries[at].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, r)| (o.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
