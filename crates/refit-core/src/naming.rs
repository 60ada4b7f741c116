/// Decides whether an identifier looks obfuscator-generated.
///
/// Gate for name-table insertion: identifiers the filter rejects are assumed
/// already canonical and not worth recording. Different renamers emit
/// different shapes, so the predicate is pluggable.
pub trait ObfuscationFilter {
    fn is_obfuscated(&self, name: &str) -> bool;
}

/// Matches the fixed-length uppercase-letter run emitted by the targeted
/// renamer (e.g. `NKFHIAOPJGD`).
///
/// Nested and namespace-qualified identifiers are checked on their last
/// segment, since the renamer only replaces simple names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UppercaseRunFilter {
    /// Exact identifier length the renamer produces.
    pub run_len: usize,
}

impl Default for UppercaseRunFilter {
    fn default() -> Self {
        Self { run_len: 11 }
    }
}

impl ObfuscationFilter for UppercaseRunFilter {
    fn is_obfuscated(&self, name: &str) -> bool {
        let simple = name
            .rsplit(|c| c == '.' || c == '/')
            .next()
            .unwrap_or(name);
        // Generic suffixes like `1 survive renaming; strip before the check.
        let simple = simple.split('`').next().unwrap_or(simple);
        simple.len() == self.run_len && simple.bytes().all(|b| b.is_ascii_uppercase())
    }
}
