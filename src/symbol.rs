use lasso::{Spur, ThreadedRodeo};

/// Interned name of a constructor, cell label or generated constant.
pub type Label = Spur;

/// Thread-safe store for the names used by a definition.
///
/// Guarantees:
/// - Same string always produces same Label
/// - Different strings always produce different Labels
/// - A Label can be resolved back to the original string
pub struct SymbolStore {
    rodeo: ThreadedRodeo,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Intern a name, returning its label.
    pub fn intern(&self, name: &str) -> Label {
        self.rodeo.get_or_intern(name)
    }

    /// Resolve a label back to its name.
    /// Returns None if the label was not created by this store.
    pub fn resolve(&self, label: Label) -> Option<&str> {
        self.rodeo.try_resolve(&label)
    }

    /// Resolve a label, falling back to a placeholder for foreign labels.
    pub fn name(&self, label: Label) -> &str {
        self.resolve(label).unwrap_or("<?>")
    }

    /// Get the label of an already interned name, without interning.
    pub fn get(&self, name: &str) -> Option<Label> {
        self.rodeo.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rodeo.contains(name)
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let symbols = SymbolStore::new();
        let a = symbols.intern("k");
        let b = symbols.intern("k");
        assert_eq!(a, b, "same name should intern to same label");
        assert_eq!(symbols.len(), 1);
    }

    #[test]
    fn distinct_names_get_distinct_labels() {
        let symbols = SymbolStore::new();
        assert_ne!(symbols.intern("k"), symbols.intern("state"));
    }

    #[test]
    fn resolve_round_trips() {
        let symbols = SymbolStore::new();
        let k = symbols.intern("k");
        assert_eq!(symbols.resolve(k), Some("k"));
        assert_eq!(symbols.name(k), "k");
    }

    #[test]
    fn get_does_not_intern() {
        let symbols = SymbolStore::new();
        assert_eq!(symbols.get("missing"), None);
        assert!(!symbols.contains("missing"));
        assert!(symbols.is_empty());
    }
}
