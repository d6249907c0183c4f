use audit_core::{Notes, SectionKey};

/// Free-text notes keyed by `<documentId>-<topic>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    notes: Notes,
}

impl Annotations {
    pub fn get(&self, key: &SectionKey) -> &str {
        self.notes
            .get(&key.note_key())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Returns whether the stored value changed.
    pub fn set(&mut self, key: &SectionKey, text: impl Into<String>) -> bool {
        let text = text.into();
        let composite = key.note_key();
        if self.notes.get(&composite) == Some(&text) {
            return false;
        }
        self.notes.insert(composite, text);
        true
    }

    pub fn replace(&mut self, notes: Notes) {
        self.notes = notes;
    }

    /// Imported keys win; keys only present locally are kept.
    pub fn merge(&mut self, notes: Notes) -> usize {
        let count = notes.len();
        self.notes.extend(notes);
        count
    }

    pub fn as_map(&self) -> &Notes {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
