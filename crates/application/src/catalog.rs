use std::collections::BTreeMap;

use audit_core::{
    CUSTOM_ID_PREFIX, Document, DocumentId, Section, Sections, builtin_documents, is_builtin_id,
};

use crate::ReviewError;

const DEFAULT_SUBTITLE: &str = "Soumis par l'utilisateur";
const PLACEHOLDER_CONTENT: &str = "Audit requis.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDraft {
    pub title: String,
    pub subtitle: String,
    pub full_text: String,
}

/// Built-in documents followed by user documents, in insertion order.
#[derive(Debug, Clone)]
pub struct Catalog {
    documents: Vec<Document>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Catalog {
    pub fn with_builtins() -> Self {
        Self {
            documents: builtin_documents(),
        }
    }

    pub fn list(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| &d.id == id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.get(id).is_some()
    }

    pub fn create(
        &mut self,
        draft: DocumentDraft,
        now_millis: i64,
    ) -> Result<Document, ReviewError> {
        if draft.title.trim().is_empty() {
            return Err(ReviewError::MissingTitle);
        }
        if draft.full_text.trim().is_empty() {
            return Err(ReviewError::MissingText);
        }

        let mut stamp = now_millis.max(0);
        let id = loop {
            let candidate = DocumentId(format!("{CUSTOM_ID_PREFIX}{stamp}"));
            if !self.contains(&candidate) {
                break candidate;
            }
            stamp += 1;
        };

        let subtitle = match draft.subtitle.trim() {
            "" => DEFAULT_SUBTITLE.to_string(),
            value => value.to_string(),
        };
        let placeholder = |title: &str| Section {
            title: title.to_string(),
            display_content: PLACEHOLDER_CONTENT.to_string(),
            raw_text: draft.full_text.clone(),
        };
        let document = Document {
            id,
            title: draft.title.trim().to_string(),
            subtitle,
            sections: Sections {
                forces: placeholder("Forces"),
                faiblesses: placeholder("Risques"),
                propositions: placeholder("Stratégie"),
            },
            full_reference: draft.full_text.clone(),
            presets: Vec::new(),
        };
        self.documents.push(document.clone());
        Ok(document)
    }

    /// Adds or replaces user documents. Built-in ids are never overwritten.
    ///
    /// Returns how many documents were taken.
    pub fn merge_custom(&mut self, documents: BTreeMap<DocumentId, Document>) -> usize {
        let mut taken = 0;
        for (id, mut document) in documents {
            if is_builtin_id(&id) {
                tracing::debug!(%id, "skipping built-in document from snapshot");
                continue;
            }
            document.id = id;
            match self.documents.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                None => self.documents.push(document),
            }
            taken += 1;
        }
        taken
    }

    pub fn custom_documents(&self) -> BTreeMap<DocumentId, Document> {
        self.documents
            .iter()
            .filter(|d| !is_builtin_id(&d.id))
            .map(|d| (d.id.clone(), d.clone()))
            .collect()
    }

    pub fn all_documents(&self) -> BTreeMap<DocumentId, Document> {
        self.documents
            .iter()
            .map(|d| (d.id.clone(), d.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::SectionTopic;

    fn draft(title: &str, text: &str) -> DocumentDraft {
        DocumentDraft {
            title: title.to_string(),
            subtitle: String::new(),
            full_text: text.to_string(),
        }
    }

    #[test]
    fn lists_builtins_first() {
        let catalog = Catalog::with_builtins();
        let ids: Vec<&str> = catalog.list().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["sphinx", "echo-pediatrie"]);
    }

    #[test]
    fn create_seeds_every_section_with_full_text() -> anyhow::Result<()> {
        let mut catalog = Catalog::with_builtins();
        let doc = catalog.create(draft("Projet", "Texte complet"), 1_700_000_000_000)?;
        assert_eq!(doc.id.as_str(), "custom-1700000000000");
        assert_eq!(doc.subtitle, DEFAULT_SUBTITLE);
        for topic in SectionTopic::ALL {
            assert_eq!(doc.section(topic).raw_text, "Texte complet");
            assert_eq!(doc.section(topic).display_content, PLACEHOLDER_CONTENT);
        }
        assert_eq!(catalog.list().last(), Some(&doc));
        Ok(())
    }

    #[test]
    fn create_never_reuses_an_id() -> anyhow::Result<()> {
        let mut catalog = Catalog::with_builtins();
        let a = catalog.create(draft("A", "x"), 42)?;
        let b = catalog.create(draft("B", "y"), 42)?;
        assert_ne!(a.id, b.id);
        assert_eq!(catalog.len(), 4);
        Ok(())
    }

    #[test]
    fn create_rejects_blank_fields() {
        let mut catalog = Catalog::with_builtins();
        assert!(matches!(
            catalog.create(draft("  ", "x"), 1),
            Err(ReviewError::MissingTitle)
        ));
        assert!(matches!(
            catalog.create(draft("T", "\n"), 1),
            Err(ReviewError::MissingText)
        ));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merge_skips_builtins_and_replaces_custom() -> anyhow::Result<()> {
        let mut catalog = Catalog::with_builtins();
        let mut doc = catalog.create(draft("A", "x"), 7)?;
        doc.title = "A2".to_string();

        let mut hijack = catalog.list()[0].clone();
        hijack.title = "hijacked".to_string();

        let incoming = BTreeMap::from([(doc.id.clone(), doc.clone()), (hijack.id.clone(), hijack)]);
        assert_eq!(catalog.merge_custom(incoming), 1);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(&doc.id).map(|d| d.title.as_str()), Some("A2"));
        assert_eq!(catalog.list()[0].title, "Audit Stratégique Sphinx");
        Ok(())
    }

    #[test]
    fn custom_documents_exclude_builtins() -> anyhow::Result<()> {
        let mut catalog = Catalog::with_builtins();
        let doc = catalog.create(draft("A", "x"), 7)?;
        let custom = catalog.custom_documents();
        assert_eq!(custom.keys().collect::<Vec<_>>(), vec![&doc.id]);
        assert_eq!(catalog.all_documents().len(), 3);
        Ok(())
    }
}
