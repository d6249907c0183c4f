//! Application orchestration layer for the audit review desk.

use audit_core::{
    AudioBuffer, Document, DocumentId, SectionKey, SectionTopic, Snapshot, is_builtin_id,
};

mod catalog;
mod notes;
pub mod playback;
pub mod review;

pub use catalog::{Catalog, DocumentDraft};
pub use notes::Annotations;
pub use playback::{AudioSink, PlaybackController, PlaybackError, PlaybackSession, SilentSink};
pub use review::{
    AnalysisJob, AnalysisRequest, CollaboratorError, ReviewEngine, SectionPhase, SpeechCollaborator,
    SpeechJob, TextCollaborator, Ticket,
};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("a request is already running for {0}")]
    InFlight(String),
    #[error("question is empty")]
    EmptyQuestion,
    #[error("document title is required")]
    MissingTitle,
    #[error("document text is required")]
    MissingText,
    #[error("no document is open")]
    NoDocument,
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),
    #[error(transparent)]
    Analysis(#[from] CollaboratorError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub documents: usize,
    pub responses: usize,
    pub notes: usize,
}

/// Root controller. Owns every store; views borrow from it.
///
/// `revision` moves on each change to documents, responses or notes so the caller can
/// persist after each one.
#[derive(Debug, Default)]
pub struct ReviewSession {
    catalog: Catalog,
    notes: Annotations,
    review: ReviewEngine,
    selected: Option<DocumentId>,
    revision: u64,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state rehydrated from a persisted snapshot.
    ///
    /// Documents merge over the built-ins; responses and notes replace the empty defaults.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut session = Self::new();
        if let Some(documents) = snapshot.documents {
            session.catalog.merge_custom(documents);
        }
        if let Some(responses) = snapshot.ai_responses {
            session.review.replace_responses(responses);
        }
        if let Some(notes) = snapshot.notes {
            session.notes.replace(notes);
        }
        session
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn review(&self) -> &ReviewEngine {
        &self.review
    }

    pub fn notes(&self) -> &Annotations {
        &self.notes
    }

    pub fn list_documents(&self) -> &[Document] {
        self.catalog.list()
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.catalog.get(id)
    }

    pub fn selected_id(&self) -> Option<&DocumentId> {
        self.selected.as_ref()
    }

    pub fn selected_document(&self) -> Option<&Document> {
        self.selected.as_ref().and_then(|id| self.catalog.get(id))
    }

    pub fn select(&mut self, id: &DocumentId) -> bool {
        if self.catalog.contains(id) {
            self.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// Back to the library: audio buffers go, responses and notes stay.
    pub fn leave_document(&mut self) {
        self.selected = None;
        self.review.clear_audio();
    }

    pub fn create_document(&mut self, draft: DocumentDraft) -> Result<DocumentId, ReviewError> {
        let document = self.catalog.create(draft, unix_now_millis())?;
        tracing::info!(id = %document.id, "document created");
        self.selected = Some(document.id.clone());
        self.touch();
        Ok(document.id)
    }

    fn selected_key(&self, topic: SectionTopic) -> Result<SectionKey, ReviewError> {
        let id = self.selected.clone().ok_or(ReviewError::NoDocument)?;
        Ok(SectionKey::new(id, topic))
    }

    pub fn section_key(&self, topic: SectionTopic) -> Option<SectionKey> {
        self.selected_key(topic).ok()
    }

    pub fn request_analysis(
        &mut self,
        topic: SectionTopic,
        prompt: Option<&str>,
    ) -> Result<AnalysisJob, ReviewError> {
        let key = self.selected_key(topic)?;
        let document = self
            .catalog
            .get(&key.document)
            .ok_or_else(|| ReviewError::UnknownDocument(key.document.clone()))?;
        self.review.request_analysis(document, topic, prompt)
    }

    pub fn ask_follow_up(
        &mut self,
        topic: SectionTopic,
        question: &str,
    ) -> Result<AnalysisJob, ReviewError> {
        let key = self.selected_key(topic)?;
        let document = self
            .catalog
            .get(&key.document)
            .ok_or_else(|| ReviewError::UnknownDocument(key.document.clone()))?;
        self.review.ask_follow_up(document, topic, question)
    }

    pub fn complete_analysis(
        &mut self,
        ticket: &Ticket,
        result: Result<String, CollaboratorError>,
    ) -> Result<SpeechJob, ReviewError> {
        let job = self.review.complete_analysis(ticket, result)?;
        self.touch();
        Ok(job)
    }

    pub fn complete_speech(
        &mut self,
        ticket: &Ticket,
        audio: Option<AudioBuffer>,
    ) -> Option<AudioBuffer> {
        self.review.complete_speech(ticket, audio)
    }

    /// Closes the panel of `topic` on the open document. Notes are untouched.
    pub fn close(&mut self, topic: SectionTopic) {
        let Ok(key) = self.selected_key(topic) else {
            return;
        };
        if self.review.close(&key) {
            self.touch();
        }
    }

    pub fn note(&self, topic: SectionTopic) -> &str {
        match self.selected_key(topic) {
            Ok(key) => self.notes.get(&key),
            Err(_) => "",
        }
    }

    pub fn set_note(
        &mut self,
        topic: SectionTopic,
        text: impl Into<String>,
    ) -> Result<(), ReviewError> {
        let key = self.selected_key(topic)?;
        if self.notes.set(&key, text) {
            self.touch();
        }
        Ok(())
    }

    /// What the durable slot holds: user documents only.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            documents: Some(self.catalog.custom_documents()),
            ai_responses: Some(self.review.responses().clone()),
            notes: Some(self.notes.as_map().clone()),
        }
    }

    /// Backup content: built-in documents included.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            documents: Some(self.catalog.all_documents()),
            ..self.snapshot()
        }
    }

    /// Shallow merge of an already parsed file. Imported keys win.
    pub fn merge_import(&mut self, snapshot: Snapshot) -> ImportSummary {
        let mut summary = ImportSummary::default();
        if let Some(documents) = snapshot.documents {
            summary.documents = self.catalog.merge_custom(documents);
        }
        if let Some(responses) = snapshot.ai_responses {
            summary.responses = self.review.merge_responses(responses);
        }
        if let Some(notes) = snapshot.notes {
            summary.notes = self.notes.merge(notes);
        }
        if self
            .selected
            .as_ref()
            .is_some_and(|id| !self.catalog.contains(id))
        {
            self.selected = None;
        }
        tracing::info!(
            documents = summary.documents,
            responses = summary.responses,
            notes = summary.notes,
            "snapshot imported"
        );
        self.touch();
        summary
    }

    pub fn is_custom(&self, id: &DocumentId) -> bool {
        !is_builtin_id(id)
    }
}

fn unix_now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::Notes;

    fn open_sphinx() -> ReviewSession {
        let mut session = ReviewSession::new();
        assert!(session.select(&DocumentId::new("sphinx")));
        session
    }

    #[test]
    fn empty_snapshot_gives_empty_state() {
        let session = ReviewSession::from_snapshot(Snapshot::default());
        assert_eq!(session.list_documents().len(), 2);
        assert!(session.catalog().custom_documents().is_empty());
        assert!(session.notes().is_empty());
        assert!(session.review().responses().is_empty());
    }

    #[test]
    fn unknown_document_is_not_selected() {
        let mut session = ReviewSession::new();
        assert!(!session.select(&DocumentId::new("missing")));
        assert!(session.selected_document().is_none());
    }

    #[test]
    fn create_selects_the_new_document() -> anyhow::Result<()> {
        let mut session = ReviewSession::new();
        let before = session.revision();
        let id = session.create_document(DocumentDraft {
            title: "Projet".to_string(),
            subtitle: String::new(),
            full_text: "Texte".to_string(),
        })?;
        assert!(id.is_custom());
        assert_eq!(session.selected_id(), Some(&id));
        assert!(session.revision() > before);
        assert_eq!(session.snapshot().documents.map(|d| d.len()), Some(1));
        Ok(())
    }

    #[test]
    fn requests_need_an_open_document() {
        let mut session = ReviewSession::new();
        assert!(matches!(
            session.request_analysis(SectionTopic::Forces, None),
            Err(ReviewError::NoDocument)
        ));
    }

    #[test]
    fn notes_change_revision_only_on_edit() -> anyhow::Result<()> {
        let mut session = open_sphinx();
        session.set_note(SectionTopic::Faiblesses, "Risque élevé")?;
        let rev = session.revision();
        session.set_note(SectionTopic::Faiblesses, "Risque élevé")?;
        assert_eq!(session.revision(), rev);
        assert_eq!(session.note(SectionTopic::Faiblesses), "Risque élevé");
        assert_eq!(session.note(SectionTopic::Forces), "");
        Ok(())
    }

    #[test]
    fn close_keeps_the_note() -> anyhow::Result<()> {
        let mut session = open_sphinx();
        session.set_note(SectionTopic::Forces, "garder")?;
        let job = session.request_analysis(SectionTopic::Forces, None)?;
        session.complete_analysis(&job.ticket, Ok("avis".to_string()))?;
        session.close(SectionTopic::Forces);
        let key = session.section_key(SectionTopic::Forces).unwrap();
        assert_eq!(session.review().response(&key), None);
        assert_eq!(session.note(SectionTopic::Forces), "garder");
        Ok(())
    }

    #[test]
    fn leaving_drops_audio_but_keeps_responses() -> anyhow::Result<()> {
        let mut session = open_sphinx();
        let job = session.request_analysis(SectionTopic::Forces, None)?;
        let speech = session.complete_analysis(&job.ticket, Ok("avis".to_string()))?;
        session.complete_speech(&speech.ticket, Some(AudioBuffer::new(24_000, vec![0.1; 10])));
        let key = speech.ticket.key.clone();
        assert!(session.review().audio(&key).is_some());

        session.leave_document();
        assert!(session.review().audio(&key).is_none());
        assert_eq!(session.review().response(&key), Some("avis"));
        Ok(())
    }

    #[test]
    fn snapshot_excludes_builtins_but_export_keeps_them() {
        let session = ReviewSession::new();
        assert_eq!(session.snapshot().documents.map(|d| d.len()), Some(0));
        assert_eq!(session.export_snapshot().documents.map(|d| d.len()), Some(2));
    }

    #[test]
    fn import_merges_notes() -> anyhow::Result<()> {
        let mut session = open_sphinx();
        session.set_note(SectionTopic::Faiblesses, "x")?;
        let summary = session.merge_import(Snapshot {
            notes: Some(Notes::from([("sphinx-forces".to_string(), "ok".to_string())])),
            ..Snapshot::default()
        });
        assert_eq!(summary.notes, 1);
        assert_eq!(session.note(SectionTopic::Forces), "ok");
        assert_eq!(session.note(SectionTopic::Faiblesses), "x");
        Ok(())
    }

    #[test]
    fn snapshot_round_trips_through_from_snapshot() -> anyhow::Result<()> {
        let mut session = open_sphinx();
        session.set_note(SectionTopic::Forces, "n")?;
        let job = session.request_analysis(SectionTopic::Forces, None)?;
        session.complete_analysis(&job.ticket, Ok("r".to_string()))?;
        session.create_document(DocumentDraft {
            title: "T".to_string(),
            subtitle: "S".to_string(),
            full_text: "F".to_string(),
        })?;

        let snapshot = session.snapshot();
        let restored = ReviewSession::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        Ok(())
    }
}
