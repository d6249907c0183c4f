//! Test helpers and fixtures.

use audit_core::{Document, DocumentId, Section, Sections, Settings, Theme};
use audit_storage::{MemoryStore, SnapshotGateway};

pub fn make_settings(theme: Theme) -> Settings {
    Settings {
        theme,
        export_dir: None,
        ..Settings::default()
    }
}

/// A user document as it would appear in a persisted or imported file.
pub fn sample_custom_document(stamp: i64) -> Document {
    let text = format!("Projet pilote numéro {stamp} : budget, équipe et calendrier.");
    let section = |title: &str| Section {
        title: title.to_string(),
        display_content: "Audit requis.".to_string(),
        raw_text: text.clone(),
    };
    Document {
        id: DocumentId::new(format!("custom-{stamp}")),
        title: format!("Projet {stamp}"),
        subtitle: "Soumis par l'utilisateur".to_string(),
        sections: Sections {
            forces: section("Forces"),
            faiblesses: section("Risques"),
            propositions: section("Stratégie"),
        },
        full_reference: text.clone(),
        presets: Vec::new(),
    }
}

pub fn memory_gateway() -> SnapshotGateway<MemoryStore> {
    SnapshotGateway::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use audit_application::{
        AnalysisRequest, CollaboratorError, ReviewSession, SectionPhase, SpeechCollaborator,
        TextCollaborator,
    };
    use audit_core::{AiResponses, AudioBuffer, Notes, SectionKey, SectionTopic, Snapshot};
    use audit_storage::{KeyValueStore, SLOT_KEY, Storage, export_to_file, import_from_file};

    use super::*;

    struct CannedText(&'static str);

    impl TextCollaborator for CannedText {
        fn analyze(&self, _request: &AnalysisRequest) -> Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    struct Beep;

    impl SpeechCollaborator for Beep {
        fn synthesize(&self, _plain_text: &str) -> Option<AudioBuffer> {
            Some(AudioBuffer::new(24_000, vec![0.2; 48]))
        }
    }

    fn reload<S: KeyValueStore>(gateway: &SnapshotGateway<S>) -> ReviewSession {
        match gateway.load() {
            Some(snapshot) => ReviewSession::from_snapshot(snapshot),
            None => ReviewSession::new(),
        }
    }

    fn sphinx() -> DocumentId {
        DocumentId::new("sphinx")
    }

    #[test]
    fn builds_settings() {
        let settings = make_settings(Theme::Light);
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.voice, audit_core::DEFAULT_VOICE);
    }

    #[test]
    fn note_survives_reload() -> anyhow::Result<()> {
        let gateway = memory_gateway();
        let mut session = reload(&gateway);
        assert!(session.select(&sphinx()));
        session.set_note(SectionTopic::Faiblesses, "Risque élevé")?;
        gateway.save(&session.snapshot())?;

        let mut reloaded = reload(&gateway);
        assert!(reloaded.select(&sphinx()));
        assert_eq!(reloaded.note(SectionTopic::Faiblesses), "Risque élevé");
        assert_eq!(reloaded.note(SectionTopic::Forces), "");
        Ok(())
    }

    #[test]
    fn empty_store_gives_empty_state() {
        let session = reload(&memory_gateway());
        assert_eq!(session.list_documents().len(), 2);
        assert!(session.review().responses().is_empty());
        assert!(session.notes().is_empty());
        assert!(session.selected_id().is_none());
    }

    #[test]
    fn import_merges_notes_with_existing_ones() -> anyhow::Result<()> {
        let mut session = ReviewSession::new();
        session.select(&sphinx());
        session.set_note(SectionTopic::Forces, "Équipe solide")?;
        session.set_note(SectionTopic::Faiblesses, "Ancienne note")?;

        let imported = Snapshot {
            documents: None,
            ai_responses: None,
            notes: Some(Notes::from([
                ("sphinx-faiblesses".to_string(), "Risque élevé".to_string()),
                ("echo-pediatrie-forces".to_string(), "Impact clinique".to_string()),
            ])),
        };
        let summary = session.merge_import(imported);
        assert_eq!(summary.notes, 2);

        assert_eq!(session.note(SectionTopic::Forces), "Équipe solide");
        assert_eq!(session.note(SectionTopic::Faiblesses), "Risque élevé");
        session.select(&DocumentId::new("echo-pediatrie"));
        assert_eq!(session.note(SectionTopic::Forces), "Impact clinique");
        Ok(())
    }

    #[test]
    fn load_then_save_is_byte_identical() -> anyhow::Result<()> {
        let gateway = SnapshotGateway::new(Storage::open_in_memory()?);
        let mut session = ReviewSession::from_snapshot(Snapshot {
            documents: Some(BTreeMap::from([(
                DocumentId::new("custom-7"),
                sample_custom_document(7),
            )])),
            ..Snapshot::default()
        });
        session.select(&sphinx());
        session.set_note(SectionTopic::Propositions, "Viser la CSU")?;
        gateway.save(&session.snapshot())?;
        let first = gateway.store().read(SLOT_KEY)?;

        let reloaded = reload(&gateway);
        gateway.save(&reloaded.snapshot())?;
        assert_eq!(gateway.store().read(SLOT_KEY)?, first);
        Ok(())
    }

    #[test]
    fn persisted_builtins_are_ignored_on_load() -> anyhow::Result<()> {
        let gateway = memory_gateway();
        let mut forged = sample_custom_document(1);
        forged.id = sphinx();
        forged.title = "Faux".to_string();
        gateway.save(&Snapshot {
            documents: Some(BTreeMap::from([
                (sphinx(), forged),
                (DocumentId::new("custom-1"), sample_custom_document(1)),
            ])),
            ..Snapshot::default()
        })?;

        let session = reload(&gateway);
        assert_ne!(session.document(&sphinx()).map(|d| d.title.as_str()), Some("Faux"));
        assert!(session.document(&DocumentId::new("custom-1")).is_some());
        assert_eq!(session.list_documents().len(), 3);
        Ok(())
    }

    #[test]
    fn analysis_round_trip_persists_text_not_audio() -> anyhow::Result<()> {
        let gateway = memory_gateway();
        let mut session = reload(&gateway);
        session.select(&sphinx());

        let job = session.request_analysis(SectionTopic::Forces, None)?;
        let key = SectionKey::new(sphinx(), SectionTopic::Forces);
        assert_eq!(session.review().phase(&key), SectionPhase::Loading);

        let text = job.run(&CannedText("<strong>Positionnement</strong> clair."));
        let speech = session.complete_analysis(&job.ticket, text)?;
        assert_eq!(speech.text, "Positionnement clair.");
        let audio = speech.run(&Beep);
        assert!(session.complete_speech(&speech.ticket, audio).is_some());
        assert!(session.review().audio(&key).is_some());

        gateway.save(&session.snapshot())?;
        let reloaded = reload(&gateway);
        assert_eq!(reloaded.review().phase(&key), SectionPhase::Answered);
        assert!(reloaded.review().audio(&key).is_none());
        Ok(())
    }

    #[test]
    fn leaving_a_document_drops_audio_but_keeps_text() -> anyhow::Result<()> {
        let mut session = ReviewSession::new();
        session.select(&sphinx());
        let job = session.request_analysis(SectionTopic::Propositions, None)?;
        let speech = session.complete_analysis(&job.ticket, job.run(&CannedText("Avis")))?;
        session.complete_speech(&speech.ticket, speech.run(&Beep));

        session.leave_document();
        let key = SectionKey::new(sphinx(), SectionTopic::Propositions);
        assert!(session.review().audio(&key).is_none());
        assert_eq!(session.review().response(&key), Some("Avis"));
        Ok(())
    }

    #[test]
    fn export_then_import_into_fresh_session() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut session = ReviewSession::new();
        session.create_document(audit_application::DocumentDraft {
            title: "Clinique mobile".to_string(),
            subtitle: String::new(),
            full_text: "Unité mobile de dépistage.".to_string(),
        })?;
        session.set_note(SectionTopic::Forces, "Couverture rurale")?;
        let date = chrono::NaiveDate::from_ymd_opt(2026, 10, 14).expect("valid date");
        let path = export_to_file(&session.export_snapshot(), dir.path(), date)?;

        let mut fresh = ReviewSession::new();
        let summary = fresh.merge_import(import_from_file(&path)?);
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.notes, 1);
        assert_eq!(fresh.list_documents().len(), 3);
        Ok(())
    }

    #[test]
    fn imported_responses_replace_per_document() -> anyhow::Result<()> {
        let mut session = ReviewSession::new();
        session.select(&sphinx());
        for topic in [SectionTopic::Forces, SectionTopic::Faiblesses] {
            let job = session.request_analysis(topic, None)?;
            session.complete_analysis(&job.ticket, Ok(format!("local {topic}")))?;
        }

        let mut imported = AiResponses::new();
        imported
            .entry(sphinx())
            .or_default()
            .insert(SectionTopic::Propositions, "importé".to_string());
        session.merge_import(Snapshot {
            ai_responses: Some(imported),
            ..Snapshot::default()
        });

        let responses = session.review().responses();
        let sphinx_map = responses.get(&sphinx()).map(|m| m.len());
        assert_eq!(sphinx_map, Some(1));
        assert_eq!(
            session
                .review()
                .response(&SectionKey::new(sphinx(), SectionTopic::Propositions)),
            Some("importé")
        );
        Ok(())
    }

    #[test]
    fn reset_leaves_an_empty_store() -> anyhow::Result<()> {
        let gateway = memory_gateway();
        let mut session = ReviewSession::new();
        session.select(&sphinx());
        session.set_note(SectionTopic::Forces, "À revoir")?;
        gateway.save(&session.snapshot())?;

        gateway.reset()?;
        let fresh = reload(&gateway);
        assert!(fresh.notes().is_empty());
        assert_eq!(fresh.list_documents().len(), 2);
        Ok(())
    }
}
