//! Core domain types for the audit review desk.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod markup;
mod node_text;
mod seed;

pub use seed::{BUILTIN_IDS, builtin_documents, is_builtin_id};

/// Id prefix that marks a document created at runtime.
pub const CUSTOM_ID_PREFIX: &str = "custom-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_custom(&self) -> bool {
        self.0.starts_with(CUSTOM_ID_PREFIX)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionTopic {
    Forces,
    Faiblesses,
    Propositions,
}

impl SectionTopic {
    pub const ALL: [SectionTopic; 3] = [
        SectionTopic::Forces,
        SectionTopic::Faiblesses,
        SectionTopic::Propositions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionTopic::Forces => "forces",
            SectionTopic::Faiblesses => "faiblesses",
            SectionTopic::Propositions => "propositions",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SectionTopic::Forces => 0,
            SectionTopic::Faiblesses => 1,
            SectionTopic::Propositions => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for SectionTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SectionTopic {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "forces" => Ok(SectionTopic::Forces),
            "faiblesses" => Ok(SectionTopic::Faiblesses),
            "propositions" => Ok(SectionTopic::Propositions),
            _ => Err("unknown section topic"),
        }
    }
}

/// One (document, section) slot. Responses, loading flags and audio all use it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey {
    pub document: DocumentId,
    pub topic: SectionTopic,
}

impl SectionKey {
    pub fn new(document: DocumentId, topic: SectionTopic) -> Self {
        Self { document, topic }
    }

    /// Composite string used to key notes: `<documentId>-<topic>`.
    pub fn note_key(&self) -> String {
        note_key(&self.document, self.topic)
    }
}

pub fn note_key(document: &DocumentId, topic: SectionTopic) -> String {
    format!("{}-{}", document.as_str(), topic.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    #[serde(alias = "content", deserialize_with = "node_text::deserialize")]
    pub display_content: String,
    #[serde(default)]
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub forces: Section,
    pub faiblesses: Section,
    pub propositions: Section,
}

impl Sections {
    pub fn get(&self, topic: SectionTopic) -> &Section {
        match topic {
            SectionTopic::Forces => &self.forces,
            SectionTopic::Faiblesses => &self.faiblesses,
            SectionTopic::Propositions => &self.propositions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPrompt {
    pub topic: SectionTopic,
    pub label: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    pub sections: Sections,
    #[serde(
        alias = "originalRef",
        default,
        deserialize_with = "node_text::deserialize"
    )]
    pub full_reference: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<PresetPrompt>,
}

impl Document {
    pub fn section(&self, topic: SectionTopic) -> &Section {
        self.sections.get(topic)
    }

    pub fn preset(&self, topic: SectionTopic) -> Option<&PresetPrompt> {
        self.presets.iter().find(|p| p.topic == topic)
    }
}

pub type AiResponses = BTreeMap<DocumentId, BTreeMap<SectionTopic, String>>;
pub type Notes = BTreeMap<String, String>;

/// Serializable subset of the review state.
///
/// Every top-level key is optional: older files may carry only some of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<BTreeMap<DocumentId, Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_responses: Option<AiResponses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.as_ref().is_none_or(|d| d.is_empty())
            && self
                .ai_responses
                .as_ref()
                .is_none_or(|r| r.values().all(|t| t.is_empty()))
            && self.notes.as_ref().is_none_or(|n| n.is_empty())
    }
}

/// Decoded mono waveform ready for playback.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("sample_rate", &self.sample_rate)
            .field("samples", &self.samples.len())
            .finish()
    }
}

pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Zephyr";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub text_model: String,
    pub fallback_model: String,
    pub speech_model: String,
    pub voice: String,
    pub export_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err("unknown theme"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            export_dir: None,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        fn or_default(value: &mut String, default: &str) {
            let trimmed = value.trim();
            *value = if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            };
        }
        or_default(&mut self.text_model, DEFAULT_TEXT_MODEL);
        or_default(&mut self.fallback_model, DEFAULT_FALLBACK_MODEL);
        or_default(&mut self.speech_model, DEFAULT_SPEECH_MODEL);
        or_default(&mut self.voice, DEFAULT_VOICE);
        self.export_dir = self
            .export_dir
            .take()
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());
    }

    pub fn cycle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_parses_strings() {
        assert_eq!("forces".parse::<SectionTopic>().unwrap(), SectionTopic::Forces);
        assert_eq!(
            " Faiblesses ".parse::<SectionTopic>().unwrap(),
            SectionTopic::Faiblesses
        );
        assert!("risks".parse::<SectionTopic>().is_err());
    }

    #[test]
    fn topic_cycles_both_ways() {
        assert_eq!(SectionTopic::Propositions.next(), SectionTopic::Forces);
        assert_eq!(SectionTopic::Forces.prev(), SectionTopic::Propositions);
    }

    #[test]
    fn note_key_joins_document_and_topic() {
        let key = SectionKey::new(DocumentId::new("sphinx"), SectionTopic::Faiblesses);
        assert_eq!(key.note_key(), "sphinx-faiblesses");
    }

    #[test]
    fn custom_ids_are_recognised() {
        assert!(DocumentId::new("custom-1700000000000").is_custom());
        assert!(!DocumentId::new("sphinx").is_custom());
    }

    #[test]
    fn snapshot_uses_stable_json_keys() {
        let mut responses = AiResponses::new();
        responses
            .entry(DocumentId::new("sphinx"))
            .or_default()
            .insert(SectionTopic::Forces, "ok".to_string());
        let snapshot = Snapshot {
            documents: Some(BTreeMap::new()),
            ai_responses: Some(responses),
            notes: Some(Notes::from([("sphinx-forces".to_string(), "n".to_string())])),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"documents":{},"aiResponses":{"sphinx":{"forces":"ok"}},"notes":{"sphinx-forces":"n"}}"#
        );
    }

    #[test]
    fn partial_snapshot_parses() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"notes":{"sphinx-forces":"ok"}}"#).unwrap();
        assert!(snapshot.documents.is_none());
        assert!(snapshot.ai_responses.is_none());
        assert_eq!(
            snapshot.notes.unwrap().get("sphinx-forces").map(String::as_str),
            Some("ok")
        );
    }

    #[test]
    fn legacy_document_shape_parses() {
        let json = r#"{"id":"custom-1","title":"Clinique","subtitle":"Soumis",
            "sections":{
                "forces":{"title":"Forces","content":{"type":"p","props":{"children":"Audit requis."}},"rawText":"Corps"},
                "faiblesses":{"title":"Risques","content":"Audit requis.","rawText":"Corps"},
                "propositions":{"title":"Stratégie","content":"Audit requis."}},
            "originalRef":{"type":"div","props":{"children":"Corps"}}}"#;
        let document: Document = serde_json::from_str(json).unwrap();
        assert_eq!(document.section(SectionTopic::Forces).display_content, "Audit requis.");
        assert_eq!(document.section(SectionTopic::Propositions).raw_text, "");
        assert_eq!(document.full_reference, "Corps");
        assert!(document.presets.is_empty());
    }

    #[test]
    fn empty_snapshot_reports_empty() {
        assert!(Snapshot::default().is_empty());
        let snapshot = Snapshot {
            notes: Some(Notes::from([("a-forces".to_string(), "x".to_string())])),
            ..Snapshot::default()
        };
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn settings_normalize_restores_defaults() {
        let mut settings = Settings {
            text_model: "  ".to_string(),
            voice: " Puck ".to_string(),
            export_dir: Some(" ".to_string()),
            ..Settings::default()
        };
        settings.normalize();
        assert_eq!(settings.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(settings.voice, "Puck");
        assert_eq!(settings.export_dir, None);
    }

    #[test]
    fn audio_buffer_reports_duration() {
        let buffer = AudioBuffer::new(24_000, vec![0.0; 12_000]);
        assert_eq!(buffer.duration_secs(), 0.5);
        assert!(!buffer.is_empty());
    }
}
