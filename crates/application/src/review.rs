//! AI interaction state per (document, section) slot.
//!
//! A slot is `Idle`, `Loading` or `Answered`. At most one request is in flight per slot;
//! different slots run independently. Every accepted request carries a [`Ticket`] whose
//! generation ties the later speech result to the text it was synthesized from.

use std::collections::{HashMap, HashSet};

use audit_core::markup;
use audit_core::{AiResponses, AudioBuffer, Document, DocumentId, SectionKey, SectionTopic};

use crate::ReviewError;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Erreur : Clé API manquante.")]
    MissingCredentials,
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub document: DocumentId,
    pub topic: SectionTopic,
    pub base_text: String,
    pub question: Option<String>,
}

/// Generative text service.
pub trait TextCollaborator: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, CollaboratorError>;
}

/// Speech service. `None` means no audio is available, never a failure.
pub trait SpeechCollaborator: Send + Sync {
    fn synthesize(&self, plain_text: &str) -> Option<AudioBuffer>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub key: SectionKey,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisJob {
    pub ticket: Ticket,
    pub request: AnalysisRequest,
}

impl AnalysisJob {
    pub fn run(&self, text: &dyn TextCollaborator) -> Result<String, CollaboratorError> {
        text.analyze(&self.request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechJob {
    pub ticket: Ticket,
    pub text: String,
}

impl SpeechJob {
    pub fn run(&self, speech: &dyn SpeechCollaborator) -> Option<AudioBuffer> {
        speech.synthesize(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionPhase {
    Idle,
    Loading,
    Answered,
}

#[derive(Debug, Default)]
pub struct ReviewEngine {
    responses: AiResponses,
    loading: HashSet<SectionKey>,
    audio: HashMap<SectionKey, AudioBuffer>,
    answered_generation: HashMap<SectionKey, u64>,
    next_generation: u64,
}

impl ReviewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: AiResponses) -> Self {
        let mut engine = Self::default();
        engine.replace_responses(responses);
        engine
    }

    pub fn phase(&self, key: &SectionKey) -> SectionPhase {
        if self.loading.contains(key) {
            SectionPhase::Loading
        } else if self.response(key).is_some() {
            SectionPhase::Answered
        } else {
            SectionPhase::Idle
        }
    }

    pub fn is_loading(&self, key: &SectionKey) -> bool {
        self.loading.contains(key)
    }

    pub fn loading_count(&self) -> usize {
        self.loading.len()
    }

    pub fn response(&self, key: &SectionKey) -> Option<&str> {
        self.responses
            .get(&key.document)
            .and_then(|by_topic| by_topic.get(&key.topic))
            .map(String::as_str)
    }

    pub fn audio(&self, key: &SectionKey) -> Option<&AudioBuffer> {
        self.audio.get(key)
    }

    pub fn responses(&self) -> &AiResponses {
        &self.responses
    }

    /// Starts an analysis for `topic` of `document`, optionally steered by `prompt`.
    pub fn request_analysis(
        &mut self,
        document: &Document,
        topic: SectionTopic,
        prompt: Option<&str>,
    ) -> Result<AnalysisJob, ReviewError> {
        let question = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        self.begin(document, topic, question)
    }

    /// Same slot, same collaborator, with the user's question appended to the context.
    pub fn ask_follow_up(
        &mut self,
        document: &Document,
        topic: SectionTopic,
        question: &str,
    ) -> Result<AnalysisJob, ReviewError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ReviewError::EmptyQuestion);
        }
        self.begin(document, topic, Some(question.to_string()))
    }

    fn begin(
        &mut self,
        document: &Document,
        topic: SectionTopic,
        question: Option<String>,
    ) -> Result<AnalysisJob, ReviewError> {
        let key = SectionKey::new(document.id.clone(), topic);
        if self.loading.contains(&key) {
            tracing::debug!(doc = %key.document, %topic, "request rejected, slot is loading");
            return Err(ReviewError::InFlight(key.note_key()));
        }

        self.next_generation += 1;
        let ticket = Ticket {
            key: key.clone(),
            generation: self.next_generation,
        };
        self.loading.insert(key);
        tracing::debug!(
            doc = %document.id,
            %topic,
            generation = ticket.generation,
            "analysis dispatched"
        );

        Ok(AnalysisJob {
            ticket,
            request: AnalysisRequest {
                document: document.id.clone(),
                topic,
                base_text: document.section(topic).raw_text.clone(),
                question,
            },
        })
    }

    /// Applies a finished text request.
    ///
    /// On success the slot is overwritten and the speech job for the new text is returned.
    /// On failure nothing is stored; an earlier answer, if any, stays in place.
    pub fn complete_analysis(
        &mut self,
        ticket: &Ticket,
        result: Result<String, CollaboratorError>,
    ) -> Result<SpeechJob, ReviewError> {
        self.loading.remove(&ticket.key);
        let text = match result {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    doc = %ticket.key.document,
                    topic = %ticket.key.topic,
                    error = %err,
                    "analysis failed"
                );
                return Err(ReviewError::Analysis(err));
            }
        };

        let speech_text = markup::plain_text(&text);
        self.responses
            .entry(ticket.key.document.clone())
            .or_default()
            .insert(ticket.key.topic, text);
        self.audio.remove(&ticket.key);
        self.answered_generation
            .insert(ticket.key.clone(), ticket.generation);
        tracing::debug!(doc = %ticket.key.document, topic = %ticket.key.topic, "analysis stored");

        Ok(SpeechJob {
            ticket: ticket.clone(),
            text: speech_text,
        })
    }

    /// Stores speech for the text it was made from. Returns the buffer to play, if any.
    pub fn complete_speech(
        &mut self,
        ticket: &Ticket,
        audio: Option<AudioBuffer>,
    ) -> Option<AudioBuffer> {
        if self.answered_generation.get(&ticket.key) != Some(&ticket.generation) {
            tracing::debug!(topic = %ticket.key.topic, "dropping speech for a superseded answer");
            return None;
        }
        let Some(audio) = audio.filter(|a| !a.is_empty()) else {
            tracing::warn!(topic = %ticket.key.topic, "no speech available, text only");
            return None;
        };
        self.audio.insert(ticket.key.clone(), audio.clone());
        Some(audio)
    }

    /// Drops the response and audio of a slot. A request still in flight keeps its guard.
    pub fn close(&mut self, key: &SectionKey) -> bool {
        let mut removed = false;
        if let Some(by_topic) = self.responses.get_mut(&key.document) {
            removed = by_topic.remove(&key.topic).is_some();
            if by_topic.is_empty() {
                self.responses.remove(&key.document);
            }
        }
        self.audio.remove(key);
        self.answered_generation.remove(key);
        removed
    }

    pub fn clear_audio(&mut self) {
        self.audio.clear();
    }

    pub fn replace_responses(&mut self, responses: AiResponses) {
        self.responses = responses;
        self.responses.retain(|_, by_topic| !by_topic.is_empty());
        self.audio.clear();
        self.answered_generation.clear();
    }

    /// Shallow merge: an imported document's topic map replaces the local one.
    pub fn merge_responses(&mut self, responses: AiResponses) -> usize {
        let mut count = 0;
        for (document, by_topic) in responses {
            count += by_topic.len();
            self.audio.retain(|key, _| key.document != document);
            self.answered_generation
                .retain(|key, _| key.document != document);
            if by_topic.is_empty() {
                self.responses.remove(&document);
            } else {
                self.responses.insert(document, by_topic);
            }
        }
        count
    }
}
