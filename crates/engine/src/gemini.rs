//! Gemini `generateContent` client for analysis text and speech.

use std::time::Duration;

use audit_application::{AnalysisRequest, CollaboratorError, SpeechCollaborator, TextCollaborator};
use audit_core::{AudioBuffer, DocumentId, SectionTopic, markup};
use serde::{Deserialize, Serialize};

use crate::pcm;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const SPEECH_INPUT_LIMIT: usize = 1000;
const ERROR_BODY_LIMIT: usize = 300;

const SYSTEM_INSTRUCTION: &str = "\
Tu es un Auditeur Expert International et Consultant Senior au Cameroun.
EXPERTISE : Stratégie d'entreprise (OHADA, marché local) et Projets de Santé Publique (MINSANTE, PNDS, POCUS).
MISSION : Analyser, critiquer de manière constructive et apporter des solutions concrètes pour optimiser les projets soumis.
RÈGLES DE FORMATAGE :
1. JAMAIS d'astérisques, de dièses ou de tirets en début de ligne.
2. Utilise UNIQUEMENT <strong></strong> pour mettre en avant des termes clés.
3. Double saut de ligne entre les paragraphes.
4. Ton : Professionnel, direct, expert.";

const CUSTOM_DOCUMENT_CONTEXT: &str =
    "Il s'agit d'un document personnalisé soumis par l'utilisateur pour audit.";

fn document_context(id: &DocumentId) -> &'static str {
    match id.as_str() {
        "sphinx" => {
            "Le projet concerne un cabinet de conseil stratégique au Cameroun (SPHINX Consulting)."
        }
        "echo-pediatrie" => {
            "Le projet concerne l'intégration de l'échographie clinique aux urgences pédiatriques à Douala (Écho-Pédiatrie)."
        }
        _ => CUSTOM_DOCUMENT_CONTEXT,
    }
}

fn topic_context(topic: SectionTopic) -> &'static str {
    match topic {
        SectionTopic::Forces => {
            "Analyse et valide les points forts du projet. Souligne la pertinence par rapport au contexte camerounais et aux standards internationaux."
        }
        SectionTopic::Faiblesses => {
            "Identifie les risques critiques, les lacunes de planification et les menaces à la pérennité. Propose des solutions de mitigation."
        }
        SectionTopic::Propositions => {
            "Suggère des optimisations stratégiques, budgétaires ou opérationnelles pour maximiser l'impact social et l'efficience."
        }
    }
}

pub fn build_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!(
        "{}\n\nVoici le texte de la section {} : \"{}\".\n{}",
        document_context(&request.document),
        request.topic,
        request.base_text,
        topic_context(request.topic)
    );
    if let Some(question) = request.question.as_deref() {
        prompt.push_str(&format!(
            "\n\nQUESTION SPÉCIFIQUE DE L'UTILISATEUR : \"{question}\""
        ));
    }
    prompt
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub fallback_model: String,
    pub speech_model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn from_settings(settings: &audit_core::Settings, api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: settings.text_model.clone(),
            fallback_model: settings.fallback_model.clone(),
            speech_model: settings.speech_model.clone(),
            voice: settings.voice.clone(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![TextPart { text }],
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }

    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn inline_audio(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }
}

/// Runs `call` on the primary model, then once on the fallback model.
fn with_fallback<F>(primary: &str, fallback: &str, mut call: F) -> Result<String, CollaboratorError>
where
    F: FnMut(&str) -> Result<String, CollaboratorError>,
{
    match call(primary) {
        Ok(text) => Ok(text),
        Err(CollaboratorError::MissingCredentials) => Err(CollaboratorError::MissingCredentials),
        Err(err) => {
            tracing::warn!(
                model = primary,
                error = %err,
                fallback,
                "primary model failed, retrying on fallback"
            );
            call(fallback)
        }
    }
}

#[derive(Debug)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, CollaboratorError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Upstream(format!("build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn generate(
        &self,
        model: &str,
        body: &GenerateRequest<'_>,
    ) -> Result<GenerateResponse, CollaboratorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CollaboratorError::MissingCredentials)?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Upstream(format!("{model}: request timed out"))
                } else if e.is_connect() {
                    CollaboratorError::Upstream(format!("{model}: unable to reach the API"))
                } else {
                    CollaboratorError::Upstream(format!("{model}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(CollaboratorError::Upstream(format!("{model}: {status} {body}")));
        }

        response
            .json::<GenerateResponse>()
            .map_err(|e| CollaboratorError::Malformed(format!("{model}: {e}")))
    }
}

impl TextCollaborator for GeminiClient {
    fn analyze(&self, request: &AnalysisRequest) -> Result<String, CollaboratorError> {
        if !self.has_credentials() {
            return Err(CollaboratorError::MissingCredentials);
        }
        let prompt = build_prompt(request);
        let body = GenerateRequest {
            contents: vec![Content::text(&prompt)],
            system_instruction: Some(Content::text(SYSTEM_INSTRUCTION)),
            generation_config: GenerationConfig {
                temperature: Some(0.7),
                top_p: Some(0.95),
                ..GenerationConfig::default()
            },
        };

        let text = with_fallback(
            &self.config.text_model,
            &self.config.fallback_model,
            |model| self.generate(model, &body).map(|r| r.text()),
        )?;
        Ok(markup::clean_response(&text))
    }
}

impl SpeechCollaborator for GeminiClient {
    fn synthesize(&self, plain_text: &str) -> Option<AudioBuffer> {
        if !self.has_credentials() || plain_text.trim().is_empty() {
            return None;
        }
        let excerpt: String = plain_text.chars().take(SPEECH_INPUT_LIMIT).collect();
        let input =
            format!("Lis ce rapport d'audit avec une voix professionnelle et assurée : {excerpt}");
        let body = GenerateRequest {
            contents: vec![Content::text(&input)],
            system_instruction: None,
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: &self.config.voice,
                        },
                    },
                }),
                ..GenerationConfig::default()
            },
        };

        let response = match self.generate(&self.config.speech_model, &body) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "speech synthesis failed");
                return None;
            }
        };
        let Some(inline) = response.inline_audio() else {
            tracing::warn!("speech response carried no audio");
            return None;
        };
        let rate = pcm::sample_rate_from_mime(&inline.mime_type).unwrap_or(pcm::SPEECH_SAMPLE_RATE);
        match pcm::decode_base64_pcm16(&inline.data, rate) {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                tracing::warn!(error = %err, "speech audio could not be decoded");
                None
            }
        }
    }
}
