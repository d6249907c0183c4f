//! Background execution of collaborator calls.
//!
//! Each job runs on its own thread and reports back through a channel the UI drains on
//! every tick, so slow upstream calls never block input handling.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use audit_application::{
    AnalysisJob, CollaboratorError, SpeechCollaborator, SpeechJob, TextCollaborator, Ticket,
};
use audit_core::AudioBuffer;

#[derive(Debug)]
pub enum Completion {
    Analysis {
        ticket: Ticket,
        result: Result<String, CollaboratorError>,
    },
    Speech {
        ticket: Ticket,
        audio: Option<AudioBuffer>,
    },
}

pub struct Dispatcher {
    text: Arc<dyn TextCollaborator>,
    speech: Arc<dyn SpeechCollaborator>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Dispatcher {
    pub fn new(text: Arc<dyn TextCollaborator>, speech: Arc<dyn SpeechCollaborator>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            text,
            speech,
            tx,
            rx,
        }
    }

    pub fn submit_analysis(&self, job: AnalysisJob) {
        let ticket = job.ticket.clone();
        let tx = self.tx.clone();
        let text = Arc::clone(&self.text);
        let spawned = thread::Builder::new()
            .name("audit-analysis".to_string())
            .spawn(move || {
                let result = job.run(text.as_ref());
                let _ = tx.send(Completion::Analysis {
                    ticket: job.ticket,
                    result,
                });
            });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn analysis worker");
            let _ = self.tx.send(Completion::Analysis {
                ticket,
                result: Err(CollaboratorError::Upstream(format!("worker: {err}"))),
            });
        }
    }

    pub fn submit_speech(&self, job: SpeechJob) {
        let ticket = job.ticket.clone();
        let tx = self.tx.clone();
        let speech = Arc::clone(&self.speech);
        let spawned = thread::Builder::new()
            .name("audit-speech".to_string())
            .spawn(move || {
                let audio = job.run(speech.as_ref());
                let _ = tx.send(Completion::Speech {
                    ticket: job.ticket,
                    audio,
                });
            });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "failed to spawn speech worker");
            let _ = self.tx.send(Completion::Speech { ticket, audio: None });
        }
    }

    /// Everything finished since the last call, in arrival order.
    pub fn drain(&self) -> Vec<Completion> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(completion) => out.push(completion),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Blocks until the next completion. Used where there is no UI tick to wait on.
    pub fn wait(&self) -> Option<Completion> {
        self.rx.recv().ok()
    }
}

/// Speech collaborator used when audio is disabled.
#[derive(Debug, Default)]
pub struct MutedSpeech;

impl SpeechCollaborator for MutedSpeech {
    fn synthesize(&self, _plain_text: &str) -> Option<AudioBuffer> {
        None
    }
}
