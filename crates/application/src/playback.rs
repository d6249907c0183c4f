//! Single global playback slot.
//!
//! Starting a buffer always releases the previous session first, so two voices never
//! overlap. Stop is best-effort: a session that already ended or never ran is fine.

use audit_core::AudioBuffer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback already stopped")]
    AlreadyStopped,
    #[error("playback is not running")]
    NotRunning,
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl PlaybackError {
    pub fn is_benign_stop(&self) -> bool {
        matches!(self, PlaybackError::AlreadyStopped | PlaybackError::NotRunning)
    }
}

/// A started playback. Dropping it must release the underlying output.
pub trait PlaybackSession {
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn is_finished(&self) -> bool;
}

/// Acquires an output for one buffer.
pub trait AudioSink {
    fn start(&mut self, buffer: &AudioBuffer) -> Result<Box<dyn PlaybackSession>, PlaybackError>;
}

/// Sink used when audio output is disabled.
#[derive(Debug, Default)]
pub struct SilentSink;

struct SilentSession {
    stopped: bool,
}

impl PlaybackSession for SilentSession {
    fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.stopped {
            return Err(PlaybackError::AlreadyStopped);
        }
        self.stopped = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        true
    }
}

impl AudioSink for SilentSink {
    fn start(&mut self, _buffer: &AudioBuffer) -> Result<Box<dyn PlaybackSession>, PlaybackError> {
        Ok(Box::new(SilentSession { stopped: false }))
    }
}

pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    active: Option<Box<dyn PlaybackSession>>,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self { sink, active: None }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentSink))
    }

    /// Returns `Ok(false)` when there is nothing to play.
    pub fn play(&mut self, buffer: Option<&AudioBuffer>) -> Result<bool, PlaybackError> {
        let Some(buffer) = buffer.filter(|b| !b.is_empty()) else {
            return Ok(false);
        };
        self.stop()?;
        let session = self.sink.start(buffer)?;
        tracing::debug!(secs = buffer.duration_secs(), "playback started");
        self.active = Some(session);
        Ok(true)
    }

    /// Replays the last buffer known for the open panel.
    pub fn replay(&mut self, last_known: Option<&AudioBuffer>) -> Result<bool, PlaybackError> {
        self.play(last_known)
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        let Some(mut session) = self.active.take() else {
            return Ok(());
        };
        match session.stop() {
            Ok(()) => Ok(()),
            Err(err) if err.is_benign_stop() => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.is_finished())
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "failed to release playback on teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Log {
        started: usize,
        stopped: usize,
        live: usize,
    }

    struct FakeSession {
        log: Rc<RefCell<Log>>,
        stop_result: Option<PlaybackError>,
        running: bool,
    }

    impl PlaybackSession for FakeSession {
        fn stop(&mut self) -> Result<(), PlaybackError> {
            if self.running {
                self.running = false;
                let mut log = self.log.borrow_mut();
                log.stopped += 1;
                log.live -= 1;
            }
            match self.stop_result.clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn is_finished(&self) -> bool {
            !self.running
        }
    }

    struct FakeSink {
        log: Rc<RefCell<Log>>,
        stop_result: Option<PlaybackError>,
    }

    impl AudioSink for FakeSink {
        fn start(
            &mut self,
            _buffer: &AudioBuffer,
        ) -> Result<Box<dyn PlaybackSession>, PlaybackError> {
            let mut log = self.log.borrow_mut();
            log.started += 1;
            log.live += 1;
            Ok(Box::new(FakeSession {
                log: Rc::clone(&self.log),
                stop_result: self.stop_result.clone(),
                running: true,
            }))
        }
    }

    fn controller(stop_result: Option<PlaybackError>) -> (PlaybackController, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let sink = FakeSink {
            log: Rc::clone(&log),
            stop_result,
        };
        (PlaybackController::new(Box::new(sink)), log)
    }

    fn buffer() -> AudioBuffer {
        AudioBuffer::new(24_000, vec![0.25; 240])
    }

    #[test]
    fn absent_buffer_is_a_no_op() -> anyhow::Result<()> {
        let (mut controller, log) = controller(None);
        assert!(!controller.play(None)?);
        assert!(!controller.play(Some(&AudioBuffer::new(24_000, Vec::new())))?);
        assert_eq!(log.borrow().started, 0);
        Ok(())
    }

    #[test]
    fn new_playback_releases_the_previous_one() -> anyhow::Result<()> {
        let (mut controller, log) = controller(None);
        let buf = buffer();
        controller.play(Some(&buf))?;
        controller.replay(Some(&buf))?;
        assert_eq!(log.borrow().started, 2);
        assert_eq!(log.borrow().live, 1);
        assert!(controller.is_playing());
        Ok(())
    }

    #[test]
    fn stop_ignores_already_stopped() -> anyhow::Result<()> {
        let (mut controller, log) = controller(Some(PlaybackError::AlreadyStopped));
        controller.play(Some(&buffer()))?;
        controller.stop()?;
        assert_eq!(log.borrow().live, 0);
        assert!(!controller.is_playing());
        Ok(())
    }

    #[test]
    fn stop_propagates_device_errors() -> anyhow::Result<()> {
        let (mut controller, _log) =
            controller(Some(PlaybackError::Device("unplugged".to_string())));
        controller.play(Some(&buffer()))?;
        assert_eq!(
            controller.stop(),
            Err(PlaybackError::Device("unplugged".to_string()))
        );
        Ok(())
    }

    #[test]
    fn drop_releases_active_session() -> anyhow::Result<()> {
        let (mut controller, log) = controller(None);
        controller.play(Some(&buffer()))?;
        drop(controller);
        assert_eq!(log.borrow().live, 0);
        Ok(())
    }
}
