//! cpal playback of decoded speech.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use audit_application::{AudioSink, PlaybackError, PlaybackSession};
use audit_core::AudioBuffer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::pcm::resample_linear;

/// Opens the default output device for every buffer it starts.
#[derive(Debug, Default)]
pub struct CpalSink;

impl CpalSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for CpalSink {
    fn start(&mut self, buffer: &AudioBuffer) -> Result<Box<dyn PlaybackSession>, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("no audio output device available".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        tracing::debug!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            rate = config.sample_rate.0,
            channels = config.channels,
            "opening output stream"
        );

        let frames: Arc<[f32]> =
            resample_linear(&buffer.samples, buffer.sample_rate, config.sample_rate.0).into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let total = frames.len();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, frames, Arc::clone(&cursor)),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, frames, Arc::clone(&cursor)),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, frames, Arc::clone(&cursor)),
            other => Err(PlaybackError::Device(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;

        let mut session = CpalSession {
            stream: Some(stream),
            state: StreamState::Built,
            cursor,
            total,
        };
        session.play()?;
        Ok(Box::new(session))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    frames: Arc<[f32]>,
    cursor: Arc<AtomicUsize>,
) -> Result<Stream, PlaybackError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    let value = frames.get(idx).copied().unwrap_or(0.0);
                    let sample = T::from_sample_(value);
                    for slot in frame.iter_mut() {
                        *slot = sample;
                    }
                }
            },
            |err| tracing::error!(error = %err, "audio stream error"),
            None,
        )
        .map_err(|e| PlaybackError::Stream(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Built,
    Playing,
    Stopped,
}

impl StreamState {
    /// Where `stop` leaves the session, or the benign error it reports.
    fn stop(self, drained: bool) -> Result<StreamState, PlaybackError> {
        match self {
            StreamState::Built => Err(PlaybackError::NotRunning),
            StreamState::Stopped => Err(PlaybackError::AlreadyStopped),
            StreamState::Playing if drained => Err(PlaybackError::AlreadyStopped),
            StreamState::Playing => Ok(StreamState::Stopped),
        }
    }
}

/// Keeps the stream alive until stopped or dropped.
struct CpalSession {
    stream: Option<Stream>,
    state: StreamState,
    cursor: Arc<AtomicUsize>,
    total: usize,
}

impl CpalSession {
    fn play(&mut self) -> Result<(), PlaybackError> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(PlaybackError::AlreadyStopped);
        };
        stream
            .play()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;
        self.state = StreamState::Playing;
        Ok(())
    }

    fn drained(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.total
    }
}

impl PlaybackSession for CpalSession {
    fn stop(&mut self) -> Result<(), PlaybackError> {
        let outcome = self.state.stop(self.drained());
        self.state = StreamState::Stopped;
        let stream = self.stream.take();
        outcome?;
        match stream {
            Some(stream) => stream
                .pause()
                .map_err(|e| PlaybackError::Stream(e.to_string())),
            None => Err(PlaybackError::AlreadyStopped),
        }
    }

    fn is_finished(&self) -> bool {
        self.state != StreamState::Playing || self.drained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_a_playing_stream_stops_it() {
        assert_eq!(StreamState::Playing.stop(false).ok(), Some(StreamState::Stopped));
    }

    #[test]
    fn stopping_before_play_reports_not_running() {
        let err = StreamState::Built.stop(false).unwrap_err();
        assert!(matches!(err, PlaybackError::NotRunning));
        assert!(err.is_benign_stop());
    }

    #[test]
    fn stopping_twice_or_after_drain_reports_already_stopped() {
        assert!(matches!(
            StreamState::Stopped.stop(false),
            Err(PlaybackError::AlreadyStopped)
        ));
        assert!(matches!(
            StreamState::Playing.stop(true),
            Err(PlaybackError::AlreadyStopped)
        ));
    }
}
