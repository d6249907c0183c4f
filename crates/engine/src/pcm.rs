use audit_core::AudioBuffer;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Rate of speech returned by the TTS model when the mime type does not say otherwise.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Decodes base64 signed 16-bit little-endian mono PCM.
pub fn decode_base64_pcm16(
    data: &str,
    sample_rate: u32,
) -> Result<AudioBuffer, base64::DecodeError> {
    let bytes = STANDARD.decode(data.trim())?;
    Ok(AudioBuffer::new(sample_rate, pcm16_to_f32(&bytes)))
}

/// A trailing odd byte is dropped.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Reads `rate=NNNN` from a mime type such as `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
        .filter(|rate| *rate > 0)
}

/// Linear interpolation between two rates.
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let step = from as f64 / to as f64;
    let out_len = ((samples.len() as f64) / step).ceil() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}
