//! Sample-rate conversion by linear interpolation.

use super::wav::PcmAudio;

/// Resample interleaved audio to `target_rate`.
///
/// Each channel is interpolated independently. A zero or unchanged rate
/// returns a copy of the input.
pub fn resample_linear(audio: &PcmAudio, target_rate: u32) -> PcmAudio {
    if target_rate == 0 || target_rate == audio.sample_rate || audio.sample_rate == 0 {
        return audio.clone();
    }

    let channels = audio.channels as usize;
    let in_frames = audio.frames();
    if channels == 0 || in_frames == 0 {
        return PcmAudio {
            channels: audio.channels,
            sample_rate: target_rate,
            samples: Vec::new(),
        };
    }

    let source_rate = audio.sample_rate as u64;
    let out_frames = ((in_frames as u64 * target_rate as u64).div_ceil(source_rate)) as usize;
    let step = audio.sample_rate as f64 / target_rate as f64;

    let mut samples = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        let position = frame as f64 * step;
        let i0 = (position.floor() as usize).min(in_frames - 1);
        let i1 = (i0 + 1).min(in_frames - 1);
        let frac = (position - i0 as f64) as f32;

        for channel in 0..channels {
            let a = audio.samples[i0 * channels + channel];
            let b = audio.samples[i1 * channels + channel];
            samples.push(a + (b - a) * frac);
        }
    }

    PcmAudio {
        channels: audio.channels,
        sample_rate: target_rate,
        samples,
    }
}
