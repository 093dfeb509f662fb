//! Word-level emphasis from per-word integrated loudness.

use crate::asr::WordToken;
use crate::config::EmphasisConfig;
use crate::decode::AudioClip;
use std::f64::consts::PI;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoudnessError {
    #[error("cannot meter an empty span")]
    EmptySpan,
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
}

/// Integrated-loudness collaborator. May return a non-finite value for
/// digital silence.
pub trait LoudnessMeter: Send + Sync {
    fn integrated(&self, samples: &[f32], sample_rate_hz: u32) -> Result<f64, LoudnessError>;
}

#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn high_shelf(sample_rate_hz: f64, fc: f64, gain_db: f64, q: f64) -> Self {
        let a = 10f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * fc / sample_rate_hz;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos + sqrt_a_alpha;
        Self {
            b0: a * ((a + 1.0) + (a - 1.0) * cos + sqrt_a_alpha) / a0,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos) / a0,
            b2: a * ((a + 1.0) + (a - 1.0) * cos - sqrt_a_alpha) / a0,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos - sqrt_a_alpha) / a0,
        }
    }

    fn high_pass(sample_rate_hz: f64, fc: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * fc / sample_rate_hz;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos) / 2.0 / a0,
            b1: -(1.0 + cos) / a0,
            b2: (1.0 + cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn apply(&self, input: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

/// ITU-R BS.1770 K-weighting followed by mean-square power over the whole
/// span (no gating), in LUFS.
#[derive(Clone, Debug, Default)]
pub struct KWeightedLoudnessMeter;

impl KWeightedLoudnessMeter {
    pub fn new() -> Self {
        Self
    }
}

impl LoudnessMeter for KWeightedLoudnessMeter {
    fn integrated(&self, samples: &[f32], sample_rate_hz: u32) -> Result<f64, LoudnessError> {
        if sample_rate_hz == 0 {
            return Err(LoudnessError::ZeroSampleRate);
        }
        if samples.is_empty() {
            return Err(LoudnessError::EmptySpan);
        }
        let sr = f64::from(sample_rate_hz);
        let shelf = Biquad::high_shelf(sr, 1500.0, 4.0, std::f64::consts::FRAC_1_SQRT_2);
        let high_pass = Biquad::high_pass(sr, 38.0, 0.5);

        let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
        let weighted = high_pass.apply(&shelf.apply(&input));
        let ms = weighted.iter().map(|v| v * v).sum::<f64>() / weighted.len() as f64;
        Ok(-0.691 + 10.0 * ms.log10())
    }
}

/// Words whose loudness exceeds `mean + k * std` over all measurable words,
/// in utterance order and surface form.
pub fn detect_emphasis(
    clip: &AudioClip,
    words: &[WordToken],
    meter: &dyn LoudnessMeter,
    config: &EmphasisConfig,
) -> Vec<String> {
    let measured: Vec<(usize, f64)> = words
        .iter()
        .enumerate()
        .filter_map(|(i, w)| {
            let start = clip.sample_index(w.start);
            let end = clip.sample_index(w.end);
            if start >= end {
                return None;
            }
            match meter.integrated(&clip.samples[start..end], clip.sample_rate_hz) {
                Ok(l) if l.is_finite() => Some((i, l)),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(word = %w.text, error = %e, "word loudness unavailable");
                    None
                }
            }
        })
        .collect();

    if measured.len() < 2 {
        return Vec::new();
    }

    let n = measured.len() as f64;
    let mean = measured.iter().map(|(_, l)| l).sum::<f64>() / n;
    let variance = measured.iter().map(|(_, l)| (l - mean) * (l - mean)).sum::<f64>() / n;
    let threshold = mean + config.std_multiplier * variance.sqrt();

    let emphasized: Vec<String> = measured
        .into_iter()
        .filter(|&(_, l)| l > threshold)
        .map(|(i, _)| words[i].text.clone())
        .collect();
    tracing::debug!(threshold, emphasized = emphasized.len(), "emphasis detection done");
    emphasized
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    fn tone(amplitude: f32, seconds: f64) -> Vec<f32> {
        let n = (seconds * f64::from(SR)) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * 1000.0 * i as f64 / f64::from(SR)).sin() as f32)
            .collect()
    }

    fn detect(clip: &AudioClip, words: &[WordToken]) -> Vec<String> {
        detect_emphasis(clip, words, &KWeightedLoudnessMeter, &EmphasisConfig::default())
    }

    /// Six 0.5 s words back to back; the loud one is index 3.
    fn utterance() -> (AudioClip, Vec<WordToken>) {
        let names = ["we", "really", "need", "THIS", "one", "today"];
        let mut samples = Vec::new();
        let mut words = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let amp = if i == 3 { 0.8 } else { 0.1 };
            samples.extend(tone(amp, 0.5));
            words.push(WordToken::new(*name, i as f64 * 0.5, (i + 1) as f64 * 0.5));
        }
        (AudioClip::new(SR, samples), words)
    }

    #[test]
    fn full_scale_1k_sine_meters_near_minus_3() {
        let samples: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * PI * 997.0 * i as f64 / 48_000.0).sin() as f32)
            .collect();
        let l = KWeightedLoudnessMeter.integrated(&samples, 48_000).unwrap();
        assert!((l + 3.01).abs() < 0.3, "got {l}");
    }

    #[test]
    fn digital_silence_is_non_finite() {
        let l = KWeightedLoudnessMeter.integrated(&[0.0; 1000], SR).unwrap();
        assert!(!l.is_finite());
        assert_eq!(
            KWeightedLoudnessMeter.integrated(&[], SR),
            Err(LoudnessError::EmptySpan)
        );
    }

    #[test]
    fn loud_word_is_emphasized() {
        let (clip, words) = utterance();
        let got = detect(&clip, &words);
        assert_eq!(got, vec!["THIS".to_owned()]);
    }

    #[test]
    fn emphasized_words_are_a_subset_of_transcribed_words() {
        let (clip, words) = utterance();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        for w in detect(&clip, &words) {
            assert!(texts.contains(&w.as_str()));
        }
    }

    #[test]
    fn fewer_than_two_measurable_words_gives_nothing() {
        let (clip, mut words) = utterance();
        words.truncate(1);
        assert!(detect(&clip, &words).is_empty());
    }

    #[test]
    fn out_of_buffer_and_silent_words_are_skipped() {
        let (mut clip, mut words) = utterance();
        // silence the second word and push another past the end
        clip.samples[8_000..16_000].iter_mut().for_each(|s| *s = 0.0);
        words.push(WordToken::new("ghost", 10.0, 10.5));
        let got = detect(&clip, &words);
        assert_eq!(got, vec!["THIS".to_owned()]);
    }

    #[test]
    fn uniform_loudness_emphasizes_nothing() {
        let mut samples = tone(0.3, 0.5);
        samples.extend(tone(0.3, 0.5));
        let clip = AudioClip::new(SR, samples);
        let words = vec![
            WordToken::new("same", 0.0, 0.5),
            WordToken::new("level", 0.5, 1.0),
        ];
        assert!(detect(&clip, &words).is_empty());
    }
}
