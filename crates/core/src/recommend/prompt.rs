use crate::config::SpeakingContext;
use crate::pauses::PauseSummary;
use crate::pipeline::AnalysisBundle;
use crate::rate::Pace;
use crate::recommend::{close_marker, open_marker, SECTIONS_PER_KIND};
use std::fmt::Write;

/// Human-readable digest of the bundle, one block per metric. Metrics that
/// were not produced are called out as unavailable.
pub fn feedback_text(bundle: &AnalysisBundle) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_feedback(&mut out, bundle);
    out
}

fn write_feedback(out: &mut String, b: &AnalysisBundle) -> std::fmt::Result {
    writeln!(out, "--- Transcription ---")?;
    writeln!(out, "{}", b.transcription)?;
    writeln!(out)?;

    writeln!(out, "--- Pitch ---")?;
    match &b.pitch_stats {
        Some(p) if p.is_voiced() => {
            writeln!(out, "- Median: {:.1} Hz", p.median)?;
            writeln!(out, "- Mean: {:.1} Hz ({} register)", p.mean, p.register)?;
            writeln!(out, "- Variation (std): {:.1} Hz", p.std)?;
            writeln!(out, "- Range: {:.1} Hz to {:.1} Hz", p.min, p.max)?;
            writeln!(
                out,
                "- Intonation: {} rising and {} falling pitch movements",
                p.intonation.rising, p.intonation.falling
            )?;
        }
        Some(_) => writeln!(out, "- No voiced speech detected.")?,
        None => writeln!(out, "- Pitch analysis unavailable.")?,
    }
    writeln!(out)?;

    writeln!(out, "--- Speaking Rate ---")?;
    writeln!(
        out,
        "- Estimated: {:.0} words per minute ({})",
        b.speed_wpm,
        Pace::classify(b.speed_wpm)
    )?;
    writeln!(out, "- Word count: {}", b.word_count)?;
    writeln!(out)?;

    writeln!(out, "--- Pauses ---")?;
    match &b.pause_durations_s {
        Some(durations) => {
            let s = PauseSummary::from_durations(durations);
            writeln!(out, "- Number of significant pauses: {}", s.count)?;
            writeln!(out, "- Average pause duration: {:.2} seconds", s.mean_s)?;
            writeln!(out, "- Longest pause duration: {:.2} seconds", s.longest_s)?;
            writeln!(out, "- Total time paused: {:.2} seconds", s.total_s)?;
            if b.speech_span_s > 0.0 {
                let speaking = (b.speech_span_s - s.total_s).max(0.0);
                writeln!(
                    out,
                    "- Speaking time: {:.2} of {:.2} seconds ({:.1}%)",
                    speaking,
                    b.speech_span_s,
                    speaking / b.speech_span_s * 100.0
                )?;
            }
        }
        None => writeln!(out, "- Pause analysis unavailable.")?,
    }
    writeln!(out)?;

    writeln!(out, "--- Loudness and Tone ---")?;
    match b.loudness {
        Some(l) => writeln!(out, "- Integrated loudness: {l:.1} LUFS")?,
        None => writeln!(out, "- Loudness unavailable.")?,
    }
    match &b.intensity {
        Some(i) => {
            writeln!(out, "- Average volume: {:.1} dB", i.mean)?;
            writeln!(out, "- Volume variation (std): {:.1} dB", i.std)?;
            writeln!(out, "- Volume range: {:.1} dB to {:.1} dB", i.min, i.max)?;
            writeln!(out, "- Frame-to-frame variability: {:.2} dB", i.variability)?;
        }
        None => writeln!(out, "- Volume contour unavailable.")?,
    }
    match &b.tone_score {
        Some(t) => {
            let confidence = t.scores.get(&t.label).copied().unwrap_or_default();
            writeln!(out, "- Perceived tone: {} ({:.0}%)", t.label, confidence * 100.0)?;
        }
        None => writeln!(out, "- Tone unavailable.")?,
    }
    writeln!(out)?;

    writeln!(out, "--- Emphasis ---")?;
    if b.emphasized_words.is_empty() {
        writeln!(out, "- No emphasized words.")?;
    } else {
        writeln!(out, "- Emphasized words: {}", b.emphasized_words.join(", "))?;
    }
    writeln!(out)?;

    writeln!(out, "--- Filler Words ---")?;
    if b.filler_words.is_empty() {
        writeln!(out, "- None detected.")?;
    } else {
        writeln!(
            out,
            "- {} fillers: {}",
            b.filler_words.len(),
            b.filler_words.join(", ")
        )?;
    }

    if let Some(r) = &b.repetition {
        writeln!(out)?;
        writeln!(out, "--- Repetition ---")?;
        writeln!(out, "- Repeated word share: {:.1}%", r.percentage)?;
        if !r.top_repetitions.is_empty() {
            let top: Vec<String> = r
                .top_repetitions
                .iter()
                .map(|(w, c)| format!("{w} ({c}x)"))
                .collect();
            writeln!(out, "- Most repeated: {}", top.join(", "))?;
        }
    }
    Ok(())
}

/// Full instruction for the text generator, including the marker contract
/// the reply is parsed against.
pub fn build_prompt(
    bundle: &AnalysisBundle,
    context: SpeakingContext,
    face_analysis: Option<&str>,
) -> String {
    let mut prompt = String::new();
    let _ = write_prompt(&mut prompt, bundle, context, face_analysis);
    prompt
}

fn write_prompt(
    out: &mut String,
    bundle: &AnalysisBundle,
    context: SpeakingContext,
    face_analysis: Option<&str>,
) -> std::fmt::Result {
    writeln!(
        out,
        "You are a public speaking coach. The speaking context is {context}. {}",
        context.prompt_modifier()
    )?;
    writeln!(
        out,
        "Using the voice analysis below, give the speaker feedback on their delivery."
    )?;
    writeln!(
        out,
        "Only discuss emphasis for sentences that contain one or two emphasized words."
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Reply with exactly {SECTIONS_PER_KIND} strengths, {SECTIONS_PER_KIND} weaknesses \
         and {SECTIONS_PER_KIND} brief grammar or vocabulary points, each wrapped in its markers:"
    )?;
    for (tag, what) in [
        ("STRENGTH", "a strength"),
        ("WEAKNESS", "a weakness with a concrete fix"),
        ("LANGUAGE", "a brief grammar or vocabulary point"),
    ] {
        for n in 1..=SECTIONS_PER_KIND {
            writeln!(out, "{} {what} {}", open_marker(tag, n), close_marker(tag, n))?;
        }
    }
    writeln!(out)?;
    writeln!(out, "Voice analysis:")?;
    out.push_str(&feedback_text(bundle));

    if let Some(face) = face_analysis.map(str::trim).filter(|f| !f.is_empty()) {
        writeln!(out)?;
        writeln!(out, "Facial expression analysis:")?;
        writeln!(out, "{face}")?;
    }
    Ok(())
}
