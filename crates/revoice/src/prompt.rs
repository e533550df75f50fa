//! Prompt splicing: turn a cutoff timestamp, an alignment table, and the
//! original transcript into the text prompt and sample-frame offset the
//! generative model expects.

use crate::alignment::AlignmentEntry;
use crate::error::Error;
use crate::Result;

/// Sample rate the external codec consumes. Frame offsets are expressed in
/// samples at this rate.
pub const CODEC_AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Punctuation stripped before comparing aligner labels against transcript
/// words.
const PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// Result of a successful splice.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptResult {
    /// Transcript prefix up to and including the cutoff word, a single
    /// space, then the caller's target text.
    pub prompt_text: String,
    /// Sample offset of the cutoff word's end at the codec rate.
    pub prompt_end_frame: usize,
    /// End timestamp of the chosen word, seconds.
    pub end_time: f64,
    /// The chosen word as the aligner labelled it.
    pub end_word: String,
}

/// Map an end timestamp to a sample frame at the codec rate. Truncates
/// toward zero; the original pipeline does not round.
pub fn prompt_end_frame(end_time: f64) -> usize {
    (end_time * CODEC_AUDIO_SAMPLE_RATE as f64) as usize
}

fn strip_punctuation(word: &str) -> &str {
    word.trim_end_matches(PUNCTUATION)
}

/// Find the last entry ending at or before `cutoff`. Entries are assumed
/// monotonically increasing in end time, so this stops at the first entry
/// past the cutoff rather than scanning the whole table.
fn find_cutoff_entry(entries: &[AlignmentEntry], cutoff: f64) -> Option<&AlignmentEntry> {
    let mut chosen = None;
    for entry in entries {
        // Boundary is inclusive: an entry ending exactly at the cutoff is
        // accepted.
        if entry.end > cutoff {
            break;
        }
        chosen = Some(entry);
    }
    chosen
}

/// Build the generation prompt.
///
/// If the chosen aligner label occurs more than once in the transcript, the
/// *first* textual occurrence wins, which may not be the temporally correct
/// one. That ambiguity is inherited from the original pipeline and kept
/// as-is.
pub fn splice_prompt(
    entries: &[AlignmentEntry],
    transcript: &str,
    cutoff: f64,
    target_text: &str,
) -> Result<PromptResult> {
    let chosen = find_cutoff_entry(entries, cutoff)
        // A silence row carries an empty label; landing on one is as much of
        // a dead end as having no row at all.
        .filter(|entry| !entry.label.is_empty())
        .ok_or(Error::NoWordInTimeFrame)?;

    tracing::info!(
        end_time = chosen.end,
        word = %chosen.label,
        "identified end value closest to desired time"
    );

    let wanted = strip_punctuation(&chosen.label);
    let words: Vec<&str> = transcript.split_whitespace().collect();
    let end_idx = words
        .iter()
        .position(|word| strip_punctuation(word) == wanted)
        .ok_or(Error::PromptEndWordNotFound)?;

    let prefix = words[..=end_idx].join(" ");
    tracing::debug!(prefix = %prefix, "transcript prefix up to cutoff word");

    Ok(PromptResult {
        prompt_text: format!("{prefix} {target_text}"),
        prompt_end_frame: prompt_end_frame(chosen.end),
        end_time: chosen.end,
        end_word: chosen.label.clone(),
    })
}
