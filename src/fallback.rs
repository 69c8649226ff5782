//! Extractive summary used when the language model cannot be reached.
//!
//! The transcript is cut into sentences (or fixed-size word chunks when the
//! captions carry no punctuation), repeated segments are dropped, and a
//! handful of segments are sampled at regular intervals so the summary spans
//! the whole video. Songs get an extra section listing their recurring lines.

use std::collections::{HashMap, HashSet};

const MAX_KEY_POINTS: usize = 5;
const MAX_TOPICS: usize = 5;
const MIN_TOPIC_LEN: usize = 4;
const CHUNK_WORDS: usize = 20;
// Average words per sentence above which punctuation is considered missing.
const SPARSE_PUNCTUATION_WORDS: usize = 40;
// Share of segments that repeat an earlier one, above which the text reads
// as lyrics.
const MUSIC_DUPLICATE_SHARE: f64 = 0.3;
const MAX_POINT_CHARS: usize = 200;

pub const EMPTY_TRANSCRIPT_MESSAGE: &str =
    "No transcript content was available to summarize.";

const FOOTER: &str = "ℹ️ Generated directly from the transcript because the \
AI summarizer was unavailable.";

const MUSIC_TITLE_HINTS: &[&str] = &[
    "official video",
    "lyrics",
    "music video",
    "song",
    "audio",
    "ft.",
    "feat.",
];

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "always", "around", "back", "been",
    "before", "being", "because", "come", "could", "didnt", "does", "doesnt",
    "doing", "dont", "down", "even", "every", "from", "going", "gonna",
    "gotta", "have", "having", "here", "into", "just", "know", "like",
    "little", "look", "make", "many", "maybe", "more", "most", "much", "need",
    "never", "only", "other", "over", "really", "right", "said", "same",
    "should", "some", "something", "still", "such", "sure", "take", "tell",
    "than", "that", "thats", "their", "them", "then", "there", "these",
    "they", "theyre", "thing", "things", "think", "this", "those", "through",
    "very", "want", "wanna", "well", "were", "what", "when", "where",
    "which", "while", "will", "with", "would", "yeah", "youre", "your",
    "okay", "actually", "basically", "kind", "sort", "cant", "youll",
    "youve", "weve",
];

/// Build a summary from the transcript alone. The output is deterministic
/// for a given input.
pub fn summarize(transcript: &str, title: Option<&str>) -> String {
    let normalized = transcript.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return EMPTY_TRANSCRIPT_MESSAGE.to_string();
    }

    let segments = segment(&normalized);
    let (unique, repeated) = dedupe(&segments);
    let music =
        looks_like_music(title, duplicate_share(segments.len(), unique.len()));
    let topics = topics(&normalized, MAX_TOPICS);
    let points: Vec<&str> = sample_evenly(&unique, MAX_KEY_POINTS);

    let mut out = String::new();
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => out.push_str(&format!("📝 Summary of \"{}\"\n\n", title)),
        None => out.push_str("📝 Transcript summary\n\n"),
    }

    if music {
        out.push_str("🎵 Song overview\n");
        out.push_str("This appears to be a music video.");
        if !topics.is_empty() {
            out.push_str(&format!(" Themes: {}.", topics.join(", ")));
        }
        out.push('\n');
        if !repeated.is_empty() {
            out.push_str("Recurring lines:\n");
            let chorus: Vec<&str> =
                repeated.iter().take(MAX_KEY_POINTS).copied().collect();
            push_bullets(&mut out, &chorus);
        }
        out.push('\n');
    } else if !topics.is_empty() {
        out.push_str(&format!("🎯 Main topics: {}\n\n", topics.join(", ")));
    }

    out.push_str("💡 Key points\n");
    push_bullets(&mut out, &points);

    out.push('\n');
    out.push_str(FOOTER);
    out
}

fn push_bullets(out: &mut String, lines: &[&str]) {
    for line in lines {
        out.push_str("• ");
        out.push_str(&truncate_words(line, MAX_POINT_CHARS));
        out.push('\n');
    }
}

/// Split into sentences, or into fixed word chunks when the text is mostly
/// unpunctuated (auto-generated captions).
pub(crate) fn segment(text: &str) -> Vec<String> {
    let sentences = split_sentences(text);
    let word_count = text.split_whitespace().count();
    if sentences.len() * SPARSE_PUNCTUATION_WORDS >= word_count {
        return sentences;
    }
    text.split_whitespace()
        .collect::<Vec<_>>()
        .chunks(CHUNK_WORDS)
        .map(|chunk| chunk.join(" "))
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn dedupe_key(segment: &str) -> String {
    words_lower(segment).join(" ")
}

/// Returns the unique segments in first-seen order, and the subset of those
/// that occurred more than once.
pub(crate) fn dedupe(segments: &[String]) -> (Vec<&str>, Vec<&str>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for segment in segments {
        *counts.entry(dedupe_key(segment)).or_default() += 1;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();
    let mut repeated = Vec::new();
    for segment in segments {
        let key = dedupe_key(segment);
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        unique.push(segment.as_str());
        if counts.get(&key).copied().unwrap_or(0) > 1 {
            repeated.push(segment.as_str());
        }
    }
    (unique, repeated)
}

/// Pick up to `count` items at evenly spaced indices, always starting with
/// the first.
pub(crate) fn sample_evenly<'a>(items: &[&'a str], count: usize) -> Vec<&'a str> {
    let n = items.len();
    let k = count.min(n);
    (0..k).map(|i| items[i * n / k]).collect()
}

fn words_lower(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Fraction of segments dropped by `dedupe` as repeats of an earlier one.
pub(crate) fn duplicate_share(segments: usize, unique: usize) -> f64 {
    if segments == 0 {
        return 0.0;
    }
    1.0 - unique as f64 / segments as f64
}

pub(crate) fn looks_like_music(
    title: Option<&str>,
    duplicate_share: f64,
) -> bool {
    let title_hint = title
        .map(|t| t.to_lowercase())
        .is_some_and(|t| MUSIC_TITLE_HINTS.iter().any(|hint| t.contains(hint)));
    title_hint || duplicate_share >= MUSIC_DUPLICATE_SHARE
}

/// Most frequent content words, ties broken by first appearance.
pub(crate) fn topics(text: &str, count: usize) -> Vec<String> {
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, word) in words_lower(text).into_iter().enumerate() {
        if word.chars().count() < MIN_TOPIC_LEN
            || word.chars().all(|c| c.is_numeric())
            || STOPWORDS.contains(&word.as_str())
        {
            continue;
        }
        let entry = stats.entry(word).or_insert((0, position));
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = stats
        .into_iter()
        .map(|(word, (freq, first))| (word, freq, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(count).map(|(w, _, _)| w).collect()
}

fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out = String::new();
    for word in text.split_whitespace() {
        let next_len = out.chars().count()
            + word.chars().count()
            + usize::from(!out.is_empty());
        if next_len > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        out = text.chars().take(max_chars).collect();
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TALK: &str = "Welcome to this talk about ocean energy. \
        Tidal turbines convert moving water into electricity. \
        The ocean holds enormous untapped energy. \
        Engineers are testing turbines off the coast of Scotland. \
        Costs have fallen sharply over the past decade. \
        Storage remains the biggest open problem for ocean energy. \
        Thanks for listening.";

    #[test]
    fn empty_transcript_has_fixed_message() {
        assert_eq!(summarize("   \n ", None), EMPTY_TRANSCRIPT_MESSAGE);
    }

    #[test]
    fn spoken_content_gets_topics_and_key_points() {
        let summary = summarize(TALK, Some("Ocean power explained"));
        assert!(summary.starts_with("📝 Summary of \"Ocean power explained\""));
        assert!(summary.contains("🎯 Main topics: ocean, energy, turbines"));
        assert!(summary.contains("💡 Key points"));
        assert!(summary.contains("• Welcome to this talk about ocean energy."));
        assert!(!summary.contains("🎵"));
        assert!(summary.ends_with(FOOTER));
    }

    #[test]
    fn sampling_spans_the_whole_transcript() {
        let items: Vec<String> = (0..20).map(|i| format!("s{}", i)).collect();
        let refs: Vec<&str> = items.iter().map(String::as_str).collect();
        assert_eq!(
            sample_evenly(&refs, 5),
            vec!["s0", "s4", "s8", "s12", "s16"]
        );
        assert_eq!(sample_evenly(&refs[..3], 5), vec!["s0", "s1", "s2"]);
        assert!(sample_evenly(&[], 5).is_empty());
    }

    #[test]
    fn dedupe_ignores_case_and_punctuation() {
        let segments = vec![
            "Never gonna give you up.".to_string(),
            "Never gonna let you down.".to_string(),
            "never gonna give you up!".to_string(),
        ];
        let (unique, repeated) = dedupe(&segments);
        assert_eq!(
            unique,
            vec!["Never gonna give you up.", "Never gonna let you down."]
        );
        assert_eq!(repeated, vec!["Never gonna give you up."]);
    }

    #[test]
    fn unpunctuated_captions_are_chunked() {
        let words: Vec<String> = (0..50).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let segments = segment(&text);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].split_whitespace().count(), CHUNK_WORDS);
        assert_eq!(segments[2].split_whitespace().count(), 10);
    }

    #[test]
    fn punctuated_text_splits_on_sentence_boundaries() {
        let segments = segment("One. Two! Three? Version 2.5 ships");
        assert_eq!(segments, vec!["One.", "Two!", "Three?", "Version 2.5 ships"]);
    }

    #[test]
    fn music_detected_from_title() {
        for title in [
            "Rick Astley - Never Gonna Give You Up (Official Music Video)",
            "Bohemian Rhapsody (Lyrics)",
            "Track 3 (Audio)",
            "Sunrise ft. Nobody",
        ] {
            assert!(looks_like_music(Some(title), 0.0), "{}", title);
        }
        assert!(!looks_like_music(Some("How tides work"), 0.0));
        assert!(!looks_like_music(None, 0.0));
    }

    #[test]
    fn duplicate_share_counts_dropped_segments() {
        assert_eq!(duplicate_share(0, 0), 0.0);
        assert_eq!(duplicate_share(4, 4), 0.0);
        assert_eq!(duplicate_share(10, 7), 1.0 - 0.7);
        assert!(looks_like_music(None, duplicate_share(10, 7)));
        assert!(!looks_like_music(None, duplicate_share(10, 8)));
    }

    #[test]
    fn music_detected_from_repetition() {
        let chorus = "never gonna give you up never gonna let you down";
        let lyrics = format!(
            "{chorus}. we're no strangers to love. {chorus}. \
             you know the rules and so do i. {chorus}."
        );

        let summary = summarize(&lyrics, None);
        assert!(summary.contains("🎵 Song overview"));
        assert!(summary.contains("Recurring lines:\n\
            • never gonna give you up never gonna let you down.\n"));
        assert!(summary.contains("💡 Key points"));
        assert!(summary.contains("• we're no strangers to love."));
        assert!(!summary.contains("🎯 Main topics"));
    }

    #[test]
    fn short_repeated_lines_read_as_lyrics() {
        let lyrics = "Oh yeah. The river runs across the valley. Oh yeah. \
            Stones are shining in the water. Oh yeah. Birds fly over the hills. \
            Oh yeah. Night falls on the town. Oh yeah.";

        let summary = summarize(lyrics, None);
        assert!(summary.contains("🎵 Song overview"), "{}", summary);
        assert!(summary.contains("• Oh yeah.\n"));
        assert!(!summary.contains("🎯 Main topics"));
    }

    #[test]
    fn song_layout_keeps_key_points_after_overview() {
        let summary = summarize(
            "We sing. We sing. A new day.",
            Some("My song (Official Video)"),
        );
        let overview = summary.find("🎵 Song overview").unwrap();
        let points = summary.find("💡 Key points").unwrap();
        assert!(overview < points);
        assert!(summary[points..].contains("• A new day."));
        assert!(summary[points..].contains("• We sing."));
        assert!(summary.ends_with(FOOTER));
    }

    #[test]
    fn topics_skip_stopwords_and_short_words() {
        let topics = topics("the cat and that cat really like fish fish fish", 3);
        assert_eq!(topics, vec!["fish".to_string()]);
    }

    #[test]
    fn long_points_are_truncated_on_word_boundary() {
        let long = "word ".repeat(100);
        let truncated = truncate_words(long.trim(), 22);
        assert_eq!(truncated, "word word word word…");
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(summarize(TALK, None), summarize(TALK, None));
    }
}
