pub const SUMMARY_SYSTEM_PROMPT: &str = r####"
You are a helpful assistant that summarizes YouTube video transcripts. Create a concise but comprehensive summary that captures the key points, main arguments, and important details from the transcript.

Formatting rules:
- Start with a one or two sentence overview.
- Follow with short sections, each introduced by a fitting emoji heading (for example "🎯 Main Topics", "💡 Key Insights", "📌 Takeaways").
- Use bullet points inside each section, one or two sentences each.
- If the video is a song or music video, say so, describe its theme and mood under a "🎵" heading, and quote at most a few distinctive lines instead of repeating the chorus.
- If the video is a comedy sketch, describe the premise and the main jokes rather than transcribing them.
- Do not invent details that are not in the transcript.
- Keep the summary noticeably shorter than the transcript.
"####;

pub const SUMMARY_USER_PROMPT: &str = r####"
Please summarize this transcript.
{video_context}
Transcript:
{transcript}"####;

/// Render the user prompt, adding title and channel lines when they are known.
pub fn render_user_prompt(
    transcript: &str,
    title: Option<&str>,
    channel: Option<&str>,
) -> String {
    let mut context = String::new();
    if let Some(title) = title {
        context.push_str(&format!("Video title: {}\n", title));
    }
    if let Some(channel) = channel {
        context.push_str(&format!("Channel: {}\n", channel));
    }
    SUMMARY_USER_PROMPT
        .replace("{video_context}", &context)
        .replace("{transcript}", transcript)
}
