use crate::types::{ChatTurn, Role, VideoRecord};

/// Format seconds as `M:SS`, or `H:MM:SS` once the duration reaches an hour
pub fn format_duration(seconds: u64) -> String {
    let (mins, secs) = (seconds / 60, seconds % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Parse an ISO 8601 duration as returned by the Data API (`PT1H2M5S`, `P1DT3M`)
/// into whole seconds. Fractional seconds are truncated.
pub fn parse_iso8601_duration(duration: &str) -> Option<u64> {
    let rest = duration.strip_prefix('P')?;
    let mut seconds = 0u64;
    let mut current_num = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' | '.' => current_num.push(c),
            'T' if !in_time && current_num.is_empty() => in_time = true,
            unit => {
                let whole = current_num.split('.').next().unwrap_or_default();
                let num: u64 = whole.parse().ok()?;
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = num.checked_mul(factor)?.checked_add(seconds)?;
                current_num.clear();
                saw_component = true;
            }
        }
    }

    if !current_num.is_empty() || !saw_component {
        return None;
    }
    Some(seconds)
}

/// Format a count with thousands separators: 1234567 -> "1,234,567"
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Plain-text video table, one line per video, used in prompts and terminal output
pub fn format_video_table(videos: &[VideoRecord]) -> String {
    let mut output = String::from("Type | Title | Views | Likes | Comments | Duration | Date\n");
    for video in videos {
        output.push_str(&format!(
            "{} | {} | {} | {} | {} | {} | {}\n",
            video.content_type,
            video.title.replace('|', "/"),
            video.views,
            video.likes,
            video.comments,
            video.duration,
            video.published.format("%Y-%m-%d"),
        ));
    }
    output
}

/// Render chat history as Markdown so it can go through the same document export as reports
pub fn format_chat_transcript(history: &[ChatTurn]) -> String {
    let mut output = String::new();
    for turn in history {
        let heading = match turn.role {
            Role::User => "Question",
            Role::Assistant => "Answer",
        };
        output.push_str(&format!("## {}\n{}\n\n", heading, turn.content));
    }
    output
}
