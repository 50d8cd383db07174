use chrono::{DateTime, Utc};

use crate::types::{QueryRecord, Video};

/// Format a timestamp as `YYYY-MM-DD HH:MM`, or `-` when unknown
pub fn format_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One line per video: id, status, date of last activity, title
pub fn format_video_line(video: &Video) -> String {
    format!(
        "{:<14} {:<10} {}  {}",
        video.id,
        video.status.as_str(),
        format_timestamp(video.last_interaction.or(video.created_at).as_ref()),
        video.title.as_deref().unwrap_or("(untitled)")
    )
}

pub fn format_video_details(video: &Video) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "# {}\n\n",
        video.title.as_deref().unwrap_or(&video.id)
    ));
    output.push_str(&format!("**Id:** {}\n", video.id));
    output.push_str(&format!("**Status:** {}\n", video.status.as_str()));
    output.push_str(&format!(
        "**Created:** {}\n",
        format_timestamp(video.created_at.as_ref())
    ));
    if let Some(thumbnail) = video.thumbnail() {
        output.push_str(&format!("**Thumbnail:** {}\n", thumbnail));
    }
    output
}

/// Question/answer history as markup, in the order given (the backend sends newest first)
pub fn format_history(history: &[QueryRecord]) -> String {
    if history.is_empty() {
        return "No questions asked yet.\n".to_string();
    }

    let mut output = String::new();
    for (i, record) in history.iter().enumerate() {
        output.push_str(&format!(
            "## {}. {} ({})\n\n",
            i + 1,
            record.question.trim(),
            format_timestamp(record.timestamp.as_ref())
        ));
        output.push_str(record.answer.trim());
        output.push_str("\n\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::VideoStatus;

    #[test]
    fn history_is_numbered_in_order() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let history = vec![
            QueryRecord {
                question: "What is it about?".into(),
                answer: "Rust.".into(),
                timestamp: Some(ts),
            },
            QueryRecord {
                question: "Who speaks?".into(),
                answer: "Someone.".into(),
                timestamp: None,
            },
        ];

        let text = format_history(&history);
        assert!(text.starts_with("## 1. What is it about? (2024-05-06 07:08)\n\nRust."));
        assert!(text.contains("## 2. Who speaks? (-)"));
    }

    #[test]
    fn untitled_video_falls_back_to_id() {
        let video = Video {
            id: "ABC123".into(),
            title: None,
            thumbnail_url: None,
            status: VideoStatus::Processing,
            created_at: None,
            last_interaction: None,
        };

        assert!(format_video_details(&video).starts_with("# ABC123\n"));
        assert!(format_video_line(&video).contains("processing"));
    }

    #[test]
    fn library_line_uses_last_interaction() {
        let video = Video {
            id: "abc".into(),
            title: Some("Talk".into()),
            thumbnail_url: Some(String::new()),
            status: VideoStatus::Unknown,
            created_at: None,
            last_interaction: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        };

        assert!(format_video_line(&video).contains("2024-01-02 03:04  Talk"));
        assert!(!format_video_details(&video).contains("Thumbnail"));
    }
}
