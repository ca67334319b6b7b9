use crate::Transcript;
use crate::review::Review;

/// Render transcript as plain text (one segment per line, no timestamps)
pub fn render_text(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(transcript: &Transcript) -> String {
    serde_json::to_string_pretty(transcript).unwrap_or_default()
}

/// Render key points as a bulleted list
pub fn render_points(review: &Review) -> String {
    review
        .points
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_points_json(review: &Review) -> String {
    serde_json::to_string_pretty(review).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Segment;

    fn sample_transcript() -> Transcript {
        Transcript::from_segments(
            vec![
                Segment {
                    text: "Hello world\n".to_string(),
                    start_ms: 0,
                    duration_ms: 1500,
                },
                Segment {
                    text: "This is a test".to_string(),
                    start_ms: 1500,
                    duration_ms: 2000,
                },
            ],
            Some("en".to_string()),
            3500,
        )
    }

    #[test]
    fn test_render_text() {
        let t = sample_transcript();
        assert_eq!(render_text(&t), "Hello world\nThis is a test");
    }

    #[test]
    fn test_render_text_empty() {
        let t = Transcript::from_segments(vec![], None, 0);
        assert_eq!(render_text(&t), "");
    }

    #[test]
    fn test_render_json_round_trips() {
        let t = sample_transcript();
        let back: Transcript = serde_json::from_str(&render_json(&t)).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_render_points() {
        let review = Review {
            points: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(render_points(&review), "- first\n- second");
    }
}
