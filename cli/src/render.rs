/// Text rendering for the terminal front end.
use socialdl_shared::models::PreviewInfo;
use socialdl_shared::orchestrator::Notice;

use crate::selection::{SelectionState, Theme};

/// Generate a simple text progress bar.
pub fn progress_bar(percent: f64, theme: Theme) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = (clamped as usize) / 5; // 20 chars total
    let empty = 20_usize.saturating_sub(filled);
    let (full, blank) = theme.bar_glyphs();
    format!(
        "[{}{}]",
        full.to_string().repeat(filled),
        blank.to_string().repeat(empty)
    )
}

/// Progress bar with the rounded percentage; empty when nothing is in flight.
pub fn progress_line(percent: f64, theme: Theme) -> Option<String> {
    if percent <= 0.0 {
        return None;
    }
    Some(format!(
        "حالة التحميل {} {}%",
        progress_bar(percent, theme),
        percent.min(100.0).round() as u32
    ))
}

pub fn preview_card(preview: &PreviewInfo, selection: &SelectionState) -> String {
    let mut text = String::new();
    text.push_str(&format!("{}\n", preview.title));
    if !preview.thumbnail_url.is_empty() {
        text.push_str(&format!("Thumbnail: {}\n", preview.thumbnail_url));
    }
    text.push_str(&format!("المدة: {}\n", preview.formatted_duration()));
    if !preview.video_qualities.is_empty() {
        text.push_str(&format!("اختر الجودة: {}\n", selection.quality_chips(preview)));
    }
    if !preview.audio_formats.is_empty() {
        text.push_str(&format!("Audio: {}\n", preview.audio_formats.join(", ")));
    }
    text
}

pub fn notice_line(notice: &Notice) -> String {
    match notice.reason() {
        Some(reason) => format!("{} ({})", notice, reason),
        None => notice.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, Theme::Light), format!("[{}]", " ".repeat(20)));
        assert_eq!(progress_bar(42.0, Theme::Light), format!("[{}{}]", "=".repeat(8), " ".repeat(12)));
        assert_eq!(progress_bar(150.0, Theme::Dark), format!("[{}]", "█".repeat(20)));
    }

    #[test]
    fn test_progress_line_hidden_at_zero() {
        assert_eq!(progress_line(0.0, Theme::Light), None);
        let line = progress_line(92.5, Theme::Light).unwrap();
        assert!(line.ends_with(" 93%"));
    }

    #[test]
    fn test_preview_card() {
        let preview = PreviewInfo {
            title: "T".into(),
            thumbnail_url: "x".into(),
            duration_seconds: Some(125.0),
            video_qualities: vec![1080, 720],
            audio_formats: vec![],
        };
        let mut selection = SelectionState::default();
        selection.apply_preview(&preview);
        let card = preview_card(&preview, &selection);
        assert!(card.contains("المدة: 2:05 دقيقة"));
        assert!(card.contains("[1080p] 720p"));
    }

    #[test]
    fn test_notice_line() {
        let notice = Notice::DownloadFailed {
            task_id: "t1".into(),
            reason: Some("File not found".into()),
        };
        assert_eq!(notice_line(&notice), "حدث خطأ أثناء التحميل (File not found)");
        assert_eq!(notice_line(&Notice::EmptyReference), "أدخل رابط الفيديو أولاً");
    }
}
