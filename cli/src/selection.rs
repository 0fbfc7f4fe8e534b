/// Local selection state: output type, quality and theme.
///
/// Nothing here is shared with the orchestrator; it only decides what the
/// next download request asks for and how the progress bar looks.
use socialdl_shared::models::{PreviewInfo, TargetType};

/// Quality requested when no preview has suggested one.
pub const DEFAULT_QUALITY: &str = "1080";

/// Light or dark output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// (filled, empty) glyphs of the progress bar.
    pub fn bar_glyphs(&self) -> (char, char) {
        match self {
            Theme::Light => ('=', ' '),
            Theme::Dark => ('█', '░'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub target: TargetType,
    pub quality: String,
    pub theme: Theme,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            target: TargetType::Video,
            quality: DEFAULT_QUALITY.to_string(),
            theme: Theme::Light,
        }
    }
}

impl SelectionState {
    /// A fresh preview selects its first video quality, if it has any.
    pub fn apply_preview(&mut self, preview: &PreviewInfo) {
        if let Some(q) = preview.default_quality() {
            self.quality = q.to_string();
        }
    }

    pub fn set_quality(&mut self, quality: &str) -> Result<(), String> {
        let quality = quality.trim().trim_end_matches('p');
        if quality.is_empty() {
            return Err("quality must not be empty".to_string());
        }
        self.quality = quality.to_string();
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    /// Quality chips for a preview, e.g. `[1080p] 720p 480p`.
    pub fn quality_chips(&self, preview: &PreviewInfo) -> String {
        preview
            .video_qualities
            .iter()
            .map(|q| {
                if q.to_string() == self.quality {
                    format!("[{}p]", q)
                } else {
                    format!("{}p", q)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(qualities: Vec<u32>) -> PreviewInfo {
        PreviewInfo {
            title: "T".into(),
            thumbnail_url: "x".into(),
            duration_seconds: Some(125.0),
            video_qualities: qualities,
            audio_formats: vec![],
        }
    }

    #[test]
    fn test_defaults() {
        let s = SelectionState::default();
        assert_eq!(s.target, TargetType::Video);
        assert_eq!(s.quality, "1080");
        assert_eq!(s.theme, Theme::Light);
    }

    #[test]
    fn test_apply_preview_picks_first_quality() {
        let mut s = SelectionState::default();
        s.apply_preview(&preview(vec![720, 480]));
        assert_eq!(s.quality, "720");

        // No qualities: keep the previous choice.
        s.apply_preview(&preview(vec![]));
        assert_eq!(s.quality, "720");
    }

    #[test]
    fn test_set_quality_and_chips() {
        let mut s = SelectionState::default();
        s.set_quality("720p").unwrap();
        assert_eq!(s.quality, "720");
        assert!(s.set_quality("  ").is_err());
        assert_eq!(s.quality_chips(&preview(vec![1080, 720])), "1080p [720p]");
    }

    #[test]
    fn test_toggle_theme() {
        let mut s = SelectionState::default();
        assert_eq!(s.toggle_theme(), Theme::Dark);
        assert_eq!(s.toggle_theme(), Theme::Light);
    }
}
