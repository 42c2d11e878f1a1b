//! Theme colors, optionally loaded from a kitty.conf-style colour file
//! (`key #hexcolor` per line) named by `theme_file` in the config.

use ratatui::style::Color;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Theme colors for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,           // Focused borders, highlights
    pub accent_bright: Color,    // Links, secondary highlights
    pub danger: Color,           // Errors, end-of-day alert
    pub success: Color,          // Earned money, loaded states
    pub warning: Color,          // Status messages
    pub text: Color,             // Primary text
    pub text_dim: Color,         // Labels, hints
    pub bg_selected: Color,      // Selection background
    pub inactive: Color,         // Unfocused borders
    pub header: Color,           // Section headers
    pub weekend: Color,          // Calendar weekend days
    pub holiday: Color,          // Calendar holidays
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired fallback
        Self {
            accent: Color::Rgb(250, 179, 135),
            accent_bright: Color::Rgb(245, 194, 231),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(250, 179, 135),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(137, 180, 250),
            weekend: Color::Rgb(249, 226, 175),
            holiday: Color::Rgb(243, 139, 168),
        }
    }
}

impl Theme {
    /// Load theme from a colour file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(theme) = path.and_then(Self::load_color_file) {
            return theme;
        }

        Self::default()
    }

    fn load_color_file(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Could not read theme {}: {}", path.display(), e);
                return None;
            }
        };
        let colors = Self::parse_kitty_conf(&content);

        if colors.is_empty() {
            return None;
        }

        let base = Self::default();
        let pick = |keys: &[&str], fallback: Color| {
            keys.iter()
                .find_map(|k| colors.get(*k))
                .copied()
                .unwrap_or(fallback)
        };

        Some(Self {
            accent: pick(&["color2", "color10"], base.accent),
            accent_bright: pick(&["color10", "color2"], base.accent_bright),
            danger: pick(&["color1"], base.danger),
            success: pick(&["color2"], base.success),
            warning: pick(&["color4", "color12"], base.warning),
            text: pick(&["foreground"], base.text),
            text_dim: pick(&["color8"], base.text_dim),
            bg_selected: pick(&["selection_background", "color0"], base.bg_selected),
            inactive: pick(&["inactive_border_color", "color8"], base.inactive),
            header: pick(&["color4"], base.header),
            weekend: pick(&["color3", "color11"], base.weekend),
            holiday: pick(&["color1", "color9"], base.holiday),
        })
    }

    /// Parse kitty.conf format: `key value` or `key #hexcolor`
    fn parse_kitty_conf(content: &str) -> HashMap<String, Color> {
        let mut colors = HashMap::new();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(char::is_whitespace) {
                if let Some(color) = Self::parse_hex_color(value) {
                    colors.insert(key.trim().to_string(), color);
                }
            }
        }

        colors
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    pub fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Theme::parse_hex_color("#9c27b0"), Some(Color::Rgb(0x9c, 0x27, 0xb0)));
        assert_eq!(Theme::parse_hex_color("fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(Theme::parse_hex_color("#12345"), None);
        assert_eq!(Theme::parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_load_color_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kitty.conf");
        std::fs::write(
            &path,
            "# comment\nforeground #bebebe\ncolor1 #D35F5F\nfont_size 11\n",
        )
        .unwrap();

        let theme = Theme::load(Some(&path));
        assert_eq!(theme.text, Color::Rgb(0xbe, 0xbe, 0xbe));
        assert_eq!(theme.danger, Color::Rgb(0xd3, 0x5f, 0x5f));
        assert_eq!(theme.accent, Theme::default().accent);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let theme = Theme::load(Some(Path::new("/nonexistent/kitty.conf")));
        assert_eq!(theme.text, Theme::default().text);
    }
}
