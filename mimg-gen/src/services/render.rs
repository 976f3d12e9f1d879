//! Now-playing card rendering
//!
//! Emits an SVG card: blurred accent backdrop, thumbnail panel, track
//! title/author, a progress bar with time labels, and a label badge. All
//! provider-supplied text is XML-escaped before it reaches the markup.

use crate::services::resolver::Track;

const CARD_WIDTH: u32 = 1600;
const CARD_HEIGHT: u32 = 420;

/// Assumed track length when the provider reports none
const FALLBACK_DURATION_SECS: u64 = 240;

const TITLE_MAX_CHARS: usize = 42;
const AUTHOR_MAX_CHARS: usize = 48;

const DEFAULT_LABEL: &str = "MusicImg";

/// Render the now-playing card for a resolved track.
///
/// `progress_seconds` is clamped to `[0, duration]`; `label` replaces the
/// default badge text.
pub fn render_now_playing(track: &Track, progress_seconds: Option<f64>, label: Option<&str>) -> String {
    let duration = track.duration_seconds.unwrap_or(FALLBACK_DURATION_SECS).max(1);
    let current = progress_seconds.unwrap_or(0.0).max(0.0).min(duration as f64);
    let fraction = current / duration as f64;

    let title = escape_xml(&truncate_chars(&track.title, TITLE_MAX_CHARS));
    let author = escape_xml(&truncate_chars(&track.author, AUTHOR_MAX_CHARS));
    let accent = escape_xml(&track.accent_color);
    let thumbnail = escape_xml(&track.thumbnail_url);
    let badge = escape_xml(&truncate_chars(label.unwrap_or(DEFAULT_LABEL), 32));

    // Layout mirrors the card geometry: 300px art panel on the left, text
    // column and progress bar filling the rest
    let album_size = 300;
    let album_x = 80;
    let album_y = (CARD_HEIGHT as i32 - album_size) / 2;
    let text_x = album_x + album_size + 50;
    let text_max_width = CARD_WIDTH as i32 - text_x - 80;
    let center_y = CARD_HEIGHT as i32 / 2;
    let bar_y = center_y + 40;
    let bar_width = (text_max_width as f64 * fraction).round() as i32;

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
  <defs>
    <filter id="backdrop-blur"><feGaussianBlur stdDeviation="28"/></filter>
    <clipPath id="art-clip"><rect x="{ax}" y="{ay}" width="{asz}" height="{asz}" rx="22"/></clipPath>
  </defs>
  <rect width="{w}" height="{h}" fill="#101010"/>
  <image href="{thumbnail}" x="-160" y="-160" width="{bw}" height="{bh}" preserveAspectRatio="xMidYMid slice" filter="url(#backdrop-blur)" opacity="0.6"/>
  <rect width="{w}" height="{h}" fill="rgba(0,0,0,0.55)"/>
  <rect x="40" y="30" width="{cw}" height="{ch}" rx="28" fill="rgba(20,20,20,0.65)"/>
  <image href="{thumbnail}" x="{ax}" y="{ay}" width="{asz}" height="{asz}" preserveAspectRatio="xMidYMid slice" clip-path="url(#art-clip)"/>
  <rect x="{ax}" y="{ay}" width="{asz}" height="{asz}" rx="22" fill="none" stroke="{accent}" stroke-width="4"/>
  <text x="{tx}" y="{title_y}" font-family="sans-serif" font-size="52" font-weight="900" fill="#ffffff">{title}</text>
  <text x="{tx}" y="{author_y}" font-family="sans-serif" font-size="34" font-weight="500" fill="rgba(255,255,255,0.65)">{author}</text>
  <rect x="{tx}" y="{by}" width="{tw}" height="8" rx="6" fill="rgba(255,255,255,0.18)"/>
  <rect x="{tx}" y="{by}" width="{fw}" height="8" rx="6" fill="{accent}"/>
  <text x="{tx}" y="{time_y}" font-family="sans-serif" font-size="22" fill="rgba(255,255,255,0.7)">{current}</text>
  <text x="{time_end_x}" y="{time_y}" font-family="sans-serif" font-size="22" fill="rgba(255,255,255,0.7)" text-anchor="end">{total}</text>
  <text x="{badge_x}" y="{badge_y}" font-family="sans-serif" font-size="20" font-weight="600" fill="rgba(255,255,255,0.65)" text-anchor="end">{badge}</text>
</svg>
"##,
        w = CARD_WIDTH,
        h = CARD_HEIGHT,
        bw = CARD_WIDTH + 320,
        bh = CARD_HEIGHT + 320,
        cw = CARD_WIDTH - 80,
        ch = CARD_HEIGHT - 60,
        ax = album_x,
        ay = album_y,
        asz = album_size,
        tx = text_x,
        tw = text_max_width,
        fw = bar_width,
        title_y = center_y - 30,
        author_y = center_y + 15,
        by = bar_y,
        time_y = bar_y + 37,
        time_end_x = text_x + text_max_width,
        badge_x = CARD_WIDTH as i32 - 70,
        badge_y = CARD_HEIGHT as i32 - 56,
        thumbnail = thumbnail,
        accent = accent,
        title = title,
        author = author,
        current = format_time(current as u64),
        total = format_time(duration),
        badge = badge,
    )
}

/// Escape the five XML-reserved characters
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Truncate to `max` characters, appending an ellipsis when shortened
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Seconds as `m:ss`
fn format_time(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::resolver::TrackSource;

    fn sample_track() -> Track {
        Track {
            title: "Never Gonna Give You Up".to_string(),
            author: "Rick Astley".to_string(),
            duration_seconds: Some(213),
            is_stream: false,
            source: TrackSource::YouTube,
            canonical_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            thumbnail_url: "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string(),
            accent_color: "#ff0033".to_string(),
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<b>&"it's"</b>"#),
            "&lt;b&gt;&amp;&quot;it&#39;s&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactlyten", 10), "exactlyten");
        assert_eq!(truncate_chars("elevenchars", 10), "elevencha…");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(65), "1:05");
        assert_eq!(format_time(213), "3:33");
        assert_eq!(format_time(3600), "60:00");
    }

    #[test]
    fn test_render_contains_track_fields() {
        let svg = render_now_playing(&sample_track(), Some(65.0), None);

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Never Gonna Give You Up"));
        assert!(svg.contains("Rick Astley"));
        assert!(svg.contains("#ff0033"));
        assert!(svg.contains("1:05"));
        assert!(svg.contains("3:33"));
        assert!(svg.contains("MusicImg"));
    }

    #[test]
    fn test_render_escapes_hostile_metadata() {
        let mut track = sample_track();
        track.title = r#"<script>alert("x")</script>"#.to_string();

        let svg = render_now_playing(&track, None, None);
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_render_clamps_progress() {
        let track = sample_track();

        // Past the end: full bar, label clamped to the duration
        let svg = render_now_playing(&track, Some(10_000.0), None);
        assert!(svg.contains(">3:33<"));

        // Negative progress clamps to zero
        let svg = render_now_playing(&track, Some(-5.0), None);
        assert!(svg.contains(">0:00<"));
    }

    #[test]
    fn test_render_custom_label() {
        let svg = render_now_playing(&sample_track(), None, Some("my <bot>"));
        assert!(svg.contains("my &lt;bot&gt;"));
        assert!(!svg.contains("MusicImg"));
    }
}
