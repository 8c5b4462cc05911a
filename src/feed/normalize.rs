//! Field normalization for heterogeneous feed metadata.
//!
//! Feed dialects disagree on the shape of artwork, duration and date fields.
//! The parser captures each field as it arrives and the functions here turn
//! those shapes into the canonical episode representation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// One image-bearing field as it appeared in the source document.
///
/// `<itunes:image href="..."/>` arrives as `Structured { href }`,
/// `<image><url>...</url></image>` as `Structured { url }`, and bare text
/// content as `Text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArtworkField {
    #[default]
    Absent,
    Text(String),
    Structured {
        href: Option<String>,
        url: Option<String>,
    },
}

impl ArtworkField {
    fn text(&self) -> Option<&str> {
        match self {
            ArtworkField::Text(s) => non_empty(s),
            _ => None,
        }
    }

    fn href(&self) -> Option<&str> {
        match self {
            ArtworkField::Structured { href, .. } => href.as_deref().and_then(non_empty),
            _ => None,
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            ArtworkField::Structured { url, .. } => url.as_deref().and_then(non_empty),
            _ => None,
        }
    }
}

/// The artwork-bearing fields of a feed root or an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artwork {
    /// `itunes:image`
    pub itunes_image: ArtworkField,
    /// `image` (RSS channel image, media thumbnail, Atom logo)
    pub image: ArtworkField,
}

/// Resolves the artwork URL of a feed or entry.
///
/// Precedence: `itunes:image` href, `itunes:image` text, `image` text,
/// `image` url. Empty values count as absent.
pub fn extract_artwork(artwork: &Artwork) -> Option<String> {
    artwork
        .itunes_image
        .href()
        .or_else(|| artwork.itunes_image.text())
        .or_else(|| artwork.image.text())
        .or_else(|| artwork.image.url())
        .map(str::to_string)
}

/// Normalizes a raw duration into a total-seconds string.
///
/// Purely numeric input is already seconds and is returned as-is. Anything
/// else is read as `[[HH:]MM:]SS` from the right; a segment that does not
/// start with a digit counts as 0.
///
/// # Examples
///
/// ```
/// use podshelf::feed::normalize_duration;
///
/// assert_eq!(normalize_duration(Some("1:02:03")).as_deref(), Some("3723"));
/// assert_eq!(normalize_duration(Some("45")).as_deref(), Some("45"));
/// assert_eq!(normalize_duration(Some("")), None);
/// ```
pub fn normalize_duration(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(raw.to_string());
    }

    let mut segments = raw.rsplit(':').map(leading_integer);
    let secs = segments.next().unwrap_or(0);
    let mins = segments.next().unwrap_or(0);
    let hours = segments.next().unwrap_or(0);

    let total = hours
        .saturating_mul(3600)
        .saturating_add(mins.saturating_mul(60))
        .saturating_add(secs);
    Some(total.to_string())
}

/// Reads the run of ASCII digits at the start of a segment, 0 if there is none.
fn leading_integer(segment: &str) -> u64 {
    let segment = segment.trim();
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment[..end].parse().unwrap_or(0)
}

/// Renders seconds as a clock: `H:MM:SS`, or `M:SS` under an hour.
///
/// Zero renders as an empty string.
pub fn format_duration_long(seconds: u64) -> String {
    if seconds == 0 {
        return String::new();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Renders seconds compactly: `Hh Mm`, or `Mm` under an hour.
///
/// Zero renders as an empty string.
pub fn format_duration_short(seconds: u64) -> String {
    if seconds == 0 {
        return String::new();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Parses a stored duration string back into seconds.
///
/// Stored durations are produced by [`normalize_duration`], so anything that
/// is not a plain integer is treated as unknown.
pub fn duration_seconds(stored: Option<&str>) -> Option<u64> {
    stored.and_then(|s| s.trim().parse().ok())
}

/// Picks the publish date to store for an entry.
///
/// Entries without a date are stamped with the ingest time (RFC 3339,
/// millisecond precision). This fabricates a date, which moves undated
/// entries to the top of the newest-first listing.
pub fn resolve_publish_date(raw: Option<&str>, now: DateTime<Utc>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(date) => date.to_string(),
        None => now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Picks the episode description: the first non-empty of rich content,
/// content snippet and summary, else an empty string.
pub fn resolve_description(
    content: Option<&str>,
    snippet: Option<&str>,
    summary: Option<&str>,
) -> String {
    [content, snippet, summary]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Best-effort interpretation of a textual publish date.
///
/// Accepts RFC 2822 (RSS), RFC 3339 (Atom, ISO timestamps), naive
/// `YYYY-MM-DD[ HH:MM:SS]` forms read as UTC. Returns `None` for anything else.
pub fn parse_publish_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
