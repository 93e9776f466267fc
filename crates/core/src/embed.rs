//! Rewrites video-hosting page links into their embeddable form.

use url::Url;

const RUTUBE_EMBED: &str = "https://rutube.ru/play/embed/";
const YOUTUBE_EMBED: &str = "https://www.youtube.com/embed/";

/// Returns the embed URL for a Rutube or YouTube page link.
///
/// Embed links and anything unrecognised come back unchanged.
#[must_use]
pub fn canonical_embed_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };
    let host = url.host_str().unwrap_or_default().trim_start_matches("www.");

    let video_id = match host {
        "rutube.ru" => rutube_id(&url),
        "youtube.com" | "m.youtube.com" => youtube_watch_id(&url),
        "youtu.be" => first_segment(&url),
        _ => None,
    };

    match (host, video_id) {
        ("rutube.ru", Some(id)) => format!("{RUTUBE_EMBED}{id}"),
        (_, Some(id)) => format!("{YOUTUBE_EMBED}{id}"),
        (_, None) => trimmed.to_owned(),
    }
}

fn rutube_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    match segments.next()? {
        "video" => segments
            .next()
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(ToOwned::to_owned),
        _ => None,
    }
}

fn youtube_watch_id(url: &Url) -> Option<String> {
    if url.path() != "/watch" {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

fn first_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .next()
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rutube_page_becomes_embed() {
        assert_eq!(
            canonical_embed_url("https://rutube.ru/video/abc123/?t=10"),
            "https://rutube.ru/play/embed/abc123"
        );
    }

    #[test]
    fn rutube_embed_is_left_alone() {
        let url = "https://rutube.ru/play/embed/abc123";
        assert_eq!(canonical_embed_url(url), url);
    }

    #[test]
    fn youtube_watch_and_short_links_become_embed() {
        assert_eq!(
            canonical_embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            "https://www.youtube.com/embed/dQw4w9WgXcQ"
        );
        assert_eq!(
            canonical_embed_url("https://youtu.be/dQw4w9WgXcQ"),
            "https://www.youtube.com/embed/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn unknown_links_pass_through() {
        assert_eq!(
            canonical_embed_url(" /uploads/videos/lesson.mp4 "),
            "/uploads/videos/lesson.mp4"
        );
        assert_eq!(
            canonical_embed_url("https://example.com/video/1"),
            "https://example.com/video/1"
        );
    }
}
