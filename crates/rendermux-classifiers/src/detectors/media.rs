//! Images, video, audio and documents referenced by URL or path

use crate::rules::{RuleContext, RuleMatch};
use rendermux_core::Category;
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "ico", "avif", "tif", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi", "m4v", "ogv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "flac", "m4a", "aac", "opus"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "epub", "rtf",
];

const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "vimeo.com", "dailymotion.com"];
const AUDIO_HOSTS: &[&str] = &["soundcloud.com", "open.spotify.com", "music.apple.com"];
const IMAGE_HOSTS: &[&str] = &["i.imgur.com", "images.unsplash.com"];

/// Media category for a file extension
pub fn category_for_extension(ext: &str) -> Option<Category> {
    let ext = ext.to_ascii_lowercase();
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(Category::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(Category::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(Category::Audio)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(Category::Document)
    } else {
        None
    }
}

fn category_for_host(host: &str) -> Option<Category> {
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    if VIDEO_HOSTS.contains(&host) {
        Some(Category::Video)
    } else if AUDIO_HOSTS.contains(&host) {
        Some(Category::Audio)
    } else if IMAGE_HOSTS.contains(&host) {
        Some(Category::Image)
    } else {
        None
    }
}

/// Extension of the last path segment, ignoring query and fragment
fn extension(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

fn mime_for(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

fn youtube_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        _ => None,
    }
}

/// Classify a URL or path reference
fn classify_reference(reference: &str) -> Option<(Category, MediaInfo)> {
    if let Some(rest) = reference.strip_prefix("data:") {
        let mime = rest.split([';', ',']).next()?;
        let category = match mime.split('/').next()? {
            "image" => Category::Image,
            "video" => Category::Video,
            "audio" => Category::Audio,
            _ if mime == "application/pdf" => Category::Document,
            _ => return None,
        };
        return Some((
            category,
            MediaInfo {
                source: "data_uri",
                mime: Some(mime.to_string()),
                ..Default::default()
            },
        ));
    }

    match Url::parse(reference) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => {
            let host = url.host_str().map(str::to_string);

            if let Some(category) = extension(url.path()).and_then(category_for_extension) {
                return Some((
                    category,
                    MediaInfo {
                        source: "extension",
                        extension: extension(url.path()).map(str::to_ascii_lowercase),
                        mime: mime_for(url.path()),
                        host,
                        ..Default::default()
                    },
                ));
            }

            let category = host.as_deref().and_then(category_for_host)?;
            Some((
                category,
                MediaInfo {
                    source: "host",
                    video_id: youtube_id(&url),
                    host,
                    ..Default::default()
                },
            ))
        }
        Ok(_) => None,
        // Relative paths such as `./assets/logo.png`
        Err(_) => {
            let ext = extension(reference)?;
            let category = category_for_extension(ext)?;
            Some((
                category,
                MediaInfo {
                    source: "extension",
                    extension: Some(ext.to_ascii_lowercase()),
                    mime: mime_for(reference),
                    ..Default::default()
                },
            ))
        }
    }
}

#[derive(Default)]
struct MediaInfo {
    source: &'static str,
    extension: Option<String>,
    mime: Option<String>,
    host: Option<String>,
    video_id: Option<String>,
}

impl MediaInfo {
    fn apply(self, mut matched: RuleMatch) -> RuleMatch {
        matched = matched.with_meta("source", self.source);
        for (key, value) in [
            ("extension", self.extension),
            ("mime", self.mime),
            ("host", self.host),
            ("video_id", self.video_id),
        ] {
            if let Some(value) = value {
                matched = matched.with_meta(key, value);
            }
        }
        matched
    }
}

/// Rule: a Markdown image reference `![alt](url "title")`
pub fn media_markdown(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    let caps = ctx.patterns.media_markdown.captures(ctx.text)?;
    let whole = caps.get(0)?;
    let alt = caps.get(1).map_or("", |m| m.as_str());
    let url = caps.get(2)?.as_str();

    // Markdown image syntax always means a picture unless the target says otherwise
    let (category, meta) = classify_reference(url).unwrap_or((
        Category::Image,
        MediaInfo {
            source: "markdown",
            mime: mime_for(url),
            ..Default::default()
        },
    ));

    let mut matched = RuleMatch::spanning(category, 0.95, whole.range())
        .with_meta("url", url)
        .with_meta("alt", alt);
    if let Some(title) = caps.get(3) {
        matched = matched.with_meta("title", title.as_str());
    }

    Some(meta.apply(matched))
}

/// Rule: the sample is a single media URL, data URI or path
pub fn media_url(ctx: &RuleContext<'_>) -> Option<RuleMatch> {
    if ctx.text.contains(char::is_whitespace) {
        return None;
    }

    let (category, meta) = classify_reference(ctx.text)?;
    let matched = RuleMatch::whole(category, 0.95, ctx.text);
    let matched = if meta.source == "data_uri" {
        matched
    } else {
        matched.with_meta("url", ctx.text)
    };

    Some(meta.apply(matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::with_ctx;

    #[test]
    fn test_markdown_image() {
        let text = "![a cat](https://example.com/cat.png \"Cat\")";
        let m = with_ctx(text, media_markdown).unwrap();
        assert_eq!(m.category, Category::Image);
        assert!(m.spans_whole(text.len()));
        assert_eq!(m.metadata["alt"], "a cat");
        assert_eq!(m.metadata["title"], "Cat");
        assert_eq!(m.metadata["mime"], "image/png");
    }

    #[test]
    fn test_markdown_video_target() {
        let m = with_ctx("![clip](clip.mp4)", media_markdown).unwrap();
        assert_eq!(m.category, Category::Video);
    }

    #[test]
    fn test_embedded_markdown_image() {
        let text = "Look: ![x](x.png) nice";
        assert!(!with_ctx(text, media_markdown).unwrap().spans_whole(text.len()));
    }

    #[test]
    fn test_url_by_extension() {
        let m = with_ctx("https://cdn.example.com/song.MP3?dl=1", media_url).unwrap();
        assert_eq!(m.category, Category::Audio);
        assert_eq!(m.metadata["extension"], "mp3");
        assert_eq!(m.metadata["host"], "cdn.example.com");
    }

    #[test]
    fn test_url_by_host() {
        let m = with_ctx("https://www.youtube.com/watch?v=dQw4w9WgXcQ", media_url).unwrap();
        assert_eq!(m.category, Category::Video);
        assert_eq!(m.metadata["source"], "host");
        assert_eq!(m.metadata["video_id"], "dQw4w9WgXcQ");
    }

    #[test]
    fn test_document() {
        let m = with_ctx("https://example.com/report.pdf", media_url).unwrap();
        assert_eq!(m.category, Category::Document);
        assert_eq!(m.metadata["mime"], "application/pdf");
    }

    #[test]
    fn test_data_uri() {
        let m = with_ctx("data:image/png;base64,iVBORw0KGgo=", media_url).unwrap();
        assert_eq!(m.category, Category::Image);
        assert_eq!(m.metadata["mime"], "image/png");
        assert!(m.metadata.get("url").is_none());
    }

    #[test]
    fn test_plain_page_is_not_media() {
        assert!(with_ctx("https://example.com/about", media_url).is_none());
        assert!(with_ctx("see cat.png", media_url).is_none());
        assert!(with_ctx("v1.2", media_url).is_none());
    }
}
