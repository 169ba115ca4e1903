//! MIME Type Detection Utilities
//!
//! Image uploads and base64 payloads rarely come with a trustworthy type, so
//! bytes are sniffed first (magic numbers via the `infer` crate) and the file
//! extension is only a fallback.

/// Guess MIME by inspecting bytes (magic numbers)
pub fn guess_mime_from_bytes(bytes: &[u8]) -> Option<String> {
    infer::get(bytes).map(|k| k.mime_type().to_string())
}

/// Guess an image MIME type from a file name or URL extension
pub fn guess_mime_from_path_or_url(path_or_url: &str) -> Option<String> {
    let extension = path_or_url
        .rsplit('.')
        .next()?
        .split('?')
        .next()?
        .to_lowercase();

    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Combined guess: prefer bytes, fall back to extension, otherwise octet-stream
pub fn guess_mime(bytes: Option<&[u8]>, path_or_url: Option<&str>) -> String {
    if let Some(b) = bytes
        && let Some(m) = guess_mime_from_bytes(b)
    {
        return m;
    }
    if let Some(p) = path_or_url
        && let Some(m) = guess_mime_from_path_or_url(p)
    {
        return m;
    }
    "application/octet-stream".to_string()
}

/// File extension used when naming multipart parts.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// MIME type of a base64 image payload, sniffed from its first bytes.
pub fn guess_mime_from_base64(data: &str) -> String {
    use base64::Engine;
    // 16 base64 chars decode to 12 bytes, enough for every signature we care about.
    let head: String = data.chars().take(16).collect();
    base64::engine::general_purpose::STANDARD
        .decode(head.as_bytes())
        .ok()
        .and_then(|bytes| guess_mime_from_bytes(&bytes))
        .unwrap_or_else(|| "image/png".to_string())
}
