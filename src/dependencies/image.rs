use regex::Regex;

/// A container image reference split into name, tag and digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    /// `name:tag`; a digest would pin the old content, so it is dropped.
    pub fn with_tag(&self, tag: &str) -> String {
        format!("{}:{}", self.name, tag)
    }
}

/// Splits `name[:tag][@digest]`. The tag is taken from the last colon that
/// is not part of a registry host or the digest.
pub fn split_image(image: &str) -> ImageRef {
    let (reference, digest) = match image.split_once('@') {
        Some((reference, digest)) => (reference, Some(digest.to_string())),
        None => (image, None),
    };

    let last_slash = reference.rfind('/');
    match reference.rfind(':') {
        Some(colon) if last_slash.map_or(true, |slash| colon > slash) => ImageRef {
            name: reference[..colon].to_string(),
            tag: Some(reference[colon + 1..].to_string()),
            digest,
        },
        _ => ImageRef {
            name: reference.to_string(),
            tag: None,
            digest,
        },
    }
}

/// Replaces the first capture group of `pattern`'s match in `text` with
/// `replacement`, leaving everything outside the group as it was.
///
/// Patterns without groups replace the whole match. `None` when the pattern
/// does not match.
pub fn replace_capture(pattern: &Regex, text: &str, replacement: &str) -> Option<String> {
    let caps = pattern.captures(text)?;
    let target = if pattern.captures_len() > 1 {
        caps.get(1)?
    } else {
        caps.get(0)?
    };

    let mut replaced = String::with_capacity(text.len() + replacement.len());
    replaced.push_str(&text[..target.start()]);
    replaced.push_str(replacement);
    replaced.push_str(&text[target.end()..]);
    Some(replaced)
}
