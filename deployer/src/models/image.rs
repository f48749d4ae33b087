//! Container image reference helpers

/// Replace the tag of an image reference.
///
/// A registry `host:port` prefix is not mistaken for a tag, and any digest
/// (`@sha256:...`) is dropped since it would pin the old image.
pub fn with_tag(image: &str, tag: &str) -> String {
    let image = image.split('@').next().unwrap_or(image);
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    let repository = match image[name_start..].rfind(':') {
        Some(i) => &image[..name_start + i],
        None => image,
    };
    format!("{}:{}", repository, tag)
}
