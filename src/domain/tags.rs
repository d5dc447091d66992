//! Tag normalization.
//!
//! Tags are stored as one comma-separated column and handled in memory as an
//! ordered list of distinct, trimmed tokens. Case and order are preserved;
//! alphabetical ordering belongs to tag pickers, not to the model.

/// Storage separator for the `tags` column.
pub const TAG_SEPARATOR: char = ',';

/// Parse the stored comma-separated form.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    normalize_tag_list(std::iter::once(raw))
}

/// Normalize a nullable column value; `None` yields no tags.
pub fn normalize_optional_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(normalize_tags).unwrap_or_default()
}

/// Normalize list input. Elements are split on the storage separator too, so
/// a list always survives a trip through the column unchanged.
pub fn normalize_tag_list<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();

    for tag in tags {
        for token in tag.as_ref().split(TAG_SEPARATOR) {
            let token = token.trim();
            if token.is_empty() || normalized.iter().any(|existing| existing == token) {
                continue;
            }
            normalized.push(token.to_string());
        }
    }

    normalized
}

/// Storage form of a normalized tag list.
pub fn join_tags(tags: &[String]) -> String {
    let separator = TAG_SEPARATOR.to_string();
    tags.join(&separator)
}
