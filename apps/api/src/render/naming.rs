//! Output file naming.

const FALLBACK_NAME: &str = "resume";

/// Lowercases `name`, strips everything except ASCII letters, digits, whitespace and
/// hyphens, then collapses whitespace runs into single hyphens. Falls back to `resume`
/// when nothing is left.
pub fn sanitize_file_name(name: Option<&str>) -> String {
    let lowered = name.unwrap_or_default().trim().to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    let slug = kept.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug
    }
}

pub fn pdf_file_name(name: Option<&str>) -> String {
    format!("{}.pdf", sanitize_file_name(name))
}
