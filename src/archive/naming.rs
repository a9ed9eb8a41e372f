//! Archive filename derivation.

/// Stem used when a photo has no usable caption.
pub const PHOTO_PLACEHOLDER: &str = "Please caption this photo project";

/// Stem suffix used when a report has no field visit notes.
pub const REPORT_PLACEHOLDER: &str = "Project Report";

/// Longest stem, in characters, written to the archive.
pub const MAX_STEM_CHARS: usize = 150;

fn is_reserved(c: char) -> bool {
    c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Make a caption safe to use as a file stem.
///
/// Each run of control (including newline and carriage return) or reserved
/// characters collapses to a single `-`. The result is trimmed, loses any
/// trailing dots, and is capped at [`MAX_STEM_CHARS`]. An empty result
/// becomes [`PHOTO_PLACEHOLDER`].
pub fn sanitize_stem(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_run = false;
    for c in raw.chars() {
        if is_reserved(c) {
            if !in_run {
                cleaned.push('-');
                in_run = true;
            }
        } else {
            cleaned.push(c);
            in_run = false;
        }
    }

    let capped: String = tidy(&cleaned).chars().take(MAX_STEM_CHARS).collect();
    let result = tidy(&capped);
    if result.is_empty() {
        PHOTO_PLACEHOLDER.to_string()
    } else {
        result.to_string()
    }
}

fn tidy(s: &str) -> &str {
    s.trim().trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Stem for a photo: its caption, or the placeholder.
pub fn photo_stem(caption: Option<&str>) -> String {
    match caption.map(str::trim).filter(|c| !c.is_empty()) {
        Some(caption) => sanitize_stem(caption),
        None => PHOTO_PLACEHOLDER.to_string(),
    }
}

/// Stem for a record's report PDF, e.g. `Project #24-1031, Roof inspection`.
pub fn report_stem(project_number: &str, field_visit_notes: Option<&str>) -> String {
    let notes = field_visit_notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(REPORT_PLACEHOLDER);
    sanitize_stem(&format!("Project #{}, {}", project_number.trim(), notes))
}

/// Join a stem and extension into a filename.
pub fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Insert a copy number before the extension: `photo.jpg` → `photo(2).jpg`.
pub fn numbered(filename: &str, n: u32) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = filename.split_at(dot);
            format!("{}({}){}", stem, n, ext)
        }
        _ => format!("{}({})", filename, n),
    }
}

/// Name of the hidden in-progress sibling used while copying `filename`.
pub fn partial_name(filename: &str) -> String {
    format!(".{}.part", filename)
}
