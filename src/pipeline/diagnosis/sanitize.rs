// Sanitize patient-entered free text before it is embedded in a prompt.
// Strips invisible Unicode and instruction-override lines, flattens
// whitespace and caps the length.

use std::sync::LazyLock;

use regex::Regex;

/// Longest free-text fragment embedded in a prompt (characters).
const MAX_FIELD_LENGTH: usize = 2_000;

/// Lines that speak as a chat role or try to replace the analysis
/// instructions. Ordinary clinical wording must not match.
static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Role markers at the start of a line
        r"(?i)^(?:system|assistant|user|instructions|note\s+to\s+ai)\s*:",
        r"(?i)^</?system\b",
        r"<<SYS>>",
        r"(?i)\[INST\]",
        r"<\|im_(?:start|end)\|>",
        // Instruction overrides
        r"(?i)\bignore\s+(?:all\s+)?(?:previous|prior|above|the\s+above|earlier)\s+(?:instructions?|rules?|prompts?)",
        r"(?i)\bignore\s+all\s+instructions?\b",
        r"(?i)\b(?:disregard|forget)\s+(?:all\s+|your\s+|the\s+)?(?:previous\s+|prior\s+)?(?:instructions?|rules?|prompts?)\b",
        r"(?i)\bnew\s+instructions?\s*:",
        r"(?i)\byou\s+are\s+now\s+(?:a|an)\s+",
        r"(?i)\b(?:DAN|do\s+anything\s+now)\s+mode\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Clean one patient field for prompt use. Never logs the content.
pub fn sanitize_patient_text(raw: &str) -> String {
    let visible: String = raw.chars().filter(|c| !is_invisible(*c)).collect();

    let mut removed = 0usize;
    let kept: Vec<&str> = visible
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let suspicious = INJECTION_PATTERNS.iter().any(|p| p.is_match(line));
            if suspicious {
                removed += 1;
            }
            !suspicious
        })
        .collect();

    if removed > 0 {
        tracing::warn!(removed_lines = removed, "Instruction-like lines removed from patient text");
    }

    let joined = kept
        .join("; ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&joined, MAX_FIELD_LENGTH)
}

/// Zero-width, bidi-control and other non-whitespace control characters.
fn is_invisible(c: char) -> bool {
    if matches!(c, ' ' | '\n' | '\t' | '\r') {
        return false;
    }
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    ) || c.is_control()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => {
            let head = &text[..cut];
            // Prefer a word boundary when one is reasonably close.
            match head.rfind(' ') {
                Some(space) if space > cut / 2 => head[..space].to_string(),
                _ => head.to_string(),
            }
        }
    }
}
