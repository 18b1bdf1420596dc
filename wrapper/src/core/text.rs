//! Normalization of model-produced and human-pasted text.

/// Marker line in `transcript.txt` below which the assistant output is pasted.
pub const TRANSCRIPT_MARKER: &str = "[PASTE ASSISTANT OUTPUT BELOW THIS LINE]";

/// Strip one enclosing Markdown code fence, if present.
///
/// Models routinely wrap "no markdown" output in ```yaml fences anyway; the
/// contract check happens after this normalization.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|line| line.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Content pasted below the transcript marker, or `None` when the marker is
/// missing or nothing was pasted.
pub fn pasted_transcript(contents: &str) -> Option<String> {
    let (_, below) = contents.split_once(TRANSCRIPT_MARKER)?;
    let pasted = below.trim();
    if pasted.is_empty() {
        None
    } else {
        Some(pasted.to_string())
    }
}

/// Clip text to at most `max_bytes`, respecting char boundaries, appending an
/// ellipsis marker when truncated.
pub fn clip(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// True when the response declares a failing verdict (`VERDICT: FAIL`,
/// case-insensitive substring).
pub fn verdict_failed(response: &str) -> bool {
    response.to_uppercase().contains("VERDICT: FAIL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_language_tag() {
        let fenced = "```yaml\nstep_id: x\n```";
        assert_eq!(strip_code_fences(fenced), "step_id: x");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  step_id: x \n"), "step_id: x");
    }

    #[test]
    fn strips_unclosed_fence() {
        assert_eq!(strip_code_fences("```\nbody"), "body");
    }

    #[test]
    fn transcript_requires_content_below_marker() {
        let empty = format!("header\n{TRANSCRIPT_MARKER}\n\n");
        assert_eq!(pasted_transcript(&empty), None);

        let pasted = format!("header\n{TRANSCRIPT_MARKER}\nanalysis text\n");
        assert_eq!(pasted_transcript(&pasted).as_deref(), Some("analysis text"));

        assert_eq!(pasted_transcript("no marker here"), None);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "héllo wörld";
        let clipped = clip(text, 3);
        assert!(clipped.ends_with("..."));
        assert!(clipped.len() <= 3 + 3);
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn verdict_detection_is_case_insensitive() {
        assert!(verdict_failed("Verdict: fail\nISSUES: ..."));
        assert!(!verdict_failed("VERDICT: PASS"));
        assert!(!verdict_failed("no verdict at all"));
    }
}
