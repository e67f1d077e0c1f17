//! Composition of the user's question and an optional attached document into
//! the single query text the pipeline receives.

/// Marker placed between the question and the attached text.
pub const ATTACHMENT_MARKER: &str = "[file content]:";

/// Trimmed question, followed by the attachment text when there is any.
///
/// Both parts may be empty; an empty result is still a valid query.
pub fn compose_query(question: &str, attachment: Option<&str>) -> String {
    let mut query = question.trim().to_string();
    if let Some(text) = attachment.filter(|text| !text.trim().is_empty()) {
        query.push_str("\n\n");
        query.push_str(ATTACHMENT_MARKER);
        query.push('\n');
        query.push_str(text);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_only() {
        assert_eq!(compose_query("  What is Rust?\n", None), "What is Rust?");
        assert_eq!(compose_query("What is Rust?", Some("  \n")), "What is Rust?");
    }

    #[test]
    fn attachment_is_appended_after_marker() {
        let query = compose_query("Summarize", Some("line one\nline two"));
        assert_eq!(query, "Summarize\n\n[file content]:\nline one\nline two");
    }

    #[test]
    fn attachment_without_question_keeps_marker() {
        let query = compose_query("", Some("notes"));
        assert_eq!(query, "\n\n[file content]:\nnotes");
    }
}
