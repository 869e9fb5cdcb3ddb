//! Follow-up questions marker embedded at the end of model replies:
//! `<!--QUESTIONS:["...", "...", "..."]-->`

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

const MARKER_OPEN: &str = "<!--QUESTIONS:";

/// Matches a marker that runs to the end of the reply
static QUESTIONS_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^<!--QUESTIONS:(.*)-->\s*$").expect("questions marker pattern is valid")
});

/// Split a finished reply into display content and suggested questions.
///
/// A well-formed trailing marker is removed and its JSON array returned.
/// Only the last marker counts; earlier mentions are ordinary text.
/// A malformed payload is logged and the content is returned unchanged.
pub fn extract_suggested_questions(content: &str) -> (String, Option<Vec<String>>) {
    let Some(start) = content.rfind(MARKER_OPEN) else {
        return (content.to_string(), None);
    };
    let Some(payload) = QUESTIONS_MARKER
        .captures(&content[start..])
        .and_then(|caps| caps.get(1))
    else {
        return (content.to_string(), None);
    };

    match serde_json::from_str::<Vec<String>>(payload.as_str().trim()) {
        Ok(questions) => {
            let visible = content[..start].trim_end().to_string();
            (visible, Some(questions))
        }
        Err(e) => {
            warn!(error = %e, "Ignoring malformed questions marker");
            (content.to_string(), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_stripped_and_parsed() {
        let reply = "Plates move.\n\n<!--QUESTIONS:[\"Why?\", \"How?\", \"What if?\"]-->";
        let (content, questions) = extract_suggested_questions(reply);
        assert_eq!(content, "Plates move.");
        assert_eq!(questions.unwrap(), vec!["Why?", "How?", "What if?"]);
    }

    #[test]
    fn test_trailing_whitespace_after_marker() {
        let (content, questions) =
            extract_suggested_questions("Answer <!--QUESTIONS:[\"a\"]-->\n  ");
        assert_eq!(content, "Answer");
        assert_eq!(questions.unwrap().len(), 1);
    }

    #[test]
    fn test_no_marker() {
        let (content, questions) = extract_suggested_questions("Just text");
        assert_eq!(content, "Just text");
        assert!(questions.is_none());
    }

    #[test]
    fn test_malformed_marker_kept() {
        let reply = "Text <!--QUESTIONS:[\"unterminated]-->";
        let (content, questions) = extract_suggested_questions(reply);
        assert_eq!(content, reply);
        assert!(questions.is_none());
    }

    #[test]
    fn test_earlier_mention_does_not_hide_trailing_marker() {
        let reply = "Use <!--QUESTIONS:x--> as the marker.\n<!--QUESTIONS:[\"a\",\"b\",\"c\"]-->";
        let (content, questions) = extract_suggested_questions(reply);
        assert_eq!(content, "Use <!--QUESTIONS:x--> as the marker.");
        assert_eq!(questions.unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_marker_not_at_end_is_ignored() {
        let reply = "<!--QUESTIONS:[\"a\"]--> and more text";
        let (content, questions) = extract_suggested_questions(reply);
        assert_eq!(content, reply);
        assert!(questions.is_none());
    }
}
