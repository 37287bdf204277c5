//! Output field markers and completion parsing.
//!
//! Completions are asked to lay out their answer as
//! `[[ ## reasoning ## ]]` followed by `[[ ## response ## ]]`.

use crate::types::ParsedCompletion;

pub const REASONING_FIELD: &str = "reasoning";
pub const RESPONSE_FIELD: &str = "response";

const MARKER_OPEN: &str = "[[ ## ";
const MARKER_CLOSE: &str = " ## ]]";

/// Marker line for a named output field.
pub fn field_marker(name: &str) -> String {
    format!("{}{}{}", MARKER_OPEN, name, MARKER_CLOSE)
}

/// Split a completion into its reasoning and response fields.
///
/// Without a response marker the whole trimmed content is the response and
/// reasoning is empty.
pub fn parse_completion(content: &str) -> ParsedCompletion {
    let sections = split_sections(content);

    let find = |name: &str| {
        sections
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, body)| body.trim().to_string())
    };

    match find(RESPONSE_FIELD) {
        Some(response) => ParsedCompletion {
            reasoning: find(REASONING_FIELD).unwrap_or_default(),
            response,
        },
        None => ParsedCompletion {
            reasoning: String::new(),
            response: content.trim().to_string(),
        },
    }
}

/// Collect `(field, body)` pairs in order of appearance. Text before the
/// first marker is dropped.
fn split_sections(content: &str) -> Vec<(&str, &str)> {
    let mut markers = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = content[cursor..].find(MARKER_OPEN) {
        let start = cursor + offset;
        let name_start = start + MARKER_OPEN.len();
        let Some(close) = content[name_start..].find(MARKER_CLOSE) else {
            break;
        };
        let name_end = name_start + close;
        let body_start = name_end + MARKER_CLOSE.len();
        markers.push((start, content[name_start..name_end].trim(), body_start));
        cursor = body_start;
    }

    markers
        .iter()
        .enumerate()
        .map(|(i, (_, name, body_start))| {
            let body_end = markers
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(content.len());
            (*name, &content[*body_start..body_end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_fields() {
        let content = "[[ ## reasoning ## ]]\nThe context lists hours.\n\n[[ ## response ## ]]\nWe are open 9-5.\n\n[[ ## completed ## ]]";
        let parsed = parse_completion(content);
        assert_eq!(parsed.reasoning, "The context lists hours.");
        assert_eq!(parsed.response, "We are open 9-5.");
    }

    #[test]
    fn test_parse_without_markers() {
        let parsed = parse_completion("  Plain answer.\n");
        assert_eq!(parsed.reasoning, "");
        assert_eq!(parsed.response, "Plain answer.");
    }

    #[test]
    fn test_parse_response_only() {
        let parsed = parse_completion("preamble [[ ## response ## ]] Short.");
        assert_eq!(parsed.reasoning, "");
        assert_eq!(parsed.response, "Short.");
    }

    #[test]
    fn test_unterminated_marker_ignored() {
        let parsed = parse_completion("[[ ## reasoning without close");
        assert_eq!(parsed.response, "[[ ## reasoning without close");
    }

    #[test]
    fn test_field_marker_format() {
        assert_eq!(field_marker(RESPONSE_FIELD), "[[ ## response ## ]]");
    }
}
