//! Parses a model's free-form ReAct response into a structured action.
//! Line-oriented, case-insensitive prefix match — tolerant of malformed
//! input by design: a step here must never fail the loop.

use apa_core::types::Action;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub reasoning: String,
    pub action: Action,
    pub reflection: Option<String>,
}

const PREFIXES: &[&str] = &["thought:", "action input:", "action:", "result:"];

/// Splits `text` into `(prefix, body)` pairs for recognized lines, folding
/// any unprefixed continuation lines into the preceding section's body.
fn sectionize(text: &str) -> Vec<(&'static str, String)> {
    let mut sections: Vec<(&'static str, String)> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();
        let matched = PREFIXES.iter().find(|p| lower.starts_with(*p));

        if let Some(prefix) = matched {
            let body = trimmed[prefix.len()..].trim().to_string();
            sections.push((prefix, body));
        } else if let Some((_, last)) = sections.last_mut() {
            if !trimmed.is_empty() {
                if !last.is_empty() {
                    last.push('\n');
                }
                last.push_str(trimmed);
            }
        }
    }

    sections
}

pub fn parse_response(text: &str) -> ParsedResponse {
    let sections = sectionize(text);

    let reasoning = sections
        .iter()
        .find(|(p, _)| *p == "thought:")
        .map(|(_, b)| b.clone())
        .unwrap_or_default();

    let reflection = sections
        .iter()
        .find(|(p, _)| *p == "result:" )
        .and_then(|(p, b)| if *p == "result:" { Some(b.clone()) } else { None });

    let action_type = sections.iter().find(|(p, _)| *p == "action:").map(|(_, b)| b.clone());

    let action = match action_type {
        None => {
            // No Action line at all: synthesize finish, reasoning retained.
            let result = reflection
                .as_ref()
                .and_then(|r| serde_json::from_str::<Value>(r).ok())
                .or_else(|| reflection.clone().map(Value::String))
                .unwrap_or(Value::Null);
            Action::finish(result)
        }
        Some(t) if t.eq_ignore_ascii_case("finish") => {
            let result = sections
                .iter()
                .find(|(p, _)| *p == "result:")
                .map(|(_, b)| b.clone())
                .unwrap_or_default();
            let parsed = serde_json::from_str::<Value>(&result)
                .unwrap_or_else(|_| Value::String(result));
            Action::finish(parsed)
        }
        Some(t) => {
            let raw_input = sections
                .iter()
                .find(|(p, _)| *p == "action input:")
                .map(|(_, b)| b.clone())
                .unwrap_or_default();

            let parameters = if raw_input.is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str::<Value>(&raw_input).unwrap_or_else(|_| {
                    serde_json::json!({ "raw": raw_input })
                })
            };

            Action::new(t, parameters)
        }
    };

    ParsedResponse {
        reasoning,
        action,
        reflection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_action_step() {
        let text = "Thought: I should search\nAction: search\nAction Input: {\"query\": \"rust\"}";
        let parsed = parse_response(text);
        assert_eq!(parsed.reasoning, "I should search");
        assert_eq!(parsed.action.r#type, "search");
        assert_eq!(parsed.action.parameters["query"], "rust");
    }

    #[test]
    fn parses_case_insensitive_prefixes() {
        let text = "THOUGHT: done\nACTION: finish\nRESULT: {\"status\": \"success\"}";
        let parsed = parse_response(text);
        assert!(parsed.action.is_finish());
        assert_eq!(parsed.action.result.unwrap()["status"], "success");
    }

    #[test]
    fn malformed_action_input_falls_back_to_raw() {
        let text = "Thought: hmm\nAction: calculate\nAction Input: not json at all";
        let parsed = parse_response(text);
        assert_eq!(parsed.action.r#type, "calculate");
        assert_eq!(parsed.action.parameters["raw"], "not json at all");
    }

    #[test]
    fn missing_action_synthesizes_finish() {
        let text = "Thought: I think we are already done here";
        let parsed = parse_response(text);
        assert!(parsed.action.is_finish());
        assert_eq!(parsed.reasoning, "I think we are already done here");
    }

    #[test]
    fn finish_with_non_json_result_wraps_as_string() {
        let text = "Thought: wrapping up\nAction: finish\nResult: all done";
        let parsed = parse_response(text);
        assert!(parsed.action.is_finish());
        assert_eq!(parsed.action.result.unwrap(), Value::String("all done".to_string()));
    }

    #[test]
    fn result_section_is_carried_through_as_reflection() {
        let text = "Thought: wrapping up\nAction: finish\nResult: all done";
        let parsed = parse_response(text);
        assert_eq!(parsed.reflection.as_deref(), Some("all done"));
    }
}
