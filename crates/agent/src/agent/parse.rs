//! Parsing of the reasoning model's text replies.
//!
//! Replies follow the `Thought:` / `Action:` / `Action Input:` /
//! `Final Answer:` line format. Markers match case-insensitively at the start
//! of a line, a value continues until the next marker, and anything from an
//! `Observation:` line on is ignored since the model must not invent results.

use insight_core::{AppError, AppResult};

/// What the model decided to do this iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall { tool: String, query: String },
    FinalAnswer(String),
}

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub thought: Option<String>,
    pub decision: Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
}

// "Action Input:" must be tried before "Action:".
const MARKERS: [(&str, Field); 4] = [
    ("Thought:", Field::Thought),
    ("Action Input:", Field::ActionInput),
    ("Action:", Field::Action),
    ("Final Answer:", Field::FinalAnswer),
];

const STOP_MARKER: &str = "Observation:";

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    head.eq_ignore_ascii_case(marker)
        .then(|| &line[marker.len()..])
}

fn match_marker(line: &str) -> Option<(Field, &str)> {
    MARKERS
        .iter()
        .find_map(|(marker, field)| strip_marker(line, marker).map(|rest| (*field, rest)))
}

fn split_fields(reply: &str) -> Vec<(Field, String)> {
    let mut fields: Vec<(Field, String)> = Vec::new();

    for line in reply.lines() {
        let trimmed = line.trim_start().trim_start_matches(|c: char| c == '*' || c == '#').trim_start();
        if strip_marker(trimmed, STOP_MARKER).is_some() {
            break;
        }
        if let Some((field, rest)) = match_marker(trimmed) {
            fields.push((field, rest.trim_start_matches('*').trim().to_string()));
        } else if let Some((_, value)) = fields.last_mut() {
            value.push('\n');
            value.push_str(line);
        }
    }

    for (_, value) in &mut fields {
        *value = value.trim().to_string();
    }
    fields
}

fn clean_query(raw: &str) -> &str {
    raw.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim()
}

/// Parse a reply into a [`Step`].
///
/// Whichever of `Action:` and `Final Answer:` comes first decides. A tool call
/// needs a non-empty `Action Input:` after it; a final answer must not be
/// empty. Anything else is `MalformedResponse`.
pub fn parse_step(reply: &str) -> AppResult<Step> {
    let fields = split_fields(reply);

    let thought = fields
        .iter()
        .find(|(field, value)| *field == Field::Thought && !value.is_empty())
        .map(|(_, value)| value.clone());

    let position = fields
        .iter()
        .position(|(field, _)| matches!(field, Field::Action | Field::FinalAnswer))
        .ok_or_else(|| {
            AppError::MalformedResponse("reply has neither an action nor a final answer".to_string())
        })?;

    let (field, value) = &fields[position];
    let decision = match field {
        Field::FinalAnswer => {
            if value.is_empty() {
                return Err(AppError::MalformedResponse("final answer is empty".to_string()));
            }
            Decision::FinalAnswer(value.clone())
        }
        _ => {
            let tool = value.trim_matches('`').trim().to_string();
            if tool.is_empty() {
                return Err(AppError::MalformedResponse("action names no tool".to_string()));
            }
            let query = fields[position + 1..]
                .iter()
                .find(|(field, _)| *field == Field::ActionInput)
                .map(|(_, value)| clean_query(value))
                .filter(|query| !query.is_empty())
                .ok_or_else(|| {
                    AppError::MalformedResponse(format!("action '{}' has no input", tool))
                })?;
            Decision::ToolCall {
                tool,
                query: query.to_string(),
            }
        }
    };

    Ok(Step { thought, decision })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call() {
        let step = parse_step(
            "Thought: I should look this up\nAction: search_database\nAction Input: \"Acme pricing\"",
        )
        .unwrap();
        assert_eq!(step.thought.as_deref(), Some("I should look this up"));
        assert_eq!(
            step.decision,
            Decision::ToolCall {
                tool: "search_database".to_string(),
                query: "Acme pricing".to_string()
            }
        );
    }

    #[test]
    fn test_parse_multiline_final_answer() {
        let step = parse_step("Thought: I know\nFinal Answer: Acme wants SSO.\nAlso audit logs.").unwrap();
        assert_eq!(
            step.decision,
            Decision::FinalAnswer("Acme wants SSO.\nAlso audit logs.".to_string())
        );
    }

    #[test]
    fn test_invented_observation_is_ignored() {
        let step = parse_step(
            "Action: search_database\nAction Input: budget\nObservation: made up\nFinal Answer: 5k",
        )
        .unwrap();
        assert!(matches!(step.decision, Decision::ToolCall { .. }));
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let step = parse_step("thought: done\n**Final Answer:** yes").unwrap();
        assert_eq!(step.decision, Decision::FinalAnswer("yes".to_string()));
    }

    #[test]
    fn test_action_without_input_is_malformed() {
        let err = parse_step("Thought: hmm\nAction: search_database").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn test_plain_prose_is_malformed() {
        assert!(parse_step("Sure! Acme asked for SSO.").is_err());
        assert!(parse_step("Final Answer:   ").is_err());
    }
}
