use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// The JSON inside a fenced code block, or the whole text when unfenced.
pub fn json_payload(content: &str) -> &str {
    let fenced = [r"```json\s*([\s\S]*?)\s*```", r"```\s*([\s\S]*?)\s*```"];

    fenced
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .find_map(|re| re.captures(content).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
        .unwrap_or(content)
        .trim()
}

pub fn parse<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(serde_json::from_str(json_payload(content))?)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn json_fence_is_stripped() {
        let content = "Here you go:\n```json\n{\"estimatedValue\": 45}\n```\nThanks";
        assert_eq!(json_payload(content), r#"{"estimatedValue": 45}"#);
    }

    #[test]
    fn bare_fence_is_stripped() {
        let content = "```\n{\"error\": \"Could not identify item.\"}\n```";
        let value: Value = parse(content).unwrap();
        assert_eq!(value["error"], "Could not identify item.");
    }

    #[test]
    fn unfenced_text_is_parsed_as_is() {
        let value: Value = parse("  {\"recommendation\": \"sell\"}  ").unwrap();
        assert_eq!(value["recommendation"], "sell");
    }

    #[test]
    fn prose_is_a_parse_error() {
        assert!(parse::<Value>("I think it is worth about $40.").is_err());
    }
}
