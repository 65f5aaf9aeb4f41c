//! Prompt templates for the assistant tasks.

use serde_json::{json, Value};

use crate::workspace::Language;

pub fn generate_prompt(request: &str, language: Language) -> String {
    format!(
        "Act as a senior software engineer. Generate high-quality, professional code for the following request in {}.\n\
         If the request is for a web app, provide HTML, CSS, and JS combined into a single HTML structure if possible, or separate blocks.\n\
         Request: {}",
        language.id(),
        request
    )
}

pub fn debug_prompt(code: &str, language: Language) -> String {
    format!(
        "Debug the following {} code. Identify errors, explain them, and provide the fixed code.\n\
         Code:\n\
         {}",
        language.id(),
        code
    )
}

pub fn interpret_prompt(transcript: &str) -> String {
    format!(
        "The user said: \"{}\".\n\
         Interpret this as a coding command.\n\
         If they want to build something, describe what to build.\n\
         If they want to fix something, explain the fix.\n\
         Return a JSON object with:\n\
         {{\n  \
           \"intent\": \"build\" | \"fix\" | \"other\",\n  \
           \"description\": \"clear description of the task\",\n  \
           \"suggestedLanguage\": \"javascript\" | \"python\" | \"html\" | etc\n\
         }}",
        transcript
    )
}

/// Response schema for voice command interpretation, in Gemini's OpenAPI
/// subset.
pub fn voice_command_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "intent": { "type": "STRING" },
            "description": { "type": "STRING" },
            "suggestedLanguage": { "type": "STRING" }
        },
        "required": ["intent", "description", "suggestedLanguage"]
    })
}
