// Shared prompt fragments for every model call.
// Each feature module that talks to the model defines its own prompts.rs alongside it.

/// Appended to every prompt whose reply is parsed as a structured decision.
pub const JSON_ONLY_INSTRUCTION: &str = "\
Respond with ONLY a valid JSON object. \
Do NOT use markdown code fences. \
Do NOT include any text outside the JSON object.";
