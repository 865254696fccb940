// src/summarize/prompt.rs
// Clinical system-prompt composition

/// Assemble the system instruction sent with a summarization call: the
/// configured base prompt, an optional keyword requirement, and the stored
/// example notes (already wrapped in their begin/end markers).
pub fn compose_system_prompt(base: &str, keywords: &str, wrapped_examples: &str) -> String {
    let mut prompt = base.trim_end().to_string();

    let keywords = keywords.trim();
    if !keywords.is_empty() {
        if !prompt.is_empty() {
            prompt.push(' ');
        }
        prompt.push_str(&format!(
            "The summarization must contain the following keywords: {keywords}. \
             If there is no context about a keyword, say \
             \"Tekstis ei leidunud viiteid antud märksõnadele: {keywords}\"."
        ));
    }

    let examples = wrapped_examples.trim();
    if !examples.is_empty() {
        prompt.push('\n');
        prompt.push_str(examples);
    }

    prompt
}
