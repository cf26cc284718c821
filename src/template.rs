use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

pub struct TemplateEngine;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

impl TemplateEngine {
    // Templates embedded at compile time
    const STANDALONE_QUESTION_PROMPT: &'static str = include_str!("../templates/standalone_question.txt");
    const QA_PROMPT: &'static str = include_str!("../templates/qa.txt");

    /// Replaces every `{{KEY}}` with its value in a single pass, so values that
    /// themselves contain placeholders are left untouched. Unknown keys stay as-is.
    #[must_use]
    pub fn render(
        template: &str,
        variables: &HashMap<&str, &str>,
    ) -> String {
        let placeholder = PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([A-Z_]+)\}\}").unwrap());

        placeholder
            .replace_all(template, |caps: &Captures<'_>| {
                variables
                    .get(&caps[1])
                    .map_or_else(|| caps[0].to_string(), |value| (*value).to_string())
            })
            .into_owned()
    }

    /// Render the prompt that turns a follow-up into a standalone question.
    #[must_use]
    pub fn render_standalone_question_prompt(
        chat_history: &str,
        question: &str,
    ) -> String {
        let mut variables = HashMap::new();
        variables.insert("CHAT_HISTORY", chat_history);
        variables.insert("QUESTION", question);

        Self::render(Self::STANDALONE_QUESTION_PROMPT, &variables)
    }

    /// Render the answer prompt with the retrieved context.
    #[must_use]
    pub fn render_qa_prompt(
        context: &str,
        question: &str,
    ) -> String {
        let mut variables = HashMap::new();
        variables.insert("CONTEXT", context);
        variables.insert("QUESTION", question);

        Self::render(Self::QA_PROMPT, &variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_prompt_contains_history_and_question() {
        let prompt = TemplateEngine::render_standalone_question_prompt("Human: Hi\nAssistant: Hello", "What about yesterday?");
        assert!(prompt.contains("Chat History:\nHuman: Hi\nAssistant: Hello\n"));
        assert!(prompt.contains("Follow-Up Question: What about yesterday?"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_qa_prompt() {
        let prompt = TemplateEngine::render_qa_prompt("chunk one\n\nchunk two", "What is Rust?");
        assert!(prompt.contains("chunk one\n\nchunk two"));
        assert!(prompt.contains("Question: What is Rust?"));
        assert!(prompt.contains("clearly state that you do not know the answer"));
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let prompt = TemplateEngine::render_qa_prompt("literal {{QUESTION}} in a document", "real question");
        assert!(prompt.contains("literal {{QUESTION}} in a document"));
        assert!(prompt.contains("Question: real question"));
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let variables = HashMap::from([("A", "1")]);
        assert_eq!(TemplateEngine::render("{{A}} {{B}}", &variables), "1 {{B}}");
    }
}
