//! System prompt for the support assistant.
//!
//! The built-in customer-service prompt always comes first. System messages
//! sent by the client are appended after it as additional sections.

/// The KDEI Taipei customer-service prompt.
pub const SUPPORT_SYSTEM_PROMPT: &str = "You're a KDEI Taipei customer service agent. You MUST ALWAYS use the tool for EVERY user message before providing any response.

    website to search: https://kdei-taipei.org

    RESPONSE RULES:
    - Base ALL answers on retrieved information from tool when available
    - If relevant info found: Provide comprehensive, helpful response using that data
    - If no relevant info after all attempts: \"I don't have specific information about that in our database, but I'm happy to help with other KDEI Taipei questions.\"
    - Make sure to retrieve as much as you can
    - Always acknowledge what you found (or didn't find) in the database
    - Keep responses concise, casual, and use markdown formatting
    - Match the user's language (Indonesian/English/Chinese)

    CRITICAL: You cannot provide any response without first attempting to retrieve information from the tool.";

/// Builder for the system prompt sent with every model step.
///
/// Sections are joined with double newlines; blank sections are skipped.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    base: String,
    sections: Vec<String>,
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPromptBuilder {
    /// Start from the built-in support prompt.
    pub fn new() -> Self {
        Self::with_base(SUPPORT_SYSTEM_PROMPT)
    }

    /// Start from a custom base prompt.
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            sections: Vec::new(),
        }
    }

    /// Append one section.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.sections.push(section.into());
        self
    }

    /// Append client-supplied system instructions, in order.
    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.extend(sections.into_iter().map(Into::into));
        self
    }

    pub fn build(&self) -> String {
        std::iter::once(self.base.as_str())
            .chain(self.sections.iter().map(String::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
