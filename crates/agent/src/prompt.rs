//! System prompt assembly.

use codeact_core::error::ConfigurationError;
use codeact_core::message::Message;

/// Substitution point for the rendered tool stubs.
pub const TOOL_DESCRIPTIONS_PLACEHOLDER: &str = "{tool_descriptions}";

/// The default code-act instructions.
pub const DEFAULT_CODE_ACT_PROMPT: &str = r#"You are a helpful AI assistant that can write and execute Python code to solve problems.

You will be given a task to perform. You should output:
- Python code wrapped in <execute>...</execute> tags that provides the solution to the task, or a step towards the solution. Any output you want to extract from the code should be printed to the console.
- Text to be shown directly to the user, if you want to ask for more information or provide the final answer.
- If the previous code execution can be used to respond to the user, then respond directly (typically you want to avoid mentioning anything related to the code execution in your response).

## Response Format:
Example of proper code format:
<execute>
import math

def calculate_area(radius):
    return math.pi * radius**2

# Calculate the area for radius = 5
area = calculate_area(5)
print(f"The area of the circle is {area:.2f} square units")
</execute>

In addition to the Python Standard Library and any functions you have already written, you can use the following functions:
{tool_descriptions}

Variables defined at the top level of previous code snippets can be also be referenced in your code.

## Final Answer Guidelines:
- When providing a final answer, focus on directly answering the user's question
- Avoid referencing the code you generated unless specifically asked
- Present the results clearly and concisely as if you computed them directly
- If relevant, you can briefly mention general methods used, but don't include code snippets in the final answer
- Structure your response like you're directly answering the user's query, not explaining how you solved it

Reminder: Always place your Python code between <execute>...</execute> tags when you want to run code. You can include explanations and other content outside these tags.
"#;

/// A code-act prompt template with exactly one tool-description slot.
///
/// Other braces in the template are literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Build a template, appending `extra` on its own line when given.
    pub fn new(template: impl Into<String>, extra: Option<&str>) -> Result<Self, ConfigurationError> {
        let mut template = template.into();
        if let Some(extra) = extra.filter(|e| !e.is_empty()) {
            template.push('\n');
            template.push_str(extra);
        }

        match template.matches(TOOL_DESCRIPTIONS_PLACEHOLDER).count() {
            1 => Ok(Self { template }),
            0 => Err(ConfigurationError::InvalidTemplate {
                reason: format!("missing {TOOL_DESCRIPTIONS_PLACEHOLDER} placeholder"),
            }),
            n => Err(ConfigurationError::InvalidTemplate {
                reason: format!("{TOOL_DESCRIPTIONS_PLACEHOLDER} appears {n} times, expected once"),
            }),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute the rendered tool stubs.
    pub fn format(&self, tool_descriptions: &str) -> String {
        self.template
            .replacen(TOOL_DESCRIPTIONS_PLACEHOLDER, tool_descriptions, 1)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_CODE_ACT_PROMPT.to_string(),
        }
    }
}

/// Make `system_prompt` the one system message of `input`.
///
/// The first system message is replaced in place; without one, the prompt
/// is inserted at the head. Later system messages are dropped.
pub fn install_system_message(input: &mut Vec<Message>, system_prompt: &str) {
    match input.iter().position(Message::is_system) {
        Some(first) => {
            input[first] = Message::system(system_prompt);
            let mut index = 0;
            input.retain(|m| {
                let keep = index == first || !m.is_system();
                index += 1;
                keep
            });
        }
        None => input.insert(0, Message::system(system_prompt)),
    }
}
