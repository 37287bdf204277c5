//! Prompt builder for rendering templates and injecting context.

use crate::fields::{field_marker, REASONING_FIELD, RESPONSE_FIELD};
use crate::types::{BuiltPrompt, BuiltPromptMetadata, Demo, PromptInputs, PromptProgram};
use faqbot_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a program and per-request inputs.
///
/// This function:
/// 1. Renders the system message from persona and instructions
/// 2. Renders demos as worked examples
/// 3. Renders the user template with question, context and history
/// 4. Appends the output field markers the completion parser expects
///
/// # Example
/// ```
/// use faqbot_prompt::{build_prompt, PromptInputs, PromptProgram};
///
/// let program = PromptProgram::default_for("banking");
/// let inputs = PromptInputs {
///     question: "What are your business hours?".to_string(),
///     context: "We are open 9-5.".to_string(),
///     history: String::new(),
/// };
/// let built = build_prompt(&program, &inputs).unwrap();
/// assert!(built.user.contains("What are your business hours?"));
/// ```
pub fn build_prompt(program: &PromptProgram, inputs: &PromptInputs) -> AppResult<BuiltPrompt> {
    tracing::debug!(program = %program.id, demos = program.demos.len(), "Building prompt");

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), inputs.question.clone());
    variables.insert("context".to_string(), inputs.context.clone());
    variables.insert("history".to_string(), inputs.history.clone());
    variables.insert("domain".to_string(), program.domain.clone());
    variables.insert("demos".to_string(), render_demos(&program.demos));

    let mut user = render_template(&program.template, &variables)?;
    user.push_str("\n\n");
    user.push_str(&output_instructions());

    let system = format!("{}\n\n{}", program.persona.trim(), program.instructions.trim());

    // Demos are large; metadata only needs the per-request values.
    variables.remove("demos");

    Ok(BuiltPrompt {
        system: Some(system),
        user,
        metadata: BuiltPromptMetadata {
            source_program_id: program.id.clone(),
            demo_count: program.demos.len(),
            context_included: !inputs.context.trim().is_empty(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

fn render_demos(demos: &[Demo]) -> String {
    demos
        .iter()
        .map(render_demo)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn render_demo(demo: &Demo) -> String {
    let mut out = format!("Question: {}", demo.question.trim());
    if let Some(context) = demo.context.as_deref().filter(|c| !c.trim().is_empty()) {
        out.push_str(&format!("\nContext:\n{}", context.trim()));
    }
    if let Some(reasoning) = demo.reasoning.as_deref().filter(|r| !r.trim().is_empty()) {
        out.push_str(&format!(
            "\n{}\n{}",
            field_marker(REASONING_FIELD),
            reasoning.trim()
        ));
    }
    out.push_str(&format!(
        "\n{}\n{}",
        field_marker(RESPONSE_FIELD),
        demo.response.trim()
    ));
    out
}

fn output_instructions() -> String {
    format!(
        "Respond with the following fields, in order:\n{}\n<your step-by-step reasoning>\n{}\n<the answer shown to the customer>",
        field_marker(REASONING_FIELD),
        field_marker(RESPONSE_FIELD),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(question: &str, context: &str, history: &str) -> PromptInputs {
        PromptInputs {
            question: question.to_string(),
            context: context.to_string(),
            history: history.to_string(),
        }
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello & <world>".to_string());

        let rendered = render_template("Question: {{question}}", &vars).unwrap();
        assert_eq!(rendered, "Question: Hello & <world>");
    }

    #[test]
    fn test_build_prompt_includes_policy_and_markers() {
        let program = PromptProgram::default_for("fintech customer support");
        let built = build_prompt(
            &program,
            &inputs("What are your business hours?", "Open 9-5 on weekdays.", ""),
        )
        .unwrap();

        let system = built.system.unwrap();
        assert!(system.contains("Answer only questions about fintech customer support"));
        assert!(built.user.contains("Open 9-5 on weekdays."));
        assert!(built.user.contains("Question: What are your business hours?"));
        assert!(built.user.ends_with("<the answer shown to the customer>"));
        assert!(!built.user.contains("Conversation so far"));
        assert!(built.metadata.context_included);
    }

    #[test]
    fn test_build_prompt_with_history() {
        let program = PromptProgram::default_for("banking");
        let built = build_prompt(
            &program,
            &inputs("And on weekends?", "", "user: hours?\nassistant: 9-5"),
        )
        .unwrap();

        assert!(built.user.contains("Conversation so far:\nuser: hours?\nassistant: 9-5"));
        assert!(!built.metadata.context_included);
    }

    #[test]
    fn test_demos_rendered_before_question() {
        let program = PromptProgram::default_for("banking").with_demos(vec![Demo {
            question: "How do I reset my PIN?".to_string(),
            context: None,
            reasoning: Some("The FAQ covers PIN resets.".to_string()),
            response: "Open Settings > Card > Reset PIN.".to_string(),
        }]);
        let built = build_prompt(&program, &inputs("Lost card?", "ctx", "")).unwrap();

        let demo_at = built.user.find("How do I reset my PIN?").unwrap();
        let question_at = built.user.find("Question: Lost card?").unwrap();
        assert!(demo_at < question_at);
        assert!(built.user.contains("[[ ## reasoning ## ]]\nThe FAQ covers PIN resets."));
        assert_eq!(built.metadata.demo_count, 1);
        assert!(!built.metadata.resolved_variables.contains_key("demos"));
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let mut program = PromptProgram::default_for("banking");
        program.template = "{{#if question}}unclosed".to_string();

        let err = build_prompt(&program, &inputs("q", "", "")).unwrap_err();
        assert!(matches!(err, AppError::Prompt(_)));
    }
}
