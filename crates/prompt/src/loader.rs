//! Loading and saving prompt programs.
//!
//! Programs are stored as YAML (`.yml`/`.yaml`) or JSON (anything else).

use crate::types::PromptProgram;
use faqbot_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt program from a file.
///
/// # Example
/// ```no_run
/// use faqbot_prompt::load_program;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let program = load_program(Path::new("prompts/answer.yml"))?;
/// println!("Loaded program: {}", program.id);
/// # Ok(())
/// # }
/// ```
pub fn load_program(path: &Path) -> AppResult<PromptProgram> {
    tracing::debug!("Loading prompt program from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt program file not found: {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt program {:?}: {}", path, e))
    })?;

    let program: PromptProgram = if is_yaml(path) {
        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
        })?
    } else {
        serde_json::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!("Failed to parse prompt JSON {:?}: {}", path, e))
        })?
    };

    validate_program(&program)?;

    tracing::info!(
        "Loaded prompt program: {} ({} demos)",
        program.id,
        program.demos.len()
    );

    Ok(program)
}

/// Validate and write a prompt program to a file.
pub fn save_program(program: &PromptProgram, path: &Path) -> AppResult<()> {
    validate_program(program)?;

    let contents = if is_yaml(path) {
        serde_yaml::to_string(program)?
    } else {
        serde_json::to_string_pretty(program)?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;

    tracing::info!("Saved prompt program {} to {:?}", program.id, path);
    Ok(())
}

/// Validate a prompt program.
pub fn validate_program(program: &PromptProgram) -> AppResult<()> {
    if program.id.is_empty() {
        return Err(AppError::Prompt("Program ID cannot be empty".to_string()));
    }

    if program.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Program apiVersion cannot be empty".to_string(),
        ));
    }

    // Simple x.y check
    if !program.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            program.api_version
        )));
    }

    if program.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Program template cannot be empty".to_string(),
        ));
    }

    if !program.template.contains("{{question}}") {
        return Err(AppError::Prompt(
            "Program template must reference {{question}}".to_string(),
        ));
    }

    if program
        .demos
        .iter()
        .any(|d| d.question.trim().is_empty() || d.response.trim().is_empty())
    {
        return Err(AppError::Prompt(
            "Program demos need a question and a response".to_string(),
        ));
    }

    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yml") | Some("yaml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Demo;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("program.json");
        let program =
            PromptProgram::default_for("banking").with_demos(vec![Demo::labeled("q", "a")]);

        save_program(&program, &path).unwrap();
        let loaded = load_program(&path).unwrap();
        assert_eq!(loaded, program);
    }

    #[test]
    fn test_save_and_load_yaml_in_new_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/program.yml");
        let program = PromptProgram::default_for("banking");

        save_program(&program, &path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("apiVersion"));
        assert_eq!(load_program(&path).unwrap(), program);
    }

    #[test]
    fn test_load_nonexistent_program() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_program(&temp_dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yml");
        fs::write(&path, "invalid: yaml: content:").unwrap();
        assert!(load_program(&path).is_err());
    }

    #[test]
    fn test_validation_rules() {
        let mut program = PromptProgram::default_for("banking");
        program.api_version = "1".to_string();
        assert!(validate_program(&program).is_err());

        let mut program = PromptProgram::default_for("banking");
        program.template = "No placeholder".to_string();
        assert!(validate_program(&program).is_err());

        let program =
            PromptProgram::default_for("banking").with_demos(vec![Demo::labeled("q", " ")]);
        assert!(validate_program(&program).is_err());
    }
}
