// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use clap::Parser;
use tempfile::TempDir;

use answerbot::cli::{Cli, Commands};
use answerbot::config::{ApiType, Settings};
use answerbot::prompts::PromptTemplates;

#[test]
fn test_legacy_settings_file_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"api_type": "openai", "rate_limit_seconds": "1.5", "openai_system_prompt_support": false}"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.api_type, ApiType::OpenAI);
    assert_eq!(settings.rate_limit_seconds, 1.5);
    assert!(!settings.uses_system_message());
}

#[test]
fn test_corrupt_settings_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Settings::load_from(&path).is_err());
}

#[test]
fn test_cli_overrides_loaded_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    Settings {
        api_type: ApiType::Gemini,
        model: "gemini-1.5-flash".to_string(),
        ..Settings::default()
    }
    .save_to(&path)
    .unwrap();

    let cli = Cli::parse_from([
        "answerbot",
        "--config",
        path.to_str().unwrap(),
        "--model",
        "gemini-1.5-pro",
        "ask",
        "hello",
    ]);
    let mut settings = Settings::load_from(cli.config.as_ref().unwrap()).unwrap();
    cli.apply_overrides(&mut settings);

    assert_eq!(settings.api_type, ApiType::Gemini);
    assert_eq!(settings.model, "gemini-1.5-pro");
    assert!(matches!(cli.command, Some(Commands::Ask(_))));
}

#[test]
fn test_prompt_overrides_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("SystemPrompt.txt"),
        "Answer tersely.\n{placeholderQuestion}",
    )
    .unwrap();

    let prompts = PromptTemplates::load(temp_dir.path()).unwrap();
    assert_eq!(prompts.format_system_prompt("Why?"), "Answer tersely.\nWhy?");
    assert_eq!(prompts.base_system_prompt(), "Answer tersely.");
    // Files that are absent keep the built-in text
    assert_eq!(prompts.result, PromptTemplates::default().result);
}

#[test]
fn test_written_defaults_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let written = PromptTemplates::write_defaults(temp_dir.path()).unwrap();
    assert_eq!(written.len(), 3);

    let loaded = PromptTemplates::load(temp_dir.path()).unwrap();
    assert_eq!(loaded, PromptTemplates::default());
}
