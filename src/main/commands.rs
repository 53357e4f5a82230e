// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};

use answerbot::cli::{AskArgs, SettingsArgs, SettingsCommands};
use answerbot::config::Settings;
use answerbot::error::Result;
use answerbot::llm::BackendFactory;
use answerbot::orchestrator::{Orchestrator, Phase};
use answerbot::prompts::PromptTemplates;

use crate::terminal::{print_help, print_notice, print_prompt, print_welcome, TerminalRenderer};

/// What the REPL should do with a line of input.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ReplCommand<'a> {
    Exit,
    NewChat,
    Help,
    Empty,
    Unknown(&'a str),
    Message(&'a str),
}

pub(super) fn parse_repl_line(line: &str) -> ReplCommand<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    match trimmed.to_lowercase().as_str() {
        "exit" | "quit" | "/exit" | "/quit" => ReplCommand::Exit,
        "/new" | "/clear" => ReplCommand::NewChat,
        "/help" | "help" => ReplCommand::Help,
        _ if trimmed.starts_with('/') => ReplCommand::Unknown(trimmed),
        _ => ReplCommand::Message(trimmed),
    }
}

fn build_orchestrator(
    settings: Settings,
    prompts: PromptTemplates,
) -> Orchestrator<TerminalRenderer> {
    let backend = BackendFactory::for_settings(&settings);
    Orchestrator::new(settings, prompts, backend, TerminalRenderer::new())
}

pub(super) async fn run_chat(settings: Settings, prompts: PromptTemplates) -> Result<()> {
    print_welcome(settings.api_type.as_str(), &settings.model)?;
    let mut orch = build_orchestrator(settings, prompts);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::debug!(target: "answerbot.repl", "stdin closed");
                    break;
                };
                match parse_repl_line(&line) {
                    ReplCommand::Exit => break,
                    ReplCommand::NewChat => {
                        orch.new_chat();
                        print_notice("Started a new chat.")?;
                    }
                    ReplCommand::Help => print_help(),
                    ReplCommand::Empty => {}
                    ReplCommand::Unknown(command) => {
                        print_notice(&format!("Unknown command: {}. Type /help for commands.", command))?;
                    }
                    ReplCommand::Message(text) => {
                        if let Err(e) = orch.submit_user_input(text) {
                            print_notice(&e.to_string())?;
                        }
                    }
                }
                if !orch.is_busy() {
                    print_prompt()?;
                }
            }
            Some(event) = orch.next_event() => {
                orch.handle_event(event);
                if !orch.is_busy() {
                    if orch.phase() == Phase::WaitingForUserDetail {
                        print_notice("(reply to continue)")?;
                    }
                    print_prompt()?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if orch.is_busy() {
                    orch.cancel();
                    print_notice("\nRequest cancelled.")?;
                    print_prompt()?;
                } else {
                    println!();
                    break;
                }
            }
        }
    }

    orch.shutdown();
    println!("Goodbye!");
    Ok(())
}

pub(super) async fn run_ask(
    args: AskArgs,
    settings: Settings,
    prompts: PromptTemplates,
) -> Result<()> {
    let mut orch = build_orchestrator(settings, prompts);
    orch.submit_user_input(&args.question())?;

    tokio::select! {
        _ = orch.run_until_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!(target: "answerbot.repl", "interrupted");
        }
    }
    if orch.is_busy() {
        orch.cancel();
        print_notice("Request cancelled.")?;
    } else if orch.phase() == Phase::WaitingForUserDetail {
        print_notice("The model asked for more details. Use `answerbot chat` to reply.")?;
    }
    orch.shutdown();
    Ok(())
}

pub(super) fn run_settings_command(
    args: SettingsArgs,
    settings: Settings,
    settings_path: &Path,
    prompts_dir: &Path,
) -> Result<()> {
    match args.command {
        None | Some(SettingsCommands::Show) => {
            let mut shown = settings;
            if shown.api_key.is_some() {
                shown.api_key = Some("<redacted>".to_string());
            }
            let json = serde_json::to_string_pretty(&shown)?;
            println!("{}", json);
        }
        Some(SettingsCommands::Init) => {
            if settings_path.exists() {
                println!("Settings already exist at {}", settings_path.display());
            } else {
                Settings::default().save_to(settings_path)?;
                println!("Wrote default settings to {}", settings_path.display());
            }

            let written = PromptTemplates::write_defaults(prompts_dir)?;
            if written.is_empty() {
                println!("Prompt templates already present in {}", prompts_dir.display());
            }
            for name in written {
                println!("Wrote {}", prompts_dir.join(name).display());
            }
        }
        Some(SettingsCommands::Path) => {
            println!("{}", settings_path.display());
        }
    }
    Ok(())
}

/// Settings path from the flag, or the default location.
pub(super) fn resolve_settings_path(flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned().unwrap_or_else(Settings::default_path)
}

/// Prompt directory from the flag, or the default location.
pub(super) fn resolve_prompts_dir(flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned().unwrap_or_else(Settings::prompts_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_repl_commands() {
        assert_eq!(parse_repl_line("  "), ReplCommand::Empty);
        assert_eq!(parse_repl_line("exit"), ReplCommand::Exit);
        assert_eq!(parse_repl_line("QUIT"), ReplCommand::Exit);
        assert_eq!(parse_repl_line("/new"), ReplCommand::NewChat);
        assert_eq!(parse_repl_line("/help"), ReplCommand::Help);
        assert_eq!(parse_repl_line("/frobnicate"), ReplCommand::Unknown("/frobnicate"));
    }

    #[test]
    fn test_parse_repl_message_is_trimmed() {
        assert_eq!(
            parse_repl_line("  what is 2+2?\n"),
            ReplCommand::Message("what is 2+2?")
        );
        // Only exact command words are commands
        assert_eq!(parse_repl_line("exit now"), ReplCommand::Message("exit now"));
    }

    #[test]
    fn test_settings_init_writes_files() {
        let temp = TempDir::new().unwrap();
        let settings_path = temp.path().join("settings.json");
        let prompts_dir = temp.path().join("prompts");
        let args = SettingsArgs {
            command: Some(SettingsCommands::Init),
        };

        run_settings_command(args, Settings::default(), &settings_path, &prompts_dir).unwrap();

        assert!(settings_path.exists());
        assert!(prompts_dir.join("SystemPrompt.txt").exists());
        assert!(prompts_dir.join("ResultPrompt.txt").exists());
        assert!(prompts_dir.join("UserPrompt.txt").exists());
    }

    #[test]
    fn test_settings_init_keeps_existing_settings() {
        let temp = TempDir::new().unwrap();
        let settings_path = temp.path().join("settings.json");
        let custom = Settings {
            model: "mistral".to_string(),
            ..Settings::default()
        };
        custom.save_to(&settings_path).unwrap();

        let args = SettingsArgs {
            command: Some(SettingsCommands::Init),
        };
        run_settings_command(args, custom, &settings_path, &temp.path().join("prompts")).unwrap();

        let loaded = Settings::load_from(&settings_path).unwrap();
        assert_eq!(loaded.model, "mistral");
    }

    #[test]
    fn test_resolve_paths_prefer_flags() {
        let flag = PathBuf::from("/tmp/custom.json");
        assert_eq!(resolve_settings_path(Some(&flag)), flag);
        assert_eq!(resolve_settings_path(None), Settings::default_path());
        assert_eq!(resolve_prompts_dir(None), Settings::prompts_dir());
    }
}
