// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ApiType, Settings};

/// AnswerBot - ask a language model questions through a tool-call protocol
#[derive(Parser, Debug)]
#[command(name = "answerbot")]
#[command(version, about = "Ask a language model questions from your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.answerbot/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding SystemPrompt.txt, ResultPrompt.txt and UserPrompt.txt
    #[arg(long, global = true, value_name = "DIR")]
    pub prompts: Option<PathBuf>,

    /// Backend to use for this run (OpenAI, Gemini, Ollama)
    #[arg(long, global = true)]
    pub api: Option<ApiType>,

    /// Model to use for this run
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Minimum seconds between backend calls
    #[arg(long, global = true, value_name = "SECONDS")]
    pub rate_limit: Option<f64>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat (default when no command given)
    Chat,

    /// Ask a single question and exit once the model is done
    Ask(AskArgs),

    /// Show or initialize configuration
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
}

impl AskArgs {
    pub fn question(&self) -> String {
        self.question.join(" ")
    }
}

/// Arguments for settings/config
#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: Option<SettingsCommands>,
}

/// Settings subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SettingsCommands {
    /// Show current configuration
    Show,

    /// Write default settings and prompt templates if missing
    Init,

    /// Print the settings file location
    Path,
}

impl Cli {
    /// Apply per-run overrides on top of loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(api) = self.api {
            settings.api_type = api;
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(rate_limit) = self.rate_limit {
            settings.rate_limit_seconds = rate_limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_no_command() {
        let cli = Cli::parse_from(["answerbot"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(cli.api.is_none());
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["answerbot", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_config_and_prompts_paths() {
        let cli = Cli::parse_from([
            "answerbot",
            "--config",
            "/tmp/settings.json",
            "--prompts",
            "/tmp/prompts",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.json")));
        assert_eq!(cli.prompts, Some(PathBuf::from("/tmp/prompts")));
    }

    #[test]
    fn test_cli_api_is_case_insensitive() {
        let cli = Cli::parse_from(["answerbot", "--api", "gemini"]);
        assert_eq!(cli.api, Some(ApiType::Gemini));
        assert!(Cli::try_parse_from(["answerbot", "--api", "claude"]).is_err());
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::parse_from(["answerbot", "ask", "what", "is", "2+2?"]);
        match cli.command {
            Some(Commands::Ask(args)) => assert_eq!(args.question(), "what is 2+2?"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["answerbot", "ask"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["answerbot", "chat", "--model", "mistral", "--rate-limit", "0.5"]);
        assert!(matches!(cli.command, Some(Commands::Chat)));
        assert_eq!(cli.model.as_deref(), Some("mistral"));
        assert_eq!(cli.rate_limit, Some(0.5));
    }

    #[test]
    fn test_settings_subcommands() {
        let cli = Cli::parse_from(["answerbot", "config", "path"]);
        match cli.command {
            Some(Commands::Settings(args)) => assert_eq!(args.command, Some(SettingsCommands::Path)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "answerbot",
            "--api",
            "OpenAI",
            "-m",
            "gpt-4o-mini",
            "--rate-limit",
            "1",
        ]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.api_type, ApiType::OpenAI);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.rate_limit_seconds, 1.0);
    }

    #[test]
    fn test_no_overrides_keeps_settings() {
        let cli = Cli::parse_from(["answerbot"]);
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.api_type, ApiType::Ollama);
        assert_eq!(settings.model, "llama3");
    }
}
