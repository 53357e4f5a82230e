// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! AnswerBot - ask a language model questions from your terminal
//!
//! Entry point for the answerbot CLI application.

use clap::Parser;

use answerbot::cli::{Cli, Commands};
use answerbot::config::Settings;
use answerbot::error::Result;
use answerbot::prompts::PromptTemplates;

#[path = "main/commands.rs"]
mod commands;
#[path = "main/terminal.rs"]
mod terminal;

use commands::{resolve_prompts_dir, resolve_settings_path, run_ask, run_chat, run_settings_command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so answers can be piped
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for directive in [
            format!("answerbot={}", level),
            format!("answerbot.orchestrator={}", level),
            format!("answerbot.llm={}", level),
        ] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = resolve_settings_path(cli.config.as_ref());
    let prompts_dir = resolve_prompts_dir(cli.prompts.as_ref());

    let mut settings = Settings::load_from(&settings_path)?;
    cli.apply_overrides(&mut settings);
    tracing::debug!(
        target: "answerbot",
        path = %settings_path.display(),
        api = settings.api_type.as_str(),
        model = %settings.model,
        "settings loaded"
    );

    match cli.command {
        None | Some(Commands::Chat) => {
            let prompts = PromptTemplates::load(&prompts_dir)?;
            run_chat(settings, prompts).await?;
        }
        Some(Commands::Ask(args)) => {
            let prompts = PromptTemplates::load(&prompts_dir)?;
            run_ask(args, settings, prompts).await?;
        }
        Some(Commands::Settings(args)) => {
            run_settings_command(args, settings, &settings_path, &prompts_dir)?;
        }
    }

    Ok(())
}
