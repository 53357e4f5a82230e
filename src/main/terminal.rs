// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Terminal renderer
//!
//! Draws conversation output with crossterm colours. The status line is a
//! single overwritable line on stderr so it never mixes with answers that
//! get piped from stdout.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveToColumn,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
    ExecutableCommand, QueueableCommand,
};

use answerbot::dispatch::{Renderer, Status, TextStyle};
use answerbot::llm::Role;

const BOX_WIDTH: usize = 60;

pub(super) struct TerminalRenderer {
    status_visible: bool,
}

impl TerminalRenderer {
    pub(super) fn new() -> Self {
        Self {
            status_visible: false,
        }
    }

    fn style_color(style: TextStyle) -> Color {
        match style {
            TextStyle::Default => Color::Reset,
            TextStyle::Answer => Color::Green,
            TextStyle::Error => Color::Red,
            TextStyle::Math => Color::Magenta,
            TextStyle::MathAnswer => Color::Magenta,
        }
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.status_visible {
            let mut stderr = io::stderr();
            stderr.queue(MoveToColumn(0))?;
            stderr.queue(Clear(ClearType::CurrentLine))?;
            stderr.flush()?;
            self.status_visible = false;
        }
        Ok(())
    }

    fn write_message(&mut self, role: Role, text: &str, style: TextStyle) -> io::Result<()> {
        self.clear_status()?;
        let mut stdout = io::stdout();

        let (label, label_color) = match role {
            Role::User => ("you", Color::Green),
            Role::System => ("system", Color::DarkGrey),
            Role::Assistant | Role::Tool => ("answerbot", Color::Cyan),
        };
        stdout.queue(SetForegroundColor(label_color))?;
        write!(stdout, "\n{}: ", label)?;
        stdout.queue(ResetColor)?;

        stdout.queue(SetForegroundColor(Self::style_color(style)))?;
        if style == TextStyle::MathAnswer {
            stdout.queue(SetAttribute(Attribute::Bold))?;
        }
        writeln!(stdout, "{}", text)?;
        stdout.queue(SetAttribute(Attribute::Reset))?;
        stdout.queue(ResetColor)?;
        stdout.flush()
    }

    fn write_titled_box(&mut self, title: &str, text: &str, style: TextStyle) -> io::Result<()> {
        self.clear_status()?;
        let mut stdout = io::stdout();
        let rule_len = BOX_WIDTH.saturating_sub(title.chars().count() + 5);

        stdout.queue(SetForegroundColor(Color::Cyan))?;
        writeln!(stdout, "\n┌─ {} {}", title, "─".repeat(rule_len))?;
        stdout.queue(ResetColor)?;

        for line in text.trim().lines() {
            stdout.queue(SetForegroundColor(Color::Cyan))?;
            write!(stdout, "│ ")?;
            stdout.queue(SetForegroundColor(Self::style_color(style)))?;
            writeln!(stdout, "{}", line)?;
        }

        stdout.queue(SetForegroundColor(Color::Cyan))?;
        writeln!(stdout, "└{}", "─".repeat(BOX_WIDTH - 1))?;
        stdout.queue(ResetColor)?;
        stdout.flush()
    }

    fn write_code_block(&mut self, code: &str, language: Option<&str>) -> io::Result<()> {
        self.clear_status()?;
        let mut stdout = io::stdout();

        stdout.queue(SetForegroundColor(Color::DarkGrey))?;
        writeln!(stdout, "\n```{}", language.unwrap_or_default())?;
        stdout.queue(SetForegroundColor(Color::Yellow))?;
        // Printed verbatim so it can be copied straight from the terminal
        writeln!(stdout, "{}", code.trim_matches('\n'))?;
        stdout.queue(SetForegroundColor(Color::DarkGrey))?;
        writeln!(stdout, "```")?;
        stdout.queue(ResetColor)?;
        stdout.flush()
    }

    fn write_status(&mut self, status: &Status) -> io::Result<()> {
        let text = match status {
            Status::Thinking => "⏳ AI is thinking...".to_string(),
            Status::RateLimited { remaining } => {
                format!("⏳ Rate limit: {:.1}s", remaining.as_secs_f64())
            }
            Status::Retrying => "⏳ AI Format Error, Retrying...".to_string(),
            Status::Error(message) => format!("❌ {}", message),
            Status::Clear => return self.clear_status(),
        };

        let mut stderr = io::stderr();
        stderr.queue(MoveToColumn(0))?;
        stderr.queue(Clear(ClearType::CurrentLine))?;
        stderr.queue(SetForegroundColor(Color::DarkGrey))?;
        write!(stderr, "{}", text)?;
        stderr.queue(ResetColor)?;
        stderr.flush()?;
        self.status_visible = true;

        // Errors stay visible; move past them so later output starts clean
        if matches!(status, Status::Error(_)) {
            writeln!(stderr)?;
            self.status_visible = false;
        }
        Ok(())
    }
}

impl Renderer for TerminalRenderer {
    fn render_message(&mut self, role: Role, text: &str, style: TextStyle) {
        if let Err(e) = self.write_message(role, text, style) {
            tracing::warn!(target: "answerbot.terminal", error = %e, "failed to render message");
        }
    }

    fn render_titled_box(&mut self, title: &str, text: &str, style: TextStyle) {
        if let Err(e) = self.write_titled_box(title, text, style) {
            tracing::warn!(target: "answerbot.terminal", error = %e, "failed to render box");
        }
    }

    fn render_code_block(&mut self, code: &str, language: Option<&str>) {
        if let Err(e) = self.write_code_block(code, language) {
            tracing::warn!(target: "answerbot.terminal", error = %e, "failed to render code block");
        }
    }

    fn set_status(&mut self, status: Status) {
        if let Err(e) = self.write_status(&status) {
            tracing::warn!(target: "answerbot.terminal", error = %e, "failed to update status");
        }
    }
}

pub(super) fn print_welcome(backend: &str, model: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("answerbot v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Backend: {}", backend);
    println!("Model: {}", model);
    println!("Type /help for commands.\n");
    Ok(())
}

pub(super) fn print_help() {
    println!("\nCommands:");
    println!("  /new   - Start a new chat");
    println!("  /help  - Show this help message");
    println!("  /exit  - Exit answerbot");
    println!("\nCtrl+C cancels a pending request; press it again while idle to exit.");
    println!();
}

pub(super) fn print_prompt() -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()
}

pub(super) fn print_notice(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Yellow))?;
    println!("{}", text);
    stdout.execute(ResetColor)?;
    Ok(())
}
