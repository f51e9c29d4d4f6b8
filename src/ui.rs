// UI layer: interactive configuration, spinners and result marks.
// Prompts go through the `Prompter` trait so the configure flow can be
// driven by canned answers in tests.

use crate::config::{ConfigStore, Credentials};
use crate::error::{Result, ValidatorError};
use crossterm::style::Stylize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

/// Source of answers for the interactive configure flow.
pub trait Prompter {
    /// Free-text question. An empty answer falls back to `default`.
    fn input(&mut self, prompt: &str, default: &str) -> io::Result<String>;
    /// Yes/no question that defaults to "no".
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
    /// Hidden input for secrets. Empty answers are allowed.
    fn secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// [`Prompter`] backed by `dialoguer` on the controlling terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Prompter using dialoguer's colourful theme.
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str, default: &str) -> io::Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme);
        input.with_prompt(prompt).allow_empty(true);
        // Only offer a default when there is something to keep.
        if !default.is_empty() {
            input.default(default.to_string());
        }
        let answer = input.interact_text()?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        let answer = Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(answer.trim().to_string())
    }
}

/// Interactive configure: show what is stored, ask before overwriting, then
/// collect URL, username and token and persist them.
pub fn configure(store: &ConfigStore, prompter: &mut dyn Prompter, out: &mut dyn Write) -> Result<()> {
    let mut creds = store.load()?;

    writeln!(out, "Configure Jenkins Validator Settings").map_err(ValidatorError::Terminal)?;
    writeln!(out, "=====================================").map_err(ValidatorError::Terminal)?;

    if !creds.is_empty() {
        show_existing(&creds, out).map_err(ValidatorError::Terminal)?;
        let update = prompter
            .confirm("Do you want to update the configuration?")
            .map_err(ValidatorError::Terminal)?;
        if !update {
            writeln!(out, "Configuration unchanged.").map_err(ValidatorError::Terminal)?;
            return Ok(());
        }
        writeln!(out).map_err(ValidatorError::Terminal)?;
    }

    creds.server_url = prompter
        .input("Jenkins URL", &creds.server_url)
        .map_err(ValidatorError::Terminal)?;
    creds.username = prompter
        .input("Username", &creds.username)
        .map_err(ValidatorError::Terminal)?;
    creds.token = prompter
        .secret("API Token")
        .map_err(ValidatorError::Terminal)?;

    store.save(&creds)?;
    tracing::info!(path = %store.path().display(), "configuration written");

    writeln!(out, "\nConfiguration saved successfully!").map_err(ValidatorError::Terminal)?;
    Ok(())
}

fn show_existing(creds: &Credentials, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\nExisting configuration found:")?;
    writeln!(out, "Jenkins URL: {}", creds.server_url)?;
    writeln!(out, "Username: {}", creds.username)?;
    if !creds.token.is_empty() {
        writeln!(out, "Token: {}", creds.masked_token())?;
    }
    writeln!(out)
}

/// Spinner shown on stderr while a request is in flight. indicatif hides it
/// when stderr is not a terminal.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Green check mark, plain when stdout is not a terminal.
pub fn success_mark() -> String {
    mark("✓", io::stdout().is_terminal(), |m| m.green().to_string())
}

/// Red cross, plain when stdout is not a terminal.
pub fn failure_mark() -> String {
    mark("✗", io::stdout().is_terminal(), |m| m.red().to_string())
}

fn mark(symbol: &'static str, colored: bool, paint: fn(&'static str) -> String) -> String {
    if colored {
        paint(symbol)
    } else {
        symbol.to_string()
    }
}
