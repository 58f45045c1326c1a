//! Console output and interactive prompts
//!
//! The `Console` is handed to steps through the context as an optional
//! capability: message helpers always work, interactive prompts fall back to
//! their defaults in non-interactive mode. The handle is cheap to clone so a
//! step can keep one while mutating the context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Clone)]
pub struct Console {
    non_interactive: bool,
    quiet: bool,
    total_steps: Arc<AtomicUsize>,
    current_step: Arc<AtomicUsize>,
}

impl Console {
    pub fn new(non_interactive: bool, quiet: bool) -> Self {
        Self {
            non_interactive,
            quiet,
            total_steps: Arc::new(AtomicUsize::new(0)),
            current_step: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Print the installer banner.
    pub fn banner(&self) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", "  Codekit Installer".cyan().bold());
        println!("{}", "  ─────────────────".dimmed());
    }

    /// Print a dimmed in-progress status line.
    pub fn status(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.dimmed());
        }
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", "ℹ".blue(), msg);
        }
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{} {}", "✓".green(), msg);
        }
    }

    /// Print a warning message.
    pub fn warning(&self, msg: &str) {
        println!("{} {}", "⚠".yellow(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", "✗".red(), msg);
    }

    /// Print a section header.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!();
            println!("{}", title.cyan().bold());
        }
    }

    /// Declare how many steps the run will show headers for.
    pub fn set_total_steps(&self, total: usize) {
        self.total_steps.store(total, Ordering::Relaxed);
        self.current_step.store(0, Ordering::Relaxed);
    }

    /// Print the next step header ([n/total] Title).
    pub fn step(&self, title: &str) {
        let current = self.current_step.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total_steps.load(Ordering::Relaxed);
        if !self.quiet {
            println!();
            println!(
                "{} {}",
                format!("[{}/{}]", current, total).blue().bold(),
                title.bold()
            );
        }
    }

    /// Yes/no prompt. Returns the default without asking in non-interactive mode.
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }

    /// Free-text prompt. Returns the default without asking in non-interactive mode.
    pub fn input(&self, prompt: &str, default: &str) -> Result<String> {
        if self.non_interactive {
            return Ok(default.to_string());
        }
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")
    }

    /// Pick one of `items`. Returns index 0 without asking in non-interactive mode.
    pub fn select(&self, prompt: &str, items: &[&str]) -> Result<usize> {
        if self.non_interactive {
            return Ok(0);
        }
        dialoguer::Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
            .context("Failed to read selection")
    }

    /// Start a spinner with the given message. Hidden in quiet mode; the
    /// caller finishes it with `finish_and_clear`.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Render the numbered next-steps list shown at the end of a run.
    pub fn next_steps(&self, steps: &[(String, String)]) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", "Next steps".cyan().bold());
        for (i, (title, detail)) in steps.iter().enumerate() {
            println!("  {}. {}", i + 1, title.bold());
            println!("     {}", detail.dimmed());
        }
    }
}
