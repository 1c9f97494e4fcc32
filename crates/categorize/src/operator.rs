use chrono::NaiveDate;
use spendsort_core::{Category, Money};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("IO error talking to operator: {0}")]
    Io(#[from] std::io::Error),
}

/// What the operator is shown for one unknown transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub date: NaiveDate,
    pub raw_description: String,
    pub merchant: String,
    pub amount: Money,
    /// 1-based attempt counter for this transaction.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl Prompt {
    pub fn categories(&self) -> &'static [Category] {
        &Category::ALL
    }
}

/// The synchronous prompt-and-reply surface used by the learner.
pub trait Operator {
    /// Blocks until the operator answers. `Ok(None)` means they declined.
    fn ask(&mut self, prompt: &Prompt) -> Result<Option<String>, OperatorError>;

    /// Tells the operator why a reply was not accepted.
    fn rejected(&mut self, _reply: &str, _reason: &str) {}
}

// ── Console operator ─────────────────────────────────────────────────────────

/// Renders prompts on a writer and reads one line per answer.
/// `s`, `skip` and end of input decline.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn render(&mut self, prompt: &Prompt) -> std::io::Result<()> {
        if prompt.attempt == 1 {
            writeln!(
                self.output,
                "\nUnknown transaction: {} | {} | {}",
                prompt.date, prompt.raw_description, prompt.amount
            )?;
            writeln!(self.output, "Merchant: {}", prompt.merchant)?;
            writeln!(self.output, "Available categories:")?;
            for category in prompt.categories() {
                writeln!(self.output, "  {}. {}", category.number(), category)?;
            }
        }
        write!(
            self.output,
            "Select category (1-{}, name, or 's' to skip) [{}/{}]: ",
            prompt.categories().len(),
            prompt.attempt,
            prompt.max_attempts
        )?;
        self.output.flush()
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn ask(&mut self, prompt: &Prompt) -> Result<Option<String>, OperatorError> {
        self.render(prompt)?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        let reply = line.trim();
        if reply.eq_ignore_ascii_case("s") || reply.eq_ignore_ascii_case("skip") {
            return Ok(None);
        }
        Ok(Some(reply.to_string()))
    }

    fn rejected(&mut self, reply: &str, reason: &str) {
        // Best effort: a broken output stream surfaces on the next `ask`.
        let _ = writeln!(self.output, "'{reply}' {reason}");
    }
}

// ── Scripted operator (tests, replayed sessions) ─────────────────────────────

/// Replays a fixed queue of replies and records every prompt it was shown.
/// Running out of replies counts as declining.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    replies: VecDeque<Option<String>>,
    pub prompts: Vec<Prompt>,
    pub rejections: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(|r| Some(r.into())).collect(),
            ..Self::default()
        }
    }

    /// Queues an explicit decline.
    pub fn then_decline(mut self) -> Self {
        self.replies.push_back(None);
        self
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    /// Merchants in the order they were first presented.
    pub fn presented(&self) -> Vec<&str> {
        self.prompts
            .iter()
            .filter(|p| p.attempt == 1)
            .map(|p| p.merchant.as_str())
            .collect()
    }
}

impl Operator for ScriptedOperator {
    fn ask(&mut self, prompt: &Prompt) -> Result<Option<String>, OperatorError> {
        self.prompts.push(prompt.clone());
        Ok(self.replies.pop_front().flatten())
    }

    fn rejected(&mut self, reply: &str, _reason: &str) {
        self.rejections.push(reply.to_string());
    }
}
