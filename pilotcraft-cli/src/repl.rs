//! Line-oriented prompt loop and the Ctrl-C latch it shares with the agent

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::{debug, error, info};

pub const DEFAULT_PROMPT: &str = "You: ";
pub const MISSION_PROMPT: &str = "Enter your mission: ";

pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

/// Ctrl-C seen at any point of the session, latched until the session ends.
///
/// Clones share the latch, so the prompt and a running instruction can both
/// wait on it.
#[derive(Clone)]
pub struct Interrupt {
    fired: watch::Receiver<bool>,
}

impl Interrupt {
    /// Listen for Ctrl-C for the rest of the process. Needs a runtime.
    pub fn ctrl_c() -> Self {
        let (trigger, interrupt) = Self::manual();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            info!("ctrl-c received, ending the session");
            trigger.send_replace(true);
        });
        interrupt
    }

    /// A latch fired by sending `true` on the returned sender
    pub fn manual() -> (watch::Sender<bool>, Self) {
        let (trigger, fired) = watch::channel(false);
        (trigger, Self { fired })
    }

    pub fn is_triggered(&self) -> bool {
        *self.fired.borrow()
    }

    /// Resolves once fired; never resolves if the trigger is gone unfired
    pub async fn triggered(&mut self) {
        let fired = self.fired.wait_for(|fired| *fired).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Reads commands one line at a time until EOF, Ctrl-C or an exit command
pub struct Repl<R> {
    lines: Lines<R>,
    prompt: String,
    echo_prompt: bool,
    interrupt: Interrupt,
}

impl Repl<BufReader<Stdin>> {
    pub fn stdin(prompt: impl Into<String>, interrupt: Interrupt) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), prompt, interrupt)
    }
}

impl<R: AsyncBufRead + Unpin> Repl<R> {
    pub fn new(reader: R, prompt: impl Into<String>, interrupt: Interrupt) -> Self {
        Self {
            lines: reader.lines(),
            prompt: prompt.into(),
            echo_prompt: true,
            interrupt,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.echo_prompt = false;
        self
    }

    /// Next non-empty command, or `None` when the session should end
    pub async fn next_command(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            if self.interrupt.is_triggered() {
                debug!("interrupted before the prompt");
                return Ok(None);
            }
            if self.echo_prompt {
                print!("{}", self.prompt);
                std::io::stdout().flush()?;
            }

            let line = tokio::select! {
                biased;
                _ = self.interrupt.triggered() => {
                    println!();
                    debug!("interrupted at the prompt");
                    return Ok(None);
                }
                line = self.lines.next_line() => line?,
            };

            let Some(line) = line else {
                debug!("end of input");
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_command(line) {
                return Ok(None);
            }
            return Ok(Some(line.to_string()));
        }
    }
}
