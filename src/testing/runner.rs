//! Test runner implementation
//!
//! Executes resolved steps one after the other against a [`Screen`]. The
//! first failing step ends the run; nothing after it is attempted.

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::automation::{Key, Lookup, Region, Screen};
use crate::common::config::Timeouts;
use crate::common::{paths, Error, Result};

/// A fully resolved scenario step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Launch the application under test
    Open { binary: PathBuf },
    /// Shut the application down
    Close,
    /// Wait for a template, then click its centre
    Click {
        template: String,
        timeout: Option<Duration>,
    },
    /// Type text; secret text is never printed or logged
    Type { text: String, secret: bool },
    Key { key: Key },
    /// Wait for a template; not finding it is a match failure
    Wait {
        template: String,
        timeout: Option<Duration>,
    },
    /// Wait for a template; not finding it fails the test with `message`
    Assert {
        template: String,
        timeout: Option<Duration>,
        message: String,
    },
    Screenshot { name: String },
    Sleep { duration: Duration },
}

impl Step {
    /// One-line description for the step report
    pub fn describe(&self) -> String {
        match self {
            Step::Open { binary } => format!("open {}", binary.display()),
            Step::Close => "close".to_string(),
            Step::Click { template, .. } => format!("click {}", template),
            Step::Type { secret: true, .. } => "type ***".to_string(),
            Step::Type { text, .. } => format!("type '{}'", text),
            Step::Key { key } => format!("key <{}>", key),
            Step::Wait { template, .. } => format!("wait {}", template),
            Step::Assert { template, .. } => format!("assert {}", template),
            Step::Screenshot { name } => format!("screenshot {}", name),
            Step::Sleep { duration } => format!("sleep {:?}", duration),
        }
    }
}

/// Result of a test run
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// How a run reports and where it puts screenshots
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Print step details
    pub verbose: bool,
    /// Print nothing (e.g. when the result is emitted as JSON)
    pub quiet: bool,
    pub screenshot_dir: PathBuf,
}

impl RunOptions {
    pub fn new(test_id: &str) -> Self {
        Self {
            verbose: false,
            quiet: false,
            screenshot_dir: paths::screenshot_dir(test_id)
                .unwrap_or_else(|| PathBuf::from("screenshots").join(test_id)),
        }
    }
}

/// Run `steps` in order and report the outcome
pub async fn run_steps(
    screen: &mut dyn Screen,
    name: &str,
    steps: &[Step],
    timeouts: &Timeouts,
    options: &RunOptions,
) -> TestResult {
    let steps_total = steps.len();

    if !options.quiet {
        println!("\n{} {}", "Running Test:".blue().bold(), name.white().bold());
        println!("\n{}", "Steps:".cyan());
    }
    tracing::info!(scenario = name, steps = steps_total, screen = screen.index(), "Starting run");

    let mut runner = StepRunner {
        screen,
        timeouts,
        options,
        after_launch: false,
    };

    for (i, step) in steps.iter().enumerate() {
        let step_num = i + 1;
        tracing::debug!(step = step_num, action = %step.describe(), "Executing step");

        if let Err(e) = runner.execute(step).await {
            tracing::warn!(step = step_num, error = %e, "Step failed");
            if !options.quiet {
                println!("  {} Step {}: {}", "✗".red(), step_num, step.describe());
                println!("    {}", e.to_string().red());
                println!("\n{} {}\n", "✗".red().bold(), "Test Failed".red().bold());
            }
            return TestResult {
                name: name.to_string(),
                passed: false,
                steps_run: step_num,
                steps_total,
                error: Some(e.to_string()),
            };
        }

        if !options.quiet {
            println!(
                "  {} Step {}: {}",
                "✓".green(),
                step_num,
                step.describe().dimmed()
            );
        }
    }

    tracing::info!(scenario = name, "Run passed");
    if !options.quiet {
        println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());
    }

    TestResult {
        name: name.to_string(),
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    }
}

struct StepRunner<'a> {
    screen: &'a mut dyn Screen,
    timeouts: &'a Timeouts,
    options: &'a RunOptions,
    /// The next lookup is the first since the application was launched
    after_launch: bool,
}

impl StepRunner<'_> {
    async fn execute(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Open { binary } => {
                self.screen.open_app(binary)?;
                self.after_launch = true;
            }
            Step::Close => self.screen.close_app()?,
            Step::Click { template, timeout } => {
                let region = self.find(template, *timeout).await?;
                if self.options.verbose {
                    println!("    {} at {}", template.dimmed(), region.to_string().dimmed());
                }
                self.screen.click(region)?;
            }
            Step::Type { text, secret } => {
                if !secret {
                    tracing::debug!(text = %text, "Typing");
                }
                self.screen.type_text(text)?;
            }
            Step::Key { key } => self.screen.send_key(*key)?,
            Step::Wait { template, timeout } => {
                self.find(template, *timeout).await?;
            }
            Step::Assert {
                template,
                timeout,
                message,
            } => {
                let timeout = self.lookup_timeout(*timeout);
                if let Lookup::NotFound = self.wait_for(template, timeout).await? {
                    return Err(Error::TestAssertion(message.clone()));
                }
            }
            Step::Screenshot { name } => {
                std::fs::create_dir_all(&self.options.screenshot_dir)?;
                let path = self.options.screenshot_dir.join(format!("{}.png", name));
                self.screen.screenshot(&path)?;
                tracing::info!(path = %path.display(), "Saved screenshot");
                if self.options.verbose {
                    println!("    {}", path.display().to_string().dimmed());
                }
            }
            Step::Sleep { duration } => sleep(*duration).await,
        }
        Ok(())
    }

    /// Wait for `template`; not finding it is a match failure
    async fn find(&mut self, template: &str, timeout: Option<Duration>) -> Result<Region> {
        let timeout = self.lookup_timeout(timeout);
        match self.wait_for(template, timeout).await? {
            Lookup::Found(region) => Ok(region),
            Lookup::NotFound => Err(Error::FindFailed {
                template: template.to_string(),
                screen: self.screen.index(),
                timeout,
            }),
        }
    }

    /// Timeout for the next lookup; the first one after a launch gets the
    /// longer launch wait unless the step sets its own
    fn lookup_timeout(&mut self, explicit: Option<Duration>) -> Duration {
        let after_launch = std::mem::take(&mut self.after_launch);
        match explicit {
            Some(timeout) => timeout,
            None if after_launch => self.timeouts.launch_wait().max(self.timeouts.default_wait()),
            None => self.timeouts.default_wait(),
        }
    }

    /// Look for `template` until found or `timeout` has elapsed
    ///
    /// Always makes at least one attempt.
    async fn wait_for(&mut self, template: &str, timeout: Duration) -> Result<Lookup> {
        let deadline = Instant::now() + timeout;
        let poll = self.timeouts.poll_interval();

        loop {
            if let Lookup::Found(region) = self.screen.locate(template)? {
                tracing::debug!(template, %region, "Found");
                return Ok(Lookup::Found(region));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(template, ?timeout, "Not found before timeout");
                return Ok(Lookup::NotFound);
            }
            sleep(poll.min(deadline - now)).await;
        }
    }
}
