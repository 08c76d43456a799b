//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios and
//! turning them into runnable [`Step`]s.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::runner::Step;
use crate::automation::Key;
use crate::common::{paths, EnvFile, Error, Result};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Template image directory, relative to the scenario file
    pub images: Option<PathBuf>,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// A single test step in the execution flow
///
/// `binary`, `template` and `text` may contain `${KEY}` placeholders that
/// are filled from the env file.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Launch the application
    Open {
        /// Path or name of the executable
        binary: String,
    },
    /// Shut the application down
    Close,
    /// Wait for a template and click it
    Click {
        template: String,
        /// Timeout in seconds (default: `timeouts.default_wait_secs`)
        timeout: Option<u64>,
    },
    /// Type text into the focused control
    Type {
        text: String,
        /// Hide the text in reports and logs
        #[serde(default)]
        secret: bool,
    },
    /// Press a single key
    Key { key: Key },
    /// Wait for a template to appear
    Wait {
        template: String,
        timeout: Option<u64>,
    },
    /// Check that a template appears; failing is a test assertion
    Assert {
        template: String,
        timeout: Option<u64>,
        /// Failure message (default: "'<template>' should be visible")
        message: Option<String>,
    },
    /// Save a screenshot under the run's screenshot directory
    Screenshot { name: String },
    /// Pause for a fixed time
    Sleep { ms: u64 },
}

impl TestScenario {
    /// Load and parse a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ScenarioParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(content).map_err(|e| Error::ScenarioParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if scenario.steps.is_empty() {
            return Err(Error::ScenarioParse {
                path: path.to_path_buf(),
                reason: "scenario has no steps".to_string(),
            });
        }
        Ok(scenario)
    }

    /// Whether any step refers to the env file
    pub fn uses_env(&self) -> bool {
        self.steps.iter().any(|step| match step {
            TestStep::Open { binary } => binary.contains("${"),
            TestStep::Click { template, .. }
            | TestStep::Wait { template, .. }
            | TestStep::Assert { template, .. } => template.contains("${"),
            TestStep::Type { text, .. } => text.contains("${"),
            TestStep::Close
            | TestStep::Key { .. }
            | TestStep::Screenshot { .. }
            | TestStep::Sleep { .. } => false,
        })
    }

    /// Fill in placeholders and resolve paths
    ///
    /// Fails on the first unknown key, before anything is executed.
    /// Relative binaries resolve against `base_dir`.
    pub fn resolve_steps(&self, env: &EnvFile, base_dir: &Path) -> Result<Vec<Step>> {
        let secs = |t: &Option<u64>| t.map(Duration::from_secs);

        self.steps
            .iter()
            .map(|step| {
                Ok(match step {
                    TestStep::Open { binary } => Step::Open {
                        binary: paths::resolve_binary(base_dir, &interpolate(binary, env)?),
                    },
                    TestStep::Close => Step::Close,
                    TestStep::Click { template, timeout } => Step::Click {
                        template: interpolate(template, env)?,
                        timeout: secs(timeout),
                    },
                    TestStep::Type { text, secret } => Step::Type {
                        text: interpolate(text, env)?,
                        secret: *secret,
                    },
                    TestStep::Key { key } => Step::Key { key: *key },
                    TestStep::Wait { template, timeout } => Step::Wait {
                        template: interpolate(template, env)?,
                        timeout: secs(timeout),
                    },
                    TestStep::Assert {
                        template,
                        timeout,
                        message,
                    } => {
                        let template = interpolate(template, env)?;
                        let message = message
                            .clone()
                            .unwrap_or_else(|| format!("'{}' should be visible", template));
                        Step::Assert {
                            template,
                            timeout: secs(timeout),
                            message,
                        }
                    }
                    TestStep::Screenshot { name } => Step::Screenshot { name: name.clone() },
                    TestStep::Sleep { ms } => Step::Sleep {
                        duration: Duration::from_millis(*ms),
                    },
                })
            })
            .collect()
    }
}

/// Replace every `${KEY}` in `input` with the env file's value
pub fn interpolate(input: &str, env: &EnvFile) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            Error::Config(format!("Unterminated '${{' in '{}'", input))
        })?;
        out.push_str(env.require(after[..end].trim())?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_YAML: &str = r#"
name: Login and logout
description: Logs in, opens the game center, logs out
images: images
steps:
  - action: open
    binary: ${BINARY_PATH}
  - action: click
    template: LoginLink.png
    timeout: 20
  - action: type
    text: ${USER}
  - action: key
    key: tab
  - action: type
    text: ${PASSWORD}
    secret: true
  - action: assert
    template: Please_connect.png
    timeout: 5
    message: Game center should be displayed after login
  - action: assert
    template: LoginTitle.png
  - action: screenshot
    name: done
  - action: sleep
    ms: 250
  - action: close
"#;

    fn env() -> EnvFile {
        EnvFile::parse(
            Path::new(".env"),
            "BINARY_PATH=/opt/cynteract/Cynteract\nUSER=robot@example.com\nPASSWORD=pw",
        )
        .unwrap()
    }

    #[test]
    fn test_parse_scenario() {
        let scenario = TestScenario::parse(Path::new("login.yaml"), LOGIN_YAML).unwrap();
        assert_eq!(scenario.name, "Login and logout");
        assert_eq!(scenario.images, Some(PathBuf::from("images")));
        assert_eq!(scenario.steps.len(), 10);
        assert!(matches!(scenario.steps[3], TestStep::Key { key: Key::Tab }));
        assert!(scenario.uses_env());
    }

    #[test]
    fn test_resolve_steps() {
        let scenario = TestScenario::parse(Path::new("login.yaml"), LOGIN_YAML).unwrap();
        let steps = scenario.resolve_steps(&env(), Path::new("/scenarios")).unwrap();

        assert_eq!(
            steps[0],
            Step::Open {
                binary: PathBuf::from("/opt/cynteract/Cynteract")
            }
        );
        assert_eq!(
            steps[1],
            Step::Click {
                template: "LoginLink.png".to_string(),
                timeout: Some(Duration::from_secs(20))
            }
        );
        assert_eq!(
            steps[4],
            Step::Type {
                text: "pw".to_string(),
                secret: true
            }
        );
        assert_eq!(
            steps[6],
            Step::Assert {
                template: "LoginTitle.png".to_string(),
                timeout: None,
                message: "'LoginTitle.png' should be visible".to_string()
            }
        );
        assert_eq!(
            steps[8],
            Step::Sleep {
                duration: Duration::from_millis(250)
            }
        );
        assert_eq!(steps[9], Step::Close);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = "name: bad\nsteps:\n  - action: drag\n    template: x.png\n";
        let err = TestScenario::parse(Path::new("bad.yaml"), yaml).unwrap_err();
        assert!(matches!(err, Error::ScenarioParse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let err = TestScenario::parse(Path::new("empty.yaml"), "name: empty\nsteps: []\n").unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_interpolate() {
        let env = env();
        assert_eq!(interpolate("plain", &env).unwrap(), "plain");
        assert_eq!(
            interpolate("user=${USER}, pw=${ PASSWORD }!", &env).unwrap(),
            "user=robot@example.com, pw=pw!"
        );
        assert!(matches!(
            interpolate("${NOPE}", &env),
            Err(Error::MissingKey { .. })
        ));
        assert!(matches!(interpolate("${USER", &env), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_key_fails_before_steps() {
        let scenario = TestScenario::parse(Path::new("login.yaml"), LOGIN_YAML).unwrap();
        let env = EnvFile::parse(Path::new(".env"), "USER=robot").unwrap();

        let err = scenario.resolve_steps(&env, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("BINARY_PATH"));
    }
}
