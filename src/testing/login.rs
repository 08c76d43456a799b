//! Built-in login scenario
//!
//! Logs in with the configured account, opens the game center, goes back,
//! and logs out again, checking that the game center and then the login
//! screen are shown.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::runner::{run_steps, RunOptions, Step, TestResult};
use crate::automation::{Key, Screen};
use crate::common::config::Config;
use crate::common::{paths, EnvFile, Result};

/// Scenario name used in reports
pub const LOGIN_SCENARIO: &str = "Login, game center and logout";

/// Every template the scenario looks for, in order of use
pub const LOGIN_TEMPLATES: [&str; 9] = [
    "LoginLink.png",
    "Email.png",
    "LoginButton.png",
    "Game_center.png",
    "Please_connect.png",
    "Back.png",
    "Settings.png",
    "Logout.png",
    "LoginTitle.png",
];

pub const GAME_CENTER_MESSAGE: &str = "Game center should be displayed after login";
pub const LOGOUT_MESSAGE: &str = "Login screen should be displayed after logout";

/// How long the game center may take to show its connect hint
const GAME_CENTER_WAIT: Duration = Duration::from_secs(5);

/// Values the login scenario needs from the env file
#[derive(Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub binary_path: PathBuf,
    pub user: String,
    pub password: String,
}

impl LoginConfig {
    /// Build from `BINARY_PATH`, `USER` and `PASSWORD`
    ///
    /// Fails on the first missing key.
    pub fn from_env(env: &EnvFile) -> Result<Self> {
        let binary = env.require("BINARY_PATH")?;
        let user = env.require("USER")?;
        let password = env.require("PASSWORD")?;

        Ok(Self {
            binary_path: paths::resolve_binary(std::path::Path::new(""), binary),
            user: user.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("binary_path", &self.binary_path)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Where the scenario reads its inputs from
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub env_file: PathBuf,
    pub images: PathBuf,
}

impl LoginOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            env_file: config.paths.env_file.clone(),
            images: config.paths.images.clone(),
        }
    }
}

/// The scenario as runnable steps
pub fn login_steps(config: &LoginConfig) -> Vec<Step> {
    let click = |template: &str| Step::Click {
        template: template.to_string(),
        timeout: None,
    };

    vec![
        Step::Open {
            binary: config.binary_path.clone(),
        },
        // Login
        click("LoginLink.png"),
        click("Email.png"),
        Step::Type {
            text: config.user.clone(),
            secret: false,
        },
        Step::Key { key: Key::Tab },
        Step::Type {
            text: config.password.clone(),
            secret: true,
        },
        click("LoginButton.png"),
        // Game center
        click("Game_center.png"),
        Step::Assert {
            template: "Please_connect.png".to_string(),
            timeout: Some(GAME_CENTER_WAIT),
            message: GAME_CENTER_MESSAGE.to_string(),
        },
        click("Back.png"),
        // Logout
        click("Settings.png"),
        click("Logout.png"),
        Step::Assert {
            template: "LoginTitle.png".to_string(),
            timeout: None,
            message: LOGOUT_MESSAGE.to_string(),
        },
    ]
}

/// Run the login scenario on `screen`
///
/// Registers the template directory, then loads the env file; a missing
/// file or key is returned as an error before any input reaches the
/// application. Step failures are reported in the [`TestResult`].
pub async fn run_login(
    screen: &mut dyn Screen,
    options: &LoginOptions,
    config: &Config,
    run: &RunOptions,
) -> Result<TestResult> {
    screen.add_image_path(&options.images)?;

    let env = EnvFile::load(&options.env_file)?;
    let login = LoginConfig::from_env(&env)?;
    tracing::debug!(?login, "Loaded login configuration");

    let steps = login_steps(&login);
    Ok(run_steps(screen, LOGIN_SCENARIO, &steps, &config.timeouts, run).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::scripted::{Action, ScriptedScreen};
    use crate::common::Error;
    use std::io::Write;
    use tempfile::TempDir;
    use tokio::time::Instant;

    struct Fixture {
        dir: TempDir,
        options: LoginOptions,
    }

    impl Fixture {
        fn new(env: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let images = dir.path().join("images");
            std::fs::create_dir(&images).unwrap();
            let env_file = dir.path().join(".env");
            let mut file = std::fs::File::create(&env_file).unwrap();
            write!(file, "{}", env).unwrap();

            Self {
                options: LoginOptions { env_file, images },
                dir,
            }
        }

        fn complete() -> Self {
            Self::new("BINARY_PATH=/opt/cynteract/Cynteract\nUSER=robot@example.com\nPASSWORD=hunter2\n")
        }
    }

    fn quiet() -> RunOptions {
        RunOptions {
            quiet: true,
            ..RunOptions::new("login-test")
        }
    }

    fn click(template: &str) -> Action {
        Action::Click(template.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_flow_passes() {
        let fixture = Fixture::complete();
        let mut screen = ScriptedScreen::new();

        let result = run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
            .await
            .unwrap();

        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.steps_run, 13);
        assert_eq!(
            screen.ui_actions(),
            vec![
                &Action::Open(PathBuf::from("/opt/cynteract/Cynteract")),
                &click("LoginLink.png"),
                &click("Email.png"),
                &Action::Type("robot@example.com".to_string()),
                &Action::Key(Key::Tab),
                &Action::Type("hunter2".to_string()),
                &click("LoginButton.png"),
                &click("Game_center.png"),
                &click("Back.png"),
                &click("Settings.png"),
                &click("Logout.png"),
            ]
        );
        assert_eq!(
            screen.actions()[0],
            Action::AddImagePath(fixture.dir.path().join("images"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_follows_tab_key() {
        let fixture = Fixture::complete();
        let mut screen = ScriptedScreen::new();
        run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
            .await
            .unwrap();

        let ui = screen.ui_actions();
        let password = ui
            .iter()
            .position(|a| **a == Action::Type("hunter2".to_string()))
            .unwrap();
        assert_eq!(*ui[password - 1], Action::Key(Key::Tab));
        assert!(!ui.contains(&&click("Password.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_center_not_shown_fails_after_five_seconds() {
        let fixture = Fixture::complete();
        let mut screen = ScriptedScreen::new().missing("Please_connect.png");

        let start = Instant::now();
        let result = run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(!result.passed);
        assert_eq!(result.steps_run, 9);
        assert!(result.error.unwrap().contains(GAME_CENTER_MESSAGE));
        assert!(elapsed >= GAME_CENTER_WAIT, "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(5100), "{:?}", elapsed);
        // Nothing after the failed check
        assert_eq!(screen.lookups("Back.png"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_screen_not_back_fails() {
        let fixture = Fixture::complete();
        let mut screen = ScriptedScreen::new().missing("LoginTitle.png");

        let result = run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.steps_run, 13);
        assert_eq!(
            result.error.as_deref(),
            Some("Test assertion failed: Login screen should be displayed after logout")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_missing_click_target_stops_the_run() {
        let clicked = [
            "LoginLink.png",
            "Email.png",
            "LoginButton.png",
            "Game_center.png",
            "Back.png",
            "Settings.png",
            "Logout.png",
        ];

        for template in clicked {
            let fixture = Fixture::complete();
            let mut screen = ScriptedScreen::new().missing(template);

            let result = run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
                .await
                .unwrap();

            assert!(!result.passed, "{template}");
            let error = result.error.unwrap();
            assert!(error.contains(template), "{template}: {error}");
            assert!(error.starts_with("Could not find"), "{error}");
            assert_eq!(
                screen.actions().last(),
                Some(&Action::Locate(template.to_string())),
                "{template}"
            );
            assert!(!screen.ui_actions().contains(&&click(template)));
        }
    }

    #[tokio::test]
    async fn test_missing_env_file_aborts_before_ui() {
        let fixture = Fixture::complete();
        let options = LoginOptions {
            env_file: fixture.dir.path().join("missing.env"),
            ..fixture.options.clone()
        };
        let mut screen = ScriptedScreen::new();

        let err = run_login(&mut screen, &options, &Config::default(), &quiet())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EnvFileRead { .. }));
        assert!(err.to_string().contains("missing.env"));
        assert!(screen.ui_actions().is_empty());
        assert_eq!(screen.lookups("LoginLink.png"), 0);
    }

    #[tokio::test]
    async fn test_missing_key_aborts_before_ui() {
        let fixture = Fixture::new("BINARY_PATH=/opt/app\nUSER=robot\n");
        let mut screen = ScriptedScreen::new();

        let err = run_login(&mut screen, &fixture.options, &Config::default(), &quiet())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingKey { ref key, .. } if key == "PASSWORD"));
        assert!(screen.ui_actions().is_empty());
    }

    #[test]
    fn test_login_config_round_trip() {
        let env = EnvFile::parse(
            std::path::Path::new(".env"),
            "BINARY_PATH=/opt/cynteract/Cynteract\nUSER=robot@example.com\nPASSWORD=p@ss=w0rd\n",
        )
        .unwrap();

        let config = LoginConfig::from_env(&env).unwrap();
        assert_eq!(config.binary_path, PathBuf::from("/opt/cynteract/Cynteract"));
        assert_eq!(config.user, "robot@example.com");
        assert_eq!(config.password, "p@ss=w0rd");
        assert!(!format!("{:?}", config).contains("p@ss"));
    }

    #[test]
    fn test_steps_use_every_template() {
        let config = LoginConfig {
            binary_path: PathBuf::from("/opt/app"),
            user: "u".to_string(),
            password: "p".to_string(),
        };
        let used: Vec<String> = login_steps(&config)
            .into_iter()
            .filter_map(|step| match step {
                Step::Click { template, .. } | Step::Assert { template, .. } => Some(template),
                _ => None,
            })
            .collect();
        assert_eq!(used, LOGIN_TEMPLATES);
    }
}
