//! Command handling for the penstroke terminal client.
//!
//! Each command maps onto one of the client routes. The route's guard runs
//! against the restored session before the command does, so signed-out users
//! are sent to sign-in and signed-in users skip the sign-in and sign-up
//! screens.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, warn};

use penstroke_core::auth::Access;
use penstroke_core::models::{LoginRequest, Note, SignUpRequest};
use penstroke_core::{ApiClient, Config, Outcome, RecordingNavigator, Route};

use crate::format::format_note_line;

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "PENSTROKE_PASSWORD";

/// Minimum password length accepted at sign-up
const MIN_PASSWORD_LENGTH: usize = 8;

/// A sign-up password needs at least one of these
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// How long to wait for the server to take a logout before exiting
const LOGOUT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

pub const USAGE: &str = "\
Usage: penstroke <command>

Commands:
  status                          Show who is signed in (default)
  signup <username> <email>       Create an account
  verify <code>                   Confirm the emailed verification code
  resend                          Email a new verification code
  login [email]                   Sign in
  logout                          Sign out
  whoami                          Print the signed-in user
  notes                           List your notes
  notes new <title> [content]     Create a note
  notes edit <id> <title> [content]
                                  Replace a note's title and content
  notes rm <id>                   Delete a note
  notes search <query>            Search your notes
  help                            Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesCommand {
    List,
    New { title: String, content: String },
    Edit { id: String, title: String, content: String },
    Remove { id: String },
    Search { query: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Signup { username: String, email: String },
    Verify { code: String },
    Resend,
    Login { email: Option<String> },
    Logout,
    WhoAmI,
    Notes(NotesCommand),
    Help,
}

impl Command {
    /// Parse command-line arguments (without the program name)
    pub fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match args.as_slice() {
            [] | ["status"] => Command::Status,
            ["help"] | ["--help"] | ["-h"] => Command::Help,
            ["signup", username, email] => Command::Signup {
                username: username.to_string(),
                email: email.to_string(),
            },
            ["verify", code] => Command::Verify {
                code: code.to_string(),
            },
            ["resend"] => Command::Resend,
            ["login"] => Command::Login { email: None },
            ["login", email] => Command::Login {
                email: Some(email.to_string()),
            },
            ["logout"] => Command::Logout,
            ["whoami"] => Command::WhoAmI,
            ["notes"] | ["notes", "list"] => Command::Notes(NotesCommand::List),
            ["notes", "new", title, content @ ..] => Command::Notes(NotesCommand::New {
                title: title.to_string(),
                content: content.join(" "),
            }),
            ["notes", "edit", id, title, content @ ..] => Command::Notes(NotesCommand::Edit {
                id: id.to_string(),
                title: title.to_string(),
                content: content.join(" "),
            }),
            ["notes", "rm", id] => Command::Notes(NotesCommand::Remove { id: id.to_string() }),
            ["notes", "search", query @ ..] if !query.is_empty() => {
                Command::Notes(NotesCommand::Search {
                    query: query.join(" "),
                })
            }
            _ => bail!("Unrecognized command: {}\n\n{}", args.join(" "), USAGE),
        };
        Ok(command)
    }

    /// Route this command runs under
    pub fn route(&self) -> Route {
        match self {
            Command::Signup { .. } => Route::Signup,
            Command::Verify { .. } | Command::Resend => Route::OtpVerification,
            Command::Login { .. } => Route::Login,
            Command::Notes(_) => Route::Notes,
            Command::Status | Command::Logout | Command::WhoAmI | Command::Help => Route::Landing,
        }
    }
}

/// How a command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finish {
    Done,
    /// Refused by the route guard: nobody is signed in
    SignInRequired,
    /// Refused by the route guard: a session already exists
    AlreadySignedIn,
    /// Refused by the route guard for another route
    Redirected(Route),
    /// The server ended the session while the command ran
    SessionEnded,
}

/// Sign-up password rules: length, plus a letter, a digit, and a symbol
fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!("Password must be at least {} characters long", MIN_PASSWORD_LENGTH);
    }
    let has_special = password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c));
    let has_number = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    if !(has_special && has_number && has_letter) {
        bail!("Password must contain at least one special character, one number, and one letter");
    }
    Ok(())
}

pub struct App {
    /// Config as stored on disk, without environment overrides
    stored_config: Config,
    api: ApiClient,
    navigator: Arc<RecordingNavigator>,
}

impl App {
    /// Create the client and restore any saved session
    pub fn new() -> Result<Self> {
        let stored_config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        let config = stored_config.clone().with_env_overrides();
        debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");

        let store = config.open_store()?;
        let navigator = Arc::new(RecordingNavigator::new());
        let api = ApiClient::new(&config, store, navigator.clone())?;
        Ok(Self::with_client(stored_config, api, navigator))
    }

    /// Wrap an existing client. `navigator` must be the one `api` was built with.
    pub fn with_client(
        stored_config: Config,
        api: ApiClient,
        navigator: Arc<RecordingNavigator>,
    ) -> Self {
        api.session().initialize();
        Self {
            stored_config,
            api,
            navigator,
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<Finish> {
        let state = self.api.session().wait_until_initialized().await;

        match self.api.session().access(command.route()) {
            Access::Render => {}
            Access::Waiting => {
                println!("Loading...");
                return Ok(Finish::Done);
            }
            Access::Redirect(Route::Login) => {
                println!("You are not signed in. Run `penstroke login <email>` first.");
                return Ok(Finish::SignInRequired);
            }
            Access::Redirect(Route::Notes) => {
                let name = state.current.map(|s| s.username).unwrap_or_default();
                println!("Already signed in as {}. Run `penstroke notes` to see your notes.", name);
                return Ok(Finish::AlreadySignedIn);
            }
            Access::Redirect(other) => {
                println!("Redirected to {}", other);
                return Ok(Finish::Redirected(other));
            }
        }

        let result = self.dispatch(command).await;

        // A full navigation means the session was evicted mid-command
        if let Some(location) = self.navigator.take() {
            if Route::from_path(&location) == Route::Login {
                println!("Your session has ended. Run `penstroke login` to sign in again.");
                return result.map(|()| Finish::SessionEnded);
            }
        }
        result.map(|()| Finish::Done)
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Status => self.status(),
            Command::Help => {
                println!("{}", USAGE);
                Ok(())
            }
            Command::Signup { username, email } => self.signup(username, email).await,
            Command::Verify { code } => self.verify(&code).await,
            Command::Resend => self.resend().await,
            Command::Login { email } => self.login(email).await,
            Command::Logout => {
                if let Some(task) = self.api.logout() {
                    if tokio::time::timeout(LOGOUT_NOTIFY_TIMEOUT, task).await.is_err() {
                        debug!("Server did not take the logout in time");
                    }
                }
                println!("Signed out.");
                Ok(())
            }
            Command::WhoAmI => {
                match self.api.session().current() {
                    Some(s) => println!("{} <{}> (id {})", s.username, s.email, s.user_id),
                    None => println!("Not signed in."),
                }
                Ok(())
            }
            Command::Notes(notes) => self.notes(notes).await,
        }
    }

    fn status(&self) -> Result<()> {
        match self.api.session().current() {
            Some(s) => println!("Signed in as {} <{}>.", s.username, s.email),
            None => match self.api.pending_signup_email() {
                Some(email) => println!(
                    "Waiting for the code sent to {}. Run `penstroke verify <code>`.",
                    email
                ),
                None => println!("Not signed in. Run `penstroke login <email>` or `penstroke signup`."),
            },
        }
        println!("Server: {}", self.api.base_url());
        Ok(())
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn signup(&mut self, username: String, email: String) -> Result<()> {
        if username.trim().is_empty() || email.trim().is_empty() {
            bail!("Username and email are required");
        }
        let password = Self::prompt_password()?;
        validate_password(&password)?;
        if std::env::var(PASSWORD_ENV).is_err() {
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if confirm != password {
                bail!("Passwords do not match");
            }
        }

        let request = SignUpRequest {
            username,
            email,
            password,
        };
        let Some(resp) = self.api.signup(&request).await?.completed() else {
            return Ok(());
        };
        if !resp.success {
            bail!(Self::message_or(resp.message, "Sign-up failed"));
        }
        println!(
            "Check {} for a verification code, then run `penstroke verify <code>`.",
            request.email
        );
        Ok(())
    }

    async fn verify(&mut self, code: &str) -> Result<()> {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            bail!("Verification code must be 6 digits");
        }
        let email = self.api.pending_signup_email();
        let Some(resp) = self.api.verify_otp(code).await?.completed() else {
            return Ok(());
        };
        if !resp.success {
            bail!(Self::message_or(resp.message, "Verification failed"));
        }
        match email {
            Some(email) => println!("Account verified. Run `penstroke login {}` to sign in.", email),
            None => println!("Account verified."),
        }
        Ok(())
    }

    async fn resend(&mut self) -> Result<()> {
        let Some(resp) = self.api.resend_otp().await?.completed() else {
            return Ok(());
        };
        if !resp.success {
            bail!(Self::message_or(resp.message, "Could not resend code"));
        }
        println!("A new code is on its way.");
        Ok(())
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.stored_config.last_email.clone()) {
            Some(email) => email,
            None => Self::prompt_line("Email: ")?,
        };
        if email.is_empty() {
            bail!("Email is required");
        }
        let password = Self::prompt_password()?;

        let request = LoginRequest {
            email: email.clone(),
            password,
        };
        let Some(resp) = self.api.login(&request).await?.completed() else {
            return Ok(());
        };
        if !resp.success {
            bail!(Self::message_or(resp.message, "Login failed"));
        }

        self.stored_config.last_email = Some(email);
        if let Err(e) = self.stored_config.save() {
            warn!(error = %e, "Failed to save config");
        }

        match self.api.session().current() {
            Some(s) => println!("Signed in as {}.", s.username),
            None => println!("Signed in."),
        }
        Ok(())
    }

    fn message_or(message: String, fallback: &str) -> String {
        if message.is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }

    fn prompt_line(prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn prompt_password() -> Result<String> {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            return Ok(password);
        }
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }

    // =========================================================================
    // Notes
    // =========================================================================

    async fn notes(&mut self, command: NotesCommand) -> Result<()> {
        match command {
            NotesCommand::List => {
                if let Outcome::Completed(notes) = self.api.my_notes().await? {
                    Self::print_notes(&notes, "You have no notes yet.");
                }
            }
            NotesCommand::Search { query } => {
                if let Outcome::Completed(notes) = self.api.search_my_notes(&query).await? {
                    Self::print_notes(&notes, "No matching notes.");
                }
            }
            NotesCommand::New { title, content } => {
                let draft = Note::draft(self.user_id()?, title.trim(), &content);
                if draft.title.is_empty() {
                    bail!("Title is required");
                }
                if let Outcome::Completed(note) = self.api.create_note(&draft).await? {
                    println!("Created note {}.", note.id.as_deref().unwrap_or("-"));
                }
            }
            NotesCommand::Edit { id, title, content } => {
                let mut note = Note::draft(self.user_id()?, title.trim(), &content);
                if note.title.is_empty() {
                    bail!("Title is required");
                }
                note.id = Some(id.clone());
                if let Outcome::Completed(_) = self.api.update_note(&id, &note).await? {
                    println!("Updated note {}.", id);
                }
            }
            NotesCommand::Remove { id } => {
                if let Outcome::Completed(()) = self.api.delete_note(&id).await? {
                    println!("Deleted note {}.", id);
                }
            }
        }
        Ok(())
    }

    fn user_id(&self) -> Result<i64> {
        self.api
            .session()
            .current()
            .map(|s| s.user_id)
            .ok_or_else(|| anyhow!("Not signed in"))
    }

    fn print_notes(notes: &[Note], empty_message: &str) {
        if notes.is_empty() {
            println!("{}", empty_message);
            return;
        }
        for note in notes {
            println!("{}", format_note_line(note));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_parse_auth_commands() {
        assert_eq!(parse(&[]).unwrap(), Command::Status);
        assert_eq!(
            parse(&["signup", "ada", "ada@example.com"]).unwrap(),
            Command::Signup {
                username: "ada".to_string(),
                email: "ada@example.com".to_string()
            }
        );
        assert_eq!(
            parse(&["verify", "123456"]).unwrap(),
            Command::Verify {
                code: "123456".to_string()
            }
        );
        assert_eq!(parse(&["login"]).unwrap(), Command::Login { email: None });
        assert_eq!(
            parse(&["login", "ada@example.com"]).unwrap(),
            Command::Login {
                email: Some("ada@example.com".to_string())
            }
        );
        assert_eq!(parse(&["logout"]).unwrap(), Command::Logout);
    }

    #[test]
    fn test_parse_notes_commands() {
        assert_eq!(parse(&["notes"]).unwrap(), Command::Notes(NotesCommand::List));
        assert_eq!(
            parse(&["notes", "new", "Groceries", "milk", "eggs"]).unwrap(),
            Command::Notes(NotesCommand::New {
                title: "Groceries".to_string(),
                content: "milk eggs".to_string()
            })
        );
        assert_eq!(
            parse(&["notes", "edit", "n1", "Title"]).unwrap(),
            Command::Notes(NotesCommand::Edit {
                id: "n1".to_string(),
                title: "Title".to_string(),
                content: String::new()
            })
        );
        assert_eq!(
            parse(&["notes", "search", "milk", "eggs"]).unwrap(),
            Command::Notes(NotesCommand::Search {
                query: "milk eggs".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(parse(&["notes", "search"]).is_err());
        assert!(parse(&["signup", "ada"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn test_command_routes() {
        assert_eq!(parse(&["notes"]).unwrap().route(), Route::Notes);
        assert_eq!(parse(&["login"]).unwrap().route(), Route::Login);
        assert_eq!(parse(&["signup", "a", "b"]).unwrap().route(), Route::Signup);
        assert_eq!(parse(&["resend"]).unwrap().route(), Route::OtpVerification);
        assert_eq!(parse(&["logout"]).unwrap().route(), Route::Landing);
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abc1!").is_err());
        assert!(validate_password("abcdefg1").is_err());
        assert!(validate_password("abcdefg!").is_err());
        assert!(validate_password("1234567!").is_err());
        assert!(validate_password("abcdef1!").is_ok());
    }

    // ===== Command flow against a scripted server =====

    use std::collections::VecDeque;

    use futures::future::{BoxFuture, FutureExt};
    use parking_lot::Mutex;
    use penstroke_core::api::{HttpRequest, HttpResponse, Transport};
    use penstroke_core::{MemoryStore, SessionRecord, TransportError};
    use reqwest::{StatusCode, Url};
    use serde_json::json;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn push_json(&self, status: StatusCode, body: serde_json::Value) {
            self.responses.lock().push_back(HttpResponse::json(status, &body));
        }

        fn paths(&self) -> Vec<String> {
            self.requests.lock().iter().map(|r| r.url.path().to_string()).collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            self.requests.lock().push(request);
            let next = self.responses.lock().pop_front();
            async move { next.ok_or_else(|| TransportError::Other("no scripted response".to_string())) }
                .boxed()
        }

        fn set_cookie(&self, _url: &Url, _cookie: &str) {}
    }

    fn app() -> (Arc<ScriptedTransport>, App) {
        let transport = Arc::new(ScriptedTransport::default());
        let navigator = Arc::new(RecordingNavigator::new());
        let api = ApiClient::with_transport(
            Url::parse("http://notes.test").unwrap(),
            transport.clone(),
            Arc::new(MemoryStore::new()),
            navigator.clone(),
        );
        (transport, App::with_client(Config::default(), api, navigator))
    }

    fn sign_in(app: &App) {
        app.api.session().login(SessionRecord {
            user_id: 7,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            access_token: "t1".to_string(),
        });
    }

    #[tokio::test]
    async fn test_notes_refused_when_signed_out() {
        let (transport, mut app) = app();
        let finish = app.run(Command::Notes(NotesCommand::List)).await.unwrap();
        assert_eq!(finish, Finish::SignInRequired);
        assert!(transport.paths().is_empty());
    }

    #[tokio::test]
    async fn test_login_refused_when_signed_in() {
        let (transport, mut app) = app();
        sign_in(&app);
        let finish = app
            .run(Command::Login {
                email: Some("ada@example.com".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(finish, Finish::AlreadySignedIn);
        assert!(transport.paths().is_empty());
    }

    #[tokio::test]
    async fn test_notes_listed_when_signed_in() {
        let (transport, mut app) = app();
        sign_in(&app);
        transport.push_json(StatusCode::OK, json!([]));

        let finish = app.run(Command::Notes(NotesCommand::List)).await.unwrap();
        assert_eq!(finish, Finish::Done);
        assert_eq!(transport.paths(), vec!["/api/notes/user/7"]);
    }

    #[tokio::test]
    async fn test_rejected_token_ends_session_and_blocks_next_command() {
        let (transport, mut app) = app();
        sign_in(&app);
        transport.push_json(StatusCode::UNAUTHORIZED, json!({"message": "Token invalid"}));

        let finish = app.run(Command::Notes(NotesCommand::List)).await.unwrap();
        assert_eq!(finish, Finish::SessionEnded);
        assert!(!app.api.session().is_authenticated());

        let finish = app.run(Command::Notes(NotesCommand::List)).await.unwrap();
        assert_eq!(finish, Finish::SignInRequired);
        assert_eq!(transport.paths().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_reaches_server_before_returning() {
        let (transport, mut app) = app();
        sign_in(&app);
        transport.push_json(StatusCode::OK, json!({"success": true}));

        let finish = app.run(Command::Logout).await.unwrap();
        assert_eq!(finish, Finish::Done);
        assert!(!app.api.session().is_authenticated());
        assert_eq!(transport.paths(), vec!["/auth/logout"]);
    }
}
