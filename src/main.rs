mod ui;

use keyflow::auth::{AuthGate, CredentialStore, Identity};
use keyflow::config::{Config, ConfigStore, FileConfigStore, LoginFile, SourceKind};
use keyflow::notify::Notifier;
use keyflow::passage::{LocalWordListSource, PassageError, PassageSource, RemoteQuoteSource};
use keyflow::runtime::{
    spawn_passage_fetch, AppEvent, CrosstermEventSource, FixedTicker, Runner,
};
use keyflow::session::Session;
use keyflow::store::{HistoryDb, StatRecord};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::mpsc::Sender,
    sync::Arc,
    time::{Duration, Instant},
};

const TICK_RATE_MS: u64 = 100;
/// The "well done" pause before the next passage is requested.
const PASSAGE_SWAP_DELAY: Duration = Duration::from_millis(1500);
const RECENT_LIMIT: usize = 10;

/// terminal typing-speed trainer with per-user history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing-speed trainer: type the shown passage, watch live wpm and accuracy, and keep a per-user history of finished sessions."
)]
pub struct Cli {
    /// where passages come from
    #[clap(short = 'S', long, value_enum)]
    source: Option<SourceKind>,

    /// number of words per passage for the local word-list source
    #[clap(short = 'w', long)]
    words: Option<usize>,

    /// quote API endpoint for the remote source
    #[clap(long)]
    quote_url: Option<String>,

    /// run without accounts; finished sessions are not persisted
    #[clap(long)]
    no_auth: bool,

    /// override the history/credentials database path
    #[clap(long)]
    db: Option<PathBuf>,

    /// print a user's full history as CSV to stdout and exit
    #[clap(long, value_name = "USER")]
    export_csv: Option<String>,
}

impl Cli {
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(words) = self.words {
            cfg.number_of_words = words;
        }
        if let Some(url) = &self.quote_url {
            cfg.quote_url = url.clone();
        }
        if self.no_auth {
            cfg.no_auth = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Typing,
    History,
}

/// Shared username/password form for the login and register screens.
#[derive(Debug, Default)]
pub struct AuthForm {
    pub username: String,
    pub password: String,
    pub focus_password: bool,
}

impl AuthForm {
    fn focused_field(&mut self) -> &mut String {
        if self.focus_password {
            &mut self.password
        } else {
            &mut self.username
        }
    }
}

/// Startup identity: a remembered login is admitted only while its account
/// still exists in the credential table; a stale one is forgotten and the
/// login form is shown instead.
fn resolve_identity(
    login_file: &LoginFile,
    auth: Option<&CredentialStore>,
) -> (Option<Identity>, Screen) {
    let Some(store) = auth else {
        return (None, Screen::Typing);
    };
    match login_file.remembered() {
        Some(username) if store.user_exists(&username).unwrap_or(false) => {
            (Some(Identity { username }), Screen::Typing)
        }
        Some(_) => {
            let _ = login_file.forget();
            (None, Screen::Login)
        }
        None => (None, Screen::Login),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    pub session: Session,
    source: Arc<dyn PassageSource>,
    history: Option<HistoryDb>,
    auth: Option<Box<dyn AuthGate>>,
    login_file: LoginFile,
    pub notifier: Notifier,
    pub identity: Option<Identity>,
    pub screen: Screen,
    pub form: AuthForm,
    pub recent: Vec<StatRecord>,
    pub loading: bool,
    pending_reload_at: Option<Instant>,
    tx: Sender<AppEvent>,
}

impl App {
    #[allow(clippy::too_many_arguments)]
    fn new(
        source: Arc<dyn PassageSource>,
        history: Option<HistoryDb>,
        auth: Option<Box<dyn AuthGate>>,
        login_file: LoginFile,
        identity: Option<Identity>,
        screen: Screen,
        tx: Sender<AppEvent>,
    ) -> Self {
        Self {
            session: Session::new(),
            source,
            history,
            auth,
            login_file,
            notifier: Notifier::default(),
            identity,
            screen,
            form: AuthForm::default(),
            recent: Vec::new(),
            loading: false,
            pending_reload_at: None,
            tx,
        }
    }

    /// Wire up production collaborators from config.
    fn bootstrap(cfg: &Config, db_path: &Path, tx: Sender<AppEvent>) -> Result<Self, Box<dyn Error>> {
        let source: Arc<dyn PassageSource> = match cfg.source {
            SourceKind::Remote => Arc::new(RemoteQuoteSource::new(cfg.quote_url.clone())),
            SourceKind::Local => Arc::new(LocalWordListSource::new(cfg.number_of_words)?),
        };

        let history = Some(HistoryDb::open(db_path)?);
        let auth = if cfg.no_auth {
            None
        } else {
            Some(CredentialStore::open(db_path)?)
        };

        let login_file = LoginFile::new();
        let (identity, screen) = resolve_identity(&login_file, auth.as_ref());
        let auth = auth.map(|store| Box::new(store) as Box<dyn AuthGate>);

        Ok(Self::new(
            source, history, auth, login_file, identity, screen, tx,
        ))
    }

    /// Ask the passage source for the next text, tagged with the current
    /// session generation so a stale answer is dropped on arrival.
    fn request_passage(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.pending_reload_at = None;
        spawn_passage_fetch(self.tx.clone(), self.source.clone(), self.session.generation());
    }

    fn on_passage(&mut self, generation: u64, result: Result<String, PassageError>) {
        // At most one fetch is in flight; any arrival ends it, stale or not,
        // so the next request is free to go out.
        self.loading = false;
        if generation != self.session.generation() {
            // A reset or newer load superseded this fetch.
            return;
        }
        match result {
            Ok(text) => self.session.load_passage(&text),
            Err(_) => self
                .notifier
                .show("Failed to load text. Please try again."),
        }
    }

    fn on_tick(&mut self) {
        self.notifier.sweep(Instant::now());
        if let Some(at) = self.pending_reload_at {
            if Instant::now() >= at {
                self.pending_reload_at = None;
                self.request_passage();
            }
        }
    }

    /// The session just reached full exact match: persist the record (when a
    /// user is present), announce, and schedule the next passage.
    fn complete_session(&mut self) {
        let metrics = self.session.metrics();
        self.notifier.show("Well done! Loading new text...");

        if let (Some(identity), Some(db)) = (&self.identity, &self.history) {
            let record = StatRecord::now(&identity.username, metrics.wpm, metrics.accuracy);
            if db.append(&record).is_err() {
                self.notifier.show("Could not save your result.");
            }
        }

        self.pending_reload_at = Some(Instant::now() + PASSAGE_SWAP_DELAY);
    }

    fn load_recent(&mut self) {
        self.recent = match (&self.identity, &self.history) {
            (Some(identity), Some(db)) => db
                .recent_for_user(&identity.username, RECENT_LIMIT)
                .unwrap_or_default(),
            _ => Vec::new(),
        };
    }

    fn submit_login(&mut self) {
        let Some(auth) = &self.auth else { return };
        match auth.login(&self.form.username, &self.form.password) {
            Ok(identity) => {
                let _ = self.login_file.remember(&identity.username);
                self.notifier
                    .show(format!("Welcome, {}!", identity.username));
                self.identity = Some(identity);
                self.form = AuthForm::default();
                self.screen = Screen::Typing;
                self.request_passage();
            }
            Err(e) => self.notifier.show(e.to_string()),
        }
    }

    fn submit_register(&mut self) {
        let Some(auth) = &self.auth else { return };
        match auth.register(&self.form.username, &self.form.password) {
            Ok(()) => {
                self.notifier.show("Account created!");
                self.form.password.clear();
                self.form.focus_password = true;
                self.screen = Screen::Login;
            }
            Err(e) => self.notifier.show(e.to_string()),
        }
    }

    fn logout(&mut self) {
        let _ = self.login_file.forget();
        self.identity = None;
        self.recent.clear();
        self.form = AuthForm::default();
        self.screen = Screen::Login;
        self.pending_reload_at = None;
        self.session.reset();
    }

    fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.screen {
            Screen::Login | Screen::Register => self.on_auth_key(key),
            Screen::Typing => self.on_typing_key(key),
            Screen::History => self.on_history_key(key),
        }
    }

    fn on_auth_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Tab | KeyCode::BackTab => {
                self.form.focus_password = !self.form.focus_password;
            }
            KeyCode::Enter => match self.screen {
                Screen::Login => self.submit_login(),
                _ => self.submit_register(),
            },
            KeyCode::Backspace => {
                self.form.focused_field().pop();
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.screen = if self.screen == Screen::Login {
                    Screen::Register
                } else {
                    Screen::Login
                };
                self.form.password.clear();
                self.form.focus_password = false;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.form.focused_field().push(c);
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_typing_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Backspace => {
                // Deleting a trailing excess char can also finish the passage.
                let was_complete = self.session.is_complete();
                self.session.pop_char();
                if !was_complete && self.session.is_complete() {
                    self.complete_session();
                }
            }
            KeyCode::Left => {
                // Restart the same passage; supersedes any pending load.
                self.pending_reload_at = None;
                self.session.reset();
            }
            KeyCode::Right => {
                self.pending_reload_at = None;
                self.request_passage();
            }
            KeyCode::Tab => {
                self.load_recent();
                self.screen = Screen::History;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let was_complete = self.session.is_complete();
                self.session.push_char(c);
                if !was_complete && self.session.is_complete() {
                    self.complete_session();
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_history_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Tab | KeyCode::Char('b') => {
                self.screen = Screen::Typing;
            }
            KeyCode::Char('e') => self.export_history(),
            KeyCode::Char('o') if self.auth.is_some() => self.logout(),
            _ => {}
        }
        Flow::Continue
    }

    fn export_history(&mut self) {
        let (Some(identity), Some(db)) = (&self.identity, &self.history) else {
            self.notifier.show("No history to export.");
            return;
        };
        let path = format!("keyflow_{}.csv", identity.username);
        let result = std::fs::File::create(&path)
            .map_err(|e| e.into())
            .and_then(|file| db.export_csv(&identity.username, file));
        match result {
            Ok(()) => self.notifier.show(format!("Exported to {}", path)),
            Err(_) => self.notifier.show("Export failed."),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let mut cfg = config_store.load();
    cli.apply_to(&mut cfg);
    let _ = config_store.save(&cfg);

    let db_path = cli
        .db
        .clone()
        .or_else(HistoryDb::default_db_path)
        .unwrap_or_else(|| PathBuf::from("keyflow.db"));

    if let Some(user) = &cli.export_csv {
        let db = HistoryDb::open(&db_path)?;
        db.export_csv(user, io::stdout())?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, events) = CrosstermEventSource::new();
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));
    let mut app = App::bootstrap(&cfg, &db_path, tx)?;

    let result = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    if app.screen == Screen::Typing {
        app.request_passage();
    }

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Passage { generation, result } => app.on_passage(generation, result),
            AppEvent::Key(key) => {
                if app.on_key(key) == Flow::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyflow::session::Phase;
    use std::sync::mpsc::{self, Receiver};

    struct FixedSource(String);

    impl PassageSource for FixedSource {
        fn next_passage(&self) -> Result<String, PassageError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl PassageSource for BrokenSource {
        fn next_passage(&self) -> Result<String, PassageError> {
            Err(PassageError::Empty)
        }
    }

    fn test_app(source: Arc<dyn PassageSource>) -> (App, Receiver<AppEvent>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let history = Some(HistoryDb::open_in_memory().unwrap());
        let auth: Option<Box<dyn AuthGate>> =
            Some(Box::new(CredentialStore::open_in_memory().unwrap()));
        let login_file = LoginFile::with_path(dir.path().join("login.json"));
        let app = App::new(source, history, auth, login_file, None, Screen::Login, tx);
        (app, rx, dir)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_chars(app: &mut App, s: &str) {
        for c in s.chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["keyflow"]);
        assert_eq!(cli.source, None);
        assert_eq!(cli.words, None);
        assert!(!cli.no_auth);
        assert_eq!(cli.export_csv, None);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "keyflow",
            "-S",
            "local",
            "-w",
            "30",
            "--no-auth",
            "--quote-url",
            "http://localhost:1/q",
        ]);
        let mut cfg = Config::default();
        cli.apply_to(&mut cfg);

        assert_eq!(cfg.source, SourceKind::Local);
        assert_eq!(cfg.number_of_words, 30);
        assert!(cfg.no_auth);
        assert_eq!(cfg.quote_url, "http://localhost:1/q");
    }

    #[test]
    fn test_cli_without_flags_keeps_config() {
        let cli = Cli::parse_from(["keyflow"]);
        let mut cfg = Config {
            source: SourceKind::Local,
            number_of_words: 42,
            quote_url: "http://example/q".into(),
            no_auth: false,
        };
        cli.apply_to(&mut cfg);
        assert_eq!(cfg.number_of_words, 42);
        assert_eq!(cfg.source, SourceKind::Local);
    }

    #[test]
    fn test_register_then_login_reaches_typing_screen() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));

        app.screen = Screen::Register;
        type_chars(&mut app, "ada");
        app.on_key(key(KeyCode::Tab));
        type_chars(&mut app, "pw");
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.notifier.current(), Some("Account created!"));

        // Username survives; retype the password.
        type_chars(&mut app, "pw");
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.screen, Screen::Typing);
        assert_eq!(app.identity.as_ref().unwrap().username, "ada");
        assert!(app.loading);
    }

    #[test]
    fn test_login_failure_shows_notice_and_stays() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));

        type_chars(&mut app, "nobody");
        app.on_key(key(KeyCode::Tab));
        type_chars(&mut app, "pw");
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.screen, Screen::Login);
        assert!(app.identity.is_none());
        assert_eq!(app.notifier.current(), Some("Invalid credentials."));
    }

    #[test]
    fn test_login_remembers_user() {
        let (mut app, _rx, dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Register;
        type_chars(&mut app, "ada");
        app.on_key(key(KeyCode::Tab));
        type_chars(&mut app, "pw");
        app.on_key(key(KeyCode::Enter));
        type_chars(&mut app, "pw");
        app.on_key(key(KeyCode::Enter));

        let login_file = LoginFile::with_path(dir.path().join("login.json"));
        assert_eq!(login_file.remembered(), Some("ada".to_string()));
    }

    #[test]
    fn test_passage_delivery_loads_session() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.request_passage();

        let generation = app.session.generation();
        app.on_passage(generation, Ok("hello world".into()));

        assert!(!app.loading);
        assert_eq!(app.session.passage_str(), "hello world");
        assert_eq!(app.session.phase(), Phase::AwaitingFirstKeystroke);
    }

    #[test]
    fn test_stale_passage_is_dropped() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.request_passage();
        let old_generation = app.session.generation();

        // A reset supersedes the in-flight fetch.
        app.session.load_passage("current");
        app.on_passage(old_generation, Ok("stale".into()));

        assert_eq!(app.session.passage_str(), "current");
        // The in-flight fetch is over either way.
        assert!(!app.loading);
    }

    #[test]
    fn test_superseded_fetch_leaves_loading_usable() {
        let (mut app, rx, _dir) = test_app(Arc::new(FixedSource("next".into())));
        app.screen = Screen::Typing;
        app.request_passage();
        let old_generation = app.session.generation();
        // Swallow the spawned fetch's channel delivery; the same result is
        // handed to on_passage below, after it has gone stale.
        let _ = rx.recv_timeout(Duration::from_secs(1)).unwrap();

        app.session.load_passage("current");
        app.on_passage(old_generation, Ok("stale".into()));
        assert!(!app.loading);

        // The next request must actually go out and its result apply.
        app.request_passage();
        assert!(app.loading);
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            AppEvent::Passage { generation, result } => app.on_passage(generation, result),
            other => panic!("expected Passage event, got {:?}", other),
        }
        assert_eq!(app.session.passage_str(), "next");
        assert!(!app.loading);
    }

    #[test]
    fn test_passage_failure_keeps_previous_and_notifies() {
        let (mut app, _rx, _dir) = test_app(Arc::new(BrokenSource));
        app.screen = Screen::Typing;
        app.session.load_passage("keep me");
        app.request_passage();

        app.on_passage(app.session.generation(), Err(PassageError::Empty));

        assert_eq!(app.session.passage_str(), "keep me");
        assert_eq!(
            app.notifier.current(),
            Some("Failed to load text. Please try again.")
        );
    }

    #[test]
    fn test_completion_persists_record_for_logged_in_user() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.identity = Some(Identity {
            username: "ada".into(),
        });
        app.session.load_passage("hi");

        type_chars(&mut app, "hi");

        assert!(app.session.is_complete());
        assert_eq!(app.notifier.current(), Some("Well done! Loading new text..."));
        assert!(app.pending_reload_at.is_some());

        let records = app
            .history
            .as_ref()
            .unwrap()
            .recent_for_user("ada", 10)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accuracy, 100);
        assert_eq!(records[0].wpm, app.session.metrics().wpm);
    }

    #[test]
    fn test_completion_without_identity_persists_nothing() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("hi");

        type_chars(&mut app, "hi");

        assert!(app.session.is_complete());
        // Nothing for any user; scan with an empty username too.
        let db = app.history.as_ref().unwrap();
        assert!(db.recent_for_user("", 10).unwrap().is_empty());
    }

    #[test]
    fn test_completion_fires_exactly_once() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.identity = Some(Identity {
            username: "ada".into(),
        });
        app.session.load_passage("hi");

        type_chars(&mut app, "hi");
        // Extra keystrokes after completion change nothing.
        type_chars(&mut app, "xyz");

        let records = app
            .history
            .as_ref()
            .unwrap()
            .recent_for_user("ada", 10)
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_restart_cancels_pending_reload() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("next".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("hi");
        type_chars(&mut app, "hi");
        assert!(app.pending_reload_at.is_some());

        app.on_key(key(KeyCode::Left));

        assert!(app.pending_reload_at.is_none());
        assert_eq!(app.session.phase(), Phase::AwaitingFirstKeystroke);
        assert_eq!(app.session.passage_str(), "hi");
    }

    #[test]
    fn test_pending_reload_fires_on_tick() {
        let (mut app, rx, _dir) = test_app(Arc::new(FixedSource("next".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("hi");
        type_chars(&mut app, "hi");

        // Pull the deadline into the past, then tick.
        app.pending_reload_at = Some(Instant::now() - Duration::from_millis(1));
        app.on_tick();

        assert!(app.pending_reload_at.is_none());
        assert!(app.loading);
        // The fetch result arrives through the channel, tagged with the
        // generation that asked for it.
        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        match event {
            AppEvent::Passage { generation, result } => {
                assert_eq!(generation, app.session.generation());
                assert_eq!(result.unwrap(), "next");
            }
            other => panic!("expected Passage event, got {:?}", other),
        }
    }

    #[test]
    fn test_typing_before_passage_loads_is_ignored() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        // No passage yet; session is Idle.
        type_chars(&mut app, "abc");
        assert_eq!(app.session.phase(), Phase::Idle);
        assert!(app.session.typed().is_empty());
    }

    #[test]
    fn test_history_screen_lists_only_current_user() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        let db = app.history.as_ref().unwrap();
        db.append(&StatRecord::now("ada", 50, 95)).unwrap();
        db.append(&StatRecord::now("grace", 70, 99)).unwrap();

        app.identity = Some(Identity {
            username: "ada".into(),
        });
        app.screen = Screen::Typing;
        app.on_key(key(KeyCode::Tab));

        assert_eq!(app.screen, Screen::History);
        assert_eq!(app.recent.len(), 1);
        assert_eq!(app.recent[0].user, "ada");
    }

    #[test]
    fn test_logout_from_history_screen() {
        let (mut app, _rx, dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.identity = Some(Identity {
            username: "ada".into(),
        });
        let login_file = LoginFile::with_path(dir.path().join("login.json"));
        login_file.remember("ada").unwrap();

        app.screen = Screen::History;
        app.on_key(key(KeyCode::Char('o')));

        assert_eq!(app.screen, Screen::Login);
        assert!(app.identity.is_none());
        assert_eq!(login_file.remembered(), None);
    }

    #[test]
    fn test_remembered_login_requires_existing_account() {
        let dir = tempfile::tempdir().unwrap();
        let login_file = LoginFile::with_path(dir.path().join("login.json"));
        let store = CredentialStore::open_in_memory().unwrap();
        login_file.remember("ada").unwrap();

        // Account is gone (say, a wiped db): back to the login form, and the
        // stale remembered login is dropped.
        let (identity, screen) = resolve_identity(&login_file, Some(&store));
        assert!(identity.is_none());
        assert_eq!(screen, Screen::Login);
        assert_eq!(login_file.remembered(), None);

        // With the account present it goes straight to typing.
        store.register("ada", "pw").unwrap();
        login_file.remember("ada").unwrap();
        let (identity, screen) = resolve_identity(&login_file, Some(&store));
        assert_eq!(identity.unwrap().username, "ada");
        assert_eq!(screen, Screen::Typing);
    }

    #[test]
    fn test_resolve_identity_without_auth_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        let login_file = LoginFile::with_path(dir.path().join("login.json"));

        let (identity, screen) = resolve_identity(&login_file, None);
        assert!(identity.is_none());
        assert_eq!(screen, Screen::Typing);
    }

    #[test]
    fn test_backspace_into_completion_persists_record() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.identity = Some(Identity {
            username: "ada".into(),
        });
        app.session.load_passage("cat");
        app.session.set_typed("cats");
        assert!(!app.session.is_complete());

        app.on_key(key(KeyCode::Backspace));

        assert!(app.session.is_complete());
        assert_eq!(app.notifier.current(), Some("Well done! Loading new text..."));
        assert!(app.pending_reload_at.is_some());
        let records = app
            .history
            .as_ref()
            .unwrap()
            .recent_for_user("ada", 10)
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_esc_quits_everywhere() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        for screen in [Screen::Login, Screen::Register, Screen::Typing, Screen::History] {
            app.screen = screen;
            assert_eq!(app.on_key(key(KeyCode::Esc)), Flow::Quit);
        }
    }

    #[test]
    fn test_ctrl_c_quits_while_typing() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("ccc");
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(ctrl_c), Flow::Quit);
        // And it was not treated as typed input.
        assert!(app.session.typed().is_empty());
    }

    #[test]
    fn test_backspace_edits_typed_input() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("cat");
        type_chars(&mut app, "cx");
        app.on_key(key(KeyCode::Backspace));
        type_chars(&mut app, "at");

        assert!(app.session.is_complete());
    }

    #[test]
    fn test_auth_form_toggle_and_edit() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        type_chars(&mut app, "ada");
        app.on_key(key(KeyCode::Tab));
        type_chars(&mut app, "secret");
        app.on_key(key(KeyCode::Backspace));

        assert_eq!(app.form.username, "ada");
        assert_eq!(app.form.password, "secre");
    }

    #[test]
    fn test_ctrl_r_toggles_login_register() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);

        app.on_key(ctrl_r);
        assert_eq!(app.screen, Screen::Register);
        app.on_key(ctrl_r);
        assert_eq!(app.screen, Screen::Login);
    }

    #[test]
    fn test_release_events_are_ignored() {
        let (mut app, _rx, _dir) = test_app(Arc::new(FixedSource("hi".into())));
        app.screen = Screen::Typing;
        app.session.load_passage("hi");

        let mut release = KeyEvent::new(KeyCode::Char('h'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        app.on_key(release);

        assert!(app.session.typed().is_empty());
    }
}
