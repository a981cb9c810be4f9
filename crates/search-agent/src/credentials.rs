//! API key resolution.
//!
//! Keys are looked up in a list of secret stores, usually the secrets file
//! followed by the process environment. A required key that no store has
//! can still be typed in by the user, if a [`Prompter`] is available.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;
use tokio::io::AsyncWriteExt;

use crate::input::LineReader;

/// The model API key.
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
/// The Hugging Face token. It's recognised but nothing uses it yet.
pub const HF_TOKEN: &str = "HF_TOKEN";
/// The LangChain telemetry key. Recognised for compatibility with existing
/// secrets files; no telemetry is sent.
pub const LANGCHAIN_API_KEY: &str = "LANGCHAIN_API_KEY";

/// The keys resolved at startup.
pub const DEFAULT_KEYS: [KeySpec; 3] = [
    KeySpec::required(GROQ_API_KEY),
    KeySpec::optional(HF_TOKEN),
    KeySpec::optional(LANGCHAIN_API_KEY),
];

/// An error that stops the program before the chat begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required key was found nowhere.
    #[error("{0} is required, set it in the secrets file or the environment")]
    MissingCredential(String),
    /// The secrets file exists but can't be read.
    #[error("failed to read secrets file {}: {source}", path.display())]
    ReadSecrets {
        /// The secrets file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: io::Error,
    },
    /// The secrets file isn't a TOML table.
    #[error("malformed secrets file {}: {source}", path.display())]
    MalformedSecrets {
        /// The secrets file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// A key to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySpec {
    /// The key name, the same in every store.
    pub name: &'static str,
    /// Whether resolution fails without it.
    pub required: bool,
}

impl KeySpec {
    /// Describes a key that must be present.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    /// Describes a key that may be absent.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// A source of secret values.
pub trait SecretStore: Send + Sync {
    /// Returns a short name of the store for logging.
    fn name(&self) -> &str;

    /// Returns the raw value of a key, if the store has one.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Secrets read from a flat TOML table, such as:
///
/// ```toml
/// GROQ_API_KEY = "gsk_..."
/// ```
#[derive(Default)]
pub struct FileSecrets {
    values: HashMap<String, String>,
}

impl FileSecrets {
    /// Reads a secrets file. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            ConfigurationError::ReadSecrets {
                path: path.to_owned(),
                source,
            }
        })?;
        Self::parse(&content).map_err(|source| {
            ConfigurationError::MalformedSecrets {
                path: path.to_owned(),
                source,
            }
        })
    }

    /// Reads a secrets file, treating a missing file as an empty one.
    pub fn load_if_exists(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            debug!("no secrets file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let mut values = HashMap::with_capacity(table.len());
        for (key, value) in table {
            match value {
                toml::Value::String(value) => {
                    values.insert(key, value);
                }
                _ => warn!("ignoring non-string secret `{key}`"),
            }
        }
        Ok(Self { values })
    }
}

impl SecretStore for FileSecrets {
    fn name(&self) -> &str {
        "secrets file"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Secrets from the process environment.
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SecretStore for HashMap<String, String> {
    fn name(&self) -> &str {
        "map"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Asks the user for a missing key.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Returns what the user entered, or `None` if they couldn't.
    async fn prompt(&self, key: &str) -> Option<String>;
}

/// Prompts on stderr and reads the answer from the shared input.
///
/// On a terminal the key is typed without echo. Otherwise one line is read,
/// so a key can be piped in ahead of the chat input.
pub struct TerminalPrompter {
    input: LineReader,
    masked: bool,
}

impl TerminalPrompter {
    /// Creates a prompter that masks the entry if stdin is a terminal.
    pub fn new(input: LineReader) -> Self {
        Self {
            input,
            masked: std::io::stdin().is_tty(),
        }
    }

    /// Overrides whether the entry is masked.
    #[inline]
    pub fn with_masking(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, key: &str) -> Option<String> {
        let mut stderr = tokio::io::stderr();
        let question = format!("Enter your {key}: ");
        stderr.write_all(question.as_bytes()).await.ok()?;
        stderr.flush().await.ok()?;

        if !self.masked {
            return self.input.read_line().await;
        }

        let secret = tokio::task::spawn_blocking(read_masked).await;
        // Enter isn't echoed in raw mode.
        let _ = stderr.write_all(b"\n").await;
        match secret {
            Ok(Ok(secret)) => secret,
            Ok(Err(err)) => {
                error!("error reading input: {err}");
                None
            }
            Err(err) => {
                error!("input task failed: {err}");
                None
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SecretEdit {
    Pending,
    Submitted,
    Aborted,
}

fn edit_secret(secret: &mut String, key: KeyEvent) -> SecretEdit {
    match (key.code, key.modifiers) {
        (KeyCode::Enter, _) => SecretEdit::Submitted,
        (KeyCode::Esc, _)
        | (KeyCode::Char('c' | 'd'), KeyModifiers::CONTROL) => {
            SecretEdit::Aborted
        }
        (KeyCode::Backspace, _) => {
            secret.pop();
            SecretEdit::Pending
        }
        (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
            secret.push(c);
            SecretEdit::Pending
        }
        _ => SecretEdit::Pending,
    }
}

fn read_masked() -> io::Result<Option<String>> {
    terminal::enable_raw_mode()?;
    let secret = read_masked_keys();
    let restored = terminal::disable_raw_mode();
    let secret = secret?;
    restored?;
    Ok(secret)
}

fn read_masked_keys() -> io::Result<Option<String>> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match edit_secret(&mut secret, key) {
            SecretEdit::Pending => {}
            SecretEdit::Submitted => return Ok(Some(secret)),
            SecretEdit::Aborted => return Ok(None),
        }
    }
}

/// Resolved keys. The values never show up in `Debug` output.
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Returns the value of a resolved key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `true` if the key was resolved.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|key| (key, "<redacted>")))
            .finish()
    }
}

/// Looks up keys in stores, in order, then asks the prompter.
#[derive(Default)]
pub struct Resolver {
    stores: Vec<Box<dyn SecretStore>>,
    prompter: Option<Box<dyn Prompter>>,
}

impl Resolver {
    /// Creates a resolver with no stores and no prompter.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a store. Earlier stores take precedence.
    #[inline]
    pub fn with_store<S: SecretStore + 'static>(mut self, store: S) -> Self {
        self.stores.push(Box::new(store));
        self
    }

    /// Sets the prompter used for missing required keys.
    #[inline]
    pub fn with_prompter<P: Prompter + 'static>(mut self, prompter: P) -> Self {
        self.prompter = Some(Box::new(prompter));
        self
    }

    /// Resolves every key, failing on the first required key that stays
    /// absent.
    pub async fn resolve(
        &self,
        keys: &[KeySpec],
    ) -> Result<Credentials, ConfigurationError> {
        let mut credentials = Credentials::default();
        for spec in keys {
            match self.resolve_key(spec).await {
                Some(value) => {
                    credentials.values.insert(spec.name.to_owned(), value);
                }
                None if spec.required => {
                    error!("missing required credential {}", spec.name);
                    return Err(ConfigurationError::MissingCredential(
                        spec.name.to_owned(),
                    ));
                }
                None => debug!("optional credential {} is not set", spec.name),
            }
        }
        Ok(credentials)
    }

    async fn resolve_key(&self, spec: &KeySpec) -> Option<String> {
        for store in &self.stores {
            if let Some(value) = non_empty(store.lookup(spec.name)) {
                debug!("found {} in {}", spec.name, store.name());
                return Some(value);
            }
        }
        if !spec.required {
            return None;
        }
        let prompter = self.prompter.as_ref()?;
        non_empty(prompter.prompt(spec.name).await)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Returns where the secrets file is read from by default.
pub fn default_secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("search-agent").join("secrets.toml"))
}
