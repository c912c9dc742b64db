use std::io;

use serde::{Deserialize, Serialize};

use crate::infra::{
    contracts::SecretStore,
    error::AppError,
    secret_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPolicy {
    pub attempts: usize,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self { attempts: 3 }
    }
}

/// The signed-in user as persisted under the `user` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: UserRecord,
    pub access_token: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

pub trait AuthTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()>;
    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdTerminal;

impl AuthTerminal for StdTerminal {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        println!("{line}");
        Ok(())
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        use std::io::Write;

        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_owned()))
    }

    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Ok(Some(secret.trim().to_owned())),
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Saved(UserRecord),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub removed_keys: usize,
}

/// Reads the stored credentials needed to talk to the backend.
pub fn load_identity(store: &dyn SecretStore) -> Result<Identity, AppError> {
    let access_token = store
        .get(ACCESS_TOKEN_KEY)?
        .filter(|token| !token.is_empty())
        .ok_or(AppError::NotLoggedIn)?;
    let user = store.get(USER_KEY)?.ok_or(AppError::NotLoggedIn)?;
    let user: UserRecord = serde_json::from_str(&user).map_err(AppError::InvalidUserRecord)?;

    Ok(Identity { user, access_token })
}

/// Interactive sign-in: collects the user id and the issued tokens, then stores them.
pub fn login(
    terminal: &mut dyn AuthTerminal,
    store: &dyn SecretStore,
    policy: &LoginPolicy,
) -> Result<LoginOutcome, AppError> {
    let outcome = collect_credentials(terminal, policy).map_err(AppError::TerminalIo)?;
    let Some(credentials) = outcome else {
        tracing::info!(code = "LOGIN_CANCELLED", "login cancelled");
        return Ok(LoginOutcome::Cancelled);
    };

    let user_json = serde_json::to_string(&credentials.user).map_err(AppError::InvalidUserRecord)?;
    store.set(ACCESS_TOKEN_KEY, &credentials.access_token)?;
    match &credentials.refresh_token {
        Some(refresh_token) => store.set(REFRESH_TOKEN_KEY, refresh_token)?,
        None => {
            store.remove(REFRESH_TOKEN_KEY)?;
        }
    }
    store.set(USER_KEY, &user_json)?;

    tracing::info!(
        code = "LOGIN_SAVED",
        user_id = %credentials.user.id,
        "credentials stored"
    );
    terminal
        .print_line(&format!(
            "Signed in as {}. Credentials saved.",
            credentials.user.display_name()
        ))
        .map_err(AppError::TerminalIo)?;

    Ok(LoginOutcome::Saved(credentials.user))
}

/// Forgets every stored credential.
pub fn logout(store: &dyn SecretStore) -> Result<LogoutOutcome, AppError> {
    let mut removed_keys = 0;
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
        if store.remove(key)? {
            removed_keys += 1;
        }
    }

    tracing::info!(code = "LOGOUT_DONE", removed_keys, "credentials removed");
    Ok(LogoutOutcome { removed_keys })
}

struct Credentials {
    user: UserRecord,
    access_token: String,
    refresh_token: Option<String>,
}

fn collect_credentials(
    terminal: &mut dyn AuthTerminal,
    policy: &LoginPolicy,
) -> io::Result<Option<Credentials>> {
    terminal.print_line("Sign in with the access token issued at registration.")?;

    let Some(user_id) = collect_required(
        terminal,
        policy.attempts,
        "User id: ",
        false,
        "User id must not be empty or contain spaces.",
    )?
    else {
        return Ok(None);
    };

    let Some(name) = terminal.prompt_line("Display name (optional): ")? else {
        terminal.print_line("Input cancelled (EOF). Run rchat login again to retry.")?;
        return Ok(None);
    };

    let Some(access_token) = collect_required(
        terminal,
        policy.attempts,
        "Access token: ",
        true,
        "Token must not be empty or contain spaces.",
    )?
    else {
        return Ok(None);
    };

    let Some(refresh_token) = terminal.prompt_secret("Refresh token (optional): ")? else {
        terminal.print_line("Input cancelled (EOF). Run rchat login again to retry.")?;
        return Ok(None);
    };

    Ok(Some(Credentials {
        user: UserRecord {
            id: user_id,
            name: non_empty(name),
        },
        access_token,
        refresh_token: non_empty(refresh_token),
    }))
}

fn collect_required(
    terminal: &mut dyn AuthTerminal,
    attempts: usize,
    prompt: &str,
    secret: bool,
    hint: &str,
) -> io::Result<Option<String>> {
    for attempt in 1..=attempts {
        let input = if secret {
            terminal.prompt_secret(prompt)?
        } else {
            terminal.prompt_line(prompt)?
        };
        let Some(value) = input else {
            terminal.print_line("Input cancelled (EOF). Run rchat login again to retry.")?;
            return Ok(None);
        };

        if is_single_token(&value) {
            return Ok(Some(value));
        }

        terminal.print_line(&format!(
            "{hint} Attempts left: {}",
            attempts.saturating_sub(attempt)
        ))?;
    }

    terminal.print_line("Too many invalid attempts. Run rchat login again to retry.")?;
    Ok(None)
}

fn is_single_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::infra::stubs::MemorySecretStore;

    struct FakeTerminal {
        inputs: VecDeque<Option<String>>,
        output: Vec<String>,
    }

    impl FakeTerminal {
        fn new(inputs: Vec<Option<&str>>) -> Self {
            Self {
                inputs: inputs
                    .into_iter()
                    .map(|item| item.map(|value| value.to_owned()))
                    .collect(),
                output: Vec::new(),
            }
        }
    }

    impl AuthTerminal for FakeTerminal {
        fn print_line(&mut self, line: &str) -> io::Result<()> {
            self.output.push(line.to_owned());
            Ok(())
        }

        fn prompt_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
            Ok(self.inputs.pop_front().flatten())
        }

        fn prompt_secret(&mut self, _prompt: &str) -> io::Result<Option<String>> {
            Ok(self.inputs.pop_front().flatten())
        }
    }

    #[test]
    fn login_stores_tokens_and_user_record() {
        let mut terminal = FakeTerminal::new(vec![
            Some("u1"),
            Some("Alice"),
            Some("access-1"),
            Some("refresh-1"),
        ]);
        let store = MemorySecretStore::default();

        let outcome =
            login(&mut terminal, &store, &LoginPolicy::default()).expect("login should succeed");

        let user = UserRecord {
            id: "u1".to_owned(),
            name: Some("Alice".to_owned()),
        };
        assert_eq!(outcome, LoginOutcome::Saved(user.clone()));
        let entries = store.snapshot();
        assert_eq!(entries.get(ACCESS_TOKEN_KEY).map(String::as_str), Some("access-1"));
        assert_eq!(entries.get(REFRESH_TOKEN_KEY).map(String::as_str), Some("refresh-1"));

        let identity = load_identity(&store).expect("identity should load");
        assert_eq!(identity.user, user);
        assert_eq!(identity.access_token, "access-1");
    }

    #[test]
    fn login_retries_invalid_user_id_then_accepts() {
        let mut terminal = FakeTerminal::new(vec![
            Some(""),
            Some("u 1"),
            Some("u1"),
            Some(""),
            Some("access-1"),
            Some(""),
        ]);
        let store = MemorySecretStore::with_entries(&[(REFRESH_TOKEN_KEY, "stale")]);

        let outcome =
            login(&mut terminal, &store, &LoginPolicy::default()).expect("login should succeed");

        assert!(matches!(outcome, LoginOutcome::Saved(ref user) if user.name.is_none()));
        assert!(terminal
            .output
            .iter()
            .any(|line| line.contains("Attempts left: 1")));
        assert!(!store.snapshot().contains_key(REFRESH_TOKEN_KEY));
    }

    #[test]
    fn login_gives_up_after_attempts_without_storing() {
        let mut terminal = FakeTerminal::new(vec![Some("u1"), Some(""), Some(""), Some("")]);
        let store = MemorySecretStore::default();
        let policy = LoginPolicy { attempts: 2 };

        let outcome = login(&mut terminal, &store, &policy).expect("login should not error");

        assert_eq!(outcome, LoginOutcome::Cancelled);
        assert!(store.snapshot().is_empty());
        assert!(terminal
            .output
            .iter()
            .any(|line| line.contains("Too many invalid attempts")));
    }

    #[test]
    fn login_is_cancelled_on_eof() {
        let mut terminal = FakeTerminal::new(vec![None]);
        let store = MemorySecretStore::default();

        let outcome =
            login(&mut terminal, &store, &LoginPolicy::default()).expect("login should not error");

        assert_eq!(outcome, LoginOutcome::Cancelled);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn load_identity_requires_token_and_user() {
        let empty = MemorySecretStore::default();
        let token_only = MemorySecretStore::with_entries(&[(ACCESS_TOKEN_KEY, "tok")]);

        assert!(matches!(load_identity(&empty), Err(AppError::NotLoggedIn)));
        assert!(matches!(load_identity(&token_only), Err(AppError::NotLoggedIn)));
    }

    #[test]
    fn load_identity_accepts_backend_user_document() {
        let store = MemorySecretStore::with_entries(&[
            (ACCESS_TOKEN_KEY, "tok"),
            (USER_KEY, r#"{"_id":"u9","name":"Bob","mobile":"+100"}"#),
        ]);

        let identity = load_identity(&store).expect("identity should load");

        assert_eq!(identity.user.id, "u9");
        assert_eq!(identity.user.display_name(), "Bob");
    }

    #[test]
    fn load_identity_rejects_corrupted_user_record() {
        let store =
            MemorySecretStore::with_entries(&[(ACCESS_TOKEN_KEY, "tok"), (USER_KEY, "{nope")]);

        assert!(matches!(
            load_identity(&store),
            Err(AppError::InvalidUserRecord(_))
        ));
    }

    #[test]
    fn identity_debug_hides_token() {
        let identity = Identity {
            user: UserRecord {
                id: "u1".to_owned(),
                name: None,
            },
            access_token: "super-secret".to_owned(),
        };

        assert!(!format!("{identity:?}").contains("super-secret"));
    }

    #[test]
    fn logout_removes_all_credentials() {
        let store = MemorySecretStore::with_entries(&[
            (ACCESS_TOKEN_KEY, "tok"),
            (USER_KEY, r#"{"id":"u1"}"#),
        ]);

        let outcome = logout(&store).expect("logout should succeed");

        assert_eq!(outcome.removed_keys, 2);
        assert!(store.snapshot().is_empty());
        assert_eq!(logout(&store).expect("second logout").removed_keys, 0);
    }
}
