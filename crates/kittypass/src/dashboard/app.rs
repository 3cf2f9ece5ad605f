//! Dashboard state and key handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use kittypass::{login, vault, Login, LoginSummary, OpenVault, Storage, VaultRef, VaultSummary};
use zeroize::Zeroizing;

/// Which pane has the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Vaults,
    Logins,
    Detail,
}

/// What the event loop does after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Feedback shown in the footer until the next action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub is_error: bool,
}

/// Master password being typed for a vault
pub struct Prompt {
    pub vault_name: String,
    pub input: Zeroizing<String>,
}

/// Application state
///
/// At most one vault is unlocked at a time. Its key is dropped (and
/// zeroized) when the user locks it or browses into another vault.
pub struct App<'a> {
    store: &'a Storage,
    pub focus: Focus,
    pub show_help: bool,
    pub reveal: bool,
    pub status: Option<Status>,
    pub prompt: Option<Prompt>,

    // Data
    pub vaults: Vec<VaultSummary>,
    pub vault_index: usize,
    pub logins: Vec<LoginSummary>,
    pub login_index: usize,
    pub logins_vault: Option<String>,
    pub open: Option<OpenVault>,
    pub detail: Option<Login>,
}

impl<'a> App<'a> {
    pub fn new(store: &'a Storage) -> Self {
        Self {
            store,
            focus: Focus::default(),
            show_help: false,
            reveal: false,
            status: None,
            prompt: None,
            vaults: Vec::new(),
            vault_index: 0,
            logins: Vec::new(),
            login_index: 0,
            logins_vault: None,
            open: None,
            detail: None,
        }
    }

    pub fn refresh(&mut self) {
        match vault::list(self.store, None) {
            Ok(vaults) => {
                self.vaults = vaults;
                self.vault_index = self.vault_index.min(self.vaults.len().saturating_sub(1));
            }
            Err(err) => self.fail(format!("Failed to load vaults: {err}")),
        }
    }

    pub fn open_vault_name(&self) -> Option<&str> {
        self.open.as_ref().map(|v| v.name())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        // Typed characters belong to the password while the prompt is up
        if self.prompt.is_some() {
            self.prompt_key(key.code);
            return Flow::Continue;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Esc if self.focus == Focus::Vaults => return Flow::Quit,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('x') => self.lock(),
            KeyCode::Char('s') if self.focus == Focus::Detail => self.reveal = !self.reveal,
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => self.enter(),
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => self.back(),
            _ => {}
        }
        Flow::Continue
    }

    /// Forget the unlocked vault and anything decrypted with it
    pub fn lock(&mut self) {
        self.detail = None;
        self.reveal = false;
        if self.focus == Focus::Detail {
            self.focus = Focus::Logins;
        }
        if let Some(open) = self.open.take() {
            self.notify(format!("Locked vault '{}'", open.name()));
        }
    }

    fn move_down(&mut self) {
        match self.focus {
            Focus::Vaults if self.vault_index + 1 < self.vaults.len() => self.vault_index += 1,
            Focus::Logins if self.login_index + 1 < self.logins.len() => self.login_index += 1,
            _ => {}
        }
    }

    fn move_up(&mut self) {
        match self.focus {
            Focus::Vaults => self.vault_index = self.vault_index.saturating_sub(1),
            Focus::Logins => self.login_index = self.login_index.saturating_sub(1),
            Focus::Detail => {}
        }
    }

    fn enter(&mut self) {
        match self.focus {
            Focus::Vaults => self.load_logins(),
            Focus::Logins => self.show_login(),
            Focus::Detail => {}
        }
    }

    fn back(&mut self) {
        match self.focus {
            Focus::Detail => {
                self.detail = None;
                self.reveal = false;
                self.focus = Focus::Logins;
            }
            Focus::Logins => self.focus = Focus::Vaults,
            Focus::Vaults => {}
        }
    }

    /// List the selected vault's logins (metadata only, no password needed)
    fn load_logins(&mut self) {
        let Some(name) = self.vaults.get(self.vault_index).map(|v| v.name.clone()) else {
            return;
        };

        if self.open_vault_name().is_some_and(|open| open != name) {
            self.lock();
        }

        let store = self.store;
        let listed = vault::open(store, &name)
            .and_then(|locked| login::list(store, Some(locked.vault_id()), None, None));
        match listed {
            Ok(logins) => {
                self.logins = logins;
                self.login_index = 0;
                self.logins_vault = Some(name);
                self.focus = Focus::Logins;
            }
            Err(err) => self.fail(format!("Failed to list logins of '{name}': {err}")),
        }
    }

    fn show_login(&mut self) {
        let Some(vault_name) = self.logins_vault.clone() else {
            return;
        };
        if self.logins.get(self.login_index).is_none() {
            return;
        }

        if self.open_vault_name() == Some(vault_name.as_str()) {
            self.decrypt_selected();
        } else {
            self.prompt = Some(Prompt {
                vault_name,
                input: Zeroizing::new(String::with_capacity(64)),
            });
        }
    }

    fn decrypt_selected(&mut self) {
        let decrypted = match (&self.open, self.logins.get(self.login_index)) {
            (Some(open), Some(summary)) => open
                .get_login(self.store, &summary.name)
                .map_err(|err| format!("Failed to decrypt '{}': {err}", summary.name)),
            _ => return,
        };

        match decrypted {
            Ok(login) => {
                self.detail = Some(login);
                self.reveal = false;
                self.focus = Focus::Detail;
            }
            Err(message) => self.fail(message),
        }
    }

    fn prompt_key(&mut self, code: KeyCode) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };

        match code {
            KeyCode::Char(c) => prompt.input.push(c),
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit(prompt);
                }
            }
            _ => {}
        }
    }

    fn submit(&mut self, prompt: Prompt) {
        let unlocked = vault::open(self.store, &prompt.vault_name)
            .and_then(|locked| locked.unlock(&prompt.input));

        match unlocked {
            Ok(open) => {
                self.open = Some(open);
                self.notify(format!("Unlocked vault '{}'", prompt.vault_name));
                self.decrypt_selected();
            }
            Err(err) => self.fail(format!("Could not unlock '{}': {err}", prompt.vault_name)),
        }
    }

    fn notify(&mut self, message: String) {
        self.status = Some(Status {
            message,
            is_error: false,
        });
    }

    fn fail(&mut self, message: String) {
        self.status = Some(Status {
            message,
            is_error: true,
        });
    }
}
