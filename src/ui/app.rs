use std::io::stdout;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyModifiers,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info, warn};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;
use tui_widgets::popup::PopupState;

use crate::clipboard;
use crate::config::{Config, UiColors};
use crate::convert::Converter;
use crate::error::ConvertError;
use crate::export;
use crate::provider::ConversionConfig;
use crate::session::{Applied, Mode, Session};
use crate::transport::HttpTransport;

use super::draw;
use super::edit::TextEditor;
use super::panes::Panel;

/// Outcome of a conversion, sent back from the worker thread together with
/// the mode and text it was started with.
struct JobResult {
    mode: Mode,
    input: String,
    result: Result<String, ConvertError>,
}

#[derive(Debug, Clone)]
pub struct HelpModal {
    pub scroll: usize,
    pub total_lines: usize,
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10, // Will be updated during render
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

/// A section in the help modal (e.g., "Global", "Batch list")
pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

/// A single help entry (action name + key bindings)
pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Provider,
    BaseUrl,
    ApiKey,
    Model,
}

impl SettingsField {
    pub const ALL: [SettingsField; 4] = [
        SettingsField::Provider,
        SettingsField::BaseUrl,
        SettingsField::ApiKey,
        SettingsField::Model,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::Provider => "PROVIDER",
            SettingsField::BaseUrl => "BASE URL",
            SettingsField::ApiKey => "API KEY",
            SettingsField::Model => "MODEL",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Draft of the conversion settings. Nothing changes until it is confirmed.
#[derive(Debug, Clone)]
pub struct SettingsModal {
    pub use_custom_endpoint: bool,
    pub base_url: Input,
    pub api_key: Input,
    pub model: Input,
    pub focus: SettingsField,
}

impl SettingsModal {
    fn from_config(config: &ConversionConfig) -> Self {
        Self {
            use_custom_endpoint: config.use_custom_endpoint,
            base_url: Input::new(config.base_url.clone()),
            api_key: Input::new(config.api_key.clone().unwrap_or_default()),
            model: Input::new(config.model.clone()),
            focus: SettingsField::Provider,
        }
    }

    pub fn input(&self, field: SettingsField) -> Option<&Input> {
        match field {
            SettingsField::Provider => None,
            SettingsField::BaseUrl => Some(&self.base_url),
            SettingsField::ApiKey => Some(&self.api_key),
            SettingsField::Model => Some(&self.model),
        }
    }

    fn input_mut(&mut self, field: SettingsField) -> Option<&mut Input> {
        match field {
            SettingsField::Provider => None,
            SettingsField::BaseUrl => Some(&mut self.base_url),
            SettingsField::ApiKey => Some(&mut self.api_key),
            SettingsField::Model => Some(&mut self.model),
        }
    }

    /// Write the draft into `config`; the hosted key is left alone.
    fn apply_to(&self, config: &mut ConversionConfig) {
        config.use_custom_endpoint = self.use_custom_endpoint;
        config.base_url = self.base_url.value().trim().to_string();
        let api_key = self.api_key.value().trim();
        config.api_key = (!api_key.is_empty()).then(|| api_key.to_string());
        config.model = self.model.value().trim().to_string();
    }
}

pub struct App<'a> {
    config: &'a Config,
    pub session: Session,
    converter: Arc<Converter>,
    pub editor: TextEditor,
    pub focus: Panel,
    pub output_scroll: u16,
    pub batch_selected: usize,
    pub status: Option<String>,
    /// Mode of the conversion currently running on the worker thread.
    in_flight: Option<Mode>,
    results_tx: Sender<JobResult>,
    results_rx: Receiver<JobResult>,
    pub help_modal: Option<HelpModal>,
    pub settings_modal: Option<SettingsModal>,
    pub modal_popup: PopupState,
}

impl<'a> App<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_converter(config, Converter::new(Box::new(transport))))
    }

    pub fn with_converter(config: &'a Config, converter: Converter) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            config,
            session: Session::new(config.conversion.clone()),
            converter: Arc::new(converter),
            editor: TextEditor::default(),
            focus: Panel::Input,
            output_scroll: 0,
            batch_selected: 0,
            status: None,
            in_flight: None,
            results_tx,
            results_rx,
            help_modal: None,
            settings_modal: None,
            modal_popup: PopupState::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableBracketedPaste)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableBracketedPaste)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            self.poll_results();
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Paste(text) => {
                        if self.help_modal.is_none() && self.settings_modal.is_none() {
                            self.focus = Panel::Input;
                            self.editor.insert_str(&text);
                            self.session.input = self.editor.text();
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits (hardcoded for safety)
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return Ok(false);
        }

        if self.settings_modal.is_some() {
            self.handle_settings_key(key);
            return Ok(false);
        }

        if self.handle_global_key(key) {
            return Ok(true);
        }
        Ok(false)
    }

    /// Returns `true` when the app should quit.
    fn handle_global_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let global = &config.keys.global;

        if key_matches_any(&key, &global.quit) {
            return true;
        }
        if key_matches_any(&key, &global.help) {
            self.show_help();
        } else if key_matches_any(&key, &global.convert) {
            self.start_conversion();
        } else if key_matches_any(&key, &global.toggle_mode) {
            self.toggle_mode();
        } else if key_matches_any(&key, &global.settings) {
            self.open_settings();
        } else if key_matches_any(&key, &global.paste) {
            self.paste_from_clipboard();
        } else if key_matches_any(&key, &global.copy) {
            self.copy_output();
        } else if key_matches_any(&key, &global.export) {
            self.export_output();
        } else if key_matches_any(&key, &global.focus_next) {
            self.focus = self.focus.next(self.session.mode());
        } else if key_matches_any(&key, &global.focus_prev) {
            self.focus = self.focus.prev(self.session.mode());
        } else {
            match self.focus {
                Panel::Input => {
                    if self.editor.handle_key_event(key) {
                        self.session.input = self.editor.text();
                    }
                }
                Panel::Output => self.handle_output_key(key),
                Panel::Batch => self.handle_batch_key(key),
            }
        }
        false
    }

    fn handle_output_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.output_scroll = self.output_scroll.saturating_add(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.output_scroll = self.output_scroll.saturating_sub(1);
            }
            KeyCode::PageDown => self.output_scroll = self.output_scroll.saturating_add(10),
            KeyCode::PageUp => self.output_scroll = self.output_scroll.saturating_sub(10),
            KeyCode::Char('g') | KeyCode::Home => self.output_scroll = 0,
            _ => {}
        }
        let max = self.session.output().lines().count().saturating_sub(1);
        self.output_scroll = self.output_scroll.min(max as u16);
    }

    fn handle_batch_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let keys = &config.keys.batch;
        let len = self.session.batch().len();

        if key_matches_any(&key, &keys.next) {
            if self.batch_selected + 1 < len {
                self.batch_selected += 1;
            }
        } else if key_matches_any(&key, &keys.prev) {
            self.batch_selected = self.batch_selected.saturating_sub(1);
        } else if key_matches_any(&key, &keys.remove) {
            self.remove_selected_record();
        } else if key_matches_any(&key, &keys.clear) {
            self.session.batch_mut().clear();
            self.batch_selected = 0;
            self.output_scroll = 0;
            self.set_status("Batch cleared");
        }
    }

    fn remove_selected_record(&mut self) {
        let Some(record) = self.session.batch().records().get(self.batch_selected) else {
            self.set_status("Batch is empty");
            return;
        };
        let id = record.id;
        let name = record.display_name.clone();

        if self.session.batch_mut().remove(id) {
            let len = self.session.batch().len();
            self.batch_selected = self.batch_selected.min(len.saturating_sub(1));
            self.set_status(format!("Removed {} ({} left)", name, len));
        }
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    pub fn is_converting(&self) -> bool {
        self.in_flight.is_some()
    }

    fn start_conversion(&mut self) {
        if self.in_flight.is_some() || self.converter.is_busy() {
            return;
        }

        let input = self.editor.text();
        self.session.input = input.clone();
        if input.trim().is_empty() {
            self.set_status(ConvertError::EmptyInput.to_string());
            return;
        }

        let mode = self.session.mode();
        let conversion = self.session.conversion.clone();
        let converter = Arc::clone(&self.converter);
        let tx = self.results_tx.clone();

        info!(mode = mode.title(), provider = %conversion.describe(), "starting conversion");
        self.in_flight = Some(mode);
        self.status = None;

        thread::spawn(move || {
            let result = converter.convert(&conversion, &input);
            let _ = tx.send(JobResult {
                mode,
                input,
                result,
            });
        });
    }

    fn poll_results(&mut self) {
        while let Ok(job) = self.results_rx.try_recv() {
            self.finish_conversion(job);
        }
    }

    fn finish_conversion(&mut self, job: JobResult) {
        self.in_flight = None;

        match job.result {
            Ok(vcard) => match self.session.apply_result(job.mode, &job.input, vcard) {
                Applied::Single => {
                    self.output_scroll = 0;
                    self.set_status("Conversion complete");
                }
                Applied::Added { name, total } => {
                    self.batch_selected = total - 1;
                    self.set_status(format!(
                        "Added {} to the batch ({} contacts)",
                        name, total
                    ));
                }
            },
            Err(ConvertError::Busy) => {
                warn!("conversion rejected: another request is in flight");
            }
            Err(err) => {
                error!(mode = job.mode.title(), "conversion failed: {}", err);
                self.set_status(format!(
                    "Conversion failed: {}. Check the LLM settings and try again",
                    err
                ));
            }
        }

        if self.session.input != self.editor.text() {
            let input = self.session.input.clone();
            self.set_input_text(&input);
        }
    }

    // =========================================================================
    // Mode, clipboard, export
    // =========================================================================

    fn toggle_mode(&mut self) {
        self.session.toggle_mode();
        self.editor.clear();
        self.output_scroll = 0;
        if !Panel::visible(self.session.mode()).contains(&self.focus) {
            self.focus = Panel::Input;
        }
        self.set_status(format!("{} mode", self.session.mode().title()));
    }

    fn set_input_text(&mut self, text: &str) {
        self.editor.set_text(text);
        self.session.input = self.editor.text();
    }

    fn set_input(&mut self, text: &str) {
        self.set_input_text(text);
        self.focus = Panel::Input;
    }

    fn paste_from_clipboard(&mut self) {
        match clipboard::paste(self.config.commands.paste.as_ref()) {
            Ok(text) => {
                self.set_input(&text);
                self.set_status("Pasted from clipboard");
            }
            Err(err) => {
                warn!("paste failed: {}", err);
                self.set_status(format!("{}; paste the text manually", err));
            }
        }
    }

    fn copy_output(&mut self) {
        let content = self.session.output();
        if content.trim().is_empty() {
            self.set_status("Nothing to copy");
            return;
        }

        match clipboard::copy(self.config.commands.copy.as_ref(), content) {
            Ok(()) => {
                let message = match self.session.mode() {
                    Mode::Single => "vCard copied to clipboard".to_string(),
                    Mode::Batch => format!(
                        "Batch vCards copied to clipboard ({} contacts)",
                        self.session.batch().len()
                    ),
                };
                self.set_status(message);
            }
            Err(err) => {
                warn!("copy failed: {}", err);
                self.set_status(format!("{}; copy the output manually", err));
            }
        }
    }

    fn export_output(&mut self) {
        let name = self.session.export_file_name();
        match export::write_export(&self.config.export_dir, &name, self.session.output()) {
            Ok(Some(path)) => self.set_status(format!("Exported {}", path.display())),
            Ok(None) => self.set_status("Nothing to export"),
            Err(err) => {
                error!("export failed: {:#}", err);
                self.set_status(format!("Export failed: {:#}", err));
            }
        }
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    // =========================================================================
    // Settings Modal
    // =========================================================================

    fn open_settings(&mut self) {
        self.modal_popup = PopupState::default();
        self.settings_modal = Some(SettingsModal::from_config(&self.session.conversion));
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let keys = &config.keys.settings;
        let Some(modal) = self.settings_modal.as_mut() else {
            return;
        };

        if key_matches_any(&key, &keys.cancel) {
            self.settings_modal = None;
            self.set_status("Settings unchanged");
        } else if key_matches_any(&key, &keys.confirm) {
            modal.apply_to(&mut self.session.conversion);
            self.settings_modal = None;
            info!(provider = %self.session.conversion.describe(), "settings updated");
            self.set_status(format!("Using {}", self.session.conversion.describe()));
        } else if key_matches_any(&key, &keys.next) {
            modal.focus = modal.focus.next();
        } else if key_matches_any(&key, &keys.prev) {
            modal.focus = modal.focus.prev();
        } else if modal.focus == SettingsField::Provider {
            if key_matches_any(&key, &keys.toggle) {
                modal.use_custom_endpoint = !modal.use_custom_endpoint;
            }
        } else if let Some(input) = modal.input_mut(modal.focus) {
            input.handle_event(&Event::Key(key));
        }
    }

    // =========================================================================
    // Help Modal
    // =========================================================================

    /// Generate help content from current keybindings configuration
    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    help_entry("Quit", &keys.global.quit),
                    help_entry("Help", &keys.global.help),
                    help_entry("Convert", &keys.global.convert),
                    help_entry("Single/batch mode", &keys.global.toggle_mode),
                    help_entry("LLM settings", &keys.global.settings),
                    help_entry("Paste input", &keys.global.paste),
                    help_entry("Copy output", &keys.global.copy),
                    help_entry("Export .vcf", &keys.global.export),
                    help_entry("Next pane", &keys.global.focus_next),
                    help_entry("Previous pane", &keys.global.focus_prev),
                ],
            },
            HelpSection {
                title: "Batch list",
                entries: vec![
                    help_entry("Next contact", &keys.batch.next),
                    help_entry("Previous contact", &keys.batch.prev),
                    help_entry("Remove contact", &keys.batch.remove),
                    help_entry("Clear batch", &keys.batch.clear),
                ],
            },
            HelpSection {
                title: "Settings",
                entries: vec![
                    help_entry("Save", &keys.settings.confirm),
                    help_entry("Cancel", &keys.settings.cancel),
                    help_entry("Next field", &keys.settings.next),
                    help_entry("Previous field", &keys.settings.prev),
                    help_entry("Switch provider", &keys.settings.toggle),
                ],
            },
            HelpSection {
                title: "Output",
                entries: vec![
                    HelpEntry {
                        action: "Scroll",
                        keys: "j/k, Up/Down, PageUp/PageDown".to_string(),
                    },
                    HelpEntry {
                        action: "Top",
                        keys: "g, Home".to_string(),
                    },
                ],
            },
        ]
    }

    fn help_total_lines(&self) -> usize {
        self.help_entries()
            .iter()
            .map(|section| section.entries.len() + 2)
            .sum()
    }

    pub fn show_help(&mut self) {
        let total_lines = self.help_total_lines();
        self.help_modal = Some(HelpModal::new(total_lines));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
            self.help_modal = None;
            return;
        }

        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => modal.scroll_down(1),
            KeyCode::Char('k') | KeyCode::Up => modal.scroll_up(1),
            KeyCode::PageDown => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_down(page);
            }
            KeyCode::PageUp => {
                let page = modal.viewport_height.saturating_sub(1).max(1);
                modal.scroll_up(page);
            }
            _ => {}
        }
    }
}

fn help_entry(action: &'static str, bindings: &[String]) -> HelpEntry {
    HelpEntry {
        action,
        keys: bindings.join(", "),
    }
}

/// Check if the key event matches any of the bindings in the list
fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("ctrl+") {
        let mut chars = rest.chars();
        return match (chars.next(), chars.next()) {
            (Some(first), None) => {
                event.modifiers.contains(KeyModifiers::CONTROL)
                    && !event.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER)
                    && matches!(event.code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&first))
            }
            _ => false,
        };
    }

    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match lower.as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "delete" | "del" => matches!(event.code, KeyCode::Delete),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return event.code == KeyCode::F(n);
            }
            // Single character - case-sensitive (x != X, since X requires Shift)
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;

    use serde_json::{json, Value};

    use crate::provider::OutboundRequest;
    use crate::transport::Transport;

    const CARD: &str = "BEGIN:VCARD\nVERSION:3.0\nFN:Jane Doe\nEND:VCARD";

    /// Replies to every request with the next queued hosted-style body.
    struct QueueTransport {
        replies: Mutex<Vec<Result<Value, ConvertError>>>,
    }

    impl QueueTransport {
        fn new(replies: Vec<Result<Value, ConvertError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    impl Transport for QueueTransport {
        fn send(&self, _request: &OutboundRequest) -> Result<Value, ConvertError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(ConvertError::Transport("no reply queued".into()));
            }
            replies.remove(0)
        }
    }

    fn hosted_reply(text: &str) -> Result<Value, ConvertError> {
        Ok(json!({ "content": [{ "type": "text", "text": text }] }))
    }

    fn test_config() -> (tempfile::TempDir, Config) {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::load(Some(&temp.path().join("absent.toml"))).unwrap();
        config.export_dir = PathBuf::from(temp.path());
        (temp, config)
    }

    fn app_with(config: &Config, replies: Vec<Result<Value, ConvertError>>) -> App<'_> {
        App::with_converter(
            config,
            Converter::new(Box::new(QueueTransport::new(replies))),
        )
    }

    fn press(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> bool {
        app.handle_key(KeyEvent::new(code, modifiers)).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    fn wait_for_result(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.is_converting() && Instant::now() < deadline {
            app.poll_results();
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!app.is_converting(), "conversion did not finish");
    }

    #[test]
    fn test_key_matching() {
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert!(key_matches_single(&ctrl_r, "Ctrl+r"));
        assert!(key_matches_single(&ctrl_r, "ctrl+R"));
        assert!(!key_matches_single(&ctrl_r, "r"));

        let f5 = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
        assert!(key_matches_single(&f5, "F5"));
        assert!(!key_matches_single(&f5, "F50"));

        let upper_x = KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT);
        assert!(key_matches_single(&upper_x, "X"));
        assert!(!key_matches_single(&upper_x, "x"));

        let f = KeyEvent::new(KeyCode::Char('f'), KeyModifiers::NONE);
        assert!(key_matches_single(&f, "f"));
    }

    #[test]
    fn test_single_conversion_fills_output() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![hosted_reply(CARD)]);

        type_text(&mut app, "Jane Doe, jane@x.com");
        assert_eq!(app.session.input, "Jane Doe, jane@x.com");
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        wait_for_result(&mut app);

        assert_eq!(app.session.output(), CARD);
        // Single mode keeps the input.
        assert_eq!(app.editor.text(), "Jane Doe, jane@x.com");
    }

    #[test]
    fn test_empty_input_does_not_start_conversion() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![]);
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        assert!(!app.is_converting());
        assert!(app.status.as_deref().unwrap().contains("input text is empty"));
    }

    #[test]
    fn test_failed_conversion_keeps_previous_output() {
        let (_temp, config) = test_config();
        let mut app = app_with(
            &config,
            vec![
                hosted_reply(CARD),
                Err(ConvertError::Transport("connection refused".into())),
            ],
        );
        type_text(&mut app, "Jane");
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        wait_for_result(&mut app);

        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        wait_for_result(&mut app);

        assert_eq!(app.session.output(), CARD);
        let status = app.status.clone().unwrap();
        assert!(status.contains("connection refused"));
    }

    #[test]
    fn test_batch_conversion_adds_record_and_clears_input() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![hosted_reply(CARD)]);

        press(&mut app, KeyCode::F(2), KeyModifiers::NONE);
        assert_eq!(app.session.mode(), Mode::Batch);
        type_text(&mut app, "Jane Doe");
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        wait_for_result(&mut app);

        assert_eq!(app.session.batch().len(), 1);
        assert!(app.editor.is_empty());
        assert!(app.status.as_deref().unwrap().contains("Jane Doe"));
    }

    #[test]
    fn test_batch_keys_remove_and_clear() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![hosted_reply(CARD), hosted_reply(CARD)]);

        press(&mut app, KeyCode::F(2), KeyModifiers::NONE);
        for _ in 0..2 {
            type_text(&mut app, "Jane Doe");
            press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
            wait_for_result(&mut app);
        }
        assert_eq!(app.session.batch().len(), 2);

        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.focus, Panel::Batch);
        press(&mut app, KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(app.session.batch().len(), 1);
        assert_eq!(app.batch_selected, 0);

        press(&mut app, KeyCode::Char('X'), KeyModifiers::SHIFT);
        assert!(app.session.batch().is_empty());
        assert_eq!(app.session.output(), "");
    }

    #[test]
    fn test_toggle_mode_clears_editor() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![]);
        type_text(&mut app, "draft");
        press(&mut app, KeyCode::Char('b'), KeyModifiers::CONTROL);
        assert_eq!(app.session.mode(), Mode::Batch);
        assert!(app.editor.is_empty());
        assert_eq!(app.session.input, "");
    }

    #[test]
    fn test_settings_confirm_and_cancel() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![]);

        press(&mut app, KeyCode::F(3), KeyModifiers::NONE);
        press(&mut app, KeyCode::Char(' '), KeyModifiers::NONE);
        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        assert!(app.settings_modal.is_none());
        assert!(!app.session.conversion.use_custom_endpoint);

        press(&mut app, KeyCode::F(3), KeyModifiers::NONE);
        press(&mut app, KeyCode::Char(' '), KeyModifiers::NONE);
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        type_text(&mut app, "sk-local");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);

        assert!(app.settings_modal.is_none());
        assert!(app.session.conversion.use_custom_endpoint);
        assert_eq!(app.session.conversion.api_key.as_deref(), Some("sk-local"));
        assert_eq!(app.session.conversion.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn test_export_writes_file() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![hosted_reply(CARD)]);

        press(&mut app, KeyCode::F(7), KeyModifiers::NONE);
        assert_eq!(app.status.as_deref(), Some("Nothing to export"));

        type_text(&mut app, "Jane");
        press(&mut app, KeyCode::F(5), KeyModifiers::NONE);
        wait_for_result(&mut app);
        press(&mut app, KeyCode::F(7), KeyModifiers::NONE);

        let written = config.export_dir.join("contact.vcf");
        assert_eq!(std::fs::read_to_string(written).unwrap(), CARD);
    }

    #[test]
    fn test_quit_keys() {
        let (_temp, config) = test_config();
        let mut app = app_with(&config, vec![]);
        assert!(press(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(press(&mut app, KeyCode::F(10), KeyModifiers::NONE));
        // Plain 'q' is text while typing.
        assert!(!press(&mut app, KeyCode::Char('q'), KeyModifiers::NONE));
        assert_eq!(app.editor.text(), "q");
    }
}
