use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;
use tracing::warn;

use crate::provider::{ConversionConfig, DEFAULT_CUSTOM_BASE_URL, DEFAULT_CUSTOM_MODEL};

const CONFIG_FILE_NAME: &str = "config.toml";
pub const APP_NAME: &str = "cardsmith";
const HOSTED_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    /// Whether `config_path` existed when the configuration was loaded.
    pub from_file: bool,
    pub conversion: ConversionConfig,
    pub export_dir: PathBuf,
    pub keys: Keys,
    pub ui: UiConfig,
    pub commands: Commands,
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Commands {
    pub copy: Option<CommandExec>,
    pub paste: Option<CommandExec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExec {
    pub program: String,
    pub args: Vec<String>,
}

// =============================================================================
// Key Bindings
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone, Default)]
pub struct Keys {
    /// Work everywhere outside modals, including while typing
    pub global: GlobalKeys,
    /// Batch list pane
    pub batch: BatchKeys,
    /// Settings form
    pub settings: SettingsKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub help: Vec<String>,
    pub convert: Vec<String>,
    pub toggle_mode: Vec<String>,
    pub settings: Vec<String>,
    pub paste: Vec<String>,
    pub copy: Vec<String>,
    pub export: Vec<String>,
    pub focus_next: Vec<String>,
    pub focus_prev: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub remove: Vec<String>,
    pub clear: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SettingsKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub toggle: Vec<String>,
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: vec!["F10".into(), "Ctrl+q".into()],
            help: vec!["F1".into()],
            convert: vec!["F5".into(), "Ctrl+r".into()],
            toggle_mode: vec!["F2".into(), "Ctrl+b".into()],
            settings: vec!["F3".into(), "Ctrl+o".into()],
            paste: vec!["F4".into(), "Ctrl+v".into()],
            copy: vec!["F6".into(), "Ctrl+y".into()],
            export: vec!["F7".into(), "Ctrl+s".into()],
            focus_next: vec!["Tab".into()],
            focus_prev: vec!["Backtab".into()],
        }
    }
}

impl Default for BatchKeys {
    fn default() -> Self {
        Self {
            next: vec!["j".into(), "Down".into()],
            prev: vec!["k".into(), "Up".into()],
            remove: vec!["x".into(), "Delete".into()],
            clear: vec!["X".into()],
        }
    }
}

impl Default for SettingsKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            confirm: vec!["Enter".into()],
            next: vec!["Tab".into(), "Down".into()],
            prev: vec!["Backtab".into(), "Up".into()],
            toggle: vec!["Space".into()],
        }
    }
}

impl Default for UiColors {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    batch: BatchKeysFile,
    settings: SettingsKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalKeysFile {
    quit: KeyBinding,
    help: KeyBinding,
    convert: KeyBinding,
    toggle_mode: KeyBinding,
    settings: KeyBinding,
    paste: KeyBinding,
    copy: KeyBinding,
    export: KeyBinding,
    focus_next: KeyBinding,
    focus_prev: KeyBinding,
}

impl Default for GlobalKeysFile {
    fn default() -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            help: KeyBinding::Multiple(defaults.help),
            convert: KeyBinding::Multiple(defaults.convert),
            toggle_mode: KeyBinding::Multiple(defaults.toggle_mode),
            settings: KeyBinding::Multiple(defaults.settings),
            paste: KeyBinding::Multiple(defaults.paste),
            copy: KeyBinding::Multiple(defaults.copy),
            export: KeyBinding::Multiple(defaults.export),
            focus_next: KeyBinding::Multiple(defaults.focus_next),
            focus_prev: KeyBinding::Multiple(defaults.focus_prev),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BatchKeysFile {
    next: KeyBinding,
    prev: KeyBinding,
    remove: KeyBinding,
    clear: KeyBinding,
}

impl Default for BatchKeysFile {
    fn default() -> Self {
        let defaults = BatchKeys::default();
        Self {
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            remove: KeyBinding::Multiple(defaults.remove),
            clear: KeyBinding::Multiple(defaults.clear),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SettingsKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
    next: KeyBinding,
    prev: KeyBinding,
    toggle: KeyBinding,
}

impl Default for SettingsKeysFile {
    fn default() -> Self {
        let defaults = SettingsKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            toggle: KeyBinding::Multiple(defaults.toggle),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: GlobalKeys {
                quit: file.global.quit.into_vec(),
                help: file.global.help.into_vec(),
                convert: file.global.convert.into_vec(),
                toggle_mode: file.global.toggle_mode.into_vec(),
                settings: file.global.settings.into_vec(),
                paste: file.global.paste.into_vec(),
                copy: file.global.copy.into_vec(),
                export: file.global.export.into_vec(),
                focus_next: file.global.focus_next.into_vec(),
                focus_prev: file.global.focus_prev.into_vec(),
            },
            batch: BatchKeys {
                next: file.batch.next.into_vec(),
                prev: file.batch.prev.into_vec(),
                remove: file.batch.remove.into_vec(),
                clear: file.batch.clear.into_vec(),
            },
            settings: SettingsKeys {
                cancel: file.settings.cancel.into_vec(),
                confirm: file.settings.confirm.into_vec(),
                next: file.settings.next.into_vec(),
                prev: file.settings.prev.into_vec(),
                toggle: file.settings.toggle.into_vec(),
            },
        }
    }
}

// =============================================================================
// Key binding validation
// =============================================================================

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case (since 'X' means Shift+x, different from 'x').
/// Named keys and modifier combos are case-insensitive.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn check_context_collisions(bindings: &[(&str, &Vec<String>)], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn global_bindings(keys: &Keys) -> Vec<(&'static str, &Vec<String>)> {
    let g = &keys.global;
    vec![
        ("quit", &g.quit),
        ("help", &g.help),
        ("convert", &g.convert),
        ("toggle_mode", &g.toggle_mode),
        ("settings", &g.settings),
        ("paste", &g.paste),
        ("copy", &g.copy),
        ("export", &g.export),
        ("focus_next", &g.focus_next),
        ("focus_prev", &g.focus_prev),
    ]
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(&global_bindings(keys), "global")?;

    // Global keys stay active while the batch list has focus, so the two
    // contexts must not overlap.
    let mut batch = global_bindings(keys);
    batch.extend([
        ("batch.next", &keys.batch.next),
        ("batch.prev", &keys.batch.prev),
        ("batch.remove", &keys.batch.remove),
        ("batch.clear", &keys.batch.clear),
    ]);
    check_context_collisions(&batch, "batch")?;

    check_context_collisions(
        &[
            ("cancel", &keys.settings.cancel),
            ("confirm", &keys.settings.confirm),
            ("next", &keys.settings.next),
            ("prev", &keys.settings.prev),
            ("toggle", &keys.settings.toggle),
        ],
        "settings",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    llm: LlmFile,
    export: ExportFile,
    commands: CommandsFile,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LlmFile {
    provider: Option<String>,
    custom: CustomLlmFile,
    hosted: HostedLlmFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CustomLlmFile {
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl Default for CustomLlmFile {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CUSTOM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_CUSTOM_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HostedLlmFile {
    api_key: Option<String>,
}

impl LlmFile {
    fn into_conversion(self) -> Result<ConversionConfig> {
        let use_custom_endpoint = match self
            .provider
            .as_deref()
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("hosted") => false,
            Some("custom") => true,
            Some(other) => bail!(
                "invalid llm.provider '{}', expected one of: hosted, custom",
                other
            ),
        };

        let hosted_api_key = non_empty(self.hosted.api_key)
            .or_else(|| non_empty(std::env::var(HOSTED_KEY_ENV).ok()));

        Ok(ConversionConfig {
            use_custom_endpoint,
            base_url: self.custom.base_url.trim().to_string(),
            api_key: non_empty(self.custom.api_key),
            model: self.custom.model.trim().to_string(),
            hosted_api_key,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ExportFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct CommandsFile {
    copy: Option<CommandDef>,
    paste: Option<CommandDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandDef {
    Simple(String),
    List(Vec<String>),
}

impl From<CommandsFile> for Commands {
    fn from(file: CommandsFile) -> Self {
        Self {
            copy: file.copy.and_then(CommandExec::from_def),
            paste: file.paste.and_then(CommandExec::from_def),
        }
    }
}

impl CommandExec {
    fn from_def(def: CommandDef) -> Option<Self> {
        match def {
            CommandDef::Simple(cmd) => {
                let mut parts = cmd.split_whitespace().map(str::to_string);
                let program = parts.next()?;
                Some(Self {
                    program,
                    args: parts.collect(),
                })
            }
            CommandDef::List(mut parts) => {
                if parts.is_empty() || parts[0].trim().is_empty() {
                    return None;
                }
                let program = parts.remove(0);
                Some(Self {
                    program,
                    args: parts,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        let defaults = UiColors::default();
        Self {
            border: defaults.border,
            selection_bg: defaults.selection_bg,
            selection_fg: defaults.selection_fg,
            separator: defaults.separator,
            status_fg: defaults.status_fg,
            status_bg: defaults.status_bg,
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        Self {
            colors: UiColors {
                border: file.colors.border,
                selection_bg: file.colors.selection_bg,
                selection_fg: file.colors.selection_fg,
                separator: file.colors.separator,
                status_fg: file.colors.status_fg,
                status_bg: file.colors.status_bg,
            },
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `path` (or the default location). A missing file
/// yields the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        return parse_str("", path, false);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    parse_str(&raw, path, true)
}

fn parse_str(raw: &str, path: PathBuf, from_file: bool) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    let conversion = cfg_file
        .llm
        .into_conversion()
        .context("failed to parse llm configuration")?;

    let export_dir = cfg_file
        .export
        .dir
        .map(|dir| expand_tilde(&dir))
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Config {
        config_path: path,
        from_file,
        conversion,
        export_dir,
        keys,
        ui: cfg_file.ui.into(),
        commands: cfg_file.commands.into(),
    })
}

pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# cardsmith configuration

[llm]
# "hosted" (Anthropic) or "custom" (any OpenAI-compatible server)
provider = "hosted"

[llm.hosted]
# Falls back to the ANTHROPIC_API_KEY environment variable when unset.
# api_key = "sk-ant-..."

[llm.custom]
# LM Studio: http://localhost:1234/v1
# Ollama:    http://localhost:11434/v1
# vLLM:      http://localhost:8000/v1
base_url = "http://localhost:1234/v1"
api_key = ""
model = "llama-3-8b-instruct"

[export]
# Directory for exported .vcf files (defaults to the current directory)
# dir = "~/Downloads"

[commands]
# copy = ["wl-copy"]
# paste = ["wl-paste", "--no-newline"]

# [keys.global]
# convert = ["F5", "Ctrl+r"]
"#;

/// Write the commented default configuration to `path`.
pub fn write_default(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "configuration file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_in(value: &toml::Value, section: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            if section.is_empty() {
                warn!("unknown configuration key `{}`", key);
            } else {
                warn!("unknown {} entry `{}`", section, key);
            }
        }
    }
}

fn warn_unknown_keys(value: &toml::Value) {
    warn_unknown_in(value, "", &["llm", "export", "commands", "keys", "ui"]);

    let Some(table) = value.as_table() else {
        return;
    };

    if let Some(llm) = table.get("llm") {
        warn_unknown_in(llm, "llm.*", &["provider", "custom", "hosted"]);
        if let Some(custom) = llm.get("custom") {
            warn_unknown_in(custom, "llm.custom.*", &["base_url", "api_key", "model"]);
        }
        if let Some(hosted) = llm.get("hosted") {
            warn_unknown_in(hosted, "llm.hosted.*", &["api_key"]);
        }
    }
    if let Some(export) = table.get("export") {
        warn_unknown_in(export, "export.*", &["dir"]);
    }
    if let Some(commands) = table.get("commands") {
        warn_unknown_in(commands, "commands.*", &["copy", "paste"]);
    }
    if let Some(keys) = table.get("keys") {
        warn_unknown_in(keys, "keys.*", &["global", "batch", "settings"]);
        if let Some(v) = keys.get("global") {
            warn_unknown_in(
                v,
                "keys.global.*",
                &[
                    "quit",
                    "help",
                    "convert",
                    "toggle_mode",
                    "settings",
                    "paste",
                    "copy",
                    "export",
                    "focus_next",
                    "focus_prev",
                ],
            );
        }
        if let Some(v) = keys.get("batch") {
            warn_unknown_in(v, "keys.batch.*", &["next", "prev", "remove", "clear"]);
        }
        if let Some(v) = keys.get("settings") {
            warn_unknown_in(
                v,
                "keys.settings.*",
                &["cancel", "confirm", "next", "prev", "toggle"],
            );
        }
    }
    if let Some(ui) = table.get("ui") {
        warn_unknown_in(ui, "ui.*", &["colors"]);
        if let Some(colors) = ui.get("colors") {
            warn_unknown_in(
                colors,
                "ui.colors.*",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                ],
            );
        }
    }
}
