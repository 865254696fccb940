use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "medscribe";
const CONFIG_FILE: &str = "settings.json";
const API_KEY_XOR_KEY: &[u8] = b"medscribe-local-key-v1";

const EXAMPLES_BEGIN: &str = "[Examples begin]";
const EXAMPLES_END: &str = "[Examples end]";

pub const DEFAULT_LOCALE: &str = "est";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a medical transcriber specializing in structured clinical notes.

I will provide an AI-generated transcription of a doctor-patient encounter. Since AI may misinterpret medical terms, medications, and dosages, your task is to:

Correct obvious transcription errors for clinical accuracy.
Adjust misrecognized medical terms based on context.
Verify whether a medication name actually exists and correct it if necessary.
Ensure that dosages and forms (e.g., mg, mcg, tablets, injections) are reasonable based on standard medical guidelines.
Keep the note concise and structured while preserving all relevant details.
If the patient's family history is mentioned, include it.
Format the clinical note in Estonian, following these sections (only include applicable ones):

Anamnees (Reason for visit, key symptoms, relevant history, smoking/alcohol use)
Füüsiline läbivaatus (Findings observed during the visit)
Plaan ja soovitused (Treatment, investigations, referrals, verified medications with corrected dosages)

User can also provide examples of correct clinical notes to help you understand the expected format and content. Examples, if provided, can be seen below.
";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_key_obfuscated: Option<String>,
    pub locale: String,
    /// Last-selected transcription endpoint, stored as `provider/model`.
    pub transcribe_model: Option<String>,
    /// Last-selected summarization endpoint, stored as `provider/model`.
    pub summary_model: Option<String>,
    pub system_prompt: String,
    /// Example notes kept wrapped in their begin/end markers, the form the
    /// prompt composer consumes.
    pub examples_wrapped: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_obfuscated: None,
            locale: DEFAULT_LOCALE.to_string(),
            transcribe_model: None,
            summary_model: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            examples_wrapped: String::new(),
        }
    }
}

impl AppConfig {
    pub fn set_api_key(&mut self, api_key: &str) {
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            self.api_key_obfuscated = None;
        } else {
            self.api_key_obfuscated = Some(obfuscate_api_key(trimmed));
        }
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key_obfuscated
            .as_deref()
            .and_then(deobfuscate_api_key)
    }

    pub fn api_key_masked(&self) -> Option<String> {
        self.api_key().map(|key| mask_api_key(&key))
    }

    /// Example notes without the storage markers, for editing.
    pub fn examples(&self) -> String {
        self.examples_wrapped
            .trim_start_matches(EXAMPLES_BEGIN)
            .trim_end_matches(EXAMPLES_END)
            .trim_matches('\n')
            .to_string()
    }

    pub fn set_examples(&mut self, examples: &str) {
        let trimmed = examples.trim();
        if trimmed.is_empty() {
            self.examples_wrapped = String::new();
        } else {
            self.examples_wrapped = format!("{EXAMPLES_BEGIN}\n{trimmed}\n{EXAMPLES_END}");
        }
    }
}

pub fn normalize_locale(input: &str) -> String {
    match input.trim().to_ascii_lowercase().as_str() {
        "eng" => "eng".to_string(),
        "est" => "est".to_string(),
        _ => DEFAULT_LOCALE.to_string(),
    }
}

/// Platform configuration directory for this application.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR))
}

pub fn load_or_create(dir: &Path) -> Result<AppConfig, String> {
    let path = config_path(dir)?;
    if !path.exists() {
        let config = AppConfig::default();
        save_raw(&path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(_) => {
            let backup = path.with_extension("json.bak");
            let _ = fs::copy(&path, backup);
            let config = AppConfig::default();
            save_raw(&path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(dir: &Path, config: &AppConfig) -> Result<(), String> {
    let path = config_path(dir)?;
    save_raw(&path, config)
}

fn config_path(dir: &Path) -> Result<PathBuf, String> {
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
    Ok(dir.join(CONFIG_FILE))
}

fn save_raw(path: &PathBuf, config: &AppConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to save config: {}", e))
}

fn normalize_config(config: &mut AppConfig) {
    config.locale = normalize_locale(&config.locale);
    if config.system_prompt.trim().is_empty() {
        config.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
    }
}

fn obfuscate_api_key(api_key: &str) -> String {
    let mut bytes = api_key.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_api_key(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

fn mask_api_key(api_key: &str) -> String {
    if api_key.len() <= 10 {
        return "******".to_string();
    }

    let prefix = &api_key[..6];
    let suffix = &api_key[api_key.len().saturating_sub(4)..];
    format!("{}********{}", prefix, suffix)
}
