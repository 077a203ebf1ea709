use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub lookup: Option<LookupConfig>,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            worker_count: default_worker_count(),
            ocr: OcrConfig::default(),
            extraction: ExtractionConfig::default(),
            lookup: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Resolution used when a whole unit falls back to recognition.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Resolution used for the cheaper per-page scan done while segmenting.
    #[serde(default = "default_page_dpi")]
    pub page_dpi: u32,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["por".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_page_dpi() -> u32 {
    200
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
            page_dpi: default_page_dpi(),
        }
    }
}

/// Known structured-extraction providers. All of them are reached through an
/// OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Anthropic,
    Google,
    Mistral,
    Groq,
    Ollama,
    Custom,
}

impl Provider {
    pub fn default_endpoint(&self) -> Option<String> {
        match self {
            Provider::Openai => Some("https://api.openai.com/v1/chat/completions".to_string()),
            Provider::Anthropic => {
                Some("https://api.anthropic.com/v1/chat/completions".to_string())
            }
            Provider::Google => Some(
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                    .to_string(),
            ),
            Provider::Mistral => Some("https://api.mistral.ai/v1/chat/completions".to_string()),
            Provider::Groq => {
                Some("https://api.groq.com/openai/v1/chat/completions".to_string())
            }
            Provider::Ollama => {
                let base = std::env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string());
                Some(format!("{}/v1/chat/completions", base.trim_end_matches('/')))
            }
            Provider::Custom => None,
        }
    }

    /// Environment variable that holds the provider's API key, if it needs one.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Openai => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Google => Some("GOOGLE_API_KEY"),
            Provider::Mistral => Some("MISTRAL_API_KEY"),
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::Ollama | Provider::Custom => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Openai => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-5",
            Provider::Google => "gemini-2.5-flash",
            Provider::Mistral => "mistral-large-latest",
            Provider::Groq => "llama-3.3-70b-versatile",
            Provider::Ollama => "llama3",
            Provider::Custom => "default",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.default_api_key_env().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f32,
}

fn default_provider() -> Provider {
    Provider::Openai
}

fn default_timeout_secs() -> u64 {
    120
}

impl ExtractionConfig {
    pub fn resolved_model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
            .to_string()
    }

    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.provider.default_endpoint())
    }

    pub fn resolved_api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider.default_api_key_env().map(str::to_string))
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            endpoint: None,
            api_key: None,
            api_key_file: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    pub path: String,
    #[serde(default = "default_reference_column")]
    pub reference_column: String,
    #[serde(default = "default_accumulator_column")]
    pub accumulator_column: String,
}

fn default_reference_column() -> String {
    "Referência".to_string()
}

fn default_accumulator_column() -> String {
    "ACUMULADOR TOMADOS".to_string()
}

impl LookupConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reference_column: default_reference_column(),
            accumulator_column: default_accumulator_column(),
        }
    }
}

/// Document kinds admitted into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "tiff" | "bmp" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}
