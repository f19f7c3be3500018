use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub categories: CategoryConfig,
    pub gate: GateConfig,
}

/// Text generator API configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// A single specification category with its maturity weight and
/// saturation cap (facts beyond the cap no longer raise the score).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub weight: f64,
    pub cap: f64,
}

/// The closed category enumeration, loaded as data.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    categories: Vec<CategorySpec>,
}

/// One declared step of an execution strategy. A step without a cost
/// makes any path containing it non-viable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// A candidate strategy for a major operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub fills_gaps: bool,
    pub steps: Vec<StepSpec>,
}

/// Gate classification and strategy table for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSpec {
    #[serde(default)]
    pub irreversible: bool,
    pub strategies: Vec<StrategySpec>,
}

/// Quality gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub operations: HashMap<String, OperationSpec>,
    /// Multiplier turning missing maturity percentage into rework cost units.
    pub rework_factor: f64,
    /// Gap fraction (1 - score/cap) at or above which a category counts
    /// as a high-severity coverage gap.
    pub high_gap_threshold: f64,
    /// Minimum category weight for a gap to count as high severity.
    pub high_gap_min_weight: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, EngineError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let generator = GeneratorConfig {
            api_key: env::var("GENERATOR_API_KEY").map_err(|_| EngineError::Config {
                message: "GENERATOR_API_KEY is required".to_string(),
            })?,
            base_url: env::var("GENERATOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
            model: env::var("GENERATOR_MODEL")
                .unwrap_or_else(|_| "openai:gpt-4o-mini".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/specs.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let categories = match env::var("SPEC_CATEGORIES") {
            Ok(json) => CategoryConfig::from_json(&json)?,
            Err(_) => CategoryConfig::default(),
        };

        let operations = match env::var("SPEC_GATE_OPERATIONS") {
            Ok(json) => {
                serde_json::from_str(&json).map_err(|e| EngineError::Config {
                    message: format!("SPEC_GATE_OPERATIONS is not valid JSON: {}", e),
                })?
            }
            Err(_) => GateConfig::default_operations(),
        };

        let gate = GateConfig {
            operations,
            rework_factor: env::var("SPEC_REWORK_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50.0),
            high_gap_threshold: env::var("SPEC_HIGH_GAP_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.75),
            high_gap_min_weight: env::var("SPEC_HIGH_GAP_MIN_WEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10.0),
        };

        Ok(Config {
            generator,
            database,
            logging,
            request,
            categories,
            gate,
        })
    }
}

impl CategoryConfig {
    /// Build from a JSON array of category specs.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let categories: Vec<CategorySpec> =
            serde_json::from_str(json).map_err(|e| EngineError::Config {
                message: format!("SPEC_CATEGORIES is not valid JSON: {}", e),
            })?;
        if categories.is_empty() {
            return Err(EngineError::Config {
                message: "SPEC_CATEGORIES must declare at least one category".to_string(),
            });
        }
        for c in &categories {
            if c.cap <= 0.0 || c.weight < 0.0 {
                return Err(EngineError::Config {
                    message: format!("category {} has non-positive cap or negative weight", c.name),
                });
            }
        }
        Ok(Self { categories })
    }

    /// All declared categories, in declaration order.
    pub fn all(&self) -> &[CategorySpec] {
        &self.categories
    }

    /// Look up a category by name.
    pub fn get(&self, name: &str) -> Option<&CategorySpec> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Whether the name belongs to the closed enumeration.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sum of all saturation caps (denominator of the overall score).
    pub fn total_cap(&self) -> f64 {
        self.categories.iter().map(|c| c.cap).sum()
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        let spec = |name: &str, weight: f64, cap: f64| CategorySpec {
            name: name.to_string(),
            weight,
            cap,
        };
        Self {
            categories: vec![
                spec("goals", 15.0, 4.0),
                spec("requirements", 20.0, 8.0),
                spec("tech_stack", 15.0, 6.0),
                spec("scalability", 8.0, 3.0),
                spec("security", 10.0, 4.0),
                spec("testing", 8.0, 3.0),
                spec("monitoring", 5.0, 3.0),
                spec("deployment", 6.0, 3.0),
                spec("timeline", 7.0, 3.0),
                spec("team_structure", 6.0, 3.0),
            ],
        }
    }
}

impl GateConfig {
    /// Built-in operation table. Costs are opaque units (estimated tokens);
    /// the documented values are illustrative, not normative.
    pub fn default_operations() -> HashMap<String, OperationSpec> {
        let step = |name: &str, cost: f64| StepSpec {
            name: name.to_string(),
            cost: Some(cost),
        };

        let mut operations = HashMap::new();
        operations.insert(
            "advance_phase".to_string(),
            OperationSpec {
                irreversible: true,
                strategies: vec![
                    StrategySpec {
                        name: "fill_gaps_then_proceed".to_string(),
                        fills_gaps: true,
                        steps: vec![
                            step("generate_gap_questions", 800.0),
                            step("collect_answers", 1200.0),
                            step("advance_phase", 200.0),
                        ],
                    },
                    StrategySpec {
                        name: "proceed_immediately".to_string(),
                        fills_gaps: false,
                        steps: vec![step("advance_phase", 200.0)],
                    },
                ],
            },
        );
        operations.insert(
            "generate_document".to_string(),
            OperationSpec {
                irreversible: false,
                strategies: vec![
                    StrategySpec {
                        name: "fill_gaps_then_generate".to_string(),
                        fills_gaps: true,
                        steps: vec![
                            step("generate_gap_questions", 800.0),
                            step("collect_answers", 1200.0),
                            step("generate_document", 2500.0),
                        ],
                    },
                    StrategySpec {
                        name: "generate_immediately".to_string(),
                        fills_gaps: false,
                        steps: vec![step("generate_document", 2500.0)],
                    },
                ],
            },
        );
        operations
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            operations: Self::default_operations(),
            rework_factor: 50.0,
            high_gap_threshold: 0.75,
            high_gap_min_weight: 10.0,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 1,
            retry_delay_ms: 1000,
        }
    }
}
