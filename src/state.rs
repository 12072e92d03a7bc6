//! Application state: prompts, workbook settings, and the two workflows sharing
//! one upstream backend.
//!
//! A missing or invalid credential does not stop the server. It is logged at
//! startup and every workflow call then fails fast with the configuration error
//! before any network request.

use tracing::{error, info, instrument};

use crate::analyzer::AnswerAnalyzer;
use crate::config::{load_agent_config_from_env, AgentConfig, LlmSettings};
use crate::error::ConfigError;
use crate::generator::WorkbookGenerator;
use crate::upstream::{self, SharedBackend};

#[derive(Clone)]
pub struct AppState {
    pub generator: WorkbookGenerator,
    pub analyzer: AnswerAnalyzer,
    pub configured: bool,
}

impl AppState {
    /// Build state from env: load TOML config, resolve the upstream backend.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let backend = LlmSettings::from_env().and_then(|s| {
            let b = upstream::from_settings(&s)?;
            info!(
                target: "expertise_workbook",
                provider = s.provider.as_str(),
                base_url = %s.base_url,
                model = %s.model,
                timeout_secs = s.timeout.as_secs(),
                "Upstream model configured."
            );
            Ok(b)
        });
        if let Err(e) = &backend {
            error!(target: "expertise_workbook", error = %e, "Upstream model NOT configured; workbook and analysis requests will fail.");
        }

        Self::with_backend(backend, cfg)
    }

    pub fn with_backend(backend: Result<SharedBackend, ConfigError>, cfg: AgentConfig) -> Self {
        info!(
            target: "expertise_workbook",
            level_scheme = ?cfg.workbook.level_scheme,
            problems = cfg.workbook.requested_problems(),
            max_problems = cfg.workbook.max_problems,
            "Workbook settings"
        );
        Self {
            configured: backend.is_ok(),
            generator: WorkbookGenerator::new(backend.clone(), cfg.prompts.clone(), cfg.workbook.clone()),
            analyzer: AnswerAnalyzer::new(backend, cfg.prompts, &cfg.workbook),
        }
    }
}
