use std::time::Duration;

use serde::Serialize;
use soldy_agent::conversation::ConversationTurn;
use soldy_agent::{generator_from_config, TextGenerator};
use soldy_agent::llm::{DecodingParams, GenerationRequest};
use soldy_core::config::{AppConfig, LoadOptions};
use soldy_core::Catalog;

use crate::commands::{escape_json, CommandResult, EXIT_NOT_READY};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, live: bool) -> CommandResult {
    let report = build_report(live);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_NOT_READY };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(live: bool) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_catalog(&config));
            checks.extend(check_text_generation(&config, live));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["catalog_load", "llm_client", "llm_roundtrip"] {
                checks.push(DoctorCheck::skipped(name, "skipped because configuration did not load"));
            }
        }
    }

    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    match Catalog::load(&config.catalog.path) {
        Ok(catalog) => DoctorCheck::pass(
            "catalog_load",
            format!(
                "{} products in {} families from `{}`",
                catalog.len(),
                catalog.families().len(),
                config.catalog.path.display()
            ),
        ),
        Err(error) => DoctorCheck::fail("catalog_load", error.to_string()),
    }
}

fn check_text_generation(config: &AppConfig, live: bool) -> Vec<DoctorCheck> {
    let generator = match generator_from_config(&config.llm) {
        Ok(generator) => generator,
        Err(error) => {
            return vec![
                DoctorCheck::fail("llm_client", error.to_string()),
                DoctorCheck::skipped("llm_roundtrip", "skipped because the client could not be built"),
            ]
        }
    };
    let client = DoctorCheck::pass(
        "llm_client",
        format!("{} client for model `{}`", generator.name(), config.llm.model),
    );
    if !live {
        return vec![client, DoctorCheck::skipped("llm_roundtrip", "pass --live to contact the model")];
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                client,
                DoctorCheck::fail("llm_roundtrip", format!("failed to initialize async runtime: {error}")),
            ]
        }
    };

    let request = GenerationRequest {
        system_prompt: "Respondé con una sola palabra.".to_string(),
        messages: vec![ConversationTurn::user("Hola")],
        decoding: DecodingParams::from(&config.assistant),
    };
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let outcome = runtime.block_on(async { tokio::time::timeout(timeout, generator.generate(request)).await });

    let roundtrip = match outcome {
        Ok(Ok(response)) => DoctorCheck::pass(
            "llm_roundtrip",
            format!("model answered with {} characters", response.text.chars().count()),
        ),
        Ok(Err(error)) => DoctorCheck::fail("llm_roundtrip", error.to_string()),
        Err(_) => DoctorCheck::fail("llm_roundtrip", format!("no answer within {timeout:?}")),
    };
    vec![client, roundtrip]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
