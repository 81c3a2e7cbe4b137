//! Proctoring Engine - Demo Entry Point
//!
//! Runs one scripted attempt on synthetic devices against the configured
//! authority (or offline). Usage: `proctor-core [config.json]`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use proctor_core::constants;
use proctor_core::logic::signal::{InputEvent, InputEventKind, WindowEvent, WindowEventKind};
use proctor_core::logic::simulate::{AudioScene, SyntheticDevices};
use proctor_core::logic::sync::HttpAuthority;
use proctor_core::logic::{ExamSubmitter, ProctorConfig, ProctorError, SessionController};

/// Stands in for the exam UI's submit action
struct LoggingSubmitter;

impl ExamSubmitter for LoggingSubmitter {
    fn force_submit(&self, attempt_id: Uuid, reason: &str) -> Result<(), ProctorError> {
        log::warn!("[Exam] Attempt {} submitted by the engine: {}", attempt_id, reason);
        Ok(())
    }
}

fn load_config() -> Result<ProctorConfig, ProctorError> {
    let config = match std::env::args().nth(1) {
        Some(path) => ProctorConfig::load(Path::new(&path))?,
        None => ProctorConfig::default(),
    };
    let mut config = config.apply_env();
    config.validate()?;
    if config.session.journal_dir.is_none() {
        config.session.journal_dir = Some(constants::default_journal_dir());
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let devices = SyntheticDevices::new();
    let mut controller = SessionController::new(
        config.clone(),
        Arc::new(devices.clone()),
        Arc::new(LoggingSubmitter),
    );

    if config.sync.enabled {
        match HttpAuthority::new(&config.sync) {
            Ok(authority) => {
                log::info!("Reporting to {}", authority.server_url());
                controller = controller.with_authority(Arc::new(authority));
            }
            Err(e) => log::warn!("Authority client init failed: {} - running offline", e),
        }
    }

    let attempt_id = Uuid::new_v4();
    let handle = match controller.start(attempt_id).await {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Session could not start: {}", e);
            std::process::exit(1);
        }
    };

    let mut decisions = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = decisions.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => log::info!("[UI] {} {}", event.name(), json),
                Err(e) => log::warn!("[UI] Unprintable event: {}", e),
            }
        }
    });

    // Scripted candidate: wanders off three times, copies, then starts talking
    tokio::time::sleep(Duration::from_secs(2)).await;
    for _ in 0..3 {
        for kind in [WindowEventKind::VisibilityHidden, WindowEventKind::VisibilityVisible] {
            if let Err(e) = handle.report_window_event(WindowEvent { kind, at: Utc::now() }) {
                log::warn!("Window event rejected: {}", e);
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }
    if let Err(e) = handle.report_input_event(InputEvent {
        kind: InputEventKind::Copy,
        at: Utc::now(),
    }) {
        log::warn!("Input event rejected: {}", e);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    log::info!("Status after script: {}", handle.status());
    devices.set_audio(AudioScene::Speech);

    // Fall back to a normal submission if nothing terminated the attempt
    tokio::time::sleep(Duration::from_secs(10)).await;
    if !handle.is_finished() {
        handle.complete();
    }

    match handle.finished().await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Could not print summary: {}", e),
        },
        Err(e) => log::error!("Session failed: {}", e),
    }
}
