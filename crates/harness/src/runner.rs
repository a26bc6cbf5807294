use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::auth::Credentials;
use crate::config::HarnessConfig;
use crate::fixture::DocumentFixture;
use crate::output::RunReport;
use crate::sequencer::TestSequencer;
use crate::steps::{admin_steps, AdminContext, AdminStep};

/// Run the admin conformance sequence once against `config.server_url`.
pub async fn run(config: &HarnessConfig) -> anyhow::Result<RunReport> {
    let run_id = Uuid::new_v4();
    run_steps(config, run_id).instrument(info_span!("run", %run_id)).await
}

async fn run_steps(config: &HarnessConfig, run_id: Uuid) -> anyhow::Result<RunReport> {
    let endpoints = config.endpoints().context("failed to resolve server endpoints")?;
    let secure_transport = config.secure_transport_available();
    let steps = admin_steps(secure_transport, config.rmdoc_check);

    let credentials =
        Credentials { user: config.admin_user.clone(), password: config.admin_password.clone() };
    let context = AdminContext::new(
        endpoints,
        credentials,
        DocumentFixture::new(&config.data_dir),
        config.message_timeout(),
    )
    .context("failed to set up admin session")?;

    info!(
        server_url = %config.server_url,
        secure_transport,
        steps = steps.len(),
        "starting admin conformance run"
    );

    let sequencer = Arc::new(TestSequencer::<AdminStep>::with_steps(context, steps));
    let started_at = Utc::now();
    let clock = Instant::now();

    let verdict =
        Arc::clone(&sequencer).run(config.trigger_interval(), config.run_timeout()).await;

    let elapsed_ms = clock.elapsed().as_millis() as u64;
    let progress = sequencer.progress();
    let failed_step = progress
        .stopped_at
        .and_then(|index| sequencer.step_name(index))
        .map(str::to_owned);

    sequencer.context().lock().await.close_all().await;
    info!(?verdict, elapsed_ms, failed_step = failed_step.as_deref(), "run finished");

    Ok(RunReport {
        run_id,
        server_url: config.server_url.clone(),
        verdict,
        steps_run: progress.cursor,
        total_steps: sequencer.len(),
        failed_step,
        started_at,
        finished_at: Utc::now(),
        elapsed_ms,
    })
}
