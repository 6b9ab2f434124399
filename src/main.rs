// src/main.rs
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use sheetdash::common::config::{apply_cli_override, print_demo_mode_status, AppConfig};
use sheetdash::common::AppState;
use sheetdash::dashboard::{Dashboard, NavigationIntent};
use sheetdash::services::{Notifier, TracingNotifier};
use sheetdash::tables::ColumnSpec;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let config = apply_cli_override(AppConfig::from_env());
    print_demo_mode_status(&config.demo);
    info!(
        token_ttl_secs = config.token_ttl_secs,
        expiry_check_secs = config.expiry_check_interval_secs,
        sync_secs = config.sync_interval_secs,
        "Configuration loaded"
    );

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let state = AppState::build(config.clone(), notifier).await?;
    let dashboard = Dashboard::new(&state);

    let restored = state.session.init().await;
    info!(state = ?restored, "SessionManager initialized");

    let remote_tables = state.provider.list_remote_tables().await?;
    info!(count = remote_tables.len(), "Remote provider reachable");

    // ========================================================================
    // DEMO DATA
    // ========================================================================

    let mut demo_table = None;
    if config.demo.is_enabled() && dashboard.landing().await == NavigationIntent::Login {
        dashboard
            .register(
                &config.demo.user_email,
                &config.demo.user_password,
                &config.demo.user_name,
            )
            .await?;
    }

    if config.demo.is_enabled() {
        let table = dashboard
            .create_table(
                vec![ColumnSpec::date("Date"), ColumnSpec::text("Title")],
                &config.demo.sheet_url,
            )
            .await?;
        dashboard.add_column(&table.id, ColumnSpec::text("Notes")).await?;
        dashboard.watch_table(&table.id).await?;
        demo_table = Some(table.id);
    }

    // ========================================================================
    // BACKGROUND TASKS
    // ========================================================================

    let logged_out = Arc::new(Notify::new());
    let on_navigate = logged_out.clone();
    dashboard.start_session_watch(move |intent| {
        if intent == NavigationIntent::Login {
            on_navigate.notify_one();
        }
    });

    info!("Dashboard running, press Ctrl+C to stop");

    let mut report = tokio::time::interval(config.sync_interval());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            _ = logged_out.notified() => {
                warn!("Session ended, stopping");
                break;
            }
            _ = report.tick() => {
                let Some(table_id) = demo_table.as_deref() else { continue };
                match dashboard.render_table(table_id).await {
                    Ok(rows) => {
                        for row in &rows {
                            info!(table_id = %table_id, "{}", row.join(" | "));
                        }
                        info!(table_id = %table_id, rows = rows.len(), "📊 Table snapshot");
                    }
                    Err(e) => warn!(table_id = %table_id, error = %e, "Could not render table"),
                }
            }
        }
    }

    dashboard.shutdown();
    Ok(())
}
