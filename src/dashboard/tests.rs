//! Tests for the dashboard facade
//!
//! These tests verify:
//! - Session gating and the navigation intents it produces
//! - One notification per user action
//! - Table watches and their teardown on logout, expiry and shutdown

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::{CredentialStore, LocalAuthProvider, MemoryStore};
    use crate::common::AppConfig;
    use crate::services::{Clock, ManualClock, NoticeLevel, RecordingNotifier};
    use crate::tables::{FixedRowPolicy, RemoteDataProvider, StubRemoteProvider};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    const SHEET: &str = "https://example/sheet";

    struct Fixture {
        dashboard: Dashboard,
        clock: ManualClock,
        notifier: RecordingNotifier,
        provider: Arc<StubRemoteProvider>,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 5, 9, 30, 0).unwrap());
        let clock_dyn: Arc<dyn Clock> = Arc::new(clock.clone());
        let config = AppConfig::default();

        let session = SessionManager::new(
            Arc::new(CredentialStore::new(Arc::new(MemoryStore::new()))),
            Arc::new(LocalAuthProvider::new(
                "test_secret_key",
                config.token_ttl(),
                clock_dyn.clone(),
            )),
            clock_dyn.clone(),
            config.token_ttl(),
        );
        let provider = Arc::new(StubRemoteProvider::new());
        let notifier = RecordingNotifier::new();

        let state = AppState::assemble(
            config,
            session,
            provider.clone(),
            Arc::new(FixedRowPolicy::always_append()),
            clock_dyn,
            Arc::new(notifier.clone()),
        );

        Fixture {
            dashboard: Dashboard::new(&state),
            clock,
            notifier,
            provider,
        }
    }

    async fn logged_in() -> Fixture {
        let fx = fixture();
        fx.dashboard.login("jane@example.com", "pw").await.unwrap();
        fx
    }

    /// Let every woken task run to its next await on the paused clock
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    async fn row_count(fx: &Fixture, table_id: &str) -> usize {
        fx.dashboard.open_table(table_id).await.unwrap().rows().len()
    }

    #[tokio::test]
    async fn test_anonymous_user_is_sent_to_login() {
        let fx = fixture();
        assert_eq!(fx.dashboard.landing().await, NavigationIntent::Login);

        let err = fx.dashboard.tables().await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert_eq!(redirect_for(&err), Some(NavigationIntent::Login));

        let err = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap_err();
        assert_eq!(redirect_for(&err), Some(NavigationIntent::Login));

        // Gate rejections navigate rather than notify
        assert!(fx.notifier.notices().is_empty());
        assert!(fx.provider.list_remote_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_notifies_once() {
        let fx = fixture();

        let err = fx.dashboard.login("", "x").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCredentials));
        assert_eq!(redirect_for(&err), None);
        assert_eq!(fx.notifier.errors(), vec!["Please fill all fields"]);

        let intent = fx.dashboard.login("jane@example.com", "pw").await.unwrap();
        assert_eq!(intent, NavigationIntent::Dashboard);
        assert_eq!(fx.notifier.successes(), vec!["Logged in successfully!"]);
        assert_eq!(fx.dashboard.landing().await, NavigationIntent::Dashboard);
    }

    #[tokio::test]
    async fn test_register_notifies_once() {
        let fx = fixture();

        assert!(fx.dashboard.register("a@b.c", "pw", "").await.is_err());
        let intent = fx
            .dashboard
            .register("jane@example.com", "pw", "Jane")
            .await
            .unwrap();
        assert_eq!(intent, NavigationIntent::Dashboard);
        assert_eq!(fx.notifier.errors(), vec!["Please fill all fields"]);
        assert_eq!(fx.notifier.successes(), vec!["Account created successfully!"]);
        assert_eq!(fx.dashboard.session().current_user().await.unwrap().name, "Jane");
    }

    #[tokio::test]
    async fn test_create_table_notifications() {
        let fx = logged_in().await;

        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::date("Date")], SHEET)
            .await
            .unwrap();
        assert_eq!(table.rows().len(), 5);

        let err = fx.dashboard.create_table(vec![], SHEET).await.unwrap_err();
        assert!(err.is_validation());

        fx.provider.fail_next(1);
        let err = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));

        let notices = fx.notifier.notices();
        assert_eq!(notices.len(), 4);
        assert_eq!(notices[1].message, "Table created successfully");
        assert_eq!(
            fx.notifier.errors(),
            vec!["Failed to create table", "Failed to create table. Please try again."]
        );
        assert_eq!(fx.dashboard.tables().await.unwrap(), vec![table]);
    }

    #[tokio::test]
    async fn test_add_column_notifications() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::date("Date")], SHEET)
            .await
            .unwrap();

        let column = fx
            .dashboard
            .add_column(&table.id, ColumnSpec::text("Notes"))
            .await
            .unwrap();
        assert_eq!(column.name, "Notes");

        assert!(fx.dashboard.add_column(&table.id, ColumnSpec::text("  ")).await.is_err());
        assert!(fx
            .dashboard
            .add_column("T_MISSING", ColumnSpec::text("Notes"))
            .await
            .is_err());

        let successes = fx.notifier.successes();
        assert_eq!(successes.last().map(String::as_str), Some("Added Notes column"));
        assert_eq!(
            fx.notifier.errors(),
            vec!["Please enter a column name", "Failed to add column"]
        );

        let grid = fx.dashboard.render_table(&table.id).await.unwrap();
        assert!(grid.iter().all(|row| row.len() == 2 && row[1].is_empty()));
    }

    #[tokio::test]
    async fn test_refresh_and_open_failures_notify() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();

        let outcome = fx.dashboard.refresh_table(&table.id).await.unwrap();
        assert_eq!(outcome.row_count, 6);

        fx.provider.set_offline(true);
        assert!(fx.dashboard.refresh_table(&table.id).await.is_err());
        assert!(fx.dashboard.open_table("T_MISSING").await.is_err());
        assert_eq!(
            fx.notifier.errors(),
            vec!["Failed to refresh table data", "Failed to load table data"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_stops_watches() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();

        fx.dashboard.watch_table(&table.id).await.unwrap();
        fx.dashboard.watch_table(&table.id).await.unwrap();
        assert_eq!(fx.dashboard.watched_tables(), vec![table.id.clone()]);
        settle().await;

        assert_eq!(fx.dashboard.logout().await, NavigationIntent::Login);
        assert!(fx.dashboard.watched_tables().is_empty());
        assert!(!fx.dashboard.unwatch_table(&table.id));
        assert_eq!(
            fx.notifier.successes().last().map(String::as_str),
            Some("Logged out successfully")
        );

        let err = fx.dashboard.open_table(&table.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_table_polls_until_unwatched() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();

        let err = fx.dashboard.watch_table("T_MISSING").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        fx.dashboard.watch_table(&table.id).await.unwrap();
        settle().await;
        assert_eq!(row_count(&fx, &table.id).await, 6);

        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(row_count(&fx, &table.id).await, 7);

        assert!(fx.dashboard.unwatch_table(&table.id));
        tokio::time::advance(std::time::Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(row_count(&fx, &table.id).await, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expiry_tears_down_and_navigates() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();
        fx.dashboard.watch_table(&table.id).await.unwrap();

        let intents = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = intents.clone();
        fx.dashboard
            .start_session_watch(move |intent| recorded.lock().unwrap().push(intent));
        settle().await;
        assert_eq!(fx.dashboard.session().state(), crate::auth::SessionState::Authenticated);

        fx.clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(*intents.lock().unwrap(), vec![NavigationIntent::Login]);
        assert!(fx.dashboard.watched_tables().is_empty());
        assert_eq!(fx.dashboard.session().state(), crate::auth::SessionState::Anonymous);

        let expired: Vec<_> = fx
            .notifier
            .notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message)
            .collect();
        assert_eq!(expired, vec![SESSION_EXPIRED_NOTICE]);

        // Another full period passes without a second report
        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(intents.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_found_by_gated_call_still_tears_down() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();
        fx.dashboard.watch_table(&table.id).await.unwrap();

        let intents = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = intents.clone();
        fx.dashboard
            .start_session_watch(move |intent| recorded.lock().unwrap().push(intent));
        settle().await;
        assert_eq!(row_count(&fx, &table.id).await, 6);

        // The user acts after the credential lapsed but before the next check
        fx.clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
        let err = fx.dashboard.tables().await.unwrap_err();
        assert_eq!(redirect_for(&err), Some(NavigationIntent::Login));
        assert_eq!(fx.dashboard.session().state(), crate::auth::SessionState::Anonymous);

        // Sync ticks before the expiry check do not reach the sheet
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        settle().await;
        assert!(intents.lock().unwrap().is_empty());

        tokio::time::advance(std::time::Duration::from_secs(55)).await;
        settle().await;
        assert_eq!(*intents.lock().unwrap(), vec![NavigationIntent::Login]);
        assert!(fx.dashboard.watched_tables().is_empty());
        assert_eq!(fx.notifier.errors(), vec![SESSION_EXPIRED_NOTICE]);

        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(intents.lock().unwrap().len(), 1);

        fx.dashboard.login("jane@example.com", "pw").await.unwrap();
        assert_eq!(row_count(&fx, &table.id).await, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let fx = logged_in().await;
        let table = fx
            .dashboard
            .create_table(vec![ColumnSpec::text("Title")], SHEET)
            .await
            .unwrap();
        fx.dashboard.watch_table(&table.id).await.unwrap();
        fx.dashboard.start_session_watch(|_| {});
        settle().await;
        let rows = row_count(&fx, &table.id).await;

        fx.dashboard.shutdown();
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(row_count(&fx, &table.id).await, rows);

        fx.clock.advance(chrono::Duration::minutes(10));
        tokio::time::advance(std::time::Duration::from_secs(60)).await;
        settle().await;
        assert!(fx.notifier.errors().is_empty());
    }
}
