//! Session lifecycle integration tests
//!
//! Connect, logon, reconnect backoff and shutdown, driven through the mock
//! session with a paused clock.

mod common;

use common::{advance, settle, TestSetup};
use picsync_core::{ResultCode, SessionError, SessionEvent, SessionState};
use picsync_harness::MockSessionConfig;
use picsync_runtime::ControllerError;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Logon
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_connect_and_logon() {
    let runtime = TestSetup::default().start().await;

    assert_eq!(runtime.handle.session_state(), SessionState::LoggedOn);
    assert_eq!(runtime.probe.connect_count(), 1);
    assert_eq!(runtime.probe.logon_count(), 1);
    assert!(runtime
        .announcer
        .contains("is now logged in. Server time: 2013-04-01 12:00:00 UTC"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_starts_one_second_after_logon() {
    let runtime = TestSetup::default().start().await;
    assert!(runtime.probe.change_requests().is_empty());

    advance(Duration::from_secs(1)).await;
    let requests = runtime.probe.change_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.value(), 100);

    advance(Duration::from_secs(2)).await;
    assert_eq!(runtime.probe.change_requests().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_database_polls_from_zero() {
    let runtime = TestSetup {
        latest_change: None,
        ..TestSetup::default()
    }
    .start()
    .await;

    advance(Duration::from_secs(1)).await;
    assert_eq!(runtime.probe.change_requests()[0].0.value(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_is_fatal() {
    let mut runtime = TestSetup {
        session: MockSessionConfig {
            auto_connect: Some(ResultCode::ServiceUnavailable),
            ..MockSessionConfig::default()
        },
        ..TestSetup::default()
    }
    .start()
    .await;

    let result = runtime.handle.wait().await;
    assert!(matches!(
        result,
        Err(ControllerError::ConnectFailed {
            result: ResultCode::ServiceUnavailable
        })
    ));
    assert!(runtime
        .announcer
        .contains("failed to connect: ServiceUnavailable"));
    assert_eq!(runtime.probe.logon_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logon_failure_pauses_then_waits_for_disconnect() {
    let runtime = TestSetup {
        session: MockSessionConfig {
            auto_logon: Some(ResultCode::InvalidPassword),
            ..MockSessionConfig::default()
        },
        ..TestSetup::default()
    }
    .start()
    .await;

    assert!(runtime
        .announcer
        .contains("failed to log in: InvalidPassword"));
    advance(Duration::from_secs(3)).await;
    assert_eq!(runtime.handle.session_state(), SessionState::Disconnected);
    assert_eq!(runtime.probe.connect_count(), 1);

    // The session layer reports the dropped connection; the normal reconnect path follows
    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();
    advance(Duration::from_secs(16)).await;
    assert_eq!(runtime.probe.connect_count(), 2);
    assert!(runtime.probe.change_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_logged_off_stops_polling() {
    let runtime = TestSetup::default().start().await;
    advance(Duration::from_secs(1)).await;
    assert_eq!(runtime.probe.change_requests().len(), 1);

    runtime
        .probe
        .emit(SessionEvent::LoggedOff {
            result: ResultCode::Fail,
        })
        .await
        .unwrap();
    settle().await;
    assert_eq!(runtime.handle.session_state(), SessionState::LoggedOff);
    assert!(runtime.announcer.contains("logged off."));

    advance(Duration::from_secs(5)).await;
    assert_eq!(runtime.probe.change_requests().len(), 1);
}

// ----------------------------------------------------------------------------
// Reconnect
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_disconnect_reconnects_once_after_delay() {
    let runtime = TestSetup::default().start().await;

    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();
    settle().await;
    assert!(runtime
        .announcer
        .contains("disconnected. Retrying in 15 seconds..."));

    advance(Duration::from_secs(14)).await;
    assert_eq!(runtime.probe.connect_count(), 1);

    advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(runtime.probe.connect_count(), 2);
    assert_eq!(runtime.probe.logon_count(), 2);
    assert_eq!(runtime.handle.session_state(), SessionState::LoggedOn);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_that_cannot_be_issued_is_fatal() {
    let mut runtime = TestSetup::default().start().await;
    runtime.probe.reject_connects(true);

    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();
    advance(Duration::from_secs(16)).await;

    let result = runtime.handle.wait().await;
    assert!(matches!(
        result,
        Err(ControllerError::Session(SessionError::RequestRejected { .. }))
    ));
    assert_eq!(runtime.probe.connect_count(), 2);
    assert!(runtime.announcer.contains("failed to connect"));
}

#[tokio::test(start_paused = true)]
async fn test_no_polls_while_disconnected() {
    let runtime = TestSetup::default().start().await;
    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();

    advance(Duration::from_secs(10)).await;
    assert!(runtime.probe.change_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_never_reconnects() {
    let mut runtime = TestSetup::default().start().await;

    let stats = runtime.handle.shutdown().await.unwrap();
    assert_eq!(stats.connect_attempts, 1);
    assert_eq!(runtime.probe.disconnect_count(), 1);

    advance(Duration::from_secs(60)).await;
    assert_eq!(runtime.probe.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_reconnect_delay() {
    let mut runtime = TestSetup::default().start().await;
    runtime.probe.emit(SessionEvent::Disconnected).await.unwrap();
    settle().await;

    runtime.handle.shutdown().await.unwrap();
    advance(Duration::from_secs(30)).await;
    assert_eq!(runtime.probe.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_without_disconnect_confirmation() {
    let mut runtime = TestSetup {
        session: MockSessionConfig {
            auto_disconnect: false,
            ..MockSessionConfig::default()
        },
        ..TestSetup::default()
    }
    .start()
    .await;

    let stats = runtime.handle.shutdown().await.unwrap();
    assert_eq!(stats.disconnects, 0);
    assert_eq!(runtime.probe.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logon_after_shutdown_does_not_poll() {
    let mut runtime = TestSetup {
        session: MockSessionConfig::manual(),
        ..TestSetup::default()
    }
    .start()
    .await;
    runtime
        .probe
        .emit(SessionEvent::Connected {
            result: ResultCode::Ok,
        })
        .await
        .unwrap();
    settle().await;

    let probe = runtime.probe.clone();
    let late_logon = async {
        settle().await;
        probe
            .emit(SessionEvent::LoggedOn {
                result: ResultCode::Ok,
                server_time: "2013-04-01 12:00:00".to_string(),
            })
            .await
            .unwrap();
        advance(Duration::from_secs(3)).await;
    };
    let (result, ()) = tokio::join!(runtime.handle.shutdown(), late_logon);

    let stats = result.unwrap();
    assert_eq!(stats.logons, 0);
    assert!(runtime.probe.change_requests().is_empty());
    assert!(!runtime.announcer.contains("is now logged in"));
}
