// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use super::*;
use crate::store::MemoryStore;

fn session_with(
    entries: &[(&str, &str)],
) -> (Arc<SessionManager>, Arc<MemoryStore>, Arc<AtomicU32>) {
    let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
    let calls = Arc::new(AtomicU32::new(0));
    let hook_calls = Arc::clone(&calls);
    let hook = move |_reason: ReauthReason| {
        hook_calls.fetch_add(1, Ordering::SeqCst);
    };
    let session = SessionManager::new(store.clone(), Arc::new(hook));
    (session, store, calls)
}

fn sent(token: Option<&str>) -> SentWith {
    SentWith { token: token.map(str::to_owned), epoch: 0 }
}

fn ok_response() -> ApiResponse {
    ApiResponse { status: StatusCode::OK, headers: HeaderMap::new(), body: Bytes::from_static(b"{}") }
}

#[test]
fn first_unauthorized_leads_and_later_ones_queue() {
    let (session, _store, _) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    let a = ApiRequest::get("/a");
    let b = ApiRequest::get("/b");
    let c = ApiRequest::get("/c");

    let lease = match session.begin_refresh(&a, &sent(Some("t1"))) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    assert!(session.refresh_in_flight());

    assert!(matches!(session.begin_refresh(&b, &sent(Some("t1"))), RefreshTicket::Queued(_)));
    assert!(matches!(session.begin_refresh(&c, &sent(Some("t1"))), RefreshTicket::Queued(_)));
    assert_eq!(session.pending_len(), 2);
    drop(lease);
}

#[test]
fn queue_drains_in_fifo_order_then_clears_flag() {
    let (session, _store, _) = session_with(&[("token", "t1")]);
    let mut lease = match session.begin_refresh(&ApiRequest::get("/a"), &sent(Some("t1"))) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    for path in ["/b", "/c", "/d"] {
        let _ = session.begin_refresh(&ApiRequest::get(path), &sent(Some("t1")));
    }

    let mut order = Vec::new();
    while let Some(queued) = lease.next_queued() {
        order.push(queued.request.path.clone());
    }
    assert_eq!(order, vec!["/b", "/c", "/d"]);
    assert!(!session.refresh_in_flight());
    assert_eq!(session.pending_len(), 0);
}

#[tokio::test]
async fn queued_caller_receives_leader_reply() -> anyhow::Result<()> {
    let (session, _store, _) = session_with(&[("token", "t1")]);
    let mut lease = match session.begin_refresh(&ApiRequest::get("/a"), &sent(Some("t1"))) {
        RefreshTicket::Lead(lease) => lease,
        other => anyhow::bail!("expected lead, got {other:?}"),
    };
    let rx = match session.begin_refresh(&ApiRequest::get("/b"), &sent(Some("t1"))) {
        RefreshTicket::Queued(rx) => rx,
        other => anyhow::bail!("expected queued, got {other:?}"),
    };

    let queued = lease.next_queued().ok_or_else(|| anyhow::anyhow!("queue empty"))?;
    queued.reply(Ok(ok_response()));
    assert!(lease.next_queued().is_none());

    let reply = rx.await?;
    assert_eq!(reply.map(|r| r.status).ok(), Some(StatusCode::OK));
    Ok(())
}

#[test]
fn replaced_token_replays_without_refresh() {
    let (session, _store, _) = session_with(&[("token", "t2")]);
    let ticket = session.begin_refresh(&ApiRequest::get("/a"), &sent(Some("t1")));
    assert!(matches!(ticket, RefreshTicket::Stale));
    assert!(!session.refresh_in_flight());
}

#[test]
fn missing_token_still_leads() {
    let (session, _store, _) = session_with(&[("refreshToken", "r1")]);
    let ticket = session.begin_refresh(&ApiRequest::get("/a"), &sent(None));
    assert!(matches!(ticket, RefreshTicket::Lead(_)));
}

#[tokio::test]
async fn dropped_lease_releases_waiters() -> anyhow::Result<()> {
    let (session, _store, _) = session_with(&[("token", "t1")]);
    let lease = session.begin_refresh(&ApiRequest::get("/a"), &sent(Some("t1")));
    let rx = match session.begin_refresh(&ApiRequest::get("/b"), &sent(Some("t1"))) {
        RefreshTicket::Queued(rx) => rx,
        other => anyhow::bail!("expected queued, got {other:?}"),
    };

    drop(lease);

    assert!(!session.refresh_in_flight());
    let reply = rx.await?;
    assert!(matches!(reply, Err(ClientError::RefreshAbandoned)));

    // A new refresh can start afterwards.
    assert!(matches!(
        session.begin_refresh(&ApiRequest::get("/c"), &sent(Some("t1"))),
        RefreshTicket::Lead(_)
    ));
    Ok(())
}

#[test]
fn fail_evicts_once_and_hands_back_every_waiter() {
    let (session, store, calls) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    let lease = match session.begin_refresh(&ApiRequest::get("/a"), &sent(Some("t1"))) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    let _b = session.begin_refresh(&ApiRequest::get("/b"), &sent(Some("t1")));
    let _c = session.begin_refresh(&ApiRequest::get("/c"), &sent(Some("t1")));

    let waiters = lease.fail(&RefreshError::new(Some(401), "revoked"));
    let paths: Vec<_> = waiters.iter().map(|q| q.request.path.as_str()).collect();
    assert_eq!(paths, vec!["/b", "/c"]);
    assert!(!session.refresh_in_flight());
    assert_eq!(store.get("token"), None);
    assert_eq!(store.get("refreshToken"), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn late_401_after_failed_refresh_reuses_its_error() {
    let (session, _store, calls) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    let before = session.sent_with();
    let lease = match session.begin_refresh(&ApiRequest::get("/a"), &before) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    let error = RefreshError::new(Some(401), "revoked");
    drop(lease.fail(&error));

    match session.begin_refresh(&ApiRequest::get("/late"), &before) {
        RefreshTicket::Failed(e) => assert_eq!(e, error),
        other => panic!("expected failed, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!session.refresh_in_flight());

    // A request sent after the eviction is a new event and may lead again.
    assert!(matches!(
        session.begin_refresh(&ApiRequest::get("/new"), &session.sent_with()),
        RefreshTicket::Lead(_)
    ));
}

#[test]
fn late_401_without_token_after_failure_does_not_lead() {
    let (session, _store, calls) = session_with(&[]);
    let before = session.sent_with();
    assert_eq!(before.token, None);
    let lease = match session.begin_refresh(&ApiRequest::get("/a"), &before) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    drop(lease.fail(&RefreshError::missing_refresh_token()));

    let ticket = session.begin_refresh(&ApiRequest::get("/b"), &before);
    assert!(
        matches!(ticket, RefreshTicket::Failed(ref e) if *e == RefreshError::missing_refresh_token()),
        "got {ticket:?}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn successful_refresh_advances_epoch() {
    let (session, store, _) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    let before = session.sent_with();
    let mut lease = match session.begin_refresh(&ApiRequest::get("/a"), &before) {
        RefreshTicket::Lead(lease) => lease,
        other => panic!("expected lead, got {other:?}"),
    };
    lease.store(&TokenGrant { access_token: "t2".into(), refresh_token: None });
    assert!(lease.next_queued().is_none());

    assert_eq!(store.get("token").as_deref(), Some("t2"));
    let after = session.sent_with();
    assert_ne!(after.epoch, before.epoch);
    assert_eq!(after.token.as_deref(), Some("t2"));
    assert!(matches!(session.begin_refresh(&ApiRequest::get("/b"), &before), RefreshTicket::Stale));
}

#[test]
fn evict_erases_tokens_and_notifies_once() {
    let (session, store, calls) = session_with(&[
        ("token", "t1"),
        ("refreshToken", "r1"),
        ("role", "ROLE_GENERAL_MANAGER"),
    ]);
    session.evict(ReauthReason::Forbidden);

    assert_eq!(store.get("token"), None);
    assert_eq!(store.get("refreshToken"), None);
    // Profile keys survive eviction; only logout clears them.
    assert_eq!(store.get("role").as_deref(), Some("ROLE_GENERAL_MANAGER"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn install_replaces_stale_refresh_token() -> anyhow::Result<()> {
    let (session, store, _) = session_with(&[("token", "old"), ("refreshToken", "old-r")]);
    session.install(&Credentials { access_token: "new".into(), refresh_token: None })?;
    assert_eq!(store.get("token").as_deref(), Some("new"));
    assert_eq!(store.get("refreshToken"), None);
    Ok(())
}

#[test]
fn store_refreshed_keeps_refresh_token_unless_rotated() {
    let (session, store, _) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    session.store_refreshed(&TokenGrant { access_token: "t2".into(), refresh_token: None });
    assert_eq!(store.get("token").as_deref(), Some("t2"));
    assert_eq!(store.get("refreshToken").as_deref(), Some("r1"));

    session.store_refreshed(&TokenGrant { access_token: "t3".into(), refresh_token: Some("r2".into()) });
    assert_eq!(store.get("token").as_deref(), Some("t3"));
    assert_eq!(store.get("refreshToken").as_deref(), Some("r2"));
}

#[test]
fn clear_removes_profile_and_tokens() -> anyhow::Result<()> {
    let (session, store, calls) = session_with(&[("token", "t1"), ("refreshToken", "r1")]);
    session.install_profile(&Profile {
        role: Some("ROLE_TOUR_GUIDE".into()),
        email: Some("guide@tours.example".into()),
        guide_id: Some(12),
        customer_id: None,
    })?;
    assert_eq!(store.get("guideId").as_deref(), Some("12"));

    session.clear()?;
    for key in ["token", "refreshToken", "role", "email", "guideId", "customerId"] {
        assert_eq!(store.get(key), None, "{key} should be cleared");
    }
    // Logout is deliberate; the re-auth hook is not involved.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn status_reports_expiry_from_token() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"gm@tours.example","exp":2000}"#);
    let token = format!("h.{payload}.s");
    let (session, _store, _) = session_with(&[("token", token.as_str()), ("email", "gm@tours.example")]);

    let status = session.status_at(1000);
    assert!(status.logged_in);
    assert!(!status.has_refresh_token);
    assert_eq!(status.expires_at, Some(2000));
    assert!(!status.expired);
    assert_eq!(status.email.as_deref(), Some("gm@tours.example"));

    assert!(session.status_at(2000).expired);
}
