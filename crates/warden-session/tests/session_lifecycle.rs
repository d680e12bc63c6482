//! Session core integration tests: account limits, sliding window,
//! activation invariants, and revocation.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::sync::Arc;

use warden_kv_adapter_memory::MemoryKvAdapter;
use warden_session::store::{SessionConfig, SessionStore};
use warden_types::prelude::Clock;
use warden_types::session::AddAccountData;
use warden_types::types::{ManualClock, Timestamp};

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

struct Fixture {
	clock: Arc<ManualClock>,
	store: SessionStore,
}

fn fixture() -> Fixture {
	let clock = Arc::new(ManualClock::new(Timestamp(1_000_000)));
	let kv = Arc::new(MemoryKvAdapter::with_clock(clock.clone()));
	let store = SessionStore::new(kv, None, clock.clone(), SessionConfig::default());
	Fixture { clock, store }
}

fn add<'a>(session_id: &'a str, user_id: &'a str) -> AddAccountData<'a> {
	AddAccountData {
		browser_session_id: session_id,
		user_id,
		subject_type: "user",
		subject_properties: json!({}),
		refresh_token: Some("rt"),
		client_id: Some("app"),
		ttl_seconds: 3600,
	}
}

#[tokio::test]
async fn test_fourth_account_rejected() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();

	for user in ["u1", "u2", "u3"] {
		f.store.add_account_to_session(add(&session.id, user)).await.unwrap();
	}

	let err = f.store.add_account_to_session(add(&session.id, "u4")).await.unwrap_err();
	assert_eq!(err.code(), Some("max_accounts_exceeded"));

	let session = f.store.get_browser_session(&session.id, "acme").await.unwrap().unwrap();
	assert_eq!(
		session.account_user_ids,
		vec![Box::from("u1"), Box::from("u2"), Box::from("u3")]
	);
	assert_eq!(session.active_user_id.as_deref(), Some("u3"));
	// Created at version 1, bumped exactly once per successful add
	assert_eq!(session.version, 4);
}

#[tokio::test]
async fn test_tenant_account_limit_override() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();

	f.store.add_account_with_limit(add(&session.id, "u1"), Some(1)).await.unwrap();
	let err =
		f.store.add_account_with_limit(add(&session.id, "u2"), Some(1)).await.unwrap_err();
	assert_eq!(err.code(), Some("max_accounts_exceeded"));

	// Re-authenticating the existing member is not an addition
	f.store.add_account_with_limit(add(&session.id, "u1"), Some(1)).await.unwrap();
}

#[tokio::test]
async fn test_readd_existing_account_does_not_grow() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();

	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u2")).await.unwrap();
	// u1 signs in again
	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();

	let session = f.store.get_browser_session(&session.id, "acme").await.unwrap().unwrap();
	assert_eq!(session.account_user_ids.len(), 2);
	assert_eq!(session.active_user_id.as_deref(), Some("u1"));

	let accounts = f.store.list_account_sessions(&session.id).await.unwrap();
	let active: Vec<_> = accounts.iter().filter(|a| a.is_active).collect();
	assert_eq!(active.len(), 1);
	assert_eq!(active[0].user_id.as_ref(), "u1");
}

#[tokio::test]
async fn test_sliding_window_and_hard_lifetime() {
	let f = fixture();
	let created = f.clock.now();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();

	// 1h later: inside the window, read is non-mutating
	f.clock.advance_millis(HOUR_MS);
	let s = f.store.get_browser_session(&session.id, "acme").await.unwrap().unwrap();
	assert_eq!(s.last_activity, created);
	assert_eq!(s.version, 1);

	// 25h after creation: past the 1d window, one write refreshes
	f.clock.set(created.add_millis(25 * HOUR_MS));
	let s = f.store.get_browser_session(&session.id, "acme").await.unwrap().unwrap();
	assert_eq!(s.last_activity, created.add_millis(25 * HOUR_MS));
	assert_eq!(s.version, 2);

	// Just past the 7d hard lifetime: gone, cleaned up
	f.clock.set(created.add_millis(7 * DAY_MS + 1_000));
	assert!(f.store.get_browser_session(&session.id, "acme").await.unwrap().is_none());
	assert!(f.store.find_browser_session(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sliding_refresh_never_extends_hard_lifetime() {
	let f = fixture();
	let created = f.clock.now();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();

	// Touch the session every day; the hard cap must still apply
	for day in 1..=6 {
		f.clock.set(created.add_millis(day * DAY_MS + 1000));
		assert!(
			f.store.get_browser_session(&session.id, "acme").await.unwrap().is_some(),
			"day {day}"
		);
	}
	f.clock.set(created.add_millis(7 * DAY_MS + 1000));
	assert!(f.store.get_browser_session(&session.id, "acme").await.unwrap().is_none());
}

#[tokio::test]
async fn test_switch_active_account() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u2")).await.unwrap();

	let session = f.store.switch_active_account(&session.id, "u1").await.unwrap();
	assert_eq!(session.active_user_id.as_deref(), Some("u1"));
	assert_eq!(session.version, 4);

	// At most one active account row at any observable point
	let accounts = f.store.list_account_sessions(&session.id).await.unwrap();
	assert_eq!(accounts.iter().filter(|a| a.is_active).count(), 1);

	let err = f.store.switch_active_account(&session.id, "ghost").await.unwrap_err();
	assert_eq!(err.code(), Some("account_not_found"));

	let err = f.store.switch_active_account("no-such-session", "u1").await.unwrap_err();
	assert_eq!(err.code(), Some("session_not_found"));
}

#[tokio::test]
async fn test_remove_account_promotes_first_remaining() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();
	for user in ["u1", "u2", "u3"] {
		f.store.add_account_to_session(add(&session.id, user)).await.unwrap();
	}

	// u3 is active; removing it promotes u1 (first remaining)
	let session = f.store.remove_account(&session.id, "u3").await.unwrap();
	assert_eq!(session.account_user_ids.len(), 2);
	assert_eq!(session.active_user_id.as_deref(), Some("u1"));

	let accounts = f.store.list_account_sessions(&session.id).await.unwrap();
	let active: Vec<_> = accounts.iter().filter(|a| a.is_active).collect();
	assert_eq!(active.len(), 1);
	assert_eq!(active[0].user_id.as_ref(), "u1");

	// Removing the rest empties the session but keeps it alive
	let session = f.store.remove_account(&session.id, "u1").await.unwrap();
	assert_eq!(session.active_user_id.as_deref(), Some("u2"));
	let session = f.store.remove_account(&session.id, "u2").await.unwrap();
	assert_eq!(session.active_user_id, None);
	assert!(session.account_user_ids.is_empty());
	assert!(f.store.get_browser_session(&session.id, "acme").await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_all_accounts_keeps_browser_row() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u2")).await.unwrap();

	let session = f.store.remove_all_accounts(&session.id).await.unwrap();
	assert!(session.account_user_ids.is_empty());
	assert_eq!(session.active_user_id, None);

	assert!(f.store.get_browser_session(&session.id, "acme").await.unwrap().is_some());
	assert!(f.store.list_account_sessions(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_account_read_through_cleanup() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();

	f.clock.advance_millis(3601 * 1000);
	assert!(f.store.get_account_session(&session.id, "u1").await.unwrap().is_none());
	// The row was deleted, not just filtered
	assert!(f.store.list_account_sessions(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revoke_user_sessions_across_browsers() {
	let f = fixture();
	let s1 = f.store.create_browser_session("acme", None, None).await.unwrap();
	let s2 = f.store.create_browser_session("acme", None, None).await.unwrap();
	let other_tenant = f.store.create_browser_session("globex", None, None).await.unwrap();

	f.store.add_account_to_session(add(&s1.id, "victim")).await.unwrap();
	f.store.add_account_to_session(add(&s1.id, "bystander")).await.unwrap();
	f.store.add_account_to_session(add(&s2.id, "victim")).await.unwrap();
	f.store.add_account_to_session(add(&other_tenant.id, "victim")).await.unwrap();

	let revoked = f.store.revoke_user_sessions("acme", "victim").await.unwrap();
	assert_eq!(revoked, 2);

	// No account row references the user in any acme browser session
	for sid in [&s1.id, &s2.id] {
		let accounts = f.store.list_account_sessions(sid).await.unwrap();
		assert!(accounts.iter().all(|a| a.user_id.as_ref() != "victim"));
	}
	// The bystander and the other tenant are untouched
	let s1_accounts = f.store.list_account_sessions(&s1.id).await.unwrap();
	assert_eq!(s1_accounts.len(), 1);
	let other = f.store.list_account_sessions(&other_tenant.id).await.unwrap();
	assert_eq!(other.len(), 1);

	// Idempotent: nothing left to revoke
	assert_eq!(f.store.revoke_user_sessions("acme", "victim").await.unwrap(), 0);
}

#[tokio::test]
async fn test_revoke_specific_session() {
	let f = fixture();
	let session = f.store.create_browser_session("acme", None, None).await.unwrap();
	f.store.add_account_to_session(add(&session.id, "u1")).await.unwrap();

	assert!(f.store.revoke_specific_session(&session.id, "acme").await.unwrap());
	assert!(f.store.get_browser_session(&session.id, "acme").await.unwrap().is_none());
	assert!(f.store.list_account_sessions(&session.id).await.unwrap().is_empty());
	assert_eq!(f.store.revoke_user_sessions("acme", "u1").await.unwrap(), 0);

	// Second revocation reports absence
	assert!(!f.store.revoke_specific_session(&session.id, "acme").await.unwrap());
}

// vim: ts=4
