//! Integration tests for operator commands
//!
//! These tests verify that:
//! - Unauthorized identities are rejected
//! - Targets can be added, listed, inspected and removed
//! - Input validation produces the documented replies
//! - New admins are persisted and authorized immediately

use std::sync::Arc;

use chrono::Utc;
use keepalive_monitor::commands::{AuthorizationCache, CommandHandler};
use keepalive_monitor::storage::{
    HistoryRecord, Identity, StorageResult, Stores, TargetStatus,
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

const ADMIN: Identity = Identity(100);
const STRANGER: Identity = Identity(200);

async fn handler(stores: &Stores) -> CommandHandler {
    let auth = AuthorizationCache::load(stores.admins.clone(), &[ADMIN])
        .await
        .unwrap();
    CommandHandler::new(stores.clone(), auth)
}

async fn send(handler: &CommandHandler, sender: Identity, text: &str) -> String {
    handler
        .handle_message(sender, text)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_non_command_is_ignored() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    assert_eq!(handler.handle_message(ADMIN, "hello there").await, None);
}

#[tokio::test]
async fn test_unauthorized_sender() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, STRANGER, "/listbots").await;
    assert!(reply.contains("Unauthorized"));

    let reply = send(&handler, STRANGER, "/addbot x https://x.example.com 5").await;
    assert!(reply.contains("Unauthorized"));
    assert!(stores.targets.list_targets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_and_help() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    assert!(send(&handler, ADMIN, "/start").await.contains("Welcome"));

    let help = send(&handler, ADMIN, "/help").await;
    for command in ["/addbot", "/removebot", "/listbots", "/stats", "/addadmin"] {
        assert!(help.contains(command), "help is missing {command}");
    }
}

#[tokio::test]
async fn test_add_target() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/addbot @mybot https://mybot.onrender.com 5").await;
    assert!(reply.starts_with("✅"));
    assert!(reply.contains("mybot"));

    let target = stores.targets.get_target_by_name("mybot").await.unwrap().unwrap();
    assert_eq!(target.address, "https://mybot.onrender.com");
    assert_eq!(target.interval_minutes, 5);
    assert_eq!(target.status, TargetStatus::Unknown);
    assert_eq!(target.owner, ADMIN);
    assert!(Utc::now() - target.last_probed < chrono::Duration::seconds(5));
}

#[tokio::test]
async fn test_add_duplicate_target() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    send(&handler, ADMIN, "/addbot mybot https://a.example.com 5").await;
    let reply = send(&handler, ADMIN, "/addbot @mybot https://b.example.com 10").await;

    assert!(reply.contains("already"));
    let target = stores.targets.get_target_by_name("mybot").await.unwrap().unwrap();
    assert_eq!(target.address, "https://a.example.com");
}

#[tokio::test]
async fn test_add_target_validation() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/addbot mybot").await;
    assert!(reply.contains("Usage"));

    let reply = send(&handler, ADMIN, "/addbot mybot https://a.example.com 0").await;
    assert!(reply.contains("Invalid interval"));

    let reply = send(&handler, ADMIN, "/addbot mybot https://a.example.com five").await;
    assert!(reply.contains("Invalid interval"));

    let reply = send(&handler, ADMIN, "/addbot mybot ftp://a.example.com 5").await;
    assert!(reply.contains("Invalid URL"));

    let reply = send(&handler, ADMIN, "/addbot mybot not-a-url 5").await;
    assert!(reply.contains("Invalid URL"));

    assert!(stores.targets.list_targets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_target() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;
    add_target(&stores, "mybot", "https://a.example.com", 5, ADMIN, 0).await;

    let reply = send(&handler, ADMIN, "/removebot @mybot").await;
    assert!(reply.starts_with("✅"));
    assert!(stores.targets.get_target_by_name("mybot").await.unwrap().is_none());

    let reply = send(&handler, ADMIN, "/removebot mybot").await;
    assert!(reply.contains("not found"));
}

#[tokio::test]
async fn test_list_targets() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/listbots").await;
    assert!(reply.contains("No targets"));

    let a = add_target(&stores, "alpha", "https://a.example.com", 5, ADMIN, 0).await;
    add_target(&stores, "beta", "https://b.example.com", 10, ADMIN, 0).await;
    stores
        .targets
        .update_status(a.id, TargetStatus::Online, Utc::now())
        .await
        .unwrap();

    let reply = send(&handler, ADMIN, "/listbots").await;
    assert!(reply.contains("1. alpha ✅"));
    assert!(reply.contains("2. beta ❓"));
    assert!(reply.contains("URL: https://b.example.com"));
    assert!(reply.contains("Interval: 10 min"));
}

#[tokio::test]
async fn test_stats() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/stats").await;
    assert!(reply.contains("No targets"));

    let target = add_target(&stores, "alpha", "https://a.example.com", 5, ADMIN, 0).await;
    add_target(&stores, "beta", "https://b.example.com", 5, ADMIN, 0).await;
    for success in [true, true, false] {
        stores
            .history
            .append_history(HistoryRecord {
                target_id: target.id,
                timestamp: Utc::now(),
                success,
            })
            .await
            .unwrap();
    }

    let reply = send(&handler, ADMIN, "/stats").await;
    assert!(reply.contains("Uptime: 66.67%"));
    assert!(reply.contains("Total probes: 3"));
    // A target without history reports zero uptime
    assert!(reply.contains("Uptime: 0.00%"));
    assert!(reply.contains("Total probes: 0"));
}

#[tokio::test]
async fn test_add_admin() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/addadmin 200").await;
    assert!(reply.starts_with("✅"));
    let admin = stores.admins.find_admin(STRANGER).await.unwrap().unwrap();
    assert_eq!(admin.identity, STRANGER);
    assert_eq!(admin.username, None);

    // Authorized without a restart
    let reply = send(&handler, STRANGER, "/listbots").await;
    assert!(!reply.contains("Unauthorized"));

    let reply = send(&handler, ADMIN, "/addadmin 200").await;
    assert!(reply.contains("already"));

    let reply = send(&handler, ADMIN, "/addadmin bob").await;
    assert!(reply.contains("Invalid user ID"));
}

#[tokio::test]
async fn test_unknown_command() {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/reboot").await;
    assert!(reply.contains("/help"));
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let (backend, _stores) = memory_stores();
    let stores = Stores {
        targets: Arc::new(FailingTargetStore),
        history: backend.clone(),
        admins: backend,
    };
    let handler = handler(&stores).await;

    let reply = send(&handler, ADMIN, "/listbots").await;
    assert!(reply.contains("went wrong"));
}

#[tokio::test]
async fn test_admins_survive_reload() -> StorageResult<()> {
    let (_backend, stores) = memory_stores();
    let handler = handler(&stores).await;
    send(&handler, ADMIN, "/addadmin 200").await;

    let reloaded = AuthorizationCache::load(stores.admins.clone(), &[]).await?;
    assert!(reloaded.is_authorized(ADMIN).await);
    assert!(reloaded.is_authorized(STRANGER).await);
    Ok(())
}
