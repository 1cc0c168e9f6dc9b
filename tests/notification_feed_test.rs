use marketplace_ledger::datasource::{Collection, InMemoryCollectionSource};
use marketplace_ledger::db::{init_db, SqliteWatermarkStore};
use marketplace_ledger::domain::{Channel, Notification, OwnerRef, RawDocument, TimeMs};
use marketplace_ledger::engine::notifications::{NotificationAggregator, Recipient, Watermarks};
use marketplace_ledger::{MarketSettings, Marketplace, ProviderIdentity};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn provider() -> Recipient {
    Recipient::provider(ProviderIdentity::new(Some("SP-1"), ["a@x.com", "b@x.com"]))
}

fn sent_at(subject: &str, at: i64) -> Notification {
    Notification::broadcast("Service Providers", Channel::InApp, subject, "", TimeMs::new(at))
}

#[test]
fn test_unread_after_last_seen() {
    let notes = vec![sent_at("t1", 100), sent_at("t2", 200), sent_at("t3", 300)];
    let mut agg = NotificationAggregator::with_watermarks(
        provider(),
        Watermarks {
            last_seen: Some(TimeMs::new(100)),
            hidden_before: None,
        },
    );

    let update = agg.recompute(&notes);
    assert_eq!(update.feed.len(), 3);
    assert_eq!(update.unread, 2);
    let subjects: Vec<_> = update
        .feed
        .iter()
        .map(|e| e.notification.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["t3", "t2", "t1"]);
}

#[test]
fn test_clear_hides_until_something_new_arrives() {
    let mut notes = vec![sent_at("t1", 100), sent_at("t2", 200), sent_at("t3", 300)];
    let mut agg = NotificationAggregator::new(provider());
    agg.clear(TimeMs::new(400));

    let update = agg.recompute(&notes);
    assert!(update.feed.is_empty());
    assert_eq!(update.unread, 0);

    notes.push(sent_at("t4", 500));
    let update = agg.recompute(&notes);
    assert_eq!(update.feed.len(), 1);
    assert_eq!(update.unread, 1);
    assert_eq!(update.banners.len(), 1);
}

#[test]
fn test_mark_seen_zeroes_badge() {
    let notes = vec![sent_at("t1", 100), sent_at("t2", 200)];
    let mut agg = NotificationAggregator::new(provider());
    assert_eq!(agg.recompute(&notes).unread, 2);
    agg.mark_seen(TimeMs::new(200));
    let update = agg.recompute(&notes);
    assert_eq!(update.unread, 0);
    assert_eq!(update.feed.len(), 2);
}

#[test]
fn test_targeted_and_broadcast_merge() {
    let notes = vec![
        sent_at("everyone", 1),
        sent_at("mine", 2).targeted_at(OwnerRef::new(Some("B@X.COM"), None)),
        sent_at("someone else", 3).targeted_at(OwnerRef::new(None, Some("SP-2"))),
        Notification::broadcast("Customers", Channel::Email, "not for providers", "", TimeMs::new(4)),
    ];
    let agg = NotificationAggregator::new(provider());
    let subjects: Vec<_> = agg
        .feed(&notes)
        .into_iter()
        .map(|e| e.notification.subject)
        .collect();
    assert_eq!(subjects, vec!["mine", "everyone"]);
}

#[tokio::test]
async fn test_watermarks_survive_restart_via_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("watermarks.db")
        .to_string_lossy()
        .to_string();

    let source = InMemoryCollectionSource::new().with_documents(
        Collection::Notifications,
        vec![
            RawDocument::new("n1", json!({"audience": "All", "channel": "In-App", "subject": "a", "sentAt": 1_700_000_000_100_i64})),
            RawDocument::new("n2", json!({"audience": "All", "channel": "Email", "subject": "b", "sentAt": 1_700_000_000_200_i64})),
        ],
    );
    let recipient = provider();

    {
        let store = Arc::new(SqliteWatermarkStore::new(init_db(&db_path).await.unwrap()));
        let market = Marketplace::new(Arc::new(source.clone()), store, MarketSettings::default());
        market
            .apply_snapshot(
                Collection::Notifications,
                &source.documents(Collection::Notifications),
            )
            .await;
        assert_eq!(market.notification_feed(&recipient).await.unread, 2);
        market
            .clear_notifications(&recipient, TimeMs::new(1_700_000_000_150))
            .await;
        assert_eq!(market.notification_feed(&recipient).await.feed.len(), 1);
    }

    let store = Arc::new(SqliteWatermarkStore::new(init_db(&db_path).await.unwrap()));
    let market = Marketplace::new(Arc::new(source.clone()), store, MarketSettings::default());
    market
        .apply_snapshot(
            Collection::Notifications,
            &source.documents(Collection::Notifications),
        )
        .await;
    let update = market.notification_feed(&recipient).await;
    assert_eq!(update.feed.len(), 1);
    assert_eq!(update.feed[0].notification.subject, "b");
    assert_eq!(update.unread, 1);
}
