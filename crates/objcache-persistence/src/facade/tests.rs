use fake::{Fake, Faker};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use objcache_domain::{BlogId, FlushMode};

use super::ObjectCache;
use crate::cache::{InMemoryStore, RemoteStore};
use crate::config::ObjectCacheConfig;

fn config() -> ObjectCacheConfig {
    ObjectCacheConfig {
        salt: "wp_".to_string(),
        global_groups: vec!["users".to_string()],
        non_persistent_groups: vec!["runtime".to_string()],
        ..ObjectCacheConfig::default()
    }
}

fn cache_with(config: &ObjectCacheConfig) -> (ObjectCache, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let cache = ObjectCache::new(config, Some(store.clone()));
    (cache, store)
}

fn cache() -> (ObjectCache, Arc<InMemoryStore>) {
    cache_with(&config())
}

#[tokio::test]
async fn test_non_persistent_groups_never_reach_remote() {
    let (mut cache, store) = cache();

    assert!(cache.set("a", json!(1), "runtime", 0).await);
    assert!(cache.set("b", json!(2), "counts", 0).await);
    assert_eq!(cache.get("a", "runtime", false).await, Some(json!(1)));
    assert_eq!(cache.get("b", "counts", true).await, Some(json!(2)));
    assert!(cache.delete("a", "runtime").await);

    assert_eq!(store.call_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_persistent_set_then_forced_get() {
    let (mut cache, store) = cache();

    assert!(cache.set("42", json!({"title": "Hello"}), "posts", 300).await);
    assert_eq!(store.raw("wp_posts:42").as_deref(), Some(r#"{"title":"Hello"}"#));

    cache.flush_runtime();
    assert_eq!(cache.local_len(), 0);
    assert_eq!(cache.get("42", "posts", true).await, Some(json!({"title": "Hello"})));
    // repopulated locally
    assert_eq!(cache.local_len(), 1);
}

#[tokio::test]
async fn test_forced_get_bypasses_stale_local_value() {
    let (mut cache, store) = cache();

    cache.set("k", json!("old"), "posts", 0).await;
    store.set("wp_posts:k", "\"new\"", None).await.unwrap();

    assert_eq!(cache.get("k", "posts", false).await, Some(json!("old")));
    assert_eq!(cache.get("k", "posts", true).await, Some(json!("new")));
    assert_eq!(cache.get("k", "posts", false).await, Some(json!("new")));
}

#[tokio::test]
async fn test_ttl_is_capped() {
    let mut capped = config();
    capped.max_ttl = 60;
    let (mut cache, store) = cache_with(&capped);

    cache.set("short", json!(1), "posts", 30).await;
    cache.set("long", json!(1), "posts", 86_400).await;
    cache.set("forever", json!(1), "posts", 0).await;

    assert_eq!(store.ttl_of("wp_posts:short"), Some(Duration::from_secs(30)));
    assert_eq!(store.ttl_of("wp_posts:long"), Some(Duration::from_secs(60)));
    assert_eq!(store.ttl_of("wp_posts:forever"), Some(Duration::from_secs(60)));
    assert_eq!(cache.get("long", "posts", true).await, Some(json!(1)));
}

#[tokio::test]
async fn test_uncapped_zero_expiry_persists() {
    let (mut cache, store) = cache();
    cache.set("k", json!(1), "posts", 0).await;
    assert!(store.raw("wp_posts:k").is_some());
    assert_eq!(store.ttl_of("wp_posts:k"), None);
}

#[tokio::test]
async fn test_add_fails_when_key_exists_in_either_tier() {
    let (mut cache, store) = cache();

    assert!(cache.add("local", json!(1), "posts", 0).await);
    assert!(!cache.add("local", json!(2), "posts", 0).await);
    assert_eq!(cache.get("local", "posts", false).await, Some(json!(1)));

    store.set("wp_posts:remote", "1", None).await.unwrap();
    assert!(!cache.add("remote", json!(2), "posts", 0).await);
    assert_eq!(store.raw("wp_posts:remote").as_deref(), Some("1"));

    assert!(cache.add("x", json!(1), "runtime", 0).await);
    assert!(!cache.add("x", json!(1), "runtime", 0).await);
}

#[tokio::test]
async fn test_replace_requires_existing_key() {
    let (mut cache, store) = cache();

    assert!(!cache.replace("missing", json!(1), "posts", 0).await);
    assert_eq!(cache.get("missing", "posts", false).await, None);

    store.set("wp_posts:remote", "1", None).await.unwrap();
    assert!(cache.replace("remote", json!(5), "posts", 0).await);
    assert_eq!(store.raw("wp_posts:remote").as_deref(), Some("5"));

    cache.set("local", json!("a"), "runtime", 0).await;
    assert!(cache.replace("local", json!("b"), "runtime", 0).await);
    assert_eq!(cache.get("local", "runtime", false).await, Some(json!("b")));
}

#[tokio::test]
async fn test_delete_removes_both_tiers() {
    let (mut cache, store) = cache();

    cache.set("k", json!(1), "posts", 0).await;
    assert!(cache.delete("k", "posts").await);
    assert!(store.raw("wp_posts:k").is_none());
    assert_eq!(cache.get("k", "posts", false).await, None);
    assert!(!cache.delete("k", "posts").await);

    store.set("wp_posts:remote-only", "1", None).await.unwrap();
    assert!(cache.delete("remote-only", "posts").await);
}

#[tokio::test]
async fn test_incr_decr_never_below_zero() {
    let (mut cache, store) = cache();

    cache.set("views", json!(3), "posts", 0).await;
    assert_eq!(cache.incr("views", 2, "posts").await, Some(5));
    assert_eq!(cache.decr("views", 1, "posts").await, Some(4));
    assert_eq!(cache.decr("views", 10, "posts").await, Some(0));
    assert_eq!(cache.incr("views", -3, "posts").await, Some(0));
    assert_eq!(store.raw("wp_posts:views").as_deref(), Some("0"));

    cache.set("label", json!("abc"), "posts", 0).await;
    assert_eq!(cache.incr("label", 4, "posts").await, Some(4));

    cache.set("numeric", json!("10"), "posts", 0).await;
    assert_eq!(cache.decr("numeric", 3, "posts").await, Some(7));

    assert_eq!(cache.incr("missing", 1, "posts").await, None);
}

#[tokio::test]
async fn test_incr_is_atomic_across_handles() {
    let store = Arc::new(InMemoryStore::new());
    let mut first = ObjectCache::new(&config(), Some(store.clone()));
    let mut second = ObjectCache::new(&config(), Some(store.clone()));

    assert!(first.set("hits", json!(1), "posts", 0).await);
    assert_eq!(second.incr("hits", 1, "posts").await, Some(2));
    // first still holds 1 locally; the remote counter wins
    assert_eq!(first.incr("hits", 1, "posts").await, Some(3));
    assert_eq!(store.raw("wp_posts:hits").as_deref(), Some("3"));
    assert_eq!(first.get("hits", "posts", false).await, Some(json!(3)));
}

#[tokio::test]
async fn test_incr_keeps_remote_ttl() {
    let (mut cache, store) = cache();

    cache.set("c", json!(1), "posts", 60).await;
    assert_eq!(store.ttl_of("wp_posts:c"), Some(Duration::from_secs(60)));
    assert_eq!(cache.incr("c", 1, "posts").await, Some(2));
    assert_eq!(store.ttl_of("wp_posts:c"), Some(Duration::from_secs(60)));

    // clamping rewrites the value but not the expiry
    assert_eq!(cache.decr("c", 5, "posts").await, Some(0));
    assert_eq!(store.raw("wp_posts:c").as_deref(), Some("0"));
    assert_eq!(store.ttl_of("wp_posts:c"), Some(Duration::from_secs(60)));

    // non-integer values take the fallback path, still keeping the TTL
    cache.set("label", json!("7"), "posts", 45).await;
    assert_eq!(cache.incr("label", 1, "posts").await, Some(8));
    assert_eq!(store.raw("wp_posts:label").as_deref(), Some("8"));
    assert_eq!(store.ttl_of("wp_posts:label"), Some(Duration::from_secs(45)));
}

#[tokio::test]
async fn test_incr_missing_key_creates_nothing() {
    let (mut cache, store) = cache();
    assert_eq!(cache.incr("ghost", 5, "posts").await, None);
    assert!(store.raw("wp_posts:ghost").is_none());
}

#[tokio::test]
async fn test_incr_non_persistent_stays_local() {
    let (mut cache, store) = cache();
    cache.set("n", json!(4), "runtime", 0).await;
    assert_eq!(cache.incr("n", 3, "runtime").await, Some(7));
    assert_eq!(cache.decr("n", 9, "runtime").await, Some(0));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_incr_reads_remote_value() {
    let (mut cache, store) = cache();
    store.set("wp_posts:hits", "41", None).await.unwrap();
    assert_eq!(cache.incr("hits", 1, "posts").await, Some(42));
    assert_eq!(store.raw("wp_posts:hits").as_deref(), Some("42"));
}

#[tokio::test]
async fn test_flush_group_leaves_other_groups() {
    let (mut cache, store) = cache();

    cache.set("1", json!("p1"), "posts", 0).await;
    cache.set("2", json!("p2"), "posts", 0).await;
    cache.set("1", json!("m1"), "postmeta", 0).await;
    cache.set("x", json!("r"), "runtime", 0).await;

    assert!(cache.flush_group("posts").await);

    assert!(store.raw("wp_posts:1").is_none());
    assert!(store.raw("wp_posts:2").is_none());
    assert!(store.raw("wp_postmeta:1").is_some());
    assert_eq!(cache.get("1", "posts", false).await, None);
    assert_eq!(cache.get("1", "postmeta", false).await, Some(json!("m1")));

    assert!(cache.flush_group("runtime").await);
    assert_eq!(cache.get("x", "runtime", false).await, None);
}

#[tokio::test]
async fn test_flush_group_escapes_glob_characters() {
    let (mut cache, store) = cache();
    cache.set("1", json!(1), "p*", 0).await;
    cache.set("1", json!(1), "posts", 0).await;

    assert!(cache.flush_group("p*").await);
    assert!(store.raw("wp_p*:1").is_none());
    assert!(store.raw("wp_posts:1").is_some());
}

#[tokio::test]
async fn test_selective_flush_keeps_foreign_keys() {
    let (mut cache, store) = cache();

    cache.set("1", json!(1), "posts", 0).await;
    cache.set("2", json!(2), "users", 0).await;
    store.set("other_site:posts:1", "1", None).await.unwrap();

    assert!(cache.flush().await);
    assert_eq!(cache.local_len(), 0);
    assert_eq!(store.len(), 1);
    assert!(store.raw("other_site:posts:1").is_some());
}

#[tokio::test]
async fn test_full_flush_clears_database() {
    let mut full = config();
    full.flush_mode = FlushMode::Full;
    let (mut cache, store) = cache_with(&full);

    cache.set("1", json!(1), "posts", 0).await;
    store.set("other_site:posts:1", "1", None).await.unwrap();

    assert!(cache.flush().await);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_multisite_key_namespacing() {
    let mut network = config();
    network.multisite = true;
    let (mut cache, store) = cache_with(&network);

    cache.set("7", json!("alice"), "users", 0).await;
    cache.set("7", json!("post"), "posts", 0).await;
    assert!(store.raw("wp_users:7").is_some());
    assert!(store.raw("wp_1:posts:7").is_some());

    cache.switch_to_blog(BlogId(2));
    assert_eq!(cache.get("7", "users", true).await, Some(json!("alice")));
    assert_eq!(cache.get("7", "posts", true).await, None);
    assert_eq!(cache.get("7", "posts", false).await, None);

    cache.set("7", json!("other post"), "posts", 0).await;
    assert!(store.raw("wp_2:posts:7").is_some());

    assert!(cache.flush_group("posts").await);
    assert!(store.raw("wp_2:posts:7").is_none());
    assert!(store.raw("wp_1:posts:7").is_some());
}

#[tokio::test]
async fn test_salt_change_shifts_key_space() {
    let store = Arc::new(InMemoryStore::new());
    let mut first = ObjectCache::new(&config(), Some(store.clone()));
    first.set("k", json!(1), "posts", 0).await;

    let mut resalted = config();
    resalted.salt = "wp2_".to_string();
    let mut second = ObjectCache::new(&resalted, Some(store.clone()));
    assert_eq!(second.get("k", "posts", false).await, None);
}

#[tokio::test]
async fn test_outage_degrades_without_errors() {
    let (mut cache, store) = cache();
    cache.set("warm", json!(1), "posts", 0).await;
    store.set_unavailable(true);

    // fail-open: local write still reported as success
    assert!(cache.set("k", json!("v"), "posts", 0).await);
    assert_eq!(cache.get("k", "posts", false).await, Some(json!("v")));
    assert_eq!(cache.get("k", "posts", true).await, None);
    assert_eq!(cache.get("cold", "posts", false).await, None);
    assert!(cache.add("new", json!(1), "posts", 0).await);
    assert_eq!(cache.incr("warm", 1, "posts").await, Some(2));
    assert!(cache.delete("warm", "posts").await);
    assert!(!cache.flush_group("posts").await);
    assert!(!cache.flush().await);
    assert_eq!(cache.local_len(), 0);

    let status = cache.status().await;
    assert!(!status.reachable);
    assert!(cache.stats().remote_errors > 0);

    store.set_unavailable(false);
    assert!(cache.status().await.reachable);
}

#[tokio::test]
async fn test_get_multiple_uses_single_mget() {
    let (mut cache, store) = cache();
    cache.set("a", json!("A"), "posts", 0).await;
    store.set("wp_posts:b", "\"B\"", None).await.unwrap();
    let before = store.call_count();

    let results = cache.get_multiple(&["a", "b", "c", ""], "posts", false).await;
    assert_eq!(
        results,
        vec![
            ("a".to_string(), Some(json!("A"))),
            ("b".to_string(), Some(json!("B"))),
            ("c".to_string(), None),
            (String::new(), None),
        ]
    );
    assert_eq!(store.call_count() - before, 1);
    assert_eq!(cache.get("b", "posts", false).await, Some(json!("B")));
    assert_eq!(store.call_count() - before, 1);
}

#[tokio::test]
async fn test_batch_writes_and_deletes() {
    let (mut cache, store) = cache();
    cache.set("taken", json!(0), "posts", 0).await;

    let added = cache
        .add_multiple(
            vec![("taken".to_string(), json!(1)), ("free".to_string(), json!(2))],
            "posts",
            0,
        )
        .await;
    assert_eq!(added, vec![("taken".to_string(), false), ("free".to_string(), true)]);

    let set = cache
        .set_multiple(vec![("x".to_string(), json!(1)), (" ".to_string(), json!(2))], "posts", 0)
        .await;
    assert_eq!(set, vec![("x".to_string(), true), (" ".to_string(), false)]);

    let deleted = cache.delete_multiple(&["x", "nope"], "posts").await;
    assert_eq!(deleted, vec![("x".to_string(), true), ("nope".to_string(), false)]);
    assert!(store.raw("wp_posts:x").is_none());
}

#[tokio::test]
async fn test_empty_group_uses_default() {
    let (mut cache, store) = cache();
    cache.set("k", json!(1), "", 0).await;
    assert!(store.raw("wp_default:k").is_some());
    assert_eq!(cache.get("k", "default", false).await, Some(json!(1)));
}

#[tokio::test]
async fn test_blank_keys_are_rejected() {
    let (mut cache, store) = cache();
    assert!(!cache.set("", json!(1), "posts", 0).await);
    assert!(!cache.add("  ", json!(1), "posts", 0).await);
    assert_eq!(cache.get("", "posts", false).await, None);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_typed_round_trip() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SiteOption {
        name: String,
        autoload: bool,
    }

    let (mut cache, _store) = cache();
    let value = SiteOption {
        name: "siteurl".to_string(),
        autoload: true,
    };
    assert!(cache.set_as("siteurl", &value, "options", 0).await);
    cache.flush_runtime();
    assert_eq!(cache.get_as::<SiteOption>("siteurl", "options", false).await, Some(value));
    assert_eq!(cache.get_as::<u64>("siteurl", "options", false).await, None);
}

#[tokio::test]
async fn test_runtime_group_registration() {
    let (mut cache, store) = cache();
    cache.add_non_persistent_groups(["transient"]);
    cache.set("k", json!(1), "transient", 0).await;
    assert_eq!(store.call_count(), 0);

    cache.add_ignored_groups(["bp"]);
    cache.add_global_groups(["site-transient"]);
    cache.set("k", json!(1), "site-transient", 0).await;
    assert!(store.raw("wp_site-transient:k").is_some());
    assert!(!cache.policy().is_persistent("bp"));
}

#[tokio::test]
async fn test_close_and_disabled_are_local_only() {
    let (mut cache, store) = cache();
    assert!(cache.close());
    assert!(!cache.has_remote());
    cache.set("k", json!(1), "posts", 0).await;
    assert_eq!(cache.get("k", "posts", true).await, Some(json!(1)));
    assert_eq!(store.call_count(), 0);

    let mut disabled = config();
    disabled.disabled = true;
    let (cache, _) = cache_with(&disabled);
    assert!(!cache.has_remote());
}

#[tokio::test]
async fn test_status_and_stats() {
    let (mut cache, _store) = cache();
    cache.set("k", json!(1), "posts", 0).await;
    cache.get("k", "posts", false).await;
    cache.get("missing", "posts", false).await;

    let status = cache.status().await;
    assert_eq!(status.backend, Some("memory"));
    assert!(status.reachable);
    assert_eq!(status.db_size, Some(1));
    assert_eq!(status.salt, "wp_");
    assert_eq!(status.stats.hits, 1);
    assert_eq!(status.stats.misses, 1);
    assert!(status.stats.remote_calls >= 2);
    assert!((status.hit_ratio - 0.5).abs() < f64::EPSILON);
    assert_eq!(status.global_groups, vec!["users"]);
    assert_eq!(status.non_persistent_groups, vec!["runtime"]);
    assert_eq!(status.ignored_groups, vec!["counts", "plugins", "themes"]);

    assert!(cache.supports("flush_group"));
    assert!(!cache.supports("flush_everything"));
}

#[tokio::test]
async fn test_undecodable_remote_value_is_a_miss() {
    let (mut cache, store) = cache();
    store.set("wp_posts:bad", "a:1:{i:0;s:1:\"x\";}", None).await.unwrap();
    assert_eq!(cache.get("bad", "posts", false).await, None);
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_generated_keys_land_under_salt() {
    let (mut cache, store) = cache();

    for _ in 0..20 {
        let key = format!("post-{}", Faker.fake::<String>());
        let id: u32 = (1..10_000).fake();
        assert!(cache.set(&key, json!(id), "posts", 0).await);
        assert!(store.raw(&format!("wp_posts:{key}")).is_some());
        assert_eq!(cache.get(&key, "posts", true).await, Some(json!(id)));
    }
}
