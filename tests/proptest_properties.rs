//! Property-based checks for the two structures the invariants in this
//! engine's testable-properties section are strictest about: the Bloom
//! seen-set (no false negatives, ever) and the checkpoint store
//! (idempotent re-processing, durable recovery set).

use proptest::collection::{hash_set, vec};
use proptest::prelude::*;
use scrapeloom::bloom::Bloom;
use scrapeloom::checkpoint::CheckpointStore;
use tempfile::TempDir;

fn run_async<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build proptest runtime")
        .block_on(fut)
}

proptest! {
    /// Invariant 3: every item ever added to a Bloom filter is reported
    /// present, regardless of how many other items share the table.
    #[test]
    fn bloom_never_reports_a_false_negative(
        items in vec(any::<Vec<u8>>().prop_filter("non-empty", |v| !v.is_empty()), 1..200)
    ) {
        let mut bloom = Bloom::new(500, 0.01);
        for item in &items {
            bloom.add(item);
        }
        for item in &items {
            prop_assert!(bloom.contains(item));
        }
    }

    /// Save-then-load round trip: membership for every previously-added
    /// item agrees before and after persisting to disk, provided geometry
    /// (capacity, error rate) is unchanged.
    #[test]
    fn bloom_save_load_round_trip_preserves_membership(
        items in hash_set(any::<Vec<u8>>().prop_filter("non-empty", |v| !v.is_empty()), 1..100)
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.bloom");

        let mut bloom = Bloom::new(2000, 0.01);
        for item in &items {
            bloom.add(item);
        }
        bloom.save(&path).unwrap();

        let mut reloaded = Bloom::new(2000, 0.01);
        prop_assert!(reloaded.load(&path).unwrap());
        for item in &items {
            prop_assert!(reloaded.contains(item));
        }
    }

}

proptest! {
    // Each case opens a real SQLite file; keep the case count modest so
    // this doesn't dominate the test suite's wall-clock time.
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Invariant 1/2 and the idempotence property: marking a URL done is
    /// stable under repetition, and a URL left `in_progress` always
    /// surfaces via `incomplete()` until it's marked done.
    #[test]
    fn checkpoint_done_is_idempotent_and_survives_restart(
        done_urls in hash_set("[a-z]{3,10}", 1..15),
        in_progress_urls in hash_set("[a-z]{3,10}", 1..15),
    ) {
        // Keep the two sets disjoint so a URL's final status is unambiguous.
        let in_progress_only: Vec<String> = in_progress_urls
            .into_iter()
            .filter(|u| !done_urls.contains(u))
            .map(|u| format!("http://example.com/{u}"))
            .collect();
        let done: Vec<String> = done_urls.into_iter().map(|u| format!("http://example.com/{u}")).collect();

        run_async(async {
            let dir = TempDir::new().unwrap();
            {
                let store = CheckpointStore::open(dir.path(), "prop_job").await.unwrap();
                for url in &done {
                    store.mark_in_progress(url).await.unwrap();
                    store.mark_done(url).await.unwrap();
                    // Re-processing an already-done URL is a no-op: still done.
                    store.mark_in_progress(url).await.unwrap();
                    store.mark_done(url).await.unwrap();
                }
                for url in &in_progress_only {
                    store.mark_in_progress(url).await.unwrap();
                }
                store.close().await;
            }

            let reopened = CheckpointStore::open(dir.path(), "prop_job").await.unwrap();
            for url in &done {
                assert!(reopened.is_done(url).await, "{url} should remain done across restart");
            }
            let incomplete: std::collections::HashSet<String> =
                reopened.incomplete().await.unwrap().into_iter().collect();
            for url in &in_progress_only {
                assert!(incomplete.contains(url), "{url} left in-progress must surface as incomplete");
                assert!(!reopened.is_done(url).await);
            }
        });
    }
}
