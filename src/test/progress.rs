#[cfg(test)]
mod tests {

    use crate::models::ProgressStatus;
    use crate::progress::{ProgressTracker, ProgressUpdate};
    use crate::test::utils::fixtures::TestStoreBuilder;

    #[tokio::test]
    async fn upsert_creates_default_record_on_first_touch() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let record = tracker
            .upsert_progress("u1", "rust", "ownership", ProgressUpdate::default())
            .await
            .expect("Failed to upsert");

        assert_eq!(record.status, ProgressStatus::InProgress);
        assert_eq!(record.progress, 0);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.best_score, 0);
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn upsert_merges_partial_fields() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        tracker
            .upsert_progress(
                "u1",
                "rust",
                "ownership",
                ProgressUpdate {
                    progress: Some(40),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to upsert");

        let record = tracker
            .upsert_progress(
                "u1",
                "rust",
                "ownership",
                ProgressUpdate {
                    best_score: Some(70),
                    attempts: Some(1),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to upsert");

        // Fields from the first write survive the second partial update
        assert_eq!(record.progress, 40);
        assert_eq!(record.best_score, 70);
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_out_of_range_progress() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let result = tracker
            .upsert_progress(
                "u1",
                "rust",
                "ownership",
                ProgressUpdate {
                    progress: Some(150),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(crate::AppError::Validation(_))));
    }

    #[tokio::test]
    async fn upsert_rejects_decreasing_attempts() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        tracker
            .upsert_progress(
                "u1",
                "rust",
                "ownership",
                ProgressUpdate {
                    attempts: Some(3),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to upsert");

        let result = tracker
            .upsert_progress(
                "u1",
                "rust",
                "ownership",
                ProgressUpdate {
                    attempts: Some(2),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(crate::AppError::Validation(_))));
    }

    #[tokio::test]
    async fn complete_topic_forces_completed_fields() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let record = tracker
            .complete_topic("u1", "rust", "ownership", 85)
            .await
            .expect("Failed to complete");

        assert_eq!(record.status, ProgressStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.best_score, 85);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn complete_topic_twice_keeps_first_completion_time() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let first = tracker
            .complete_topic("u1", "rust", "ownership", 85)
            .await
            .expect("Failed to complete");
        let second = tracker
            .complete_topic("u1", "rust", "ownership", 85)
            .await
            .expect("Failed to complete");

        assert_eq!(second.completed_at, first.completed_at);
        assert_eq!(second.attempts, 2);
        assert_eq!(second.status, ProgressStatus::Completed);
        assert_eq!(second.progress, 100);
    }

    #[tokio::test]
    async fn complete_topic_never_lowers_best_score() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        tracker
            .complete_topic("u1", "rust", "ownership", 90)
            .await
            .expect("Failed to complete");
        let record = tracker
            .complete_topic("u1", "rust", "ownership", 70)
            .await
            .expect("Failed to complete");

        assert_eq!(record.best_score, 90);
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn subject_summary_counts_only_started_topics() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .completed_topic("u1", "rust", "ownership", 90)
            .completed_topic("u1", "rust", "borrowing", 80)
            .topic_in_progress("u1", "rust", "lifetimes")
            .completed_topic("u1", "python", "basics", 100)
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let summary = tracker
            .subject_summary("u1", "rust")
            .await
            .expect("Failed to summarize");

        assert_eq!(summary.completed_topics, 2);
        assert_eq!(summary.total_topics, 3);
        assert!((summary.progress_percent - 66.67).abs() < 0.01);
    }

    #[tokio::test]
    async fn subject_summary_without_records_is_zero() {
        let test_store = TestStoreBuilder::new()
            .user("u1", "u1@example.com", "User One")
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let summary = tracker
            .subject_summary("u1", "rust")
            .await
            .expect("Failed to summarize");

        assert_eq!(summary.completed_topics, 0);
        assert_eq!(summary.total_topics, 0);
        assert_eq!(summary.progress_percent, 0.0);
    }

    #[tokio::test]
    async fn user_statistics_aggregates_progress_and_sessions() {
        let test_store = TestStoreBuilder::new()
            .user_with_stats("u1", "u1@example.com", "User One", 2500, 500)
            .completed_topic("u1", "rust", "ownership", 90)
            .completed_topic("u1", "rust", "borrowing", 80)
            .topic_in_progress("u1", "rust", "lifetimes")
            .closed_session("u1", "ownership", 0, 100)
            .closed_session("u1", "borrowing", 1, 80)
            .build()
            .await
            .expect("Failed to build test store");
        let tracker = ProgressTracker::new(&test_store.store);

        let user = test_store.user("u1").await;
        let sessions = crate::sessions::SessionRecorder::new(&test_store.store)
            .sessions_for_user("u1")
            .await
            .expect("Failed to list sessions");

        let stats = tracker
            .user_statistics(&user, &sessions)
            .await
            .expect("Failed to aggregate");

        assert_eq!(stats.user.level, 3);
        assert_eq!(stats.user.xp, 2500);
        assert_eq!(stats.user.coins, 500);
        assert_eq!(stats.progress.completed_topics, 2);
        assert_eq!(stats.progress.in_progress_topics, 1);
        assert_eq!(stats.progress.total_topics, 3);
        assert!((stats.progress.completion_rate - 66.67).abs() < 0.01);
        assert_eq!(stats.performance.average_score, 90);
        assert_eq!(stats.performance.total_sessions, 2);
        assert_eq!(stats.performance.total_time_spent_ms, 1_200_000);
        assert_eq!(stats.performance.current_streak, 2);
    }
}
