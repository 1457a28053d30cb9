//! tests/campaign_runner_tests.rs
//! Pruebas del motor de campañas con reloj virtual y proveedor falso.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sqlx::{Pool, Sqlite};

    use crate::models::campaign_model::CampaignStatus;
    use crate::models::log_model::{LogCategory, LogLevel};
    use crate::models::provider_model::ProviderKind;
    use crate::services::activity_log_service::ActivityLogService;
    use crate::services::campaign_runner::{CampaignRunner, RunError, RunOutcome, POLL_INTERVAL};
    use crate::services::campaign_service::CampaignService;
    use crate::services::clock::Clock;
    use crate::tests::support::{
        fake_factory, force_status, seed_campaign, test_pool, test_settings, FakeAdapter,
        ManualClock,
    };

    const FIVE_ROWS: &str = "name,email\n\
        Ann,ann@x.com\n\
        Bob,bob@x.com\n\
        Cid,cid@x.com\n\
        Dee,dee@x.com\n\
        Eve,eve@x.com\n";

    fn runner(
        pool: &Pool<Sqlite>,
        clock: Arc<ManualClock>,
        adapter: Arc<FakeAdapter>,
    ) -> CampaignRunner {
        CampaignRunner::new(
            CampaignService::new(pool.clone()),
            ActivityLogService::new(pool.clone()),
            Arc::new(test_settings()),
        )
        .with_clock(clock)
        .with_adapter_factory(fake_factory(adapter))
        .with_rng(StdRng::seed_from_u64(42))
    }

    fn csv_rows(n: usize) -> String {
        let mut csv = String::from("name,email\n");
        for i in 1..=n {
            csv.push_str(&format!("User{i},user{i}@x.com\n"));
        }
        csv
    }

    #[actix_rt::test]
    async fn sends_every_row_and_completes() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign =
            seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms() - 1_000).await;

        let adapter = Arc::new(FakeAdapter::new().with_clock(clock.clone()));
        let outcome = runner(&pool, clock.clone(), adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(stored.total, 5);
        assert_eq!(stored.progress, 5);
        assert_eq!(stored.rejected, 0);
        assert_eq!(stored.error, None);

        let sent = adapter.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0].to, "ann@x.com");
        assert_eq!(sent[0].html_body, "<p>Hi Ann</p>");
        assert_eq!(sent[4].to, "eve@x.com");
    }

    #[actix_rt::test]
    async fn row_without_email_counts_as_rejected() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let csv = "name,email\nAnn,ann@x.com\nBob,bob@x.com\nCid,\nDee,dee@x.com\n";
        let campaign = seed_campaign(&campaigns, dir.path(), csv, clock.now_ms()).await;

        let adapter = Arc::new(FakeAdapter::new());
        let outcome = runner(&pool, clock, adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(stored.total, 4);
        assert_eq!(stored.progress, 4);
        assert_eq!(stored.rejected, 1);

        let recipients: Vec<String> = adapter.sent().into_iter().map(|s| s.to).collect();
        assert_eq!(recipients, vec!["ann@x.com", "bob@x.com", "dee@x.com"]);

        let logs = ActivityLogService::new(pool.clone())
            .read_recent(50)
            .await
            .unwrap();
        assert!(logs
            .iter()
            .any(|e| e.level == LogLevel::Warning && e.category == LogCategory::Email));
    }

    #[actix_rt::test]
    async fn provider_rejection_does_not_stop_the_run() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign = seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;

        let adapter = Arc::new(FakeAdapter::new().failing_for("bob@x.com"));
        let outcome = runner(&pool, clock, adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 5);
        assert_eq!(stored.rejected, 1);
        assert_eq!(adapter.sent().len(), 5);
    }

    #[actix_rt::test]
    async fn future_start_reports_scheduled_and_sends_nothing_early() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let start_ms = chrono::Utc::now().timestamp_millis() + 30 * 60 * 1000;
        let campaign = seed_campaign(&campaigns, dir.path(), FIVE_ROWS, start_ms).await;
        force_status(&campaigns, &campaign.id, CampaignStatus::Pending).await;

        let clock = Arc::new(
            ManualClock::new(start_ms - 30 * 60 * 1000).watching(campaigns.clone(), &campaign.id),
        );
        let adapter = Arc::new(FakeAdapter::new().with_clock(clock.clone()));
        let outcome = runner(&pool, clock.clone(), adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(clock.statuses().first(), Some(&CampaignStatus::Scheduled));

        let sent = adapter.sent();
        assert_eq!(sent.len(), 5);
        assert!(sent.iter().all(|s| s.at_ms >= start_ms));
    }

    #[actix_rt::test]
    async fn cancellation_while_waiting_is_seen_within_one_poll() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let start_ms = chrono::Utc::now().timestamp_millis() + 60 * 60 * 1000;
        let campaign = seed_campaign(&campaigns, dir.path(), FIVE_ROWS, start_ms).await;

        let clock_start = start_ms - 60 * 60 * 1000;
        let clock = Arc::new(
            ManualClock::new(clock_start)
                .watching(campaigns.clone(), &campaign.id)
                .cancel_on_sleep(2),
        );
        let adapter = Arc::new(FakeAdapter::new());
        let outcome = runner(&pool, clock.clone(), adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted(CampaignStatus::Cancelled));
        assert!(adapter.sent().is_empty());

        let elapsed = clock.now_ms() - clock_start;
        assert!(elapsed <= 3 * POLL_INTERVAL.as_millis() as i64);

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Cancelled);
    }

    #[actix_rt::test]
    async fn cancellation_mid_run_stops_before_next_send() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign =
            seed_campaign(&campaigns, dir.path(), &csv_rows(10), clock.now_ms()).await;

        let adapter =
            Arc::new(FakeAdapter::new().cancel_after(3, campaigns.clone(), &campaign.id));
        let outcome = runner(&pool, clock, adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Interrupted(CampaignStatus::Cancelled));
        assert_eq!(adapter.sent().len(), 3);

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Cancelled);
        assert!(stored.progress <= 3);
        assert_eq!(stored.total, 10);
    }

    #[actix_rt::test]
    async fn finished_campaigns_are_left_untouched() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());

        for status in [
            CampaignStatus::Completed,
            CampaignStatus::Failed,
            CampaignStatus::Cancelled,
            CampaignStatus::Stopped,
        ] {
            let campaign =
                seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;
            force_status(&campaigns, &campaign.id, status).await;
            let before = campaigns.load(&campaign.id).await.unwrap().unwrap();

            let adapter = Arc::new(FakeAdapter::new());
            let outcome = runner(&pool, clock.clone(), adapter.clone())
                .run(&campaign.id)
                .await
                .unwrap();

            assert_eq!(outcome, RunOutcome::AlreadyFinished(status));
            assert!(adapter.sent().is_empty());
            let after = campaigns.load(&campaign.id).await.unwrap().unwrap();
            assert_eq!(before, after);
        }
    }

    #[actix_rt::test]
    async fn unknown_campaign_is_not_found() {
        let (_dir, pool) = test_pool().await;
        let clock = Arc::new(ManualClock::starting_now());
        let result = runner(&pool, clock, Arc::new(FakeAdapter::new()))
            .run("does-not-exist")
            .await;

        assert!(matches!(result, Err(RunError::NotFound(id)) if id == "does-not-exist"));
    }

    #[actix_rt::test]
    async fn unreadable_template_fails_without_sending() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign = seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;
        std::fs::remove_file(&campaign.template_path).unwrap();

        let adapter = Arc::new(FakeAdapter::new());
        let result = runner(&pool, clock, adapter.clone()).run(&campaign.id).await;

        match result {
            Err(RunError::Failed(msg)) => assert!(msg.contains("template"), "{msg}"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(adapter.sent().is_empty());

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Failed);
        assert!(stored.error.is_some());
    }

    #[actix_rt::test]
    async fn empty_list_fails() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign =
            seed_campaign(&campaigns, dir.path(), "name,email\n", clock.now_ms()).await;

        let result = runner(&pool, clock, Arc::new(FakeAdapter::new()))
            .run(&campaign.id)
            .await;

        assert!(matches!(result, Err(RunError::Failed(msg)) if msg.contains("no data rows")));
        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Failed);
    }

    #[actix_rt::test]
    async fn failed_connection_test_is_fatal() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let campaign = seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;

        let adapter = Arc::new(FakeAdapter::new().refusing_connection("535 auth failed"));
        let result = runner(&pool, clock, adapter.clone()).run(&campaign.id).await;

        assert!(matches!(result, Err(RunError::Failed(msg)) if msg.contains("535 auth failed")));
        assert!(adapter.sent().is_empty());

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Failed);
        assert_eq!(stored.progress, 0);
    }

    #[actix_rt::test]
    async fn unknown_provider_account_fails() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let mut campaign =
            seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;
        campaign.provider_name = "ghost".to_string();
        campaigns.save(&mut campaign, true).await.unwrap();

        let result = runner(&pool, clock, Arc::new(FakeAdapter::new()))
            .run(&campaign.id)
            .await;

        assert!(matches!(result, Err(RunError::Failed(msg)) if msg.contains("not found")));
    }

    #[actix_rt::test]
    async fn interrupted_run_resumes_from_progress() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let mut campaign =
            seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;
        campaign.status = CampaignStatus::Running;
        campaign.total = 5;
        campaign.progress = 3;
        campaigns.save(&mut campaign, true).await.unwrap();

        let adapter = Arc::new(FakeAdapter::new());
        let outcome = runner(&pool, clock, adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        let recipients: Vec<String> = adapter.sent().into_iter().map(|s| s.to).collect();
        assert_eq!(recipients, vec!["dee@x.com", "eve@x.com"]);

        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 5);
        assert_eq!(stored.status, CampaignStatus::Completed);
    }

    #[actix_rt::test]
    async fn changed_list_length_on_resume_fails() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let mut campaign =
            seed_campaign(&campaigns, dir.path(), FIVE_ROWS, clock.now_ms()).await;
        campaign.status = CampaignStatus::Running;
        campaign.total = 7;
        campaign.progress = 2;
        campaigns.save(&mut campaign, true).await.unwrap();

        let adapter = Arc::new(FakeAdapter::new());
        let result = runner(&pool, clock, adapter.clone()).run(&campaign.id).await;

        assert!(
            matches!(result, Err(RunError::Failed(msg)) if msg.contains("Recipient list changed"))
        );
        assert!(adapter.sent().is_empty());
        let stored = campaigns.load(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.total, 7);
        assert_eq!(stored.progress, 2);
    }

    #[actix_rt::test]
    async fn provider_limit_caps_each_window() {
        let (dir, pool) = test_pool().await;
        let campaigns = CampaignService::new(pool.clone());
        let clock = Arc::new(ManualClock::starting_now());
        let mut campaign =
            seed_campaign(&campaigns, dir.path(), &csv_rows(20), clock.now_ms()).await;
        // "limited": 100 por hora -> 8 por ventana de 5 minutos
        campaign.provider_kind = ProviderKind::Ses;
        campaign.provider_name = "limited".to_string();
        campaign.rate_limit_per_minute = 1000;
        campaigns.save(&mut campaign, true).await.unwrap();

        let adapter = Arc::new(FakeAdapter::new().with_clock(clock.clone()));
        let outcome = runner(&pool, clock, adapter.clone())
            .run(&campaign.id)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let sent = adapter.sent();
        assert_eq!(sent.len(), 20);
        // Nunca 9 envíos dentro de la misma ventana
        for i in 0..sent.len() - 8 {
            assert!(
                sent[i + 8].at_ms - sent[i].at_ms >= 25_000,
                "sends {} and {} too close",
                i,
                i + 8
            );
        }
        // Progreso monótono: los envíos salen en orden de la lista
        assert_eq!(sent[0].to, "user1@x.com");
        assert_eq!(sent[19].to, "user20@x.com");
    }
}
