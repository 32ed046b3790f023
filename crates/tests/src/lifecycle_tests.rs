use std::time::Duration;

use batchscribe_services::lifecycle::{AudioFileEvent, LifecycleMessage, Outcome, RequeueReason, Terminal};
use batchscribe_transcription::DetailStatus;

use crate::fixtures::fake_speech::StatusStep;
use crate::fixtures::harness::Harness;
use crate::fixtures::transcripts::{truncated_wav, wav_bytes};

fn requeued(outcome: Outcome) -> (RequeueReason, Duration, LifecycleMessage) {
    match outcome {
        Outcome::Requeued { reason, delay, message } => (reason, delay, message),
        other => panic!("expected a requeue, got {other:?}"),
    }
}

#[tokio::test]
async fn running_job_backs_off_then_reports_once() {
    let h = Harness::new();
    h.upload("call.wav", &wav_bytes(1, 8000, 2)).await;
    h.speech.script_new_jobs(vec![
        StatusStep::NotStarted,
        StatusStep::Running,
        StatusStep::Running,
        StatusStep::Running,
        StatusStep::Running,
        StatusStep::Succeeded,
    ]);
    let mut message = h.submit_uploaded().await;
    let job_name = message.job_name.clone();
    let orchestrator = h.orchestrator(vec![]);

    let mut delays = Vec::new();
    for _ in 0..5 {
        let (reason, delay, next) = requeued(orchestrator.handle(message).await.unwrap());
        assert_eq!(reason, RequeueReason::Polling);
        assert!(h.report(&job_name).await.is_none());
        delays.push(delay);
        message = next;
    }
    assert!(delays.windows(2).all(|w| w[0] < w[1]), "delays not increasing: {delays:?}");
    assert_eq!(delays[0], Duration::from_secs(2 * 60));
    assert_eq!(delays[4], Duration::from_secs(32 * 60));
    assert_eq!(message.polling_counter, 5);
    assert_eq!(h.speech.list_calls(), 0);

    let outcome = orchestrator.handle(message).await.unwrap();
    let Outcome::Reported { terminal, report } = outcome else {
        panic!("expected a report");
    };
    assert_eq!(terminal, Terminal::Succeeded);
    assert_eq!(report.successful_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(h.speech.list_calls(), 1);
    assert_eq!(h.speech.deleted().len(), 1);

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.json_result_output_container, "call.wav.json").await);
    assert!(h.exists(&storage.report_output_container, &format!("jobs/{job_name}.csv")).await);
    assert_eq!(h.report(&job_name).await.unwrap().successful_count, 1);

    let detail = &report.details[0];
    assert!(detail.estimated_cost.is_some());
    assert!(detail.advisories.is_empty());
}

#[tokio::test]
async fn polling_delay_is_capped_at_the_maximum() {
    let h = Harness::with_settings(|s| s.lifecycle.max_polling_delay_in_minutes = 10);
    h.upload("long.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Running]);
    let mut message = h.submit_uploaded().await;
    message.polling_counter = 40;
    let orchestrator = h.orchestrator(vec![]);

    let (_, delay, next) = requeued(orchestrator.handle(message).await.unwrap());
    assert_eq!(delay, Duration::from_secs(10 * 60));
    assert_eq!(next.polling_counter, 41);
}

#[tokio::test]
async fn transient_failures_escalate_on_the_fifth_failure() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Http(503)]);
    let mut message = h.submit_uploaded().await;
    let job_name = message.job_name.clone();
    let orchestrator = h.orchestrator(vec![]);

    for attempt in 1..=4 {
        let (reason, delay, next) = requeued(orchestrator.handle(message).await.unwrap());
        assert_eq!(reason, RequeueReason::TransientError);
        assert_eq!(delay, Duration::from_secs(60));
        assert_eq!(next.failed_execution_counter, attempt);
        message = next;
    }

    let Outcome::Reported { terminal, report } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected escalation");
    };
    assert_eq!(terminal, Terminal::FailedExecution);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.details[0].error_kind.as_deref(), Some("HttpError"));

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.error_files_output_container, "a.wav").await);
    assert!(!h.exists(&storage.audio_input_container, "a.wav").await);
    assert!(h.exists(&storage.error_report_output_container, "a.wav.txt").await);
    assert!(h.report(&job_name).await.is_some());
}

#[tokio::test]
async fn counters_never_decrease_across_mixed_steps() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![
        StatusStep::Running,
        StatusStep::Timeout,
        StatusStep::Running,
        StatusStep::Http(429),
        StatusStep::Running,
        StatusStep::Succeeded,
    ]);
    let mut message = h.submit_uploaded().await;
    let orchestrator = h.orchestrator(vec![]);

    let (mut polling, mut failed) = (message.polling_counter, message.failed_execution_counter);
    loop {
        match orchestrator.handle(message).await.unwrap() {
            Outcome::Requeued { message: next, .. } => {
                assert!(next.polling_counter >= polling);
                assert!(next.failed_execution_counter >= failed);
                polling = next.polling_counter;
                failed = next.failed_execution_counter;
                message = next;
            }
            Outcome::Reported { terminal, .. } => {
                assert_eq!(terminal, Terminal::Succeeded);
                break;
            }
        }
    }
    assert_eq!(polling, 5);
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn fatal_provider_error_fails_the_batch_without_retry() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.upload("b.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Http(401)]);
    let message = h.submit_uploaded().await;
    let orchestrator = h.orchestrator(vec![]);

    let Outcome::Reported { terminal, report } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected a failed report");
    };
    assert_eq!(terminal, Terminal::Failed);
    assert_eq!(report.failed_count, 2);
    assert!(report.details.iter().all(|d| d.status == DetailStatus::Failed));
    assert_eq!(h.speech.status_calls(), 1);
    assert!(h.exists(&h.settings.storage.error_files_output_container, "b.wav").await);
}

#[tokio::test]
async fn failed_job_with_transient_code_resubmits_files() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Failed {
        code: "Internal".to_string(),
        message: "service hiccup".to_string(),
    }]);
    let message = h.submit_uploaded().await;
    let job_name = message.job_name.clone();
    let orchestrator = h.orchestrator(vec![]);

    let Outcome::Reported { terminal, report } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected a report");
    };
    assert_eq!(terminal, Terminal::Failed);
    assert!(report.details[0].advisories.iter().any(|a| a.contains("Resubmitted")));

    let events: Vec<AudioFileEvent> = h
        .queue
        .pending(&h.settings.queue.start_name)
        .into_iter()
        .map(|(payload, _)| serde_json::from_str(&payload).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].retry_count, 1);
    assert!(events[0].file_url.ends_with("a.wav"));

    // The audio stays in place for the next attempt.
    assert!(h.exists(&h.settings.storage.audio_input_container, "a.wav").await);
    let errors = h
        .read_string(&h.settings.storage.error_report_output_container, &format!("jobs/{job_name}.txt"))
        .await;
    assert!(errors.contains("service hiccup"));
    assert!(errors.contains("Report file:"));
}

#[tokio::test]
async fn failed_job_stops_resubmitting_at_the_retry_limit() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Failed {
        code: "Timeout".to_string(),
        message: "took too long".to_string(),
    }]);
    let mut message = h.submit_uploaded().await;
    message.audio_files[0].retry_count = 4;
    let orchestrator = h.orchestrator(vec![]);

    orchestrator.handle(message).await.unwrap();

    assert!(h.queue.is_empty(&h.settings.queue.start_name));
    assert!(h.exists(&h.settings.storage.error_files_output_container, "a.wav").await);
    let note = h
        .read_string(&h.settings.storage.error_report_output_container, "a.wav.txt")
        .await;
    assert!(note.contains("after 4 retries"));
}

#[tokio::test]
async fn per_file_provider_failures_are_parked_and_reported() {
    let h = Harness::new();
    h.upload("good.wav", &wav_bytes(1, 8000, 1)).await;
    h.upload("bad.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.fail_file("bad.wav");
    let message = h.submit_uploaded().await;
    let orchestrator = h.orchestrator(vec![]);

    let Outcome::Reported { terminal, report } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected a report");
    };
    assert_eq!(terminal, Terminal::Succeeded);
    assert_eq!(report.successful_count, 1);
    assert_eq!(report.failed_count, 1);

    let failed = report
        .details
        .iter()
        .find(|d| d.status == DetailStatus::Failed)
        .unwrap();
    assert!(failed.source_url.ends_with("bad.wav"));
    assert_eq!(failed.error_kind.as_deref(), Some("InvalidData"));

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.error_files_output_container, "bad.wav").await);
    assert!(h.exists(&storage.error_report_output_container, "bad.wav.txt").await);
    assert!(h.exists(&storage.json_result_output_container, "good.wav.json").await);
}

#[tokio::test]
async fn truncated_header_becomes_an_advisory_not_a_failure() {
    let h = Harness::with_settings(|s| s.lifecycle.files_per_transcription_job = 3);
    h.upload("1.wav", &wav_bytes(2, 8000, 2)).await;
    h.upload("2.wav", &truncated_wav()).await;
    h.upload("3.wav", &wav_bytes(1, 8000, 1)).await;
    let message = h.submit_uploaded().await;
    assert_eq!(message.audio_files.len(), 3);
    let orchestrator = h.orchestrator(vec![]);

    let Outcome::Reported { report, .. } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected a report");
    };
    assert_eq!(report.successful_count, 3);

    let detail = |name: &str| {
        report
            .details
            .iter()
            .find(|d| d.source_url.ends_with(name))
            .unwrap()
    };
    let truncated = detail("2.wav");
    assert_eq!(truncated.advisories.len(), 1);
    assert!(truncated.advisories[0].starts_with("Audio header not inspected"));
    assert!(truncated.estimated_cost.is_none());
    assert!(detail("1.wav").advisories.is_empty());
    assert!(detail("3.wav").estimated_cost.is_some());
}

#[tokio::test]
async fn redelivered_final_message_returns_the_stored_report() {
    let h = Harness::with_settings(|s| {
        s.output.create_audio_processed_container = true;
        s.output.create_consolidated_output_files = true;
        s.output.create_html_result_file = true;
    });
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    let message = h.submit_uploaded().await;
    let job_name = message.job_name.clone();
    let orchestrator = h.orchestrator(vec![]);

    let Outcome::Reported { terminal, report } = orchestrator.handle(message.clone()).await.unwrap() else {
        panic!("expected a report");
    };
    assert_eq!(terminal, Terminal::Succeeded);
    let stored = h.report(&job_name).await.unwrap();
    let status_calls = h.speech.status_calls();

    // The provider job is gone by now; a redelivery must not poll it.
    let Outcome::Reported { terminal, report: again } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected the stored report");
    };
    assert_eq!(terminal, Terminal::Succeeded);
    assert_eq!(again.successful_count, report.successful_count);
    assert_eq!(again.failed_count, 0);
    assert_eq!(h.speech.status_calls(), status_calls);
    assert_eq!(h.report(&job_name).await.unwrap(), stored);
    assert_eq!(h.speech.deleted().len(), 2);

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.audio_processed_container, "a.wav").await);
    assert!(h.exists(&storage.html_result_output_container, "a.wav.html").await);
    assert!(h.exists(&storage.consolidated_files_output_container, "a/a.wav").await);
    assert!(h.exists(&storage.consolidated_files_output_container, "a/a.wav.json").await);
    assert!(!h.exists(&storage.error_report_output_container, &format!("jobs/{job_name}.txt")).await);
    assert!(!h.exists(&storage.error_report_output_container, "a.wav.txt").await);
}

#[tokio::test]
async fn redelivered_failed_batch_is_not_resubmitted_twice() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.script_new_jobs(vec![StatusStep::Failed {
        code: "Internal".to_string(),
        message: "service hiccup".to_string(),
    }]);
    let message = h.submit_uploaded().await;
    let orchestrator = h.orchestrator(vec![]);

    orchestrator.handle(message.clone()).await.unwrap();
    let Outcome::Reported { terminal, report } = orchestrator.handle(message).await.unwrap() else {
        panic!("expected the stored report");
    };
    assert_eq!(terminal, Terminal::Failed);
    assert_eq!(report.failed_count, 1);
    assert_eq!(h.queue.len(&h.settings.queue.start_name), 1);
}
