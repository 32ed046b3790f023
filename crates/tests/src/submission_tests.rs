use std::time::Duration;

use batchscribe_services::lifecycle::{AudioCandidate, AudioFileEvent};
use batchscribe_transcription::BatchReport;
use chrono::{TimeZone, Utc};

use crate::fixtures::harness::Harness;
use crate::fixtures::transcripts::wav_bytes;

async fn upload_many(h: &Harness, count: usize) {
    for i in 0..count {
        h.upload(&format!("rec-{i}.wav"), &wav_bytes(1, 8000, 1)).await;
    }
}

#[tokio::test]
async fn groups_files_into_bounded_jobs() {
    let h = Harness::with_settings(|s| {
        s.lifecycle.files_per_transcription_job = 2;
        s.speech.locale = "de-DE | German (Germany)".to_string();
        s.speech.punctuation_mode = "Dictated And Automatic".to_string();
        s.speech.custom_model_id = Some("model-42".to_string());
        s.speech.endpoint = "https://speech.test/".to_string();
    });
    upload_many(&h, 5).await;
    let scheduler = h.scheduler();
    let started = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

    let candidates = scheduler.discover().await.unwrap();
    assert_eq!(candidates.len(), 5);
    let summary = scheduler.run(candidates, started).await.unwrap();
    assert_eq!(summary.submitted_jobs, 3);
    assert_eq!(summary.submitted_files, 5);
    assert_eq!(summary.deferred_files, 0);

    let created = h.speech.created();
    assert_eq!(created.len(), 3);
    assert_eq!(summary.job_names.len(), 3);
    for (definition, name) in created.iter().zip(&summary.job_names) {
        assert_eq!(&definition.display_name, name);
    }
    assert!(created[2].display_name.starts_with("2024-03-01T10:00:00_"));
    assert!(created[2].display_name.ends_with("_2"));
    assert_eq!(created[2].content_urls.len(), 1);
    assert_eq!(created[0].locale, "de-DE");
    assert_eq!(created[0].properties.punctuation_mode, "DictatedAndAutomatic");
    assert_eq!(
        created[0].model.as_ref().unwrap().self_url,
        "https://speech.test/speechtotext/v3.1/models/model-42"
    );

    let messages = h.lifecycle_messages();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.uses_custom_model && m.polling_counter == 0));
    let pending = h.queue.pending(&h.settings.queue.name);
    assert!(pending.iter().all(|(_, delay)| *delay > Duration::from_secs(60)));
}

#[tokio::test]
async fn claimed_files_are_not_discovered_again() {
    let h = Harness::new();
    upload_many(&h, 2).await;
    h.submit_uploaded().await;

    let again = h.scheduler().discover().await.unwrap();
    assert!(again.is_empty());
    assert!(h.exists(&h.settings.storage.audio_claimed_container, "rec-0.wav").await);
}

#[tokio::test]
async fn job_cap_defers_the_remaining_files() {
    let h = Harness::with_settings(|s| {
        s.lifecycle.files_per_transcription_job = 1;
        s.lifecycle.messages_per_function_execution = 2;
    });
    upload_many(&h, 3).await;
    let scheduler = h.scheduler();

    let summary = scheduler
        .run(scheduler.discover().await.unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.submitted_jobs, 2);
    assert_eq!(summary.deferred_files, 1);

    // The deferred file is picked up by the next invocation.
    let rest = scheduler.discover().await.unwrap();
    assert_eq!(rest.len(), 1);
}

#[tokio::test]
async fn transient_submission_failure_requeues_files() {
    let h = Harness::new();
    upload_many(&h, 2).await;
    h.speech.fail_creates(&[503]);
    let scheduler = h.scheduler();

    let summary = scheduler
        .run(scheduler.discover().await.unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.submitted_jobs, 0);
    assert_eq!(summary.resubmitted_files, 2);
    assert_eq!(summary.failed_jobs, 0);
    assert!(h.lifecycle_messages().is_empty());

    let events: Vec<AudioFileEvent> = h
        .queue
        .pending(&h.settings.queue.start_name)
        .into_iter()
        .map(|(payload, _)| serde_json::from_str(&payload).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.retry_count == 1));
}

#[tokio::test]
async fn rejected_submission_parks_files_and_reports() {
    let h = Harness::new();
    upload_many(&h, 1).await;
    h.speech.fail_creates(&[400]);
    let scheduler = h.scheduler();
    let summary = scheduler
        .run(scheduler.discover().await.unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.failed_jobs, 1);

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.error_files_output_container, "rec-0.wav").await);
    assert!(h.exists(&storage.error_report_output_container, "rec-0.wav.txt").await);

    let report = h
        .read_string(
            &storage.error_report_output_container,
            &format!("jobs/{}.json", summary.job_names[0]),
        )
        .await;
    let report: BatchReport = serde_json::from_str(&report).unwrap();
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.details[0].error_kind.as_deref(), Some("HttpError"));
}

#[tokio::test]
async fn empty_candidate_list_is_a_no_op() {
    let h = Harness::new();
    let summary = h.scheduler().run(Vec::new(), Utc::now()).await.unwrap();

    assert_eq!(summary.submitted_jobs, 0);
    assert!(summary.job_names.is_empty());
    assert!(h.speech.created().is_empty());
    assert!(h.queue.is_empty(&h.settings.queue.name));
    assert!(h.queue.is_empty(&h.settings.queue.start_name));
}

#[tokio::test]
async fn runs_started_in_the_same_second_use_distinct_job_names() {
    let h = Harness::new();
    let scheduler = h.scheduler();
    let started = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

    h.upload("first.wav", &wav_bytes(1, 8000, 1)).await;
    let first = scheduler.run(scheduler.discover().await.unwrap(), started).await.unwrap();
    h.upload("second.wav", &wav_bytes(1, 8000, 1)).await;
    let second = scheduler.run(scheduler.discover().await.unwrap(), started).await.unwrap();

    assert_eq!(first.job_names.len(), 1);
    assert_eq!(second.job_names.len(), 1);
    assert_ne!(first.job_names[0], second.job_names[0]);
    let messages = h.lifecycle_messages();
    assert_eq!(messages.len(), 2);
    assert_ne!(messages[0].job_name, messages[1].job_name);
}

#[tokio::test]
async fn rejected_submission_with_missing_audio_still_reports() {
    let h = Harness::new();
    h.upload("good.wav", &wav_bytes(1, 8000, 1)).await;
    h.speech.fail_creates(&[400]);
    let scheduler = h.scheduler();

    let mut candidates = vec![AudioCandidate::new(h.input("ghost.wav"), 0)];
    candidates.extend(scheduler.discover().await.unwrap());
    let summary = scheduler.run(candidates, Utc::now()).await.unwrap();
    assert_eq!(summary.failed_jobs, 1);

    let storage = &h.settings.storage;
    assert!(h.exists(&storage.error_files_output_container, "good.wav").await);
    assert!(h.exists(&storage.error_report_output_container, "ghost.wav.txt").await);
    let report = h
        .read_string(
            &storage.error_report_output_container,
            &format!("jobs/{}.json", summary.job_names[0]),
        )
        .await;
    let report: BatchReport = serde_json::from_str(&report).unwrap();
    assert_eq!(report.failed_count, 2);
}
