use certgen_engine::template::Fingerprint;
use certgen_engine::{
    Field, FontBytes, GenerationError, GenerationOptions, OutputMode, Row, TemplateBytes,
    TemplateSource, fixtures, row,
};
use certgen_runtime::*;
use lopdf::Document;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Template whose first read blocks until the test releases it
struct GatedTemplate {
    bytes: Vec<u8>,
    gate: Mutex<std_mpsc::Receiver<()>>,
}

impl TemplateSource for GatedTemplate {
    fn describe(&self) -> String {
        "gated".to_string()
    }

    fn fingerprint(&self) -> Result<Fingerprint, GenerationError> {
        Ok(Fingerprint {
            size: self.bytes.len() as u64,
            modified: 0,
        })
    }

    fn read(&self) -> Result<Vec<u8>, GenerationError> {
        let _ = self.gate.lock().unwrap().recv();
        Ok(self.bytes.clone())
    }
}

fn gated_template() -> (Arc<GatedTemplate>, std_mpsc::Sender<()>) {
    let (tx, rx) = std_mpsc::channel();
    let template = Arc::new(GatedTemplate {
        bytes: fixtures::template_png(21, 30),
        gate: Mutex::new(rx),
    });
    (template, tx)
}

fn generator() -> Generator {
    Generator::new(
        Arc::new(FontBytes(fixtures::font().into())),
        GenerationOptions::default(),
    )
}

fn rows(n: usize) -> Vec<Row> {
    (0..n).map(|i| row([("name", format!("Person {i}"))])).collect()
}

fn job(n: usize, mode: OutputMode, template: Arc<dyn TemplateSource>) -> GenerationJob {
    GenerationJob::new(
        rows(n),
        vec![Field::bound("name", "name").at(105.0, 120.0).sized(28.0)],
        template,
        mode,
    )
}

fn plain_template() -> Arc<dyn TemplateSource> {
    Arc::new(TemplateBytes::new(fixtures::template_png(21, 30), 1))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_relays_progress() {
    let mut client = GenerationClient::spawn(generator());
    let mut seen = Vec::new();

    let output = client
        .generate(job(12, OutputMode::PerRow, plain_template()), |p| {
            seen.push(p.done)
        })
        .await
        .unwrap();

    assert_eq!(output.buffers.len(), 12);
    assert_eq!(seen, vec![5, 10, 12]);
    for buffer in &output.buffers {
        assert_eq!(Document::load_mem(buffer).unwrap().get_pages().len(), 1);
    }
    client.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequential_jobs_on_one_client() {
    let mut client = GenerationClient::spawn(generator());

    let first = client
        .generate(job(3, OutputMode::Single, plain_template()), |_| {})
        .await
        .unwrap();
    let second = client
        .generate(job(2, OutputMode::PerRow, plain_template()), |_| {})
        .await
        .unwrap();

    assert_eq!(first.buffers.len(), 1);
    assert_eq!(
        Document::load_mem(&first.buffers[0])
            .unwrap()
            .get_pages()
            .len(),
        3
    );
    assert_eq!(second.buffers.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_yields_no_output() {
    let (template, release) = gated_template();
    let mut client = GenerationClient::spawn(generator());
    let cancel = client.cancel_handle();

    tokio::spawn(async move {
        // Let the job reach the blocked template read first
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cancel.cancel());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = release.send(());
    });

    let mut progress_calls = 0;
    let result = client
        .generate(job(30, OutputMode::PerRow, template), |_| progress_calls += 1)
        .await;

    assert_eq!(result.unwrap_err(), ClientError::Cancelled);
    assert_eq!(progress_calls, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_carries_message() {
    let mut client = GenerationClient::spawn(generator());
    let bogus: Arc<dyn TemplateSource> = Arc::new(TemplateBytes::new(b"not an image".to_vec(), 1));

    let err = client
        .generate(job(2, OutputMode::PerRow, bogus), |_| {})
        .await
        .unwrap_err();
    let ClientError::Failed(message) = &err else {
        panic!("expected failure, got {err:?}");
    };
    assert!(message.contains("Invalid template"), "{message}");

    // The worker survives a failed job
    let empty = client
        .generate(job(0, OutputMode::Single, plain_template()), |_| {})
        .await
        .unwrap_err();
    assert_eq!(empty, ClientError::Failed("No rows to generate".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_worker_rejects_second_job_while_busy() {
    let (template, release) = gated_template();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(worker_task(generator(), command_rx, update_tx));

    command_tx
        .send(JobCommand::Generate {
            job_id: JobId(1),
            job: job(2, OutputMode::Single, template),
        })
        .unwrap();
    command_tx
        .send(JobCommand::Generate {
            job_id: JobId(2),
            job: job(2, OutputMode::Single, plain_template()),
        })
        .unwrap();
    // A cancel aimed at another job leaves the running one alone
    command_tx
        .send(JobCommand::Cancel { job_id: JobId(2) })
        .unwrap();

    match update_rx.recv().await.unwrap() {
        JobUpdate::Failed { job_id, message } => {
            assert_eq!(job_id, JobId(2));
            assert!(message.contains("already running"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    release.send(()).unwrap();
    let mut completed = false;
    while let Some(update) = update_rx.recv().await {
        assert_eq!(update.job_id(), JobId(1));
        match update {
            JobUpdate::Progress { .. } => {}
            JobUpdate::Complete { output, .. } => {
                assert_eq!(output.total, 2);
                completed = true;
                break;
            }
            other => panic!("unexpected update {other:?}"),
        }
    }
    assert!(completed);

    drop(command_tx);
    worker.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_job_does_not_leak_into_next() {
    let (template, release) = gated_template();
    let mut client = GenerationClient::spawn(generator());

    // Give up on the first job while it is stuck reading its template
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        client.generate(job(400, OutputMode::PerRow, template), |_| {}),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = release.send(());
    });

    let mut seen = Vec::new();
    let output = client
        .generate(job(2, OutputMode::PerRow, plain_template()), |p| {
            seen.push(p.done)
        })
        .await
        .unwrap();

    assert_eq!(output.total, 2);
    assert_eq!(output.buffers.len(), 2);
    assert_eq!(seen, vec![2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_cancel_does_not_hit_next_job() {
    let mut client = GenerationClient::spawn(generator());
    let cancel = client.cancel_handle();

    client
        .generate(job(1, OutputMode::Single, plain_template()), |_| {})
        .await
        .unwrap();
    assert!(cancel.cancel());

    let output = client
        .generate(job(3, OutputMode::PerRow, plain_template()), |_| {})
        .await
        .unwrap();
    assert_eq!(output.buffers.len(), 3);
}
