//! Evaluator driving a real search endpoint over HTTP.

use std::sync::Arc;
use std::time::Duration;

use super::{create_service, write_file};
use crate::config::{AnswerMatch, Config};
use crate::eval::{EvalOptions, Evaluator, HttpSearchClient, RunLog};

/// Serve the test FAQ on an ephemeral port; the runtime must outlive the test.
fn spawn_server() -> (tokio::runtime::Runtime, String) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::web::router(Arc::new(create_service()));

    rt.spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (rt, format!("http://{addr}/search/"))
}

/// An address nothing listens on.
fn closed_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/search/")
}

fn options() -> EvalOptions {
    EvalOptions {
        k: 5,
        pause: Duration::ZERO,
        answer_match: AnswerMatch::Exact,
    }
}

#[test]
fn test_eval_against_live_service() {
    let (_rt, url) = spawn_server();

    let tmp = tempfile::tempdir().unwrap();
    let test = write_file(
        &tmp,
        "test.csv",
        "question,tag,answer\n\
         I forgot my password,pw_reset,\n\
         when do you open,hours,Open 24/7.\n\
         please cancel my subscription,cancel,\n\
         reset password,hours,\n",
    );
    let tag_answers = write_file(
        &tmp,
        "tag_answer.csv",
        "tag,answer\npw_reset,Visit account settings.\nhours,We are open 9 to 5.\n",
    );

    let mut config = Config::default();
    config.evaluation.test_path = test;
    config.evaluation.tag_answer_path = tag_answers;
    let cases = crate::load_eval_cases(&config).unwrap();
    assert_eq!(cases[0].expected_answer, "Visit account settings.");
    assert_eq!(cases[1].expected_answer, "Open 24/7.");
    assert_eq!(cases[2].expected_answer, "");

    let client = HttpSearchClient::new(&url, Duration::from_secs(5)).unwrap();
    let mut evaluator = Evaluator::new(client, RunLog::new(vec![], vec![]), options());
    let report = evaluator.run(&cases).unwrap();

    // row 1: both match; row 2: tag only; row 3: both (unmapped tag, empty answer);
    // row 4: neither
    assert_eq!(report.total, 4);
    assert_eq!(report.tag_matches, 3);
    assert_eq!(report.answer_matches, 2);
    assert_eq!(report.failures, 0);

    let (trace, mismatches) = evaluator.into_log().into_inner();
    let trace = String::from_utf8(trace).unwrap();
    let mismatches = String::from_utf8(mismatches).unwrap();
    assert_eq!(trace.matches("[ID: ").count(), 4);
    assert_eq!(mismatches.matches("[MISMATCH]").count(), 2);
    assert!(trace.contains("Tag Accuracy: 3/4 = 75.00%"));
}

#[test]
fn test_transport_errors_are_non_matches() {
    let client = HttpSearchClient::new(&closed_url(), Duration::from_secs(2)).unwrap();
    let mut evaluator = Evaluator::new(client, RunLog::new(vec![], vec![]), options());

    let cases: Vec<crate::eval::EvalCase> = vec![
        super::record("reset password", "pw_reset").into(),
        super::record("when do you open", "hours").into(),
    ];
    let report = evaluator.run(&cases).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.tag_matches, 0);
    assert_eq!(report.answer_matches, 0);
    assert_eq!(report.failures, 2);

    let (_, mismatches) = evaluator.into_log().into_inner();
    let mismatches = String::from_utf8(mismatches).unwrap();
    assert!(mismatches.contains("[ERROR] [1]"));
    assert!(mismatches.contains("[ERROR] [2]"));
}

#[test]
fn test_run_log_files_are_created() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.evaluation.log_path = tmp.path().join("logs/eval.log");
    config.evaluation.mismatch_log_path = tmp.path().join("logs/eval_mismatches.log");

    let client = HttpSearchClient::new(&closed_url(), Duration::from_secs(2)).unwrap();
    let run_log = RunLog::open(&config.evaluation).unwrap();
    let mut evaluator = Evaluator::new(client, run_log, options());
    evaluator
        .run(&[super::record("reset password", "pw_reset").into()])
        .unwrap();
    drop(evaluator);

    let trace = std::fs::read_to_string(&config.evaluation.log_path).unwrap();
    let mismatches = std::fs::read_to_string(&config.evaluation.mismatch_log_path).unwrap();
    assert!(trace.contains("Total: 1"));
    assert!(mismatches.contains("ERROR [ERROR] [1]"));
}
