use std::sync::Arc;

use super::{create_service, record, write_file, WordHashEncoder};
use crate::config::Config;
use crate::records::TagAnswers;
use crate::semantic::{normalize, Encoder, SearchService};

#[test]
fn test_reset_password_scenario() {
    let answers: TagAnswers = [("pw_reset", "Visit account settings.")].into_iter().collect();
    let service = SearchService::build(
        Arc::new(WordHashEncoder::new(64)),
        &[record("reset password", "pw_reset")],
        answers,
    )
    .unwrap();

    let results = service.search("how do I reset my password", 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tag, "pw_reset");
    assert_eq!(results[0].answer, "Visit account settings.");
    assert!(results[0].score > 0.0);
}

#[test]
fn test_search_picks_max_inner_product() {
    let service = create_service();
    let encoder = WordHashEncoder::new(256);

    let query = "when are you open";
    let results = service.search(query, 5).unwrap();
    assert_eq!(results.len(), 1);

    let mut q = encoder.encode(&[query.to_string()]).unwrap().remove(0);
    normalize(&mut q).unwrap();

    let questions = [
        "reset password",
        "forgot my password",
        "what are your opening hours",
        "when do you open",
        "cancel my subscription",
    ];
    let best = questions
        .iter()
        .map(|question| {
            let mut v = encoder.encode(&[question.to_string()]).unwrap().remove(0);
            normalize(&mut v).unwrap();
            v.iter().zip(&q).map(|(a, b)| a * b).sum::<f32>()
        })
        .fold(f32::MIN, f32::max);

    assert!((results[0].score - best).abs() < 1e-5);
    assert_eq!(results[0].tag, "hours");
    assert_eq!(results[0].answer, "We are open 9 to 5.");
}

#[test]
fn test_tag_without_answer_returns_empty_answer() {
    let service = create_service();
    let results = service.search("please cancel my subscription", 1).unwrap();
    assert_eq!(results[0].tag, "cancel");
    assert_eq!(results[0].answer, "");
}

#[test]
fn test_encoder_is_deterministic() {
    let encoder = WordHashEncoder::new(128);
    let text = vec!["How do I reset my password?".to_string()];
    assert_eq!(encoder.encode(&text).unwrap(), encoder.encode(&text).unwrap());
}

#[test]
fn test_build_service_from_files() {
    let tmp = tempfile::tempdir().unwrap();
    let train = write_file(
        &tmp,
        "train.csv",
        "question,tag\nreset password,pw_reset\nopening hours,hours\n",
    );
    let tag_answers = write_file(
        &tmp,
        "tag_answer.csv",
        "tag,answer\npw_reset,Visit account settings.\nhours,9 to 5\n",
    );

    let mut config = Config::default();
    config.server.train_path = train;
    config.server.tag_answer_path = tag_answers;

    let service = crate::build_service(&config, Arc::new(WordHashEncoder::new(64))).unwrap();
    assert_eq!(service.indexed_count(), 2);

    let results = service.search("opening hours please", 5).unwrap();
    assert_eq!(results[0].tag, "hours");
    assert_eq!(results[0].answer, "9 to 5");
}

#[test]
fn test_build_service_requires_columns() {
    let tmp = tempfile::tempdir().unwrap();
    let train = write_file(&tmp, "train.csv", "text,label\nreset password,pw_reset\n");
    let tag_answers = write_file(&tmp, "tag_answer.csv", "tag,answer\n");

    let mut config = Config::default();
    config.server.train_path = train;
    config.server.tag_answer_path = tag_answers;

    let err = crate::build_service(&config, Arc::new(WordHashEncoder::new(64)))
        .err()
        .expect("missing columns must fail");
    assert!(format!("{err:#}").contains("missing required column"));
}
