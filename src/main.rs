use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod eval;
mod records;
mod semantic;
mod split;
#[cfg(test)]
mod tests;
mod web;

use cli::Command;
use config::Config;
use records::{QaRecord, Table, TagAnswers, QA_REQUIRED_COLUMNS};
use semantic::{EmbeddingModel, Encoder, SearchService};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = cli::Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Split {
            input,
            train,
            test,
            seed,
            test_percent,
        } => {
            if let Some(seed) = seed {
                config.split.seed = seed;
            }
            if let Some(test_percent) = test_percent {
                config.split.test_percent = test_percent;
            }
            config.validate()?;

            run_split(&config, &input, &train, &test)
        }

        Command::Serve {
            train,
            tag_answers,
            addr,
            model,
        } => {
            if let Some(train) = train {
                config.server.train_path = train;
            }
            if let Some(tag_answers) = tag_answers {
                config.server.tag_answer_path = tag_answers;
            }
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            if let Some(model) = model {
                config.semantic.model = model;
            }

            let encoder = EmbeddingModel::new(
                &config.semantic.model,
                config.model_cache_dir(),
                Some(config.semantic.batch_size),
            )?;
            let service = build_service(&config, Arc::new(encoder))?;

            web::start_daemon(&config.server.addr, Arc::new(service))
        }

        Command::Eval {
            test,
            tag_answers,
            url,
            log,
            mismatch_log,
            pause_ms,
            answer_match,
        } => {
            let eval_config = &mut config.evaluation;
            if let Some(test) = test {
                eval_config.test_path = test;
            }
            if let Some(tag_answers) = tag_answers {
                eval_config.tag_answer_path = tag_answers;
            }
            if let Some(url) = url {
                eval_config.url = url;
            }
            if let Some(log) = log {
                eval_config.log_path = log;
            }
            if let Some(mismatch_log) = mismatch_log {
                eval_config.mismatch_log_path = mismatch_log;
            }
            if let Some(pause_ms) = pause_ms {
                eval_config.pause_ms = pause_ms;
            }
            if let Some(answer_match) = answer_match {
                eval_config.answer_match = answer_match;
            }

            run_eval(&config)
        }
    }
}

fn run_split(config: &Config, input: &Path, train: &Path, test: &Path) -> anyhow::Result<()> {
    let table = Table::read(input, &QA_REQUIRED_COLUMNS)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let tag_column = table
        .column("tag")
        .context("tag column disappeared after validation")?;

    let tags: Vec<&str> = table
        .rows
        .iter()
        .map(|row| row.get(tag_column).unwrap_or_default().trim())
        .collect();

    let split = split::stratified_split(&tags, config.split.test_percent, config.split.seed);

    let train_count = table.write_rows(train, split.train.iter().map(|&i| &table.rows[i]))?;
    let test_count = table.write_rows(test, split.test.iter().map(|&i| &table.rows[i]))?;

    log::info!(
        "split {} rows: {} train -> {}, {} test -> {} ({} single-row tags kept in train)",
        table.len(),
        train_count,
        train.display(),
        test_count,
        test.display(),
        split.singletons
    );

    Ok(())
}

fn build_service(config: &Config, encoder: Arc<dyn Encoder>) -> anyhow::Result<SearchService> {
    let training = records::read_qa_table(&config.server.train_path).with_context(|| {
        format!(
            "failed to load training set {}",
            config.server.train_path.display()
        )
    })?;
    let answers = TagAnswers::read(&config.server.tag_answer_path).with_context(|| {
        format!(
            "failed to load tag answers {}",
            config.server.tag_answer_path.display()
        )
    })?;

    Ok(SearchService::build(encoder, &training, answers)?)
}

/// Read the test set and backfill missing answers from the tag table.
fn load_eval_cases(config: &Config) -> anyhow::Result<Vec<eval::EvalCase>> {
    let eval_config = &config.evaluation;
    let mut records: Vec<QaRecord> = records::read_qa_table(&eval_config.test_path)
        .with_context(|| format!("failed to load test set {}", eval_config.test_path.display()))?;

    let answers = TagAnswers::read_lenient(&eval_config.tag_answer_path)?;
    let filled = answers.backfill(&mut records);
    if filled > 0 {
        log::info!("backfilled {filled} expected answers from tag table");
    }

    Ok(records.into_iter().map(Into::into).collect())
}

fn run_eval(config: &Config) -> anyhow::Result<()> {
    let eval_config = &config.evaluation;
    let cases = load_eval_cases(config)?;

    let client = eval::HttpSearchClient::new(
        &eval_config.url,
        Duration::from_secs(eval_config.request_timeout_secs),
    )?;
    let run_log = eval::RunLog::open(eval_config)?;

    log::info!("evaluating {} questions against {}", cases.len(), eval_config.url);

    let mut evaluator = eval::Evaluator::new(client, run_log, eval_config.into());
    evaluator.run(&cases)?;

    Ok(())
}
