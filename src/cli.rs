use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AnswerMatch;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to a YAML config file.
    /// Defaults to config.yaml in $FAQ_BASE_PATH (~/.local/share/faq)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a labelled QA table into train/test sets, stratified by tag
    Split {
        /// Merged QA table to split
        #[clap(short, long)]
        input: PathBuf,

        /// Where to write the train rows
        #[clap(long, default_value = "train.csv")]
        train: PathBuf,

        /// Where to write the test rows
        #[clap(long, default_value = "test.csv")]
        test: PathBuf,

        /// Random seed
        #[clap(long)]
        seed: Option<u64>,

        /// Share of each tag group sent to test, in percent
        #[clap(long)]
        test_percent: Option<u32>,
    },

    /// Start the search service.
    Serve {
        /// Training QA table (question, tag)
        #[clap(long)]
        train: Option<PathBuf>,

        /// Tag/answer table
        #[clap(long)]
        tag_answers: Option<PathBuf>,

        /// Address to bind, e.g. 0.0.0.0:8000
        #[clap(long)]
        addr: Option<String>,

        /// Embedding model name
        #[clap(short, long)]
        model: Option<String>,
    },

    /// Evaluate a running search service against a labelled test set
    Eval {
        /// Test QA table (question, tag, optional answer)
        #[clap(long)]
        test: Option<PathBuf>,

        /// Tag/answer table used to backfill missing answers
        #[clap(long)]
        tag_answers: Option<PathBuf>,

        /// Search endpoint
        #[clap(long)]
        url: Option<String>,

        /// Full trace log
        #[clap(long)]
        log: Option<PathBuf>,

        /// Mismatch-only log
        #[clap(long)]
        mismatch_log: Option<PathBuf>,

        /// Pause between requests, in milliseconds
        #[clap(long)]
        pause_ms: Option<u64>,

        /// How answers are compared
        #[clap(long, value_enum)]
        answer_match: Option<AnswerMatch>,
    },
}
