//! CLI module for user-registry
//!
//! Provides subcommands:
//! - `validate`: check a user record without storing it
//! - `register`: validate, hash and store a user record

pub mod register;
pub mod validate;

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::domain::user::{FieldError, UserDraft, ValidUserRecord, ValidationErrors};

/// user-registry - validate and store user records
#[derive(Parser)]
#[command(name = "user-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a JSON user record and print the normalized result
    Validate(RecordArgs),

    /// Validate and store a JSON user record
    ///
    /// With the default in-memory backend the record is discarded when the
    /// command exits; configure the postgres backend to keep it.
    Register(RecordArgs),
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// JSON file holding the record; reads stdin when omitted
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

impl RecordArgs {
    /// Read and parse the candidate record
    pub fn read_draft(&self) -> anyhow::Result<UserDraft> {
        let input = match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read stdin")?;
                buffer
            }
        };

        parse_draft(&input)
    }
}

/// Parse a JSON user record
pub fn parse_draft(input: &str) -> anyhow::Result<UserDraft> {
    serde_json::from_str(input).context("Input is not a valid user record")
}

/// Machine-readable outcome printed by the subcommands
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Report<T: Serialize> {
    Valid { record: T },
    Invalid { errors: Vec<Failure> },
    Duplicate { field: String },
}

#[derive(Debug, Serialize)]
pub struct Failure {
    #[serde(flatten)]
    pub error: FieldError,
    pub message: String,
}

impl<T: Serialize> Report<T> {
    pub fn invalid(errors: ValidationErrors) -> Self {
        Self::Invalid {
            errors: errors
                .into_inner()
                .into_iter()
                .map(|error| Failure {
                    message: error.to_string(),
                    error,
                })
                .collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Print as pretty JSON on stdout
    pub fn print(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

impl From<Result<ValidUserRecord, ValidationErrors>> for Report<ValidUserRecord> {
    fn from(result: Result<ValidUserRecord, ValidationErrors>) -> Self {
        match result {
            Ok(record) => Self::Valid { record },
            Err(errors) => Self::invalid(errors),
        }
    }
}
