//! `people` command-line transport over `people_core`.
//!
//! # Responsibility
//! - Decode arguments, run one service call, print JSON to stdout.
//! - Map service error kinds to process exit codes.
//!
//! # Invariants
//! - Results go to stdout, failures go to stderr as one JSON object.
//! - No business rule lives here.

mod args;

use crate::args::{Cli, Command};
use clap::Parser;
use log::warn;
use people_core::{
    init_logging, open_db, AppConfig, ConfigError, Deadline, ErrorKind, FilterCriteria,
    HttpEnrichmentClient, PersonData, PersonInput, PersonService, ServiceError,
    SqlitePersonRepository,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("{}", failure.to_json());
            ExitCode::from(failure.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<Value, CliFailure> {
    let config = AppConfig::from_env().map_err(CliFailure::Config)?;
    if let Some(log_dir) = config.log_dir.as_ref() {
        // A broken log directory must not block the command itself.
        if let Err(err) = init_logging(&config.log_level, &log_dir.to_string_lossy()) {
            eprintln!("warning: file logging disabled: {err}");
        }
    }

    let conn = open_db(&config.db_path).map_err(|err| CliFailure::Startup(err.to_string()))?;
    let repo = SqlitePersonRepository::new(&conn);
    let client = HttpEnrichmentClient::new(config.endpoints.clone(), config.http_timeout);
    let service = PersonService::new(repo, client);
    let deadline = Deadline::after(Duration::from_millis(cli.timeout_ms));

    let output = match cli.command {
        Command::Create {
            name,
            surname,
            patronymic,
        } => {
            let mut input = PersonInput::new(name, surname);
            input.patronymic = patronymic;
            to_json(&service.create(input, &deadline)?)
        }
        Command::Get { id } => to_json(&service.get_by_id(id, &deadline)?),
        Command::List(list) => {
            let criteria = FilterCriteria::from(list);
            to_json(&service.get_all(&criteria, &deadline)?)
        }
        Command::Update { id, json } => {
            let data: PersonData =
                serde_json::from_str(&json).map_err(|err| CliFailure::Payload(err.to_string()))?;
            service.update(id, &data, &deadline)?;
            to_json(&service.get_by_id(id, &deadline)?)
        }
        Command::Delete { id } => {
            service.delete(id, &deadline)?;
            json!({ "deleted": id })
        }
    };
    Ok(output)
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| json!({ "serialization_error": err.to_string() }))
}

/// Why the command did not produce a result.
#[derive(Debug)]
enum CliFailure {
    Config(ConfigError),
    Startup(String),
    Payload(String),
    Service(ServiceError),
}

impl From<ServiceError> for CliFailure {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl CliFailure {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Startup(_) => 1,
            Self::Payload(_) => 2,
            Self::Service(err) => exit_code_for(err.kind()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Config(err) => json!({
                "error": { "kind": "config", "key": err.key, "message": err.message }
            }),
            Self::Startup(message) => json!({
                "error": { "kind": "startup", "message": message }
            }),
            Self::Payload(message) => json!({
                "error": { "kind": "validation", "operation": "update", "message": message }
            }),
            Self::Service(err) => {
                warn!(
                    "event=cli_command module=cli status=error kind={} operation={}",
                    err.kind().as_str(),
                    err.operation()
                );
                json!({
                    "error": {
                        "kind": err.kind().as_str(),
                        "operation": err.operation(),
                        "stage": err.stage().map(|stage| stage.as_str()),
                        "message": err.to_string(),
                    }
                })
            }
        }
    }
}

fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Upstream | ErrorKind::NoData => 4,
        ErrorKind::Store => 5,
        ErrorKind::Cancelled => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::{exit_code_for, CliFailure};
    use people_core::{ErrorKind, ServiceError};

    #[test]
    fn exit_codes_are_distinct_per_failure_class() {
        assert_eq!(exit_code_for(ErrorKind::Validation), 2);
        assert_eq!(exit_code_for(ErrorKind::NotFound), 3);
        assert_eq!(exit_code_for(ErrorKind::Upstream), 4);
        assert_eq!(exit_code_for(ErrorKind::NoData), 4);
        assert_eq!(exit_code_for(ErrorKind::Store), 5);
        assert_eq!(exit_code_for(ErrorKind::Cancelled), 6);
    }

    #[test]
    fn not_found_renders_operation_without_stage() {
        let failure = CliFailure::Service(ServiceError::NotFound {
            operation: "get_by_id",
            id: 7,
        });
        assert_eq!(failure.exit_code(), 3);
        let rendered = failure.to_json();
        assert_eq!(rendered["error"]["kind"], "not_found");
        assert_eq!(rendered["error"]["operation"], "get_by_id");
        assert!(rendered["error"]["stage"].is_null());
    }
}
