//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand};
use people_core::{FilterCriteria, PersonId};

/// Default bound for one whole command, enrichment included.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Parser)]
#[command(name = "people")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Person directory with age, gender and nationality enrichment")]
pub struct Cli {
    /// Overall time limit for the command in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_COMMAND_TIMEOUT_MS)]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enrich and store a new person
    Create {
        name: String,
        surname: String,
        patronymic: Option<String>,
    },
    /// Print one person by id
    Get { id: PersonId },
    /// List persons matching all given filters
    List(ListArgs),
    /// Replace all fields of a person with a JSON object
    Update {
        id: PersonId,
        /// e.g. '{"name":"Ivan","surname":"Petrov","age":30}'
        json: String,
    },
    /// Delete a person by id
    Delete { id: PersonId },
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Case-insensitive substring of the name
    #[arg(long)]
    pub name: Option<String>,
    /// Case-insensitive substring of the surname
    #[arg(long)]
    pub surname: Option<String>,
    #[arg(long)]
    pub age_min: Option<u32>,
    #[arg(long)]
    pub age_max: Option<u32>,
    /// male or female
    #[arg(long)]
    pub gender: Option<String>,
    /// Two-letter country code
    #[arg(long)]
    pub nationality: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Rows per page, capped at 100
    #[arg(long, default_value_t = 10)]
    pub page_size: u32,
}

impl From<ListArgs> for FilterCriteria {
    fn from(args: ListArgs) -> Self {
        Self {
            name: args.name,
            surname: args.surname,
            age_min: args.age_min,
            age_max: args.age_max,
            gender: args.gender,
            nationality: args.nationality,
            page: args.page,
            page_size: args.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use people_core::FilterCriteria;

    #[test]
    fn create_accepts_optional_patronymic() {
        let cli = Cli::try_parse_from(["people", "create", "Иван", "Петров", "Сергеевич"]).unwrap();
        match cli.command {
            Command::Create {
                name, patronymic, ..
            } => {
                assert_eq!(name, "Иван");
                assert_eq!(patronymic.as_deref(), Some("Сергеевич"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn list_flags_become_filter_criteria() {
        let cli = Cli::try_parse_from([
            "people", "list", "--name", "iv", "--age-min", "18", "--page", "2",
        ])
        .unwrap();
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        let criteria = FilterCriteria::from(args);
        assert_eq!(criteria.name.as_deref(), Some("iv"));
        assert_eq!(criteria.age_min, Some(18));
        assert_eq!(criteria.page, 2);
        assert_eq!(criteria.page_size, 10);
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        assert!(Cli::try_parse_from(["people", "get", "abc"]).is_err());
    }
}
