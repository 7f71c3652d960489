//! CLI probe for the DevHabit core.
//!
//! # Responsibility
//! - Run habit/tag use-cases against a configured database from a shell.
//! - Print payloads as JSON; exit 2 on client errors, 1 on anything else.

use clap::{Args, Parser, Subcommand};
use devhabit_core::model::habit::{CreateHabitDto, Frequency, FrequencyType, HabitStatus, HabitType, Target};
use devhabit_core::model::tag::CreateTagDto;
use devhabit_core::repo::habit_repo::SqliteHabitRepository;
use devhabit_core::repo::tag_repo::SqliteTagRepository;
use devhabit_core::{
    build_sort_registry, init_logging, open_db, open_db_in_memory, ConfigError, CoreConfig,
    DbError, HabitQueryParameters, HabitService, LoggingError, QueryEngine, QueryError,
    ServiceError, TagQueryParameters, TagService,
};
use log::error;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "devhabit", version, about = "Habit and tag store probe")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Habit use-cases
    #[command(subcommand)]
    Habits(HabitsCommand),
    /// Tag use-cases
    #[command(subcommand)]
    Tags(TagsCommand),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive search on name and description
    #[arg(long)]
    q: Option<String>,
    /// e.g. "name desc,createdAtUtc"
    #[arg(long)]
    sort: Option<String>,
    /// e.g. "id,name"
    #[arg(long)]
    fields: Option<String>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum HabitsCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long = "type")]
        kind: Option<HabitType>,
        #[arg(long)]
        status: Option<HabitStatus>,
    },
    Get {
        id: String,
        #[arg(long)]
        fields: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "type", default_value = "binary")]
        kind: HabitType,
        #[arg(long, default_value = "daily")]
        frequency: FrequencyType,
        #[arg(long, default_value_t = 1)]
        times_per_period: u32,
        #[arg(long, default_value_t = 1)]
        target_value: u32,
        #[arg(long, default_value = "times")]
        target_unit: String,
        /// YYYY-MM-DD
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        milestone: Option<u32>,
    },
    /// Replace a habit's tag set
    Tag { id: String, tag_ids: Vec<String> },
}

#[derive(Subcommand, Debug)]
enum TagsCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    Get {
        id: String,
        #[arg(long)]
        fields: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Registry(QueryError),
    Service(ServiceError),
    Output(serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Service(err) if err.is_client_error() => 2,
            _ => 1,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Logging(err) => write!(f, "logging error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Registry(err) => write!(f, "startup error: {err}"),
            Self::Service(err) => write!(f, "{} {err}", err.status_code()),
            Self::Output(err) => write!(f, "output error: {err}"),
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = CoreConfig::from_env().map_err(CliError::Config)?;
    if config.log.dir.is_some() {
        init_logging(&config.log).map_err(CliError::Logging)?;
    }

    let conn = match config.db_path.as_deref() {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(CliError::Db)?;
    let engine = QueryEngine::new(build_sort_registry().map_err(CliError::Registry)?);

    match cli.command {
        Command::Habits(command) => {
            let service = HabitService::new(
                SqliteHabitRepository::new(&conn),
                engine,
                config.paging,
            );
            run_habits(&service, command)
        }
        Command::Tags(command) => {
            let service = TagService::new(SqliteTagRepository::new(&conn), engine, config.paging);
            run_tags(&service, command)
        }
    }
}

fn run_habits(
    service: &HabitService<SqliteHabitRepository<'_>>,
    command: HabitsCommand,
) -> Result<(), CliError> {
    match command {
        HabitsCommand::List { list, kind, status } => {
            let params = HabitQueryParameters {
                search: list.q,
                kind,
                status,
                sort: list.sort,
                fields: list.fields,
                page: list.page,
                page_size: list.page_size,
            };
            print_json(&service.list_habits(&params)?)
        }
        HabitsCommand::Get { id, fields } => print_json(&service.get_habit(&id, fields.as_deref())?),
        HabitsCommand::Create {
            name,
            description,
            kind,
            frequency,
            times_per_period,
            target_value,
            target_unit,
            end_date,
            milestone,
        } => {
            let dto = CreateHabitDto {
                name,
                description,
                kind,
                frequency: Frequency {
                    kind: frequency,
                    times_per_period,
                },
                target: Target {
                    value: target_value,
                    unit: target_unit,
                },
                end_date,
                milestone_target: milestone,
            };
            print_json(&service.create_habit(dto)?)
        }
        HabitsCommand::Tag { id, tag_ids } => {
            let changed = service.upsert_habit_tags(&id, &tag_ids)?;
            print_json(&serde_json::json!({ "habitId": id, "changed": changed }))
        }
    }
}

fn run_tags(
    service: &TagService<SqliteTagRepository<'_>>,
    command: TagsCommand,
) -> Result<(), CliError> {
    match command {
        TagsCommand::List { list } => {
            let params = TagQueryParameters {
                search: list.q,
                sort: list.sort,
                fields: list.fields,
                page: list.page,
                page_size: list.page_size,
            };
            print_json(&service.list_tags(&params)?)
        }
        TagsCommand::Get { id, fields } => print_json(&service.get_tag(&id, fields.as_deref())?),
        TagsCommand::Create { name, description } => {
            print_json(&service.create_tag(CreateTagDto { name, description })?)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(CliError::Output)?;
    println!("{text}");
    Ok(())
}
