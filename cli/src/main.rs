use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use skilltune::Config;
use skilltune::error::AppResult;
use skilltune::import::CsvUpload;
use skilltune::model::entity::{Credential, DeckAttachment, Lesson, LessonCreate, UserEntity, UserEntityCreateUpdate};
use skilltune::model::{CrudRepository, DbConnection, ModelManager};
use skilltune::web::{AppState, AuthenticatedUser, UserRole};
use validator::Validate;

#[derive(Parser, Debug)]
#[command(about = "CLI tool for filling the skilltune DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage lessons
    Lesson {
        #[command(subcommand)]
        action: LessonCommands,
    },

    /// Import quiz cards
    Quiz {
        #[command(subcommand)]
        action: QuizCommands,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => UserRole::User,
            RoleArg::Admin => UserRole::Admin,
        }
    }
}

/// User management
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type", value_enum, default_value = "USER")]
        user_type: RoleArg,
    },
}

/// Lesson management
#[derive(Subcommand, Debug)]
pub enum LessonCommands {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        sequence: i32,
        /// Object key of an already uploaded PDF
        #[arg(long)]
        pdf_key: String,
        /// Object key of an already uploaded video
        #[arg(long)]
        video_key: String,
    },
}

/// Quiz import
#[derive(Subcommand, Debug)]
pub enum QuizCommands {
    Import {
        /// Path to the CSV file
        #[arg(long)]
        file: PathBuf,
        /// Deck to replace, the unattached pool when omitted
        #[arg(long)]
        deck_id: Option<uuid::Uuid>,
    },
}

async fn connect_state(config: &Config) -> AppResult<AppState> {
    let db = DbConnection::connect(config.app().database_uri())?;
    skilltune::run_migrations(&db).await?;

    let storage = skilltune::storage::connect(config.storage(), config.app().jwt()).await;
    Ok(skilltune::build_state(db, storage, config))
}

async fn add_user(
    mm: &ModelManager,
    email: String,
    password: String,
    name: Option<String>,
    role: UserRole,
) -> AppResult<UserEntity> {
    let hash = skilltune::auth::hash_password(&password)?;
    let profile = UserEntityCreateUpdate {
        email,
        name,
        avatar_url: None,
        user_type: role,
    };
    let user = Credential::register(mm, profile, &hash).await?;
    Ok(user)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let _ = dotenvy::dotenv();
    skilltune::setup_trace();
    let args = Cli::parse();

    let config = Config::get_or_init(false).await;
    let state = connect_state(config).await?;
    let actor = AuthenticatedUser::system();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add { email, password, name, user_type } => {
                let user = add_user(state.pool(), email, password, name, user_type.into()).await?;
                println!("User created: {} ({})", user.email(), user.role());
            }
        },

        Commands::Lesson { action } => match action {
            LessonCommands::Add { title, description, sequence, pdf_key, video_key } => {
                let data = LessonCreate {
                    title,
                    description,
                    sequence,
                    pdf_key,
                    pdf_filename: None,
                    video_key,
                    video_filename: None,
                };
                if let Err(e) = data.validate() {
                    eprintln!("Invalid lesson: {e}");
                    std::process::exit(2);
                }

                let lesson = Lesson::create(state.pool(), &actor, data).await?;
                println!("Lesson created: {} #{}", lesson.title(), lesson.sequence());
            }
        },

        Commands::Quiz { action } => match action {
            QuizCommands::Import { file, deck_id } => {
                let filename = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let bytes = std::fs::read(&file)?;
                let target = DeckAttachment::from(deck_id);

                let upload = CsvUpload {
                    filename,
                    content_type: None,
                    bytes,
                };
                let summary = state.importer().import(upload, target).await?;
                println!(
                    "Imported {} quiz cards, CSV stored at {}",
                    summary.total_processed, summary.csv_key
                );
            }
        },
    }

    Ok(())
}
