mod catalog;
mod config;
mod editor;
mod model;
mod normalizer;
mod password;
mod resolver;
mod service;
mod storage;
mod users;
mod utils;
mod view;

use clap::{ArgAction, Parser, Subcommand};
use config::{load_config, AppConfig};
use editor::NewCharacteristic;
use model::{AuthError, DashboardError, StorageError};
use password::Pbkdf2Hasher;
use serde::Serialize;
use service::{Dashboard, UpdateValueRequest};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use storage::JsonFileStorage;
use tracing::{error, info, warn};
use users::{authorize_admin, NewUser, Role, User, UserProfile, UserStore};
use view::PlanFilter;

#[derive(Debug, Parser)]
#[command(name = "sales-dashboard", version, about = "Maintenance tool for the sales dashboard data files")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the per-plan view, optionally filtered by pains.
    Plans {
        /// `personal` or `corporate`.
        #[arg(long)]
        pain_type: Option<String>,
        /// Comma-separated pain categories.
        #[arg(long)]
        categories: Option<String>,
    },
    /// List sections with their files.
    Sections,
    /// List the rows of one section.
    Characteristics { section: String },
    /// Print the stored row a characteristic name resolves to.
    Characteristic { section: String, name: String },
    /// Change one field of a characteristic.
    Update {
        section: String,
        characteristic: String,
        value: String,
        /// value, description, questions, personal_pain or corporate_pain.
        #[arg(long, default_value = "value")]
        field: String,
        /// Plan column or title, required for `value`.
        #[arg(long)]
        plan: Option<String>,
    },
    CreateSection { name: String },
    RenameSection { old: String, new: String },
    DeleteSection { name: String },
    AddCharacteristic {
        section: String,
        name: String,
        #[arg(long, default_value = "")]
        advantages: String,
        #[arg(long, default_value = "")]
        personal_pain: String,
        #[arg(long, default_value = "")]
        corporate_pain: String,
    },
    RenameCharacteristic { section: String, old: String, new: String },
    DeleteCharacteristic { section: String, name: String },
    /// Move the named characteristics to the top, in the given order.
    Reorder { section: String, order: Vec<String> },
    /// Fold legacy pain columns into the canonical ones in every file.
    Consolidate,
    /// List user accounts.
    Users,
    CreateUser {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long, value_enum, default_value_t = Role::User)]
        role: Role,
    },
    SetRole {
        username: String,
        #[arg(value_enum)]
        role: Role,
    },
    /// Block (`false`) or unblock (`true`) an account.
    SetActive {
        username: String,
        #[arg(action = ArgAction::Set)]
        active: bool,
    },
    /// Create the `admin` account unless an administrator exists.
    InitAdmin {
        #[arg(long)]
        password: String,
    },
    /// Check a username and password.
    Login { username: String, password: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let cli = Cli::parse();

    let config = if Path::new(&cli.config).exists() {
        match load_config(&cli.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Config load error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        warn!("{} not found, using defaults", cli.config);
        AppConfig::default()
    };

    info!("Data directory: {}", config.data_dir.display());
    let store = Arc::new(JsonFileStorage::new(config.data_dir.clone()));

    match run(cli.command, store, &config).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) if e.is_not_found() => {
            warn!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Executes one command as the local administrator and returns what to print.
async fn run(
    command: Command,
    store: Arc<JsonFileStorage>,
    config: &AppConfig,
) -> Result<String, DashboardError> {
    let operator = User::local_operator();
    let dashboard = Dashboard::new(store.clone(), config);

    match command {
        Command::Plans {
            pain_type,
            categories,
        } => {
            let filter = PlanFilter::parse(pain_type.as_deref(), categories.as_deref())?;
            to_json(&dashboard.plans(&operator, &filter).await?)
        }
        Command::Sections => to_json(&dashboard.sections(&operator).await?),
        Command::Characteristics { section } => {
            to_json(&dashboard.section_characteristics(&operator, &section).await?)
        }
        Command::Characteristic { section, name } => {
            to_json(&dashboard.characteristic(&operator, &section, &name).await?)
        }
        Command::Update {
            section,
            characteristic,
            value,
            field,
            plan,
        } => {
            let request = UpdateValueRequest {
                section,
                characteristic,
                plan_name: plan,
                new_value: value,
                field_type: field,
            };
            dashboard.update_value(&operator, request).await?;
            Ok("updated".to_string())
        }
        Command::CreateSection { name } => {
            let file = dashboard.create_section(&operator, &name).await?;
            Ok(format!("created {}", file))
        }
        Command::RenameSection { old, new } => {
            dashboard.rename_section(&operator, &old, &new).await?;
            Ok("renamed".to_string())
        }
        Command::DeleteSection { name } => {
            dashboard.delete_section(&operator, &name).await?;
            Ok("deleted".to_string())
        }
        Command::AddCharacteristic {
            section,
            name,
            advantages,
            personal_pain,
            corporate_pain,
        } => {
            let characteristic = NewCharacteristic {
                advantages,
                personal_pain,
                corporate_pain,
                ..NewCharacteristic::named(&name)
            };
            dashboard
                .add_characteristic(&operator, &section, characteristic)
                .await?;
            Ok("added".to_string())
        }
        Command::RenameCharacteristic { section, old, new } => {
            dashboard
                .rename_characteristic(&operator, &section, &old, &new)
                .await?;
            Ok("renamed".to_string())
        }
        Command::DeleteCharacteristic { section, name } => {
            dashboard
                .delete_characteristic(&operator, &section, &name)
                .await?;
            Ok("deleted".to_string())
        }
        Command::Reorder { section, order } => {
            dashboard
                .reorder_characteristics(&operator, &section, &order)
                .await?;
            Ok("reordered".to_string())
        }
        Command::Consolidate => {
            let changed = dashboard.consolidate_all(&operator).await?;
            Ok(format!("{} rows changed", changed))
        }
        Command::Users => {
            authorize_admin(&operator)?;
            to_json(&user_store(store, config).list().await?)
        }
        Command::CreateUser {
            username,
            password,
            email,
            full_name,
            role,
        } => {
            authorize_admin(&operator)?;
            let new_user = NewUser {
                username,
                email,
                full_name,
                password,
                role,
            };
            let user = user_store(store, config)
                .create(new_user, &Pbkdf2Hasher::default())
                .await?;
            to_json(&UserProfile::from(&user))
        }
        Command::SetRole { username, role } => {
            authorize_admin(&operator)?;
            let user = user_store(store, config).update_role(&username, role).await?;
            to_json(&UserProfile::from(&user))
        }
        Command::SetActive { username, active } => {
            authorize_admin(&operator)?;
            let user = user_store(store, config)
                .set_active(&operator, &username, active)
                .await?;
            to_json(&UserProfile::from(&user))
        }
        Command::InitAdmin { password } => {
            let created = user_store(store, config)
                .ensure_default_admin(&password, &Pbkdf2Hasher::default())
                .await?;
            Ok(if created { "admin created" } else { "administrator already exists" }.to_string())
        }
        Command::Login { username, password } => {
            let user = user_store(store, config)
                .authenticate(&username, &password, &Pbkdf2Hasher::default())
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            to_json(&UserProfile::from(&user))
        }
    }
}

fn user_store(store: Arc<JsonFileStorage>, config: &AppConfig) -> UserStore<JsonFileStorage> {
    UserStore::new(store, &config.users_file)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, DashboardError> {
    Ok(serde_json::to_string_pretty(value).map_err(StorageError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filtered_plans() {
        let cli = Cli::try_parse_from([
            "sales-dashboard",
            "plans",
            "--pain-type",
            "corporate",
            "--categories",
            "Экономия,Скорость",
        ])
        .unwrap();
        match cli.command {
            Command::Plans {
                pain_type,
                categories,
            } => {
                assert_eq!(pain_type.as_deref(), Some("corporate"));
                assert_eq!(categories.as_deref(), Some("Экономия,Скорость"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, "config.json");
    }

    #[test]
    fn update_defaults_to_plan_value() {
        let cli = Cli::try_parse_from([
            "sales-dashboard",
            "update",
            "srochnost",
            "Сроки",
            "10 дней",
            "--plan",
            "Эксперт",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Update { ref field, ref plan, .. } if field == "value" && plan.as_deref() == Some("Эксперт")
        ));
    }

    #[tokio::test]
    async fn commands_run_against_a_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStorage::new(dir.path()));
        let config = AppConfig::default();

        let created = run(
            Command::CreateSection {
                name: "Поддержка".to_string(),
            },
            store.clone(),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(created, "created podderzhka.json");

        let sections = run(Command::Sections, store.clone(), &config).await.unwrap();
        assert!(sections.contains("podderzhka.json"));

        let users = run(Command::Users, store, &config).await.unwrap();
        assert_eq!(users, "[]");
    }

    #[tokio::test]
    async fn user_commands_manage_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStorage::new(dir.path()));
        let config = AppConfig::default();
        let cli = |args: &[&str]| {
            let argv = std::iter::once("sales-dashboard").chain(args.iter().copied());
            Cli::try_parse_from(argv).unwrap().command
        };

        let init = run(cli(&["init-admin", "--password", "root"]), store.clone(), &config).await.unwrap();
        assert_eq!(init, "admin created");

        let created = run(cli(&["create-user", "anna", "--password", "pw1", "--email", "a@x.ru"]), store.clone(), &config)
            .await
            .unwrap();
        assert!(created.contains("\"role\": \"user\""));
        assert!(!created.contains("hashed_password"));

        run(cli(&["login", "anna", "pw1"]), store.clone(), &config).await.unwrap();
        let err = run(cli(&["login", "anna", "wrong"]), store.clone(), &config).await.unwrap_err();
        assert!(matches!(err, DashboardError::Auth(AuthError::InvalidCredentials)));

        let promoted = run(cli(&["set-role", "anna", "admin"]), store.clone(), &config).await.unwrap();
        assert!(promoted.contains("\"role\": \"admin\""));

        run(cli(&["set-active", "anna", "false"]), store.clone(), &config).await.unwrap();
        assert!(run(cli(&["login", "anna", "pw1"]), store.clone(), &config).await.is_err());

        let err = run(cli(&["set-role", "ghost", "user"]), store.clone(), &config).await.unwrap_err();
        assert!(matches!(err, DashboardError::Auth(AuthError::UserNotFound(_))));

        let init = run(cli(&["init-admin", "--password", "other"]), store, &config).await.unwrap();
        assert_eq!(init, "administrator already exists");
    }
}
