use clap::{Arg, ArgAction, ArgMatches, Command};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod adapters;
mod application;
mod domain;
mod ports;

use adapters::{
    api::{BackendAuth, BackendClient, BackendRepository, BackendStorage},
    cache::MokaCacheAdapter,
    code_host::{GitHubClient, GitLabClient},
    config::FileConfigStore,
    tui::{run_tui, App},
};
use application::{
    AdminService, AppError, AuthService, CategoryService, ProfileService, ProjectService,
    RepoBrowser, Services, SignUpRequest, StateManager,
};
use domain::{
    normalize_tags, share_url, CategoryId, CodeHost, NewCategory, NewProject, NoteId, Priority,
    Project, ProjectId, ProjectStatus, RepoSummary, SortKey, SortOrder, SortSpec,
};
use ports::{AppConfig, CodeHostClient, ConfigStore, OAuthProvider};

const LOG_FILE: &str = "taskforce-monitor.log";
const CACHE_CAPACITY: u64 = 1000;

fn id_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).help(help).required(true).index(1)
}

fn credential_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .required(true),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .env("TFM_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}

fn cli() -> Command {
    Command::new("tfm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Task Force Monitor: track personal projects from the terminal")
        .long_about("Track personal projects, their notes and status from the terminal.\n\nRun without a subcommand to open the dashboard.")
        .arg(
            Arg::new("backend-url")
                .long("backend-url")
                .value_name("URL")
                .env("TFM_BACKEND_URL")
                .help("Backend base URL")
                .global(true),
        )
        .arg(
            Arg::new("anon-key")
                .long("anon-key")
                .value_name("KEY")
                .env("TFM_ANON_KEY")
                .hide_env_values(true)
                .help("Public API key of the backend")
                .global(true),
        )
        .subcommand(
            Command::new("projects")
                .about("Project operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("List projects in dashboard order as JSON")
                        .arg(Arg::new("category").long("category").value_name("CATEGORY"))
                        .arg(Arg::new("tag").long("tag").value_name("TAG"))
                        .arg(
                            Arg::new("sort")
                                .long("sort")
                                .value_name("KEY")
                                .help("name, created_at, status, priority or category"),
                        )
                        .arg(
                            Arg::new("desc")
                                .long("desc")
                                .help("Reverse the --sort order")
                                .action(ArgAction::SetTrue),
                        )
                        .arg(
                            Arg::new("archived")
                                .long("archived")
                                .help("Include abandoned projects")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("get").about("Get a project by ID").arg(id_arg("id", "Project ID")))
                .subcommand(
                    Command::new("create")
                        .about("Create a project")
                        .arg(id_arg("name", "Project name"))
                        .arg(Arg::new("description").long("description").value_name("TEXT"))
                        .arg(Arg::new("status").long("status").value_name("STATUS"))
                        .arg(Arg::new("priority").long("priority").value_name("PRIORITY"))
                        .arg(Arg::new("category").long("category").value_name("CATEGORY"))
                        .arg(
                            Arg::new("tags")
                                .long("tags")
                                .value_name("TAGS")
                                .help("Comma-separated tags"),
                        )
                        .arg(Arg::new("link").long("link").value_name("URL")),
                )
                .subcommand(
                    Command::new("status")
                        .about("Change a project's status")
                        .arg(id_arg("id", "Project ID"))
                        .arg(
                            Arg::new("status")
                                .help("concept, started, completed or abandoned")
                                .required(true)
                                .index(2),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a project")
                        .arg(id_arg("id", "Project ID")),
                ),
        )
        .subcommand(
            Command::new("notes")
                .about("Project notes")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List a project's notes").arg(id_arg("project", "Project ID")))
                .subcommand(
                    Command::new("add")
                        .about("Append a note")
                        .arg(id_arg("project", "Project ID"))
                        .arg(Arg::new("text").required(true).index(2)),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a note")
                        .arg(id_arg("project", "Project ID"))
                        .arg(Arg::new("note").help("Note ID").required(true).index(2)),
                ),
        )
        .subcommand(
            Command::new("share")
                .about("Read-only share links")
                .subcommand_required(true)
                .subcommand(
                    Command::new("generate")
                        .about("Create or replace a project's share link")
                        .arg(id_arg("id", "Project ID")),
                )
                .subcommand(
                    Command::new("view")
                        .about("Open a shared project")
                        .arg(id_arg("id", "Project ID"))
                        .arg(
                            Arg::new("token")
                                .long("token")
                                .value_name("TOKEN")
                                .required(true),
                        ),
                ),
        )
        .subcommand(
            Command::new("categories")
                .about("Project categories")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List built-in and custom categories"))
                .subcommand(
                    Command::new("add")
                        .about("Add a custom category")
                        .arg(id_arg("label", "Category label"))
                        .arg(
                            Arg::new("icon")
                                .long("icon")
                                .value_name("ICON")
                                .default_value("folder"),
                        )
                        .arg(
                            Arg::new("color")
                                .long("color")
                                .value_name("HEX")
                                .default_value("#6b7280"),
                        ),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove a custom category")
                        .arg(id_arg("id", "Category ID")),
                ),
        )
        .subcommand(
            Command::new("repos")
                .about("List public repositories on a code host")
                .arg(id_arg("host", "github or gitlab"))
                .arg(Arg::new("user").help("Username on the host").required(true).index(2)),
        )
        .subcommand(
            Command::new("profile")
                .about("Your profile")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Show your profile"))
                .subcommand(
                    Command::new("avatar")
                        .about("Upload an avatar image")
                        .arg(id_arg("file", "Image file")),
                ),
        )
        .subcommand(
            Command::new("admin")
                .about("Maintenance")
                .subcommand_required(true)
                .subcommand(
                    Command::new("migrate-notes")
                        .about("Rewrite plain-text notes as note lists"),
                )
                .subcommand(
                    Command::new("purge")
                        .about("Delete all of your projects, categories and profile")
                        .arg(
                            Arg::new("yes")
                                .long("yes")
                                .help("Confirm the deletion")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(credential_args(Command::new("login").about("Sign in with email and password")))
        .subcommand(
            credential_args(Command::new("signup").about("Create an account")).arg(
                Arg::new("confirm")
                    .long("confirm")
                    .value_name("PASSWORD")
                    .help("Repeat the password (defaults to --password)"),
            ),
        )
        .subcommand(Command::new("logout").about("Sign out and forget the stored session"))
        .subcommand(
            Command::new("oauth")
                .about("Sign in through an OAuth provider")
                .subcommand_required(true)
                .subcommand(
                    Command::new("url")
                        .about("Print the authorization URL")
                        .arg(id_arg("provider", "github, gitlab or google")),
                )
                .subcommand(
                    Command::new("complete")
                        .about("Finish sign-in from the redirect URL")
                        .arg(id_arg("redirect", "Full redirect URL including the #fragment")),
                ),
        )
}

fn init_logging() -> Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)?;

    let filter = EnvFilter::try_from_env("TFM_LOG").unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();
    Ok(())
}

/// Flags and environment win over the config file. Returns whether anything changed.
fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> bool {
    let mut changed = false;
    if let Some(url) = matches.get_one::<String>("backend-url") {
        changed |= config.backend_url.as_ref() != Some(url);
        config.backend_url = Some(url.clone());
    }
    if let Some(key) = matches.get_one::<String>("anon-key") {
        changed |= config.anon_key.as_ref() != Some(key);
        config.anon_key = Some(key.clone());
    }
    changed
}

fn build_state(config: &AppConfig, config_store: Arc<FileConfigStore>) -> Result<StateManager> {
    let backend_url = config.backend_url.clone().ok_or_else(|| {
        AppError::NotConfigured("set --backend-url or TFM_BACKEND_URL".into())
    })?;
    let anon_key = config
        .anon_key
        .clone()
        .ok_or_else(|| AppError::NotConfigured("set --anon-key or TFM_ANON_KEY".into()))?;

    let client = Arc::new(BackendClient::new(backend_url, anon_key).map_err(AppError::from)?);
    let repository = Arc::new(BackendRepository::new(client.clone()));
    let auth = Arc::new(BackendAuth::new(client.clone()));
    let storage = Arc::new(BackendStorage::new(client));

    let code_hosts: Vec<Arc<dyn CodeHostClient>> = vec![
        Arc::new(GitHubClient::new().map_err(AppError::from)?) as Arc<dyn CodeHostClient>,
        Arc::new(GitLabClient::new().map_err(AppError::from)?) as Arc<dyn CodeHostClient>,
    ];

    let ttl = config.cache_ttl_seconds;
    let services = Services {
        projects: ProjectService::new(
            repository.clone(),
            Arc::new(MokaCacheAdapter::<ProjectId, Project>::new(ttl, CACHE_CAPACITY)),
        ),
        categories: CategoryService::new(repository.clone(), config_store.clone()),
        auth: AuthService::new(auth, config_store, config.site_url.clone()),
        profiles: ProfileService::new(repository.clone(), storage),
        repos: RepoBrowser::new(
            code_hosts,
            Arc::new(MokaCacheAdapter::<(CodeHost, String), Vec<RepoSummary>>::new(
                ttl,
                CACHE_CAPACITY,
            )),
        ),
        admin: AdminService::new(repository.clone(), repository.clone(), repository),
    };

    Ok(StateManager::new(
        services,
        chrono::Duration::seconds(ttl as i64),
    ))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| eyre!("missing argument: {name}"))
}

fn optional(matches: &ArgMatches, name: &str) -> Option<String> {
    matches
        .get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn run_projects(state: &StateManager, matches: &ArgMatches, config: &AppConfig) -> Result<()> {
    match matches.subcommand() {
        Some(("list", m)) => {
            let filter = domain::DashboardFilter {
                category: domain::CategoryFilter::parse(
                    m.get_one::<String>("category").map(String::as_str).unwrap_or(""),
                ),
                tag: optional(m, "tag"),
                show_archived: m.get_flag("archived") || config.show_archived,
            };
            let order = if m.get_flag("desc") { SortOrder::Desc } else { SortOrder::Asc };
            let sort = optional(m, "sort")
                .map(|key| key.parse::<SortKey>().map(|key| SortSpec::new(key, order)))
                .transpose()
                .map_err(AppError::from)?
                .unwrap_or(config.default_sort);
            print_json(&state.dashboard(&filter, Some(sort)).await?)
        }
        Some(("get", m)) => {
            let id = ProjectId(required(m, "id")?.to_string());
            print_json(&state.get_project(&id).await?)
        }
        Some(("create", m)) => {
            let project = NewProject {
                name: required(m, "name")?.to_string(),
                description: optional(m, "description"),
                status: match optional(m, "status") {
                    Some(s) => s.parse::<ProjectStatus>().map_err(AppError::from)?,
                    None => ProjectStatus::default(),
                },
                priority: optional(m, "priority")
                    .map(|p| p.parse::<Priority>())
                    .transpose()
                    .map_err(AppError::from)?,
                category: optional(m, "category"),
                tags: normalize_tags(m.get_one::<String>("tags").map(String::as_str).unwrap_or("")),
                link: optional(m, "link"),
            };
            print_json(&state.create_project(project).await?)
        }
        Some(("status", m)) => {
            let id = ProjectId(required(m, "id")?.to_string());
            let status = required(m, "status")?
                .parse::<ProjectStatus>()
                .map_err(AppError::from)?;
            print_json(&state.set_status(&id, status).await?)
        }
        Some(("delete", m)) => {
            let id = ProjectId(required(m, "id")?.to_string());
            state.delete_project(&id).await?;
            println!("Deleted project {id}");
            Ok(())
        }
        _ => Err(eyre!("Unknown projects subcommand")),
    }
}

async fn run_notes(state: &StateManager, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", m)) => {
            let id = ProjectId(required(m, "project")?.to_string());
            print_json(&state.get_project(&id).await?.notes())
        }
        Some(("add", m)) => {
            let id = ProjectId(required(m, "project")?.to_string());
            let project = state.add_note(&id, required(m, "text")?).await?;
            print_json(&project.notes())
        }
        Some(("delete", m)) => {
            let id = ProjectId(required(m, "project")?.to_string());
            let note = NoteId(required(m, "note")?.to_string());
            let project = state.delete_note(&id, &note).await?;
            print_json(&project.notes())
        }
        _ => Err(eyre!("Unknown notes subcommand")),
    }
}

async fn run_command(
    state: &StateManager,
    config: &AppConfig,
    name: &str,
    matches: &ArgMatches,
) -> Result<()> {
    match name {
        "projects" => run_projects(state, matches, config).await,
        "notes" => run_notes(state, matches).await,
        "share" => match matches.subcommand() {
            Some(("generate", m)) => {
                let id = ProjectId(required(m, "id")?.to_string());
                let token = state.generate_share_link(&id).await?;
                match &config.site_url {
                    Some(site) => println!("{}", share_url(site, &id, &token)),
                    None => println!("{token}"),
                }
                Ok(())
            }
            Some(("view", m)) => {
                let id = ProjectId(required(m, "id")?.to_string());
                print_json(&state.view_shared(&id, required(m, "token")?).await?)
            }
            _ => Err(eyre!("Unknown share subcommand")),
        },
        "categories" => match matches.subcommand() {
            Some(("list", _)) => print_json(&state.categories().await?),
            Some(("add", m)) => {
                let category = NewCategory {
                    label: required(m, "label")?.to_string(),
                    icon: required(m, "icon")?.to_string(),
                    color: required(m, "color")?.to_string(),
                };
                print_json(&state.add_category(category).await?)
            }
            Some(("remove", m)) => {
                let id = CategoryId(required(m, "id")?.to_string());
                print_json(&state.remove_category(&id).await?)
            }
            _ => Err(eyre!("Unknown categories subcommand")),
        },
        "repos" => {
            let host = required(matches, "host")?
                .parse::<CodeHost>()
                .map_err(|e| eyre!(e))?;
            print_json(&state.repositories(host, required(matches, "user")?).await?)
        }
        "profile" => match matches.subcommand() {
            Some(("show", _)) => print_json(&state.profile().await?),
            Some(("avatar", m)) => {
                let path = std::path::Path::new(required(m, "file")?);
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| eyre!("Invalid file name: {}", path.display()))?;
                print_json(
                    &state
                        .upload_avatar(file_name, bytes, content_type_for(path))
                        .await?,
                )
            }
            _ => Err(eyre!("Unknown profile subcommand")),
        },
        "admin" => match matches.subcommand() {
            Some(("migrate-notes", _)) => print_json(&state.migrate_project_notes().await?),
            Some(("purge", m)) => {
                if !m.get_flag("yes") {
                    return Err(eyre!("Refusing to delete everything without --yes"));
                }
                let report = state.purge_user_data().await?;
                print_json(&report)?;
                if report.is_complete() {
                    state.sign_out().await?;
                    Ok(())
                } else {
                    Err(eyre!("Purge finished with {} failure(s)", report.failures.len()))
                }
            }
            _ => Err(eyre!("Unknown admin subcommand")),
        },
        "login" => {
            let session = state
                .sign_in(required(matches, "email")?, required(matches, "password")?)
                .await?;
            println!(
                "Signed in as {}",
                session.user.email.as_deref().unwrap_or(&session.user.id.0)
            );
            Ok(())
        }
        "signup" => {
            let password = required(matches, "password")?.to_string();
            let request = SignUpRequest {
                email: required(matches, "email")?.to_string(),
                confirm_password: optional(matches, "confirm").unwrap_or_else(|| password.clone()),
                password,
            };
            match state.sign_up(request).await? {
                Some(session) => println!("Account created, signed in as {}", session.user.id),
                None => println!("Account created. Check your email to confirm it, then run `tfm login`."),
            }
            Ok(())
        }
        "logout" => {
            state.sign_out().await?;
            println!("Signed out");
            Ok(())
        }
        "oauth" => match matches.subcommand() {
            Some(("url", m)) => {
                let provider = required(m, "provider")?
                    .parse::<OAuthProvider>()
                    .map_err(AppError::from)?;
                println!("{}", state.oauth_url(provider)?);
                Ok(())
            }
            Some(("complete", m)) => {
                let session = state.complete_oauth(required(m, "redirect")?).await?;
                println!("Signed in as {}", session.user.id);
                Ok(())
            }
            _ => Err(eyre!("Unknown oauth subcommand")),
        },
        other => Err(eyre!("Unknown command: {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let matches = cli().get_matches();

    let config_store = Arc::new(FileConfigStore::new()?);
    let mut config = config_store.load_config().await?;
    if apply_overrides(&mut config, &matches) {
        config_store.save_config(&config).await?;
    }

    let state = match build_state(&config, config_store.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!();
            eprintln!("Set the backend once with:");
            eprintln!("  tfm --backend-url https://<project>.example.co --anon-key <key> login --email <you>");
            std::process::exit(1);
        }
    };

    let result = match matches.subcommand() {
        Some((name, sub_matches)) => {
            let result = match state.start().await {
                Ok(_) => run_command(&state, &config, name, sub_matches).await,
                Err(e) => Err(e.into()),
            };
            state.shutdown();
            result
        }
        None => run_tui(App::new(state.clone(), config.show_archived, config.default_sort)).await,
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        match e.downcast_ref::<AppError>() {
            Some(AppError::AuthenticationRequired) => {
                eprintln!("❌ Not signed in. Run `tfm login --email <you>` first.");
            }
            Some(AppError::AccessDenied) => eprintln!("❌ Access denied"),
            _ => eprintln!("❌ {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config_file() {
        let matches = cli()
            .try_get_matches_from(["tfm", "--backend-url", "https://db.example", "logout"])
            .unwrap();
        let mut config = AppConfig {
            backend_url: Some("https://old.example".into()),
            anon_key: Some("anon".into()),
            ..Default::default()
        };

        assert!(apply_overrides(&mut config, &matches));
        assert_eq!(config.backend_url.as_deref(), Some("https://db.example"));
        assert_eq!(config.anon_key.as_deref(), Some("anon"));
        assert!(!apply_overrides(&mut config, &matches));
    }

    #[test]
    fn test_status_takes_id_and_value() {
        let matches = cli()
            .try_get_matches_from(["tfm", "projects", "status", "p1", "started"])
            .unwrap();
        let (_, projects) = matches.subcommand().unwrap();
        let (name, status) = projects.subcommand().unwrap();
        assert_eq!(name, "status");
        assert_eq!(required(status, "id").unwrap(), "p1");
        assert_eq!(required(status, "status").unwrap(), "started");
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for(std::path::Path::new("me.PNG")), "image/png");
        assert_eq!(content_type_for(std::path::Path::new("me.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(std::path::Path::new("me")), "application/octet-stream");
    }
}
