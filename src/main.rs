use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use plant_client::api::{ApiError, LoginOutcome, PlantApi};
use plant_client::config::{ClientConfig, ConfigError};
use plant_client::session::{SessionGuard, SessionStatus, TokenClaims};
use plant_client::store::{FileStore, StoreError};
use plant_client::validation::{FormFields, FormValidation, validate_form};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

const NETWORK_FAILURE: &str = "Network Error: Please check your connection!";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    LoginRequired(&'static str),
    #[error("form has invalid fields")]
    InvalidForm,
    #[error("{0}")]
    Submit(&'static str),
}

#[derive(Parser, Debug)]
#[command(name = "plant-client", about = "Plant identification client")]
struct Cli {
    /// Backend base URL; overrides PLANT_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Token storage file; overrides PLANT_TOKEN_STORE.
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Signup(SignupArgs),
    /// Log in and store the session token.
    Login(LoginArgs),
    /// Delete the stored session token.
    Logout,
    /// Check the stored session; exits non-zero when a login is required.
    Status,
    /// Print the claims of the current session.
    Whoami,
    /// Check form input locally without contacting the backend.
    Validate(ValidateArgs),
    /// List recently identified plants.
    Recents,
    Favorites(FavoritesCommand),
    /// Upload an image for identification.
    Identify {
        image: PathBuf,
    },
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "PLANT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "PLANT_PASSWORD", hide_env_values = true)]
    password: String,
    /// Log in again even when a stored session is still valid.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct FavoritesCommand {
    #[command(subcommand)]
    command: FavoritesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FavoritesSubcommand {
    List,
    Remove { id: String },
}

#[derive(Serialize)]
struct SessionReport<'a> {
    #[serde(flatten)]
    claims: &'a TokenClaims,
    expires_at: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    if let Some(path) = cli.store {
        config = config.with_store_path(path);
    }
    tracing::debug!(api_url = %config.api_url, store = %config.store_path.display(), "config loaded");

    let session = SessionGuard::new(Arc::new(FileStore::new(config.store_path.clone())));
    let api = PlantApi::new(&config, session.clone())?;

    match cli.command {
        Command::Signup(args) => run_signup(&api, args).await,
        Command::Login(args) => run_login(&api, args).await,
        Command::Logout => {
            api.logout().await?;
            println!("Signed out.");
            Ok(())
        }
        Command::Status => run_status(&session).await,
        Command::Whoami => run_whoami(&session).await,
        Command::Validate(args) => run_validate(&args),
        Command::Recents => print_json(&api.recents().await?),
        Command::Favorites(favorites) => run_favorites(&api, favorites).await,
        Command::Identify { image } => print_json(&api.identify(&image).await?),
    }
}

async fn run_signup(api: &PlantApi, args: SignupArgs) -> Result<(), CliError> {
    let submitted = api.signup(&args.name, &args.email, &args.password).await;
    submit_outcome(submitted, "Signup Failed")?;
    println!("Signup successful! You can now log in.");
    Ok(())
}

async fn run_login(api: &PlantApi, args: LoginArgs) -> Result<(), CliError> {
    let attempt = if args.force {
        api.login(&args.email, &args.password).await.map(LoginOutcome::LoggedIn)
    } else {
        api.resume_or_login(&args.email, &args.password).await
    };
    match submit_outcome(attempt, "Login Failed")? {
        LoginOutcome::Resumed(TokenClaims { name: Some(name), .. }) => {
            println!("Already signed in as {name}. Use --force to log in again.");
        }
        LoginOutcome::Resumed(_) => println!("Already signed in. Use --force to log in again."),
        LoginOutcome::LoggedIn(token) => match plant_client::session::decode_claims(token.as_str()) {
            Ok(TokenClaims { name: Some(name), .. }) => println!("Login successful. Welcome, {name}."),
            _ => println!("Login successful."),
        },
    }
    Ok(())
}

/// Print a failed submission as a form report.
fn submit_outcome<T>(outcome: Result<T, ApiError>, title: &'static str) -> Result<T, CliError> {
    let error = match outcome {
        Ok(value) => return Ok(value),
        Err(error) => error,
    };
    let report = match error {
        ApiError::Validation(report) => report,
        ApiError::Http(error) => {
            tracing::warn!(%error, "submit failed");
            FormValidation::accepted().with_general(NETWORK_FAILURE)
        }
        other => FormValidation::accepted().with_general(other.to_string()),
    };
    for (field, reason) in &report.errors {
        eprintln!("{}: {reason}", field.as_str());
    }
    if let Some(general) = &report.general {
        eprintln!("{general}");
    }
    Err(CliError::Submit(title))
}

async fn run_status(session: &SessionGuard) -> Result<(), CliError> {
    let status = session.check().await?;
    let SessionStatus::Valid(claims) = &status else {
        return Err(CliError::LoginRequired(status.login_prompt().unwrap_or("Please sign in.")));
    };
    match expiry_rfc3339(claims.exp) {
        Some(at) => println!("Signed in; session valid until {at}."),
        None => println!("Signed in."),
    }
    Ok(())
}

async fn run_whoami(session: &SessionGuard) -> Result<(), CliError> {
    let status = session.check().await?;
    let SessionStatus::Valid(claims) = &status else {
        return Err(CliError::LoginRequired(status.login_prompt().unwrap_or("Please sign in.")));
    };
    print_json(&SessionReport { claims, expires_at: expiry_rfc3339(claims.exp) })
}

fn run_validate(args: &ValidateArgs) -> Result<(), CliError> {
    let report = validate_form(&FormFields {
        name: args.name.as_deref(),
        email: args.email.as_deref(),
        password: args.password.as_deref(),
    });
    print_json(&report)?;
    if !report.valid {
        return Err(CliError::InvalidForm);
    }
    Ok(())
}

async fn run_favorites(api: &PlantApi, favorites: FavoritesCommand) -> Result<(), CliError> {
    match favorites.command {
        FavoritesSubcommand::List => print_json(&api.favorites().await?),
        FavoritesSubcommand::Remove { id } => {
            api.remove_favorite(&id).await?;
            println!("Removed from favorites.");
            Ok(())
        }
    }
}

fn expiry_rfc3339(exp: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp(exp)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
