//! Microsoft To Do sign-in CLI
//!
//! Drives the PKCE sign-in flow from a terminal and manages the cached tokens:
//! - `login`: open the authorization URL, paste the redirect back, persist tokens
//! - `status`: show whether tokens are cached and how long they stay valid
//! - `token`: print a bearer header, refreshing first if needed
//! - `logout`: forget the cached tokens
//!
//! Run with: cargo run -p mstodo-login -- login

mod config;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use console::style;
use mstodo_auth::auth::{AuthCallback, FileTokenStore};
use mstodo_auth::{OAuthConfig, Session, SessionError, TokenLifecycleManager};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "mstodo-login",
    version,
    about = "Sign in to Microsoft To Do and manage cached tokens"
)]
struct Cli {
    /// Token file (defaults to the platform config directory)
    #[arg(long, global = true, env = "MSTODO_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in through the browser
    Login {
        /// Print the URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show cached credential state
    Status,
    /// Print an Authorization header, refreshing if needed
    Token,
    /// Forget cached credentials
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter())
        .with_writer(std::io::stderr)
        .init();

    if config::no_color() {
        console::set_colors_enabled(false);
    }

    let cli = Cli::parse();
    let store = cli
        .token_file
        .map(FileTokenStore::with_path)
        .unwrap_or_default();
    let manager = TokenLifecycleManager::new(OAuthConfig::from_env());
    let session = Session::load(manager, store)
        .await
        .context("Failed to read cached tokens")?;

    match cli.command {
        Command::Login { no_browser } => {
            login(&session, !no_browser && config::auto_open_browser()).await
        }
        Command::Status => status(&session).await,
        Command::Token => token(&session).await,
        Command::Logout => {
            session.sign_out().await?;
            println!("{} Signed out", style("✓").green());
            Ok(())
        }
    }
}

async fn login(session: &Session, open_browser: bool) -> anyhow::Result<()> {
    let url = session.begin_authorization();

    println!("{}", style("Microsoft To Do sign-in").bold());
    println!();
    println!("  1. Open the following URL and sign in");
    println!("  2. Your browser is redirected to {}", session.manager().config().redirect_uri);
    println!("  3. Copy that redirect URL (or just its code) and paste it below");
    println!();
    println!("  {url}");
    println!();

    if open_browser {
        if let Err(e) = launch_browser(&url) {
            tracing::debug!("Could not open browser: {e}");
            println!("(Could not open browser automatically - please open the URL manually)");
        } else {
            println!("(Opening browser...)");
        }
    }

    let input = tokio::task::spawn_blocking(prompt_for_redirect).await??;
    if input.is_empty() || input.eq_ignore_ascii_case("cancel") {
        session.manager().abandon_authorization();
        bail!("Sign-in cancelled");
    }

    let callback = AuthCallback::from_user_input(&input)?;
    session.complete_authorization(callback).await?;

    println!();
    println!("{} Signed in. Tokens cached at:", style("✓").green());
    println!("  {}", session.store().path().display());
    Ok(())
}

async fn status(session: &Session) -> anyhow::Result<()> {
    let tokens = session.tokens().await;
    if tokens.is_empty() {
        println!("{} Not signed in", style("✗").red());
        return Ok(());
    }

    match tokens.remaining_validity() {
        Some(remaining) => println!(
            "{} Access token valid for {}",
            style("✓").green(),
            config::format_remaining(remaining.as_secs())
        ),
        None => println!("{} Access token expired", style("!").yellow()),
    }
    let refresh = if tokens.refresh_token().is_some() {
        "present"
    } else {
        "missing"
    };
    println!("  Refresh token: {refresh}");
    println!("  Token file:    {}", session.store().path().display());
    Ok(())
}

async fn token(session: &Session) -> anyhow::Result<()> {
    match session.authorization_header().await {
        Ok(header) => {
            println!("Authorization: {header}");
            Ok(())
        }
        Err(SessionError::Auth(e)) if e.requires_sign_in() => {
            bail!("{e}. Run `mstodo-login login` to sign in again")
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the pasted redirect URL or code from stdin
fn prompt_for_redirect() -> std::io::Result<String> {
    print!("Redirect URL or code (or 'cancel' to abort): ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Open URL in default browser
fn launch_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .spawn()?;
    }

    Ok(())
}
