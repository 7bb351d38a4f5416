//! Grocery Squad CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema and session-store migrations
//! gs-cli migrate
//!
//! # Create an account
//! gs-cli user create -u alice -e alice@example.com -p 'correct horse'
//!
//! # Mark an account's email as confirmed
//! gs-cli user confirm -e alice@example.com
//!
//! # Issue a confirmation token, then inspect it
//! gs-cli token issue -e alice@example.com
//! gs-cli token verify <token>
//! ```
//!
//! All commands read the same environment as the server (`.env` included).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gs-cli")]
#[command(author, version, about = "Grocery Squad CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations (schema and session store)
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Issue or inspect email confirmation tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a new account
    Create {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },
    /// Mark an account's email address as confirmed
    Confirm {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print a confirmation token and link for an email address
    Issue {
        /// Email address to sign
        #[arg(short, long)]
        email: String,
    },
    /// Check a token's signature and age, and print the address it carries
    Verify {
        /// Token as found in the confirmation link
        token: String,
    },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gs_cli=info,grocery_squad_server=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
            } => {
                commands::user::create(&username, &email, &password).await?;
            }
            UserAction::Confirm { email } => commands::user::confirm(&email).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Issue { email } => commands::token::issue(&email)?,
            TokenAction::Verify { token } => commands::token::verify(&token)?,
        },
    }
    Ok(())
}
