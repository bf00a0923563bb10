//! Dam Nation CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! dn-cli migrate
//!
//! # Seed a demo catalog
//! dn-cli seed
//!
//! # Create a user (not an admin unless --admin is given)
//! dn-cli user create -e admin@damnation.shop -p 'a long password' --admin
//!
//! # Grant or revoke admin
//! dn-cli user grant-admin -e staff@damnation.shop
//! dn-cli user revoke-admin -e staff@damnation.shop
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "dn-cli")]
#[command(author, version, about = "Dam Nation shop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog with demo products
    Seed {
        /// Payment provider price id for the demo tee
        #[arg(long, default_value = "price_demo_tee")]
        price_ref: String,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Make the user an admin
        #[arg(long)]
        admin: bool,
    },
    /// Make an existing user an admin
    GrantAdmin {
        #[arg(short, long)]
        email: String,
    },
    /// Remove admin from an existing user
    RevokeAdmin {
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { price_ref } => commands::seed::demo_catalog(&price_ref).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                admin,
            } => {
                commands::user::create(&email, &password, admin).await?;
            }
            UserAction::GrantAdmin { email } => commands::user::set_admin(&email, true).await?,
            UserAction::RevokeAdmin { email } => commands::user::set_admin(&email, false).await?,
        },
    }
    Ok(())
}
