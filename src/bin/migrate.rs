use anyhow::{anyhow, Result};
use quiz_poll_bot::config::Config;
use quiz_poll_bot::database::connection::DatabaseManager;
use quiz_poll_bot::database::models::user::UserRecord;
use std::path::Path;

enum Action {
    Up,
    Check,
    Help,
}

impl Action {
    fn parse(arg: Option<&str>) -> Option<Self> {
        match arg.unwrap_or("up") {
            "migrate" | "up" => Some(Action::Up),
            "check" => Some(Action::Check),
            "help" | "--help" | "-h" => Some(Action::Help),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let arg = std::env::args().nth(1);
    let Some(action) = Action::parse(arg.as_deref()) else {
        eprintln!("Unknown command: {}", arg.unwrap_or_default());
        print_usage();
        std::process::exit(1);
    };

    match action {
        Action::Up => migrate_up().await,
        Action::Check => check_schema().await,
        Action::Help => {
            print_usage();
            Ok(())
        }
    }
}

async fn connect() -> Result<DatabaseManager> {
    let database_url = Config::database_url_from_env();
    println!("📊 Stats database: {}", display_url(&database_url));
    DatabaseManager::new(&database_url)
        .await
        .map_err(|e| anyhow!("Failed to open stats database: {}", e))
}

async fn migrate_up() -> Result<()> {
    println!("🧠 Quiz Poll Bot: applying migrations");
    let db = connect().await?;

    if let Err(e) = db.run_migrations().await {
        eprintln!("❌ Migration failed: {e}");
        std::process::exit(1);
    }
    println!("✅ Schema is up to date");
    Ok(())
}

async fn check_schema() -> Result<()> {
    println!("🔍 Quiz Poll Bot: checking schema");
    let db = connect().await?;

    let tables = match db.table_names().await {
        Ok(tables) => tables,
        Err(e) => {
            println!("⚠️  Could not read the schema: {e}");
            return Ok(());
        }
    };
    if !tables.iter().any(|t| t == "users") {
        println!("⚠️  No users table yet. Run `migrate up` first.");
        return Ok(());
    }

    let users = UserRecord::count(&db.pool).await?;
    println!("✅ users table present, {users} known user(s)");
    println!("📋 Tables: {}", tables.join(", "));
    Ok(())
}

/// Only the file name of a SQLite path is printed.
fn display_url(url: &str) -> String {
    url.strip_prefix("sqlite:")
        .and_then(|path| Path::new(path.trim_start_matches("//")).file_name())
        .map(|name| format!("sqlite:.../{}", name.to_string_lossy()))
        .unwrap_or_else(|| url.to_string())
}

fn print_usage() {
    println!("Usage: migrate [up|check|help]");
    println!();
    println!("  up, migrate   apply pending migrations (default)");
    println!("  check         verify the users table exists and count known users");
    println!("  help          show this message");
    println!();
    println!("DATABASE_URL selects the database (default: sqlite:./data/quizbot.db)");
}
