//! Utility to create a user from the command line
//!
//! Usage: add_user <login> [--admin]

use ration::config::Config;
use ration::models::User;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let login = match args.next() {
        Some(login) if !login.trim().is_empty() => login.trim().to_string(),
        _ => {
            eprintln!("Usage: add_user <login> [--admin]");
            std::process::exit(2);
        }
    };
    let is_admin = args.any(|a| a == "--admin");

    let config = Config::from_env();
    println!("Database path: {}", config.database_path.display());
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = ration::db::Database::new(&config.database_path)?;

    // Run migrations
    database.with_conn(|conn| {
        ration::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    database.with_conn(|conn| {
        if let Some(existing) = User::get_by_login(conn, &login)? {
            println!("User '{}' already exists with id {}", existing.login, existing.id);
            return Ok(());
        }

        let user = User::create(conn, &login, is_admin)?;
        println!("User created:");
        println!("  ID: {}", user.id);
        println!("  Login: {}", user.login);
        println!("  Admin: {}", user.is_admin);
        Ok(())
    })?;

    Ok(())
}
