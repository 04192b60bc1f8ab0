use chrono::DateTime;
use clap::Parser;
use entity::account;
use kaiyuan_core::models::RegisterRequest;
use kaiyuan_lib::{
    accounts,
    config::{Command, Config},
    login::Registration,
    permissions::{self, PermissionResolver},
    server::run_server,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, QueryOrder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    let log_level = match &config.command {
        Command::Serve(serve_config) => serve_config.log_level.as_str(),
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match config.command {
        Command::Serve(serve_config) => {
            run_server(serve_config).await?;
        }
        Command::Migrate { database_url } => {
            run_migrations(&database_url).await?;
        }
        Command::CreateUser {
            database_url,
            username,
            email,
            password,
        } => {
            create_user(&database_url, username, email, password).await?;
        }
        Command::ListUsers { database_url } => {
            list_users(&database_url).await?;
        }
        Command::GrantPermission {
            database_url,
            email,
            permission,
        } => {
            grant_permission(&database_url, &email, &permission).await?;
        }
    }

    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    log::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    log::info!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;

    println!("✅ Database migrations completed successfully!");

    Ok(())
}

async fn create_user(
    database_url: &str,
    username: String,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    let db = connect(database_url).await?;

    let request = RegisterRequest {
        username,
        email,
        password,
    };
    let created = Registration::new(&db)
        .register(&request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create user: {}", e.public_message()))?;

    println!("✅ User created successfully!");
    println!("   ID: {}", created.id);
    println!("   Username: {}", created.username);
    println!("   Email: {}", created.email);

    Ok(())
}

async fn list_users(database_url: &str) -> anyhow::Result<()> {
    let db = connect(database_url).await?;

    let users = account::Entity::find()
        .order_by_asc(account::Column::Id)
        .all(&db)
        .await?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    let resolver = PermissionResolver::new(&db);

    println!("Users:");
    println!(
        "{:<5} {:<20} {:<30} {:<10} {:<20} {}",
        "ID", "Username", "Email", "Login", "Created At", "Permissions"
    );
    println!("{}", "-".repeat(110));
    for user in users {
        let login = match (&user.uid, &user.password_hash) {
            (Some(_), Some(_)) => "both",
            (Some(_), None) => "oauth",
            (None, _) => "password",
        };
        let created_at = DateTime::from_timestamp(user.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let perms = resolver.resolve_for(user.id).await?;
        println!(
            "{:<5} {:<20} {:<30} {:<10} {:<20} {}",
            user.id,
            user.username,
            user.email.as_deref().unwrap_or("-"),
            login,
            created_at,
            perms.join(",")
        );
    }

    Ok(())
}

async fn grant_permission(database_url: &str, email: &str, permission: &str) -> anyhow::Result<()> {
    if permission.trim().is_empty() {
        anyhow::bail!("Permission name must not be empty");
    }

    let db = connect(database_url).await?;

    let Some(user) = accounts::find_by_email(&db, email).await? else {
        anyhow::bail!("No account with email '{}'", email.trim());
    };

    permissions::grant(&db, user.id, permission).await?;

    println!(
        "✅ Granted '{}' to {} (ID: {})",
        permission.trim(),
        user.username,
        user.id
    );

    Ok(())
}
