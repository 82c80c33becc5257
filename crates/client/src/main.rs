use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};

use usermgr_auth::{GuardDecision, Permission, PermissionSet, Requirement, guard};
use usermgr_client::config::{ENV_API_URL, ENV_SESSION_FILE, parse_timeout};
use usermgr_client::{ApiError, ClientConfig, ConsoleClient, ReconcileError};
use usermgr_core::{RoleId, UserId};

/// Command-line console for the user manager API.
#[derive(Debug, Parser)]
#[command(name = "usermgr", version)]
struct Cli {
    /// API base URL (e.g. http://localhost:8080/api/v1).
    #[arg(long, global = true, env = ENV_API_URL)]
    api_url: Option<String>,

    /// Where the session token is kept between runs.
    #[arg(long, global = true, env = ENV_SESSION_FILE)]
    session_file: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<String>,

    /// Human-readable logs instead of JSON.
    #[arg(long, global = true)]
    pretty_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session.
    Login {
        #[arg(long, short)]
        username: String,
        #[arg(long, short, env = "USERMGR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out of this session (always clears the local session).
    Logout,
    /// Sign out of every session of this user.
    LogoutAll,
    /// Sign out of every other session of this user.
    LogoutOthers,
    /// Show the signed-in identity.
    Whoami,
    #[command(subcommand)]
    Users(UsersCommand),
    #[command(subcommand)]
    Roles(RolesCommand),
}

#[derive(Debug, Subcommand)]
enum UsersCommand {
    List,
    Show { id: UserId },
    Roles { id: UserId },
    Permissions { id: UserId },
    AssignRole { user: UserId, role: RoleId },
    RemoveRole { user: UserId, role: RoleId },
    Delete { id: UserId },
}

#[derive(Debug, Subcommand)]
enum RolesCommand {
    List,
    Show { id: RoleId },
    /// Converge the role to exactly these permissions.
    SetPermissions {
        id: RoleId,
        #[arg(value_parser = parse_permission)]
        permissions: Vec<Permission>,
    },
    Delete { id: RoleId },
}

fn parse_permission(raw: &str) -> Result<Permission, String> {
    Permission::parse(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.pretty_logs {
        usermgr_observability::init_pretty();
    } else {
        usermgr_observability::init();
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url).context("invalid --api-url")?;
    }
    if let Some(path) = cli.session_file {
        config = config.with_session_file(path);
    }
    if let Some(raw) = &cli.timeout {
        config = config.with_timeout(parse_timeout(raw)?);
    }

    let client = ConsoleClient::from_config(&config).context("failed to build client")?;

    match cli.command {
        Command::Login { username, password } => {
            if !client.store.login(&username, &password).await {
                bail!("login failed: invalid credentials or backend unreachable");
            }
            println!("logged in as {username}");
        }
        Command::Logout => {
            client.store.logout().await;
            println!("logged out");
        }
        Command::LogoutAll => {
            require(&client, Requirement::Authenticated).await?;
            client.store.logout_all().await.map_err(explain)?;
            println!("all sessions closed");
        }
        Command::LogoutOthers => {
            require(&client, Requirement::Authenticated).await?;
            client.store.logout_others().await.map_err(explain)?;
            println!("other sessions closed");
        }
        Command::Whoami => {
            require(&client, Requirement::Authenticated).await?;
            let session = client.store.session().await.context("no session")?;
            println!("{}", serde_json::to_string_pretty(&session.identity)?);
        }
        Command::Users(cmd) => users(&client, cmd).await?,
        Command::Roles(cmd) => roles(&client, cmd).await?,
    }

    Ok(())
}

async fn users(client: &ConsoleClient, cmd: UsersCommand) -> anyhow::Result<()> {
    match cmd {
        UsersCommand::List => {
            require(client, Requirement::AllOf(vec![Permission::USER_READ])).await?;
            for user in client.users.list().await.map_err(explain)? {
                println!("{}\t{}\t{}", user.id, user.login, user.display_name());
            }
        }
        UsersCommand::Show { id } => {
            require(client, Requirement::AllOf(vec![Permission::USER_READ])).await?;
            let user = client.users.get(id).await.map_err(explain)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UsersCommand::Roles { id } => {
            require(client, Requirement::AllOf(vec![Permission::USER_READ])).await?;
            for role in client.users.roles(id).await.map_err(explain)? {
                println!("{}\t{}", role.id, role.name);
            }
        }
        UsersCommand::Permissions { id } => {
            require(client, Requirement::AllOf(vec![Permission::USER_READ])).await?;
            for perm in client.users.permissions(id).await.map_err(explain)? {
                println!("{perm}");
            }
        }
        UsersCommand::AssignRole { user, role } => {
            require(client, Requirement::AllOf(vec![Permission::USER_UPDATE])).await?;
            client.users.assign_role(user, role).await.map_err(explain)?;
            println!("role {role} assigned to {user}");
        }
        UsersCommand::RemoveRole { user, role } => {
            require(client, Requirement::AllOf(vec![Permission::USER_UPDATE])).await?;
            client.users.remove_role(user, role).await.map_err(explain)?;
            println!("role {role} removed from {user}");
        }
        UsersCommand::Delete { id } => {
            require(client, Requirement::AllOf(vec![Permission::USER_DELETE])).await?;
            client.users.delete(id).await.map_err(explain)?;
            println!("user {id} deleted");
        }
    }
    Ok(())
}

async fn roles(client: &ConsoleClient, cmd: RolesCommand) -> anyhow::Result<()> {
    match cmd {
        RolesCommand::List => {
            require(client, Requirement::AllOf(vec![Permission::ROLE_READ])).await?;
            for role in client.roles.list().await.map_err(explain)? {
                let perms: Vec<&str> = role.permissions.iter().map(Permission::as_str).collect();
                println!("{}\t{}\t{}", role.id, role.name, perms.join(","));
            }
        }
        RolesCommand::Show { id } => {
            require(client, Requirement::AllOf(vec![Permission::ROLE_READ])).await?;
            let role = client.roles.get(id).await.map_err(explain)?;
            println!("{}", serde_json::to_string_pretty(&role)?);
        }
        RolesCommand::SetPermissions { id, permissions } => {
            require(client, Requirement::AllOf(vec![Permission::ROLE_UPDATE])).await?;
            let desired: PermissionSet = permissions.into_iter().collect();
            match client.roles.set_permissions(id, &desired).await {
                Ok(report) if report.is_noop() => println!("role {id} already up to date"),
                Ok(report) => println!(
                    "role {id} updated: +{} -{}",
                    report.added.len(),
                    report.removed.len()
                ),
                Err(ReconcileError::Api(err)) => return Err(explain(err)),
                Err(err) => bail!("{err}; run the command again to retry the failed changes"),
            }
        }
        RolesCommand::Delete { id } => {
            require(client, Requirement::AllOf(vec![Permission::ROLE_DELETE])).await?;
            client.roles.delete(id).await.map_err(explain)?;
            println!("role {id} deleted");
        }
    }
    Ok(())
}

async fn require(client: &ConsoleClient, requirement: Requirement) -> anyhow::Result<()> {
    let session = client.store.session().await;
    match guard(session.as_ref(), &requirement, Utc::now()) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::RedirectToLogin => bail!("not logged in; run `usermgr login` first"),
        GuardDecision::Forbidden(perm) => bail!("missing permission {perm}"),
    }
}

fn explain(err: ApiError) -> anyhow::Error {
    if err.requires_login() {
        anyhow::anyhow!("{err}; run `usermgr login` again")
    } else {
        anyhow::Error::new(err)
    }
}
