//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use whisper_core::config;

mod commands;

#[derive(Parser)]
#[command(name = "whisper")]
#[command(version)]
#[command(about = "Manage locations, users and grants of a web access-control service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root URL of the protected site (overrides config)
    #[arg(long, global = true, env = "WHISPER_SITE_URL", value_name = "URL")]
    site: Option<String>,

    /// On request failure, print the server's raw error page to stdout
    #[arg(long, global = true)]
    error_page: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(flatten)]
    Admin(AdminCommands),
}

#[derive(clap::Subcommand)]
enum AdminCommands {
    /// Show locations with their allowed users, then all users
    Show,

    /// Manage protected locations
    Locations {
        #[command(subcommand)]
        command: LocationCommands,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Allow a user to access a location (creates the user if needed)
    Grant {
        /// Email of the user
        #[arg(value_name = "EMAIL")]
        email: String,
        /// Path of the location
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Withdraw a user's access to a location
    Revoke {
        /// Email of the user
        #[arg(value_name = "EMAIL")]
        email: String,
        /// Path of the location
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Print a message telling users what was shared with them
    Notify {
        /// Everything shared with this user
        #[arg(
            long,
            value_name = "EMAIL",
            conflicts_with = "location",
            required_unless_present = "location"
        )]
        user: Option<String>,
        /// Everyone allowed to access this location
        #[arg(long, value_name = "PATH")]
        location: Option<String>,
    },
}

#[derive(clap::Subcommand)]
enum LocationCommands {
    /// Lists protected locations
    List,
    /// Protects a new location
    Add {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Removes a location and its grants
    Remove {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

#[derive(clap::Subcommand)]
enum UserCommands {
    /// Lists users
    List,
    /// Adds a user
    Add {
        #[arg(value_name = "EMAIL")]
        email: String,
    },
    /// Removes a user and all of its grants
    Remove {
        #[arg(value_name = "EMAIL")]
        email: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the site URL in the config file
    SetSite {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        site,
        error_page,
    } = cli;

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetSite { url } => commands::config::set_site(&url),
        },

        Commands::Admin(command) => {
            let config = config::Config::load().context("load config")?;
            let site_url = config.site_url(site.as_deref())?;
            let mut client = commands::connect(&config, site.as_deref(), error_page).await?;

            match command {
                AdminCommands::Show => {
                    commands::show::show(&client, &site_url);
                    Ok(())
                }
                AdminCommands::Locations { command } => match command {
                    LocationCommands::List => {
                        commands::locations::list(&client);
                        Ok(())
                    }
                    LocationCommands::Add { path } => {
                        commands::locations::add(&mut client, &path).await
                    }
                    LocationCommands::Remove { path } => {
                        commands::locations::remove(&mut client, &path).await
                    }
                },
                AdminCommands::Users { command } => match command {
                    UserCommands::List => {
                        commands::users::list(&client);
                        Ok(())
                    }
                    UserCommands::Add { email } => commands::users::add(&mut client, &email).await,
                    UserCommands::Remove { email } => {
                        commands::users::remove(&mut client, &email).await
                    }
                },
                AdminCommands::Grant { email, path } => {
                    commands::access::grant(&mut client, &email, &path).await
                }
                AdminCommands::Revoke { email, path } => {
                    commands::access::revoke(&mut client, &email, &path).await
                }
                AdminCommands::Notify { user, location } => commands::notify::run(
                    &client,
                    &site_url,
                    user.as_deref(),
                    location.as_deref(),
                ),
            }
        }
    }
}
