use anyhow::{Context, Result};
use chrono::Utc;
use memberlink::cli::{Args, ConfigDiscovery, ExecutionMode};
use memberlink::{ClientConfig, MemberClient, SessionManager};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    // Configuration decides the log filter, so it is loaded before logging exists
    let config = ConfigDiscovery::load(args.config.as_deref())?;
    init_logging(&config, args.verbose);
    debug!("Using API at {}", config.api.base_url);

    match mode {
        ExecutionMode::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        mode => run_client_command(&config, mode).await,
    }
}

fn init_logging(config: &ClientConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("memberlink=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_client_command(config: &ClientConfig, mode: ExecutionMode) -> Result<()> {
    let client = MemberClient::new(config).await?;
    let session = client.session();

    let result = execute(&session, mode).await;

    // Shut down even after a failed command so the cookie state is saved
    client.shutdown().await?;
    result
}

async fn execute(session: &SessionManager, mode: ExecutionMode) -> Result<()> {
    match mode {
        ExecutionMode::Login(credentials) => {
            let member = session.login(&credentials).await?;
            println!("✅ Logged in as {} ({})", member.display_name(), member.member_number);
        }
        ExecutionMode::Logout => {
            session.logout().await;
            println!("Logged out");
        }
        ExecutionMode::WhoAmI => match session.identity().member() {
            Some(member) => {
                println!("👤 {} ({})", member.display_name(), member.member_number);
                println!("  Status: {}", member.status);
                println!("  Email:  {}", member.email);
                println!("  Phone:  {}", member.phone);
            }
            None => println!("Not logged in"),
        },
        ExecutionMode::Refresh => {
            ensure_logged_in(session)?;
            session.refresh().await;
            match session.identity().member() {
                Some(member) => println!("Refreshed {}", member.display_name()),
                None => println!("Session expired, please log in again"),
            }
        }
        ExecutionMode::Overview => {
            ensure_logged_in(session)?;
            let overview = session.membership_overview().await?;
            match (&overview.subscription, &overview.plan) {
                (Some(subscription), plan) => {
                    let plan_name = plan
                        .as_ref()
                        .map(|plan| plan.name.as_str())
                        .unwrap_or("Unknown plan");
                    println!("📋 {} until {}", plan_name, subscription.end_date);
                    if let Some(days) = subscription.days_remaining(Utc::now().date_naive()) {
                        println!("  {} days remaining", days.max(0));
                    }
                }
                (None, _) => println!("No active subscription"),
            }
        }
        ExecutionMode::Subscriptions => {
            ensure_logged_in(session)?;
            print_json(&session.subscriptions().await?)?;
        }
        ExecutionMode::Payments => {
            ensure_logged_in(session)?;
            print_json(&session.payments().await?)?;
        }
        ExecutionMode::Invoices => {
            ensure_logged_in(session)?;
            print_json(&session.invoices().await?)?;
        }
        ExecutionMode::CheckIns => {
            ensure_logged_in(session)?;
            print_json(&session.check_ins().await?)?;
        }
        ExecutionMode::Offers => {
            ensure_logged_in(session)?;
            print_json(&session.offers().await?)?;
        }
        ExecutionMode::ShowConfig | ExecutionMode::InitConfig => {
            info!("Command does not need a session");
        }
    }
    Ok(())
}

fn ensure_logged_in(session: &SessionManager) -> Result<()> {
    if session.is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!("Not logged in. Run 'memberlink login' first.")
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to format response")?;
    println!("{}", output);
    Ok(())
}
