use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use std::fs;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use peekachoo_admin::client::AdminClient;
use peekachoo_admin::dashboard::{DashboardView, PaymentsView, SyncStatus, ViewState};
use peekachoo_admin::models::{SortOrder, UserQuery, UsersListing};
use peekachoo_admin::sync::PokemonSync;

const SESSION_FILE: &str = ".peekachoo_admin_session";

#[derive(Parser)]
#[command(name = "peekachoo-admin-cli")]
#[command(about = "Terminal dashboard for the Peekachoo admin panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, env = "ADMIN_PANEL_URL", default_value = "http://localhost:3001")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show whether the saved session is still accepted
    Status,
    Users {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 30)]
        page_size: u32,
        #[arg(long, default_value = "total_spent")]
        sort_by: String,
        #[arg(long, default_value = "desc")]
        order: String,
    },
    User {
        #[arg(short, long)]
        id: String,
    },
    Count,
    Purchases {
        #[arg(short, long)]
        id: String,
    },
    /// Permanently delete a user and all their data
    Delete {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        password: String,
        /// Must read "I agree to delete"
        #[arg(long)]
        confirm: String,
    },
    /// Payment log, 50 per page, with revenue totals
    Payments {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Refresh the Pokemon catalog in batches (Ctrl-C stops between batches)
    SyncPokemon {
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    SyncPayments,
    /// Print the top of the user list every few seconds until Ctrl-C
    Watch {
        #[arg(short, long, default_value_t = 10)]
        interval: u64,
        #[arg(short, long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let saved = fs::read_to_string(SESSION_FILE).unwrap_or_default();
    let mut client = AdminClient::new(&cli.url)?.with_session(saved.trim());

    match cli.command {
        Commands::Login { password } => {
            let mut view = DashboardView::new(client);
            view.login(&password).await;
            match view.state() {
                ViewState::Authenticated => {
                    let cookie = view.api().session_cookie().unwrap_or_default();
                    fs::write(SESSION_FILE, cookie)
                        .with_context(|| format!("failed to write {SESSION_FILE}"))?;
                    println!("Logged in. Session saved to {SESSION_FILE}");
                    if let Some(listing) = view.listing() {
                        print_users(listing);
                    }
                }
                ViewState::Unauthenticated { error } => {
                    bail!("Login failed: {}", error.as_deref().unwrap_or("Login failed"))
                }
                ViewState::Loading => bail!("Login failed"),
            }
        }
        Commands::Logout => {
            if let Err(err) = client.logout().await {
                tracing::warn!(error = %err, "server-side logout failed");
            }
            let _ = fs::remove_file(SESSION_FILE);
            println!("Logged out (session removed).");
        }
        Commands::Status => {
            let authenticated = client.check_session().await?;
            println!("authenticated: {authenticated}");
        }
        Commands::Users {
            search,
            page,
            page_size,
            sort_by,
            order,
        } => {
            let query = UserQuery {
                search,
                page,
                page_size,
                sort_by,
                sort_order: SortOrder::parse_lenient(&order),
            };
            let listing = client.users(&query).await?;
            print_users(&listing);
        }
        Commands::User { id } => {
            let user = client.user(&id).await?;
            println!("id:           {}", user.id);
            println!("username:     {}", user.username);
            println!("display name: {}", user.display_name.as_deref().unwrap_or("-"));
            println!("created:      {}", local_time(&user.created_at));
            println!("updated:      {}", local_time(&user.updated_at));
        }
        Commands::Count => {
            println!("{}", client.user_count().await?);
        }
        Commands::Purchases { id } => {
            let purchases = client.purchases(&id).await?;
            if purchases.is_empty() {
                println!("No purchases.");
            }
            for purchase in purchases {
                println!(
                    "{:<20} {:>6} shields  S${:>8.2}  {:<10} {}",
                    local_time(&purchase.created_at),
                    purchase.shields_purchased.unwrap_or(purchase.quantity),
                    purchase.amount_sgd,
                    purchase.status,
                    purchase.razorpay_payment_id.as_deref().unwrap_or("-"),
                );
            }
        }
        Commands::Delete {
            id,
            password,
            confirm,
        } => {
            let user = client.user(&id).await?;
            let mut view = DashboardView::new(client);
            view.check_auth().await;
            view.open_delete(user.id, user.username.clone());
            if view.confirm_delete(&password, &confirm).await {
                println!("Deleted user {}.", user.username);
            } else {
                let reason = view
                    .delete_modal()
                    .and_then(|modal| modal.error.clone())
                    .unwrap_or_else(|| "Failed to delete user".to_string());
                bail!(reason);
            }
        }
        Commands::Payments {
            search,
            status,
            page,
        } => {
            let mut view = PaymentsView::new(client)
                .with_search(search)
                .with_status(&status)
                .at_page(page);
            view.check_auth().await;
            if !view.is_authenticated() {
                bail!("Not logged in; run `login` first");
            }
            if let Some(error) = view.load_error() {
                bail!("Failed to fetch payments: {error}");
            }
            for payment in view.payments() {
                println!(
                    "{:<20} {:<16} {:>4}  S${:>8.2}  {:<10} {}",
                    local_time(&payment.created_at),
                    payment.username,
                    payment.quantity,
                    payment.amount_sgd,
                    payment.status,
                    payment.razorpay_payment_id.as_deref().unwrap_or("-"),
                );
            }
            println!(
                "{} payments ({}), page {}/{}, revenue S${:.2}",
                view.total_count(),
                view.status(),
                view.page(),
                view.total_pages().max(1),
                view.total_revenue()
            );
        }
        Commands::SyncPokemon { offset } => {
            let cancel = cancel_on_ctrl_c();
            let result = PokemonSync::default()
                .starting_at(offset)
                .run(&client, |progress| println!("{progress}"), &cancel)
                .await;
            match result {
                Ok(outcome) => println!("{outcome}"),
                Err(err) => bail!(
                    "Sync failed: {err} (resume with --offset {})",
                    err.resume_offset()
                ),
            }
        }
        Commands::SyncPayments => {
            let mut view = DashboardView::new(client);
            view.sync_payments().await;
            let state = view.payment_sync();
            if state.status == SyncStatus::Error {
                bail!(state.message.clone());
            }
            println!("{}", state.message);
        }
        Commands::Watch { interval, search } => {
            let shutdown = cancel_on_ctrl_c();
            let mut view = DashboardView::new(client);
            view.check_auth().await;
            if !view.is_authenticated() {
                bail!("Not logged in; run `login` first");
            }
            if !search.is_empty() {
                view.search(&search).await;
            }
            if let Some(listing) = view.listing() {
                print_users(listing);
            }
            view.poll(Duration::from_secs(interval.max(1)), &shutdown, |view| {
                match (view.listing(), view.load_error()) {
                    (_, Some(error)) => eprintln!("refresh failed: {error}"),
                    (Some(listing), None) => print_users(listing),
                    (None, None) => {}
                }
            })
            .await;
            if !view.is_authenticated() {
                bail!("Session expired; run `login` again");
            }
        }
    }

    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the current request...");
            trigger.cancel();
        }
    });
    token
}

fn local_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn print_users(listing: &UsersListing) {
    println!(
        "{:<24} {:<20} {:>7} {:>7} {:>10} {:>10}  {}",
        "id", "username", "shields", "bought", "spent", "month", "joined"
    );
    for user in &listing.users {
        println!(
            "{:<24} {:<20} {:>7} {:>7} {:>10.2} {:>10.2}  {}",
            user.id,
            user.display_name.as_deref().unwrap_or(&user.username),
            user.shields,
            user.total_shields,
            user.total_spent,
            user.monthly_spent,
            local_time(&user.created_at),
        );
    }
    println!(
        "page {}/{} of {} users | shields sold {} | revenue S${:.2}",
        listing.page,
        listing.total_pages.max(1),
        listing.total_count,
        listing.global_stats.total_shields,
        listing.global_stats.total_revenue
    );
}
