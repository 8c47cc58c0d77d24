//! Subcommands. Each maps onto one `courier-sync` operation.

use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use courier_core::{
    Id, Mutation, Order, Position, RoleKind, Session, ROLE_ID_CUSTOMER, ROLE_ID_DRIVER,
    ROLE_ID_MERCHANT,
};
use courier_store::ThemePreference;
use courier_sync::{AuthOutcome, ClientError, CourierClient, ProfileContext, RoomScope};

pub type CommandResult = Result<(), Box<dyn Error>>;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(author, version, about = "Courier client for merchants and drivers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Sign in and remember the session
    Login { identifier: String, password: String },
    /// Create an account and sign in
    Register {
        name: String,
        identifier: String,
        password: String,
        #[arg(value_enum)]
        role: RoleArg,
    },
    /// Forget the saved session
    Logout,
    /// Show the signed-in account with its store or vehicle
    Whoami,
    /// List the store's orders
    Orders,
    /// Accept a pending order
    Accept { order_id: Id },
    /// Cancel an order that has not finished
    Cancel { order_id: Id },
    /// Print notifications until Ctrl-C
    Watch,
    /// Post a fixed position until Ctrl-C (drivers only)
    Report {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Show or change the color theme
    Theme {
        #[arg(value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    #[value(alias = "restaurant")]
    Merchant,
    Driver,
    Customer,
}

impl RoleArg {
    pub fn role_id(self) -> Id {
        match self {
            RoleArg::Merchant => ROLE_ID_MERCHANT,
            RoleArg::Driver => ROLE_ID_DRIVER,
            RoleArg::Customer => ROLE_ID_CUSTOMER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for ThemePreference {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Light => ThemePreference::Light,
            ThemeArg::Dark => ThemePreference::Dark,
            ThemeArg::System => ThemePreference::System,
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

pub async fn run(client: &CourierClient, command: Command) -> CommandResult {
    debug!(?command, "Running command");
    match command {
        Command::Login {
            identifier,
            password,
        } => report_auth(client.session().login(&identifier, &password).await),
        Command::Register {
            name,
            identifier,
            password,
            role,
        } => {
            let outcome = client
                .session()
                .register(&name, &identifier, &password, role.role_id())
                .await;
            if let Some(next) = outcome.onboarding() {
                println!("Next step: {next:?}");
            }
            report_auth(outcome)
        }
        Command::Logout => {
            client.session().logout().await;
            println!("Signed out");
            Ok(())
        }
        Command::Whoami => whoami(client).await,
        Command::Orders => list_orders(client).await,
        Command::Accept { order_id } => transition(client, order_id, true).await,
        Command::Cancel { order_id } => transition(client, order_id, false).await,
        Command::Watch => watch(client).await,
        Command::Report {
            latitude,
            longitude,
        } => {
            report_location(
                client,
                Position {
                    latitude,
                    longitude,
                },
            )
            .await
        }
        Command::Theme { theme: None } => {
            println!("{}", client.theme().await?);
            Ok(())
        }
        Command::Theme { theme: Some(theme) } => {
            let theme = ThemePreference::from(theme);
            client.set_theme(theme).await?;
            println!("Theme set to {theme}");
            Ok(())
        }
    }
}

fn report_auth(outcome: AuthOutcome) -> CommandResult {
    match outcome {
        AuthOutcome::Success(session) => {
            println!(
                "Signed in as {} ({:?})",
                session.user.name,
                session.role_kind()
            );
            Ok(())
        }
        AuthOutcome::Failure { kind, message } => {
            Err(format!("Sign-in failed ({kind}): {message}").into())
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require_session(client: &CourierClient) -> Result<Session, ClientError> {
    client
        .session()
        .current()
        .ok_or(ClientError::NotAuthenticated)
}

/// Profile context with its first load finished.
async fn loaded_profile(client: &CourierClient) -> Result<ProfileContext, Box<dyn Error>> {
    let ctx = client.profile_context();
    let state = ctx.subscribe().wait_for(|s| !s.loading).await?.clone();
    if let Some(err) = state.error {
        return Err(err.into());
    }
    Ok(ctx)
}

async fn store_id(client: &CourierClient) -> Result<Id, Box<dyn Error>> {
    let session = require_session(client)?;
    if let Some(id) = session.store_id() {
        return Ok(id);
    }
    loaded_profile(client)
        .await?
        .store_id()
        .ok_or_else(|| "This account has no store yet".into())
}

fn print_order(order: &Order) {
    let items: Vec<String> = order
        .order
        .iter()
        .map(|item| {
            format!(
                "{}x {}",
                item.quantity,
                item.name.as_deref().unwrap_or("item")
            )
        })
        .collect();
    println!(
        "#{:<6} {:<11} {:>10}  {}",
        order.id,
        order.status.as_str(),
        order.total_price.to_decimal_string(),
        items.join(", ")
    );
}

// =============================================================================
// Commands
// =============================================================================

async fn whoami(client: &CourierClient) -> CommandResult {
    let session = require_session(client)?;
    println!(
        "{} <{}> id={} role={:?}",
        session.user.name,
        session.user.identifier,
        session.user_id(),
        session.role_kind()
    );

    let ctx = loaded_profile(client).await?;
    if let Some(store) = ctx.store().store {
        println!(
            "store #{} {} ({}-{})",
            store.id,
            store.name,
            store.start_time.as_deref().unwrap_or("?"),
            store.end_time.as_deref().unwrap_or("?")
        );
    }
    if let Some(driver) = ctx.driver().driver {
        println!(
            "driver #{} {} {} {} available={}",
            driver.id,
            driver.vehicle_color,
            driver.vehicle_type,
            driver.vehicle_license_plate,
            driver.is_available
        );
    }
    Ok(())
}

async fn list_orders(client: &CourierClient) -> CommandResult {
    let store_id = store_id(client).await?;
    let orders = client.orders().list(store_id).await?;
    if orders.is_empty() {
        println!("No orders");
    }
    orders.iter().for_each(print_order);
    Ok(())
}

async fn transition(client: &CourierClient, order_id: Id, accept: bool) -> CommandResult {
    let store_id = store_id(client).await?;
    let order = client
        .orders()
        .list(store_id)
        .await?
        .into_iter()
        .find(|o| o.id == order_id)
        .ok_or_else(|| format!("Order {order_id} not found in store {store_id}"))?;

    let updated = if accept {
        client.registry().settle(
            &Mutation::AcceptOrder { store_id, order_id },
            client.orders().accept(&order).await,
        )?
    } else {
        client.registry().settle(
            &Mutation::CancelOrder { store_id, order_id },
            client.orders().cancel(&order).await,
        )?
    };
    print_order(&updated);
    Ok(())
}

async fn watch(client: &CourierClient) -> CommandResult {
    let session = require_session(client)?;
    let ctx = loaded_profile(client).await?;
    let store_id = session.store_id().or_else(|| ctx.store_id());
    let scope = RoomScope::for_role(session.role_kind(), store_id, ctx.driver_id())
        .ok_or("Nothing to watch for this account")?;

    let channel = client.notifications(scope)?;
    let mut events = channel.subscribe();
    println!("Watching {} {} (Ctrl-C to stop)", scope.join_event(), scope.id());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!(
                    "[{}] {} (unread: {})",
                    event.name(),
                    event.payload(),
                    channel.unread()
                ),
                Err(RecvError::Lagged(missed)) => println!("... {missed} events skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    channel.disconnect().await;
    Ok(())
}

async fn report_location(client: &CourierClient, position: Position) -> CommandResult {
    let session = require_session(client)?;
    if session.role_kind() != RoleKind::Driver {
        return Err(ClientError::NotPermitted("Only drivers report a location".into()).into());
    }
    let driver_id = loaded_profile(client)
        .await?
        .driver_id()
        .ok_or("Create a driver profile first")?;

    let reporter = client.start_location_reporting(driver_id, Arc::new(position))?;
    println!(
        "Reporting {},{} every {:?} (Ctrl-C to stop)",
        position.latitude,
        position.longitude,
        client.config().location.interval()
    );
    tokio::signal::ctrl_c().await?;

    let sent = reporter.reports_sent();
    reporter.stop().await;
    println!("Sent {sent} updates");
    Ok(())
}
