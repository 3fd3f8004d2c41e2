//! Storefront CLI - migrations, catalog seeding and order administration.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! sf-cli migrate
//!
//! # Load categories, products and promotions from YAML
//! sf-cli seed catalog.yaml
//!
//! # Move an order through its lifecycle
//! sf-cli order status 42 SHIPPED
//!
//! # Settle an offline payment
//! sf-cli order payment 42 PAID
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Upsert the catalog from a YAML file
//! - `order show|status|payment` - Inspect and transition orders

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use storefront_core::{OrderId, OrderStatus, PaymentStatus};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Storefront operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the YAML catalog
        file: String,
        /// Only validate the file; do not touch the database
        #[arg(long)]
        check: bool,
    },
    /// Inspect and transition orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Print an order
    Show {
        /// Order id
        id: i32,
    },
    /// Move an order to a new status (CONFIRMED, PROCESSING, SHIPPED, DELIVERED, CANCELLED)
    Status {
        /// Order id
        id: i32,
        /// Target status
        status: OrderStatus,
    },
    /// Record a payment outcome (PAID, FAILED, REFUNDED)
    Payment {
        /// Order id
        id: i32,
        /// Target payment status
        status: PaymentStatus,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { file, check } => commands::seed::catalog(&file, check).await?,
        Commands::Order { action } => match action {
            OrderAction::Show { id } => commands::order::show(OrderId::new(id)).await?,
            OrderAction::Status { id, status } => {
                commands::order::set_status(OrderId::new(id), status).await?;
            }
            OrderAction::Payment { id, status } => {
                commands::order::set_payment_status(OrderId::new(id), status).await?;
            }
        },
    }
    Ok(())
}
