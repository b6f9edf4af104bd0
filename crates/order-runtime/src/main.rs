//! # MTOGO Order Runtime
//!
//! Entry point for the order and shopping-cart services.
//!
//! ```text
//! order-runtime --role cart                  # serve cart requests
//! order-runtime --role order --user u-17     # place one order
//! order-runtime --role demo                  # both, in-process
//! ```
//!
//! With the `amqp` feature the `cart` and `order` roles talk to RabbitMQ.
//! Without it `order` is refused at startup and `cart` serves a private
//! in-process broker. `demo` always runs in-process.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use order_runtime::telemetry::{init_logging, TelemetryConfig};
use order_runtime::runtime::ensure_role_supported;
use order_runtime::{run_demo, OrderDraft, Role, ServiceConfig, ServiceRuntime};

#[derive(Debug, Parser)]
#[command(name = "order-runtime", version, about = "MTOGO order and cart services")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service to run (`order` needs a build with `--features amqp`)
    #[arg(short, long, value_enum, default_value_t = Role::Demo)]
    role: Role,

    /// User to place the order for (order and demo roles)
    #[arg(short, long, default_value = "demo-user")]
    user: String,

    /// Restaurant the order is placed with (order role)
    #[arg(long, default_value_t = 1)]
    restaurant: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    ensure_role_supported(args.role)?;
    init_logging(&TelemetryConfig::from_env())?;

    let config = ServiceConfig::load(args.config.as_deref())?;

    match args.role {
        Role::Demo => {
            let order = run_demo(config, &args.user).await?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Role::Cart => {
            let runtime = ServiceRuntime::connect(config).await?;
            runtime.start_cart_service().await?;

            info!("Cart service is running. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c().await?;
            runtime.shutdown().await;
        }
        Role::Order => {
            let runtime = ServiceRuntime::connect(config).await?;
            runtime.start_order_service().await?;

            let draft = OrderDraft::new(args.user, args.restaurant);
            let result = runtime.container().order_service().create_order(draft).await;
            runtime.shutdown().await;
            println!("{}", result?);
        }
    }
    Ok(())
}
