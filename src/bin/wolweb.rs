use wolweb::api;
use wolweb::config;
use wolweb::dispatch::WakeDispatcher;
use wolweb::iface::ifaddrs::SystemInterfaces;
use wolweb::ping::icmp::IcmpProber;
use wolweb::ping::LivenessChecker;
use wolweb::wol;

use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "WOLWEB_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, env = "WOLWEB_ADDRESS", default_value = "0.0.0.0:8951")]
    address: String,

    /// If true, ping over raw sockets even when the config file says otherwise.
    #[arg(long)]
    privileged_ping: bool,

    /// If true, log magic packets instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("INFO"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let conf = config::Config::load(&args.config)?;
    info!(
        "Loaded {} machines from {}",
        conf.address_book.entries().len(),
        args.config.display()
    );

    let sender: Arc<dyn wol::PacketSender> = if args.dry_run {
        Arc::new(wol::noop::LogOnlySender)
    } else {
        Arc::new(wol::UdpSender::new())
    };
    let privileged = conf.use_privileged_ping(args.privileged_ping);
    let app_state = api::AppState {
        address_book: Arc::new(conf.address_book),
        dispatcher: WakeDispatcher::new(sender, Arc::new(SystemInterfaces)),
        checker: LivenessChecker::new(Arc::new(IcmpProber::new(privileged))),
    };

    let addr: SocketAddr = args.address.parse()?;
    info!("Starting server on {}...", addr);
    axum::Server::bind(&addr)
        .serve(api::router(app_state).into_make_service())
        .await?;
    Ok(())
}
