use wolweb::dispatch::WakeDispatcher;
use wolweb::iface::ifaddrs::SystemInterfaces;
use wolweb::wol::UdpSender;

use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a magic packet without running the server")]
struct Args {
    /// Target MAC address, in xx:xx:xx:xx:xx:xx or xx-xx-xx-xx-xx-xx form.
    mac_addr: String,

    /// Broadcast address to send to. Every local broadcast address when unset.
    broadcast_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let dispatcher = WakeDispatcher::new(Arc::new(UdpSender::new()), Arc::new(SystemInterfaces));
    dispatcher
        .wake(&args.mac_addr, args.broadcast_addr.as_deref())
        .await?;
    println!("sent");
    Ok(())
}
