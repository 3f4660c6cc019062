use crate::wol::{MacAddress, PacketSender};
use async_trait::async_trait;
use log::info;
use std::io;

pub struct LogOnlySender;

#[async_trait]
impl PacketSender for LogOnlySender {
    async fn send(&self, mac: &MacAddress, target: &str) -> io::Result<()> {
        info!("faking magic packet for {} to {}", mac, target);
        Ok(())
    }
}
