//! The address block every Job and Pause starts with.

use std::net::{IpAddr, SocketAddr, UdpSocket};

use super::container::Container;
use super::fields::{decode_ips, decode_u16, encode_ips, encode_u16};
use crate::errors::ContainerError;

pub const IPS_FIELD: usize = 0;
pub const P2P_PORT_FIELD: usize = 1;
pub const RPC_PORT_FIELD: usize = 2;
pub const SUBMIT_PORT_FIELD: usize = 3;
pub const ADVERTISEMENT_FIELDS: usize = 4;

/// Where a controller's node can be reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub ips: Vec<IpAddr>,
    pub p2p_port: u16,
    pub rpc_port: u16,
    /// Port the controller accepts Solutions on
    pub submit_port: u16,
}

impl Advertisement {
    pub fn new(ips: Vec<IpAddr>, p2p_port: u16, rpc_port: u16, submit_port: u16) -> Self {
        Self { ips, p2p_port, rpc_port, submit_port }
    }

    /// Uses `configured` addresses, or the routable local address when none are configured.
    pub fn discover(configured: &[IpAddr], p2p_port: u16, rpc_port: u16, submit_port: u16) -> Self {
        let ips = if configured.is_empty() { routable_local_ip().into_iter().collect() } else { configured.to_vec() };
        Self::new(ips, p2p_port, rpc_port, submit_port)
    }

    pub fn fields(&self) -> Result<Vec<Vec<u8>>, ContainerError> {
        let ips = encode_ips(&self.ips).map_err(|reason| ContainerError::MalformedField { index: IPS_FIELD, reason })?;
        Ok(vec![ips, encode_u16(self.p2p_port), encode_u16(self.rpc_port), encode_u16(self.submit_port)])
    }

    pub fn submit_addresses(&self) -> Vec<SocketAddr> {
        join(&self.ips, self.submit_port)
    }
}

fn join(ips: &[IpAddr], port: u16) -> Vec<SocketAddr> {
    ips.iter().map(|ip| SocketAddr::new(*ip, port)).collect()
}

/// Local address the OS would route outbound traffic from. No packet is sent.
pub fn routable_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip()).filter(|ip| !ip.is_unspecified())
}

/// Lazy accessors for the four advertisement fields shared by Job and Pause.
pub trait AdvertisedFields {
    fn container(&self) -> &Container;

    fn try_ips(&self) -> Result<Vec<IpAddr>, ContainerError> {
        self.container().decode_field(IPS_FIELD, decode_ips)
    }

    fn try_p2p_port(&self) -> Result<u16, ContainerError> {
        self.container().decode_field(P2P_PORT_FIELD, decode_u16)
    }

    fn try_rpc_port(&self) -> Result<u16, ContainerError> {
        self.container().decode_field(RPC_PORT_FIELD, decode_u16)
    }

    fn try_submit_port(&self) -> Result<u16, ContainerError> {
        self.container().decode_field(SUBMIT_PORT_FIELD, decode_u16)
    }

    fn ips(&self) -> Vec<IpAddr> {
        self.try_ips().unwrap_or_default()
    }

    fn p2p_port(&self) -> u16 {
        self.try_p2p_port().unwrap_or_default()
    }

    fn rpc_port(&self) -> u16 {
        self.try_rpc_port().unwrap_or_default()
    }

    fn submit_port(&self) -> u16 {
        self.try_submit_port().unwrap_or_default()
    }

    fn try_advertisement(&self) -> Result<Advertisement, ContainerError> {
        Ok(Advertisement::new(self.try_ips()?, self.try_p2p_port()?, self.try_rpc_port()?, self.try_submit_port()?))
    }

    fn p2p_listeners(&self) -> Vec<SocketAddr> {
        join(&self.ips(), self.p2p_port())
    }

    fn rpc_listeners(&self) -> Vec<SocketAddr> {
        join(&self.ips(), self.rpc_port())
    }

    fn controller_listeners(&self) -> Vec<SocketAddr> {
        join(&self.ips(), self.submit_port())
    }

    /// Identity of the sender as workers track it: first address and submit port.
    fn sender_address(&self) -> Option<SocketAddr> {
        let ip = self.try_ips().ok()?.into_iter().next()?;
        Some(SocketAddr::new(ip, self.try_submit_port().ok()?))
    }
}
