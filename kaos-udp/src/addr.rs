//! Fixed-size IPv4 address value used in the API and in batch records.

use std::fmt;
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use bytemuck::{Pod, Zeroable};

/// Longest dotted-decimal IPv4 text plus a NUL.
pub const IP_TEXT_LEN: usize = 16;

/// IPv4 address as NUL-padded dotted-decimal text plus a host-order port.
///
/// 18 bytes, no padding, so it can be copied verbatim into a record header.
#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct InetAddr {
    ip: [u8; IP_TEXT_LEN],
    port: u16,
}

impl InetAddr {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        let mut text = [0u8; IP_TEXT_LEN];
        let mut cursor = &mut text[..];
        // "255.255.255.255" is 15 bytes, always fits.
        let _ = write!(cursor, "{ip}");
        Self { ip: text, port }
    }

    /// Parse dotted-decimal `ip`. `None` for anything that is not IPv4.
    pub fn parse(ip: &str, port: u16) -> Option<Self> {
        ip.parse::<Ipv4Addr>().ok().map(|ip| Self::new(ip, port))
    }

    /// Dotted-decimal text, without the NUL padding.
    pub fn ip(&self) -> &str {
        let end = self.ip.iter().position(|&b| b == 0).unwrap_or(IP_TEXT_LEN);
        std::str::from_utf8(&self.ip[..end]).unwrap_or("")
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        self.ip().parse().unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn to_socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ipv4(), self.port())
    }
}

impl Default for InetAddr {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, 0)
    }
}

impl From<SocketAddrV4> for InetAddr {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<SocketAddr> for InetAddr {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => v4.into(),
            SocketAddr::V6(v6) => Self::new(
                v6.ip().to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
                v6.port(),
            ),
        }
    }
}

impl From<InetAddr> for SocketAddr {
    fn from(addr: InetAddr) -> Self {
        SocketAddr::V4(addr.to_socket_addr())
    }
}

impl PartialEq for InetAddr {
    fn eq(&self, other: &Self) -> bool {
        self.ip() == other.ip() && self.port() == other.port()
    }
}

impl Eq for InetAddr {}

impl fmt::Display for InetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port())
    }
}

impl fmt::Debug for InetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InetAddr({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(InetAddr::SIZE, 18);
    }

    #[test]
    fn test_text_and_port() {
        let addr = InetAddr::new(Ipv4Addr::new(255, 255, 255, 255), 65535);
        assert_eq!(addr.ip(), "255.255.255.255");
        assert_eq!(addr.port(), 65535);
        assert_eq!(addr.to_string(), "255.255.255.255:65535");

        let addr = InetAddr::parse("10.0.0.1", 53).unwrap();
        assert_eq!(addr.ipv4(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(addr.to_socket_addr(), "10.0.0.1:53".parse().unwrap());
    }

    #[test]
    fn test_parse_rejects_non_ipv4() {
        assert!(InetAddr::parse("", 1).is_none());
        assert!(InetAddr::parse("localhost", 1).is_none());
        assert!(InetAddr::parse("::1", 1).is_none());
        assert!(InetAddr::parse("1.2.3.256", 1).is_none());
    }

    #[test]
    fn test_from_socket_addr() {
        let v4: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(InetAddr::from(v4), InetAddr::parse("127.0.0.1", 4000).unwrap());

        let mapped: SocketAddr = "[::ffff:192.168.1.2]:80".parse().unwrap();
        assert_eq!(InetAddr::from(mapped).ip(), "192.168.1.2");

        let v6: SocketAddr = "[2001:db8::1]:80".parse().unwrap();
        assert_eq!(InetAddr::from(v6).ip(), "0.0.0.0");
    }

    #[test]
    fn test_pod_bytes() {
        let addr = InetAddr::parse("1.2.3.4", 0x0102).unwrap();
        let bytes = bytemuck::bytes_of(&addr);
        assert_eq!(&bytes[..8], b"1.2.3.4\0");
        let back: InetAddr = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, addr);
    }
}
