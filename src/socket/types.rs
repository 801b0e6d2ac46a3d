use no_std_net::IpAddr;

use crate::buffer::tokens;

pub const MAX_SOCKETS: usize = 6;

/// Connection identifier of a plain socket, `1..=6` as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketId(u8);

impl SocketId {
    pub const fn new(id: u8) -> Option<Self> {
        if id >= 1 && id as usize <= MAX_SOCKETS {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn get(&self) -> u8 {
        self.0
    }

    pub(crate) const fn index(&self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = SocketId> {
        (1..=MAX_SOCKETS as u8).map(Self)
    }
}

/// Identifier of the SSL socket. The module offers a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SslSocketId(u8);

impl SslSocketId {
    pub const FIRST: Self = Self(1);

    pub const fn new(id: u8) -> Option<Self> {
        if id == 1 {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl Default for SslSocketId {
    fn default() -> Self {
        Self::FIRST
    }
}

/// `<state>` of `#SS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketState {
    #[default]
    Closed = 0,
    /// Active with data transfer ongoing
    Active = 1,
    Suspended = 2,
    SuspendedWithPendingData = 3,
    Listening = 4,
    /// A peer connected to a listening socket, waiting for `#SA`
    IncomingPending = 5,
    /// DNS resolution and connection in progress
    Opening = 6,
}

impl SocketState {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Closed,
            1 => Self::Active,
            2 => Self::Suspended,
            3 => Self::SuspendedWithPendingData,
            4 => Self::Listening,
            5 => Self::IncomingPending,
            6 => Self::Opening,
            _ => return None,
        })
    }
}

/// `<state>` of `#SSLS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SslState {
    #[default]
    Disabled = 0,
    Closed = 1,
    Open = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketStatus {
    pub id: u8,
    pub state: SocketState,
    pub local_ip: Option<IpAddr>,
    pub local_port: u16,
    pub remote_ip: Option<IpAddr>,
    pub remote_port: u16,
}

impl SocketStatus {
    /// Parse the fields following `#SS: `:
    /// `<id>,<state>[,<local_ip>,<local_port>,<remote_ip>,<remote_port>]`.
    pub(crate) fn parse(fields: &str) -> Option<Self> {
        let mut t = tokens(fields, ",\r\n ");
        let id = t.next()?.parse().ok()?;
        let state = SocketState::from_u8(t.next()?.parse().ok()?)?;
        let mut status = Self {
            id,
            state,
            ..Self::default()
        };
        if let Some(ip) = t.next() {
            status.local_ip = ip.trim_matches('"').parse().ok();
            status.local_port = t.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            status.remote_ip = t.next().and_then(|ip| ip.trim_matches('"').parse().ok());
            status.remote_port = t.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        }
        Some(status)
    }
}

/// Byte counters of `#SI`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketInfo {
    pub id: u8,
    pub sent: u32,
    pub received: u32,
    /// Received bytes not read yet
    pub pending: u32,
    /// Sent bytes not acknowledged yet
    pub unacknowledged: u32,
}

impl SocketInfo {
    pub(crate) fn parse(fields: &str) -> Option<Self> {
        let mut t = tokens(fields, ",\r\n ").map(|v| v.parse::<u32>().ok());
        Some(Self {
            id: t.next()??.try_into().ok()?,
            sent: t.next()??,
            received: t.next()??,
            pending: t.next()??,
            unacknowledged: t.next()??,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SslStatus {
    pub id: u8,
    pub state: SslState,
}

impl SslStatus {
    pub(crate) fn parse(fields: &str) -> Option<Self> {
        let mut t = tokens(fields, ",\r\n ");
        let id = t.next()?.parse().ok()?;
        let state = match t.next()?.parse::<u8>().ok()? {
            0 => SslState::Disabled,
            1 => SslState::Closed,
            2 => SslState::Open,
            _ => return None,
        };
        Some(Self { id, state })
    }
}

/// Last known status of every socket.
#[derive(Debug, Clone, Default)]
pub struct SocketTable {
    pub(crate) status: [SocketStatus; MAX_SOCKETS],
    pub(crate) info: [SocketInfo; MAX_SOCKETS],
    pub(crate) ssl: SslStatus,
}

impl SocketTable {
    pub fn status(&self, id: SocketId) -> &SocketStatus {
        &self.status[id.index()]
    }

    pub fn info(&self, id: SocketId) -> &SocketInfo {
        &self.info[id.index()]
    }

    pub fn ssl(&self) -> &SslStatus {
        &self.ssl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use no_std_net::Ipv4Addr;

    #[test]
    fn socket_ids() {
        assert!(SocketId::new(0).is_none());
        assert!(SocketId::new(7).is_none());
        assert_eq!(SocketId::new(6).map(|id| id.index()), Some(5));
        assert_eq!(SocketId::all().count(), 6);
        assert!(SslSocketId::new(2).is_none());
    }

    #[test]
    fn parse_full_status() {
        let status = SocketStatus::parse("1,2,10.0.0.5,3000,93.184.216.34,80\r\n").unwrap();
        assert_eq!(status.id, 1);
        assert_eq!(status.state, SocketState::Suspended);
        assert_eq!(status.local_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(status.local_port, 3000);
        assert_eq!(
            status.remote_ip,
            Some(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))
        );
        assert_eq!(status.remote_port, 80);
    }

    #[test]
    fn parse_closed_status() {
        let status = SocketStatus::parse("3,0\r\n").unwrap();
        assert_eq!(status.id, 3);
        assert_eq!(status.state, SocketState::Closed);
        assert_eq!(status.local_ip, None);
        assert!(SocketStatus::parse("3,9\r\n").is_none());
    }

    #[test]
    fn parse_info() {
        let info = SocketInfo::parse("1,123,400,10,0\r\n").unwrap();
        assert_eq!(info.sent, 123);
        assert_eq!(info.received, 400);
        assert_eq!(info.pending, 10);
        assert!(SocketInfo::parse("1,123,400\r\n").is_none());
    }

    #[test]
    fn parse_ssl_status() {
        let status = SslStatus::parse("1,2,0\r\n").unwrap();
        assert_eq!(status.state, SslState::Open);
    }
}
