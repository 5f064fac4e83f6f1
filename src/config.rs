use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// ICE server used when a configuration names none.
pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";

/// URI scheme of an ICE server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceScheme {
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl IceScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            IceScheme::Stun => "stun",
            IceScheme::Stuns => "stuns",
            IceScheme::Turn => "turn",
            IceScheme::Turns => "turns",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            IceScheme::Stun | IceScheme::Turn => 3478,
            IceScheme::Stuns | IceScheme::Turns => 5349,
        }
    }

    pub fn is_turn(self) -> bool {
        matches!(self, IceScheme::Turn | IceScheme::Turns)
    }
}

/// Transport requested for a TURN allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IceTransport {
    Udp,
    Tcp,
}

impl IceTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            IceTransport::Udp => "udp",
            IceTransport::Tcp => "tcp",
        }
    }
}

/// A STUN or TURN server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub scheme: IceScheme,
    pub host: String,
    pub port: u16,
    pub transport: Option<IceTransport>,
    pub username: String,
    pub credential: String,
}

impl IceServer {
    /// Parse a server URI.
    ///
    /// Expected format: `{scheme}:{host}[:{port}][?transport={udp|tcp}]`,
    /// where the host may be a bracketed IPv6 literal and `transport` is
    /// only accepted for TURN schemes.
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidUri {
            uri: uri.to_owned(),
            reason: reason.to_owned(),
        };

        let (scheme, rest) = uri.split_once(':').ok_or_else(|| invalid("missing scheme"))?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "stun" => IceScheme::Stun,
            "stuns" => IceScheme::Stuns,
            "turn" => IceScheme::Turn,
            "turns" => IceScheme::Turns,
            other => return Err(ConfigError::UnsupportedScheme(other.to_owned())),
        };

        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query)),
            None => (rest, None),
        };
        if authority.starts_with("//") {
            return Err(invalid("ICE server URIs take no '//' authority prefix"));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (literal, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
            let port = match tail {
                "" => None,
                tail => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after IPv6 literal"))?,
                ),
            };
            (format!("[{literal}]"), port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host.to_owned(), Some(port)),
                None => (authority.to_owned(), None),
            }
        };

        if host.is_empty() || host == "[]" {
            return Err(invalid("missing host"));
        }

        let port = match port {
            Some(port) => match port.parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(ConfigError::InvalidPort(uri.to_owned())),
            },
            None => scheme.default_port(),
        };

        let transport = match query {
            None => None,
            Some(query) if scheme.is_turn() => match query.strip_prefix("transport=") {
                Some("udp") => Some(IceTransport::Udp),
                Some("tcp") => Some(IceTransport::Tcp),
                _ => return Err(invalid("query must be 'transport=udp' or 'transport=tcp'")),
            },
            Some(_) => return Err(invalid("STUN URIs take no query")),
        };

        Ok(IceServer {
            scheme,
            host,
            port,
            transport,
            username: String::new(),
            credential: String::new(),
        })
    }

    /// Attach TURN credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.credential = credential.into();
        self
    }

    /// Canonical URI with an explicit port.
    pub fn uri(&self) -> String {
        self.to_string()
    }
}

impl FromStr for IceServer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IceServer::parse(s)
    }
}

impl fmt::Display for IceServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme.as_str(), self.host, self.port)?;
        if let Some(transport) = self.transport {
            write!(f, "?transport={}", transport.as_str())?;
        }
        Ok(())
    }
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// ICE servers handed to every peer connection in the session.
    pub ice_servers: Vec<IceServer>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![default_ice_server()],
        }
    }
}

impl SessionConfig {
    /// Build a config from server URIs, falling back to the default server
    /// when the list is empty.
    pub fn from_uris<I, S>(uris: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ice_servers = uris
            .into_iter()
            .map(|uri| IceServer::parse(uri.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ice_servers }.or_default())
    }

    /// Add an ICE server.
    pub fn with_ice_server(mut self, server: IceServer) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Fill in the default server if none is configured.
    pub fn or_default(self) -> Self {
        if self.ice_servers.is_empty() {
            Self::default()
        } else {
            self
        }
    }
}

fn default_ice_server() -> IceServer {
    IceServer {
        scheme: IceScheme::Stun,
        host: "stun.l.google.com".to_owned(),
        port: 19302,
        transport: None,
        username: String::new(),
        credential: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stun_with_port() {
        let server = IceServer::parse("stun:stun.example.com:3478").unwrap();
        assert_eq!(server.scheme, IceScheme::Stun);
        assert_eq!(server.host, "stun.example.com");
        assert_eq!(server.port, 3478);
        assert_eq!(server.transport, None);
    }

    #[test]
    fn test_parse_defaults_port_by_scheme() {
        assert_eq!(IceServer::parse("stun:example.com").unwrap().port, 3478);
        assert_eq!(IceServer::parse("turns:example.com").unwrap().port, 5349);
    }

    #[test]
    fn test_parse_turn_with_transport() {
        let server = IceServer::parse("turn:turn.example.com:3479?transport=tcp").unwrap();
        assert_eq!(server.scheme, IceScheme::Turn);
        assert_eq!(server.port, 3479);
        assert_eq!(server.transport, Some(IceTransport::Tcp));
        assert_eq!(server.uri(), "turn:turn.example.com:3479?transport=tcp");
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let server = IceServer::parse("stun:[::1]:3478").unwrap();
        assert_eq!(server.host, "[::1]");
        assert_eq!(server.port, 3478);

        let server = IceServer::parse("stun:[2001:db8::1]").unwrap();
        assert_eq!(server.host, "[2001:db8::1]");
        assert_eq!(server.port, 3478);
    }

    #[test]
    fn test_default_server_round_trips() {
        let server = IceServer::parse(DEFAULT_ICE_SERVER).unwrap();
        assert_eq!(server, default_ice_server());
        assert_eq!(server.uri(), DEFAULT_ICE_SERVER);
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let result = IceServer::parse("http://example.com");
        assert!(matches!(result, Err(ConfigError::UnsupportedScheme(s)) if s == "http"));
    }

    #[test]
    fn test_rejects_bad_ports() {
        for uri in ["stun:example.com:0", "stun:example.com:70000", "stun:example.com:abc"] {
            assert!(matches!(
                IceServer::parse(uri),
                Err(ConfigError::InvalidPort(_))
            ));
        }
    }

    #[test]
    fn test_rejects_malformed_uris() {
        for uri in [
            "stun.example.com",
            "stun:",
            "stun::3478",
            "stun://example.com",
            "stun:example.com?transport=udp",
            "turn:example.com?transport=sctp",
            "stun:[::1",
        ] {
            assert!(
                matches!(IceServer::parse(uri), Err(ConfigError::InvalidUri { .. })),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_list_uses_default() {
        let config = SessionConfig::from_uris(Vec::<String>::new()).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.ice_servers.len(), 1);
    }

    #[test]
    fn test_from_uris_keeps_order() {
        let config =
            SessionConfig::from_uris(["stun:a.example.com", "turn:b.example.com"]).unwrap();
        let hosts: Vec<_> = config.ice_servers.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts, ["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_with_credentials() {
        let server = IceServer::parse("turn:turn.example.com")
            .unwrap()
            .with_credentials("user", "secret");
        assert_eq!(server.username, "user");
        assert_eq!(server.credential, "secret");
    }
}
