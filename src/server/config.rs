//! Stream server configuration

use std::net::SocketAddr;

/// Default port of the video stream server
pub const DEFAULT_STREAM_PORT: u16 = 8084;

/// Default read quantum for the transcoder output
pub const DEFAULT_READ_QUANTUM: usize = 512;

/// Stream server configuration options
#[derive(Debug, Clone)]
pub struct StreamServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent viewers (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Bytes read from the transcoder per broadcast chunk
    pub read_quantum: usize,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_STREAM_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Important for low latency
            read_quantum: DEFAULT_READ_QUANTUM,
        }
    }
}

impl StreamServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the read quantum (at least one byte)
    pub fn read_quantum(mut self, bytes: usize) -> Self {
        self.read_quantum = bytes.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_STREAM_PORT);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.read_quantum, 512);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = StreamServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_read_quantum_floor() {
        let config = StreamServerConfig::default().read_quantum(0);

        assert_eq!(config.read_quantum, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8084".parse().unwrap();
        let config = StreamServerConfig::default()
            .bind(addr)
            .max_connections(8)
            .read_quantum(1024);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.read_quantum, 1024);
    }
}
