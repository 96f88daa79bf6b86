//! Transfer endpoints and their firewall posture.

use super::PortRange;

/// One endpoint of a transfer.
///
/// `host` of `None` means the local machine. The port constraints describe
/// which inbound (`listen_ports`) and outbound (`connect_ports`) ports the
/// node's firewall lets through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    host: Option<String>,
    listen_ports: PortRange,
    connect_ports: PortRange,
}

impl Node {
    pub fn new(host: Option<String>, listen_ports: PortRange, connect_ports: PortRange) -> Self {
        Self {
            host,
            listen_ports,
            connect_ports,
        }
    }

    /// The machine this process runs on.
    pub fn local(listen_ports: PortRange, connect_ports: PortRange) -> Self {
        Self::new(None, listen_ports, connect_ports)
    }

    pub fn remote(
        host: impl Into<String>,
        listen_ports: PortRange,
        connect_ports: PortRange,
    ) -> Self {
        Self::new(Some(host.into()), listen_ports, connect_ports)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn listen_ports(&self) -> PortRange {
        self.listen_ports
    }

    pub fn connect_ports(&self) -> PortRange {
        self.connect_ports
    }

    /// Render a bbcp path specification for a file on this node.
    ///
    /// Local nodes use the bare path; remote nodes use `[user@]host:path`.
    pub fn pathspec(&self, path: &str, username: Option<&str>) -> String {
        let Some(host) = self.host.as_deref() else {
            return path.to_string();
        };
        match username.filter(|u| !u.is_empty()) {
            Some(user) => format!("{}@{}:{}", user, host, path),
            None => format!("{}:{}", host, path),
        }
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathspec_local() {
        let node = Node::local(PortRange::Forbidden, PortRange::Unrestricted);
        assert_eq!(node.pathspec("/dev/zero", None), "/dev/zero");
        assert_eq!(node.pathspec("/dev/zero", Some("alice")), "/dev/zero");
    }

    #[test]
    fn test_pathspec_remote() {
        let node = Node::remote("myhost1", PortRange::Unrestricted, PortRange::Unrestricted);
        assert_eq!(node.pathspec("/dev/null", None), "myhost1:/dev/null");
        assert_eq!(node.pathspec("/dev/null", Some("")), "myhost1:/dev/null");
        assert_eq!(
            node.pathspec("/dev/null", Some("alice")),
            "alice@myhost1:/dev/null"
        );
    }

    #[test]
    fn test_label() {
        assert_eq!(Node::default().label(), "localhost");
        let node = Node::remote("far", PortRange::Unrestricted, PortRange::Forbidden);
        assert_eq!(node.label(), "far");
        assert!(node.connect_ports().is_forbidden());
    }
}
