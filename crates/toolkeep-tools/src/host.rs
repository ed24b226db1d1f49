use std::fmt;

/// Operating system family of the machine running the tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Darwin,
    Windows,
    Other(String),
}

impl HostOs {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::Darwin,
            "windows" => HostOs::Windows,
            other => HostOs::Other(other.to_string()),
        }
    }

    /// Whether files on this host carry an executable permission bit.
    pub fn has_exec_bit(&self) -> bool {
        !matches!(self, HostOs::Windows)
    }

    /// Name of a command-line tool launcher; Windows ships `.bat` wrappers.
    pub fn script_name(&self, base: &str) -> String {
        match self {
            HostOs::Windows => format!("{base}.bat"),
            _ => base.to_string(),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOs::Linux => f.write_str("Linux"),
            HostOs::Darwin => f.write_str("Darwin"),
            HostOs::Windows => f.write_str("Windows"),
            HostOs::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Host {
    pub os: HostOs,
    pub arch: String,
}

impl Host {
    pub fn new(os: HostOs, arch: impl Into<String>) -> Self {
        Self {
            os,
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(HostOs::current(), std::env::consts::ARCH)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.os, self.arch)
    }
}
