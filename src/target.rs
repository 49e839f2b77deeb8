use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Flatpak,
    Host,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Flatpak => f.write_str("flatpak"),
            TargetKind::Host => f.write_str("host"),
        }
    }
}

/// What to launch: an installed Flatpak or a program on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetDescriptor {
    Flatpak {
        app_id: String,
        #[serde(default)]
        extra_args: String,
    },
    Host {
        executable_path: String,
        #[serde(default)]
        extra_args: String,
    },
}

impl TargetDescriptor {
    pub fn flatpak(app_id: impl Into<String>, extra_args: impl Into<String>) -> Self {
        TargetDescriptor::Flatpak {
            app_id: app_id.into(),
            extra_args: extra_args.into(),
        }
    }

    pub fn host(executable_path: impl Into<String>, extra_args: impl Into<String>) -> Self {
        TargetDescriptor::Host {
            executable_path: executable_path.into(),
            extra_args: extra_args.into(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            TargetDescriptor::Flatpak { .. } => TargetKind::Flatpak,
            TargetDescriptor::Host { .. } => TargetKind::Host,
        }
    }

    /// App id or executable path, untrimmed.
    pub fn program(&self) -> &str {
        match self {
            TargetDescriptor::Flatpak { app_id, .. } => app_id,
            TargetDescriptor::Host { executable_path, .. } => executable_path,
        }
    }

    pub fn extra_args(&self) -> &str {
        match self {
            TargetDescriptor::Flatpak { extra_args, .. } | TargetDescriptor::Host { extra_args, .. } => {
                extra_args
            }
        }
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.program())?;
        if !self.extra_args().trim().is_empty() {
            write!(f, " {}", self.extra_args().trim())?;
        }
        Ok(())
    }
}
