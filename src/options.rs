use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Multiplier {
    #[default]
    X2,
    X3,
    X4,
    X6,
    X8,
}

impl Multiplier {
    pub const ALL: [Multiplier; 5] = [
        Multiplier::X2,
        Multiplier::X3,
        Multiplier::X4,
        Multiplier::X6,
        Multiplier::X8,
    ];

    pub fn value(self) -> u8 {
        match self {
            Multiplier::X2 => 2,
            Multiplier::X3 => 3,
            Multiplier::X4 => 4,
            Multiplier::X6 => 6,
            Multiplier::X8 => 8,
        }
    }
}

impl TryFrom<u8> for Multiplier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Multiplier::ALL
            .into_iter()
            .find(|m| m.value() == value)
            .ok_or_else(|| format!("unsupported multiplier {} (expected one of 2, 3, 4, 6, 8)", value))
    }
}

impl FromStr for Multiplier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(['x', 'X']);
        let value: u8 = trimmed
            .parse()
            .map_err(|_| format!("invalid multiplier `{}`", s))?;
        Multiplier::try_from(value)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for Multiplier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for Multiplier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older settings files stored the multiplier as the combo box string.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Multiplier::try_from(n),
            Raw::Text(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    /// Leave the application's own choice untouched
    #[default]
    #[serde(alias = "none", alias = "")]
    #[value(alias = "none")]
    Auto,
    Fifo,
    Mailbox,
    Immediate,
}

impl PresentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PresentMode::Auto => "auto",
            PresentMode::Fifo => "fifo",
            PresentMode::Mailbox => "mailbox",
            PresentMode::Immediate => "immediate",
        }
    }

    /// Value for `LSFG_PRESENT_MODE`, or `None` for the auto sentinel.
    pub fn env_value(self) -> Option<&'static str> {
        match self {
            PresentMode::Auto => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both target kinds share one `OptionSet`; the default value always builds
/// a runnable environment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSet {
    pub multiplier: Multiplier,
    pub flow_scale: bool,
    #[serde(alias = "performance")]
    pub performance_mode: bool,
    #[serde(alias = "hdr")]
    pub hdr_mode: bool,
    pub present_mode: PresentMode,
    #[serde(alias = "lsfg_process")]
    pub process: String,
    pub mangohud: bool,
    /// Appended after the target's own arguments
    pub extra_args: String,
}

impl OptionSet {
    pub fn process_filter(&self) -> Option<&str> {
        let process = self.process.trim();
        (!process.is_empty()).then_some(process)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub multiplier: Option<Multiplier>,
    pub flow_scale: Option<bool>,
    pub performance_mode: Option<bool>,
    pub hdr_mode: Option<bool>,
    pub present_mode: Option<PresentMode>,
    pub process: Option<String>,
    pub mangohud: Option<bool>,
    pub extra_args: Option<String>,
}

impl OptionOverrides {
    pub fn apply(&self, base: &OptionSet) -> OptionSet {
        OptionSet {
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            flow_scale: self.flow_scale.unwrap_or(base.flow_scale),
            performance_mode: self.performance_mode.unwrap_or(base.performance_mode),
            hdr_mode: self.hdr_mode.unwrap_or(base.hdr_mode),
            present_mode: self.present_mode.unwrap_or(base.present_mode),
            process: self
                .process
                .as_deref()
                .map(|p| p.trim().to_string())
                .unwrap_or_else(|| base.process.clone()),
            mangohud: self.mangohud.unwrap_or(base.mangohud),
            extra_args: self
                .extra_args
                .as_deref()
                .map(|a| a.trim().to_string())
                .unwrap_or_else(|| base.extra_args.clone()),
        }
    }
}
