use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    QL570,
    QL600,
    QL700,
    QL710W,
    QL720NW,
    QL800,
    QL810W,
    QL820NWB,
    QL1100,
    QL1110NWB,
    QL1115NWB,
}

const MODELS: [Model; 11] = [
    Model::QL570,
    Model::QL600,
    Model::QL700,
    Model::QL710W,
    Model::QL720NW,
    Model::QL800,
    Model::QL810W,
    Model::QL820NWB,
    Model::QL1100,
    Model::QL1110NWB,
    Model::QL1115NWB,
];

impl Model {
    /// USB product ID. All models share the Brother vendor ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::QL570 => 0x2028,
            Self::QL600 => 0x20C0,
            Self::QL700 => 0x2042,
            Self::QL710W => 0x2043,
            Self::QL720NW => 0x2044,
            Self::QL800 => 0x209B,
            Self::QL810W => 0x209C,
            Self::QL820NWB => 0x209D,
            Self::QL1100 => 0x20A7,
            Self::QL1110NWB => 0x20A8,
            Self::QL1115NWB => 0x20AB,
        }
    }

    pub fn from_pid(pid: u16) -> Option<Self> {
        MODELS.iter().copied().find(|model| model.pid() == pid)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QL570 => "QL-570",
            Self::QL600 => "QL-600",
            Self::QL700 => "QL-700",
            Self::QL710W => "QL-710W",
            Self::QL720NW => "QL-720NW",
            Self::QL800 => "QL-800",
            Self::QL810W => "QL-810W",
            Self::QL820NWB => "QL-820NWB",
            Self::QL1100 => "QL-1100",
            Self::QL1110NWB => "QL-1110NWB",
            Self::QL1115NWB => "QL-1115NWB",
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::QL810W
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Model {
    type Err = String;

    /// Accepts `QL-810W`, `ql810w` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        MODELS
            .iter()
            .copied()
            .find(|model| model.name().replace('-', "") == wanted)
            .ok_or_else(|| format!("unknown printer model '{}'", s))
    }
}
