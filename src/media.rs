use std::{fmt, str::FromStr};

/// Continuous length tape loaded in the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Media {
    Continuous12,
    Continuous29,
    Continuous38,
    Continuous50,
    Continuous54,
    Continuous62,
}

struct MediaSize {
    mm: f32,
    dots: u32,
}

struct MediaSpec {
    width: MediaSize,
    margin: MediaSize,
}

impl MediaSpec {
    fn pins_effective(&self) -> u32 {
        self.width.dots - self.margin.dots * 2
    }
}

impl Media {
    fn spec(&self) -> MediaSpec {
        match self {
            Self::Continuous12 => MediaSpec {
                width: MediaSize {
                    mm: 12.0,
                    dots: 142,
                },
                margin: MediaSize { mm: 1.5, dots: 18 },
            },
            Self::Continuous29 => MediaSpec {
                width: MediaSize {
                    mm: 29.0,
                    dots: 342,
                },
                margin: MediaSize { mm: 1.5, dots: 18 },
            },
            Self::Continuous38 => MediaSpec {
                width: MediaSize {
                    mm: 38.0,
                    dots: 449,
                },
                margin: MediaSize { mm: 1.5, dots: 18 },
            },
            Self::Continuous50 => MediaSpec {
                width: MediaSize {
                    mm: 50.0,
                    dots: 590,
                },
                margin: MediaSize { mm: 1.5, dots: 18 },
            },
            Self::Continuous54 => MediaSpec {
                width: MediaSize {
                    mm: 54.0,
                    dots: 636,
                },
                margin: MediaSize { mm: 1.9, dots: 23 },
            },
            Self::Continuous62 => MediaSpec {
                width: MediaSize {
                    mm: 62.0,
                    dots: 732,
                },
                margin: MediaSize { mm: 1.5, dots: 18 },
            },
        }
    }

    /// Number of printable dots across the tape.
    ///
    /// This is the canvas width every label bitmap is rendered at.
    pub fn printable_dots(&self) -> u32 {
        self.spec().pins_effective()
    }

    /// Tape width in millimetres.
    pub fn width_mm(&self) -> f32 {
        self.spec().width.mm
    }
}

impl Default for Media {
    fn default() -> Self {
        Self::Continuous62
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} mm", self.width_mm())
    }
}

impl FromStr for Media {
    type Err = String;

    /// Parses the tape width in millimetres, e.g. `62` or `62mm`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let width = s.trim().trim_end_matches("mm");
        match width {
            "12" => Ok(Self::Continuous12),
            "29" => Ok(Self::Continuous29),
            "38" => Ok(Self::Continuous38),
            "50" => Ok(Self::Continuous50),
            "54" => Ok(Self::Continuous54),
            "62" => Ok(Self::Continuous62),
            _ => Err(format!("unsupported tape width '{}'", s)),
        }
    }
}
