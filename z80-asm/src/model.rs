use core::fmt;
use core::str::FromStr;

/// Spectrum hardware model targeted by an assembly run.
///
/// The model gates the extended (Next-only) part of the instruction set and
/// is selected at most once per run with the `MODEL` pragma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Model {
    /// The original 48K Spectrum.
    Spectrum48,
    /// The 128K models (128K/+2).
    Spectrum128,
    /// The +2A/+3 models.
    SpectrumP3,
    /// The ZX Spectrum Next.
    Next,
}

impl Model {
    /// Whether the Next-only extended instructions are available.
    pub const fn supports_next_ops(self) -> bool {
        matches!(self, Model::Next)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::Spectrum48 => "SPECTRUM48",
            Model::Spectrum128 => "SPECTRUM128",
            Model::SpectrumP3 => "SPECTRUMP3",
            Model::Next => "NEXT",
        };
        f.write_str(name)
    }
}

impl FromStr for Model {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let model = match s.to_ascii_uppercase().as_str() {
            "SPECTRUM48" | "48" => Model::Spectrum48,
            "SPECTRUM128" | "128" => Model::Spectrum128,
            "SPECTRUMP3" | "P3" => Model::SpectrumP3,
            "NEXT" => Model::Next,
            _ => return Err(()),
        };
        Ok(model)
    }
}
