use std::fmt;
use std::str::FromStr;

/// Which flavour of test sweep to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Unit tests, run with `-short`.
    Unit,
    /// Short tests, run with `-short`.
    Short,
    /// Tests under the race detector.
    Race,
    /// Tests writing coverage profiles.
    Coverage,
    /// Coverage under the race detector.
    CoverageRace,
}

impl RunMode {
    /// Every mode, in the order the command line lists them.
    pub const ALL: [Self; 5] = [
        Self::Unit,
        Self::Short,
        Self::Race,
        Self::Coverage,
        Self::CoverageRace,
    ];

    /// Name used on the command line and in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Short => "short",
            Self::Race => "race",
            Self::Coverage => "cover",
            Self::CoverageRace => "cover-race",
        }
    }

    /// Whether `-race` is forced.
    pub fn race(self) -> bool {
        matches!(self, Self::Race | Self::CoverageRace)
    }

    /// Whether each run writes a coverage profile.
    pub fn coverage(self) -> bool {
        matches!(self, Self::Coverage | Self::CoverageRace)
    }

    /// Whether `-short` is added.
    pub fn short(self) -> bool {
        matches!(self, Self::Unit | Self::Short)
    }

    /// Whether a failing sweep stops the remaining tag sweeps.
    ///
    /// Plain test modes treat the baseline as a prerequisite; coverage modes
    /// collect every tag's profile and report all failures together.
    pub fn stops_on_failure(self) -> bool {
        !self.coverage()
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.label() == value)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|mode| mode.label()).collect();
                format!("unknown run mode {value:?}, expected one of {}", known.join(", "))
            })
    }
}
