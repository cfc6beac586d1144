use serde::{Deserialize, Serialize};

/// One of the six fixed evaluation criteria. Discriminants are the stable pointer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PointerId {
    AcademicExcellence = 1,
    SpikeInOneArea = 2,
    LeadershipInitiative = 3,
    GlobalSocialImpact = 4,
    AuthenticStorytelling = 5,
    IntellectualCuriosity = 6,
}

impl PointerId {
    pub const ALL: [PointerId; 6] = [
        PointerId::AcademicExcellence,
        PointerId::SpikeInOneArea,
        PointerId::LeadershipInitiative,
        PointerId::GlobalSocialImpact,
        PointerId::AuthenticStorytelling,
        PointerId::IntellectualCuriosity,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(value: u8) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|pointer| pointer.number() == value)
    }

    /// Share of the overall score, in percent.
    pub const fn weight(self) -> u8 {
        match self {
            PointerId::AcademicExcellence => 30,
            PointerId::SpikeInOneArea => 20,
            PointerId::LeadershipInitiative => 15,
            PointerId::GlobalSocialImpact => 10,
            PointerId::AuthenticStorytelling => 15,
            PointerId::IntellectualCuriosity => 10,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PointerId::AcademicExcellence => "Academic Excellence",
            PointerId::SpikeInOneArea => "Spike in One Area",
            PointerId::LeadershipInitiative => "Leadership & Initiative",
            PointerId::GlobalSocialImpact => "Global & Social Impact",
            PointerId::AuthenticStorytelling => "Authentic Storytelling",
            PointerId::IntellectualCuriosity => "Intellectual Curiosity",
        }
    }

    pub const fn category(self) -> PointerCategory {
        match self {
            PointerId::AcademicExcellence => PointerCategory::DocumentAverage,
            PointerId::SpikeInOneArea
            | PointerId::LeadershipInitiative
            | PointerId::GlobalSocialImpact => PointerCategory::WeightedActivity,
            PointerId::AuthenticStorytelling => PointerCategory::NarrativeTask,
            PointerId::IntellectualCuriosity => PointerCategory::CertificateAverage,
        }
    }
}

impl TryFrom<u8> for PointerId {
    type Error = UnknownPointer;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or(UnknownPointer(value))
    }
}

impl From<PointerId> for u8 {
    fn from(value: PointerId) -> Self {
        value.number()
    }
}

/// Raised when an integer does not name one of the six pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pointer id {0} is not one of the six evaluation pointers")]
pub struct UnknownPointer(pub u8);

/// Scoring strategy a pointer uses to condense its evaluation items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerCategory {
    DocumentAverage,
    WeightedActivity,
    NarrativeTask,
    CertificateAverage,
}

impl PointerCategory {
    pub const fn label(self) -> &'static str {
        match self {
            PointerCategory::DocumentAverage => "document_average",
            PointerCategory::WeightedActivity => "weighted_activity",
            PointerCategory::NarrativeTask => "narrative_task",
            PointerCategory::CertificateAverage => "certificate_average",
        }
    }
}

/// Sum of the pointer weights; always 100.
pub fn weight_total() -> u32 {
    PointerId::ALL
        .iter()
        .map(|pointer| u32::from(pointer.weight()))
        .sum()
}
