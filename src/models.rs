use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An image in transit: uploaded by the user, pulled from the sample catalog,
/// or produced by a previous generation. Replaced wholesale on change.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub data: String, // base64 payload, no data-URI prefix
    pub mime_type: String,
}

impl ImageAsset {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self { data: data.into(), mime_type: mime_type.into() }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Parses a `data:<mime>;base64,<payload>` URI. Anything else yields None.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;
        Some(Self { data: data.to_string(), mime_type: mime_type.to_string() })
    }
}

/// Named backdrop presets offered by the form. An uploaded background image is
/// mutually exclusive with a preset and always wins when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundChoice {
    #[default]
    Studio,
    Stage,
    GymHall,
    Garden,
    #[serde(other)]
    Other,
}

impl BackgroundChoice {
    pub fn preset_text(&self) -> &'static str {
        match self {
            Self::Studio => "a professional photo studio with a seamless light-grey backdrop and soft diffused lighting",
            Self::Stage => "a dimly lit theatre stage with a single warm spotlight on the model",
            Self::GymHall => "a bright gymnastics hall, sprung floor and wall bars out of focus behind the model",
            Self::Garden => "a sunlit garden with soft green foliage blurred behind the model",
            Self::Other => "a clean, uncluttered backdrop that keeps all attention on the garment",
        }
    }
}

/// Optional age framing for the composited model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeAdjustment {
    #[default]
    Unchanged,
    Child,
    Junior,
    Teen,
    Adult,
    #[serde(other)]
    Other,
}

impl AgeAdjustment {
    /// Fixed age-range phrase; None when the model is left unchanged.
    pub fn phrase(&self) -> Option<&'static str> {
        match self {
            Self::Unchanged => None,
            Self::Child => Some("a child around 7 to 9 years old"),
            Self::Junior => Some("a junior around 10 to 12 years old"),
            Self::Teen => Some("a teenager around 13 to 16 years old"),
            Self::Adult => Some("a young adult around 18 to 25 years old"),
            Self::Other => Some("an age that suits the garment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotFraming {
    #[default]
    FullBody,
    ThreeQuarter,
    Portrait,
    #[serde(other)]
    Other,
}

impl ShotFraming {
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::FullBody => "full-length shot showing the model from head to toe",
            Self::ThreeQuarter => "three-quarter shot cropped just below the knees",
            Self::Portrait => "upper-body portrait shot framed from the waist up",
            Self::Other => "well-composed catalog shot",
        }
    }
}

/// Output framing ratios. The form defaults to the tall 9:16 portrait format
/// used across the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[default]
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(other)]
    Unknown,
}

impl AspectRatio {
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Square => "1:1 square",
            Self::Wide => "16:9 wide landscape",
            Self::Tall | Self::Unknown => "9:16 tall vertical",
            Self::Landscape => "4:3 standard landscape",
            Self::Portrait => "3:4 standard portrait",
        }
    }
}

/// One full generation submission from the form. Built fresh per request and
/// never mutated after assembly.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateRequest {
    pub garment_image: ImageAsset,
    pub model_image: ImageAsset,
    #[serde(default)]
    pub background_image: Option<ImageAsset>,
    #[serde(default)]
    pub background: BackgroundChoice,
    #[serde(default)]
    pub age: AgeAdjustment,
    #[serde(default)]
    pub framing: ShotFraming,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub palette: Option<Vec<String>>, // hex strings, passed through verbatim
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefineRequest {
    pub instruction: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchSampleRequest {
    pub url: String,
}

/// A successful generation or refinement result.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneratedArtifact {
    pub image: String, // data URI
    pub directive: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub id: Uuid,
    pub history: Vec<GeneratedArtifact>, // newest first
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(), history: Vec::new(), created_at: now, updated_at: now }
    }

    /// History is append-only for the lifetime of the session, newest first.
    pub fn push_artifact(&mut self, artifact: GeneratedArtifact) {
        self.history.insert(0, artifact);
        self.updated_at = Utc::now();
    }

    pub fn latest(&self) -> Option<&GeneratedArtifact> {
        self.history.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn data_uri_round_trip() {
        let uri = "data:image/png;base64,QUJD";
        let asset = ImageAsset::from_data_uri(uri).unwrap();
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.data, "QUJD");
        assert_eq!(asset.to_data_uri(), uri);
    }

    #[test]
    fn data_uri_rejects_other_uris() {
        assert!(ImageAsset::from_data_uri("https://example.com/a.png").is_none());
        assert!(ImageAsset::from_data_uri("data:text/plain,hello").is_none());
    }

    #[test]
    fn history_is_newest_first() {
        let mut session = Session::new();
        for n in 0..3 {
            session.push_artifact(GeneratedArtifact {
                image: format!("data:image/png;base64,IMG{n}"),
                directive: String::new(),
                created_at: Utc::now(),
            });
        }
        assert_eq!(session.history.len(), 3);
        assert_eq!(session.history[0].image, "data:image/png;base64,IMG2");
        assert_eq!(session.history[2].image, "data:image/png;base64,IMG0");
        assert_eq!(session.latest().unwrap().image, "data:image/png;base64,IMG2");
    }

    #[test]
    fn option_enums_fall_back_on_unknown_wire_values() {
        let age: AgeAdjustment = serde_json::from_str("\"wizard\"").unwrap();
        assert_eq!(age, AgeAdjustment::Other);
        assert!(age.phrase().is_some());

        let bg: BackgroundChoice = serde_json::from_str("\"moon_base\"").unwrap();
        assert_eq!(bg, BackgroundChoice::Other);

        let ratio: AspectRatio = serde_json::from_str("\"2:1\"").unwrap();
        assert_eq!(ratio, AspectRatio::Unknown);
        assert_eq!(ratio.phrase(), "9:16 tall vertical");
    }

    #[test]
    fn aspect_ratio_uses_ratio_wire_names() {
        assert_eq!(serde_json::to_string(&AspectRatio::Tall).unwrap(), "\"9:16\"");
        let ratio: AspectRatio = serde_json::from_str("\"4:3\"").unwrap();
        assert_eq!(ratio, AspectRatio::Landscape);
    }
}
