// Core domain types shared across all Cutsync crates.
//
// The on-disk document format is JSON with camelCase keys, matching what
// the editing surface and automation scripts read and write directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved prefix marking a project id as a deleted placeholder. Writes
/// targeting such an id must be rejected outright.
pub const DELETED_ID_PREFIX: &str = "deleted_";

/// Track name used for in-flight voiceover generation placeholders.
pub const VOICE_PLACEHOLDER_TRACK: &str = "AI Voice (generating...)";
/// Track name used for in-flight subtitle generation placeholders.
pub const SUBTITLE_PLACEHOLDER_TRACK: &str = "AI Subtitles (generating...)";

/// Stable internal project identity. Folder names on disk may change with
/// the display name; the id never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this id carries the deleted-placeholder sentinel prefix.
    pub fn is_deleted_sentinel(&self) -> bool {
        self.0.is_empty() || self.0.starts_with(DELETED_ID_PREFIX)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Project metadata: identity, display name, canvas and scene configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub canvas_size: CanvasSize,
    #[serde(default = "default_canvas_mode")]
    pub canvas_mode: String,
    #[serde(default = "default_background_type")]
    pub background_type: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub markers: Vec<f64>,
}

fn default_fps() -> f64 {
    30.0
}

fn default_canvas_mode() -> String {
    "preset".to_string()
}

fn default_background_type() -> String {
    "color".to_string()
}

fn default_background_color() -> String {
    "#000000".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self { width: 1920, height: 1080 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_main: bool,
}

/// Track type. Determines which elements the track carries and which
/// placeholder results it can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Media,
    Text,
    Audio,
}

/// An ordered lane of timeline elements. Track identity is the id; position
/// in the track list carries no meaning across reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub is_main: bool,
}

impl Track {
    /// True when this track holds in-flight job placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder_kind().is_some()
    }

    pub fn placeholder_kind(&self) -> Option<PlaceholderKind> {
        match self.name.as_str() {
            VOICE_PLACEHOLDER_TRACK => Some(PlaceholderKind::Voice),
            SUBTITLE_PLACEHOLDER_TRACK => Some(PlaceholderKind::Subtitle),
            _ => None,
        }
    }
}

/// The kind of asynchronous job a placeholder track stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Text-to-speech: resolved by an audio or media element.
    Voice,
    /// Transcription/subtitles: resolved by a text element.
    Subtitle,
}

impl PlaceholderKind {
    /// Track kinds on which a real result for this placeholder can appear.
    pub fn resolving_track_kinds(self) -> &'static [TrackKind] {
        match self {
            PlaceholderKind::Voice => &[TrackKind::Audio, TrackKind::Media],
            PlaceholderKind::Subtitle => &[TrackKind::Text],
        }
    }
}

/// A positioned timeline entry. Media elements reference an asset by id;
/// text elements carry their content and style inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Media(MediaElement),
    Text(TextElement),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::Media(e) => &e.id,
            Element::Text(e) => &e.id,
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            Element::Media(e) => e.start_time,
            Element::Text(e) => e.start_time,
        }
    }

    pub fn set_start_time(&mut self, start_time: f64) {
        match self {
            Element::Media(e) => e.start_time = start_time,
            Element::Text(e) => e.start_time = start_time,
        }
    }

    /// Text content, if this is a text element.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Element::Media(_) => None,
            Element::Text(e) => Some(&e.content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElement {
    pub id: String,
    /// Must resolve in the same snapshot's assets list, or the element is
    /// unplayable.
    pub asset_id: String,
    #[serde(default)]
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub trim_start: f64,
    #[serde(default)]
    pub trim_end: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: String,
    pub content: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub trim_start: f64,
    #[serde(default)]
    pub trim_end: f64,
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Inline style for a text element. Defaults match the editor's subtitle
/// presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextStyle {
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
    pub background_color: String,
    pub text_align: String,
    pub font_weight: String,
    pub font_style: String,
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            x: 960.0,
            y: 900.0,
            font_size: 48.0,
            font_family: "Arial".to_string(),
            color: "#FFFFFF".to_string(),
            background_color: "rgba(0,0,0,0.7)".to_string(),
            text_align: "center".to_string(),
            font_weight: "normal".to_string(),
            font_style: "normal".to_string(),
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
    Audio,
}

/// A named media reference in the project's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// The full serializable document for one project. Consumers replace-compare
/// whole snapshots; nothing patches field-by-field across process boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: Project,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Snapshot {
    /// Synthesize the clean document used when switching to a project id
    /// that has never been seen: three empty default tracks, no assets.
    pub fn default_for(project_id: ProjectId, now: DateTime<Utc>) -> Self {
        let name = project_id.as_str().to_string();
        Self {
            project: Project {
                id: project_id,
                name,
                created_at: now,
                updated_at: now,
                fps: default_fps(),
                canvas_size: CanvasSize::default(),
                canvas_mode: default_canvas_mode(),
                background_type: default_background_type(),
                background_color: default_background_color(),
                scenes: vec![Scene {
                    id: format!("scene_{}", now.timestamp_millis()),
                    name: "Main Scene".to_string(),
                    is_main: true,
                }],
                markers: Vec::new(),
            },
            tracks: vec![
                Track {
                    id: "main-track".to_string(),
                    name: "Main Track".to_string(),
                    kind: TrackKind::Media,
                    elements: Vec::new(),
                    muted: false,
                    is_main: true,
                },
                Track {
                    id: "text-track".to_string(),
                    name: "Text Track".to_string(),
                    kind: TrackKind::Text,
                    elements: Vec::new(),
                    muted: false,
                    is_main: false,
                },
                Track {
                    id: "audio-track".to_string(),
                    name: "Audio Track".to_string(),
                    kind: TrackKind::Audio,
                    elements: Vec::new(),
                    muted: false,
                    is_main: false,
                },
            ],
            assets: Vec::new(),
        }
    }

    /// Lookup an asset by id.
    pub fn asset(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == asset_id)
    }
}
