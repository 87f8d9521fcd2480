use serde::{Deserialize, Serialize};

/// Operation selected by the `type` tag of a processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Merge,
    Split,
    Compress,
    Watermark,
    Rotate,
    /// Any tag not listed above; processed as a passthrough
    #[serde(other)]
    Unknown,
}

impl OperationType {
    /// Parse a tag, mapping unrecognised values to [`OperationType::Unknown`]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "merge" => Self::Merge,
            "split" => Self::Split,
            "compress" => Self::Compress,
            "watermark" => Self::Watermark,
            "rotate" => Self::Rotate,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Compress => "compress",
            Self::Watermark => "watermark",
            Self::Rotate => "rotate",
            Self::Unknown => "unknown",
        }
    }
}

/// Options for a single-document processing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    #[serde(rename = "type")]
    pub operation: OperationType,
    /// 1-based page numbers; out-of-range values are skipped by split
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
    /// Degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_angle: Option<f64>,
    /// Accepted for compatibility; compression does not use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<f64>,
}

impl ProcessingOptions {
    pub fn new(operation: OperationType) -> Self {
        Self {
            operation,
            pages: None,
            watermark_text: None,
            rotation_angle: None,
            compression_level: None,
        }
    }
}

/// Outcome of a processing call.
///
/// Built only through [`ProcessingResult::success`] or
/// [`ProcessingResult::failure`], so `data` is set exactly when `success` is
/// true and `error` exactly when it is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_size: Option<usize>,
}

impl ProcessingResult {
    pub fn success(data: Vec<u8>, original_size: usize) -> Self {
        let processed_size = data.len();
        Self {
            success: true,
            data: Some(data),
            error: None,
            original_size: Some(original_size),
            processed_size: Some(processed_size),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            original_size: None,
            processed_size: None,
        }
    }
}

/// Human-readable label for a processing type tag
pub fn processing_type_display_name(tag: &str) -> String {
    match tag {
        "merge" => "Merge PDFs",
        "split" => "Split PDF",
        "compress" => "Compress PDF",
        "watermark" => "Add Watermark",
        "rotate" => "Rotate PDF",
        "upload" => "File Upload",
        other => other,
    }
    .to_string()
}
