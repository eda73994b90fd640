use serde::{Deserialize, Serialize};

use crate::whisper::transcriber::{Segment, TranscribeOutput};

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionDto {
    pub text: String,
    pub duration: Option<f64>,
    pub segments: Vec<TranscriptionSegment>,
    #[serde(rename = "debugFile")]
    pub debug_file: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDto {
    pub error: String,
}

impl From<Segment> for TranscriptionSegment {
    fn from(seg: Segment) -> Self {
        Self {
            start: seg.start,
            end: seg.end,
            text: seg.text,
        }
    }
}

impl TranscriptionDto {
    pub fn new(output: TranscribeOutput, debug_file: String) -> Self {
        Self {
            text: output.text,
            duration: output.duration,
            segments: output.segments.into_iter().map(Into::into).collect(),
            debug_file,
        }
    }
}
