//! JSON documents printed or written by the CLI.

use serde::Serialize;
use serde_json::{Map, Value as Json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use wirepack_core::{ByteOrder, Layout, Packet, PacketError, Value};

/// Current capture report schema version.
pub const REPORT_VERSION: u32 = 1;

/// Derived layout as shown by `wirepack inspect`.
#[derive(Debug, Serialize)]
pub struct LayoutView<'a> {
    pub name: &'a str,
    pub byte_order: ByteOrder,
    pub format: &'a str,
    pub header_len: usize,
    pub fields: Vec<FieldView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FieldView<'a> {
    pub name: &'a str,
    pub format: &'a str,
    pub offset: usize,
    pub size: usize,
    pub default: &'a Value,
}

impl<'a> LayoutView<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self {
            name: layout.name(),
            byte_order: layout.byte_order(),
            format: layout.format(),
            header_len: layout.header_len(),
            fields: layout
                .fields()
                .iter()
                .map(|field| FieldView {
                    name: field.name(),
                    format: field.code(),
                    offset: field.offset(),
                    size: field.size(),
                    default: field.default(),
                })
                .collect(),
        }
    }
}

/// Result of decoding every frame of a capture with one layout.
#[derive(Debug, Serialize)]
pub struct CaptureReport {
    pub report_version: u32,
    pub tool: ToolInfo,
    pub input: InputInfo,
    pub layout: String,
    /// Bytes skipped at the start of every frame before decoding.
    pub offset: usize,
    pub summary: CaptureSummary,
    pub frames: Vec<FrameRecord>,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "wirepack".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InputInfo {
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct CaptureSummary {
    pub frames_total: u64,
    pub decoded: u64,
    pub need_data: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    Decoded,
    NeedData,
    Error,
}

#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub linktype: i32,
    pub status: FrameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameRecord {
    pub fn new(
        index: u64,
        ts: Option<String>,
        linktype: i32,
        decoded: Result<Packet, PacketError>,
    ) -> Result<Self, serde_json::Error> {
        let mut record = Self {
            index,
            ts,
            linktype,
            status: FrameStatus::Decoded,
            fields: None,
            payload_len: None,
            error: None,
        };
        match decoded {
            Ok(packet) => {
                let mut fields = Map::new();
                for (name, value) in packet.fields() {
                    fields.insert(name.to_string(), serde_json::to_value(value)?);
                }
                record.fields = Some(fields);
                record.payload_len = Some(packet.payload().len());
            }
            Err(err) => {
                record.status = if err.is_need_data() {
                    FrameStatus::NeedData
                } else {
                    FrameStatus::Error
                };
                record.error = Some(err.to_string());
            }
        }
        Ok(record)
    }
}

impl CaptureSummary {
    pub fn record(&mut self, frame: &FrameRecord) {
        self.frames_total += 1;
        match frame.status {
            FrameStatus::Decoded => self.decoded += 1,
            FrameStatus::NeedData => self.need_data += 1,
            FrameStatus::Error => self.errors += 1,
        }
        if let Some(ts) = &frame.ts {
            if self.time_start.is_none() {
                self.time_start = Some(ts.clone());
            }
            self.time_end = Some(ts.clone());
        }
    }
}

/// RFC3339 rendering; frames without a representable time carry none.
pub fn format_timestamp(ts: Option<OffsetDateTime>) -> Option<String> {
    ts.and_then(|ts| ts.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;
    use wirepack_core::{ByteOrder, Layout, Packet};

    use super::{CaptureSummary, FrameRecord, FrameStatus, LayoutView, format_timestamp};

    fn layout() -> Arc<Layout> {
        Arc::new(Layout::derive("T", ByteOrder::Big, [("a", "H", 0u16), ("b", "B", 0u16)]).unwrap())
    }

    #[test]
    fn layout_view_lists_offsets() {
        let layout = layout();
        let view = serde_json::to_value(LayoutView::new(&layout)).unwrap();
        assert_eq!(view["format"], ">HB");
        assert_eq!(view["byte_order"], "big");
        assert_eq!(view["fields"][1]["offset"], 2);
        assert_eq!(view["fields"][1]["size"], 1);
    }

    #[test]
    fn frame_records_track_status() {
        let layout = layout();
        let decoded = FrameRecord::new(0, None, 1, Packet::from_bytes(&layout, &[0, 1, 2, 3])).unwrap();
        assert_eq!(decoded.status, FrameStatus::Decoded);
        assert_eq!(decoded.payload_len, Some(1));
        let short = FrameRecord::new(1, None, 1, Packet::from_bytes(&layout, &[0])).unwrap();
        assert_eq!(short.status, FrameStatus::NeedData);

        let mut summary = CaptureSummary::default();
        summary.record(&decoded);
        summary.record(&short);
        assert_eq!((summary.frames_total, summary.decoded, summary.need_data), (2, 1, 1));
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let ts = OffsetDateTime::from_unix_timestamp(0).ok();
        assert_eq!(format_timestamp(ts).as_deref(), Some("1970-01-01T00:00:00Z"));
    }
}
