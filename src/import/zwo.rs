//! `.zwo` document decoder
//!
//! Maps the direct children of `<workout>` onto [`Segment`] variants via a
//! closed attribute table. Unknown segment elements are skipped with a
//! warning; nested elements such as `<textevent>` are ignored.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::ImportFormat;
use crate::error::{CodecError, Result};
use crate::models::{Segment, Workout};
use crate::selection::extract_week_day;

pub const ROOT_ELEMENT: &str = "workout_file";

/// Decode a `.zwo` document
pub fn decode(content: &str) -> std::result::Result<Workout, CodecError> {
    let mut reader = Reader::from_str(content);

    let mut open: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut name: Option<String> = None;
    let mut author: Option<String> = None;
    let mut description: Option<String> = None;
    let mut sport_type: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut seen_workout = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(|err| CodecError::InvalidXml {
            position: reader.buffer_position(),
            reason: err.to_string(),
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let element = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match open.len() {
                    0 => {
                        if element != ROOT_ELEMENT || seen_root {
                            return Err(CodecError::UnexpectedRoot { found: element });
                        }
                        seen_root = true;
                    }
                    1 => match element.as_str() {
                        "workout" => seen_workout = true,
                        "name" => name = Some(String::new()),
                        "author" => author = Some(String::new()),
                        "description" => description = Some(String::new()),
                        "sportType" => sport_type = Some(String::new()),
                        _ => {}
                    },
                    2 => match open[1].as_str() {
                        "workout" => {
                            if let Some(segment) = decode_segment(&element, e)? {
                                segments.push(segment);
                            }
                        }
                        "tags" if element == "tag" => {
                            let attrs = SegmentAttributes::collect(&element, e)?;
                            if let Some(tag) = attrs.raw("name") {
                                tags.push(tag.to_string());
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }

                if !is_empty {
                    open.push(element);
                }
            }
            // Text is kept verbatim; whitespace between elements lands
            // outside the text slots and is dropped
            Event::Text(ref e) if open.len() == 2 => {
                let slot = match open[1].as_str() {
                    "name" => &mut name,
                    "author" => &mut author,
                    "description" => &mut description,
                    "sportType" => &mut sport_type,
                    _ => continue,
                };
                let text = e.unescape().map_err(|err| CodecError::InvalidXml {
                    position: reader.buffer_position(),
                    reason: err.to_string(),
                })?;
                slot.get_or_insert_with(String::new).push_str(&text);
            }
            Event::CData(ref e) if open.len() == 2 => {
                let slot = match open[1].as_str() {
                    "name" => &mut name,
                    "author" => &mut author,
                    "description" => &mut description,
                    _ => continue,
                };
                slot.get_or_insert_with(String::new)
                    .push_str(&String::from_utf8_lossy(e));
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(CodecError::InvalidXml {
            position: content.len(),
            reason: format!("unexpected end of document inside <{}>", open.join("><")),
        });
    }
    if !seen_root {
        return Err(CodecError::MissingElement {
            element: ROOT_ELEMENT.to_string(),
        });
    }
    if !seen_workout {
        return Err(CodecError::MissingElement {
            element: "workout".to_string(),
        });
    }
    let name = name.ok_or_else(|| CodecError::MissingElement {
        element: "name".to_string(),
    })?;
    if let Some(sport) = sport_type.filter(|sport| !sport.trim().eq_ignore_ascii_case("bike")) {
        warn!(sport_type = %sport, "Workout is not a bike workout");
    }

    debug!(name = %name, segments = segments.len(), "Decoded workout document");

    let mut workout = Workout::new(name, segments);
    workout.author = author.unwrap_or_default();
    workout.description = description.unwrap_or_default();
    workout.tags = tags;
    Ok(workout)
}

fn decode_segment(element: &str, event: &BytesStart<'_>) -> std::result::Result<Option<Segment>, CodecError> {
    let attrs = SegmentAttributes::collect(element, event)?;

    let segment = match element {
        "Warmup" => Segment::Warmup {
            duration_s: attrs.required_u32("Duration")?,
            power_low: attrs.required_power("PowerLow")?,
            power_high: attrs.required_power("PowerHigh")?,
            cadence: attrs.optional_u32("Cadence")?,
        },
        "Cooldown" => Segment::Cooldown {
            duration_s: attrs.required_u32("Duration")?,
            power_low: attrs.required_power("PowerLow")?,
            power_high: attrs.required_power("PowerHigh")?,
            cadence: attrs.optional_u32("Cadence")?,
        },
        "Ramp" => Segment::Ramp {
            duration_s: attrs.required_u32("Duration")?,
            power_low: attrs.required_power("PowerLow")?,
            power_high: attrs.required_power("PowerHigh")?,
            cadence: attrs.optional_u32("Cadence")?,
        },
        "SteadyState" => Segment::Steady {
            duration_s: attrs.required_u32("Duration")?,
            power: attrs.required_power("Power")?,
            cadence: attrs.optional_u32("Cadence")?,
        },
        "IntervalsT" => Segment::Intervals {
            repeat: attrs.required_u32("Repeat")?,
            on_duration_s: attrs.required_u32("OnDuration")?,
            off_duration_s: attrs.required_u32("OffDuration")?,
            on_power: attrs.required_power("OnPower")?,
            off_power: attrs.required_power("OffPower")?,
        },
        "FreeRide" | "Freeride" => Segment::FreeRide {
            duration_s: attrs.required_u32("Duration")?,
        },
        other => {
            warn!(element = %other, "Skipping unknown workout element");
            return Ok(None);
        }
    };

    Ok(Some(segment))
}

/// Attribute values of one element, looked up by name
struct SegmentAttributes {
    element: String,
    values: Vec<(String, String)>,
}

impl SegmentAttributes {
    fn collect(element: &str, event: &BytesStart<'_>) -> std::result::Result<Self, CodecError> {
        let mut values = Vec::new();
        for attr in event.attributes() {
            let attr = attr.map_err(|err| CodecError::InvalidXml {
                position: 0,
                reason: format!("bad attribute on <{}>: {}", element, err),
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            values.push((key, value));
        }
        Ok(Self {
            element: element.to_string(),
            values,
        })
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).map(str::trim)
    }

    fn required(&self, key: &str) -> std::result::Result<&str, CodecError> {
        self.get(key).ok_or_else(|| CodecError::MissingAttribute {
            element: self.element.clone(),
            attribute: key.to_string(),
        })
    }

    fn invalid(&self, key: &str, value: &str) -> CodecError {
        CodecError::InvalidAttribute {
            element: self.element.clone(),
            attribute: key.to_string(),
            value: value.to_string(),
        }
    }

    fn parse_u32(&self, key: &str, value: &str) -> std::result::Result<u32, CodecError> {
        if let Ok(parsed) = value.parse::<u32>() {
            return Ok(parsed);
        }
        // Some editors write whole seconds as "600.0"
        match value.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed >= 0.0 && parsed.fract() == 0.0 && parsed <= u32::MAX as f64 => {
                Ok(parsed as u32)
            }
            _ => Err(self.invalid(key, value)),
        }
    }

    fn required_u32(&self, key: &str) -> std::result::Result<u32, CodecError> {
        let value = self.required(key)?;
        self.parse_u32(key, value)
    }

    fn optional_u32(&self, key: &str) -> std::result::Result<Option<u32>, CodecError> {
        self.get(key).map(|value| self.parse_u32(key, value)).transpose()
    }

    fn required_power(&self, key: &str) -> std::result::Result<f32, CodecError> {
        let value = self.required(key)?;
        match value.parse::<f32>() {
            Ok(power) if power.is_finite() => Ok(power),
            _ => Err(self.invalid(key, value)),
        }
    }
}

/// `.zwo` file importer
pub struct ZwoImporter;

impl ZwoImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZwoImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for ZwoImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zwo"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Workout> {
        let content = fs::read_to_string(file_path)?;
        let mut workout = decode(&content)?;

        let stem = file_path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let (name_week, name_day) = extract_week_day(&workout.name);
        let (stem_week, stem_day) = extract_week_day(stem);
        workout.week_number = name_week.or(stem_week);
        workout.day_of_week = name_day.or(stem_day);
        workout.source = Some(file_path.to_path_buf());
        Ok(workout)
    }

    fn get_format_name(&self) -> &'static str {
        "ZWO"
    }
}
