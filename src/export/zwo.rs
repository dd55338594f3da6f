use std::fs;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::adjustment::AdjustmentReport;
use crate::error::{CodecError, Result};
use crate::import::zwo::ROOT_ELEMENT;
use crate::models::{Segment, Workout};

const SPORT_TYPE: &str = "bike";

impl From<quick_xml::Error> for CodecError {
    fn from(err: quick_xml::Error) -> Self {
        CodecError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Encode a workout with no modification notes
pub fn encode(workout: &Workout) -> std::result::Result<String, CodecError> {
    ZwoExporter::generate_zwo_xml(workout, None)
}

pub struct ZwoExporter;

impl ZwoExporter {
    pub fn export_workout(workout: &Workout, report: Option<&AdjustmentReport>, path: &Path) -> Result<()> {
        let xml = Self::generate_zwo_xml(workout, report)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, xml)?;
        Ok(())
    }

    /// Render the document. A report that changed the workout adds two
    /// informational comments ahead of the metadata.
    pub fn generate_zwo_xml(
        workout: &Workout,
        report: Option<&AdjustmentReport>,
    ) -> std::result::Result<String, CodecError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;

        if let Some(report) = report.filter(|r| r.is_modified()) {
            Self::write_modification_comments(&mut writer, report)?;
        }

        Self::write_text_element(&mut writer, "author", &workout.author)?;
        Self::write_text_element(&mut writer, "name", &workout.name)?;
        Self::write_text_element(&mut writer, "description", &workout.description)?;
        Self::write_text_element(&mut writer, "sportType", SPORT_TYPE)?;
        Self::write_tags(&mut writer, &workout.tags)?;
        Self::write_segments(&mut writer, &workout.segments)?;

        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|err| CodecError::Serialization {
            reason: err.to_string(),
        })
    }

    fn write_modification_comments<W: Write>(
        writer: &mut Writer<W>,
        report: &AdjustmentReport,
    ) -> std::result::Result<(), CodecError> {
        let durations = format!(
            " Original duration: {}min ({}s), new duration: {}min ({}s) ",
            report.original_duration_s / 60,
            report.original_duration_s,
            report.new_duration_s / 60,
            report.new_duration_s
        );
        writer.write_event(Event::Comment(BytesText::new(&durations)))?;

        let absorbed = format!(" Time removed from: {} ", report.cuts.summary());
        writer.write_event(Event::Comment(BytesText::new(&absorbed)))?;
        Ok(())
    }

    fn write_tags<W: Write>(writer: &mut Writer<W>, tags: &[String]) -> std::result::Result<(), CodecError> {
        if tags.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("tags")))?;
            return Ok(());
        }

        writer.write_event(Event::Start(BytesStart::new("tags")))?;
        for tag in tags {
            let mut element = BytesStart::new("tag");
            element.push_attribute(("name", tag.as_str()));
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("tags")))?;
        Ok(())
    }

    fn write_segments<W: Write>(writer: &mut Writer<W>, segments: &[Segment]) -> std::result::Result<(), CodecError> {
        if segments.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("workout")))?;
            return Ok(());
        }

        writer.write_event(Event::Start(BytesStart::new("workout")))?;
        for segment in segments {
            writer.write_event(Event::Empty(segment_element(segment)))?;
        }
        writer.write_event(Event::End(BytesEnd::new("workout")))?;
        Ok(())
    }

    fn write_text_element<W: Write>(
        writer: &mut Writer<W>,
        name: &str,
        value: &str,
    ) -> std::result::Result<(), CodecError> {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

fn format_power(power: f32) -> String {
    format!("{:.2}", power)
}

fn push_ramp_attributes(
    element: &mut BytesStart<'_>,
    duration_s: u32,
    power_low: f32,
    power_high: f32,
    cadence: Option<u32>,
) {
    element.push_attribute(("Duration", duration_s.to_string().as_str()));
    element.push_attribute(("PowerLow", format_power(power_low).as_str()));
    element.push_attribute(("PowerHigh", format_power(power_high).as_str()));
    if let Some(cadence) = cadence {
        element.push_attribute(("Cadence", cadence.to_string().as_str()));
    }
}

fn segment_element(segment: &Segment) -> BytesStart<'static> {
    match segment {
        Segment::Warmup {
            duration_s,
            power_low,
            power_high,
            cadence,
        } => {
            let mut element = BytesStart::new("Warmup");
            push_ramp_attributes(&mut element, *duration_s, *power_low, *power_high, *cadence);
            element
        }
        Segment::Cooldown {
            duration_s,
            power_low,
            power_high,
            cadence,
        } => {
            let mut element = BytesStart::new("Cooldown");
            push_ramp_attributes(&mut element, *duration_s, *power_low, *power_high, *cadence);
            element
        }
        Segment::Ramp {
            duration_s,
            power_low,
            power_high,
            cadence,
        } => {
            let mut element = BytesStart::new("Ramp");
            push_ramp_attributes(&mut element, *duration_s, *power_low, *power_high, *cadence);
            element
        }
        Segment::Steady {
            duration_s,
            power,
            cadence,
        } => {
            let mut element = BytesStart::new("SteadyState");
            element.push_attribute(("Duration", duration_s.to_string().as_str()));
            element.push_attribute(("Power", format_power(*power).as_str()));
            if let Some(cadence) = cadence {
                element.push_attribute(("Cadence", cadence.to_string().as_str()));
            }
            element
        }
        Segment::Intervals {
            repeat,
            on_duration_s,
            off_duration_s,
            on_power,
            off_power,
        } => {
            let mut element = BytesStart::new("IntervalsT");
            element.push_attribute(("Repeat", repeat.to_string().as_str()));
            element.push_attribute(("OnDuration", on_duration_s.to_string().as_str()));
            element.push_attribute(("OffDuration", off_duration_s.to_string().as_str()));
            element.push_attribute(("OnPower", format_power(*on_power).as_str()));
            element.push_attribute(("OffPower", format_power(*off_power).as_str()));
            element
        }
        Segment::FreeRide { duration_s } => {
            let mut element = BytesStart::new("FreeRide");
            element.push_attribute(("Duration", duration_s.to_string().as_str()));
            element.push_attribute(("FlatRoad", "1"));
            element
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustment::{AdjustmentStatus, CutBreakdown};
    use crate::import::zwo::decode;
    use tempfile::NamedTempFile;

    fn build_test_workout() -> Workout {
        Workout::new(
            "Week 1 Day 1 - Endurance",
            vec![
                Segment::Warmup {
                    duration_s: 600,
                    power_low: 0.5,
                    power_high: 0.75,
                    cadence: None,
                },
                Segment::Steady {
                    duration_s: 3600,
                    power: 0.73,
                    cadence: Some(90),
                },
                Segment::Intervals {
                    repeat: 4,
                    on_duration_s: 60,
                    off_duration_s: 120,
                    on_power: 0.88,
                    off_power: 0.73,
                },
                Segment::FreeRide { duration_s: 300 },
                Segment::Cooldown {
                    duration_s: 600,
                    power_low: 0.7,
                    power_high: 0.5,
                    cadence: None,
                },
            ],
        )
        .with_author("WhatsOnZwift")
        .with_description("Aerobic base & cadence")
        .with_tags(vec!["ENDURANCE".to_string()])
    }

    #[test]
    fn test_element_order_and_formatting() {
        let xml = encode(&build_test_workout()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<workout_file>"));
        let author = xml.find("<author>").unwrap();
        let name = xml.find("<name>").unwrap();
        let description = xml.find("<description>").unwrap();
        let sport = xml.find("<sportType>bike</sportType>").unwrap();
        let tags = xml.find("<tags>").unwrap();
        let workout = xml.find("<workout>").unwrap();
        assert!(author < name && name < description && description < sport && sport < tags && tags < workout);

        assert!(xml.contains("<Warmup Duration=\"600\" PowerLow=\"0.50\" PowerHigh=\"0.75\"/>"));
        assert!(xml.contains("<SteadyState Duration=\"3600\" Power=\"0.73\" Cadence=\"90\"/>"));
        assert!(xml.contains(
            "<IntervalsT Repeat=\"4\" OnDuration=\"60\" OffDuration=\"120\" OnPower=\"0.88\" OffPower=\"0.73\"/>"
        ));
        assert!(xml.contains("<FreeRide Duration=\"300\" FlatRoad=\"1\"/>"));
        assert!(xml.contains("        <tag name=\"ENDURANCE\"/>"));
        assert!(xml.contains("Aerobic base &amp; cadence"));
    }

    #[test]
    fn test_no_trailing_whitespace_or_crlf() {
        let xml = encode(&build_test_workout()).unwrap();
        assert!(!xml.contains('\r'));
        assert!(xml.lines().all(|line| line == line.trim_end()));
        assert!(xml.ends_with("</workout_file>"));
    }

    #[test]
    fn test_round_trip() {
        let workout = build_test_workout();
        let decoded = decode(&encode(&workout).unwrap()).unwrap();
        assert_eq!(decoded, workout);
    }

    #[test]
    fn test_empty_tags_and_segments() {
        let workout = Workout::new("Rest day", Vec::new());
        let xml = encode(&workout).unwrap();
        assert!(xml.contains("<tags/>"));
        assert!(xml.contains("<workout/>"));
        assert_eq!(decode(&xml).unwrap(), workout);
    }

    #[test]
    fn test_blank_and_padded_text_survive() {
        let spin = Segment::Steady {
            duration_s: 600,
            power: 0.70,
            cadence: None,
        };
        let workout = Workout::new("", vec![spin])
            .with_description("Easy spin. ")
            .with_author("  coach");
        let xml = encode(&workout).unwrap();
        assert!(xml.contains("<name></name>"));
        assert!(xml.contains("<description>Easy spin. </description>"));

        let decoded = decode(&xml).unwrap();
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.description, "Easy spin. ");
        assert_eq!(decoded, workout);
    }

    #[test]
    fn test_modification_comments() {
        let workout = build_test_workout();
        let report = AdjustmentReport {
            status: AdjustmentStatus::Modified,
            original_duration_s: 7200,
            new_duration_s: 4500,
            cuts: CutBreakdown {
                endurance_s: 2400,
                warmup_s: 300,
                cooldown_s: 0,
            },
            removed_segments: 0,
            shortfall_s: 0,
            overshoot_s: 0,
        };
        let xml = ZwoExporter::generate_zwo_xml(&workout, Some(&report)).unwrap();
        assert!(xml.contains("<!-- Original duration: 120min (7200s), new duration: 75min (4500s) -->"));
        assert!(xml.contains("<!-- Time removed from: endurance 2400s, warmup 300s -->"));

        // Comments are informational only
        assert_eq!(decode(&xml).unwrap(), workout);
    }

    #[test]
    fn test_export_to_disk() {
        let workout = build_test_workout();
        let file = NamedTempFile::new().unwrap();

        ZwoExporter::export_workout(&workout, None, file.path()).unwrap();

        let content = fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("Week 1 Day 1 - Endurance"));
    }
}
