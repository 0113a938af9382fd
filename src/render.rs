//! Indented text reports.
//!
//! Rendering is a pure function of its inputs: the same event, record and enrichment always produce the same lines.
//! Missing enrichment renders as `unknown` instead of failing.

use chrono::SecondsFormat;

use crate::gatt::{CharacteristicDescriptor, ServiceDescriptor};
use crate::hexcodec::Hex;
use crate::resolver::{EnrichmentResult, Identifier, LookupAttempt, LookupPath};
use crate::{AdvertisementEvent, AdvertisementRecord, Enrichment, ParseError};

/// Report layout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Text repeated once per indentation level
    pub indent_unit: &'static str,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { indent_unit: "    " }
    }
}

struct Lines<'a> {
    out: Vec<String>,
    options: &'a RenderOptions,
}

impl<'a> Lines<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        Lines {
            out: Vec::new(),
            options,
        }
    }

    fn push(&mut self, level: usize, text: impl std::fmt::Display) {
        self.out.push(format!("{}{}", self.options.indent_unit.repeat(level), text));
    }
}

/// Renders a full report for one event: the event header at `indent`, and the decoded record and device enrichment
/// one level deeper.
pub fn render(
    event: &AdvertisementEvent,
    record: &AdvertisementRecord,
    enrichment: &Enrichment,
    indent: usize,
    options: &RenderOptions,
) -> Vec<String> {
    let mut lines = Lines::new(options);

    lines.push(indent, "-- Beacon ----------");
    lines.push(indent, event.kind.name());
    lines.push(indent, format_args!("BluetoothAddress: {:X}", event.address));
    lines.push(indent, format_args!("Raw Signal Strength In DBm: {}", event.rssi));
    lines.push(
        indent,
        format_args!(
            "Timestamp: {}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
    );

    write_record(&mut lines, record, enrichment, indent + 1);

    if let Some(device) = enrichment.get(&Identifier::Device(event.address)) {
        lines.push(indent + 1, "Device:");
        write_enrichment(&mut lines, Some(device), indent + 2);
    }

    lines.out
}

/// Renders just the decoded advertisement with `indent` as its outermost level.
pub fn render_record(
    record: &AdvertisementRecord,
    enrichment: &Enrichment,
    indent: usize,
    options: &RenderOptions,
) -> Vec<String> {
    let mut lines = Lines::new(options);
    write_record(&mut lines, record, enrichment, indent);
    lines.out
}

/// Renders the line reporting a payload that could not be decoded to the end.
pub fn render_parse_error(err: &ParseError, indent: usize, options: &RenderOptions) -> String {
    format!("{}Parse Error: {}", options.indent_unit.repeat(indent), err)
}

fn write_record(lines: &mut Lines<'_>, record: &AdvertisementRecord, enrichment: &Enrichment, level: usize) {
    lines.push(level, format_args!("Local Name: {}", record.local_name.as_deref().unwrap_or("")));

    lines.push(level, "Service Uuids:");
    for uuid in &record.services {
        lines.push(level + 1, uuid);
        write_enrichment(lines, enrichment.get(&Identifier::Service(*uuid)), level + 2);
    }

    lines.push(level, "Flags:");
    match record.flags {
        Some(flags) => lines.push(level + 1, flags),
        None => lines.push(level + 1, "null"),
    }

    lines.push(level, "Manufacturer Data:");
    for mfg in &record.manufacturer_data {
        lines.push(level + 1, format_args!("Company Id {:X}", mfg.company_id));
        lines.push(level + 1, "Data:");
        lines.push(level + 1, Hex(&mfg.data));
    }

    lines.push(level, "Data Sections:");
    for section in &record.data_sections {
        lines.push(level + 1, format_args!("Data Type {:X}", section.ad_type));
        lines.push(level + 1, "Data:");
        lines.push(level + 1, Hex(&section.data));
    }

    if !record.warnings.is_empty() {
        lines.push(level, "Warnings:");
        for warning in &record.warnings {
            lines.push(level + 1, warning);
        }
    }
}

fn write_enrichment(lines: &mut Lines<'_>, result: Option<&EnrichmentResult>, level: usize) {
    let Some(result) = result else {
        lines.push(level, "Lookup: unknown");
        return;
    };

    match &result.services {
        Ok(services) => {
            lines.push(level, "Services:");
            for service in services {
                write_service(lines, service, level + 1);
            }
        }
        Err(err) => lines.push(level, format_args!("Lookup Failed: {err}")),
    }

    for attempt in &result.attempts {
        write_attempt(lines, attempt, level);
    }
}

fn write_service(lines: &mut Lines<'_>, service: &ServiceDescriptor, level: usize) {
    lines.push(level, format_args!("Service {}:", service.uuid));
    lines.push(level + 1, "Characteristics:");
    for characteristic in &service.characteristics {
        write_characteristic(lines, characteristic, level + 2);
    }
}

fn write_characteristic(lines: &mut Lines<'_>, characteristic: &CharacteristicDescriptor, level: usize) {
    lines.push(level, format_args!("Characteristic {}", characteristic.uuid));
    match &characteristic.description {
        Ok(description) => lines.push(
            level + 1,
            format_args!("Char. Description:{}", description.as_deref().unwrap_or("")),
        ),
        Err(err) => lines.push(level + 1, format_args!("Char. Description Failed: {err}")),
    }
}

fn write_attempt(lines: &mut Lines<'_>, attempt: &LookupAttempt, level: usize) {
    let path = match attempt.path {
        LookupPath::ByUuid => "Service Lookup",
        LookupPath::ByAddress => "Device Lookup",
    };
    match attempt.outcome {
        Ok(found) => lines.push(level, format_args!("{path}: Found {found}")),
        Err(err) => lines.push(level, format_args!("{path}: {err}")),
    }
}
