use std::collections::HashMap;
use std::time::{Duration, Instant};

use adlens::btuuid::bluetooth_uuid_from_u16;
use adlens::hexcodec;
use adlens::watcher::{process_batch, process_event, Watcher};
use adlens::*;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

const BATTERY: Uuid = bluetooth_uuid_from_u16(0x180F);
const EDDYSTONE: Uuid = bluetooth_uuid_from_u16(0xFEAA);

const BUTTON: Address = Address::new(0x80E4DA701234);
const BEACON: Address = Address::new(0xC4F3120A0B0C);
const SILENT: Address = Address::new(0x0A0B0C0D0E0F);

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Peripherals by address. Addresses missing from the table never answer.
struct Peripherals {
    devices: HashMap<Address, Result<Vec<ServiceDescriptor>, LookupError>>,
    denied_uuids: Vec<Uuid>,
}

impl Peripherals {
    fn new() -> Self {
        Peripherals {
            devices: HashMap::from([
                (
                    BUTTON,
                    Ok(vec![ServiceDescriptor {
                        uuid: BATTERY,
                        characteristics: vec![
                            CharacteristicDescriptor::described(bluetooth_uuid_from_u16(0x2A19), "Battery Level"),
                            CharacteristicDescriptor {
                                uuid: bluetooth_uuid_from_u16(0x2A1B),
                                description: Err(LookupError::AccessDenied),
                            },
                        ],
                    }]),
                ),
                (BEACON, Err(LookupError::AccessDenied)),
            ]),
            denied_uuids: vec![EDDYSTONE],
        }
    }
}

#[async_trait]
impl GattClient for Peripherals {
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<ServiceDescriptor, LookupError> {
        if self.denied_uuids.contains(&uuid) {
            return Err(LookupError::AccessDenied);
        }
        self.devices
            .values()
            .flatten()
            .flatten()
            .find(|s| s.uuid == uuid)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn lookup_by_address(&self, address: Address) -> Result<Vec<ServiceDescriptor>, LookupError> {
        match self.devices.get(&address) {
            Some(found) => found.clone(),
            None => futures_lite::future::pending().await,
        }
    }
}

fn event(address: Address, payload: &str) -> AdvertisementEvent {
    AdvertisementEvent {
        address,
        kind: AdvertisementKind::Connectable,
        rssi: -60,
        timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        payload: hexcodec::decode(payload).unwrap(),
    }
}

#[tokio::test]
async fn button_report_includes_characteristics() {
    init_tracing();
    let resolver = Resolver::new(Peripherals::new(), ResolverConfig::default());

    let lines = process_event(
        &event(BUTTON, "020106 03030F18 0709466C69632032"),
        &resolver,
        &RenderOptions::default(),
        &CancelToken::never(),
    )
    .await;

    let expected = [
        "-- Beacon ----------",
        "Connectable",
        "BluetoothAddress: 80E4DA701234",
        "Raw Signal Strength In DBm: -60",
        "Timestamp: 2025-01-02T03:04:05.000Z",
        "    Local Name: Flic 2",
        "    Service Uuids:",
        "        0000180f-0000-1000-8000-00805f9b34fb",
        "            Services:",
        "                Service 0000180f-0000-1000-8000-00805f9b34fb:",
        "                    Characteristics:",
        "                        Characteristic 00002a19-0000-1000-8000-00805f9b34fb",
        "                            Char. Description:Battery Level",
        "                        Characteristic 00002a1b-0000-1000-8000-00805f9b34fb",
        "                            Char. Description Failed: AccessDenied",
        "            Service Lookup: Found 1",
        "            Device Lookup: Found 1",
        "    Flags:",
        "        (0x6) GeneralDiscoverableMode, ClassicNotSupported",
        "    Manufacturer Data:",
        "    Data Sections:",
        "    Device:",
        "        Services:",
        "            Service 0000180f-0000-1000-8000-00805f9b34fb:",
        "                Characteristics:",
        "                    Characteristic 00002a19-0000-1000-8000-00805f9b34fb",
        "                        Char. Description:Battery Level",
        "                    Characteristic 00002a1b-0000-1000-8000-00805f9b34fb",
        "                        Char. Description Failed: AccessDenied",
        "        Device Lookup: Found 1",
    ];
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn denied_lookup_renders_as_access_denied() {
    init_tracing();
    let resolver = Resolver::new(Peripherals::new(), ResolverConfig::default());

    let lines = process_event(
        &event(BEACON, "020106 0303AAFE"),
        &resolver,
        &RenderOptions::default(),
        &CancelToken::never(),
    )
    .await;

    assert!(lines.contains(&"            Lookup Failed: AccessDenied".to_string()));
    assert!(lines.contains(&"            Service Lookup: AccessDenied".to_string()));
    assert!(lines.contains(&"            Device Lookup: AccessDenied".to_string()));
    assert!(lines.contains(&"        Lookup Failed: AccessDenied".to_string()));
}

#[tokio::test]
async fn budget_turns_unresponsive_lookups_into_timeouts() {
    init_tracing();
    let config = ResolverConfig {
        lookup_timeout: Duration::from_secs(30),
        batch_budget: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let resolver = Resolver::new(Peripherals::new(), config);
    let events = [
        event(SILENT, "020106 03030F18"),
        event(BUTTON, "020106 03030F18"),
    ];

    let started = Instant::now();
    let reports = process_batch(&events, &resolver, &RenderOptions::default(), &CancelToken::never()).await;
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(reports.len(), 2);
    let silent = &reports[0];
    assert!(silent.contains(&"            Services:".to_string()));
    assert!(silent.contains(&"            Device Lookup: Timeout".to_string()));
    assert!(silent.contains(&"        Lookup Failed: Timeout".to_string()));

    let button = &reports[1];
    assert!(button.contains(&"            Device Lookup: Found 1".to_string()));
    assert!(!button.iter().any(|l| l.contains("Timeout")));
}

#[tokio::test]
async fn bad_payload_does_not_block_batch() {
    init_tracing();
    let sink = MemorySink::new();
    let watcher = Watcher::new(Peripherals::new(), sink.clone());
    let batch = vec![
        event(BUTTON, "0509FFFE"),
        event(BEACON, "0309FFFE 05FF4C000215"),
    ];

    watcher.handle_batch(&batch, &CancelToken::never()).await;

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports[0]
        .last()
        .is_some_and(|l| l.starts_with("    Parse Error: truncated AD structure")));
    assert!(reports[1].contains(&"        Company Id 4C".to_string()));
    assert!(reports[1].contains(&"        0215".to_string()));
    assert!(reports[1].contains(&"        local name in AD type 0x09 is not valid UTF-8".to_string()));
}

#[test]
fn rendering_twice_is_identical() {
    let ev = event(BUTTON, "020106 03030F18 05FF4C000215 020AF4");
    let record = parse(&ev.payload).unwrap();
    let enrichment: Enrichment = [EnrichmentResult::timed_out(Identifier::Service(BATTERY))]
        .into_iter()
        .collect();

    let once = render(&ev, &record, &enrichment, 0, &RenderOptions::default());
    let twice = render(&ev, &record, &enrichment, 0, &RenderOptions::default());
    assert_eq!(once, twice);
    assert!(once.contains(&"        Data Type A".to_string()));
}
