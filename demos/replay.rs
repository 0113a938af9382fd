use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

use adlens::btuuid::bluetooth_uuid_from_u16;
use adlens::watcher::Watcher;
use adlens::{
    Address, AdvertisementEvent, AdvertisementKind, CancelToken, CharacteristicDescriptor, GattClient, LookupError,
    ResolverConfig, ServiceDescriptor, TracingSink, Uuid,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use tracing::metadata::LevelFilter;

/// Answers lookups from a fixed table, as if the peripherals had been probed earlier.
struct RecordedGatt {
    devices: HashMap<Address, Result<Vec<ServiceDescriptor>, LookupError>>,
}

#[async_trait]
impl GattClient for RecordedGatt {
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<ServiceDescriptor, LookupError> {
        self.devices
            .values()
            .flatten()
            .flatten()
            .find(|s| s.uuid == uuid)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn lookup_by_address(&self, address: Address) -> Result<Vec<ServiceDescriptor>, LookupError> {
        self.devices.get(&address).cloned().unwrap_or(Err(LookupError::NotFound))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let button = Address::new(0x80E4DA701234);
    let beacon = Address::new(0xC4F3120A0B0C);

    let gatt = RecordedGatt {
        devices: HashMap::from([
            (
                button,
                Ok(vec![ServiceDescriptor {
                    uuid: bluetooth_uuid_from_u16(0x180F),
                    characteristics: vec![CharacteristicDescriptor::described(
                        bluetooth_uuid_from_u16(0x2A19),
                        "Battery Level",
                    )],
                }]),
            ),
            (beacon, Err(LookupError::AccessDenied)),
        ]),
    };

    let batch = vec![
        AdvertisementEvent {
            address: button,
            kind: AdvertisementKind::Connectable,
            rssi: -58,
            timestamp: Utc::now(),
            payload: adlens::hexcodec::decode("020106 03030F18 0709466C69632032")?,
        },
        AdvertisementEvent {
            address: beacon,
            kind: AdvertisementKind::NonConnectable,
            rssi: -71,
            timestamp: Utc::now(),
            // iBeacon frame cut short by the capture
            payload: adlens::hexcodec::decode("020106 0303AAFE 1AFF4C000215")?,
        },
    ];

    let config = ResolverConfig {
        lookup_timeout: Duration::from_secs(1),
        batch_budget: Some(Duration::from_secs(3)),
        ..Default::default()
    };
    let watcher = Watcher::with_config(gatt, TracingSink, config);

    info!("replaying {} advertisement(s)", batch.len());
    watcher
        .run(futures_lite::stream::iter(vec![batch]), &CancelToken::never())
        .await;

    Ok(())
}
