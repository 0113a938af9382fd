//! The GATT client collaborator and the metadata it returns.

use async_trait::async_trait;

use crate::{Address, LookupError, Uuid};

/// A GATT service discovered on a peripheral, with its characteristics in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceDescriptor {
    /// The [`Uuid`] identifying the type of this GATT service
    pub uuid: Uuid,
    /// The service's characteristics
    pub characteristics: Vec<CharacteristicDescriptor>,
}

/// A GATT characteristic and the outcome of fetching its user description.
///
/// Fetching a description can fail on its own without affecting sibling characteristics, so the outcome is kept per
/// characteristic. `Ok(None)` means the characteristic has no Characteristic User Description descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicDescriptor {
    /// The [`Uuid`] identifying the type of this GATT characteristic
    pub uuid: Uuid,
    /// The characteristic's user description (Core Specification Vol 3, Part G, §3.3.3.2)
    pub description: Result<Option<String>, LookupError>,
}

impl CharacteristicDescriptor {
    /// A characteristic whose description was read successfully.
    pub fn described(uuid: Uuid, description: impl Into<String>) -> Self {
        CharacteristicDescriptor {
            uuid,
            description: Ok(Some(description.into())),
        }
    }
}

/// Access to the GATT databases of nearby peripherals.
///
/// Implementations wrap a platform Bluetooth stack. Both lookups are point-in-time reads with no side effects; they
/// are cancelled by dropping the returned future. A lookup the OS refuses (permission missing, device in use by
/// another application) must fail with [`LookupError::AccessDenied`].
#[async_trait]
pub trait GattClient: Send + Sync {
    /// Finds a service with the given UUID on any reachable peripheral.
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<ServiceDescriptor, LookupError>;

    /// Opens the peripheral with the given address and enumerates its primary services.
    async fn lookup_by_address(&self, address: Address) -> Result<Vec<ServiceDescriptor>, LookupError>;
}

#[async_trait]
impl<T: GattClient + ?Sized> GattClient for &T {
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<ServiceDescriptor, LookupError> {
        (**self).lookup_by_uuid(uuid).await
    }

    async fn lookup_by_address(&self, address: Address) -> Result<Vec<ServiceDescriptor>, LookupError> {
        (**self).lookup_by_address(address).await
    }
}

#[async_trait]
impl<T: GattClient + ?Sized> GattClient for std::sync::Arc<T> {
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<ServiceDescriptor, LookupError> {
        (**self).lookup_by_uuid(uuid).await
    }

    async fn lookup_by_address(&self, address: Address) -> Result<Vec<ServiceDescriptor>, LookupError> {
        (**self).lookup_by_address(address).await
    }
}
