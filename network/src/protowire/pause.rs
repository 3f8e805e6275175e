use super::advertisement::{AdvertisedFields, Advertisement, ADVERTISEMENT_FIELDS};
use super::container::Container;
use super::MessageKind;
use crate::errors::ContainerError;

/// "Stand by": the advertisement block alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PauseContainer(Container);

impl PauseContainer {
    pub fn new(advertisement: &Advertisement) -> Result<Self, ContainerError> {
        Container::create(advertisement.fields()?, MessageKind::Pause.magic()).map(Self)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ContainerError> {
        Container::from_bytes(data, MessageKind::Pause.magic()).map(Self)
    }

    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.0.count() < ADVERTISEMENT_FIELDS {
            return Err(ContainerError::MissingField(self.0.count()));
        }
        self.try_advertisement().map(|_| ())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl AdvertisedFields for PauseContainer {
    fn container(&self) -> &Container {
        &self.0
    }
}
