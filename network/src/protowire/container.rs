use std::ops::Range;

use crate::errors::ContainerError;
use crate::transport::Magic;

const HEADER_SIZE: usize = 4 + 2;

/// Positional field container: `magic[4] | count:u16 | (len:u32 | bytes)*`.
///
/// Only field boundaries are indexed on load; field contents are decoded
/// by whoever asks for them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    data: Vec<u8>,
    fields: Vec<Range<usize>>,
}

impl Container {
    pub fn create<I, F>(fields: I, magic: Magic) -> Result<Self, ContainerError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut data = Vec::with_capacity(256);
        data.extend_from_slice(&magic);
        data.extend_from_slice(&[0, 0]);

        let mut ranges = Vec::new();
        for field in fields {
            let field = field.as_ref();
            let len = u32::try_from(field.len())
                .map_err(|_| ContainerError::MalformedField { index: ranges.len(), reason: "field too large".into() })?;
            data.extend_from_slice(&len.to_be_bytes());
            let start = data.len();
            data.extend_from_slice(field);
            ranges.push(start..data.len());
        }

        let count = u16::try_from(ranges.len()).map_err(|_| ContainerError::TooManyFields(ranges.len()))?;
        data[4..6].copy_from_slice(&count.to_be_bytes());
        Ok(Self { data, fields: ranges })
    }

    /// Indexes a received container, checking only its framing.
    pub fn from_bytes(data: Vec<u8>, expected: Magic) -> Result<Self, ContainerError> {
        if data.len() < HEADER_SIZE {
            return Err(ContainerError::Truncated);
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[..4]);
        if magic != expected {
            return Err(ContainerError::BadMagic(magic));
        }

        let count = u16::from_be_bytes([data[4], data[5]]) as usize;
        let mut fields = Vec::with_capacity(count);
        let mut pos = HEADER_SIZE;
        for index in 0..count {
            let len_bytes = data.get(pos..pos + 4).ok_or(ContainerError::FieldOverrun(index))?;
            let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
            let start = pos + 4;
            let end = start.checked_add(len).filter(|end| *end <= data.len()).ok_or(ContainerError::FieldOverrun(index))?;
            fields.push(start..end);
            pos = end;
        }
        if pos != data.len() {
            return Err(ContainerError::FieldOverrun(count));
        }
        Ok(Self { data, fields })
    }

    pub fn magic(&self) -> Magic {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&self.data[..4]);
        magic
    }

    pub fn count(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(|r| &self.data[r.clone()])
    }

    pub fn require(&self, index: usize) -> Result<&[u8], ContainerError> {
        self.get(index).ok_or(ContainerError::MissingField(index))
    }

    /// Decodes one field, tagging failures with its position.
    pub fn decode_field<T>(&self, index: usize, decode: impl FnOnce(&[u8]) -> Result<T, String>) -> Result<T, ContainerError> {
        decode(self.require(index)?).map_err(|reason| ContainerError::MalformedField { index, reason })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
