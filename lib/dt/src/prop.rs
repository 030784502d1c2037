use alloc::boxed::Box;
use core::{fmt, str};

/// A named property of a device tree node. Data is kept exactly as it appears in a
/// flattened tree: strings are NUL-terminated.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: Box<str>,
    pub data: Box<[u8]>,
}

impl Property {
    pub fn new(name: &str, data: &[u8]) -> Property {
        Property {
            name: Box::from(name),
            data: Box::from(data),
        }
    }

    /// Build a property holding a single NUL-terminated string.
    pub fn string(name: &str, value: &str) -> Property {
        let mut data = alloc::vec::Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Property {
            name: Box::from(name),
            data: data.into_boxed_slice(),
        }
    }

    pub fn value_as_str(&self) -> Result<&str, PropertyError> {
        str::from_utf8(&self.data)
            .map(|s| s.trim_end_matches('\0'))
            .map_err(|_| PropertyError::InvalidPropFormat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    InvalidPropFormat,
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPropFormat => f.write_str("invalid property format"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_strings() {
        let prop = Property::string("status", "okay");
        assert_eq!(prop.value_as_str(), Ok("okay"));
        assert_eq!(&*prop.data, b"okay\0");
        assert_eq!(Property::new("status", b"ok").value_as_str(), Ok("ok"));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(
            Property::new("label", &[0xff, 0xfe]).value_as_str(),
            Err(PropertyError::InvalidPropFormat)
        );
    }
}
