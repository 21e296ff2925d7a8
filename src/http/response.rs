//! Response envelope shared by API handlers.

use serde::Serialize;

/// Request metadata block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Meta {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Version {
    pub api: String,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            api: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Paging information. Zeroed for single-item responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// `{meta, version, pagination, data}` wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub version: Version,
    pub pagination: Pagination,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            meta: Meta {
                code: 200,
                message: "OK".to_string(),
            },
            version: Version::default(),
            pagination: Pagination::default(),
            data,
        }
    }
}
