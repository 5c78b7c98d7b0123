use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_NAME_BOOST: f64 = 3.0;
pub const DEFAULT_FUZZINESS: &str = "AUTO";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    #[serde(rename = "productName", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prices: Vec<String>,
}

impl Product {
    pub fn new(name: Option<String>, prices: Vec<String>) -> Self {
        Self { name, prices }
    }

    pub fn document_id(&self) -> String {
        let mut hasher = Sha256::new();
        let name = self
            .name
            .as_deref()
            .map(|name| name.trim().to_lowercase())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        for price in &self.prices {
            hasher.update([0x1f]);
            hasher.update(price.trim().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub name_boost: f64,
    pub fuzziness: String,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            name_boost: DEFAULT_NAME_BOOST,
            fuzziness: DEFAULT_FUZZINESS.to_string(),
        }
    }
}

/// Score-ordered hits plus the total number of documents that matched,
/// which can exceed `hits.len()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<Product>,
    pub total: u64,
}
