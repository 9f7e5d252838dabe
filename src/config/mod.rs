//! Job configuration: the declarative description of a scrape job.
//!
//! `JobConfig` is deserialized from a user-supplied JSON document and
//! validated once, before the engine is constructed around it.

mod field_spec;
mod selector;
mod transformer;
mod validate;

pub use field_spec::FieldSpec;
pub use selector::{Selector, SelectorKind};
pub use transformer::{Transformer, TransformerKind};
pub use validate::validate;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMode {
    Pagination,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Html,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    OauthPassword,
    Bearer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type", default = "default_auth_type")]
    pub auth_type: AuthType,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: Option<String>,
}

fn default_auth_type() -> AuthType {
    AuthType::OauthPassword
}

fn default_scope() -> Option<String> {
    Some("*".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Click,
    Wait,
    Scroll,
    Fill,
    Press,
    Hover,
    Key,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationSpec {
    pub selector: Selector,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_mode")]
    pub mode: ScrapeMode,
    pub base_url: Option<String>,
    #[serde(default)]
    pub start_urls: Vec<String>,
    #[serde(default = "default_response_type")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub use_playwright: bool,
    pub wait_for_selector: Option<String>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    pub proxies: Option<Vec<String>>,
    pub headers: Option<HashMap<String, String>>,
    pub authentication: Option<AuthConfig>,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default)]
    pub respect_robots_txt: bool,
    #[serde(default)]
    pub use_checkpointing: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_nested_urls")]
    pub max_nested_urls: usize,
    pub cookies_file: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub pagination: Option<PaginationSpec>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_mode() -> ScrapeMode {
    ScrapeMode::Pagination
}
fn default_response_type() -> ResponseType {
    ResponseType::Html
}
fn default_min_delay() -> f64 {
    1.0
}
fn default_max_delay() -> f64 {
    3.0
}
fn default_concurrency() -> u32 {
    2
}
fn default_rate_limit() -> u32 {
    5
}
fn default_request_timeout() -> u64 {
    15
}
fn default_max_nested_urls() -> usize {
    20
}
fn default_batch_size() -> usize {
    10
}

impl JobConfig {
    /// Job name, lowercased and with whitespace collapsed to underscores,
    /// used for checkpoint table names and bloom-filter file names so that
    /// multiple engines in one process never share files (§9).
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}
