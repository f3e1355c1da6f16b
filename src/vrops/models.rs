//! suite-api request and response bodies
//!
//! Field names follow the vendor's JSON exactly. The `parse_*` functions turn a
//! response body into the crate's own types and are kept free of I/O so the
//! decoding rules can be tested directly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{
    AdapterDescriptor, AncestorLink, AncestorQuery, PropertyData, PropertyValue, ResourceRef,
    StatValue, Token,
};

pub const AUTH_SOURCE: &str = "Local";
pub const ADAPTER_KIND_KEY: &str = "VMWARE";
pub const RESOURCE_ADAPTER_KIND: &str = "VMware";
pub const RESOURCE_PAGE_SIZE: &str = "50000";
pub const RELATIONSHIP_ANCESTOR: &str = "ANCESTOR";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub auth_source: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatQuery<'a> {
    pub resource_id: &'a [String],
    pub stat_key: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyQuery<'a> {
    pub resource_ids: &'a [String],
    pub property_keys: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipQuery<'a> {
    pub relationship_type: &'a str,
    pub resource_ids: &'a [String],
    pub resource_query: ResourceQuery<'a>,
    pub hierarchy_depth: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery<'a> {
    pub name: &'a [String],
    pub adapter_kind: [&'a str; 1],
    pub resource_kind: [&'a str; 1],
}

impl<'a> RelationshipQuery<'a> {
    pub fn ancestors(resource_ids: &'a [String], query: &'a AncestorQuery) -> Self {
        RelationshipQuery {
            relationship_type: RELATIONSHIP_ANCESTOR,
            resource_ids,
            resource_query: ResourceQuery {
                name: &query.names,
                adapter_kind: [query.adapter_kind.as_str()],
                resource_kind: [query.resource_kind.as_str()],
            },
            hierarchy_depth: query.hierarchy_depth,
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceKey {
    name: String,
    #[serde(default)]
    adapter_kind_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdapterList {
    #[serde(default)]
    adapter_instances_info_dto: Vec<AdapterInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdapterInstance {
    id: String,
    resource_key: ResourceKey,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceList {
    #[serde(default)]
    resource_list: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    identifier: String,
    resource_key: ResourceKey,
}

#[derive(Debug, Deserialize)]
struct StatResponse {
    #[serde(default)]
    values: Vec<StatEntry>,
}

#[derive(Debug, Deserialize)]
struct StatEntry {
    #[serde(rename = "resourceId")]
    resource_id: String,
    #[serde(rename = "stat-list")]
    stat_list: StatList,
}

#[derive(Debug, Deserialize)]
struct StatList {
    #[serde(default)]
    stat: Vec<Stat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stat {
    stat_key: StatKey,
    #[serde(default)]
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct StatKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(default)]
    values: Vec<PropertyEntry>,
}

#[derive(Debug, Deserialize)]
struct PropertyEntry {
    #[serde(rename = "resourceId")]
    resource_id: String,
    #[serde(rename = "property-contents")]
    contents: PropertyContents,
}

#[derive(Debug, Deserialize)]
struct PropertyContents {
    #[serde(rename = "property-content", default)]
    content: Vec<PropertyContent>,
}

#[derive(Debug, Deserialize)]
struct PropertyContent {
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipResponse {
    #[serde(default)]
    resources_relations: Vec<ResourceRelation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceRelation {
    resource: RelatedResource,
    #[serde(default)]
    related_resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedResource {
    resource_key: ResourceKey,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub fn parse_token(body: &str) -> serde_json::Result<Token> {
    let response: TokenResponse = serde_json::from_str(body)?;
    Ok(Token::new(response.token))
}

pub fn parse_adapters(body: &str) -> serde_json::Result<Vec<AdapterDescriptor>> {
    let list: AdapterList = serde_json::from_str(body)?;
    Ok(list
        .adapter_instances_info_dto
        .into_iter()
        .map(|adapter| AdapterDescriptor {
            name: adapter.resource_key.name,
            uuid: adapter.id,
            adapter_kind: adapter.resource_key.adapter_kind_key.unwrap_or_default(),
        })
        .collect())
}

pub fn parse_resources(body: &str) -> serde_json::Result<Vec<ResourceRef>> {
    let list: ResourceList = serde_json::from_str(body)?;
    Ok(list
        .resource_list
        .into_iter()
        .map(|resource| ResourceRef::new(resource.resource_key.name, resource.identifier))
        .collect())
}

/// Latest data point per resource
///
/// Resources without the requested key, or without data for it, are skipped.
pub fn parse_stats(body: &str, stat_key: &str) -> serde_json::Result<Vec<StatValue>> {
    let response: StatResponse = serde_json::from_str(body)?;
    Ok(response
        .values
        .into_iter()
        .filter_map(|entry| {
            let stat = entry
                .stat_list
                .stat
                .iter()
                .find(|s| s.stat_key.key == stat_key)?;
            let value = *stat.data.first()?;
            Some(StatValue {
                resource_id: entry.resource_id,
                stat_key: stat_key.to_string(),
                value,
            })
        })
        .collect())
}

/// Latest property per resource; string values win over numeric data
pub fn parse_properties(
    body: &str,
    property_key: &str,
) -> serde_json::Result<Vec<PropertyValue>> {
    let response: PropertyResponse = serde_json::from_str(body)?;
    Ok(response
        .values
        .into_iter()
        .filter_map(|entry| {
            let content = entry.contents.content.into_iter().next()?;
            let value = match (content.values.into_iter().next(), content.data.first()) {
                (Some(text), _) => PropertyData::Text(text),
                (None, Some(number)) => PropertyData::Number(*number),
                (None, None) => return None,
            };
            Some(PropertyValue {
                resource_id: entry.resource_id,
                property_key: property_key.to_string(),
                value,
            })
        })
        .collect())
}

pub fn parse_relationships(body: &str) -> serde_json::Result<Vec<AncestorLink>> {
    let response: RelationshipResponse = serde_json::from_str(body)?;
    let mut links = HashMap::new();
    for relation in response.resources_relations {
        let label = ancestor_label(&relation.resource.resource_key.name).to_string();
        for resource_id in relation.related_resources {
            links.insert(resource_id, label.clone());
        }
    }
    Ok(links
        .into_iter()
        .map(|(resource_id, ancestor_label)| AncestorLink {
            resource_id,
            ancestor_label,
        })
        .collect())
}

/// `"Project (1a2b3c)"` -> `"1a2b3c"`; names without parentheses pass through
pub fn ancestor_label(name: &str) -> &str {
    let Some(open) = name.find('(') else {
        return name;
    };
    let inner = &name[open + 1..];
    match inner.find(')') {
        Some(close) => &inner[..close],
        None => inner,
    }
}
