//! SOAP 1.2 envelopes for WS-Discovery (2005/04)
//!
//! Probes are serialized with prefixed element names. Replies are decoded by
//! local name only, so any prefix a device picks for the SOAP, addressing and
//! discovery namespaces is accepted.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correlation::CorrelationId;
use crate::matches::MatchRecord;
use crate::probe::ProbeRequest;

pub const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const NS_ADDRESSING: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
pub const NS_DISCOVERY: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";
pub const NS_DEVICE: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const NS_NETWORK: &str = "http://www.onvif.org/ver10/network/wsdl";

pub const ACTION_PROBE: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
pub const ACTION_PROBE_MATCHES: &str =
    "http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches";
pub const DISCOVERY_URN: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";
pub const ANONYMOUS_ROLE: &str =
    "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Failed to serialize envelope: {0}")]
    SerializeError(String),
}

// ---------------------------------------------------------------------------
// Outgoing envelopes

#[derive(Serialize)]
struct MustUnderstand<'a> {
    #[serde(rename = "@s:mustUnderstand")]
    must_understand: &'static str,
    #[serde(rename = "$text")]
    value: &'a str,
}

impl<'a> MustUnderstand<'a> {
    fn new(value: &'a str) -> Self {
        Self {
            must_understand: "1",
            value,
        }
    }
}

#[derive(Serialize)]
struct ReplyTo {
    #[serde(rename = "a:Address")]
    address: &'static str,
}

#[derive(Serialize)]
struct ProbeHeaderOut<'a> {
    #[serde(rename = "a:Action")]
    action: MustUnderstand<'a>,
    #[serde(rename = "a:MessageID")]
    message_id: &'a str,
    #[serde(rename = "a:ReplyTo")]
    reply_to: ReplyTo,
    #[serde(rename = "a:To")]
    to: MustUnderstand<'a>,
}

#[derive(Serialize)]
struct ProbeOut<'a> {
    #[serde(rename = "d:Types")]
    types: &'a str,
}

#[derive(Serialize)]
struct ProbeBodyOut<'a> {
    #[serde(rename = "d:Probe")]
    probe: ProbeOut<'a>,
}

#[derive(Serialize)]
struct MatchesHeaderOut<'a> {
    #[serde(rename = "a:Action")]
    action: MustUnderstand<'a>,
    #[serde(rename = "a:MessageID")]
    message_id: &'a str,
    #[serde(rename = "a:RelatesTo")]
    relates_to: &'a str,
    #[serde(rename = "a:To")]
    to: MustUnderstand<'a>,
}

#[derive(Serialize)]
struct EndpointReferenceOut<'a> {
    #[serde(rename = "a:Address")]
    address: &'a str,
}

#[derive(Serialize)]
struct ScopesOut<'a> {
    #[serde(rename = "@MatchBy", skip_serializing_if = "Option::is_none")]
    match_by: Option<&'a str>,
    #[serde(rename = "$text")]
    items: String,
}

#[derive(Serialize)]
struct ProbeMatchOut<'a> {
    #[serde(rename = "a:EndpointReference", skip_serializing_if = "Option::is_none")]
    endpoint_reference: Option<EndpointReferenceOut<'a>>,
    #[serde(rename = "d:Types")]
    types: &'a str,
    #[serde(rename = "d:Scopes", skip_serializing_if = "Option::is_none")]
    scopes: Option<ScopesOut<'a>>,
    #[serde(rename = "d:XAddrs")]
    xaddrs: String,
    #[serde(rename = "d:MetadataVersion", skip_serializing_if = "Option::is_none")]
    metadata_version: Option<u32>,
}

impl<'a> From<&'a MatchRecord> for ProbeMatchOut<'a> {
    fn from(record: &'a MatchRecord) -> Self {
        let scopes = if record.scopes.is_empty() && record.scope_match_kind.is_none() {
            None
        } else {
            Some(ScopesOut {
                match_by: record.scope_match_kind.as_deref(),
                items: record.scopes.join(" "),
            })
        };

        Self {
            endpoint_reference: record
                .reference_address
                .as_deref()
                .map(|address| EndpointReferenceOut { address }),
            types: &record.types,
            scopes,
            xaddrs: record.endpoint_addresses.join(" "),
            metadata_version: record.metadata_version,
        }
    }
}

#[derive(Serialize)]
struct ProbeMatchesOut<'a> {
    #[serde(rename = "d:ProbeMatch")]
    entries: Vec<ProbeMatchOut<'a>>,
}

#[derive(Serialize)]
struct MatchesBodyOut<'a> {
    #[serde(rename = "d:ProbeMatches")]
    probe_matches: ProbeMatchesOut<'a>,
}

#[derive(Serialize)]
#[serde(rename = "s:Envelope")]
struct EnvelopeOut<H, B> {
    #[serde(rename = "@xmlns:s")]
    ns_soap: &'static str,
    #[serde(rename = "@xmlns:a")]
    ns_addressing: &'static str,
    #[serde(rename = "@xmlns:d")]
    ns_discovery: &'static str,
    #[serde(rename = "@xmlns:tds")]
    ns_device: &'static str,
    #[serde(rename = "@xmlns:dn")]
    ns_network: &'static str,
    #[serde(rename = "@xmlns:tdn")]
    ns_network_alias: &'static str,
    #[serde(rename = "s:Header")]
    header: H,
    #[serde(rename = "s:Body")]
    body: B,
}

impl<H: Serialize, B: Serialize> EnvelopeOut<H, B> {
    fn new(header: H, body: B) -> Self {
        Self {
            ns_soap: NS_SOAP,
            ns_addressing: NS_ADDRESSING,
            ns_discovery: NS_DISCOVERY,
            ns_device: NS_DEVICE,
            ns_network: NS_NETWORK,
            ns_network_alias: NS_NETWORK,
            header,
            body,
        }
    }

    fn to_xml(&self) -> Result<String, EnvelopeError> {
        let xml = to_string(self).map_err(|e| EnvelopeError::SerializeError(e.to_string()))?;
        Ok(format!("{}\n{}", XML_DECLARATION, xml))
    }
}

/// Encode a probe as the SOAP envelope multicast to the discovery group
pub fn encode_probe(probe: &ProbeRequest) -> Result<String, EnvelopeError> {
    let header = ProbeHeaderOut {
        action: MustUnderstand::new(ACTION_PROBE),
        message_id: probe.correlation_id().as_str(),
        reply_to: ReplyTo {
            address: ANONYMOUS_ROLE,
        },
        to: MustUnderstand::new(DISCOVERY_URN),
    };
    let body = ProbeBodyOut {
        probe: ProbeOut {
            types: probe.type_filter(),
        },
    };

    EnvelopeOut::new(header, body).to_xml()
}

/// Encode a `ProbeMatches` reply answering the probe `relates_to`
///
/// Used by responders and loopback tests standing in for a device.
pub fn encode_probe_matches(
    relates_to: &CorrelationId,
    matches: &[MatchRecord],
) -> Result<String, EnvelopeError> {
    let message_id = CorrelationId::generate();
    let header = MatchesHeaderOut {
        action: MustUnderstand::new(ACTION_PROBE_MATCHES),
        message_id: message_id.as_str(),
        relates_to: relates_to.as_str(),
        to: MustUnderstand::new(ANONYMOUS_ROLE),
    };
    let body = MatchesBodyOut {
        probe_matches: ProbeMatchesOut {
            entries: matches.iter().map(ProbeMatchOut::from).collect(),
        },
    };

    EnvelopeOut::new(header, body).to_xml()
}

// ---------------------------------------------------------------------------
// Incoming envelopes

/// Element text with any attributes ignored
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TextIn {
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl TextIn {
    /// Trimmed text, `None` when blank
    pub fn non_empty(self) -> Option<String> {
        let trimmed = self.value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HeaderIn {
    #[serde(rename = "MessageID", default)]
    message_id: Option<TextIn>,
    #[serde(rename = "RelatesTo", default)]
    relates_to: Option<TextIn>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeIn<B> {
    #[serde(rename = "Header", default)]
    header: Option<HeaderIn>,
    #[serde(rename = "Body")]
    body: B,
}

#[derive(Debug, Deserialize)]
struct HeaderOnlyIn {
    #[serde(rename = "Header", default)]
    header: Option<HeaderIn>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeIn {
    #[serde(rename = "Types", default)]
    types: Option<TextIn>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeBodyIn {
    #[serde(rename = "Probe", default)]
    probe: Option<ProbeIn>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EndpointReferenceIn {
    #[serde(rename = "Address", default)]
    pub address: Option<TextIn>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScopesIn {
    #[serde(rename = "@MatchBy", default)]
    pub match_by: Option<String>,
    #[serde(rename = "$text", default)]
    pub items: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProbeMatchIn {
    #[serde(rename = "EndpointReference", default)]
    pub endpoint_reference: Option<EndpointReferenceIn>,
    #[serde(rename = "Types", default)]
    pub types: Option<TextIn>,
    #[serde(rename = "Scopes", default)]
    pub scopes: Option<ScopesIn>,
    #[serde(rename = "XAddrs", default)]
    pub xaddrs: Option<TextIn>,
    #[serde(rename = "MetadataVersion", default)]
    pub metadata_version: Option<TextIn>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeMatchesIn {
    #[serde(rename = "ProbeMatch", default)]
    entries: Vec<ProbeMatchIn>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchesBodyIn {
    #[serde(rename = "ProbeMatches", default)]
    probe_matches: Vec<ProbeMatchesIn>,
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, EnvelopeError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| EnvelopeError::MalformedPayload(format!("invalid UTF-8: {}", e)))?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(EnvelopeError::MalformedPayload("empty payload".to_string()));
    }
    from_str(text).map_err(|e| EnvelopeError::MalformedPayload(e.to_string()))
}

/// Extract the `RelatesTo` header of a reply
///
/// `Ok(None)` when the payload is XML but carries no (or a blank) `RelatesTo`.
pub fn relates_to(payload: &[u8]) -> Result<Option<String>, EnvelopeError> {
    let envelope: HeaderOnlyIn = decode(payload)?;
    Ok(envelope
        .header
        .and_then(|h| h.relates_to)
        .and_then(TextIn::non_empty))
}

/// Decode a `Probe` envelope back into the request it carries
pub fn decode_probe(payload: &[u8]) -> Result<ProbeRequest, EnvelopeError> {
    let envelope: EnvelopeIn<ProbeBodyIn> = decode(payload)?;

    let message_id = envelope
        .header
        .and_then(|h| h.message_id)
        .and_then(TextIn::non_empty)
        .ok_or_else(|| EnvelopeError::MalformedPayload("probe without MessageID".to_string()))?;
    let types = envelope
        .body
        .probe
        .ok_or_else(|| EnvelopeError::MalformedPayload("body carries no Probe".to_string()))?
        .types
        .and_then(TextIn::non_empty)
        .ok_or_else(|| EnvelopeError::MalformedPayload("probe without Types".to_string()))?;

    ProbeRequest::build(types, message_id)
        .map_err(|e| EnvelopeError::MalformedPayload(e.to_string()))
}

/// Decode the `ProbeMatch` entries of a reply body, in document order
pub(crate) fn decode_probe_matches(payload: &[u8]) -> Result<Vec<ProbeMatchIn>, EnvelopeError> {
    let envelope: EnvelopeIn<MatchesBodyIn> = decode(payload)?;
    Ok(envelope
        .body
        .probe_matches
        .into_iter()
        .flat_map(|m| m.entries)
        .collect())
}
