//! Match records parsed out of `ProbeMatches` replies

use serde::{Deserialize, Serialize};

use crate::envelope::{self, EnvelopeError, ProbeMatchIn, TextIn};

/// Scope prefix ONVIF devices use for their advertised properties
pub const ONVIF_SCOPE_PREFIX: &str = "onvif://www.onvif.org/";

/// One service advertisement found in an accepted reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// `Types` text as the device sent it, empty when the entry carries no
    /// type label
    pub types: String,
    /// `XAddrs` tokens in payload order
    pub endpoint_addresses: Vec<String>,
    /// `EndpointReference/Address`, usually a `urn:uuid:` device identity
    pub reference_address: Option<String>,
    /// Scope URIs in payload order, never blank
    pub scopes: Vec<String>,
    /// `Scopes/@MatchBy` rule
    pub scope_match_kind: Option<String>,
    /// `MetadataVersion`, if present and numeric
    pub metadata_version: Option<u32>,
}

impl MatchRecord {
    /// Whether the advertised types contain `type_name` (e.g. `tds:Device`)
    ///
    /// Prefixes differ between devices, so only the local part is compared.
    pub fn has_type(&self, type_name: &str) -> bool {
        let wanted = local_part(type_name);
        self.types
            .split_whitespace()
            .any(|t| local_part(t) == wanted)
    }

    /// Values of the ONVIF scopes in `category`, e.g. `name` or `hardware`
    pub fn scope_values<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.scopes.iter().filter_map(move |scope| {
            scope
                .strip_prefix(ONVIF_SCOPE_PREFIX)?
                .strip_prefix(category)?
                .strip_prefix('/')
        })
    }
}

impl From<ProbeMatchIn> for MatchRecord {
    fn from(entry: ProbeMatchIn) -> Self {
        let (scopes, scope_match_kind) = match entry.scopes {
            Some(scopes) => (
                split_tokens(&scopes.items),
                scopes.match_by.filter(|m| !m.trim().is_empty()),
            ),
            None => (Vec::new(), None),
        };

        Self {
            types: entry.types.map(|t| t.value).unwrap_or_default(),
            endpoint_addresses: entry
                .xaddrs
                .map(|x| split_tokens(&x.value))
                .unwrap_or_default(),
            reference_address: entry
                .endpoint_reference
                .and_then(|r| r.address)
                .and_then(TextIn::non_empty),
            scopes,
            scope_match_kind,
            metadata_version: entry
                .metadata_version
                .and_then(|v| v.value.trim().parse().ok()),
        }
    }
}

/// Parse every `ProbeMatch` entry of a reply payload
///
/// Sparse entries are not an error; only a payload that is not a SOAP
/// envelope at all fails with [`EnvelopeError::MalformedPayload`].
pub fn parse_matches(payload: &[u8]) -> Result<Vec<MatchRecord>, EnvelopeError> {
    Ok(envelope::decode_probe_matches(payload)?
        .into_iter()
        .map(MatchRecord::from)
        .collect())
}

fn split_tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn local_part(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationId;
    use crate::envelope::encode_probe_matches;

    const CAMERA_REPLY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:wsa="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:wsdd="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:tdn="http://www.onvif.org/ver10/network/wsdl" xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
<SOAP-ENV:Header>
<wsa:MessageID>uuid:1419d68a-1dd2-11b2-a105-000000000000</wsa:MessageID>
<wsa:RelatesTo>uuid:4b2c1a3e-0000-4000-8000-000000000001</wsa:RelatesTo>
<wsa:To SOAP-ENV:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</wsa:To>
<wsa:Action SOAP-ENV:mustUnderstand="true">http://schemas.xmlsoap.org/ws/2005/04/discovery/ProbeMatches</wsa:Action>
</SOAP-ENV:Header>
<SOAP-ENV:Body>
<wsdd:ProbeMatches>
<wsdd:ProbeMatch>
<wsa:EndpointReference><wsa:Address>urn:uuid:1419d68a-1dd2-11b2-a105-F0000001ABCD</wsa:Address></wsa:EndpointReference>
<wsdd:Types>tdn:NetworkVideoTransmitter tds:Device</wsdd:Types>
<wsdd:Scopes MatchBy="http://schemas.xmlsoap.org/ws/2005/04/discovery/rfc3986">onvif://www.onvif.org/type/video_encoder onvif://www.onvif.org/type/ptz  onvif://www.onvif.org/name/IPCAM onvif://www.onvif.org/hardware/HI3518</wsdd:Scopes>
<wsdd:XAddrs>http://192.168.1.64/onvif/device_service http://[fe80::1]/onvif/device_service</wsdd:XAddrs>
<wsdd:MetadataVersion>10</wsdd:MetadataVersion>
</wsdd:ProbeMatch>
</wsdd:ProbeMatches>
</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn test_parse_camera_reply() {
        let records = parse_matches(CAMERA_REPLY.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.types, "tdn:NetworkVideoTransmitter tds:Device");
        assert_eq!(
            record.endpoint_addresses,
            vec![
                "http://192.168.1.64/onvif/device_service",
                "http://[fe80::1]/onvif/device_service",
            ]
        );
        assert_eq!(
            record.reference_address.as_deref(),
            Some("urn:uuid:1419d68a-1dd2-11b2-a105-F0000001ABCD")
        );
        assert_eq!(
            record.scopes,
            vec![
                "onvif://www.onvif.org/type/video_encoder",
                "onvif://www.onvif.org/type/ptz",
                "onvif://www.onvif.org/name/IPCAM",
                "onvif://www.onvif.org/hardware/HI3518",
            ]
        );
        assert_eq!(
            record.scope_match_kind.as_deref(),
            Some("http://schemas.xmlsoap.org/ws/2005/04/discovery/rfc3986")
        );
        assert_eq!(record.metadata_version, Some(10));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_matches(CAMERA_REPLY.as_bytes()).unwrap();
        let second = parse_matches(CAMERA_REPLY.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sparse_entry() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <s:Body>
    <d:ProbeMatches>
      <d:ProbeMatch></d:ProbeMatch>
    </d:ProbeMatches>
  </s:Body>
</s:Envelope>"#;

        let records = parse_matches(xml.as_bytes()).unwrap();
        assert_eq!(records, vec![MatchRecord::default()]);
        assert!(records[0].types.is_empty());
        assert!(records[0].endpoint_addresses.is_empty());
        assert!(records[0].reference_address.is_none());
        assert!(records[0].scope_match_kind.is_none());
    }

    #[test]
    fn test_blank_scopes_and_empty_match_by() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <s:Body>
    <d:ProbeMatches>
      <d:ProbeMatch>
        <d:Types>tds:Device</d:Types>
        <d:Scopes MatchBy="">  onvif://www.onvif.org/name/a    onvif://www.onvif.org/name/a </d:Scopes>
        <d:XAddrs>http://10.0.0.7/onvif/device_service</d:XAddrs>
        <d:MetadataVersion>not-a-number</d:MetadataVersion>
      </d:ProbeMatch>
    </d:ProbeMatches>
  </s:Body>
</s:Envelope>"#;

        let records = parse_matches(xml.as_bytes()).unwrap();
        let record = &records[0];
        assert_eq!(
            record.scopes,
            vec!["onvif://www.onvif.org/name/a", "onvif://www.onvif.org/name/a"]
        );
        assert!(record.scopes.iter().all(|s| !s.is_empty()));
        assert_eq!(record.scope_match_kind, None);
        assert_eq!(record.metadata_version, None);
    }

    #[test]
    fn test_multiple_entries_keep_order() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <s:Body>
    <d:ProbeMatches>
      <d:ProbeMatch><d:XAddrs>http://10.0.0.1/a</d:XAddrs></d:ProbeMatch>
      <d:ProbeMatch><d:XAddrs>http://10.0.0.2/b</d:XAddrs></d:ProbeMatch>
    </d:ProbeMatches>
  </s:Body>
</s:Envelope>"#;

        let records = parse_matches(xml.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].endpoint_addresses, vec!["http://10.0.0.1/a"]);
        assert_eq!(records[1].endpoint_addresses, vec!["http://10.0.0.2/b"]);
    }

    #[test]
    fn test_unknown_element_between_entries() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:v="urn:vendor">
  <s:Body>
    <d:ProbeMatches>
      <d:ProbeMatch><d:XAddrs>http://10.0.0.1/a</d:XAddrs></d:ProbeMatch>
      <v:Extension/>
      <d:ProbeMatch><d:XAddrs>http://10.0.0.2/b</d:XAddrs></d:ProbeMatch>
    </d:ProbeMatches>
  </s:Body>
</s:Envelope>"#;

        let records = parse_matches(xml.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].endpoint_addresses, vec!["http://10.0.0.1/a"]);
        assert_eq!(records[1].endpoint_addresses, vec!["http://10.0.0.2/b"]);
    }

    #[test]
    fn test_types_kept_verbatim() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <s:Body>
    <d:ProbeMatches>
      <d:ProbeMatch><d:Types>tdn:NetworkVideoTransmitter  tds:Device</d:Types></d:ProbeMatch>
    </d:ProbeMatches>
  </s:Body>
</s:Envelope>"#;

        let records = parse_matches(xml.as_bytes()).unwrap();
        assert_eq!(records[0].types, "tdn:NetworkVideoTransmitter  tds:Device");
        assert!(records[0].has_type("dn:NetworkVideoTransmitter"));
    }

    #[test]
    fn test_body_without_matches() {
        let hello = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <s:Body><d:Hello><d:Types>tds:Device</d:Types></d:Hello></s:Body>
</s:Envelope>"#;
        assert!(parse_matches(hello.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            parse_matches(b"<s:Envelope><s:Body>"),
            Err(EnvelopeError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_matches(b"{\"not\": \"xml\"}"),
            Err(EnvelopeError::MalformedPayload(_))
        ));
        // Well-formed XML that is no envelope: no Body
        assert!(matches!(
            parse_matches(b"<root><child/></root>"),
            Err(EnvelopeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_encoded_matches_parse_back() {
        let record = MatchRecord {
            types: "dn:NetworkVideoTransmitter".to_string(),
            endpoint_addresses: vec!["http://10.0.0.5/svc".to_string()],
            reference_address: Some("urn:uuid:cam-1".to_string()),
            scopes: vec![
                "onvif://www.onvif.org/type/ptz".to_string(),
                "onvif://www.onvif.org/name/cam1".to_string(),
            ],
            scope_match_kind: Some("rfc3986".to_string()),
            metadata_version: Some(1),
        };
        let xml = encode_probe_matches(&CorrelationId::from("uuid:x"), &[record.clone()]).unwrap();
        assert_eq!(parse_matches(xml.as_bytes()).unwrap(), vec![record]);
    }

    #[test]
    fn test_has_type_ignores_prefix() {
        let record = MatchRecord {
            types: "tdn:NetworkVideoTransmitter tds:Device".to_string(),
            ..Default::default()
        };
        assert!(record.has_type("dn:NetworkVideoTransmitter"));
        assert!(record.has_type("Device"));
        assert!(!record.has_type("tds:Printer"));
    }

    #[test]
    fn test_scope_values() {
        let records = parse_matches(CAMERA_REPLY.as_bytes()).unwrap();
        let record = &records[0];
        assert_eq!(record.scope_values("name").collect::<Vec<_>>(), vec!["IPCAM"]);
        assert_eq!(
            record.scope_values("type").collect::<Vec<_>>(),
            vec!["video_encoder", "ptz"]
        );
        assert_eq!(record.scope_values("location").count(), 0);
    }
}
