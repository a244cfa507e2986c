//! SMTP transport options, provider presets and normalization.
//!
//! Options arrive either from the process configuration or attached to a
//! single request. Before a transport is built they are normalized in
//! place: explicit host/port wins over a symbolic `service` name, and a few
//! providers are substituted from a hardcoded preset table.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Options handed to the SMTP transport builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Accepts a number or a numeric string on the wire.
    #[serde(
        default,
        deserialize_with = "port_from_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<u16>,

    /// Implicit TLS from the first byte (usually port 465).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,

    /// Symbolic provider name, resolved through the preset table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    /// Legacy alias for `secure`, kept on the wire for older hosts.
    #[serde(
        default,
        rename = "secureConnection",
        skip_serializing_if = "Option::is_none"
    )]
    pub secure_connection: Option<bool>,

    #[serde(default, rename = "requireTLS", skip_serializing_if = "Option::is_none")]
    pub require_tls: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,

    /// Unknown fields, passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// SMTP credentials. `pass` is stored encrypted in the host configuration
/// and decrypted once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphers: Option<String>,

    #[serde(
        default,
        rename = "rejectUnauthorized",
        skip_serializing_if = "Option::is_none"
    )]
    pub reject_unauthorized: Option<bool>,
}

/// A hardcoded bundle of option overrides for a named provider.
struct ProviderPreset {
    service: &'static str,
    host: &'static str,
    port: u16,
    domains: Option<&'static [&'static str]>,
    secure_connection: Option<bool>,
    ciphers: Option<&'static str>,
    reject_unauthorized: Option<bool>,
    require_tls: Option<bool>,
}

// The Office365 entry carries the web.de domain list; existing hosts depend
// on the substituted options staying exactly like this (see DESIGN.md).
const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        service: "web.de",
        host: "smtp.web.de",
        port: 587,
        domains: Some(&["web.de"]),
        secure_connection: None,
        ciphers: None,
        reject_unauthorized: None,
        require_tls: None,
    },
    ProviderPreset {
        service: "Office365",
        host: "smtp.office365.com",
        port: 587,
        domains: Some(&["web.de"]),
        secure_connection: Some(false),
        ciphers: Some("SSLv3"),
        reject_unauthorized: None,
        require_tls: None,
    },
    ProviderPreset {
        service: "ith",
        host: "mail.ithnet.com",
        port: 587,
        domains: None,
        secure_connection: Some(false),
        ciphers: Some("SSLv3"),
        reject_unauthorized: Some(false),
        require_tls: Some(true),
    },
];

/// Normalize transport options in place.
///
/// Rules, in order:
/// 1. Without a full `host`/`port` pair, `host`, `port` and `secure` are
///    cleared and resolution falls back to `service`. With both present,
///    `service` is cleared instead.
/// 2. A surviving `service` matching the preset table is replaced by that
///    provider's host, port and TLS overrides. Unknown services pass
///    through untouched.
pub fn normalize(options: &mut TransportOptions) {
    if options.host.is_none() || options.port.is_none() {
        options.host = None;
        options.port = None;
        options.secure = None;
    } else {
        options.service = None;
    }

    let Some(service) = options.service.as_deref() else {
        return;
    };
    let Some(preset) = PRESETS.iter().find(|p| p.service == service) else {
        return;
    };

    options.host = Some(preset.host.to_string());
    options.port = Some(preset.port);
    if let Some(domains) = preset.domains {
        options.domains = Some(domains.iter().map(|d| d.to_string()).collect());
    }
    if preset.secure_connection.is_some() {
        options.secure_connection = preset.secure_connection;
    }
    if preset.ciphers.is_some() || preset.reject_unauthorized.is_some() {
        options.tls = Some(TlsOptions {
            ciphers: preset.ciphers.map(str::to_string),
            reject_unauthorized: preset.reject_unauthorized,
        });
    }
    if preset.require_tls.is_some() {
        options.require_tls = preset.require_tls;
    }
    options.service = None;
}

fn port_from_value<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u16),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Number(port)) => Some(port),
        Some(Raw::Text(text)) => Some(text.trim().parse().map_err(serde::de::Error::custom)?),
    })
}
