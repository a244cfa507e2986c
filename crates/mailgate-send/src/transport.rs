//! SMTP transport construction from normalized options.

use crate::{diagnostic, SendError};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, Tokio1Executor};
use mailgate_core::TransportOptions;

/// Build a transport from already-normalized options.
///
/// The transport is a connection factory; nothing connects until a send.
/// Options that survived normalization without a host (an unknown
/// `service`, or nothing at all) are a configuration error surfaced here.
pub fn build_transport(
    options: &TransportOptions,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
    let Some(host) = options.host.as_deref() else {
        return Err(match options.service.as_deref() {
            Some(service) => SendError::Transport(format!("unknown SMTP service '{service}'")),
            None => SendError::Transport(
                "transport options need either host and port or a known service".into(),
            ),
        });
    };

    let port = options.port.unwrap_or(587);

    // Cipher-suite hints are an OpenSSL-era knob; rustls picks its own.
    if let Some(ciphers) = options.tls.as_ref().and_then(|tls| tls.ciphers.as_deref()) {
        log::debug!("ignoring cipher suite hint '{ciphers}' for {host}");
    }

    let accept_invalid_certs = options
        .tls
        .as_ref()
        .and_then(|tls| tls.reject_unauthorized)
        .map(|reject| !reject)
        .unwrap_or(false);

    let tls_parameters = TlsParameters::builder(host.to_string())
        .dangerous_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|err| SendError::Transport(diagnostic(&err)))?;

    let implicit_tls = options
        .secure
        .or(options.secure_connection)
        .unwrap_or(false);

    let tls = if implicit_tls {
        Tls::Wrapper(tls_parameters)
    } else if options.require_tls.unwrap_or(false) {
        Tls::Required(tls_parameters)
    } else {
        Tls::Opportunistic(tls_parameters)
    };

    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        .port(port)
        .tls(tls);

    if let Some(auth) = &options.auth {
        builder = builder.credentials(Credentials::new(auth.user.clone(), auth.pass.clone()));
    }

    Ok(builder.build())
}
