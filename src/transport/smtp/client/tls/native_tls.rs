use std::fmt::{self, Debug};

use native_tls::TlsConnector;

use crate::transport::smtp::error::{self, Error};

pub(super) fn build_connector<'a>(
    cert_store: super::CertificateStore,
    root_certs: impl Iterator<Item = &'a Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
) -> Result<TlsConnector, Error> {
    let mut tls_builder = TlsConnector::builder();

    match cert_store {
        super::CertificateStore::Default => {}
        super::CertificateStore::None => {
            tls_builder.disable_built_in_roots(true);
        }
    }
    for cert in root_certs {
        tls_builder.add_root_certificate(cert.0.clone());
    }
    tls_builder.danger_accept_invalid_hostnames(accept_invalid_hostnames);
    tls_builder.danger_accept_invalid_certs(accept_invalid_certs);
    tls_builder.min_protocol_version(Some(native_tls::Protocol::Tlsv12));

    tls_builder.build().map_err(error::tls)
}

#[derive(Clone)]
pub(super) struct Certificate(native_tls::Certificate);

impl Certificate {
    pub(super) fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        Ok(Self(
            native_tls::Certificate::from_pem(pem).map_err(error::tls)?,
        ))
    }

    pub(super) fn from_der(der: &[u8]) -> Result<Self, Error> {
        Ok(Self(
            native_tls::Certificate::from_der(der).map_err(error::tls)?,
        ))
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish_non_exhaustive()
    }
}
