use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{self, ServerName, UnixTime},
    server::ParsedCertificate,
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use super::{CertificateStore, TlsVersion};
use crate::transport::smtp::error::{self, Error};

pub(super) fn build_connector<'a>(
    domain: &str,
    cert_store: CertificateStore,
    root_certs: impl Iterator<Item = &'a Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
    min_tls_version: TlsVersion,
) -> Result<(ServerName<'static>, Arc<ClientConfig>), Error> {
    let just_version3 = &[&rustls::version::TLS13];
    let supported_versions = match min_tls_version {
        TlsVersion::Tlsv12 => rustls::ALL_VERSIONS,
        TlsVersion::Tlsv13 => just_version3,
    };

    let crypto_provider = Arc::new(crate::rustls_crypto::crypto_provider());
    let tls = ClientConfig::builder_with_provider(Arc::clone(&crypto_provider))
        .with_protocol_versions(supported_versions)
        .map_err(error::tls)?;

    let mut root_cert_store = RootCertStore::empty();

    if cert_store == CertificateStore::Default {
        add_default_roots(&mut root_cert_store);
    }
    for cert in root_certs {
        root_cert_store.add(cert.0.clone()).map_err(error::tls)?;
    }

    let tls = if accept_invalid_certs || accept_invalid_hostnames {
        let verifier = InvalidCertsVerifier {
            ignore_invalid_hostnames: accept_invalid_hostnames,
            ignore_invalid_certs: accept_invalid_certs,
            roots: root_cert_store,
            crypto_provider,
        };
        tls.dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
    } else {
        tls.with_root_certificates(root_cert_store)
    };

    let server_name: ServerName<'_> = domain.try_into().map_err(error::tls)?;
    Ok((server_name.to_owned(), Arc::new(tls.with_no_client_auth())))
}

#[cfg(feature = "rustls-native-certs")]
fn add_default_roots(root_cert_store: &mut RootCertStore) {
    let rustls_native_certs::CertificateResult { certs, errors, .. } =
        rustls_native_certs::load_native_certs();
    let errors_len = errors.len();

    let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
    #[cfg(feature = "tracing")]
    tracing::debug!(
        "loaded platform certs with {errors_len} failing to load, {added} valid and {ignored} ignored (invalid) certs"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (errors_len, added, ignored);
}

#[cfg(all(feature = "webpki-roots", not(feature = "rustls-native-certs")))]
fn add_default_roots(root_cert_store: &mut RootCertStore) {
    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
}

#[cfg(not(any(feature = "webpki-roots", feature = "rustls-native-certs")))]
fn add_default_roots(_root_cert_store: &mut RootCertStore) {}

#[derive(Clone)]
pub(super) struct Certificate(pki_types::CertificateDer<'static>);

impl Certificate {
    pub(super) fn from_pem_bundle(pem: &[u8]) -> Result<Vec<Self>, Error> {
        use rustls::pki_types::pem::PemObject as _;

        let certs = pki_types::CertificateDer::pem_slice_iter(pem)
            .map(|cert| Ok(Self(cert?)))
            .collect::<Result<Vec<_>, pki_types::pem::Error>>()
            .map_err(|_| error::tls("invalid certificate"))?;

        if certs.is_empty() {
            return Err(error::tls("no certificate found"));
        }
        Ok(certs)
    }

    pub(super) fn from_der(der: Vec<u8>) -> Self {
        Self(der.into())
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct InvalidCertsVerifier {
    ignore_invalid_hostnames: bool,
    ignore_invalid_certs: bool,
    roots: RootCertStore,
    crypto_provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InvalidCertsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &pki_types::CertificateDer<'_>,
        intermediates: &[pki_types::CertificateDer<'_>],
        server_name: &pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        if !self.ignore_invalid_certs {
            rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                &self.roots,
                intermediates,
                now,
                self.crypto_provider.signature_verification_algorithms.all,
            )?;
        }

        if !self.ignore_invalid_hostnames {
            rustls::client::verify_server_name(&cert, server_name)?;
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.crypto_provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
