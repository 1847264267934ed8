use std::fmt::{self, Debug};

#[cfg(feature = "native-tls")]
use crate::transport::smtp::error;
#[cfg(any(feature = "native-tls", feature = "rustls"))]
use crate::transport::smtp::Error;

#[cfg(feature = "native-tls")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
pub(super) mod native_tls;
#[cfg(feature = "rustls")]
#[cfg_attr(docsrs, doc(cfg(feature = "rustls")))]
pub(super) mod rustls;

/// TLS protocol versions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum TlsVersion {
    /// TLS 1.2
    ///
    /// Supported by all TLS backends.
    #[default]
    Tlsv12,
    /// TLS 1.3
    ///
    /// Only supported as a minimum version by rustls.
    Tlsv13,
}

/// Specifies how to establish a TLS connection
///
/// There is no opportunistic mode: a session either starts in plaintext and
/// stays that way, or fails when TLS cannot be negotiated.
#[derive(Clone)]
#[allow(missing_copy_implementations)]
pub enum Tls {
    /// Plaintext connection only. `STARTTLS` is never sent, even when the
    /// server advertises it.
    None,
    /// Begin with a plaintext connection and require `STARTTLS`.
    ///
    /// The session fails if the server does not advertise `STARTTLS` or if
    /// the upgrade fails. Nothing sensitive is sent before the upgrade.
    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls"))))]
    Required(TlsParameters),
    /// Establish a connection wrapped in TLS from the start.
    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls"))))]
    Wrapper(TlsParameters),
}

impl Debug for Tls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Self::None => f.pad("None"),
            #[cfg(any(feature = "native-tls", feature = "rustls"))]
            Self::Required(_) => f.pad("Required"),
            #[cfg(any(feature = "native-tls", feature = "rustls"))]
            Self::Wrapper(_) => f.pad("Wrapper"),
        }
    }
}

/// Source for the base set of root certificates to trust.
#[allow(missing_copy_implementations)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CertificateStore {
    /// Use the default for the TLS backend.
    ///
    /// For native-tls, this is the platform store. For rustls, this is the
    /// platform store if the `rustls-native-certs` feature is enabled,
    /// otherwise the bundled `webpki-roots`.
    #[default]
    Default,
    /// Don't trust any certificate except the explicitly added roots.
    None,
}

/// Parameters to use for secure clients
#[derive(Clone)]
pub struct TlsParameters {
    pub(crate) connector: InnerTlsParameters,
    /// The domain name which is expected in the TLS certificate from the server
    pub(super) domain: String,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Builder for `TlsParameters`
#[derive(Debug, Clone)]
pub struct TlsParametersBuilder {
    domain: String,
    cert_store: CertificateStore,
    root_certs: Vec<Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
    min_tls_version: TlsVersion,
}

impl TlsParametersBuilder {
    /// Creates a new builder for `TlsParameters`
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            cert_store: CertificateStore::Default,
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            accept_invalid_certs: false,
            min_tls_version: TlsVersion::Tlsv12,
        }
    }

    /// Set the source for the base set of root certificates to trust.
    pub fn certificate_store(mut self, cert_store: CertificateStore) -> Self {
        self.cert_store = cert_store;
        self
    }

    /// Add a custom root certificate
    ///
    /// Can be used to connect to a server using a self-signed certificate.
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certs.push(cert);
        self
    }

    /// Controls whether certificates with an invalid hostname are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// If hostname verification is disabled *any* valid certificate,
    /// including those from other sites, are trusted.
    pub fn dangerous_accept_invalid_hostnames(mut self, accept_invalid_hostnames: bool) -> Self {
        self.accept_invalid_hostnames = accept_invalid_hostnames;
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// If certificate verification is disabled, *any* certificate
    /// is trusted for use, including self signed, expired and
    /// mismatching ones.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Controls which minimum TLS version is allowed
    ///
    /// Defaults to [`Tlsv12`][TlsVersion::Tlsv12].
    pub fn set_min_tls_version(mut self, min_tls_version: TlsVersion) -> Self {
        self.min_tls_version = min_tls_version;
        self
    }

    /// Creates a new `TlsParameters` using rustls if enabled, native-tls
    /// otherwise
    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls"))))]
    pub fn build(self) -> Result<TlsParameters, Error> {
        #[cfg(feature = "rustls")]
        return self.build_rustls();
        #[cfg(all(not(feature = "rustls"), feature = "native-tls"))]
        return self.build_native();
    }

    /// Creates a new `TlsParameters` using native-tls with the provided configuration
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn build_native(self) -> Result<TlsParameters, Error> {
        if self.min_tls_version == TlsVersion::Tlsv13 {
            return Err(error::tls(
                "min tls version Tlsv13 not supported in native tls",
            ));
        }

        let connector = self::native_tls::build_connector(
            self.cert_store,
            self.root_certs.iter().map(|cert| &cert.native_tls),
            self.accept_invalid_hostnames,
            self.accept_invalid_certs,
        )?;

        Ok(TlsParameters {
            connector: InnerTlsParameters::NativeTls { connector },
            domain: self.domain,
        })
    }

    /// Creates a new `TlsParameters` using rustls with the provided configuration
    #[cfg(feature = "rustls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls")))]
    pub fn build_rustls(self) -> Result<TlsParameters, Error> {
        let (server_name, config) = self::rustls::build_connector(
            &self.domain,
            self.cert_store,
            self.root_certs.iter().flat_map(|cert| cert.rustls.iter()),
            self.accept_invalid_hostnames,
            self.accept_invalid_certs,
            self.min_tls_version,
        )?;

        Ok(TlsParameters {
            connector: InnerTlsParameters::Rustls {
                config,
                server_name,
            },
            domain: self.domain,
        })
    }
}

#[derive(Clone)]
#[allow(clippy::enum_variant_names)]
pub(crate) enum InnerTlsParameters {
    #[cfg(feature = "native-tls")]
    NativeTls { connector: ::native_tls::TlsConnector },
    #[cfg(feature = "rustls")]
    Rustls {
        config: std::sync::Arc<::rustls::ClientConfig>,
        server_name: ::rustls::pki_types::ServerName<'static>,
    },
}

impl TlsParameters {
    /// Creates a new `TlsParameters` using native-tls or rustls
    /// depending on which one is available
    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls"))))]
    pub fn new(domain: String) -> Result<Self, Error> {
        TlsParametersBuilder::new(domain).build()
    }

    /// Creates a new `TlsParameters` builder
    pub fn builder(domain: String) -> TlsParametersBuilder {
        TlsParametersBuilder::new(domain)
    }

    /// The domain name expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// A certificate that can be used with [`TlsParametersBuilder::add_root_certificate`]
#[derive(Clone)]
#[allow(missing_copy_implementations)]
pub struct Certificate {
    #[cfg(feature = "native-tls")]
    native_tls: self::native_tls::Certificate,
    #[cfg(feature = "rustls")]
    rustls: Vec<self::rustls::Certificate>,
}

#[cfg(any(feature = "native-tls", feature = "rustls"))]
impl Certificate {
    /// Create a `Certificate` from a DER encoded certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
        Ok(Self {
            #[cfg(feature = "native-tls")]
            native_tls: self::native_tls::Certificate::from_der(&der)?,
            #[cfg(feature = "rustls")]
            rustls: vec![self::rustls::Certificate::from_der(der)],
        })
    }

    /// Create a `Certificate` from a PEM encoded certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            #[cfg(feature = "native-tls")]
            native_tls: self::native_tls::Certificate::from_pem(pem)?,
            #[cfg(feature = "rustls")]
            rustls: self::rustls::Certificate::from_pem_bundle(pem)?,
        })
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish_non_exhaustive()
    }
}

#[cfg(all(test, any(feature = "native-tls", feature = "rustls")))]
mod test {
    use super::*;

    #[test]
    fn test_tls_debug_hides_parameters() {
        let params = TlsParameters::new("smtp.example.com".to_owned()).unwrap();
        assert_eq!(params.domain(), "smtp.example.com");

        assert_eq!(format!("{:?}", Tls::Required(params.clone())), "Required");
        assert_eq!(format!("{:?}", Tls::Wrapper(params)), "Wrapper");
        assert_eq!(format!("{:?}", Tls::None), "None");
    }

    #[test]
    fn test_invalid_pem_certificate() {
        assert!(Certificate::from_pem(b"not a certificate").is_err());
    }
}
