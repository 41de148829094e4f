//! Broker connection helpers built on top of the shared engine configuration.

use std::sync::Arc;

/// Builds a rustls client config trusting the platform's web PKI roots, for
/// brokers that require TLS.
pub fn tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Joins the configured bootstrap brokers into the comma-separated form
/// `rskafka::client::ClientBuilder` expects.
pub fn broker_string(brokers: &[String]) -> String {
    brokers.join(",")
}
