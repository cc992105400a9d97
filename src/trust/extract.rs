//! Certificate extraction utilities.
//!
//! Used to describe a rejected server certificate in log output.

use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Human-readable identity of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub dns_names: Vec<String>,
}

impl std::fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subject '{}', issuer '{}'", self.subject, self.issuer)?;
        if !self.dns_names.is_empty() {
            write!(f, ", SANs [{}]", self.dns_names.join(", "))?;
        }
        Ok(())
    }
}

/// Extracts DNS names from the Subject Alternative Name extension.
///
/// Other name types (IP addresses, e-mail addresses, ...) are ignored.
fn extract_certificate_sans(cert: &x509_parser::certificate::X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(ref san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}

/// Parses a DER certificate and summarizes who it was issued to.
///
/// Returns `None` if the bytes are not a parseable X.509 certificate.
pub(crate) fn summarize_certificate(der: &[u8]) -> Option<CertificateSummary> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    Some(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        dns_names: extract_certificate_sans(&cert),
    })
}
