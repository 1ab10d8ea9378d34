//! Endpoint identification and certificate identity comparison.

use std::net::IpAddr;

use der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::{Any, Decode};
use spki::ObjectIdentifier;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::name::Name;
use x509_cert::Certificate;

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// How wildcards in certificate names are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WildcardRule {
    /// RFC 2818. Only the leftmost label may hold a wildcard.
    Leftmost,
    /// RFC 2830. Any label may hold a wildcard.
    AnyLabel,
}

impl WildcardRule {
    fn for_algorithm(algorithm: &str) -> Result<Self, String> {
        if algorithm.eq_ignore_ascii_case("HTTPS") {
            Ok(WildcardRule::Leftmost)
        } else if algorithm.eq_ignore_ascii_case("LDAP") || algorithm.eq_ignore_ascii_case("LDAPS") {
            Ok(WildcardRule::AnyLabel)
        } else {
            Err(format!("Unknown identification algorithm: {}", algorithm))
        }
    }
}

/// Names a certificate claims, taken from subjectAltName and subject.
struct CertNames {
    dns: Vec<String>,
    ips: Vec<IpAddr>,
    has_san: bool,
    common_names: Vec<String>,
    subject: Name,
    issuer: Name,
}

impl CertNames {
    fn from_der(der: &[u8]) -> Result<CertNames, String> {
        let cert =
            Certificate::from_der(der).map_err(|e| format!("Failed to parse certificate: {e}"))?;
        let tbs = &cert.tbs_certificate;

        let mut names = CertNames {
            dns: Vec::new(),
            ips: Vec::new(),
            has_san: false,
            common_names: Vec::new(),
            subject: tbs.subject.clone(),
            issuer: tbs.issuer.clone(),
        };

        let san = tbs
            .get::<SubjectAltName>()
            .map_err(|e| format!("Invalid subjectAltName: {e}"))?;
        if let Some((_, SubjectAltName(general_names))) = san {
            names.has_san = true;
            for name in general_names {
                match name {
                    GeneralName::DnsName(dns) => names.dns.push(dns.to_string().to_lowercase()),
                    GeneralName::IpAddress(ip) => {
                        if let Some(addr) = ip_from_octets(ip.as_bytes()) {
                            names.ips.push(addr);
                        }
                    }
                    _ => {}
                }
            }
        }

        for rdn in tbs.subject.0.iter() {
            for atv in rdn.0.iter() {
                if atv.oid == OID_COMMON_NAME {
                    if let Some(cn) = directory_string(&atv.value) {
                        names.common_names.push(cn.to_lowercase());
                    }
                }
            }
        }

        Ok(names)
    }
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(octets).ok().map(IpAddr::from),
        _ => None,
    }
}

fn directory_string(value: &Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.to_string());
    }
    value
        .decode_as::<Ia5StringRef<'_>>()
        .ok()
        .map(|s| s.to_string())
}

/// Check that `host` is a name the certificate was issued for.
///
/// `algorithm` is "HTTPS", "LDAP" or "LDAPS", case insensitive. IP hosts
/// (IPv6 optionally in brackets) only match iPAddress entries. Other hosts
/// match dNSName entries, or the most specific common name when the
/// certificate has no dNSName.
pub fn check_identity(host: &str, cert_der: &[u8], algorithm: &str) -> Result<(), String> {
    let rule = WildcardRule::for_algorithm(algorithm)?;

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    let names = CertNames::from_der(cert_der)?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        if names.ips.contains(&ip) {
            return Ok(());
        }
        return Err(format!("No subject alternative names matching IP address {} found", host));
    }

    let host = host.to_lowercase();
    if !names.dns.is_empty() {
        if names.dns.iter().any(|t| matches_template(&host, t, rule)) {
            return Ok(());
        }
        return Err(format!("No subject alternative DNS name matching {} found", host));
    }

    // Most specific is the last one.
    match names.common_names.last() {
        Some(cn) if matches_template(&host, cn, rule) => Ok(()),
        _ => Err(format!("No name matching {} found", host)),
    }
}

fn matches_template(host: &str, template: &str, rule: WildcardRule) -> bool {
    if !template.contains('*') {
        return host == template;
    }
    if has_illegal_wildcard(template) {
        return false;
    }

    match rule {
        WildcardRule::Leftmost => {
            let (Some((h_first, h_rest)), Some((t_first, t_rest))) =
                (host.split_once('.'), template.split_once('.'))
            else {
                return false;
            };
            !t_rest.contains('*') && h_rest == t_rest && matches_label(h_first, t_first)
        }
        WildcardRule::AnyLabel => {
            let h: Vec<&str> = host.split('.').collect();
            let t: Vec<&str> = template.split('.').collect();
            h.len() == t.len() && h.iter().zip(&t).all(|(h, t)| matches_label(h, t))
        }
    }
}

// "*", "*.com" and similar are too broad to honour.
fn has_illegal_wildcard(template: &str) -> bool {
    let labels = template.split('.').filter(|l| !l.is_empty()).count();
    template == "*" || labels < 3
}

/// Glob match of one label where `*` stands for any run of characters.
fn matches_label(label: &str, template: &str) -> bool {
    let mut pieces = template.split('*');
    let first = pieces.next().unwrap_or("");
    let Some(mut rest) = label.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    let Some((last, middle)) = pieces.split_last() else {
        return rest.is_empty();
    };
    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Whether two server certificates identify the same endpoint.
///
/// Checked in order: identical encoding, a shared iPAddress, a shared
/// dNSName, and finally equal non-empty subject together with equal issuer.
pub fn identities_equivalent(this_der: &[u8], prev_der: &[u8]) -> bool {
    if this_der == prev_der {
        return true;
    }

    let (Ok(this), Ok(prev)) = (CertNames::from_der(this_der), CertNames::from_der(prev_der)) else {
        return false;
    };

    if this.has_san && prev.has_san {
        if this.ips.iter().any(|ip| prev.ips.contains(ip)) {
            return true;
        }
        if this.dns.iter().any(|d| prev.dns.contains(d)) {
            return true;
        }
    }

    !this.subject.0.is_empty()
        && !prev.subject.0.is_empty()
        && this.subject == prev.subject
        && this.issuer == prev.issuer
}
