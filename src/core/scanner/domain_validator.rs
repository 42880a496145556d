// src/core/scanner/domain_validator.rs

//! Shape check for certificate common names.
//!
//! A name is accepted when it reads as `<labels>.<tld>`: `labels` is a
//! non-empty run of ASCII letters, digits, hyphens and dots, and `tld` is at
//! least two ASCII letters. Empty labels (`a..com`) are tolerated, matching
//! the permissive behaviour scanners have relied on. The check says nothing
//! about DNS resolvability.

/// Returns `true` when `name` looks like a fully qualified domain.
pub fn is_valid_domain(name: &str) -> bool {
    let Some((labels, tld)) = name.rsplit_once('.') else {
        return false;
    };
    is_tld(tld) && is_label_run(labels)
}

fn is_tld(tld: &str) -> bool {
    tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_label_run(labels: &str) -> bool {
    !labels.is_empty()
        && labels
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}
