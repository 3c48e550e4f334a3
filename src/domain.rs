pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Domain part of a sender address: everything after the first `@`.
///
/// Addresses without an `@`, or with nothing after it, map to [`UNKNOWN_DOMAIN`].
pub fn sender_domain(email: &str) -> &str {
    match email.split_once('@') {
        Some((_, domain)) if !domain.is_empty() => domain,
        _ => UNKNOWN_DOMAIN,
    }
}

/// Masks the local part and the domain labels of an address, keeping the TLD.
pub fn redact_address(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "*".repeat(email.chars().count());
    };

    let masked_local = match local.chars().next() {
        Some(first) => format!("{}{}", first, "*".repeat(local.chars().count() - 1)),
        None => String::new(),
    };

    format!("{}@{}", masked_local, redact_domain(domain))
}

fn redact_domain(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() <= 1 {
        return "*".repeat(domain.chars().count());
    }

    if parts[parts.len() - 2].len() <= 3 {
        return format!("???.{}", parts[parts.len() - 1]);
    }

    let redacted_parts: Vec<String> = parts[..parts.len() - 1]
        .iter()
        .map(|part| "*".repeat(part.chars().count()))
        .collect();

    let mut result = redacted_parts.join(".");
    result.push('.');
    result.push_str(parts[parts.len() - 1]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_text_after_first_at() {
        assert_eq!(sender_domain("ann@example.com"), "example.com");
        assert_eq!(sender_domain("odd@relay@host.org"), "relay@host.org");
    }

    #[test]
    fn missing_domain_is_unknown() {
        assert_eq!(sender_domain("postmaster"), UNKNOWN_DOMAIN);
        assert_eq!(sender_domain("trailing@"), UNKNOWN_DOMAIN);
        assert_eq!(sender_domain(""), UNKNOWN_DOMAIN);
    }

    #[test]
    fn redacts_address() {
        assert_eq!(redact_address("alice@example.com"), "a****@*******.com");
        assert_eq!(redact_address("bob@mit.edu"), "b**@???.edu");
        assert_eq!(redact_address("nobody"), "******");
    }
}
