//! Name and label format checks.

const DNS1123_LABEL_MAX: usize = 63;
const DNS1123_SUBDOMAIN_MAX: usize = 253;
const QUALIFIED_NAME_MAX: usize = 63;
const LABEL_VALUE_MAX: usize = 63;
const IANA_SVC_NAME_MAX: usize = 15;

fn is_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, at most 63 characters.
pub fn is_dns1123_label(s: &str) -> Result<(), String> {
    if s.len() > DNS1123_LABEL_MAX {
        return Err(format!("must be no more than {DNS1123_LABEL_MAX} characters"));
    }
    let valid = (s.chars().next()).is_some_and(is_alnum)
        && (s.chars().last()).is_some_and(is_alnum)
        && s.chars().all(|c| is_alnum(c) || c == '-');
    if !valid {
        return Err("a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character".into());
    }
    Ok(())
}

/// Dot separated DNS-1123 labels, at most 253 characters.
pub fn is_dns1123_subdomain(s: &str) -> Result<(), String> {
    if s.len() > DNS1123_SUBDOMAIN_MAX {
        return Err(format!(
            "must be no more than {DNS1123_SUBDOMAIN_MAX} characters"
        ));
    }
    if s.split('.').any(|part| is_dns1123_label(part).is_err()) {
        return Err("a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character".into());
    }
    Ok(())
}

fn is_name_part(s: &str) -> bool {
    let alnum = |c: char| c.is_ascii_alphanumeric();
    (s.chars().next()).is_some_and(alnum)
        && (s.chars().last()).is_some_and(alnum)
        && s.chars().all(|c| alnum(c) || matches!(c, '-' | '_' | '.'))
}

/// `[prefix/]name` where prefix is a DNS subdomain, as used by label keys and condition types.
pub fn is_qualified_name(s: &str) -> Result<(), String> {
    let (prefix, name) = match s.split_once('/') {
        None => (None, s),
        Some((prefix, name)) => (Some(prefix), name),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err("prefix part must be non-empty".into());
        }
        if let Err(e) = is_dns1123_subdomain(prefix) {
            return Err(format!("prefix part {e}"));
        }
    }

    if name.is_empty() {
        return Err("name part must be non-empty".into());
    }
    if name.len() > QUALIFIED_NAME_MAX {
        return Err(format!(
            "name part must be no more than {QUALIFIED_NAME_MAX} characters"
        ));
    }
    if !is_name_part(name) {
        return Err("name part must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".into());
    }
    Ok(())
}

/// Empty, or a qualified name part of at most 63 characters.
pub fn is_label_value(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Ok(());
    }
    if s.len() > LABEL_VALUE_MAX {
        return Err(format!("must be no more than {LABEL_VALUE_MAX} characters"));
    }
    if !is_name_part(s) {
        return Err("a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character".into());
    }
    Ok(())
}

/// Named port: at most 15 lowercase alphanumerics or '-', with at least one letter and no
/// leading, trailing or doubled '-'.
pub fn is_iana_svc_name(s: &str) -> Result<(), String> {
    if s.is_empty() || s.len() > IANA_SVC_NAME_MAX {
        return Err(format!("must be 1 to {IANA_SVC_NAME_MAX} characters"));
    }
    if !s.chars().all(|c| is_alnum(c) || c == '-') {
        return Err("must contain only alpha-numeric characters (a-z, 0-9), and hyphens (-)".into());
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err("must not begin or end with a hyphen".into());
    }
    if s.contains("--") {
        return Err("must not contain consecutive hyphens".into());
    }
    if !s.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("must contain at least one letter (a-z)".into());
    }
    Ok(())
}

pub fn is_port_num(port: i32) -> Result<(), String> {
    if !(1..=65535).contains(&port) {
        return Err("must be between 1 and 65535, inclusive".into());
    }
    Ok(())
}

/// `[A-Za-z]([A-Za-z0-9_,:]*[A-Za-z0-9_])?`, the format of condition reasons.
pub fn is_camel_case_reason(s: &str) -> bool {
    let inner = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | ',' | ':');
    (s.chars().next()).is_some_and(|c| c.is_ascii_alphabetic())
        && (s.chars().last()).is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && s.chars().all(inner)
}
