//! Access-tag normalization.
//!
//! The access tag is a business registration number (CNPJ) reduced to its
//! digits. It lives on the user row and on token claims; login no longer
//! requires it.

/// Strip every non-digit character from a registration number.
///
/// ```
/// use proposta_core::access_tag::normalize_access_tag;
///
/// assert_eq!(normalize_access_tag("12.345.678/0001-90"), "12345678000190");
/// assert_eq!(normalize_access_tag(""), "");
/// ```
pub fn normalize_access_tag(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
