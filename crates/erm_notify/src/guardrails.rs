use erm_core::notify::Address;

/// Cheap shape check so obviously broken addresses fail locally instead of at the relay.
///
/// Accepts `local@domain.tld` email addresses and `+digits` phone numbers.
pub fn is_deliverable(address: &Address) -> bool {
    let a = address.as_str().trim();
    if let Some(digits) = a.strip_prefix('+') {
        return (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    }
    let Some((local, domain)) = a.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !a.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

/// Split recipients into `(deliverable, rejected)`, keeping input order.
pub fn partition_recipients(recipients: &[Address]) -> (Vec<Address>, Vec<Address>) {
    recipients.iter().cloned().partition(is_deliverable)
}
