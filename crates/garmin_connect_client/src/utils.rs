//! Helpers for the login handshake: cookie lookup and ticket conversion.

/// Name of the cookie that carries the ticket-granting ticket after a
/// successful credential POST.
pub const GRANTING_TICKET_COOKIE: &str = "CASTGC";

/// Find a cookie value in a `Cookie` or `Set-Cookie` header string
/// (`a=1; b=2`, `a=1; Path=/`).
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

/// Turn a ticket-granting ticket (`TGT-...`) into the service ticket
/// expected by the post-auth endpoint (`ST-0...`).
///
/// Only the 4-character prefix is replaced, whatever it contains.
pub fn service_ticket(granting_ticket: &str) -> String {
    let rest = granting_ticket
        .char_indices()
        .nth(4)
        .map(|(i, _)| &granting_ticket[i..])
        .unwrap_or("");
    format!("ST-0{rest}")
}
