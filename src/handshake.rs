//! The HTTP/1.1 Upgrade opening handshake, both server-side (accept) and
//! client-side (connect).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::errors::{ProtocolError, WsError};
use crate::httpline::read_line;
use crate::subproto;
use crate::transport::{Deadline, Transport};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Split a normalized `Name: value` header line into `(lowercased name,
/// trimmed value)`. The line has already had interior whitespace runs
/// collapsed by [`crate::httpline::read_line`], so this only needs to
/// split on the first colon.
fn split_header(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
}

/// Outcome of a successful server-side handshake.
pub struct Accepted {
    pub url: String,
    pub subprotocol: Option<String>,
}

/// Perform the server side of the opening handshake: read the request
/// line and headers, validate them, negotiate a subprotocol against
/// `preset` (the server's advertised list, if any), and write the
/// `101 Switching Protocols` response.
///
/// On any failure the caller is expected to close the transport; this
/// function does not do so itself (it has no ownership of the transport).
pub async fn accept_handshake<T: Transport>(
    transport: &mut T,
    preset: Option<&str>,
    deadline: Deadline,
) -> Result<Accepted, WsError> {
    let request_line = read_line(transport, deadline).await?;
    let mut parts = request_line.split(' ');
    let method = parts.next();
    let uri = parts.next();
    let version = parts.next();
    let trailing = parts.next();
    let (method, uri, version) = match (method, uri, version, trailing) {
        (Some(m), Some(u), Some(v), None) => (m, u, v),
        _ => return Err(ProtocolError::BadRequestLine.into()),
    };
    if method != "GET" || version != "HTTP/1.1" {
        return Err(ProtocolError::BadRequestLine.into());
    }
    let url = uri.to_string();

    let mut seen_upgrade = false;
    let mut seen_connection = false;
    let mut key: Option<String> = None;
    let mut subprotocol: Option<String> = None;
    let mut client_sent_protocol_header = false;

    loop {
        let line = read_line(transport, deadline).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = split_header(&line)
            .ok_or_else(|| ProtocolError::MalformedStatusLine(line.clone()))?;
        match name.as_str() {
            "upgrade" => {
                if seen_upgrade {
                    return Err(ProtocolError::DuplicateHeader("Upgrade").into());
                }
                if !value.eq_ignore_ascii_case("websocket") {
                    return Err(ProtocolError::MissingHeader("Upgrade").into());
                }
                seen_upgrade = true;
            }
            "connection" => {
                if seen_connection {
                    return Err(ProtocolError::DuplicateHeader("Connection").into());
                }
                if !value.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")) {
                    return Err(ProtocolError::MissingHeader("Connection").into());
                }
                seen_connection = true;
            }
            "sec-websocket-key" => {
                if key.is_some() {
                    return Err(ProtocolError::DuplicateHeader("Sec-WebSocket-Key").into());
                }
                key = Some(value);
            }
            "sec-websocket-protocol" => {
                client_sent_protocol_header = true;
                if subprotocol.is_none() {
                    subprotocol = match preset {
                        None => first_token(&value),
                        Some(available) => subproto::first_match(available, &value),
                    };
                }
                // further instances, once a match is set, are ignored but not errors
            }
            _ => {}
        }
    }

    if !seen_upgrade {
        return Err(ProtocolError::MissingHeader("Upgrade").into());
    }
    if !seen_connection {
        return Err(ProtocolError::MissingHeader("Connection").into());
    }
    let key = key.ok_or(ProtocolError::MissingHeader("Sec-WebSocket-Key"))?;

    if client_sent_protocol_header && subprotocol.is_none() {
        return Err(ProtocolError::NoSubprotocolMatch.into());
    }

    // Quirk preserved from the published behavior: if the client never
    // sent the header at all but the server has a preset list, the handle
    // still records the server's first listed token as its own "local"
    // subprotocol. This is not sent back to the client.
    if !client_sent_protocol_header {
        if let Some(available) = preset {
            subprotocol = first_token(available);
        }
    }

    let response_subprotocol = if client_sent_protocol_header {
        subprotocol.clone()
    } else {
        None
    };

    let accept_key = compute_accept_key(&key);
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n"
    );
    if let Some(sp) = &response_subprotocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {sp}\r\n"));
    }
    response.push_str("\r\n");

    transport.send(response.as_bytes(), deadline).await?;
    transport.flush(deadline).await?;

    Ok(Accepted { url, subprotocol })
}

fn first_token(list: &str) -> Option<String> {
    list.split(',').map(str::trim).find(|s| !s.is_empty()).map(String::from)
}

/// Perform the client side of the opening handshake: generate a nonce,
/// send the upgrade request, then read and fully validate the response.
pub async fn connect_handshake<T: Transport>(
    transport: &mut T,
    requested: Option<&str>,
    url: &str,
    deadline: Deadline,
) -> Result<Option<String>, WsError> {
    let nonce: [u8; 16] = rand::random();
    let key = BASE64.encode(nonce);

    let mut request = format!(
        "GET {url} HTTP/1.1\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n"
    );
    if let Some(requested) = requested {
        request.push_str(&format!("Sec-WebSocket-Protocol: {requested}\r\n"));
    }
    request.push_str("\r\n");

    transport.send(request.as_bytes(), deadline).await?;
    transport.flush(deadline).await?;

    let status_line = read_line(transport, deadline).await?;
    let mut parts = status_line.splitn(3, ' ');
    let http_version = parts.next();
    let code = parts.next();
    match (http_version, code) {
        (Some("HTTP/1.1"), Some("101")) => {}
        _ => return Err(ProtocolError::BadStatusLine.into()),
    }

    let mut seen_upgrade = false;
    let mut seen_connection = false;
    let mut seen_accept = false;
    let mut seen_protocol = false;
    let mut subprotocol: Option<String> = None;
    let expected_accept = compute_accept_key(&key);

    loop {
        let line = read_line(transport, deadline).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = split_header(&line)
            .ok_or_else(|| ProtocolError::MalformedStatusLine(line.clone()))?;
        match name.as_str() {
            "upgrade" => {
                if seen_upgrade {
                    return Err(ProtocolError::DuplicateHeader("Upgrade").into());
                }
                seen_upgrade = true;
            }
            "connection" => {
                if seen_connection {
                    return Err(ProtocolError::DuplicateHeader("Connection").into());
                }
                seen_connection = true;
            }
            "sec-websocket-accept" => {
                if seen_accept {
                    return Err(ProtocolError::DuplicateHeader("Sec-WebSocket-Accept").into());
                }
                if value != expected_accept {
                    return Err(ProtocolError::AcceptMismatch.into());
                }
                seen_accept = true;
            }
            "sec-websocket-protocol" => {
                if seen_protocol {
                    return Err(ProtocolError::DuplicateHeader("Sec-WebSocket-Protocol").into());
                }
                if value.contains(',') {
                    return Err(ProtocolError::MultipleSubprotocolsInResponse(value).into());
                }
                let offered = requested.unwrap_or("");
                if !offered.split(',').any(|tok| tok == value) {
                    return Err(ProtocolError::SubprotocolNotOffered(value).into());
                }
                seen_protocol = true;
                subprotocol = Some(value);
            }
            _ => {}
        }
    }

    if !seen_upgrade {
        return Err(ProtocolError::MissingHeader("Upgrade").into());
    }
    if !seen_connection {
        return Err(ProtocolError::MissingHeader("Connection").into());
    }
    if !seen_accept {
        return Err(ProtocolError::MissingHeader("Sec-WebSocket-Accept").into());
    }

    Ok(subprotocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc6455_accept_key_example() {
        // The worked example from RFC 6455 §1.3.
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn header_split_trims_value() {
        assert_eq!(
            split_header("Sec-WebSocket-Key: abc123"),
            Some(("sec-websocket-key".to_string(), "abc123".to_string()))
        );
    }

    #[test]
    fn first_token_skips_empties() {
        assert_eq!(first_token(",sp1,sp2"), Some("sp1".to_string()));
        assert_eq!(first_token(""), None);
    }
}
