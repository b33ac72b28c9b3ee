//! Minimal HTTP routing for the std-only relay server.
//!
//! Routes the SSE stream, the ping endpoint, the browser client script and the publish
//! endpoint. Everything else is a 404.

use crate::dev_server::client_script;
use crate::dev_server::sse;
use crate::relay::coordinator::BuildStatusCoordinator;
use crate::settings::{
    CLIENT_SCRIPT_ROUTE, EVENTS_ROUTE, MAX_PUBLISH_BODY_BYTES, PING_ROUTE, PUBLISH_ROUTE,
};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub fn handle_connection(
    mut stream: TcpStream,
    coordinator: Arc<BuildStatusCoordinator>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let Some(request) = parse_request(&mut reader)? else {
        return Ok(());
    };

    match route_request(&request) {
        Route::Events => sse::handle_sse_connection(stream, coordinator),
        Route::Publish => {
            if request.content_length > MAX_PUBLISH_BODY_BYTES {
                return send_text_response(
                    &mut stream,
                    "413 PAYLOAD TOO LARGE",
                    TEXT_PLAIN,
                    "Payload Too Large",
                );
            }

            let mut body = vec![0u8; request.content_length];
            reader.read_exact(&mut body)?;
            handle_publish(&mut stream, &body, &coordinator)
        }
        Route::Ping => send_text_response(&mut stream, "200 OK", TEXT_PLAIN, "ok"),
        Route::ClientScript => send_text_response(
            &mut stream,
            "200 OK",
            "application/javascript; charset=utf-8",
            &client_script::client_script(),
        ),
        Route::MethodNotAllowed => send_text_response(
            &mut stream,
            "405 METHOD NOT ALLOWED",
            TEXT_PLAIN,
            "Method Not Allowed",
        ),
        Route::NotFound => {
            send_text_response(&mut stream, "404 NOT FOUND", TEXT_PLAIN, "Not Found")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub content_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Events,
    Ping,
    ClientScript,
    Publish,
    MethodNotAllowed,
    NotFound,
}

/// Reads the request line and headers. The body, if any, is left in `reader`.
pub fn parse_request(reader: &mut impl BufRead) -> io::Result<Option<HttpRequest>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }

    let mut content_length = 0usize;
    loop {
        let mut header_line = String::new();
        let bytes_read = reader.read_line(&mut header_line)?;
        if bytes_read == 0 || header_line == "\r\n" || header_line == "\n" {
            break;
        }

        let Some((name, value)) = header_line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "invalid Content-Length header")
            })?;
        }
    }

    let mut parts = request_line.split_whitespace();
    let Some(method) = parts.next() else {
        return Ok(None);
    };
    let Some(path) = parts.next() else {
        return Ok(None);
    };

    Ok(Some(HttpRequest {
        method: method.to_owned(),
        path: path.to_owned(),
        content_length,
    }))
}

pub fn route_request(request: &HttpRequest) -> Route {
    let expected_method = match strip_query_string(&request.path) {
        EVENTS_ROUTE | PING_ROUTE | CLIENT_SCRIPT_ROUTE => "GET",
        PUBLISH_ROUTE => "POST",
        _ => return Route::NotFound,
    };

    if request.method != expected_method {
        return Route::MethodNotAllowed;
    }

    match strip_query_string(&request.path) {
        EVENTS_ROUTE => Route::Events,
        PING_ROUTE => Route::Ping,
        CLIENT_SCRIPT_ROUTE => Route::ClientScript,
        _ => Route::Publish,
    }
}

fn strip_query_string(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

fn handle_publish(
    stream: &mut impl Write,
    body: &[u8],
    coordinator: &BuildStatusCoordinator,
) -> io::Result<()> {
    let payload = match std::str::from_utf8(body) {
        Ok(payload) => payload,
        Err(_) => {
            return send_text_response(
                stream,
                "400 BAD REQUEST",
                TEXT_PLAIN,
                "Payload must be UTF-8",
            );
        }
    };

    // Only validated here. Listeners get the body exactly as it was posted.
    if let Err(error) = serde_json::from_str::<serde::de::IgnoredAny>(payload) {
        return send_text_response(
            stream,
            "400 BAD REQUEST",
            TEXT_PLAIN,
            &format!("Invalid JSON payload: {error}"),
        );
    }

    // Publishing after shutdown is accepted and dropped.
    coordinator.publish_raw(payload);
    send_text_response(stream, "200 OK", TEXT_PLAIN, "ok")
}

fn send_text_response(
    stream: &mut impl Write,
    status_line: &str,
    content_type: &str,
    body: &str,
) -> io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(body.as_bytes())?;
    stream.flush()
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
