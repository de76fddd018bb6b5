use std::io::{self, Read};
use std::sync::Arc;
use std::thread::JoinHandle;

use tiny_http::{Header, Request, Response, Server, StatusCode};

use crate::routes::{self, Reply, ReplyBody, Service, CORS_HEADERS};

/// Binds `addr` and serves `service` from `workers` threads.
pub fn serve(
    addr: &str,
    workers: usize,
    service: Arc<dyn Service>,
) -> Result<Vec<JoinHandle<()>>, Box<dyn std::error::Error>> {
    let server = Server::http(addr)
        .map_err(|e| format!("failed to bind {} service on {addr}: {e}", service.name()))?;
    let server = Arc::new(server);
    log::info!(
        "{} service listening on http://{addr} ({workers} worker(s))",
        service.name()
    );

    let handles = (0..workers)
        .map(|_| {
            let server = Arc::clone(&server);
            let service = Arc::clone(&service);
            std::thread::spawn(move || worker_loop(&server, service.as_ref()))
        })
        .collect();
    Ok(handles)
}

fn worker_loop(server: &Server, service: &dyn Service) {
    for mut request in server.incoming_requests() {
        let mut body = Vec::new();
        if let Err(e) = request.as_reader().read_to_end(&mut body) {
            log::warn!("Failed to read request body: {e}");
            continue;
        }
        let method = request.method().clone();
        let url = request.url().to_string();
        log::debug!("{} {method} {url}", service.name());

        let reply = routes::handle(service, &method, &url, &body);
        if let Err(e) = respond(request, reply) {
            log::debug!("Client disconnected from {url}: {e}");
        }
    }
}

fn respond(request: Request, reply: Reply<'_>) -> io::Result<()> {
    let status = StatusCode(reply.status);
    let mut headers: Vec<Header> = CORS_HEADERS
        .iter()
        .filter_map(|(name, value)| header(name, value))
        .collect();

    match reply.body {
        ReplyBody::Empty => request.respond(Response::new(status, headers, io::empty(), Some(0), None)),
        ReplyBody::Json(body) => {
            headers.extend(header("Content-Type", "application/json"));
            let len = body.len();
            request.respond(Response::new(status, headers, io::Cursor::new(body), Some(len), None))
        }
        ReplyBody::Stream {
            content_type,
            parts,
        } => {
            headers.extend(header("Content-Type", &content_type));
            let reader = PartReader {
                parts,
                current: io::Cursor::new(Vec::new()),
            };
            request.respond(Response::new(status, headers, reader, None, None))
        }
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Adapts a sequence of body parts to `Read`.
struct PartReader<'a> {
    parts: Box<dyn Iterator<Item = Vec<u8>> + 'a>,
    current: io::Cursor<Vec<u8>>,
}

impl Read for PartReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.current.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.parts.next() {
                Some(part) => self.current = io::Cursor::new(part),
                None => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_reader_concatenates_parts() {
        let parts = vec![b"ab".to_vec(), Vec::new(), b"cde".to_vec()];
        let mut reader = PartReader {
            parts: Box::new(parts.into_iter()),
            current: io::Cursor::new(Vec::new()),
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn test_cors_headers_are_valid() {
        for (name, value) in CORS_HEADERS {
            assert!(header(name, value).is_some());
        }
    }
}
