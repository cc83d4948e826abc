//! libcurl transport. Each request runs on its own transfer thread; the head
//! and body chunks reach the reader over a bounded channel.

use std::cell::{Cell, RefCell};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use curl::easy::{Easy, List};

use super::{Headers, RequestOptions, ResourceResponse, ResourceTransport};
use crate::error::DownloadError;
use crate::platform::DefaultRoute;

/// Chunks buffered between the transfer thread and the reader.
const CHANNEL_DEPTH: usize = 16;

enum Event {
    Head { status: u32, headers: Headers },
    Chunk(Vec<u8>),
    Done(Result<(), curl::Error>),
}

/// Opens connections through the current default interface.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    route: DefaultRoute,
}

impl CurlTransport {
    pub fn new(route: DefaultRoute) -> Self {
        Self { route }
    }
}

impl ResourceTransport for CurlTransport {
    fn open(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Box<dyn ResourceResponse>, DownloadError> {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let url = url.to_string();
        let options = options.clone();
        let interface = self.route.current();

        thread::Builder::new()
            .name("curl-transfer".into())
            .spawn(move || run_transfer(&url, &options, interface.as_deref(), tx))?;

        loop {
            match rx.recv() {
                Ok(Event::Head { status, headers }) => {
                    return Ok(Box::new(CurlResponse {
                        status,
                        headers,
                        rx,
                        pending: Vec::new(),
                        pos: 0,
                        finished: false,
                    }));
                }
                Ok(Event::Done(Err(e))) => return Err(DownloadError::Transport(e)),
                // Head always precedes body and completion.
                Ok(Event::Chunk(_)) | Ok(Event::Done(Ok(()))) => continue,
                Err(_) => {
                    return Err(DownloadError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        "transfer thread exited before the response head",
                    )))
                }
            }
        }
    }
}

fn configure(
    easy: &mut Easy,
    url: &str,
    options: &RequestOptions,
    interface: Option<&str>,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(options.connect_timeout)?;
    // No wall-clock limit; a stalled body aborts after read_timeout.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(options.read_timeout)?;
    easy.useragent(&options.user_agent)?;
    let mut list = List::new();
    for (k, v) in &options.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    easy.http_headers(list)?;
    if let Some(name) = interface {
        easy.interface(&format!("if!{}", name))?;
    }
    Ok(())
}

fn run_transfer(
    url: &str,
    options: &RequestOptions,
    interface: Option<&str>,
    tx: SyncSender<Event>,
) {
    let mut easy = Easy::new();
    if let Err(e) = configure(&mut easy, url, options, interface) {
        let _ = tx.send(Event::Done(Err(e)));
        return;
    }

    let status = Cell::new(0u32);
    let headers = RefCell::new(Headers::new());
    let head_sent = Cell::new(false);
    let send_head = || {
        if !head_sent.replace(true) {
            let _ = tx.send(Event::Head {
                status: status.get(),
                headers: headers.borrow().clone(),
            });
        }
    };

    let result = {
        let mut transfer = easy.transfer();
        let setup = transfer
            .header_function(|data| {
                let line = String::from_utf8_lossy(data);
                if let Some(code) = parse_status_line(&line) {
                    // New response (redirect hop or interim 1xx): start over.
                    status.set(code);
                    headers.borrow_mut().clear();
                } else if line.trim().is_empty() {
                    let code = status.get();
                    let redirect = (300..400).contains(&code) && headers.borrow().get("Location").is_some();
                    if code >= 200 && !redirect {
                        send_head();
                    }
                } else {
                    headers.borrow_mut().push_line(&line);
                }
                true
            })
            .and_then(|_| {
                transfer.write_function(|data| {
                    send_head();
                    match tx.send(Event::Chunk(data.to_vec())) {
                        Ok(()) => Ok(data.len()),
                        // Reader gone: abort the transfer.
                        Err(_) => Ok(0),
                    }
                })
            });
        match setup {
            Ok(()) => transfer.perform(),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => {
            send_head();
            let _ = tx.send(Event::Done(Ok(())));
        }
        // A write error after the head means the reader hung up.
        Err(e) if head_sent.get() && e.is_write_error() => {}
        Err(e) => {
            let _ = tx.send(Event::Done(Err(e)));
        }
    }
}

/// Status code of an `HTTP/x y reason` line.
fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

struct CurlResponse {
    status: u32,
    headers: Headers,
    rx: Receiver<Event>,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl Read for CurlResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.pending.len() {
                let n = buf.len().min(self.pending.len() - self.pos);
                buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Event::Chunk(chunk)) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Ok(Event::Head { .. }) => continue,
                Ok(Event::Done(Ok(()))) => self.finished = true,
                Ok(Event::Done(Err(e))) => {
                    self.finished = true;
                    let kind = if e.is_operation_timedout() {
                        io::ErrorKind::TimedOut
                    } else {
                        io::ErrorKind::Other
                    };
                    return Err(io::Error::new(kind, e));
                }
                Err(_) => {
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer ended without completion",
                    ));
                }
            }
        }
    }
}

impl ResourceResponse for CurlResponse {
    fn status(&self) -> u32 {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_line("HTTP/2 404\r\n"), Some(404));
        assert_eq!(parse_status_line("Content-Length: 5\r\n"), None);
        assert_eq!(parse_status_line("HTTP/1.1 abc\r\n"), None);
    }

    #[test]
    fn unreachable_host_fails_at_open() {
        let transport = CurlTransport::new(DefaultRoute::new());
        let options = RequestOptions {
            connect_timeout: std::time::Duration::from_secs(2),
            ..RequestOptions::default()
        };
        // Port 9 on loopback: nothing listens in a test environment.
        let result = transport.open("http://127.0.0.1:9/", &options);
        assert!(matches!(result, Err(DownloadError::Transport(_))));
    }
}
