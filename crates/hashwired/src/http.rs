//! Minimal HTTP/1.1 front end for [`Api`].
//!
//! One request per connection. Request bodies are read and discarded; every
//! response is JSON with `Connection: close`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::api::{Api, ApiResponse};

/// Upper bound on header lines, to reject garbage early.
const MAX_HEADERS: usize = 100;
/// Longest request or header line, terminator included.
const MAX_LINE: u64 = 8 * 1024;
const MAX_BODY: u64 = 64 * 1024;
/// Time a client gets to deliver the full request head and body.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
}

/// Read a request line and headers, skipping any body.
///
/// Returns `Ok(None)` when the peer closed the connection before sending anything.
pub async fn read_request<R>(reader: &mut R) -> io::Result<Option<RequestHead>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if read_line_bounded(reader, &mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid(format!("malformed request line: {:?}", line.trim_end())));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(invalid(format!("unsupported protocol {version}")));
    }
    let head = RequestHead {
        method: method.to_string(),
        path: path.to_string(),
    };

    let mut content_length: u64 = 0;
    for _ in 0..MAX_HEADERS {
        line.clear();
        if read_line_bounded(reader, &mut line).await? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            if content_length > 0 {
                let mut sink = Vec::new();
                (&mut *reader)
                    .take(content_length.min(MAX_BODY))
                    .read_to_end(&mut sink)
                    .await?;
            }
            return Ok(Some(head));
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("bad content-length {:?}", value.trim())))?;
            }
        }
    }
    Err(invalid("too many headers".to_string()))
}

/// `read_line` that gives up once `MAX_LINE` bytes pass without a newline.
async fn read_line_bounded<R>(reader: &mut R, line: &mut String) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let read = (&mut *reader).take(MAX_LINE).read_line(line).await?;
    if read as u64 == MAX_LINE && !line.ends_with('\n') {
        return Err(invalid(format!("line exceeds {MAX_LINE} bytes")));
    }
    Ok(read)
}

pub async fn write_response<W>(writer: &mut W, response: &ApiResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(&response.body)?;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// [`read_request`] that fails with `TimedOut` once `deadline` passes.
pub async fn read_request_within<R>(
    reader: &mut R,
    deadline: Duration,
) -> io::Result<Option<RequestHead>>
where
    R: AsyncBufRead + Unpin,
{
    match tokio::time::timeout(deadline, read_request(reader)).await {
        Ok(read) => read,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("request not received within {deadline:?}"),
        )),
    }
}

/// Client-side read failures become a response; anything else drops the connection.
fn read_failure(err: io::Error) -> io::Result<ApiResponse> {
    match err.kind() {
        io::ErrorKind::InvalidData => Ok(ApiResponse::error(400, err.to_string())),
        io::ErrorKind::TimedOut => Ok(ApiResponse::error(408, err.to_string())),
        _ => Err(err),
    }
}

async fn handle_connection<S>(api: &Api, stream: S) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let response = match read_request_within(&mut stream, READ_TIMEOUT).await {
        Ok(Some(head)) => api.handle(&head.method, &head.path).await,
        Ok(None) => return Ok(()),
        Err(e) => read_failure(e)?,
    };
    write_response(stream.get_mut(), &response).await
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, api: Arc<Api>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let api = Arc::clone(&api);
        tokio::spawn(async move {
            debug!(%peer, "connection accepted");
            if let Err(e) = handle_connection(&api, stream).await {
                warn!(%peer, error = %e, "connection failed");
            }
        });
    }
}
