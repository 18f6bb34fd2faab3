// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin IPC client: connect, send one `Request`, read one `Response`.

use std::path::Path;

use ralph_wire::{read_response, write_request, Query, Request, Response};
use tokio::net::UnixStream;

use crate::exit_error::ExitError;

/// Connect to the control socket and exchange exactly one request/response.
pub async fn call(socket_path: &Path, query: Query) -> Result<Response, ExitError> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|_| ExitError::operational("daemon is not running"))?;

    write_request(&mut stream, &Request::new(query))
        .await
        .map_err(|err| ExitError::operational(format!("failed to send request: {err}")))?;

    read_response(&mut stream).await.map_err(|err| ExitError::operational(format!("failed to read response: {err}")))
}
