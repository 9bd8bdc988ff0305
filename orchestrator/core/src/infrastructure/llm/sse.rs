// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Minimal `text/event-stream` line framer shared by the OpenAI and
//! Anthropic adapters. Buffers raw bytes off the response body and yields
//! each event's `data:` payload as it completes (events are separated by a
//! blank line per the SSE spec).

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::domain::llm::LLMError;

pub fn sse_events(response: reqwest::Response) -> impl Stream<Item = Result<String, LLMError>> {
    try_stream! {
        let mut buf = String::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| LLMError::Network(e.to_string()))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find("\n\n") {
                let event = buf[..pos].to_string();
                buf.drain(..pos + 2);

                let data: String = event
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|line| line.trim_start())
                    .collect::<Vec<_>>()
                    .join("\n");

                if !data.is_empty() {
                    yield data;
                }
            }
        }
    }
}
