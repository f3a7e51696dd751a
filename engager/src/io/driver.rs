//! Browser driver subprocess speaking line-delimited JSON.
//!
//! [`DriverBrowser`] wraps a long-lived child process that owns the actual
//! page session (launch, auth, rendering live there, not here). Each request
//! is one JSON object per line on the child's stdin; each response is one
//! JSON object per line on its stdout. The child is killed on drop.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::types::{BoundingBox, FeedPosition, ItemId, RenderedItem};
use crate::io::browser::Browser;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverRequest<'a> {
    RenderedItems,
    IdentifierAt {
        position: usize,
    },
    TextFragments {
        position: usize,
    },
    Author {
        position: usize,
    },
    IsAttached {
        position: usize,
    },
    ClickExpander {
        position: usize,
    },
    BoundingBox {
        position: usize,
    },
    Screenshot {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Act {
        instruction: &'a str,
    },
    Scroll {
        delta_px: i64,
    },
    ComposerOpen,
    CurrentUrl,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DriverResponse {
    Ok {
        #[serde(default)]
        value: Value,
    },
    Error {
        message: String,
    },
}

/// The driver reports screenshots as a file path; the bytes are read here so
/// large captures never transit the line protocol.
#[derive(Debug, Deserialize)]
struct ScreenshotReply {
    path: String,
}

struct DriverIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// [`Browser`] implementation backed by a driver subprocess.
pub struct DriverBrowser {
    child: Mutex<Child>,
    io: Mutex<DriverIo>,
}

impl DriverBrowser {
    /// Spawn the configured driver command. An optional feed keyword is
    /// appended as `--keyword <kw>`; feed selection is the driver's concern.
    #[instrument(skip_all, fields(command = %command.first().map(String::as_str).unwrap_or("")))]
    pub fn spawn(command: &[String], keyword: Option<&str>) -> Result<Self> {
        let program = command
            .first()
            .ok_or_else(|| anyhow!("driver command must be a non-empty array"))?;
        let mut cmd = Command::new(program);
        cmd.args(&command[1..]);
        if let Some(keyword) = keyword {
            cmd.arg("--keyword").arg(keyword);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        info!("spawning browser driver");
        let mut child = cmd.spawn().context("spawn browser driver")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("driver stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("driver stdout was not piped"))?;

        Ok(Self {
            child: Mutex::new(child),
            io: Mutex::new(DriverIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    fn request(&self, request: &DriverRequest<'_>) -> Result<Value> {
        let mut line = serde_json::to_string(request).context("serialize driver request")?;
        line.push('\n');

        let mut io = self
            .io
            .lock()
            .map_err(|_| anyhow!("driver io lock poisoned"))?;
        io.stdin
            .write_all(line.as_bytes())
            .context("write driver request")?;
        io.stdin.flush().context("flush driver request")?;

        let mut reply = String::new();
        let n = io
            .stdout
            .read_line(&mut reply)
            .context("read driver response")?;
        if n == 0 {
            return Err(anyhow!("driver closed its stdout"));
        }
        debug!(bytes = n, "driver responded");

        let response: DriverResponse =
            serde_json::from_str(reply.trim()).context("parse driver response")?;
        match response {
            DriverResponse::Ok { value } => Ok(value),
            DriverResponse::Error { message } => Err(anyhow!("driver error: {message}")),
        }
    }

    fn request_as<T: serde::de::DeserializeOwned>(&self, request: &DriverRequest<'_>) -> Result<T> {
        let value = self.request(request)?;
        serde_json::from_value(value).context("decode driver response value")
    }
}

impl Drop for DriverBrowser {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Browser for DriverBrowser {
    fn rendered_items(&self) -> Result<Vec<RenderedItem>> {
        self.request_as(&DriverRequest::RenderedItems)
    }

    fn identifier_at(&self, position: FeedPosition) -> Result<Option<ItemId>> {
        self.request_as(&DriverRequest::IdentifierAt {
            position: position.0,
        })
    }

    fn text_fragments(&self, position: FeedPosition) -> Result<Vec<String>> {
        self.request_as(&DriverRequest::TextFragments {
            position: position.0,
        })
    }

    fn author(&self, position: FeedPosition) -> Result<Option<String>> {
        self.request_as(&DriverRequest::Author {
            position: position.0,
        })
    }

    fn is_attached(&self, position: FeedPosition) -> Result<bool> {
        self.request_as(&DriverRequest::IsAttached {
            position: position.0,
        })
    }

    fn click_expander(&self, position: FeedPosition) -> Result<bool> {
        self.request_as(&DriverRequest::ClickExpander {
            position: position.0,
        })
    }

    fn bounding_box(&self, position: FeedPosition) -> Result<Option<BoundingBox>> {
        self.request_as(&DriverRequest::BoundingBox {
            position: position.0,
        })
    }

    fn screenshot(&self, bbox: &BoundingBox) -> Result<Vec<u8>> {
        let reply: ScreenshotReply = self.request_as(&DriverRequest::Screenshot {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        })?;
        fs::read(&reply.path).with_context(|| format!("read screenshot {}", reply.path))
    }

    fn act(&self, instruction: &str) -> Result<()> {
        self.request(&DriverRequest::Act { instruction })?;
        Ok(())
    }

    fn scroll(&self, delta_px: i64) -> Result<()> {
        self.request(&DriverRequest::Scroll { delta_px })?;
        Ok(())
    }

    fn composer_open(&self) -> Result<bool> {
        self.request_as(&DriverRequest::ComposerOpen)
    }

    fn current_url(&self) -> Result<String> {
        self.request_as(&DriverRequest::CurrentUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A driver stub that answers every request with the same JSON line.
    fn stub_driver(reply: &str) -> Vec<String> {
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("while read -r _line; do echo '{reply}'; done"),
        ]
    }

    #[test]
    fn round_trips_current_url() {
        let browser = stub(r#"{"status":"ok","value":"https://feed.example/"}"#);
        let url = browser.current_url().expect("current url");
        assert_eq!(url, "https://feed.example/");
    }

    #[test]
    fn decodes_rendered_items() {
        let browser = stub(
            r#"{"status":"ok","value":[{"identifier":"urn:1","position":0,"top_px":10.0,"height_px":200.0}]}"#,
        );
        let items = browser.rendered_items().expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identifier.as_deref(), Some("urn:1"));
    }

    #[test]
    fn surfaces_driver_errors() {
        let browser = stub(r#"{"status":"error","message":"page crashed"}"#);
        let err = browser.composer_open().unwrap_err();
        assert!(err.to_string().contains("page crashed"));
    }

    #[test]
    fn reports_driver_exit_as_error() {
        let browser =
            DriverBrowser::spawn(&["true".to_string()], None).expect("spawn short-lived driver");
        let err = browser.current_url().unwrap_err();
        assert!(
            err.to_string().contains("driver closed")
                || err.to_string().contains("write driver request")
        );
    }

    fn stub(reply: &str) -> DriverBrowser {
        DriverBrowser::spawn(&stub_driver(reply), None).expect("spawn stub driver")
    }
}
