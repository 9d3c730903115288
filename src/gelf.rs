use crate::level::Severity;
use crate::render::Rendered;
use crate::sink::LogSink;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::error::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Configuration for [`GelfTcpSink`].
#[derive(Clone, Debug)]
pub struct GelfConfig {
    pub host: String,
    pub port: u16,
    /// `host` field of every message; defaults to this machine's hostname.
    pub source: Option<String>,
}

/// Graylog sink speaking GELF 1.1 over TCP.
///
/// Each record is one JSON object followed by a NUL byte. The connection is
/// opened lazily and dropped on the first write error; the next record
/// reconnects. A failed record is not resent.
pub struct GelfTcpSink {
    config: GelfConfig,
    source: String,
    stream: Mutex<Option<TcpStream>>,
}

impl GelfTcpSink {
    pub fn new(config: GelfConfig) -> Self {
        let source = config
            .source
            .clone()
            .or_else(sysinfo::System::host_name)
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            config,
            source,
            stream: Mutex::new(None),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// GELF message for a rendered record, or `None` for captured records.
    pub fn message(&self, rendered: &Rendered) -> Option<Map<String, Value>> {
        let mut msg = Map::new();
        msg.insert("version".into(), "1.1".into());
        msg.insert("host".into(), self.source.clone().into());
        msg.insert("facility".into(), "".into());
        msg.insert(
            "timestamp".into(),
            (Utc::now().timestamp_millis() as f64 / 1000.0).into(),
        );

        match rendered {
            Rendered::Wire(payload) => {
                msg.insert("short_message".into(), payload.message().into());
                msg.insert("level".into(), payload.level.syslog().into());
                msg.insert("_level_name".into(), payload.level.name().into());
                for (key, value) in payload.extra().into_iter().flatten() {
                    if let Some(value) = additional_value(value) {
                        msg.insert(additional_key(key), value);
                    }
                }
            }
            Rendered::Text(text) => {
                msg.insert("short_message".into(), text.as_str().into());
                msg.insert("level".into(), Severity::Info.syslog().into());
            }
            Rendered::Captured => return None,
        }
        Some(msg)
    }

    /// NUL-terminated frame for a rendered record.
    pub fn encode(&self, rendered: &Rendered) -> Result<Option<Vec<u8>>, serde_json::Error> {
        let Some(msg) = self.message(rendered) else {
            return Ok(None);
        };
        let mut frame = serde_json::to_vec(&msg)?;
        frame.push(0);
        Ok(Some(frame))
    }
}

fn additional_key(key: &str) -> String {
    // `_id` is reserved by Graylog
    if key == "id" {
        "_id_".to_string()
    } else {
        format!("_{key}")
    }
}

fn additional_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(_) | Value::Number(_) => Some(value.clone()),
        other => Some(Value::String(other.to_string())),
    }
}

#[async_trait]
impl LogSink for GelfTcpSink {
    async fn send(&self, rendered: &Rendered) -> Result<(), Box<dyn Error + Send + Sync>> {
        let Some(frame) = self.encode(rendered)? else {
            return Ok(());
        };

        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(TcpStream::connect(self.address()).await?);
        }
        let Some(stream) = guard.as_mut() else {
            return Ok(());
        };
        if let Err(e) = stream.write_all(&frame).await {
            *guard = None;
            return Err(Box::new(e));
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(stream) = self.stream.lock().await.as_mut() {
            stream.flush().await?;
        }
        Ok(())
    }
}
