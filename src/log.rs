use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ProtocolError;
use crate::net::ReceiveOutcome;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Interrupted,
    Failed,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub peer: String,
    pub status: TransferStatus,
    pub file_name: Option<String>,
    pub destination: Option<PathBuf>,
    pub declared_size: Option<u64>,
    pub bytes_received: u64,
    pub error: Option<String>,
}

impl TransferLogEntry {
    /// Summarize one connection's outcome. Disconnects are recorded as
    /// Interrupted, everything else that failed as Failed.
    pub fn from_result(peer: SocketAddr, result: &Result<ReceiveOutcome, ProtocolError>) -> Self {
        let timestamp = Utc::now().to_rfc3339();
        let peer = peer.to_string();
        match result {
            Ok(outcome) => TransferLogEntry {
                timestamp,
                peer,
                status: TransferStatus::Completed,
                file_name: Some(outcome.file_name.clone()),
                destination: Some(outcome.path.clone()),
                declared_size: Some(outcome.declared_size),
                bytes_received: outcome.bytes_received,
                error: None,
            },
            Err(e) => TransferLogEntry {
                timestamp,
                peer,
                status: if e.is_disconnect() {
                    TransferStatus::Interrupted
                } else {
                    TransferStatus::Failed
                },
                file_name: None,
                destination: None,
                declared_size: None,
                bytes_received: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(log_file_path: PathBuf) -> Self {
        TransferLog { log_file_path }
    }

    pub fn add_entry(&self, entry: TransferLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
