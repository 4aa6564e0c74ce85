// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of mw-log.
//
// mw-log is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mw-log is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mw-log.  If not,
// see <http://www.gnu.org/licenses/>.

//! Runtime configuration.
//!
//! # Introduction
//!
//! A [`Configuration`] may be assembled in code via [`ConfigurationBuilder`], or parsed from a
//! JSON document using the key set of the classic `logging.json` file:
//!
//! ```json
//! {
//!     "appId": "EXA",
//!     "appDesc": "Example application",
//!     "ecuId": "ECU1",
//!     "logMode": "kConsole|kFile",
//!     "logFilePath": "/var/log",
//!     "logLevel": "kInfo",
//!     "logLevelThresholdConsole": "kVerbose",
//!     "contextConfigs": [ { "name": "CTX1", "logLevel": "kDebug" } ],
//!     "queueCapacity": 1024,
//!     "overflowPolicy": "kDropNewest",
//!     "remoteAddress": "127.0.0.1:3490",
//!     "remoteProtocol": "udp"
//! }
//! ```
//!
//! Every key is optional. Locating the document is the caller's business.

use crate::{
    error::{Error, Result},
    frame::HEADER_SIZE,
    identifier::{ecu_from_hostname, LoggingIdentifier},
    level::LogLevel,
    queue::OverflowPolicy,
    record::RecordLimits,
    transport::MAX_DATAGRAM_SIZE,
};

use backtrace::Backtrace;
use serde::Deserialize;
use tracing::warn;

use std::{collections::HashMap, path::PathBuf};

pub const DEFAULT_APP_ID: &str = "NONE";
pub const DEFAULT_ECU_ID: &str = "ECU1";
pub const DEFAULT_LOG_FILE_PATH: &str = "/tmp";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_REMOTE_ADDRESS: &str = "127.0.0.1:3490";
/// Largest record payload whose frame still fits in one UDP datagram
pub const MAX_UDP_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;
pub const DEFAULT_REMOTE_RETRIES: u32 = 2;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            log modes                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// One output of the runtime
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogMode {
    Remote,
    Console,
    File,
}

/// The set of enabled outputs
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogModes {
    pub remote: bool,
    pub console: bool,
    pub file: bool,
}

impl LogModes {
    pub fn none() -> LogModes {
        LogModes::default()
    }
    pub fn with(mut self, mode: LogMode) -> LogModes {
        match mode {
            LogMode::Remote => self.remote = true,
            LogMode::Console => self.console = true,
            LogMode::File => self.file = true,
        }
        self
    }
    pub fn contains(&self, mode: LogMode) -> bool {
        match mode {
            LogMode::Remote => self.remote,
            LogMode::Console => self.console,
            LogMode::File => self.file,
        }
    }
}

impl std::str::FromStr for LogModes {
    type Err = Error;
    /// Parse a `|`-separated list such as `kRemote|kConsole`.
    fn from_str(s: &str) -> Result<Self> {
        s.split('|')
            .map(str::trim)
            .try_fold(LogModes::none(), |modes, text| {
                let mode = match text {
                    "kRemote" | "remote" => LogMode::Remote,
                    "kConsole" | "console" => LogMode::Console,
                    "kFile" | "file" => LogMode::File,
                    _ => {
                        return Err(Error::BadLogMode {
                            text: text.to_string(),
                            back: Backtrace::new(),
                        })
                    }
                };
                Ok(modes.with(mode))
            })
    }
}

/// The transport used to reach the remote collector
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProtocol {
    #[default]
    Udp,
    Tcp,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         Configuration                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug)]
pub struct Configuration {
    app_id: LoggingIdentifier,
    app_description: String,
    ecu_id: LoggingIdentifier,
    log_modes: LogModes,
    log_file_path: PathBuf,
    default_log_level: LogLevel,
    console_threshold: LogLevel,
    context_levels: HashMap<LoggingIdentifier, LogLevel>,
    verbose: bool,
    queue_capacity: usize,
    overflow_policy: OverflowPolicy,
    remote_address: String,
    remote_protocol: RemoteProtocol,
    remote_retries: u32,
    limits: RecordLimits,
}

impl std::default::Default for Configuration {
    fn default() -> Self {
        Configuration {
            app_id: LoggingIdentifier::from_bytes(*b"NONE"),
            app_description: String::new(),
            ecu_id: ecu_from_hostname(LoggingIdentifier::from_bytes(*b"ECU1")),
            log_modes: LogModes::none().with(LogMode::Console),
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE_PATH),
            default_log_level: LogLevel::Info,
            console_threshold: LogLevel::Verbose,
            context_levels: HashMap::new(),
            verbose: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            remote_address: DEFAULT_REMOTE_ADDRESS.to_string(),
            remote_protocol: RemoteProtocol::default(),
            remote_retries: DEFAULT_REMOTE_RETRIES,
            limits: RecordLimits::default(),
        }
    }
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }
    pub fn app_id(&self) -> LoggingIdentifier {
        self.app_id
    }
    pub fn app_description(&self) -> &str {
        &self.app_description
    }
    pub fn ecu_id(&self) -> LoggingIdentifier {
        self.ecu_id
    }
    pub fn log_modes(&self) -> LogModes {
        self.log_modes
    }
    pub fn log_file_path(&self) -> &std::path::Path {
        &self.log_file_path
    }
    pub fn default_log_level(&self) -> LogLevel {
        self.default_log_level
    }
    pub fn console_threshold(&self) -> LogLevel {
        self.console_threshold
    }
    /// The configured threshold for `ctx_id`, else the default level
    pub fn context_level(&self, ctx_id: LoggingIdentifier) -> LogLevel {
        self.context_levels
            .get(&ctx_id)
            .copied()
            .unwrap_or(self.default_log_level)
    }
    pub fn verbose(&self) -> bool {
        self.verbose
    }
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }
    pub fn remote_protocol(&self) -> RemoteProtocol {
        self.remote_protocol
    }
    pub fn remote_retries(&self) -> u32 {
        self.remote_retries
    }
    /// The limits every record is built under.
    ///
    /// When records go to a remote collector over UDP, the payload is further capped so that a
    /// complete frame fits in one datagram.
    pub fn limits(&self) -> RecordLimits {
        if self.log_modes.contains(LogMode::Remote) && self.remote_protocol == RemoteProtocol::Udp {
            RecordLimits::new(
                self.limits.max_arguments(),
                std::cmp::min(self.limits.max_payload(), MAX_UDP_PAYLOAD_SIZE),
            )
        } else {
            self.limits
        }
    }

    /// Parse a JSON configuration document.
    ///
    /// Malformed JSON, a bad identifier, level, mode or policy is an error. A context entry with
    /// an unusable name is skipped with a warning.
    pub fn from_json(text: &str) -> Result<Configuration> {
        let doc: ConfigDocument = serde_json::from_str(text).map_err(|err| Error::Config {
            source: err,
            back: Backtrace::new(),
        })?;
        let mut builder = Configuration::builder();
        if let Some(app_id) = doc.app_id {
            builder = builder.app_id(LoggingIdentifier::new(&app_id)?);
        }
        if let Some(desc) = doc.app_desc {
            builder = builder.app_description(desc);
        }
        if let Some(ecu_id) = doc.ecu_id {
            builder = builder.ecu_id(LoggingIdentifier::new(&ecu_id)?);
        }
        if let Some(modes) = doc.log_mode {
            builder = builder.log_modes(modes.parse()?);
        }
        if let Some(path) = doc.log_file_path {
            builder = builder.log_file_path(path);
        }
        if let Some(level) = doc.log_level {
            builder = builder.default_log_level(level.parse()?);
        }
        if let Some(level) = doc.log_level_threshold_console {
            builder = builder.console_threshold(level.parse()?);
        }
        for ctx in doc.context_configs.unwrap_or_default() {
            match LoggingIdentifier::new(&ctx.name) {
                Ok(id) => builder = builder.context_level(id, ctx.log_level.parse()?),
                Err(err) => warn!("skipping context configuration: {}", err),
            }
        }
        if let Some(capacity) = doc.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        match (doc.overflow_policy, doc.overwrite_on_full) {
            (Some(policy), _) => builder = builder.overflow_policy(policy.parse()?),
            (None, Some(true)) => builder = builder.overflow_policy(OverflowPolicy::DropOldest),
            (None, Some(false)) => builder = builder.overflow_policy(OverflowPolicy::DropNewest),
            (None, None) => (),
        }
        if let Some(addr) = doc.remote_address {
            builder = builder.remote_address(addr);
        }
        if let Some(protocol) = doc.remote_protocol {
            builder = builder.remote_protocol(protocol);
        }
        if let Some(retries) = doc.remote_retries {
            builder = builder.remote_retries(retries);
        }
        if let Some(size) = doc.max_payload_size {
            builder = builder.max_payload_size(size);
        }
        Ok(builder.build())
    }
}

/// The JSON document, as written
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigDocument {
    app_id: Option<String>,
    app_desc: Option<String>,
    ecu_id: Option<String>,
    log_mode: Option<String>,
    log_file_path: Option<String>,
    log_level: Option<String>,
    log_level_threshold_console: Option<String>,
    context_configs: Option<Vec<ContextConfig>>,
    #[serde(alias = "numberOfSlots")]
    queue_capacity: Option<usize>,
    overflow_policy: Option<String>,
    overwrite_on_full: Option<bool>,
    remote_address: Option<String>,
    remote_protocol: Option<RemoteProtocol>,
    remote_retries: Option<u32>,
    max_payload_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextConfig {
    name: String,
    log_level: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      ConfigurationBuilder                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Assemble a [`Configuration`] field by field; anything not set keeps its default.
#[derive(Clone, Debug, Default)]
pub struct ConfigurationBuilder {
    imp: Configuration,
}

impl ConfigurationBuilder {
    pub fn app_id(mut self, app_id: LoggingIdentifier) -> Self {
        self.imp.app_id = app_id;
        self
    }
    pub fn app_description<S: Into<String>>(mut self, desc: S) -> Self {
        self.imp.app_description = desc.into();
        self
    }
    pub fn ecu_id(mut self, ecu_id: LoggingIdentifier) -> Self {
        self.imp.ecu_id = ecu_id;
        self
    }
    pub fn log_modes(mut self, modes: LogModes) -> Self {
        self.imp.log_modes = modes;
        self
    }
    pub fn log_file_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.imp.log_file_path = path.into();
        self
    }
    pub fn default_log_level(mut self, level: LogLevel) -> Self {
        self.imp.default_log_level = level;
        self
    }
    pub fn console_threshold(mut self, level: LogLevel) -> Self {
        self.imp.console_threshold = level;
        self
    }
    pub fn context_level(mut self, ctx_id: LoggingIdentifier, level: LogLevel) -> Self {
        self.imp.context_levels.insert(ctx_id, level);
        self
    }
    /// Produce non-verbose records (message id zero, no type info) by default.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.imp.verbose = verbose;
        self
    }
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.imp.queue_capacity = capacity;
        self
    }
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.imp.overflow_policy = policy;
        self
    }
    pub fn remote_address<S: Into<String>>(mut self, addr: S) -> Self {
        self.imp.remote_address = addr.into();
        self
    }
    pub fn remote_protocol(mut self, protocol: RemoteProtocol) -> Self {
        self.imp.remote_protocol = protocol;
        self
    }
    pub fn remote_retries(mut self, retries: u32) -> Self {
        self.imp.remote_retries = retries;
        self
    }
    /// Clamped to the protocol maximum
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.imp.limits = RecordLimits::new(self.imp.limits.max_arguments(), size);
        self
    }
    /// Clamped to the protocol maximum
    pub fn max_arguments(mut self, count: usize) -> Self {
        self.imp.limits = RecordLimits::new(count, self.imp.limits.max_payload());
        self
    }
    pub fn build(self) -> Configuration {
        self.imp
    }
}
